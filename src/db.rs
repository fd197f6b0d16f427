use rocket_db_pools::{Database, sqlx};

/// Primary Postgres pool, configured under `databases.prep_db`.
#[derive(Database)]
#[database("prep_db")]
pub struct PrepDb(sqlx::PgPool);

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply every pending migration in `migrations/`.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
