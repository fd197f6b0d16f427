#[macro_use]
extern crate rocket;

pub mod activity;
pub mod auth;
pub mod chatbot;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod routes;

use crate::activity::ActivityLogger;
use crate::auth::AuthState;
use crate::chatbot::{ChatbotClient, ChatbotConfig};
use crate::db::PrepDb;
use crate::import::TableRegistry;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every `/api/v1` route plus the generated `openapi.json`.
pub fn api_routes() -> Vec<Route> {
    openapi_get_routes![
        // Health
        routes::health::health_check,
        // Auth
        auth::routes::signup,
        auth::routes::login,
        auth::routes::me,
        auth::routes::logout,
        auth::routes::forgot_password,
        // Public catalog
        routes::catalog::list_exams,
        routes::catalog::get_exam,
        routes::catalog::list_subjects,
        routes::catalog::list_subject_topics,
        routes::catalog::get_topic,
        routes::catalog::list_atomic_topics,
        routes::catalog::list_topic_questions,
        // Practice
        routes::practice::practice_subjects,
        routes::practice::practice_topics,
        routes::practice::demo_code,
        routes::practice::verify_demo_code,
        routes::practice::practice_questions,
        // Dashboard
        routes::dashboard::submit_response,
        routes::dashboard::my_analytics,
        routes::dashboard::my_history,
        routes::dashboard::my_subscriptions,
        routes::dashboard::subscribe,
        routes::dashboard::renew_subscription,
        // Admin catalog
        routes::admin::list_exams,
        routes::admin::get_exam,
        routes::admin::create_exam,
        routes::admin::update_exam,
        routes::admin::delete_exam,
        routes::admin::list_subjects,
        routes::admin::get_subject,
        routes::admin::create_subject,
        routes::admin::update_subject,
        routes::admin::delete_subject,
        routes::admin::list_topics,
        routes::admin::get_topic,
        routes::admin::create_topic,
        routes::admin::update_topic,
        routes::admin::delete_topic,
        routes::admin::list_atomic_topics,
        routes::admin::get_atomic_topic,
        routes::admin::create_atomic_topic,
        routes::admin::update_atomic_topic,
        routes::admin::delete_atomic_topic,
        routes::admin::list_questions,
        routes::admin::get_question,
        routes::admin::create_question,
        routes::admin::update_question,
        routes::admin::delete_question,
        routes::admin::list_demo_codes,
        routes::admin::get_demo_code,
        routes::admin::create_demo_code,
        routes::admin::update_demo_code,
        routes::admin::delete_demo_code,
        // Admin users, activity and stats
        routes::admin_users::list_users,
        routes::admin_users::update_user_role,
        routes::admin_users::delete_user,
        routes::admin_users::list_activity,
        routes::admin_users::platform_stats,
        // Bulk uploads
        routes::uploads::upload_csv,
        routes::uploads::import_questions,
        // Chatbot
        routes::chatbot::send_message,
        routes::chatbot::list_logs,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    log::info!("starting exam prep API server");

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(ActivityLogger)
        .attach(PrepDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match PrepDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match db::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Clone the pool into managed state so handlers can take `&State<PgPool>`
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool",
            |rocket| async move {
                match PrepDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        Ok(rocket.manage(pool))
                    }
                    None => Err(rocket),
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Import Registry",
            |rocket| async move {
                match TableRegistry::standard() {
                    Ok(registry) => Ok(rocket.manage(registry)),
                    Err(err) => {
                        log::error!("invalid import table registry: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Auth Configuration",
            |rocket| async move {
                match AuthState::from_env() {
                    Ok(state) => Ok(rocket.manage(state)),
                    Err(err) => {
                        log::error!("failed to initialize authentication: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Chatbot Configuration",
            |rocket| async move {
                let config = ChatbotConfig::from_env();
                if config.api_key.is_none() {
                    log::info!("OPENAI_API_KEY not set, chatbot answers from the FAQ only");
                }
                match ChatbotClient::new(config) {
                    Ok(client) => Ok(rocket.manage(client)),
                    Err(err) => {
                        log::error!("failed to initialize chatbot client: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .mount("/api/v1", api_routes())
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Exam Prep API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::activity::ActivityLogger;
    use crate::auth::{AuthConfig, AuthState, PasswordService, Role};
    use crate::chatbot::{ChatbotClient, ChatbotConfig};
    use crate::import::TableRegistry;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use uuid::Uuid;

    pub use database::{TestDatabase, TestDatabaseError};

    /// JWT secret used by [`test_auth_state`].
    pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests";

    /// Auth stack with a fixed signing secret.
    pub fn test_auth_state() -> AuthState {
        AuthState::new(
            AuthConfig::with_secret(TEST_JWT_SECRET),
            PasswordService::new().expect("argon2 parameters are valid"),
        )
    }

    /// Bearer header value for `user_id`, signed with [`TEST_JWT_SECRET`].
    pub fn bearer_for(auth: &AuthState, user_id: Uuid, email: &str, role: Role) -> String {
        let token = auth
            .jwt_service
            .issue_access_token(user_id, email, role)
            .expect("token issues");
        format!("Bearer {}", token.token)
    }

    /// Convenience helpers for seeding users and the question bank in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a user row, returning the new user id.
        pub async fn insert_user(
            &self,
            email: &str,
            name: &str,
            role: &str,
            password_hash: &str,
        ) -> Result<Uuid, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(role)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_subject(&self, name: &str) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar("INSERT INTO subjects (name) VALUES ($1) RETURNING subject_id")
                .bind(name)
                .fetch_one(self.pool)
                .await
        }

        pub async fn insert_topic(&self, subject_id: i32, name: &str) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO topics (subject_id, name) VALUES ($1, $2) RETURNING topic_id",
            )
            .bind(subject_id)
            .bind(name)
            .fetch_one(self.pool)
            .await
        }

        /// Insert a four-option question whose correct answer is `b`.
        pub async fn insert_question(
            &self,
            subject_id: i32,
            topic_id: i32,
            text: &str,
            is_demo: bool,
        ) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar(
                r#"INSERT INTO questions (subject_id, topic_id, text, options, correct_answer, is_demo)
                   VALUES ($1, $2, $3, '{"a":"1","b":"2","c":"3","d":"4"}'::jsonb, 'b', $4)
                   RETURNING id"#,
            )
            .bind(subject_id)
            .bind(topic_id)
            .bind(text)
            .bind(is_demo)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_demo_code(&self, topic_id: i32, code: &str) -> Result<(), sqlx::Error> {
            sqlx::query("INSERT INTO demo_codes (topic_id, demo_code) VALUES ($1, $2)")
                .bind(topic_id)
                .bind(code)
                .execute(self.pool)
                .await?;
            Ok(())
        }

        pub async fn insert_exam(&self, title: &str) -> Result<i32, sqlx::Error> {
            sqlx::query_scalar("INSERT INTO exams (title, price) VALUES ($1, 499) RETURNING id")
                .bind(title)
                .fetch_one(self.pool)
                .await
        }

        /// Row count of `table`; only call with fixed table names.
        pub async fn count(&self, table: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, ImageExt, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        const POSTGRES_TAG: &str = "16-alpine";

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision a fresh, migrated database in a disposable Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().with_tag(POSTGRES_TAG).start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                let new_db_name = format!("prep_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container: Some(container),
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Separate pool on the same database that always hands out one connection.
            pub async fn single_connection_pool(&self) -> Result<PgPool, TestDatabaseError> {
                let options = self.pool().connect_options().as_ref().clone();
                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(options)
                    .await?;
                Ok(pool)
            }

            /// Revert every migration, leaving only the migrations table behind.
            pub async fn undo_all(&self) -> Result<(), TestDatabaseError> {
                MIGRATOR.undo(self.pool(), 0).await?;
                Ok(())
            }

            /// Re-run migrations (idempotent).
            pub async fn reset(&self) -> Result<(), TestDatabaseError> {
                MIGRATOR.run(self.pool()).await?;
                Ok(())
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    type StateHook = Box<dyn FnOnce(Rocket<Build>) -> Rocket<Build> + Send>;

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        state: Vec<StateHook>,
        activity_logging: bool,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                ..Default::default()
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage an arbitrary piece of Rocket state.
        pub fn manage<T: Send + Sync + 'static>(mut self, value: T) -> Self {
            self.state.push(Box::new(move |rocket| rocket.manage(value)));
            self
        }

        /// Manage the standard registry, a fixed-secret auth stack and an FAQ-only chatbot.
        pub fn with_default_state(self) -> Self {
            let registry = TableRegistry::standard().expect("standard registry is valid");
            let chatbot =
                ChatbotClient::new(ChatbotConfig::faq_only()).expect("chatbot client builds");
            self.manage(registry)
                .manage(test_auth_state())
                .manage(chatbot)
        }

        /// Attach the practice activity fairing.
        pub fn with_activity_logging(mut self) -> Self {
            self.activity_logging = true;
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            for hook in self.state {
                rocket = hook(rocket);
            }

            if self.activity_logging {
                rocket = rocket.attach(ActivityLogger);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
