use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use prep_server::auth::passwords::{PasswordService, check_password_policy};

#[derive(Parser, Debug)]
#[command(
    name = "create_user",
    about = "Create a local exam-prep account, typically the first administrator"
)]
struct Args {
    /// Email address for the account (stored lower-cased).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Display name shown in the dashboard.
    #[arg(long, default_value = "Administrator")]
    name: String,

    /// Role to assign (`user` or `admin`).
    #[arg(long, default_value = "admin")]
    role: String,

    /// Reset the password and role when the email already exists.
    #[arg(long)]
    update_existing: bool,
}

fn fail(message: impl std::fmt::Display) -> ! {
    let _ = writeln!(io::stderr(), "error: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();
    let name = args.name.trim();

    if !email.contains('@') {
        fail("email must contain '@'");
    }
    if name.len() < 2 {
        fail("name must be at least 2 characters");
    }
    if let Err(err) = check_password_policy(&args.password) {
        fail(err);
    }

    let role = match args.role.trim().to_lowercase().as_str() {
        "admin" => "admin",
        "user" => "user",
        other => fail(format!("unsupported role '{other}'. Use 'user' or 'admin'.")),
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    let conflict_action = if args.update_existing {
        "DO UPDATE SET password_hash = EXCLUDED.password_hash, role = EXCLUDED.role, name = EXCLUDED.name"
    } else {
        "DO NOTHING"
    };
    let statement = format!(
        "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (email) {conflict_action} RETURNING id"
    );

    let user_id: Option<uuid::Uuid> = sqlx::query_scalar(&statement)
        .bind(name)
        .bind(&email)
        .bind(&password_hash)
        .bind(role)
        .fetch_optional(&pool)
        .await?;

    match user_id {
        Some(id) => println!("Saved {role} user '{email}' with id {id}"),
        None => fail(format!(
            "a user with email '{email}' already exists (pass --update-existing to reset it)"
        )),
    }

    Ok(())
}
