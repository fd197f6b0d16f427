use std::sync::OnceLock;

use regex::Regex;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_db_pools::sqlx::{self, Row};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::auth::guards::AuthUser;
use crate::auth::passwords::check_password_policy;
use crate::auth::responses::{
    LoginRequest, LoginResponse, ProfileResponse, Role, SignupRequest, SignupResponse,
    UserProfile, UserSummary,
};
use crate::auth::{AuthError, AuthResult, AuthState};
use crate::models::MessageResponse;

type AuthRouteResult<T> = Result<Json<T>, status::Custom<Json<AuthErrorResponse>>>;

const MIN_NAME_LEN: usize = 2;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex")
    })
}

#[derive(Debug, serde::Serialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub status: u16,
    pub message: String,
}

#[openapi(tag = "Auth")]
#[post("/auth/signup", data = "<payload>")]
pub async fn signup(
    state: &State<AuthState>,
    pool: &State<sqlx::PgPool>,
    payload: Json<SignupRequest>,
) -> Result<status::Created<Json<SignupResponse>>, status::Custom<Json<AuthErrorResponse>>> {
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    validate_signup(name, &email, &payload.password).map_err(respond_error)?;

    let password_hash = state
        .password_service
        .hash_password(&payload.password)
        .map_err(respond_error)?;

    let row = sqlx::query(
        r#"INSERT INTO users (name, email, password_hash, role)
           VALUES ($1, $2, $3, 'user')
           ON CONFLICT (email) DO NOTHING
           RETURNING id"#,
    )
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_optional(pool.inner())
    .await
    .map_err(|err| respond_error(AuthError::from(err)))?;

    let id: Uuid = match row {
        Some(row) => row
            .try_get("id")
            .map_err(|err| respond_error(AuthError::from(err)))?,
        None => return Err(respond_error(AuthError::EmailTaken)),
    };

    log::info!("account created for {}", email);

    Ok(status::Created::new(format!("/api/v1/users/{id}")).body(Json(SignupResponse {
        message: "Account created successfully".into(),
        user: UserSummary {
            id,
            name: name.to_string(),
            email,
            role: Role::User,
        },
    })))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    pool: &State<sqlx::PgPool>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<LoginResponse> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "Email and password are required",
        ));
    }

    let row = sqlx::query(
        "SELECT id, name, email, role, password_hash FROM users WHERE lower(email) = $1",
    )
    .bind(&email)
    .fetch_optional(pool.inner())
    .await
    .map_err(|err| respond_error(AuthError::from(err)))?
    .ok_or_else(|| respond_error(AuthError::InvalidCredentials))?;

    let user = read_summary(&row).map_err(respond_error)?;
    let password_hash: String = row
        .try_get("password_hash")
        .map_err(|err| respond_error(AuthError::from(err)))?;

    // Imported rows may carry hashes from another scheme; treat them as a mismatch.
    let verified = state
        .password_service
        .verify_password(&payload.password, &password_hash)
        .unwrap_or_else(|err| {
            log::warn!("unverifiable password hash for {}: {}", user.email, err);
            false
        });
    if !verified {
        return Err(respond_error(AuthError::InvalidCredentials));
    }

    let token = state
        .jwt_service
        .issue_access_token(user.id, &user.email, user.role)
        .map_err(respond_error)?;

    Ok(Json(LoginResponse {
        token: token.token,
        expires_at: token.expires_at,
        user,
    }))
}

#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(pool: &State<sqlx::PgPool>, user: AuthUser) -> AuthRouteResult<ProfileResponse> {
    let row = sqlx::query("SELECT created_at FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(pool.inner())
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?
        .ok_or_else(|| respond_error(AuthError::UserNotFound))?;

    let created_at = row
        .try_get("created_at")
        .map_err(|err| respond_error(AuthError::from(err)))?;

    Ok(Json(ProfileResponse {
        user: UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at,
        },
    }))
}

/// Tokens are stateless; clients drop them on logout.
#[openapi(tag = "Auth")]
#[post("/auth/logout")]
pub async fn logout() -> status::NoContent {
    status::NoContent
}

#[openapi(tag = "Auth")]
#[post("/auth/forgot-password")]
pub async fn forgot_password() -> Json<MessageResponse> {
    Json(MessageResponse::new(
        "Password reset link sent if account exists.",
    ))
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_signup(name: &str, email: &str, password: &str) -> AuthResult<()> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "Name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    if !email_regex().is_match(email) {
        return Err(AuthError::Validation("A valid email is required".into()));
    }
    check_password_policy(password)
}

fn read_summary(row: &sqlx::postgres::PgRow) -> AuthResult<UserSummary> {
    let role: String = row.try_get("role")?;
    Ok(UserSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: Role::parse(&role).unwrap_or(Role::User),
    })
}

fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    if err.status() == Status::InternalServerError {
        log::error!("auth request failed: {}", err);
    }
    respond_message(err.status(), err.public_message())
}

fn respond_message(
    status: Status,
    message: impl Into<String>,
) -> status::Custom<Json<AuthErrorResponse>> {
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            message: message.into(),
        }),
    )
}
