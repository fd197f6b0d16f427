use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_db_pools::sqlx::{self, Row};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use uuid::Uuid;

use crate::auth::jwt::AccessTokenClaims;
use crate::auth::responses::Role;
use crate::auth::{AuthError, AuthResult, AuthState};

/// A caller holding a valid bearer token for an existing account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAdmin {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(request).await {
            Outcome::Success(user) if user.is_admin() => Outcome::Success(RequireAdmin(user)),
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, AuthError::Forbidden)),
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(_) => {
                Outcome::Error((Status::Unauthorized, AuthError::Unauthorized))
            }
        }
    }
}

/// Optional identity: `None` for anonymous callers or unusable tokens.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeUser {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if request.headers().get_one("Authorization").is_none() {
            return Outcome::Success(MaybeUser(None));
        }
        match extract_user(request).await {
            Ok(user) => Outcome::Success(MaybeUser(Some(user))),
            Err(err) => {
                log::debug!("ignoring unusable bearer token: {}", err);
                Outcome::Success(MaybeUser(None))
            }
        }
    }
}

macro_rules! no_openapi_header {
    ($($guard:ty),+) => {
        $(
            impl<'r> OpenApiFromRequest<'r> for $guard {
                fn from_request_input(
                    _gen: &mut OpenApiGenerator,
                    _name: String,
                    _required: bool,
                ) -> rocket_okapi::Result<RequestHeaderInput> {
                    Ok(RequestHeaderInput::None)
                }
            }
        )+
    };
}

no_openapi_header!(AuthUser, RequireAdmin, MaybeUser);

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let pool = request
        .guard::<&State<sqlx::PgPool>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("database pool missing from state".into()))?;

    let claims = verified_claims(request, auth_state)?;
    let user_id = claims.user_id()?;

    let row = sqlx::query("SELECT name, email, role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.inner())
        .await?
        .ok_or(AuthError::TokenInvalid)?;

    let name: String = row.try_get("name")?;
    let email: String = row.try_get("email")?;
    let role_str: String = row.try_get("role")?;

    // A role change invalidates tokens minted under the old role.
    let role = Role::parse(&role_str).ok_or(AuthError::TokenInvalid)?;
    if role.as_str() != claims.role {
        return Err(AuthError::TokenInvalid);
    }

    Ok(AuthUser {
        id: user_id,
        name,
        email,
        role,
    })
}

/// Decode and verify the request's bearer token without touching the database.
pub fn verified_claims(request: &Request<'_>, auth_state: &AuthState) -> AuthResult<AccessTokenClaims> {
    let token = bearer_token_from_request(request)?;
    auth_state.jwt_service.decode_access_token(token)
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthorized)?;
    parse_bearer(header).ok_or(AuthError::TokenInvalid)
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(parse_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("abc"), None);
    }
}
