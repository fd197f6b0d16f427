use crate::auth::{AuthError, AuthResult};

const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let jwt_secret = std::env::var("PREP_JWT_SECRET")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AuthError::Config("PREP_JWT_SECRET is required".into()))?;
        let issuer =
            std::env::var("PREP_JWT_ISSUER").unwrap_or_else(|_| "http://localhost".into());
        let audience = std::env::var("PREP_JWT_AUDIENCE").unwrap_or_else(|_| "prep-api".into());
        let access_token_ttl_secs = std::env::var("PREP_ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS);

        Ok(Self {
            jwt_secret,
            issuer,
            audience,
            access_token_ttl_secs,
        })
    }

    /// Fixed configuration for tests and local tooling.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            issuer: "http://localhost".into(),
            audience: "prep-api".into(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
        }
    }
}
