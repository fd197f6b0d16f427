//! Authentication module: configuration, password hashing, token minting,
//! Rocket request guards, and HTTP route handlers.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod responses;
pub mod routes;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, MaybeUser, RequireAdmin};
pub use jwt::JwtService;
pub use passwords::PasswordService;
pub use responses::Role;

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(config: AuthConfig, password_service: PasswordService) -> Self {
        let jwt_service = JwtService::from_config(&config);
        Self {
            config,
            password_service: Arc::new(password_service),
            jwt_service: Arc::new(jwt_service),
        }
    }

    /// Build the auth stack from `PREP_*` environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Ok(Self::new(AuthConfig::from_env()?, PasswordService::new()?))
    }
}
