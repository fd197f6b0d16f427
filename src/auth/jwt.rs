use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::responses::Role;
use crate::auth::{AuthConfig, AuthError, AuthResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub email: String,
    pub role: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 token minting and verification with a shared secret.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret_bytes = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.leeway = 30;

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
        }
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> AuthResult<SignedAccessToken> {
        let now = Utc::now();
        let expires_at = now + self.access_token_ttl;

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SignedAccessToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_JWT_SECRET: &str = "super-secret-test-key";

    #[test]
    fn issues_and_decodes_access_tokens() {
        let service = JwtService::from_config(&AuthConfig::with_secret(TEST_JWT_SECRET));
        let user_id = Uuid::new_v4();

        let token = service
            .issue_access_token(user_id, "learner@example.com", Role::User)
            .expect("issue token");
        let claims = service
            .decode_access_token(&token.token)
            .expect("decode token");

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "learner@example.com");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let issuer = JwtService::from_config(&AuthConfig::with_secret("one"));
        let verifier = JwtService::from_config(&AuthConfig::with_secret("two"));
        let token = issuer
            .issue_access_token(Uuid::new_v4(), "a@example.com", Role::Admin)
            .unwrap();

        assert!(matches!(
            verifier.decode_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn rejects_expired_tokens() {
        let mut config = AuthConfig::with_secret(TEST_JWT_SECRET);
        config.access_token_ttl_secs = -3600;
        let service = JwtService::from_config(&config);
        let token = service
            .issue_access_token(Uuid::new_v4(), "a@example.com", Role::User)
            .unwrap();

        assert!(matches!(
            service.decode_access_token(&token.token),
            Err(AuthError::TokenExpired)
        ));
    }
}
