use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_db_pools::sqlx;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    DatabaseError(sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => Status::InternalServerError,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Conflict(_) => Status::Conflict,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::DatabaseError(_) => "DatabaseError",
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InternalError(_) => "InternalError",
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        match &self {
            ApiError::DatabaseError(e) => log::error!("database error: {}", e),
            ApiError::InternalError(msg) => log::error!("internal error: {}", msg),
            other => log::debug!("{}: {}", other.kind(), other),
        }

        // Storage details stay in the log.
        let message = match &self {
            ApiError::DatabaseError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let error_response = ErrorResponse {
            error: self.kind().to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => ApiError::Conflict(db_err.message().to_string()),
                Some(FOREIGN_KEY_VIOLATION) => ApiError::BadRequest(db_err.message().to_string()),
                _ => ApiError::DatabaseError(err),
            },
            _ => ApiError::DatabaseError(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.to_string(), "Resource not found");
    }

    #[test]
    fn pool_failures_are_internal() {
        let err = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.kind(), "DatabaseError");
    }

    #[test]
    fn conflict_is_409() {
        assert_eq!(
            ApiError::Conflict("exists".into()).status(),
            Status::Conflict
        );
    }
}
