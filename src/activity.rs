//! Learner activity tracking for the practice flow.
//!
//! [`ActivityLogger`] records one `user_activity` row per request under the
//! practice prefix. Recording is best-effort: failures are logged and never
//! change the response.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Method;
use rocket::{Request, Response};
use rocket_db_pools::sqlx::{self, PgPool, types::Json};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::auth::AuthState;
use crate::auth::guards::verified_claims;

pub const PRACTICE_PREFIX: &str = "/api/v1/practice";

/// Classify a practice request by method and path relative to [`PRACTICE_PREFIX`].
pub fn resolve_activity_type(method: Method, path: &str) -> &'static str {
    if method != Method::Get {
        return "practice_request";
    }
    if path.starts_with("/subjects") {
        "view_subjects"
    } else if path.contains("/topics") && path.contains("/demo-code") {
        "demo_code"
    } else if path.contains("/topics") {
        "view_topics"
    } else if path.contains("/questions") {
        "start_practice"
    } else {
        "practice_request"
    }
}

/// Insert one activity row.
pub async fn record_activity(
    pool: &PgPool,
    user_id: Option<Uuid>,
    activity_type: &str,
    page: &str,
    details: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_activity (user_id, activity_type, page, details) VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(activity_type)
    .bind(page)
    .bind(Json(details))
    .execute(pool)
    .await?;
    Ok(())
}

pub struct ActivityLogger;

#[rocket::async_trait]
impl Fairing for ActivityLogger {
    fn info(&self) -> Info {
        Info {
            name: "Practice Activity Logger",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let path = request.uri().path();
        let Some(relative) = path.as_str().strip_prefix(PRACTICE_PREFIX) else {
            return;
        };
        let Some(pool) = request.rocket().state::<PgPool>() else {
            log::warn!("activity logging skipped: database pool not managed");
            return;
        };

        // Token problems only make the entry anonymous.
        let user_id = request
            .rocket()
            .state::<AuthState>()
            .and_then(|auth| verified_claims(request, auth).ok())
            .and_then(|claims| claims.user_id().ok());

        let activity_type = resolve_activity_type(request.method(), relative);
        let query: Map<String, Value> = request
            .uri()
            .query()
            .map(|query| {
                query
                    .segments()
                    .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let details = json!({
            "method": request.method().as_str(),
            "query": query,
            "status": response.status().code,
        });

        let page = request.uri().to_string();
        if let Err(err) = record_activity(pool, user_id, activity_type, &page, &details).await {
            log::warn!("failed to log activity for {}: {}", page, err);
        }
    }
}
