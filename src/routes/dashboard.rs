//! Learner dashboard: answer capture, progress analytics and exam subscriptions.

use crate::auth::{AuthUser, MaybeUser};
use crate::error::ApiError;
use crate::models::{DataResponse, ResponseHistoryEntry, Subscription, TopicPerformance};
use chrono::{DateTime, Utc};
use rocket::{State, get, post, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

const DEFAULT_SUBSCRIPTION_DAYS: i32 = 30;
const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: i32,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub message: String,
    /// Present only when the answer was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[serde(default)]
    pub duration_days: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    pub subscription_id: i32,
    #[serde(default)]
    pub extend_days: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Record an answer. Anonymous learners keep their answers client side.
#[openapi(tag = "Dashboard")]
#[post("/questions/response", data = "<request>")]
pub async fn submit_response(
    user: MaybeUser,
    request: Json<AnswerRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Some(user) = user.0 else {
        return Ok(Json(AnswerResponse {
            message: "Response captured locally".to_string(),
            is_correct: None,
        }));
    };

    let correct_answer: String =
        sqlx::query_scalar("SELECT correct_answer FROM questions WHERE id = $1")
            .bind(request.question_id)
            .fetch_optional(pool.inner())
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Question {} not found", request.question_id))
            })?;

    let is_correct = answers_match(&correct_answer, &request.answer);

    sqlx::query(
        r#"INSERT INTO user_responses (user_id, question_id, user_answer, is_correct)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(user.id)
    .bind(request.question_id)
    .bind(request.answer.trim())
    .bind(is_correct)
    .execute(pool.inner())
    .await?;

    Ok(Json(AnswerResponse {
        message: "Response recorded".to_string(),
        is_correct: Some(is_correct),
    }))
}

/// Per-topic answer totals for the current user.
#[openapi(tag = "Dashboard")]
#[get("/analytics/me")]
pub async fn my_analytics(
    user: AuthUser,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<TopicPerformance>>>, ApiError> {
    let performance: Vec<TopicPerformance> = sqlx::query_as(
        r#"SELECT q.topic_id,
                  COUNT(*) AS total,
                  COUNT(*) FILTER (WHERE r.is_correct) AS correct
           FROM user_responses r
           JOIN questions q ON q.id = r.question_id
           WHERE r.user_id = $1
           GROUP BY q.topic_id
           ORDER BY q.topic_id"#,
    )
    .bind(user.id)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse { data: performance }))
}

#[openapi(tag = "Dashboard")]
#[get("/analytics/me/history")]
pub async fn my_history(
    user: AuthUser,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<ResponseHistoryEntry>>>, ApiError> {
    let history: Vec<ResponseHistoryEntry> = sqlx::query_as(
        r#"SELECT question_id, user_answer, is_correct, created_at
           FROM user_responses
           WHERE user_id = $1
           ORDER BY created_at DESC, id DESC
           LIMIT $2"#,
    )
    .bind(user.id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse { data: history }))
}

#[openapi(tag = "Dashboard")]
#[get("/subscriptions/me")]
pub async fn my_subscriptions(
    user: AuthUser,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Subscription>>>, ApiError> {
    let subscriptions: Vec<Subscription> = sqlx::query_as(
        r#"SELECT s.id, s.exam_id, e.title AS exam_title, s.expires_at
           FROM subscriptions s
           JOIN exams e ON e.id = s.exam_id
           WHERE s.user_id = $1
           ORDER BY s.expires_at DESC"#,
    )
    .bind(user.id)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse {
        data: subscriptions,
    }))
}

/// Start a subscription to an exam, 30 days unless `durationDays` says otherwise.
#[openapi(tag = "Dashboard")]
#[post("/exams/<exam_id>/subscribe", data = "<request>")]
pub async fn subscribe(
    exam_id: i32,
    user: AuthUser,
    request: Option<Json<SubscribeRequest>>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let payload = request.map(|json| json.into_inner()).unwrap_or_default();
    let days = positive_days(payload.duration_days, "durationDays")?;

    let exam_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exams WHERE id = $1)")
        .bind(exam_id)
        .fetch_one(pool.inner())
        .await?;
    if !exam_exists {
        return Err(ApiError::NotFound(format!("Exam {exam_id} not found")));
    }

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"INSERT INTO subscriptions (user_id, exam_id, expires_at)
           VALUES ($1, $2, now() + make_interval(days => $3))
           RETURNING expires_at"#,
    )
    .bind(user.id)
    .bind(exam_id)
    .bind(days)
    .fetch_one(pool.inner())
    .await?;

    log::info!("user {} subscribed to exam {} for {} days", user.id, exam_id, days);

    Ok(Json(SubscriptionResponse {
        message: "Subscription activated".to_string(),
        expires_at,
    }))
}

/// Extend one of the caller's subscriptions. Lapsed subscriptions restart from now.
#[openapi(tag = "Dashboard")]
#[post("/subscriptions/renew", data = "<request>")]
pub async fn renew_subscription(
    user: AuthUser,
    request: Json<RenewRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let days = positive_days(request.extend_days, "extendDays")?;

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        r#"UPDATE subscriptions
           SET expires_at = GREATEST(expires_at, now()) + make_interval(days => $3)
           WHERE id = $1 AND user_id = $2
           RETURNING expires_at"#,
    )
    .bind(request.subscription_id)
    .bind(user.id)
    .bind(days)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!("Subscription {} not found", request.subscription_id))
    })?;

    Ok(Json(SubscriptionResponse {
        message: "Subscription renewed".to_string(),
        expires_at,
    }))
}

fn answers_match(correct: &str, supplied: &str) -> bool {
    correct.trim().eq_ignore_ascii_case(supplied.trim())
}

fn positive_days(days: Option<i32>, field: &str) -> Result<i32, ApiError> {
    match days {
        None => Ok(DEFAULT_SUBSCRIPTION_DAYS),
        Some(days) if days > 0 => Ok(days),
        Some(_) => Err(ApiError::BadRequest(format!("{field} must be positive"))),
    }
}
