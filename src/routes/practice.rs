//! Practice flow: subject and topic pickers, demo-code gating and question sets.
//!
//! Every request under `/practice` is also recorded by the activity fairing.

use crate::error::ApiError;
use crate::models::{DataResponse, Question, Subject, Topic};
use crate::routes::catalog::{QUESTION_COLUMNS, fetch_subject_topics, fetch_subjects};
use crate::routes::params::PracticeQuestionParams;
use rocket::{State, get, post, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoCodeResponse {
    pub demo_code: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VerifyDemoCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VerifyDemoCodeResponse {
    pub valid: bool,
}

#[openapi(tag = "Practice")]
#[get("/practice/subjects")]
pub async fn practice_subjects(
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Subject>>>, ApiError> {
    Ok(Json(DataResponse {
        data: fetch_subjects(pool.inner()).await?,
    }))
}

#[openapi(tag = "Practice")]
#[get("/practice/subjects/<subject_id>/topics")]
pub async fn practice_topics(
    subject_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Topic>>>, ApiError> {
    Ok(Json(DataResponse {
        data: fetch_subject_topics(pool.inner(), subject_id).await?,
    }))
}

/// Current demo code for a topic.
#[openapi(tag = "Practice")]
#[get("/practice/topics/<topic_id>/demo-code")]
pub async fn demo_code(
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DemoCodeResponse>, ApiError> {
    fetch_demo_code(pool.inner(), topic_id)
        .await?
        .map(|demo_code| Json(DemoCodeResponse { demo_code }))
        .ok_or_else(|| ApiError::NotFound("Demo code not found".to_string()))
}

/// Check a learner-supplied code against the topic's demo code.
#[openapi(tag = "Practice")]
#[post("/practice/topics/<topic_id>/demo-code/verify", data = "<request>")]
pub async fn verify_demo_code(
    topic_id: i32,
    request: Json<VerifyDemoCodeRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<VerifyDemoCodeResponse>, ApiError> {
    let expected = fetch_demo_code(pool.inner(), topic_id).await?;
    Ok(Json(VerifyDemoCodeResponse {
        valid: code_matches(expected.as_deref(), &request.code),
    }))
}

/// Questions for one subject/topic pair.
#[openapi(tag = "Practice")]
#[get("/practice/questions?<params..>")]
pub async fn practice_questions(
    params: Option<PracticeQuestionParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Question>>>, ApiError> {
    let params = params.unwrap_or_default();
    let (Some(subject_id), Some(topic_id)) = (params.subject_id, params.topic_id) else {
        return Err(ApiError::BadRequest(
            "subjectId and topicId are required".to_string(),
        ));
    };

    let questions: Vec<Question> = sqlx::query_as(&format!(
        r#"SELECT {QUESTION_COLUMNS}
           FROM questions
           WHERE subject_id = $1 AND topic_id = $2
           ORDER BY id"#
    ))
    .bind(subject_id)
    .bind(topic_id)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse { data: questions }))
}

async fn fetch_demo_code(pool: &sqlx::PgPool, topic_id: i32) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT demo_code FROM demo_codes WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_optional(pool)
        .await
}

fn code_matches(expected: Option<&str>, supplied: &str) -> bool {
    let supplied = supplied.trim();
    matches!(expected, Some(code) if !supplied.is_empty() && code == supplied)
}
