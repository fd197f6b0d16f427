//! Public, read-only catalog of exams and the practice question bank.

use crate::error::ApiError;
use crate::models::{AtomicTopic, DataResponse, Exam, Question, Subject, Topic, TopicDetail};
use crate::routes::params::TopicQuestionParams;
use rocket::{State, get, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::openapi;

pub(crate) const EXAM_COLUMNS: &str =
    "id, title, category, price, validity_days, description, created_at";
pub(crate) const QUESTION_COLUMNS: &str = "id, subject_id, topic_id, atomic_topic_id, text, options, \
     correct_answer, explanation, difficulty, is_demo";

/// List every exam, alphabetically.
#[openapi(tag = "Catalog")]
#[get("/exams")]
pub async fn list_exams(
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Exam>>>, ApiError> {
    let exams: Vec<Exam> =
        sqlx::query_as(&format!("SELECT {EXAM_COLUMNS} FROM exams ORDER BY title ASC, id ASC"))
            .fetch_all(pool.inner())
            .await?;

    Ok(Json(DataResponse { data: exams }))
}

#[openapi(tag = "Catalog")]
#[get("/exams/<exam_id>")]
pub async fn get_exam(exam_id: i32, pool: &State<sqlx::PgPool>) -> Result<Json<Exam>, ApiError> {
    sqlx::query_as(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
        .bind(exam_id)
        .fetch_optional(pool.inner())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Exam {exam_id} not found")))
}

#[openapi(tag = "Catalog")]
#[get("/subjects")]
pub async fn list_subjects(
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Subject>>>, ApiError> {
    Ok(Json(DataResponse {
        data: fetch_subjects(pool.inner()).await?,
    }))
}

#[openapi(tag = "Catalog")]
#[get("/subjects/<subject_id>/topics")]
pub async fn list_subject_topics(
    subject_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Topic>>>, ApiError> {
    Ok(Json(DataResponse {
        data: fetch_subject_topics(pool.inner(), subject_id).await?,
    }))
}

/// Topic with the name of its subject.
#[openapi(tag = "Catalog")]
#[get("/topics/<topic_id>")]
pub async fn get_topic(
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<TopicDetail>, ApiError> {
    sqlx::query_as(
        r#"SELECT t.topic_id, t.subject_id, t.name, t.description, s.name AS subject_name
           FROM topics t
           JOIN subjects s ON s.subject_id = t.subject_id
           WHERE t.topic_id = $1"#,
    )
    .bind(topic_id)
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Topic {topic_id} not found")))
}

#[openapi(tag = "Catalog")]
#[get("/topics/<topic_id>/atomic-topics")]
pub async fn list_atomic_topics(
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<AtomicTopic>>>, ApiError> {
    let atomic_topics: Vec<AtomicTopic> = sqlx::query_as(
        r#"SELECT atomic_topic_id, topic_id, name, description
           FROM atomic_topics
           WHERE topic_id = $1
           ORDER BY atomic_topic_id"#,
    )
    .bind(topic_id)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse {
        data: atomic_topics,
    }))
}

/// Questions of a topic, optionally restricted to demo questions and capped by `limit`.
#[openapi(tag = "Catalog")]
#[get("/topics/<topic_id>/questions?<params..>")]
pub async fn list_topic_questions(
    topic_id: i32,
    params: Option<TopicQuestionParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Vec<Question>>>, ApiError> {
    let params = params.unwrap_or_default();

    let questions: Vec<Question> = sqlx::query_as(&format!(
        r#"SELECT {QUESTION_COLUMNS}
           FROM questions
           WHERE topic_id = $1
             AND (NOT $2 OR is_demo)
           ORDER BY id
           LIMIT $3"#
    ))
    .bind(topic_id)
    .bind(params.demo_only())
    .bind(params.limit())
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(DataResponse { data: questions }))
}

pub(crate) async fn fetch_subjects(pool: &sqlx::PgPool) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as("SELECT subject_id, name, description FROM subjects ORDER BY subject_id")
        .fetch_all(pool)
        .await
}

pub(crate) async fn fetch_subject_topics(
    pool: &sqlx::PgPool,
    subject_id: i32,
) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT topic_id, subject_id, name, description
           FROM topics
           WHERE subject_id = $1
           ORDER BY topic_id"#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await
}
