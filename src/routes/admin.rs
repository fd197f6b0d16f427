//! Admin back office: CRUD over the exam catalog and the question bank.
//!
//! Every handler requires an admin bearer token. Listings share one paginated
//! query shape with an optional case-insensitive `q` filter; writes map
//! foreign-key and uniqueness violations through [`ApiError`]'s `sqlx` conversion.

use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::models::{AtomicTopic, DemoCode, Exam, PaginatedResponse, Question, Subject, Topic};
use crate::routes::catalog::{EXAM_COLUMNS, QUESTION_COLUMNS};
use crate::routes::helpers::{ensure_affected, generate_demo_code, require_text};
use crate::routes::params::ListParams;
use rocket::response::status;
use rocket::{State, delete, get, post, put, serde::json::Json};
use rocket_db_pools::sqlx::{self, postgres::PgRow};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_VALIDITY_DAYS: i32 = 30;

/// Shape of one admin listing. `filter` may reference the `ILIKE` pattern as `$1`.
pub(crate) struct ListQuery {
    pub columns: &'static str,
    pub from: &'static str,
    pub filter: &'static str,
    pub order: &'static str,
}

impl ListQuery {
    /// Fetch one page and the total count concurrently.
    pub(crate) async fn fetch<T>(
        &self,
        pool: &sqlx::PgPool,
        params: &ListParams,
    ) -> Result<PaginatedResponse<T>, ApiError>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        let pattern = params.like_pattern();
        let page_sql = format!(
            "SELECT {} FROM {} WHERE ($1::text IS NULL OR {}) ORDER BY {} LIMIT $2 OFFSET $3",
            self.columns, self.from, self.filter, self.order
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::text IS NULL OR {})",
            self.from, self.filter
        );

        let (rows, total) = tokio::try_join!(
            sqlx::query_as::<_, T>(&page_sql)
                .bind(pattern.as_deref())
                .bind(params.size())
                .bind(params.offset())
                .fetch_all(pool),
            sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(pattern.as_deref())
                .fetch_one(pool),
        )?;

        Ok(PaginatedResponse::new(
            rows,
            params.page(),
            params.size(),
            total,
        ))
    }
}

const EXAM_LIST: ListQuery = ListQuery {
    columns: EXAM_COLUMNS,
    from: "exams",
    filter: "(title ILIKE $1 OR category ILIKE $1)",
    order: "id",
};

const SUBJECT_LIST: ListQuery = ListQuery {
    columns: "subject_id, name, description",
    from: "subjects",
    filter: "name ILIKE $1",
    order: "subject_id",
};

const TOPIC_LIST: ListQuery = ListQuery {
    columns: "topic_id, subject_id, name, description",
    from: "topics",
    filter: "name ILIKE $1",
    order: "topic_id",
};

const ATOMIC_TOPIC_LIST: ListQuery = ListQuery {
    columns: "atomic_topic_id, topic_id, name, description",
    from: "atomic_topics",
    filter: "name ILIKE $1",
    order: "atomic_topic_id",
};

const QUESTION_LIST: ListQuery = ListQuery {
    columns: QUESTION_COLUMNS,
    from: "questions",
    filter: "text ILIKE $1",
    order: "id",
};

const DEMO_CODE_LIST: ListQuery = ListQuery {
    columns: "topic_id, demo_code, created_at",
    from: "demo_codes",
    filter: "demo_code ILIKE $1",
    order: "topic_id",
};

// ===== Request bodies =====

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamInput {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<i32>,
    #[serde(default)]
    pub validity_days: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SubjectInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicInput {
    pub subject_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AtomicTopicInput {
    pub topic_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub subject_id: i32,
    pub topic_id: i32,
    #[serde(default)]
    pub atomic_topic_id: Option<i32>,
    pub text: String,
    /// Object keyed by option letter.
    pub options: Value,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub is_demo: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoCodeInput {
    pub topic_id: i32,
    /// Generated when omitted or blank.
    #[serde(default)]
    pub demo_code: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoCodeUpdate {
    /// Regenerated when omitted or blank.
    #[serde(default)]
    pub demo_code: Option<String>,
}

impl ExamInput {
    fn validated(&self) -> Result<(&str, i32, i32), ApiError> {
        let title = require_text(&self.title, "title")?;
        let price = self.price.unwrap_or(0);
        if price < 0 {
            return Err(ApiError::BadRequest("price must not be negative".to_string()));
        }
        let validity_days = self.validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS);
        if validity_days <= 0 {
            return Err(ApiError::BadRequest(
                "validityDays must be positive".to_string(),
            ));
        }
        Ok((title, price, validity_days))
    }
}

impl QuestionInput {
    fn validate(&self) -> Result<(), ApiError> {
        require_text(&self.text, "text")?;
        require_text(&self.correct_answer, "correctAnswer")?;
        if !self.options.is_object() {
            return Err(ApiError::BadRequest(
                "options must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_demo_code(supplied: Option<&str>) -> String {
    supplied
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_demo_code)
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

// ===== Exams =====

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/exams?<params..>")]
pub async fn list_exams(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Exam>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(EXAM_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/exams/<exam_id>")]
pub async fn get_exam(
    _admin: RequireAdmin,
    exam_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Exam>, ApiError> {
    sqlx::query_as(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
        .bind(exam_id)
        .fetch_optional(pool.inner())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Exam {exam_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[post("/admin/exams", data = "<request>")]
pub async fn create_exam(
    _admin: RequireAdmin,
    request: Json<ExamInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<Exam>>, ApiError> {
    let (title, price, validity_days) = request.validated()?;

    let exam: Exam = sqlx::query_as(&format!(
        r#"INSERT INTO exams (title, category, price, validity_days, description)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING {EXAM_COLUMNS}"#
    ))
    .bind(title)
    .bind(trimmed(request.category.as_deref()))
    .bind(price)
    .bind(validity_days)
    .bind(trimmed(request.description.as_deref()))
    .fetch_one(pool.inner())
    .await?;

    Ok(status::Created::new(format!("/api/v1/admin/exams/{}", exam.id)).body(Json(exam)))
}

#[openapi(tag = "Admin - Catalog")]
#[put("/admin/exams/<exam_id>", data = "<request>")]
pub async fn update_exam(
    _admin: RequireAdmin,
    exam_id: i32,
    request: Json<ExamInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Exam>, ApiError> {
    let (title, price, validity_days) = request.validated()?;

    sqlx::query_as(&format!(
        r#"UPDATE exams
           SET title = $2, category = $3, price = $4, validity_days = $5, description = $6
           WHERE id = $1
           RETURNING {EXAM_COLUMNS}"#
    ))
    .bind(exam_id)
    .bind(title)
    .bind(trimmed(request.category.as_deref()))
    .bind(price)
    .bind(validity_days)
    .bind(trimmed(request.description.as_deref()))
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Exam {exam_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[delete("/admin/exams/<exam_id>")]
pub async fn delete_exam(
    _admin: RequireAdmin,
    exam_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(exam_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Exam", exam_id)?;
    Ok(status::NoContent)
}

// ===== Subjects =====

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/subjects?<params..>")]
pub async fn list_subjects(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Subject>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(SUBJECT_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/subjects/<subject_id>")]
pub async fn get_subject(
    _admin: RequireAdmin,
    subject_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Subject>, ApiError> {
    sqlx::query_as("SELECT subject_id, name, description FROM subjects WHERE subject_id = $1")
        .bind(subject_id)
        .fetch_optional(pool.inner())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Subject {subject_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[post("/admin/subjects", data = "<request>")]
pub async fn create_subject(
    _admin: RequireAdmin,
    request: Json<SubjectInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<Subject>>, ApiError> {
    let name = require_text(&request.name, "name")?;

    let subject: Subject = sqlx::query_as(
        r#"INSERT INTO subjects (name, description)
           VALUES ($1, $2)
           RETURNING subject_id, name, description"#,
    )
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_one(pool.inner())
    .await?;

    Ok(
        status::Created::new(format!("/api/v1/admin/subjects/{}", subject.subject_id))
            .body(Json(subject)),
    )
}

#[openapi(tag = "Admin - Catalog")]
#[put("/admin/subjects/<subject_id>", data = "<request>")]
pub async fn update_subject(
    _admin: RequireAdmin,
    subject_id: i32,
    request: Json<SubjectInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Subject>, ApiError> {
    let name = require_text(&request.name, "name")?;

    sqlx::query_as(
        r#"UPDATE subjects SET name = $2, description = $3
           WHERE subject_id = $1
           RETURNING subject_id, name, description"#,
    )
    .bind(subject_id)
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Subject {subject_id} not found")))
}

/// Delete a subject together with its topics and questions.
#[openapi(tag = "Admin - Catalog")]
#[delete("/admin/subjects/<subject_id>")]
pub async fn delete_subject(
    _admin: RequireAdmin,
    subject_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM subjects WHERE subject_id = $1")
        .bind(subject_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Subject", subject_id)?;
    Ok(status::NoContent)
}

// ===== Topics =====

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/topics?<params..>")]
pub async fn list_topics(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Topic>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(TOPIC_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/topics/<topic_id>")]
pub async fn get_topic(
    _admin: RequireAdmin,
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Topic>, ApiError> {
    sqlx::query_as("SELECT topic_id, subject_id, name, description FROM topics WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_optional(pool.inner())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Topic {topic_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[post("/admin/topics", data = "<request>")]
pub async fn create_topic(
    _admin: RequireAdmin,
    request: Json<TopicInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<Topic>>, ApiError> {
    let name = require_text(&request.name, "name")?;

    let topic: Topic = sqlx::query_as(
        r#"INSERT INTO topics (subject_id, name, description)
           VALUES ($1, $2, $3)
           RETURNING topic_id, subject_id, name, description"#,
    )
    .bind(request.subject_id)
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_one(pool.inner())
    .await?;

    Ok(status::Created::new(format!("/api/v1/admin/topics/{}", topic.topic_id)).body(Json(topic)))
}

#[openapi(tag = "Admin - Catalog")]
#[put("/admin/topics/<topic_id>", data = "<request>")]
pub async fn update_topic(
    _admin: RequireAdmin,
    topic_id: i32,
    request: Json<TopicInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Topic>, ApiError> {
    let name = require_text(&request.name, "name")?;

    sqlx::query_as(
        r#"UPDATE topics SET subject_id = $2, name = $3, description = $4
           WHERE topic_id = $1
           RETURNING topic_id, subject_id, name, description"#,
    )
    .bind(topic_id)
    .bind(request.subject_id)
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Topic {topic_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[delete("/admin/topics/<topic_id>")]
pub async fn delete_topic(
    _admin: RequireAdmin,
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM topics WHERE topic_id = $1")
        .bind(topic_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Topic", topic_id)?;
    Ok(status::NoContent)
}

// ===== Atomic topics =====

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/atomic-topics?<params..>")]
pub async fn list_atomic_topics(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<AtomicTopic>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(ATOMIC_TOPIC_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Catalog")]
#[get("/admin/atomic-topics/<atomic_topic_id>")]
pub async fn get_atomic_topic(
    _admin: RequireAdmin,
    atomic_topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<AtomicTopic>, ApiError> {
    sqlx::query_as(
        r#"SELECT atomic_topic_id, topic_id, name, description
           FROM atomic_topics WHERE atomic_topic_id = $1"#,
    )
    .bind(atomic_topic_id)
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Atomic topic {atomic_topic_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[post("/admin/atomic-topics", data = "<request>")]
pub async fn create_atomic_topic(
    _admin: RequireAdmin,
    request: Json<AtomicTopicInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<AtomicTopic>>, ApiError> {
    let name = require_text(&request.name, "name")?;

    let atomic_topic: AtomicTopic = sqlx::query_as(
        r#"INSERT INTO atomic_topics (topic_id, name, description)
           VALUES ($1, $2, $3)
           RETURNING atomic_topic_id, topic_id, name, description"#,
    )
    .bind(request.topic_id)
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_one(pool.inner())
    .await?;

    Ok(status::Created::new(format!(
        "/api/v1/admin/atomic-topics/{}",
        atomic_topic.atomic_topic_id
    ))
    .body(Json(atomic_topic)))
}

#[openapi(tag = "Admin - Catalog")]
#[put("/admin/atomic-topics/<atomic_topic_id>", data = "<request>")]
pub async fn update_atomic_topic(
    _admin: RequireAdmin,
    atomic_topic_id: i32,
    request: Json<AtomicTopicInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<AtomicTopic>, ApiError> {
    let name = require_text(&request.name, "name")?;

    sqlx::query_as(
        r#"UPDATE atomic_topics SET topic_id = $2, name = $3, description = $4
           WHERE atomic_topic_id = $1
           RETURNING atomic_topic_id, topic_id, name, description"#,
    )
    .bind(atomic_topic_id)
    .bind(request.topic_id)
    .bind(name)
    .bind(trimmed(request.description.as_deref()))
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Atomic topic {atomic_topic_id} not found")))
}

#[openapi(tag = "Admin - Catalog")]
#[delete("/admin/atomic-topics/<atomic_topic_id>")]
pub async fn delete_atomic_topic(
    _admin: RequireAdmin,
    atomic_topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM atomic_topics WHERE atomic_topic_id = $1")
        .bind(atomic_topic_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Atomic topic", atomic_topic_id)?;
    Ok(status::NoContent)
}

// ===== Questions =====

#[openapi(tag = "Admin - Questions")]
#[get("/admin/questions?<params..>")]
pub async fn list_questions(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Question>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(QUESTION_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Questions")]
#[get("/admin/questions/<question_id>")]
pub async fn get_question(
    _admin: RequireAdmin,
    question_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Question>, ApiError> {
    sqlx::query_as(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(question_id)
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Question {question_id} not found")))
}

#[openapi(tag = "Admin - Questions")]
#[post("/admin/questions", data = "<request>")]
pub async fn create_question(
    _admin: RequireAdmin,
    request: Json<QuestionInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<Question>>, ApiError> {
    request.validate()?;

    let question: Question = sqlx::query_as(&format!(
        r#"INSERT INTO questions
           (subject_id, topic_id, atomic_topic_id, text, options, correct_answer,
            explanation, difficulty, is_demo)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           RETURNING {QUESTION_COLUMNS}"#
    ))
    .bind(request.subject_id)
    .bind(request.topic_id)
    .bind(request.atomic_topic_id)
    .bind(request.text.trim())
    .bind(sqlx::types::Json(&request.options))
    .bind(request.correct_answer.trim())
    .bind(trimmed(request.explanation.as_deref()))
    .bind(trimmed(request.difficulty.as_deref()))
    .bind(request.is_demo)
    .fetch_one(pool.inner())
    .await?;

    Ok(
        status::Created::new(format!("/api/v1/admin/questions/{}", question.id))
            .body(Json(question)),
    )
}

#[openapi(tag = "Admin - Questions")]
#[put("/admin/questions/<question_id>", data = "<request>")]
pub async fn update_question(
    _admin: RequireAdmin,
    question_id: i32,
    request: Json<QuestionInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<Question>, ApiError> {
    request.validate()?;

    sqlx::query_as(&format!(
        r#"UPDATE questions
           SET subject_id = $2, topic_id = $3, atomic_topic_id = $4, text = $5,
               options = $6, correct_answer = $7, explanation = $8, difficulty = $9,
               is_demo = $10
           WHERE id = $1
           RETURNING {QUESTION_COLUMNS}"#
    ))
    .bind(question_id)
    .bind(request.subject_id)
    .bind(request.topic_id)
    .bind(request.atomic_topic_id)
    .bind(request.text.trim())
    .bind(sqlx::types::Json(&request.options))
    .bind(request.correct_answer.trim())
    .bind(trimmed(request.explanation.as_deref()))
    .bind(trimmed(request.difficulty.as_deref()))
    .bind(request.is_demo)
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Question {question_id} not found")))
}

#[openapi(tag = "Admin - Questions")]
#[delete("/admin/questions/<question_id>")]
pub async fn delete_question(
    _admin: RequireAdmin,
    question_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Question", question_id)?;
    Ok(status::NoContent)
}

// ===== Demo codes =====

#[openapi(tag = "Admin - Questions")]
#[get("/admin/demo-codes?<params..>")]
pub async fn list_demo_codes(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<DemoCode>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(DEMO_CODE_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Questions")]
#[get("/admin/demo-codes/<topic_id>")]
pub async fn get_demo_code(
    _admin: RequireAdmin,
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DemoCode>, ApiError> {
    sqlx::query_as("SELECT topic_id, demo_code, created_at FROM demo_codes WHERE topic_id = $1")
        .bind(topic_id)
        .fetch_optional(pool.inner())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Demo code for topic {topic_id} not found")))
}

/// Assign a demo code to a topic; one code per topic.
#[openapi(tag = "Admin - Questions")]
#[post("/admin/demo-codes", data = "<request>")]
pub async fn create_demo_code(
    _admin: RequireAdmin,
    request: Json<DemoCodeInput>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Created<Json<DemoCode>>, ApiError> {
    let code = resolve_demo_code(request.demo_code.as_deref());

    let demo_code: DemoCode = sqlx::query_as(
        r#"INSERT INTO demo_codes (topic_id, demo_code)
           VALUES ($1, $2)
           RETURNING topic_id, demo_code, created_at"#,
    )
    .bind(request.topic_id)
    .bind(&code)
    .fetch_one(pool.inner())
    .await?;

    Ok(
        status::Created::new(format!("/api/v1/admin/demo-codes/{}", demo_code.topic_id))
            .body(Json(demo_code)),
    )
}

#[openapi(tag = "Admin - Questions")]
#[put("/admin/demo-codes/<topic_id>", data = "<request>")]
pub async fn update_demo_code(
    _admin: RequireAdmin,
    topic_id: i32,
    request: Option<Json<DemoCodeUpdate>>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DemoCode>, ApiError> {
    let payload = request.map(|json| json.into_inner()).unwrap_or_default();
    let code = resolve_demo_code(payload.demo_code.as_deref());

    sqlx::query_as(
        r#"UPDATE demo_codes SET demo_code = $2
           WHERE topic_id = $1
           RETURNING topic_id, demo_code, created_at"#,
    )
    .bind(topic_id)
    .bind(&code)
    .fetch_optional(pool.inner())
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("Demo code for topic {topic_id} not found")))
}

#[openapi(tag = "Admin - Questions")]
#[delete("/admin/demo-codes/<topic_id>")]
pub async fn delete_demo_code(
    _admin: RequireAdmin,
    topic_id: i32,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    let result = sqlx::query("DELETE FROM demo_codes WHERE topic_id = $1")
        .bind(topic_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "Demo code for topic", topic_id)?;
    Ok(status::NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_demo_code_is_generated() {
        assert_eq!(resolve_demo_code(Some(" DEMOAB12 ")), "DEMOAB12");
        assert!(resolve_demo_code(Some("  ")).starts_with("DEMO"));
        assert!(resolve_demo_code(None).starts_with("DEMO"));
    }

    #[test]
    fn exam_defaults_and_bounds() {
        let input = ExamInput {
            title: " AWS SAA ".into(),
            category: None,
            price: None,
            validity_days: None,
            description: None,
        };
        assert_eq!(input.validated().unwrap(), ("AWS SAA", 0, 30));

        let negative = ExamInput {
            price: Some(-1),
            ..input
        };
        assert!(matches!(negative.validated(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn question_options_must_be_an_object() {
        let input = QuestionInput {
            subject_id: 1,
            topic_id: 1,
            atomic_topic_id: None,
            text: "2+2?".into(),
            options: serde_json::json!(["3", "4"]),
            correct_answer: "b".into(),
            explanation: None,
            difficulty: None,
            is_demo: false,
        };
        assert!(matches!(input.validate(), Err(ApiError::BadRequest(msg)) if msg.contains("options")));

        let valid = QuestionInput {
            options: serde_json::json!({"a": "3", "b": "4"}),
            ..input
        };
        assert!(valid.validate().is_ok());
    }
}
