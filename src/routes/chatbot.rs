//! Help chat endpoints and the admin view of chat transcripts.

use crate::auth::{MaybeUser, RequireAdmin};
use crate::chatbot::{ChatContext, ChatbotClient};
use crate::error::ApiError;
use crate::models::{ChatbotLog, ChatbotLogWithRole, PaginatedResponse};
use crate::routes::admin::ListQuery;
use crate::routes::helpers::require_text;
use crate::routes::params::ListParams;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State, get, post, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSION_HEADER: &str = "X-Session-Id";

const LOG_LIST: ListQuery = ListQuery {
    columns: "l.id, l.user_id, l.session_id, l.user_message, l.bot_reply, l.created_at, u.role AS user_role",
    from: "chatbot_logs l LEFT JOIN users u ON u.id = l.user_id",
    filter: "(l.user_message ILIKE $1 OR l.bot_reply ILIKE $1 OR l.session_id ILIKE $1)",
    order: "l.created_at DESC, l.id",
};

/// Session id supplied through the `X-Session-Id` header, if any.
#[derive(Debug, Clone)]
pub struct SessionHeader(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionHeader {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let session = request
            .headers()
            .get_one(SESSION_HEADER)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Outcome::Success(SessionHeader(session))
    }
}

impl<'r> OpenApiFromRequest<'r> for SessionHeader {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
    pub log: ChatbotLog,
}

/// Body session first, then the header, otherwise a fresh one.
fn resolve_session(body: Option<&str>, header: Option<&str>) -> String {
    body.map(str::trim)
        .filter(|value| !value.is_empty())
        .or(header)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Answer a learner question and keep the exchange for review.
#[openapi(tag = "Chatbot")]
#[post("/chatbot/message", data = "<request>")]
pub async fn send_message(
    user: MaybeUser,
    session: SessionHeader,
    request: Json<ChatRequest>,
    chatbot: &State<ChatbotClient>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = require_text(&request.message, "message")?;
    let session_id = resolve_session(request.session_id.as_deref(), session.0.as_deref());

    let reply = chatbot.reply(message, request.context.as_ref()).await;

    let log: ChatbotLog = sqlx::query_as(
        r#"INSERT INTO chatbot_logs (user_id, session_id, user_message, bot_reply)
           VALUES ($1, $2, $3, $4)
           RETURNING id, user_id, session_id, user_message, bot_reply, created_at"#,
    )
    .bind(user.0.as_ref().map(|user| user.id))
    .bind(&session_id)
    .bind(message)
    .bind(&reply)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(ChatResponse {
        reply,
        session_id,
        log,
    }))
}

/// Chat transcripts, newest first, with the sender's role when signed in.
#[openapi(tag = "Chatbot")]
#[get("/chatbot/logs?<params..>")]
pub async fn list_logs(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<ChatbotLogWithRole>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(LOG_LIST.fetch(pool.inner(), &params).await?))
}
