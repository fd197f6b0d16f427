//! Admin endpoints for accounts, the activity log and platform statistics.

use crate::auth::{RequireAdmin, Role};
use crate::error::ApiError;
use crate::models::{ActivityEntry, PaginatedResponse, UserRecord};
use crate::routes::admin::ListQuery;
use crate::routes::helpers::ensure_affected;
use crate::routes::params::ListParams;
use rocket::response::status;
use rocket::{State, delete, get, put, serde::json::Json};
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const USER_LIST: ListQuery = ListQuery {
    columns: "id, name, email, role, created_at",
    from: "users",
    filter: "(name ILIKE $1 OR email ILIKE $1)",
    order: "created_at DESC, id",
};

const ACTIVITY_LIST: ListQuery = ListQuery {
    columns: "a.id, a.user_id, u.email AS user_email, a.activity_type, a.page, a.details, a.created_at",
    from: "user_activity a LEFT JOIN users u ON u.id = a.user_id",
    filter: "(a.activity_type ILIKE $1 OR a.page ILIKE $1 OR u.email ILIKE $1)",
    order: "a.created_at DESC, a.id",
};

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RoleUpdateRequest {
    pub role: String,
}

/// Row counts shown on the admin landing page.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_subjects: i64,
    pub total_topics: i64,
    pub total_questions: i64,
    pub total_users: i64,
    pub total_demo_codes: i64,
}

#[openapi(tag = "Admin - Users")]
#[get("/admin/users?<params..>")]
pub async fn list_users(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<UserRecord>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(USER_LIST.fetch(pool.inner(), &params).await?))
}

/// Change a user's role. Tokens issued under the old role stop working.
#[openapi(tag = "Admin - Users")]
#[put("/admin/users/<user_id>/role", data = "<request>")]
pub async fn update_user_role(
    admin: RequireAdmin,
    user_id: Uuid,
    request: Json<RoleUpdateRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<UserRecord>, ApiError> {
    let role = Role::parse(request.role.trim())
        .ok_or_else(|| ApiError::BadRequest("role must be 'admin' or 'user'".to_string()))?;
    if admin.0.id == user_id && role != Role::Admin {
        return Err(ApiError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    let user: UserRecord = sqlx::query_as(
        r#"UPDATE users SET role = $2
           WHERE id = $1
           RETURNING id, name, email, role, created_at"#,
    )
    .bind(user_id)
    .bind(role.as_str())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))?;

    log::info!(
        "admin {} set role of user {} to {}",
        admin.0.email,
        user.email,
        role.as_str()
    );

    Ok(Json(user))
}

#[openapi(tag = "Admin - Users")]
#[delete("/admin/users/<user_id>")]
pub async fn delete_user(
    admin: RequireAdmin,
    user_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<status::NoContent, ApiError> {
    if admin.0.id == user_id {
        return Err(ApiError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool.inner())
        .await?;
    ensure_affected(result.rows_affected(), "User", user_id)?;

    log::info!("admin {} deleted user {}", admin.0.email, user_id);
    Ok(status::NoContent)
}

/// Activity log, newest first, with the acting user's email when known.
#[openapi(tag = "Admin - Users")]
#[get("/admin/activity?<params..>")]
pub async fn list_activity(
    _admin: RequireAdmin,
    params: Option<ListParams>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<ActivityEntry>>, ApiError> {
    let params = params.unwrap_or_default();
    Ok(Json(ACTIVITY_LIST.fetch(pool.inner(), &params).await?))
}

#[openapi(tag = "Admin - Users")]
#[get("/admin/stats")]
pub async fn platform_stats(
    _admin: RequireAdmin,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PlatformStats>, ApiError> {
    let (total_subjects, total_topics, total_questions, total_users, total_demo_codes) = tokio::try_join!(
        async {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM subjects")
                .fetch_one(pool.inner())
                .await
        },
        async {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM topics")
                .fetch_one(pool.inner())
                .await
        },
        async {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM questions")
                .fetch_one(pool.inner())
                .await
        },
        async {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users")
                .fetch_one(pool.inner())
                .await
        },
        async {
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM demo_codes")
                .fetch_one(pool.inner())
                .await
        }
    )?;

    Ok(Json(PlatformStats {
        total_subjects: total_subjects.0,
        total_topics: total_topics.0,
        total_questions: total_questions.0,
        total_users: total_users.0,
        total_demo_codes: total_demo_codes.0,
    }))
}
