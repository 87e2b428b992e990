//! Per-user notification feed.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub unread_count: i64,
    pub page: u32,
    pub pages: i64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<NotificationParams>,
) -> ApiResult<Json<NotificationPage>> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let notifications: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit as i64)
    .bind(((page - 1) * limit) as i64)
    .fetch_all(&state.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    let (unread_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(NotificationPage {
        notifications,
        total,
        unread_count,
        page,
        pages: (total + limit as i64 - 1) / limit as i64,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;
    Ok(Json(json!({ "unread_count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification: Option<Notification> = sqlx::query_as(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?;
    notification
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Notification"))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(Json(json!({ "message": "All notifications marked as read" })))
}
