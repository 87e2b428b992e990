//! Return requests: one per order, delivered orders only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::order::OrderStatus;
use crate::domain::support::ReturnStatus;
use crate::error::{ApiError, ApiResult};
use crate::models::{Order, ReturnItem, ReturnRequest};
use crate::notify::notify;
use crate::state::AppState;

const REASONS: &[&str] = &["defective", "wrong_item", "not_as_described", "changed_mind", "other"];

fn stored_status(req: &ReturnRequest) -> Result<ReturnStatus, ApiError> {
    req.status
        .parse()
        .map_err(|e: String| ApiError::Internal(format!("return request {}: {e}", req.id)))
}

#[derive(Debug, Deserialize)]
pub struct CreateReturnRequest {
    pub order_id: Uuid,
    pub items: Vec<ReturnItem>,
    pub reason: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_return(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateReturnRequest>,
) -> ApiResult<(StatusCode, Json<ReturnRequest>)> {
    if req.items.is_empty() {
        return Err(ApiError::InvalidInput("orderId, items and reason are required".into()));
    }
    if !REASONS.contains(&req.reason.as_str()) {
        return Err(ApiError::InvalidInput(format!("invalid return reason: {}", req.reason)));
    }

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(req.order_id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order"))?;
    if order.user_id != user.id {
        return Err(ApiError::Forbidden("not authorized to return this order".into()));
    }
    if order.status != OrderStatus::Delivered.to_string() {
        return Err(ApiError::InvalidInput("Only delivered orders can be returned".into()));
    }

    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM return_requests WHERE order_id = $1)")
            .bind(req.order_id)
            .fetch_one(&state.db)
            .await?;
    if exists {
        return Err(ApiError::Conflict("A return request for this order already exists".into()));
    }

    let request: ReturnRequest = sqlx::query_as(
        "INSERT INTO return_requests \
             (id, user_id, order_id, items, reason, description, status, admin_note, \
              refund_amount, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', '', 0, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(req.order_id)
    .bind(Jsonb(req.items))
    .bind(&req.reason)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await?;

    notify(
        &state,
        user.id,
        "Return Request Submitted",
        "Your return request has been submitted and is under review.",
        "return",
        "/returns",
    )
    .await;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn my_returns(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ReturnRequest>>> {
    let returns = sqlx::query_as(
        "SELECT * FROM return_requests WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(returns))
}

#[derive(Debug, Deserialize)]
pub struct ReturnListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ReturnPage {
    pub returns: Vec<ReturnRequest>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

pub async fn all_returns(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ReturnListParams>,
) -> ApiResult<Json<ReturnPage>> {
    user.require_admin()?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let returns: Vec<ReturnRequest> = sqlx::query_as(
        "SELECT * FROM return_requests WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&params.status)
    .bind(limit as i64)
    .bind(((page - 1) * limit) as i64)
    .fetch_all(&state.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM return_requests WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(&params.status)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ReturnPage {
        returns,
        total,
        page,
        pages: (total + limit as i64 - 1) / limit as i64,
    }))
}

pub async fn get_return(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReturnRequest>> {
    let request: Option<ReturnRequest> = sqlx::query_as("SELECT * FROM return_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let request = request.ok_or_else(|| ApiError::not_found("Return request"))?;
    user.may_access(request.user_id)?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReturnStatusRequest {
    pub status: String,
    pub admin_note: Option<String>,
    pub refund_amount: Option<Decimal>,
}

pub async fn update_return_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReturnStatusRequest>,
) -> ApiResult<Json<ReturnRequest>> {
    user.require_admin()?;
    let target: ReturnStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;

    let existing: Option<ReturnRequest> = sqlx::query_as("SELECT * FROM return_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Return request"))?;

    let current = stored_status(&existing)?;
    if current != target && !current.can_move_to(target) {
        return Err(ApiError::InvalidTransition(format!(
            "cannot move return request from {current} to {target}"
        )));
    }

    let request: ReturnRequest = sqlx::query_as(
        "UPDATE return_requests SET status = $2, admin_note = $3, refund_amount = $4, \
             updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(target.to_string())
    .bind(req.admin_note.unwrap_or(existing.admin_note))
    .bind(req.refund_amount.unwrap_or(existing.refund_amount))
    .fetch_one(&state.db)
    .await?;

    let title = match target {
        ReturnStatus::Approved => Some("Return Request Approved"),
        ReturnStatus::Rejected => Some("Return Request Rejected"),
        ReturnStatus::PickedUp => Some("Item Picked Up"),
        ReturnStatus::Refunded => Some("Refund Processed"),
        ReturnStatus::Pending => None,
    };
    if let Some(title) = title {
        notify(
            &state,
            request.user_id,
            title,
            &format!("Your return request status has been updated to: {target}."),
            "return",
            &format!("/returns/{}", request.id),
        )
        .await;
    }

    Ok(Json(request))
}
