//! Support tickets: a small state machine plus a reply thread.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::support::TicketStatus;
use crate::error::{ApiError, ApiResult};
use crate::models::{SupportTicket, TicketReply};
use crate::notify::notify;
use crate::state::AppState;

const CATEGORIES: &[&str] = &["order_issue", "payment_issue", "product_query", "return_request", "other"];
const PRIORITIES: &[&str] = &["low", "medium", "high"];

fn stored_status(ticket: &SupportTicket) -> Result<TicketStatus, ApiError> {
    ticket
        .status
        .parse()
        .map_err(|e: String| ApiError::Internal(format!("ticket {}: {e}", ticket.id)))
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub related_order: Option<Uuid>,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<SupportTicket>)> {
    if req.subject.trim().is_empty() || req.description.trim().is_empty() {
        return Err(ApiError::InvalidInput("Subject and description are required".into()));
    }
    let category = req.category.as_deref().unwrap_or("other");
    if !CATEGORIES.contains(&category) {
        return Err(ApiError::InvalidInput(format!("invalid category: {category}")));
    }
    let priority = req.priority.as_deref().unwrap_or("medium");
    if !PRIORITIES.contains(&priority) {
        return Err(ApiError::InvalidInput(format!("invalid priority: {priority}")));
    }

    let ticket: SupportTicket = sqlx::query_as(
        "INSERT INTO support_tickets \
             (id, user_id, subject, description, category, status, priority, replies, \
              related_order, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'open', $6, '[]', $7, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(req.subject.trim())
    .bind(&req.description)
    .bind(category)
    .bind(priority)
    .bind(req.related_order)
    .fetch_one(&state.db)
    .await?;

    notify(
        &state,
        user.id,
        "Support Ticket Created",
        &format!("Your support ticket \"#{}\" has been submitted. We will respond shortly.", ticket.id),
        "support",
        "/support/tickets",
    )
    .await;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn my_tickets(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<SupportTicket>>> {
    let tickets = sqlx::query_as(
        "SELECT * FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(tickets))
}

#[derive(Debug, Deserialize)]
pub struct TicketListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TicketPage {
    pub tickets: Vec<SupportTicket>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

pub async fn all_tickets(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TicketListParams>,
) -> ApiResult<Json<TicketPage>> {
    user.require_admin()?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let tickets: Vec<SupportTicket> = sqlx::query_as(
        "SELECT * FROM support_tickets WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&params.status)
    .bind(limit as i64)
    .bind(((page - 1) * limit) as i64)
    .fetch_all(&state.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM support_tickets WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(&params.status)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(TicketPage {
        tickets,
        total,
        page,
        pages: (total + limit as i64 - 1) / limit as i64,
    }))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SupportTicket>> {
    let ticket: Option<SupportTicket> = sqlx::query_as("SELECT * FROM support_tickets WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let ticket = ticket.ok_or_else(|| ApiError::not_found("Ticket"))?;
    user.may_access(ticket.user_id)?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

pub async fn reply_to_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplyRequest>,
) -> ApiResult<Json<SupportTicket>> {
    if req.message.trim().is_empty() {
        return Err(ApiError::InvalidInput("Reply message is required".into()));
    }

    let mut tx = state.db.begin().await?;
    let ticket: Option<SupportTicket> =
        sqlx::query_as("SELECT * FROM support_tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let ticket = ticket.ok_or_else(|| ApiError::not_found("Ticket"))?;
    user.may_access(ticket.user_id)?;

    let from_admin = user.is_admin();
    let mut replies = ticket.replies.0.clone();
    replies.push(TicketReply {
        sender: if from_admin { "admin".into() } else { "user".into() },
        message: req.message,
        created_at: Utc::now(),
    });

    // A reply can reopen a settled ticket.
    let next = stored_status(&ticket)?.after_reply(from_admin);

    let ticket: SupportTicket = sqlx::query_as(
        "UPDATE support_tickets SET replies = $2, status = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(Jsonb(replies))
    .bind(next.to_string())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    if from_admin {
        notify(
            &state,
            ticket.user_id,
            "Support Reply Received",
            &format!("Our team replied to your ticket: \"{}\"", ticket.subject),
            "support",
            &format!("/support/tickets/{}", ticket.id),
        )
        .await;
    }

    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: String,
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketStatusRequest>,
) -> ApiResult<Json<SupportTicket>> {
    user.require_admin()?;
    let target: TicketStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;

    let ticket: Option<SupportTicket> = sqlx::query_as("SELECT * FROM support_tickets WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let ticket = ticket.ok_or_else(|| ApiError::not_found("Ticket"))?;

    let current = stored_status(&ticket)?;
    if current == target {
        return Ok(Json(ticket));
    }
    if !current.can_move_to(target) {
        return Err(ApiError::InvalidTransition(format!(
            "cannot move ticket from {current} to {target}"
        )));
    }

    let ticket: SupportTicket = sqlx::query_as(
        "UPDATE support_tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(target.to_string())
    .fetch_one(&state.db)
    .await?;

    if target == TicketStatus::Resolved {
        notify(
            &state,
            ticket.user_id,
            "Support Ticket Resolved",
            &format!("Your ticket \"{}\" has been resolved.", ticket.subject),
            "support",
            &format!("/support/tickets/{}", ticket.id),
        )
        .await;
    }

    Ok(Json(ticket))
}
