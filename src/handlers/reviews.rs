//! Reviews and the product rating aggregate.
//!
//! One review per (user, product); a second submission overwrites the
//! first. The product's stored average and count are recomputed from the
//! full review set inside the same transaction as every mutation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as Jsonb;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{AdminReply, Review};
use crate::state::AppState;

/// Full recomputation, never an incremental adjustment, so the stored
/// aggregate cannot drift from the review set.
async fn recompute_product_rating(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE products p SET \
             ratings = COALESCE(s.avg, 0), \
             num_reviews = COALESCE(s.cnt, 0), \
             updated_at = NOW() \
         FROM (SELECT ROUND(AVG(rating)::numeric, 1) AS avg, COUNT(*)::int AS cnt \
               FROM reviews WHERE product_id = $1) s \
         WHERE p.id = $1",
    )
    .bind(product_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    let reviews = sqlx::query_as(
        "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn submit_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<SubmitReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::InvalidInput("rating must be between 1 and 5".into()));
    }

    let (product_exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&state.db)
            .await?;
    if !product_exists {
        return Err(ApiError::not_found("Product"));
    }

    // Eligibility: the product must appear on a delivered order of this
    // user.
    let (eligible,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM orders \
             WHERE user_id = $1 AND status = 'Delivered' AND order_items @> $2)",
    )
    .bind(user.id)
    .bind(json!([{ "product_id": product_id }]))
    .fetch_one(&state.db)
    .await?;
    if !eligible {
        return Err(ApiError::Forbidden(
            "you can review a product only after it has been delivered to you".into(),
        ));
    }

    let mut tx = state.db.begin().await?;
    let review: Review = sqlx::query_as(
        "INSERT INTO reviews (id, user_id, product_id, rating, comment, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
         ON CONFLICT (product_id, user_id) \
         DO UPDATE SET rating = $4, comment = $5, updated_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(product_id)
    .bind(req.rating)
    .bind(&req.comment)
    .fetch_one(&mut *tx)
    .await?;
    recompute_product_rating(&mut tx, product_id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(review)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(review_id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    if let Some(rating) = req.rating {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::InvalidInput("rating must be between 1 and 5".into()));
        }
    }

    let existing: Option<Review> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Review"))?;
    if existing.user_id != user.id {
        return Err(ApiError::Forbidden("not authorized to edit this review".into()));
    }

    let mut tx = state.db.begin().await?;
    let review: Review = sqlx::query_as(
        "UPDATE reviews SET rating = $2, comment = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(review_id)
    .bind(req.rating.unwrap_or(existing.rating))
    .bind(req.comment.or(existing.comment))
    .fetch_one(&mut *tx)
    .await?;
    recompute_product_rating(&mut tx, review.product_id).await?;
    tx.commit().await?;

    Ok(Json(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(review_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let existing: Option<Review> = sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Review"))?;
    if existing.user_id != user.id && !user.is_admin() {
        return Err(ApiError::Forbidden("not authorized to delete this review".into()));
    }

    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(&mut *tx)
        .await?;
    recompute_product_rating(&mut tx, existing.product_id).await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "Review deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct AdminReplyRequest {
    pub message: String,
}

pub async fn admin_reply(
    State(state): State<AppState>,
    user: AuthUser,
    Path(review_id): Path<Uuid>,
    Json(req): Json<AdminReplyRequest>,
) -> ApiResult<Json<Review>> {
    user.require_admin()?;
    if req.message.trim().is_empty() {
        return Err(ApiError::InvalidInput("message is required".into()));
    }

    let reply = AdminReply {
        admin_id: user.id,
        message: req.message,
        created_at: Utc::now(),
    };
    let review: Option<Review> = sqlx::query_as(
        "UPDATE reviews SET admin_reply = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(review_id)
    .bind(Jsonb(reply))
    .fetch_optional(&state.db)
    .await?;
    review.map(Json).ok_or_else(|| ApiError::not_found("Review"))
}
