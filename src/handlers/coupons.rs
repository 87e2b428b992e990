//! Coupon endpoints: user-facing validate/apply and admin CRUD.
//!
//! `validate` is read-only; `apply` is the separate mutating call made
//! once an order actually completes with the coupon. The used-count
//! increment and used-by append happen in a single statement.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::coupon::{self, CouponTerms, DiscountType};
use crate::error::{ApiError, ApiResult};
use crate::models::Coupon;
use crate::state::AppState;

fn terms(c: &Coupon) -> CouponTerms {
    CouponTerms {
        is_active: c.is_active,
        expires_at: c.expires_at,
        usage_limit: c.usage_limit,
        used_count: c.used_count,
        per_user_limit: c.per_user_limit,
        min_order_amount: c.min_order_amount,
    }
}

fn parse_type(c: &Coupon) -> Result<DiscountType, ApiError> {
    c.discount_type
        .parse()
        .map_err(|e: String| ApiError::Internal(format!("coupon {}: {e}", c.id)))
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub coupon_id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub description: String,
}

pub async fn validate_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ValidateCouponRequest>,
) -> ApiResult<Json<ValidateCouponResponse>> {
    let code = req.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::InvalidInput("Coupon code is required".into()));
    }

    let found: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.db)
        .await?;
    let found = found.ok_or_else(|| ApiError::NotFound("Invalid coupon code".into()))?;

    let user_uses = found.used_by.iter().filter(|&&id| id == user.id).count() as i32;
    coupon::validate(&terms(&found), Utc::now(), user_uses, req.order_amount)
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let discount_type = parse_type(&found)?;
    let discount_amount = coupon::discount(
        discount_type,
        found.discount_value,
        found.max_discount_amount,
        req.order_amount,
    );

    Ok(Json(ValidateCouponResponse {
        valid: true,
        coupon_id: found.id,
        code: found.code,
        discount_type,
        discount_value: found.discount_value,
        discount_amount,
        description: found.description,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub coupon_id: Uuid,
}

pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ApplyCouponRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = sqlx::query(
        "UPDATE coupons SET used_by = array_append(used_by, $2), used_count = used_count + 1, \
             updated_at = NOW() WHERE id = $1",
    )
    .bind(req.coupon_id)
    .bind(user.id)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Coupon"));
    }
    Ok(Json(json!({ "message": "Coupon applied successfully" })))
}

pub async fn list_coupons(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Coupon>>> {
    user.require_admin()?;
    let coupons = sqlx::query_as("SELECT * FROM coupons ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(coupons))
}

#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCouponRequest>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    user.require_admin()?;
    let code = req.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::InvalidInput("code is required".into()));
    }
    let discount_type: DiscountType = req
        .discount_type
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;
    if req.discount_value <= Decimal::ZERO {
        return Err(ApiError::InvalidInput("discountValue must be positive".into()));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM coupons WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Coupon code already exists".into()));
    }

    let created: Coupon = sqlx::query_as(
        "INSERT INTO coupons \
             (id, code, description, discount_type, discount_value, min_order_amount, \
              max_discount_amount, usage_limit, used_count, per_user_limit, used_by, is_active, \
              expires_at, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, '{}', TRUE, $10, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&code)
    .bind(&req.description)
    .bind(discount_type.as_str())
    .bind(req.discount_value)
    .bind(req.min_order_amount)
    .bind(req.max_discount_amount)
    .bind(req.usage_limit)
    .bind(req.per_user_limit.unwrap_or(1))
    .bind(req.expires_at)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCouponRequest {
    pub description: Option<String>,
    pub discount_value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn update_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCouponRequest>,
) -> ApiResult<Json<Coupon>> {
    user.require_admin()?;
    let existing: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found("Coupon"))?;

    let updated: Coupon = sqlx::query_as(
        "UPDATE coupons SET \
             description = $2, discount_value = $3, min_order_amount = $4, \
             max_discount_amount = $5, usage_limit = $6, per_user_limit = $7, is_active = $8, \
             expires_at = $9, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.description.unwrap_or(existing.description))
    .bind(req.discount_value.unwrap_or(existing.discount_value))
    .bind(req.min_order_amount.unwrap_or(existing.min_order_amount))
    .bind(req.max_discount_amount.or(existing.max_discount_amount))
    .bind(req.usage_limit.or(existing.usage_limit))
    .bind(req.per_user_limit.unwrap_or(existing.per_user_limit))
    .bind(req.is_active.unwrap_or(existing.is_active))
    .bind(req.expires_at.unwrap_or(existing.expires_at))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Coupon"));
    }
    Ok(Json(json!({ "message": "Coupon deleted" })))
}
