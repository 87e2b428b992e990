//! Payment reconciliation.
//!
//! A checkout session ties a gateway order to an internal order; the
//! verify step is the single place an external "I paid" claim becomes a
//! trusted internal fact, authorized solely by the callback signature.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::inventory::reduce_stock_for_order;
use crate::models::{Order, PaymentRecord};
use crate::notify::publish_event;
use crate::state::AppState;

const CURRENCY: &str = "INR";

fn gateway_unconfigured() -> ApiError {
    ApiError::ServiceUnavailable("Payment service not configured. Please contact support.".into())
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub key: String,
    pub gateway_order_id: String,
    /// Minor currency units (paise).
    pub amount: i64,
    pub currency: String,
    pub payment_id: Uuid,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let gateway = state.gateway.clone().ok_or_else(gateway_unconfigured)?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(req.order_id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order"))?;
    user.may_access(order.user_id)?;
    if order.is_paid {
        return Err(ApiError::InvalidInput("Order is already paid".into()));
    }

    // Major units to paise, once, here.
    let amount = (order.total_price * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ApiError::Internal(format!("order {} total overflows paise", order.id)))?;

    let checkout = gateway
        .create_order(
            amount,
            CURRENCY,
            &format!("order_rcptid_{}", order.id),
            json!({ "order_id": order.id, "user_id": order.user_id }),
        )
        .await?;

    let payment: PaymentRecord = sqlx::query_as(
        "INSERT INTO payments \
             (id, user_id, order_id, gateway_order_id, amount, currency, status, raw_response, \
              created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, 'created', $7, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(order.user_id)
    .bind(order.id)
    .bind(&checkout.id)
    .bind(amount)
    .bind(CURRENCY)
    .bind(&checkout.raw)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            key: gateway.key_id().to_string(),
            gateway_order_id: checkout.id,
            amount,
            currency: CURRENCY.to_string(),
            payment_id: payment.id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let gateway = state.gateway.clone().ok_or_else(gateway_unconfigured)?;

    if req.gateway_order_id.is_empty() || req.gateway_payment_id.is_empty() || req.signature.is_empty() {
        return Err(ApiError::InvalidInput("Missing gateway payment details".into()));
    }

    let payment: Option<PaymentRecord> =
        sqlx::query_as("SELECT * FROM payments WHERE gateway_order_id = $1")
            .bind(&req.gateway_order_id)
            .fetch_optional(&state.db)
            .await?;
    let payment = payment.ok_or_else(|| ApiError::not_found("Payment record"))?;

    if !gateway.verify_signature(&req.gateway_order_id, &req.gateway_payment_id, &req.signature) {
        // Record the failed attempt; the order itself stays untouched.
        sqlx::query(
            "UPDATE payments SET status = 'failed', gateway_payment_id = $2, signature = $3, \
                 updated_at = NOW() WHERE id = $1",
        )
        .bind(payment.id)
        .bind(&req.gateway_payment_id)
        .bind(&req.signature)
        .execute(&state.db)
        .await?;
        return Err(ApiError::VerificationFailed);
    }

    sqlx::query(
        "UPDATE payments SET status = 'captured', gateway_payment_id = $2, signature = $3, \
             updated_at = NOW() WHERE id = $1",
    )
    .bind(payment.id)
    .bind(&req.gateway_payment_id)
    .bind(&req.signature)
    .execute(&state.db)
    .await?;

    // Conditional on is_paid so a replayed callback cannot take stock a
    // second time; a cancelled order is never flipped back to Confirmed.
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET \
             is_paid = TRUE, paid_at = NOW(), status = 'Confirmed', payment_status = 'Paid', \
             gateway_order_id = $2, gateway_payment_id = $3, updated_at = NOW() \
         WHERE id = $1 AND is_paid = FALSE AND status <> 'Cancelled' RETURNING *",
    )
    .bind(payment.order_id)
    .bind(&req.gateway_order_id)
    .bind(&req.gateway_payment_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(order) = order else {
        return Ok(Json(json!({
            "message": "Payment already recorded for this order",
            "order_id": payment.order_id,
        })));
    };

    // Gateway orders reserve stock here, not at creation.
    reduce_stock_for_order(&state.db, order.id).await?;

    publish_event(
        &state,
        "orders.paid",
        json!({ "order_id": order.id, "gateway_payment_id": req.gateway_payment_id }),
    )
    .await;

    Ok(Json(json!({
        "message": "Payment verified and order updated successfully",
        "order_id": order.id,
    })))
}
