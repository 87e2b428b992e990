//! Order lifecycle: creation, status updates, cancellation.
//!
//! Line items are snapshotted at creation and never touched again. Stock
//! moves exactly once per order per direction: COD orders reserve at
//! creation, gateway orders on payment verification, and cancellation
//! restores only what was actually taken.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::order::{
    stock_was_reserved, user_can_cancel, OrderStatus, PaymentMethod, Transition,
    DEFAULT_CANCEL_REASON, USER_CANCELLABLE,
};
use crate::error::{ApiError, ApiResult};
use crate::inventory::{reduce_stock_for_order, restore_stock_for_order};
use crate::models::{Address, Cart, Order, OrderItem, Product};
use crate::notify::{notify, notify_admins, publish_event};
use crate::state::AppState;

fn stored_status(order: &Order) -> Result<OrderStatus, ApiError> {
    order
        .status
        .parse()
        .map_err(|e: String| ApiError::Internal(format!("order {}: {e}", order.id)))
}

fn stored_method(order: &Order) -> Result<PaymentMethod, ApiError> {
    order
        .payment_method
        .parse()
        .map_err(|e: String| ApiError::Internal(format!("order {}: {e}", order.id)))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_items: Option<Vec<OrderItem>>,
    pub shipping_address: Address,
    pub total_price: Option<rust_decimal::Decimal>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub from_cart: bool,
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let method = PaymentMethod::normalize(req.payment_method.as_deref().unwrap_or(""));

    let mut tx = state.db.begin().await?;

    let (items, total) = if req.from_cart {
        let cart: Option<Cart> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;
        let cart = cart.filter(|c| !c.items.0.is_empty());
        let Some(cart) = cart else {
            return Err(ApiError::InvalidInput("Cart is empty".into()));
        };

        // Snapshot name/image from the catalog at this moment; the order
        // keeps these values no matter what happens to the product later.
        let mut items = Vec::with_capacity(cart.items.0.len());
        for line in cart.items.0.iter() {
            let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
                .bind(line.product_id)
                .fetch_optional(&mut *tx)
                .await?;
            let product = product.ok_or_else(|| ApiError::not_found("Product"))?;
            items.push(OrderItem {
                product_id: line.product_id,
                name: product.name.clone(),
                quantity: line.quantity,
                price: line.price,
                image: product.images.0.first().map(|i| i.url.clone()),
                variant: line.variant.clone(),
            });
        }
        let total = cart.total_price;

        // Clearing the cart is part of the same transaction as order
        // creation.
        sqlx::query("UPDATE carts SET items = '[]', total_price = 0, updated_at = NOW() WHERE id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        (items, total)
    } else {
        let items = req.order_items.unwrap_or_default();
        if items.is_empty() {
            return Err(ApiError::InvalidInput("No order items provided".into()));
        }
        if items.iter().any(|i| i.quantity < 1) {
            return Err(ApiError::InvalidInput("quantity must be at least 1".into()));
        }
        let total = req
            .total_price
            .ok_or_else(|| ApiError::InvalidInput("totalPrice is required".into()))?;
        (items, total)
    };

    let order: Order = sqlx::query_as(
        "INSERT INTO orders \
             (id, user_id, order_items, shipping_address, payment_method, payment_status, \
              total_price, status, is_paid, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'Pending', $6, 'Pending', FALSE, NOW(), NOW()) \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(Jsonb(items))
    .bind(Jsonb(req.shipping_address))
    .bind(method.as_str())
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    // COD has no payment-confirmation step; stock is taken right away.
    if method == PaymentMethod::CashOnDelivery {
        reduce_stock_for_order(&state.db, order.id).await?;
    }

    publish_event(
        &state,
        "orders.created",
        json!({ "order_id": order.id, "user_id": user.id, "total": order.total_price }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn my_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user.id)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order"))?;
    user.may_access(order.user_id)?;
    Ok(Json(order))
}

pub async fn all_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    user.require_admin()?;
    let orders = sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    user.require_admin()?;
    let target: OrderStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order"))?;
    let current = stored_status(&order)?;

    match current
        .transition(target)
        .map_err(|e| ApiError::InvalidTransition(e.to_string()))?
    {
        Transition::Unchanged => return Ok(Json(order)),
        Transition::Moved => {}
    }

    // The delivered flag and timestamp land in the same statement as the
    // status change.
    let delivered = target == OrderStatus::Delivered;
    let order: Order = sqlx::query_as(
        "UPDATE orders SET \
             status = $2, \
             is_delivered = CASE WHEN $3 THEN TRUE ELSE is_delivered END, \
             delivered_at = CASE WHEN $3 THEN NOW() ELSE delivered_at END, \
             updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(target.to_string())
    .bind(delivered)
    .fetch_one(&state.db)
    .await?;

    publish_event(
        &state,
        "orders.status_changed",
        json!({ "order_id": order.id, "from": current.to_string(), "to": target.to_string() }),
    )
    .await;

    Ok(Json(order))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    req: Option<Json<CancelOrderRequest>>,
) -> ApiResult<Json<Order>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order"))?;

    if order.user_id != user.id {
        return Err(ApiError::Forbidden("not authorized to cancel this order".into()));
    }

    let current = stored_status(&order)?;
    if !user_can_cancel(current) {
        return Err(ApiError::InvalidTransition(format!(
            "only Pending or Confirmed orders can be cancelled; this order is {current}"
        )));
    }

    let reason = match req.reason.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_CANCEL_REASON.to_string(),
    };

    // The status flip is conditional on the cancellable set so that two
    // concurrent cancels resolve to exactly one winner; only the winner
    // restores stock.
    let cancellable: Vec<String> = USER_CANCELLABLE.iter().map(|s| s.to_string()).collect();
    let cancelled: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'Cancelled', cancel_reason = $2, cancelled_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 AND status = ANY($3) RETURNING *",
    )
    .bind(id)
    .bind(&reason)
    .bind(&cancellable)
    .fetch_optional(&state.db)
    .await?;
    let Some(cancelled) = cancelled else {
        return Err(ApiError::InvalidTransition(
            "only Pending or Confirmed orders can be cancelled".into(),
        ));
    };

    let method = stored_method(&cancelled)?;
    let gateway_paid = method == PaymentMethod::Gateway && cancelled.is_paid;

    // Restore stock only if this order actually took it.
    if stock_was_reserved(method, cancelled.is_paid) {
        restore_stock_for_order(&state.db, &cancelled.order_items.0).await?;
    }

    notify_admins(
        &state,
        "Order Cancelled",
        &format!("Order #{} was cancelled by the customer. Reason: {reason}", cancelled.id),
        "order",
        &format!("/orders/{}", cancelled.id),
    )
    .await;

    let user_message = if gateway_paid {
        "Your order has been cancelled. The refund will be credited to your original payment method within 5-7 business days."
    } else {
        "Your order has been cancelled. No amount was charged for this order."
    };
    notify(
        &state,
        cancelled.user_id,
        "Order Cancelled",
        user_message,
        "order",
        &format!("/orders/{}", cancelled.id),
    )
    .await;

    publish_event(
        &state,
        "orders.cancelled",
        json!({
            "order_id": cancelled.id,
            "reason": reason,
            "cancelled_at": cancelled.cancelled_at.unwrap_or_else(Utc::now),
        }),
    )
    .await;

    Ok(Json(cancelled))
}
