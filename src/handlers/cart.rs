//! Per-user cart. One cart per user, items merged on (product, variant),
//! total recomputed server-side on every mutation and persisted in the
//! same write as the items.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json as Jsonb;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Cart, CartItem, Product, Variant};
use crate::state::AppState;

pub fn cart_total(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .map(|i| i.price * Decimal::from(i.quantity))
        .sum()
}

pub async fn fetch_or_create_cart(db: &PgPool, user_id: Uuid) -> Result<Cart, ApiError> {
    sqlx::query(
        "INSERT INTO carts (id, user_id, items, total_price, created_at, updated_at) \
         VALUES ($1, $2, '[]', 0, NOW(), NOW()) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .execute(db)
    .await?;
    let cart = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(cart)
}

/// Row-locked read for mutations, so concurrent updates to the same cart
/// serialize instead of racing.
async fn lock_cart(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<Cart, ApiError> {
    let cart: Option<Cart> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    cart.ok_or_else(|| ApiError::not_found("Cart"))
}

async fn save_cart(
    tx: &mut Transaction<'_, Postgres>,
    cart_id: Uuid,
    items: Vec<CartItem>,
) -> Result<Cart, ApiError> {
    let total = cart_total(&items);
    let cart = sqlx::query_as(
        "UPDATE carts SET items = $2, total_price = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(cart_id)
    .bind(Jsonb(items))
    .bind(total)
    .fetch_one(&mut **tx)
    .await?;
    Ok(cart)
}

pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Cart>> {
    let cart = fetch_or_create_cart(&state.db, user.id).await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub variant: Option<Variant>,
}

fn default_quantity() -> i32 {
    1
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<(StatusCode, Json<Cart>)> {
    if req.quantity < 1 {
        return Err(ApiError::InvalidInput("quantity must be at least 1".into()));
    }
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(req.product_id)
        .fetch_optional(&state.db)
        .await?;
    let product = product.ok_or_else(|| ApiError::not_found("Product"))?;

    fetch_or_create_cart(&state.db, user.id).await?;

    let mut tx = state.db.begin().await?;
    let cart = lock_cart(&mut tx, user.id).await?;
    let mut items = cart.items.0;

    let variant = req.variant.clone().unwrap_or_default();
    if let Some(existing) = items
        .iter_mut()
        .find(|i| i.product_id == req.product_id && i.variant.clone().unwrap_or_default() == variant)
    {
        existing.quantity += req.quantity;
    } else {
        items.push(CartItem {
            id: Uuid::now_v7(),
            product_id: req.product_id,
            quantity: req.quantity,
            price: product.price,
            variant: req.variant,
        });
    }

    let cart = save_cart(&mut tx, cart.id, items).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateCartItemRequest>,
) -> ApiResult<Json<Cart>> {
    if req.quantity < 1 {
        return Err(ApiError::InvalidInput("quantity must be at least 1".into()));
    }
    let mut tx = state.db.begin().await?;
    let cart = lock_cart(&mut tx, user.id).await?;
    let mut items = cart.items.0;

    let item = items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(|| ApiError::not_found("Cart item"))?;
    item.quantity = req.quantity;

    let cart = save_cart(&mut tx, cart.id, items).await?;
    tx.commit().await?;
    Ok(Json(cart))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<Cart>> {
    let mut tx = state.db.begin().await?;
    let cart = lock_cart(&mut tx, user.id).await?;
    let mut items = cart.items.0;

    let before = items.len();
    items.retain(|i| i.id != item_id);
    if items.len() == before {
        return Err(ApiError::not_found("Cart item"));
    }

    let cart = save_cart(&mut tx, cart.id, items).await?;
    tx.commit().await?;
    Ok(Json(cart))
}

pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Cart>> {
    let mut tx = state.db.begin().await?;
    let cart = lock_cart(&mut tx, user.id).await?;
    let cart = save_cart(&mut tx, cart.id, Vec::new()).await?;
    tx.commit().await?;
    Ok(Json(cart))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(qty: i32, price: Decimal) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: qty,
            price,
            variant: None,
        }
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let items = vec![item(2, dec!(149.50)), item(1, dec!(99))];
        assert_eq!(cart_total(&items), dec!(398.00));
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }
}
