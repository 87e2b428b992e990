//! Stock adjustment for orders.
//!
//! Each helper must be invoked exactly once per order per direction: the
//! creation/payment path reduces, the cancellation path restores. Each
//! loop runs in a single transaction so a partially-applied adjustment
//! never becomes visible.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Order, OrderItem};

pub const LOW_STOCK_THRESHOLD: i32 = 5;

pub fn is_low_stock(stock: i32) -> bool {
    stock <= LOW_STOCK_THRESHOLD
}

/// Decrement stock for every line item on the order, flooring at zero, and
/// refresh each product's low-stock flag in the same statement.
pub async fn reduce_stock_for_order(db: &PgPool, order_id: Uuid) -> Result<(), ApiError> {
    let mut tx = db.begin().await?;
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(order) = order else {
        tracing::warn!(%order_id, "stock reduction requested for unknown order");
        return Ok(());
    };

    for item in order.order_items.0.iter() {
        sqlx::query(
            "UPDATE products SET \
                 stock = GREATEST(stock - $2, 0), \
                 low_stock = GREATEST(stock - $2, 0) <= $3, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(LOW_STOCK_THRESHOLD)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Inverse of [`reduce_stock_for_order`]: hand quantities back and refresh
/// the low-stock flag.
pub async fn restore_stock_for_order(db: &PgPool, items: &[OrderItem]) -> Result<(), ApiError> {
    let mut tx = db.begin().await?;
    for item in items {
        sqlx::query(
            "UPDATE products SET \
                 stock = stock + $2, \
                 low_stock = stock + $2 <= $3, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(LOW_STOCK_THRESHOLD)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_stock_threshold() {
        assert!(is_low_stock(0));
        assert!(is_low_stock(5));
        assert!(!is_low_stock(6));
        assert!(!is_low_stock(100));
    }
}
