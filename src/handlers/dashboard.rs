//! Admin dashboard summary.
//!
//! Revenue figures count paid orders only; the status breakdown counts
//! every order and always lists the full lifecycle, zero counts included.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::order::ALL_STATUSES;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct MonthlySales {
    pub month: DateTime<Utc>,
    pub total_sales: Decimal,
    pub orders: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub total_quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_users: i64,
    pub total_revenue: Decimal,
    pub monthly_sales: Vec<MonthlySales>,
    pub top_products: Vec<TopProduct>,
    pub order_status_breakdown: Vec<StatusCount>,
}

pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<DashboardSummary>> {
    user.require_admin()?;

    let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    let (total_revenue,): (Decimal,) =
        sqlx::query_as("SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE is_paid")
            .fetch_one(&state.db)
            .await?;

    let monthly_sales: Vec<MonthlySales> = sqlx::query_as(
        "SELECT date_trunc('month', created_at) AS month, \
                SUM(total_price) AS total_sales, \
                COUNT(*) AS orders \
         FROM orders WHERE is_paid \
         GROUP BY 1 ORDER BY 1",
    )
    .fetch_all(&state.db)
    .await?;

    // Line items are JSONB snapshots; unnest them to rank by quantity sold.
    let top_products: Vec<TopProduct> = sqlx::query_as(
        "SELECT (item->>'product_id')::uuid AS product_id, \
                MAX(item->>'name') AS name, \
                SUM((item->>'quantity')::int)::bigint AS total_quantity, \
                SUM((item->>'quantity')::numeric * (item->>'price')::numeric) AS revenue \
         FROM orders, jsonb_array_elements(order_items) AS item \
         WHERE is_paid \
         GROUP BY 1 ORDER BY total_quantity DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await?;

    let counted: Vec<StatusCount> =
        sqlx::query_as("SELECT status, COUNT(*) AS count FROM orders GROUP BY status")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(DashboardSummary {
        total_users,
        total_revenue,
        monthly_sales,
        top_products,
        order_status_breakdown: full_status_breakdown(counted),
    }))
}

fn full_status_breakdown(counted: Vec<StatusCount>) -> Vec<StatusCount> {
    ALL_STATUSES
        .iter()
        .map(|s| {
            let status = s.to_string();
            let count = counted
                .iter()
                .find(|c| c.status == status)
                .map_or(0, |c| c.count);
            StatusCount { status, count }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_lists_every_status_in_lifecycle_order() {
        let counted = vec![
            StatusCount { status: "Delivered".into(), count: 3 },
            StatusCount { status: "Pending".into(), count: 1 },
        ];
        let full = full_status_breakdown(counted);
        assert_eq!(full.len(), 7);
        assert_eq!((full[0].status.as_str(), full[0].count), ("Pending", 1));
        assert_eq!((full[5].status.as_str(), full[5].count), ("Delivered", 3));
        assert_eq!(full.iter().filter(|c| c.count == 0).count(), 5);
    }

    #[test]
    fn breakdown_of_nothing_is_all_zeroes() {
        let full = full_status_breakdown(Vec::new());
        assert_eq!(full.len(), 7);
        assert!(full.iter().all(|c| c.count == 0));
    }
}
