//! HTTP surface. One module per resource; `api_router` wires them under
//! `/api/v1`.

use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::state::AppState;

pub mod cart;
pub mod coupons;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod returns;
pub mod reviews;
pub mod support;

pub fn api_router() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/categories", get(products::list_categories).post(products::create_category))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/featured", get(products::featured_products))
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        // Reviews
        .route(
            "/products/:id/reviews",
            get(reviews::list_product_reviews).post(reviews::submit_review),
        )
        .route("/reviews/:id", put(reviews::update_review).delete(reviews::delete_review))
        .route("/reviews/:id/reply", post(reviews::admin_reply))
        // Cart
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_to_cart))
        .route(
            "/cart/items/:item_id",
            patch(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        // Orders
        .route("/orders", get(orders::all_orders).post(orders::create_order))
        .route("/orders/mine", get(orders::my_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_order_status))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // Payments
        .route("/payments/checkout", post(payments::create_checkout))
        .route("/payments/verify", post(payments::verify_payment))
        // Coupons
        .route("/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/coupons/validate", post(coupons::validate_coupon))
        .route("/coupons/apply", post(coupons::apply_coupon))
        .route("/coupons/:id", put(coupons::update_coupon).delete(coupons::delete_coupon))
        // Support
        .route("/support", get(support::my_tickets).post(support::create_ticket))
        .route("/support/all", get(support::all_tickets))
        .route("/support/:id", get(support::get_ticket))
        .route("/support/:id/reply", post(support::reply_to_ticket))
        .route("/support/:id/status", patch(support::update_ticket_status))
        // Returns
        .route("/returns", get(returns::my_returns).post(returns::create_return))
        .route("/returns/all", get(returns::all_returns))
        .route("/returns/:id", get(returns::get_return))
        .route("/returns/:id/status", patch(returns::update_return_status))
        // Dashboard
        .route("/dashboard", get(dashboard::summary))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route("/notifications/:id/read", patch(notifications::mark_read))
}
