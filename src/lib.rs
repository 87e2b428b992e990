//! Voltkart — storefront backend for electrical goods.
//!
//! REST API over PostgreSQL covering catalog, cart, orders, payments,
//! coupons, reviews, support tickets, returns and notifications. The
//! order lifecycle state machine and its stock/payment coordination live
//! in [`domain`] and [`inventory`]; everything HTTP-facing is under
//! [`handlers`].

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod inventory;
pub mod models;
pub mod notify;
pub mod state;
