//! Pure business rules: state machines and money math, no I/O.

pub mod coupon;
pub mod order;
pub mod review;
pub mod support;
