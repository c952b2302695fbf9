pub mod app;
pub mod config;
pub mod coupon_handlers;
pub mod coupons;
pub mod loyalty;
pub mod models;
pub mod order_handlers;
pub mod points_handlers;
pub mod pricing;
pub mod store;
pub mod user_handlers;
pub mod vendor;

pub use app::{build_router, AppState, ORDER_REGISTRY};
pub use config::AppConfig;
