//! Persistence seam. `PgStore` backs deployments; `MemoryStore` serves local
//! runs without a database and the test-suite.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Coupon, NewUser, Order, PointsSlab, User};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict(db.message().to_string());
            }
        }
        StoreError::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which coupon an admin status change addresses.
#[derive(Debug, Clone)]
pub enum CouponKey {
    Id(Uuid),
    Code(String),
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, phone: &str) -> StoreResult<Option<User>>;
    /// Add `delta` to the balance, flooring at zero. `None` when the phone is unknown.
    async fn adjust_loyalty(&self, phone: &str, delta: i64) -> StoreResult<Option<User>>;
    /// Single atomic ledger update for a checkout: append the order and apply `delta` points.
    async fn apply_order_ledger(&self, phone: &str, delta: i64, order_id: Uuid) -> StoreResult<Option<User>>;

    async fn create_order(&self, order: Order) -> StoreResult<Order>;
    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn orders_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Order>>;

    async fn list_coupons(&self, enabled: Option<bool>) -> StoreResult<Vec<Coupon>>;
    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;
    async fn get_coupon(&self, id: Uuid) -> StoreResult<Option<Coupon>>;
    async fn insert_coupon(&self, coupon: Coupon) -> StoreResult<Coupon>;
    async fn update_coupon(&self, coupon: Coupon) -> StoreResult<Option<Coupon>>;
    async fn delete_coupon(&self, id: Uuid) -> StoreResult<bool>;
    /// Set `enabled`, or flip it when `enabled` is `None`.
    async fn set_coupon_enabled(&self, key: CouponKey, enabled: Option<bool>) -> StoreResult<Option<Coupon>>;

    async fn point_slabs(&self) -> StoreResult<Vec<PointsSlab>>;
    async fn insert_slab(&self, slab: PointsSlab) -> StoreResult<PointsSlab>;
    async fn delete_slab(&self, id: Uuid) -> StoreResult<bool>;
}
