use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Coupon, NewUser, Order, PointsSlab, User};
use crate::store::{CouponKey, Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    orders: HashMap<Uuid, Order>,
    coupons: Vec<Coupon>,
    slabs: Vec<PointsSlab>,
}

/// Process-local store. Each call holds the lock for its whole read-modify-write.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&user.phone) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.phone)));
        }
        let record = User {
            phone: user.phone.clone(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            address: user.address.map(|a| a.to_line()),
            loyalty_points: 0,
            orders: Vec::new(),
            joined_at: Utc::now(),
        };
        inner.users.insert(user.phone, record.clone());
        Ok(record)
    }

    async fn find_user(&self, phone: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(phone).cloned())
    }

    async fn adjust_loyalty(&self, phone: &str, delta: i64) -> StoreResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.users.get_mut(phone).map(|user| {
            user.loyalty_points = user.loyalty_points.saturating_add(delta).max(0);
            user.clone()
        }))
    }

    async fn apply_order_ledger(&self, phone: &str, delta: i64, order_id: Uuid) -> StoreResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.users.get_mut(phone).map(|user| {
            user.loyalty_points = user.loyalty_points.saturating_add(delta).max(0);
            user.orders.push(order_id);
            user.clone()
        }))
    }

    async fn create_order(&self, order: Order) -> StoreResult<Order> {
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.inner.lock().await.orders.get(&id).cloned())
    }

    async fn orders_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = ids.iter().filter_map(|id| inner.orders.get(id).cloned()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_coupons(&self, enabled: Option<bool>) -> StoreResult<Vec<Coupon>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .coupons
            .iter()
            .filter(|c| enabled.map(|e| c.enabled == e).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let inner = self.inner.lock().await;
        Ok(inner.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn get_coupon(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        let inner = self.inner.lock().await;
        Ok(inner.coupons.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_coupon(&self, coupon: Coupon) -> StoreResult<Coupon> {
        let mut inner = self.inner.lock().await;
        if inner.coupons.iter().any(|c| c.code == coupon.code) {
            return Err(StoreError::Conflict(format!("coupon {} already exists", coupon.code)));
        }
        inner.coupons.push(coupon.clone());
        Ok(coupon)
    }

    async fn update_coupon(&self, coupon: Coupon) -> StoreResult<Option<Coupon>> {
        let mut inner = self.inner.lock().await;
        if inner.coupons.iter().any(|c| c.code == coupon.code && c.id != coupon.id) {
            return Err(StoreError::Conflict(format!("coupon {} already exists", coupon.code)));
        }
        Ok(inner.coupons.iter_mut().find(|c| c.id == coupon.id).map(|existing| {
            *existing = coupon;
            existing.clone()
        }))
    }

    async fn delete_coupon(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.coupons.len();
        inner.coupons.retain(|c| c.id != id);
        Ok(inner.coupons.len() != before)
    }

    async fn set_coupon_enabled(&self, key: CouponKey, enabled: Option<bool>) -> StoreResult<Option<Coupon>> {
        let mut inner = self.inner.lock().await;
        let found = inner.coupons.iter_mut().find(|c| match &key {
            CouponKey::Id(id) => c.id == *id,
            CouponKey::Code(code) => c.code == *code,
        });
        Ok(found.map(|coupon| {
            coupon.enabled = enabled.unwrap_or(!coupon.enabled);
            coupon.clone()
        }))
    }

    async fn point_slabs(&self) -> StoreResult<Vec<PointsSlab>> {
        Ok(self.inner.lock().await.slabs.clone())
    }

    async fn insert_slab(&self, slab: PointsSlab) -> StoreResult<PointsSlab> {
        self.inner.lock().await.slabs.push(slab.clone());
        Ok(slab)
    }

    async fn delete_slab(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.slabs.len();
        inner.slabs.retain(|s| s.id != id);
        Ok(inner.slabs.len() != before)
    }
}
