use anyhow::{anyhow, Context};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_money::Money;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{Coupon, NewUser, Order, PointsSlab, User};
use crate::pricing::BreakdownMode;
use crate::store::{CouponKey, Store, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        phone TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        address TEXT,
        loyalty_points BIGINT NOT NULL DEFAULT 0,
        order_ids UUID[] NOT NULL DEFAULT '{}',
        joined_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        phone TEXT NOT NULL,
        customer_name TEXT NOT NULL,
        lines JSONB NOT NULL,
        subtotal NUMERIC(12,2) NOT NULL,
        coupon_code TEXT,
        coupon_discount NUMERIC(12,2) NOT NULL,
        coupon_reason TEXT,
        loyalty_discount NUMERIC(12,2) NOT NULL,
        delivery NUMERIC(12,2) NOT NULL,
        packaging NUMERIC(12,2) NOT NULL,
        amount_payable NUMERIC(12,2) NOT NULL,
        payment_method TEXT NOT NULL,
        payment_status TEXT,
        order_mode TEXT,
        transaction_id TEXT,
        notes TEXT,
        breakdown_mode TEXT NOT NULL,
        earned_points BIGINT NOT NULL,
        redeemed_points BIGINT NOT NULL,
        order_date TIMESTAMPTZ NOT NULL,
        client_tz_offset_minutes INT,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS orders_phone_idx ON orders (phone)",
    r#"CREATE TABLE IF NOT EXISTS coupons (
        id UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        discount TEXT,
        percent DOUBLE PRECISION,
        amount NUMERIC(12,2),
        min_order NUMERIC(12,2) NOT NULL DEFAULT 0,
        max_value NUMERIC(12,2),
        expiry_date TIMESTAMPTZ,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS point_slabs (
        id UUID PRIMARY KEY,
        lower_bound NUMERIC(12,2) NOT NULL,
        upper_bound NUMERIC(12,2) NOT NULL,
        loyalty_points BIGINT NOT NULL
    )"#,
];

const USER_COLUMNS: &str =
    "phone, first_name, last_name, email, address, loyalty_points, order_ids, joined_at";
const ORDER_COLUMNS: &str = "id, phone, customer_name, lines, subtotal, coupon_code, coupon_discount, coupon_reason, \
     loyalty_discount, delivery, packaging, amount_payable, payment_method, payment_status, order_mode, \
     transaction_id, notes, breakdown_mode, earned_points, redeemed_points, order_date, client_tz_offset_minutes, created_at";
const COUPON_COLUMNS: &str =
    "id, code, discount, percent, amount, min_order, max_value, expiry_date, enabled, created_at";

fn money(value: &BigDecimal) -> anyhow::Result<Money> {
    Money::try_from(value).map_err(|err| anyhow!(err))
}

fn opt_money(value: &Option<BigDecimal>) -> anyhow::Result<Option<Money>> {
    value.as_ref().map(money).transpose()
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    phone: String,
    customer_name: String,
    lines: Value,
    subtotal: BigDecimal,
    coupon_code: Option<String>,
    coupon_discount: BigDecimal,
    coupon_reason: Option<String>,
    loyalty_discount: BigDecimal,
    delivery: BigDecimal,
    packaging: BigDecimal,
    amount_payable: BigDecimal,
    payment_method: String,
    payment_status: Option<String>,
    order_mode: Option<String>,
    transaction_id: Option<String>,
    notes: Option<String>,
    breakdown_mode: String,
    earned_points: i64,
    redeemed_points: i64,
    order_date: DateTime<Utc>,
    client_tz_offset_minutes: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(row: OrderRow) -> anyhow::Result<Self> {
        let breakdown_mode = BreakdownMode::parse(&row.breakdown_mode)
            .with_context(|| format!("unknown breakdown mode '{}'", row.breakdown_mode))?;
        Ok(Order {
            id: row.id,
            phone: row.phone,
            customer_name: row.customer_name,
            lines: row.lines,
            subtotal: money(&row.subtotal)?,
            coupon_code: row.coupon_code,
            coupon_discount: money(&row.coupon_discount)?,
            coupon_reason: row.coupon_reason,
            loyalty_discount: money(&row.loyalty_discount)?,
            delivery: money(&row.delivery)?,
            packaging: money(&row.packaging)?,
            amount_payable: money(&row.amount_payable)?,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            order_mode: row.order_mode,
            transaction_id: row.transaction_id,
            notes: row.notes,
            breakdown_mode,
            earned_points: row.earned_points,
            redeemed_points: row.redeemed_points,
            order_date: row.order_date,
            client_tz_offset_minutes: row.client_tz_offset_minutes,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount: Option<String>,
    percent: Option<f64>,
    amount: Option<BigDecimal>,
    min_order: BigDecimal,
    max_value: Option<BigDecimal>,
    expiry_date: Option<DateTime<Utc>>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = anyhow::Error;

    fn try_from(row: CouponRow) -> anyhow::Result<Self> {
        Ok(Coupon {
            id: row.id,
            code: row.code,
            discount: row.discount,
            percent: row.percent,
            amount: opt_money(&row.amount)?,
            min_order: money(&row.min_order)?,
            max_value: opt_money(&row.max_value)?,
            expiry_date: row.expiry_date,
            enabled: row.enabled,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlabRow {
    id: Uuid,
    lower_bound: BigDecimal,
    upper_bound: BigDecimal,
    loyalty_points: i64,
}

impl TryFrom<SlabRow> for PointsSlab {
    type Error = anyhow::Error;

    fn try_from(row: SlabRow) -> anyhow::Result<Self> {
        Ok(PointsSlab {
            id: row.id,
            lower: money(&row.lower_bound)?,
            upper: money(&row.upper_bound)?,
            loyalty_points: row.loyalty_points,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = anyhow::Error>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(StoreError::from))
        .collect()
}

fn convert_one<R, T>(row: Option<R>) -> StoreResult<Option<T>>
where
    T: TryFrom<R, Error = anyhow::Error>,
{
    row.map(T::try_from).transpose().map_err(StoreError::from)
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = PgPool::connect(url).await.context("failed to connect to DATABASE_URL")?;
        Ok(Self::new(db))
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.db)
                .await
                .context("failed to apply schema")?;
        }
        info!("database schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (phone, first_name, last_name, email, address) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.phone)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.address.as_ref().map(|a| a.to_line()))
        .fetch_one(&self.db)
        .await?;
        Ok(rec)
    }

    async fn find_user(&self, phone: &str) -> StoreResult<Option<User>> {
        let rec = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1"))
            .bind(phone)
            .fetch_optional(&self.db)
            .await?;
        Ok(rec)
    }

    async fn adjust_loyalty(&self, phone: &str, delta: i64) -> StoreResult<Option<User>> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET loyalty_points = GREATEST(loyalty_points + $2, 0) WHERE phone = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(phone)
        .bind(delta)
        .fetch_optional(&self.db)
        .await?;
        Ok(rec)
    }

    async fn apply_order_ledger(&self, phone: &str, delta: i64, order_id: Uuid) -> StoreResult<Option<User>> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET loyalty_points = GREATEST(loyalty_points + $2, 0), order_ids = array_append(order_ids, $3) \
             WHERE phone = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(phone)
        .bind(delta)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(rec)
    }

    async fn create_order(&self, order: Order) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id)
        .bind(&order.phone)
        .bind(&order.customer_name)
        .bind(&order.lines)
        .bind(BigDecimal::from(order.subtotal))
        .bind(&order.coupon_code)
        .bind(BigDecimal::from(order.coupon_discount))
        .bind(&order.coupon_reason)
        .bind(BigDecimal::from(order.loyalty_discount))
        .bind(BigDecimal::from(order.delivery))
        .bind(BigDecimal::from(order.packaging))
        .bind(BigDecimal::from(order.amount_payable))
        .bind(&order.payment_method)
        .bind(&order.payment_status)
        .bind(&order.order_mode)
        .bind(&order.transaction_id)
        .bind(&order.notes)
        .bind(order.breakdown_mode.as_str())
        .bind(order.earned_points)
        .bind(order.redeemed_points)
        .bind(order.order_date)
        .bind(order.client_tz_offset_minutes)
        .bind(order.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(Order::try_from(row)?)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        convert_one(row)
    }

    async fn orders_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ANY($1) ORDER BY created_at DESC"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        convert(rows)
    }

    async fn list_coupons(&self, enabled: Option<bool>) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE ($1::BOOLEAN IS NULL OR enabled = $1) ORDER BY created_at DESC"
        ))
        .bind(enabled)
        .fetch_all(&self.db)
        .await?;
        convert(rows)
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.db)
            .await?;
        convert_one(row)
    }

    async fn get_coupon(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        convert_one(row)
    }

    async fn insert_coupon(&self, coupon: Coupon) -> StoreResult<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "INSERT INTO coupons ({COUPON_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {COUPON_COLUMNS}"
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.discount)
        .bind(coupon.percent)
        .bind(coupon.amount.map(BigDecimal::from))
        .bind(BigDecimal::from(coupon.min_order))
        .bind(coupon.max_value.map(BigDecimal::from))
        .bind(coupon.expiry_date)
        .bind(coupon.enabled)
        .bind(coupon.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(Coupon::try_from(row)?)
    }

    async fn update_coupon(&self, coupon: Coupon) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "UPDATE coupons SET code = $2, discount = $3, percent = $4, amount = $5, min_order = $6, \
             max_value = $7, expiry_date = $8, enabled = $9 WHERE id = $1 RETURNING {COUPON_COLUMNS}"
        ))
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(&coupon.discount)
        .bind(coupon.percent)
        .bind(coupon.amount.map(BigDecimal::from))
        .bind(BigDecimal::from(coupon.min_order))
        .bind(coupon.max_value.map(BigDecimal::from))
        .bind(coupon.expiry_date)
        .bind(coupon.enabled)
        .fetch_optional(&self.db)
        .await?;
        convert_one(row)
    }

    async fn delete_coupon(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_coupon_enabled(&self, key: CouponKey, enabled: Option<bool>) -> StoreResult<Option<Coupon>> {
        let filter = match key {
            CouponKey::Id(_) => "id = $2",
            CouponKey::Code(_) => "code = $2",
        };
        let sql = format!(
            "UPDATE coupons SET enabled = COALESCE($1::BOOLEAN, NOT enabled) WHERE {filter} RETURNING {COUPON_COLUMNS}"
        );
        let query = sqlx::query_as::<_, CouponRow>(&sql).bind(enabled);
        let query = match key {
            CouponKey::Id(id) => query.bind(id),
            CouponKey::Code(code) => query.bind(code),
        };
        let row = query.fetch_optional(&self.db).await?;
        convert_one(row)
    }

    async fn point_slabs(&self) -> StoreResult<Vec<PointsSlab>> {
        let rows = sqlx::query_as::<_, SlabRow>(
            "SELECT id, lower_bound, upper_bound, loyalty_points FROM point_slabs ORDER BY lower_bound",
        )
        .fetch_all(&self.db)
        .await?;
        convert(rows)
    }

    async fn insert_slab(&self, slab: PointsSlab) -> StoreResult<PointsSlab> {
        let row = sqlx::query_as::<_, SlabRow>(
            "INSERT INTO point_slabs (id, lower_bound, upper_bound, loyalty_points) VALUES ($1, $2, $3, $4) \
             RETURNING id, lower_bound, upper_bound, loyalty_points",
        )
        .bind(slab.id)
        .bind(BigDecimal::from(slab.lower))
        .bind(BigDecimal::from(slab.upper))
        .bind(slab.loyalty_points)
        .fetch_one(&self.db)
        .await?;
        Ok(PointsSlab::try_from(row)?)
    }

    async fn delete_slab(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM point_slabs WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
