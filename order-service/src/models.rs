use chrono::{DateTime, NaiveDate, Utc};
use common_money::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::pricing::BreakdownMode;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub loyalty_points: i64,
    #[sqlx(rename = "order_ids")]
    pub orders: Vec<Uuid>,
    pub joined_at: DateTime<Utc>,
}

impl User {
    /// "First Last", or the phone number when both names are blank.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.trim(), self.last_name.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.phone.clone()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
}

/// One client order line. `unitPrice` may or may not already include the option costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(default, alias = "name")]
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<String>,
    #[serde(default)]
    pub sku_code: String,
    #[serde(default, alias = "qty")]
    pub quantity: f64,
    #[serde(default, alias = "price", alias = "rate")]
    pub unit_price: Money,
    #[serde(
        default,
        alias = "originalPrice",
        alias = "baseUnitPrice",
        alias = "unitBase",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_unit_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measuring_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub options: Vec<OrderOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOption {
    #[serde(default, alias = "shortName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
    #[serde(default)]
    pub sku_code: String,
    #[serde(default, alias = "qty", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, alias = "price", alias = "rate", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Money>,
    /// Authoritative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
}

/// Accepted shapes for a delivery address. Anything else is rejected at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AddressInput {
    Text(String),
    Lines(Vec<String>),
    Structured(StructuredAddress),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAddress {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "line", alias = "street", alias = "full")]
    pub address_line: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "pincode")]
    pub zip: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng")]
    pub longitude: Option<f64>,
}

impl AddressInput {
    /// Single-line rendering used when storing a user's address.
    pub fn to_line(&self) -> String {
        match self {
            AddressInput::Text(text) => text.trim().to_string(),
            AddressInput::Lines(lines) => join_lines(lines),
            AddressInput::Structured(addr) => {
                let parts = [
                    addr.address_line.as_deref(),
                    addr.landmark.as_deref(),
                    addr.city.as_deref(),
                    addr.state.as_deref(),
                    addr.zip.as_deref(),
                ];
                parts
                    .iter()
                    .flatten()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }
}

pub(crate) fn join_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checkout request body for `POST /order/new`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(default)]
    pub order: Vec<OrderLine>,
    /// Items subtotal as computed by the client.
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub handling: Money,
    #[serde(default)]
    pub delivery: Money,
    pub phone: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub order_mode: Option<String>,
    /// Rupee amount of loyalty points the customer wants to redeem.
    #[serde(default)]
    pub loyalty: Money,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default, rename = "TransactionID", alias = "transactionId")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_placed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_tz_offset_minutes: Option<i32>,
}

impl NewOrder {
    pub fn is_cash_on_delivery(&self) -> bool {
        self.payment_method
            .as_deref()
            .map(|m| m.trim().eq_ignore_ascii_case("COD"))
            .unwrap_or(false)
    }
}

/// Persisted checkout snapshot. Written once, before the vendor is contacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub phone: String,
    pub customer_name: String,
    pub lines: Value,
    pub subtotal: Money,
    pub coupon_code: Option<String>,
    pub coupon_discount: Money,
    pub coupon_reason: Option<String>,
    pub loyalty_discount: Money,
    pub delivery: Money,
    pub packaging: Money,
    pub amount_payable: Money,
    pub payment_method: String,
    pub payment_status: Option<String>,
    pub order_mode: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub breakdown_mode: BreakdownMode,
    pub earned_points: i64,
    pub redeemed_points: i64,
    pub order_date: DateTime<Utc>,
    pub client_tz_offset_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    /// Free-text description; a percentage is read out of it when `percent` is unset.
    pub discount: Option<String>,
    pub percent: Option<f64>,
    pub amount: Option<Money>,
    pub min_order: Money,
    pub max_value: Option<Money>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// `discount` as admins send it: a flat number or descriptive text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DiscountInput {
    Amount(f64),
    Text(String),
}

/// Booleans arrive either as JSON booleans or as "true"/"false" strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BoolInput {
    Bool(bool),
    Text(String),
}

impl BoolInput {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoolInput::Bool(value) => Some(*value),
            BoolInput::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub discount: Option<DiscountInput>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub min_order: Money,
    #[serde(default)]
    pub max_value: Option<Money>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub enabled: Option<BoolInput>,
}

/// Accepts RFC 3339 timestamps or bare dates (midnight UTC).
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointsSlab {
    pub id: Uuid,
    pub lower: Money,
    pub upper: Money,
    pub loyalty_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlab {
    pub lower: Money,
    pub upper: Money,
    pub loyalty_points: i64,
}
