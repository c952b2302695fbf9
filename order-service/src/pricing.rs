//! Line-item pricing for checkout.
//!
//! A client `unitPrice` is ambiguous: some app builds send the base price and
//! list options separately, others send a unit price that already bundles the
//! option costs. Both readings are priced and the one closest to the client's
//! own subtotal wins (EXCLUDE on ties or when no subtotal is sent).

use common_money::{nearly_equal, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{OrderLine, OrderOption};
use crate::vendor::payload::{AmountKind, SaleCharge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BreakdownMode {
    /// `unitPrice` already contains the option costs.
    Include,
    /// `unitPrice` is the base price; options are added on top.
    Exclude,
}

impl BreakdownMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakdownMode::Include => "INCLUDE",
            BreakdownMode::Exclude => "EXCLUDE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INCLUDE" => Some(BreakdownMode::Include),
            "EXCLUDE" => Some(BreakdownMode::Exclude),
            _ => None,
        }
    }
}

/// Largest quantity accepted on a line or option.
pub const MAX_QUANTITY: f64 = 10_000.0;
/// Largest unit price or option amount accepted (one crore).
pub const MAX_UNIT_PRICE: Money = Money::from_cents(1_000_000_000);

#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    #[error("line {line}: quantity {quantity} is out of range")]
    Quantity { line: usize, quantity: f64 },
    #[error("line {line}: amount {amount} is out of range")]
    Amount { line: usize, amount: Money },
}

/// Reject carts whose quantities or prices are too large to price meaningfully.
pub fn check_lines(lines: &[OrderLine]) -> Result<(), LineError> {
    for (idx, line) in lines.iter().enumerate() {
        let number = idx + 1;
        let quantities = std::iter::once(line.quantity).chain(line.options.iter().filter_map(|o| o.quantity));
        for quantity in quantities {
            if quantity.abs() > MAX_QUANTITY {
                return Err(LineError::Quantity { line: number, quantity });
            }
        }
        let amounts = [Some(line.unit_price), line.original_unit_price]
            .into_iter()
            .chain(line.options.iter().flat_map(|o| [o.unit_price, o.amount]))
            .flatten();
        for amount in amounts {
            if amount.abs() > MAX_UNIT_PRICE {
                return Err(LineError::Amount { line: number, amount });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOption {
    pub name: String,
    pub option_id: Option<String>,
    pub sku_code: String,
    pub quantity: f64,
    pub unit_price: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub short_name: String,
    pub long_name: Option<String>,
    pub variants: Option<String>,
    pub sku_code: String,
    pub measuring_unit: Option<String>,
    pub note: Option<String>,
    pub quantity: f64,
    /// Base unit price, never including options.
    pub unit_price: Money,
    pub item_amount: Money,
    pub option_amount: Money,
    pub item_total: Money,
    pub options: Vec<PricedOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLines {
    pub items: Vec<PricedItem>,
    pub total: Money,
    pub mode: BreakdownMode,
    pub exclude_total: Money,
    pub include_total: Money,
}

struct PreparedLine<'a> {
    line: &'a OrderLine,
    qty: f64,
    unit_raw: Money,
    base_hint: Option<Money>,
    option_sum: Money,
    options: Vec<PricedOption>,
}

fn clamp_qty(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn price_option(option: &OrderOption) -> PricedOption {
    let quantity = clamp_qty(option.quantity.unwrap_or(1.0));
    let unit_price = option
        .unit_price
        .or(option.amount)
        .unwrap_or(Money::ZERO)
        .non_negative();
    let amount = match option.amount {
        Some(amount) => amount.non_negative(),
        None => unit_price.times(quantity),
    };
    let name = if option.name.trim().is_empty() {
        "Option".to_string()
    } else {
        option.name.clone()
    };
    PricedOption {
        name,
        option_id: option.option_id.clone(),
        sku_code: option.sku_code.clone(),
        quantity,
        unit_price,
        amount,
    }
}

fn prepare(line: &OrderLine) -> PreparedLine<'_> {
    let options: Vec<PricedOption> = line.options.iter().map(price_option).collect();
    let option_sum = options.iter().map(|o| o.amount).sum();
    PreparedLine {
        line,
        qty: clamp_qty(line.quantity),
        unit_raw: line.unit_price.non_negative(),
        base_hint: line.original_unit_price.map(Money::non_negative),
        option_sum,
        options,
    }
}

/// Choose the interpretation whose total sits closest to the client subtotal.
pub fn choose_mode(exclude_total: Money, include_total: Money, reference: Option<Money>) -> BreakdownMode {
    match reference {
        Some(reference) if include_total.abs_diff(reference) < exclude_total.abs_diff(reference) => {
            BreakdownMode::Include
        }
        _ => BreakdownMode::Exclude,
    }
}

pub fn build_items(lines: &[OrderLine], reference: Option<Money>) -> PricedLines {
    let prepared: Vec<PreparedLine<'_>> = lines.iter().map(prepare).collect();

    let exclude_total: Money = prepared
        .iter()
        .map(|p| p.base_hint.unwrap_or(p.unit_raw).times(p.qty) + p.option_sum)
        .sum();
    let include_total: Money = prepared.iter().map(|p| p.unit_raw.times(p.qty)).sum();
    let mode = choose_mode(exclude_total, include_total, reference);

    debug!(
        exclude = %exclude_total,
        include = %include_total,
        reference = ?reference.map(|r| r.to_string()),
        mode = mode.as_str(),
        "priced order lines"
    );

    let items: Vec<PricedItem> = prepared
        .into_iter()
        .map(|p| {
            let unit_price = match mode {
                BreakdownMode::Exclude => p.base_hint.unwrap_or(p.unit_raw),
                BreakdownMode::Include if p.qty > 0.0 => p
                    .base_hint
                    .unwrap_or_else(|| p.unit_raw - p.option_sum.divided_by(p.qty))
                    .non_negative(),
                BreakdownMode::Include => p.base_hint.unwrap_or(p.unit_raw),
            };
            let item_amount = unit_price.times(p.qty);
            let item_total = match mode {
                BreakdownMode::Exclude => item_amount + p.option_sum,
                BreakdownMode::Include => p.unit_raw.times(p.qty),
            };
            let short_name = if p.line.short_name.trim().is_empty() {
                "Item".to_string()
            } else {
                p.line.short_name.clone()
            };
            PricedItem {
                short_name,
                long_name: p.line.long_name.clone(),
                variants: p.line.variants.clone(),
                sku_code: p.line.sku_code.clone(),
                measuring_unit: p.line.measuring_unit.clone(),
                note: p.line.note.clone(),
                quantity: p.qty,
                unit_price,
                item_amount,
                option_amount: p.option_sum,
                item_total,
                options: p.options,
            }
        })
        .collect();

    let total = items.iter().map(|i| i.item_total).sum();
    PricedLines {
        items,
        total,
        mode,
        exclude_total,
        include_total,
    }
}

/// Trust the client subtotal when it agrees with ours to the cent.
pub fn reconcile_subtotal(computed: Money, from_app: Option<Money>) -> Money {
    match from_app {
        Some(app) if nearly_equal(app, computed, 1) => app,
        _ => computed,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectCharges {
    pub charges: Vec<SaleCharge>,
    pub total: Money,
}

/// Packaging then delivery; zero fees produce no entry.
pub fn build_charges(delivery: Money, packaging: Money) -> DirectCharges {
    let mut charges = Vec::new();
    for (name, fee) in [("Packaging", packaging.non_negative()), ("Delivery", delivery.non_negative())] {
        if fee.is_positive() {
            charges.push(SaleCharge {
                name: name.to_string(),
                kind: AmountKind::Absolute,
                rate: fee,
                amount: fee,
                is_direct_charge: true,
            });
        }
    }
    let total = charges.iter().map(|c| c.amount).sum();
    DirectCharges { charges, total }
}

/// Final money breakdown of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub subtotal: Money,
    pub coupon_discount: Money,
    pub loyalty_discount: Money,
    pub delivery: Money,
    pub packaging: Money,
    pub amount_payable: Money,
}

impl Bill {
    /// Discounts only ever reduce the items subtotal; direct charges are added afterwards.
    pub fn compute(subtotal: Money, coupon: Money, loyalty: Money, delivery: Money, packaging: Money) -> Self {
        let delivery = delivery.non_negative();
        let packaging = packaging.non_negative();
        let discounted = (subtotal - coupon - loyalty).non_negative();
        Self {
            subtotal,
            coupon_discount: coupon,
            loyalty_discount: loyalty,
            delivery,
            packaging,
            amount_payable: discounted + delivery + packaging,
        }
    }

    /// Discount reported to the vendor; never larger than the subtotal.
    pub fn vendor_discount(&self) -> Money {
        (self.coupon_discount + self.loyalty_discount).min(self.subtotal).non_negative()
    }
}
