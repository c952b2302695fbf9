use chrono::Utc;
use common_money::Money;
use order_service::coupons::evaluate;
use order_service::loyalty::redeem;
use order_service::models::{Coupon, OrderLine, OrderOption};
use order_service::pricing::{build_items, Bill, BreakdownMode};
use order_service::vendor::ladder::{line_shares, prorate};
use proptest::prelude::*;
use uuid::Uuid;

fn line_strategy() -> impl Strategy<Value = OrderLine> {
    let base_hint = prop::option::weighted(0.3, 0i64..50_000);
    let options = prop::collection::vec(0i64..5_000, 0..3);
    (1u32..6, 0i64..50_000, base_hint, options).prop_map(|(qty, unit, base, options)| OrderLine {
        short_name: "Item".into(),
        long_name: None,
        variants: None,
        sku_code: "SKU".into(),
        quantity: f64::from(qty),
        unit_price: Money::from_cents(unit),
        original_unit_price: base.map(Money::from_cents),
        measuring_unit: None,
        note: None,
        options: options
            .into_iter()
            .map(|cents| OrderOption {
                name: "Extra".into(),
                option_id: None,
                sku_code: "OPT".into(),
                quantity: None,
                unit_price: None,
                amount: Some(Money::from_cents(cents)),
            })
            .collect(),
    })
}

fn coupon(percent: Option<f64>, amount: Option<i64>, max_value: Option<i64>) -> Coupon {
    Coupon {
        id: Uuid::new_v4(),
        code: "PROP".into(),
        discount: None,
        percent,
        amount: amount.map(Money::from_cents),
        min_order: Money::ZERO,
        max_value: max_value.map(Money::from_cents),
        expiry_date: None,
        enabled: true,
        created_at: Utc::now(),
    }
}

proptest! {
    #[test]
    fn prorated_shares_sum_exactly(total in 0i64..10_000_000, weights in prop::collection::vec(0i64..1_000_000, 1..12)) {
        let weights: Vec<Money> = weights.into_iter().map(Money::from_cents).collect();
        let shares = prorate(Money::from_cents(total), &weights);
        prop_assert_eq!(shares.len(), weights.len());
        prop_assert_eq!(shares.iter().sum::<Money>(), Money::from_cents(total));
        prop_assert!(shares.iter().all(|s| *s >= Money::ZERO));
    }

    #[test]
    fn capped_line_shares_fit_their_lines(total in 0i64..10_000_000, weights in prop::collection::vec(0i64..1_000_000, 1..12)) {
        let weights: Vec<Money> = weights.into_iter().map(Money::from_cents).collect();
        let room: Money = weights.iter().sum();
        match line_shares(Money::from_cents(total), &weights) {
            Some(shares) => {
                prop_assert_eq!(shares.iter().sum::<Money>(), Money::from_cents(total).min(room));
                for (share, weight) in shares.iter().zip(&weights) {
                    prop_assert!(*share >= Money::ZERO && share <= weight);
                }
            }
            None => {
                prop_assert!(room.is_zero());
            }
        }
    }

    #[test]
    fn builder_totals_are_consistent(lines in prop::collection::vec(line_strategy(), 1..6)) {
        let priced = build_items(&lines, None);
        prop_assert_eq!(priced.mode, BreakdownMode::Exclude);
        prop_assert_eq!(priced.total, priced.items.iter().map(|i| i.item_total).sum::<Money>());
        for item in &priced.items {
            prop_assert_eq!(item.item_total, item.item_amount + item.option_amount);
        }
        prop_assert_eq!(priced.total, priced.exclude_total);
    }

    #[test]
    fn reference_matching_exclude_keeps_exclude(lines in prop::collection::vec(line_strategy(), 1..6)) {
        let first = build_items(&lines, None);
        let again = build_items(&lines, Some(first.exclude_total));
        prop_assert_eq!(again.mode, BreakdownMode::Exclude);
    }

    #[test]
    fn mode_is_the_closest_candidate(
        lines in prop::collection::vec(line_strategy(), 1..6),
        reference in 0i64..2_000_000,
    ) {
        let reference = Money::from_cents(reference);
        let priced = build_items(&lines, Some(reference));
        let to_exclude = priced.exclude_total.abs_diff(reference);
        let to_include = priced.include_total.abs_diff(reference);
        match priced.mode {
            BreakdownMode::Exclude => {
                prop_assert!(to_exclude <= to_include);
            }
            BreakdownMode::Include => {
                prop_assert!(to_include < to_exclude);
            }
        }

        let spread = priced.exclude_total.as_cents() + priced.include_total.as_cents();
        if spread % 2 == 0 {
            let midpoint = Money::from_cents(spread / 2);
            prop_assert_eq!(build_items(&lines, Some(midpoint)).mode, BreakdownMode::Exclude);
        }
    }

    #[test]
    fn include_mode_keeps_the_client_line_total(lines in prop::collection::vec(line_strategy(), 1..6)) {
        let unreferenced = build_items(&lines, None);
        prop_assume!(unreferenced.include_total != unreferenced.exclude_total);

        let priced = build_items(&lines, Some(unreferenced.include_total));
        prop_assert_eq!(priced.mode, BreakdownMode::Include);
        for (item, line) in priced.items.iter().zip(&lines) {
            prop_assert_eq!(item.item_total, line.unit_price.times(line.quantity));
            prop_assert!(item.unit_price >= Money::ZERO);
        }
        prop_assert_eq!(priced.total, priced.include_total);
    }

    #[test]
    fn coupon_discount_is_bounded(
        subtotal in 0i64..5_000_000,
        percent in prop::option::of(0.0f64..100.0),
        amount in prop::option::of(0i64..10_000_000),
        cap in prop::option::of(0i64..100_000),
    ) {
        let subtotal = Money::from_cents(subtotal);
        let outcome = evaluate(Some(coupon(percent, amount, cap)), subtotal, Utc::now());
        prop_assert!(outcome.reason.is_none());
        prop_assert!(outcome.amount >= Money::ZERO);
        prop_assert!(outcome.amount <= subtotal);
        if let (Some(_), Some(cap)) = (percent, cap) {
            prop_assert!(outcome.amount <= Money::from_cents(cap));
        }
    }

    #[test]
    fn redeem_never_exceeds_balance_or_request(requested in -10_000i64..10_000_000, balance in 0i64..100_000) {
        let requested = Money::from_cents(requested);
        let redeemed = redeem(requested, balance);
        prop_assert!(redeemed >= 0);
        prop_assert!(redeemed <= balance);
        prop_assert!(redeemed <= requested.whole_units().max(0));
    }

    #[test]
    fn payable_never_drops_below_charges(
        subtotal in 0i64..1_000_000,
        coupon in 0i64..2_000_000,
        loyalty in 0i64..2_000_000,
        delivery in 0i64..10_000,
        packaging in 0i64..10_000,
    ) {
        let bill = Bill::compute(
            Money::from_cents(subtotal),
            Money::from_cents(coupon),
            Money::from_cents(loyalty),
            Money::from_cents(delivery),
            Money::from_cents(packaging),
        );
        prop_assert!(bill.amount_payable >= Money::from_cents(delivery + packaging));
        prop_assert!(bill.vendor_discount() <= bill.subtotal);
    }
}
