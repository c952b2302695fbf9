use bigdecimal::BigDecimal;
use common_money::{normalize_scale, Money};
use proptest::prelude::*;
use std::str::FromStr;

proptest! {
    // A thousandths digit of 5 or more always moves the cent up for positive values.
    #[test]
    fn half_up_on_thousandths(base_cents in 0i64..1_000_000, thousandth in 0i64..10) {
        let s = format!("{}.{:02}{}", base_cents / 100, base_cents % 100, thousandth);
        let bd = BigDecimal::from_str(&s).unwrap();
        let money = Money::try_from(&bd).unwrap();
        let expected = if thousandth >= 5 { base_cents + 1 } else { base_cents };
        prop_assert_eq!(money.as_cents(), expected, "input={}", s);
    }

    // Normalizing an already two-decimal value is the identity.
    #[test]
    fn normalize_is_idempotent(cents in -1_000_000i64..1_000_000) {
        let bd: BigDecimal = Money::from_cents(cents).into();
        prop_assert_eq!(normalize_scale(&bd), bd.clone());
        prop_assert_eq!(normalize_scale(&normalize_scale(&bd)), bd);
    }

    // Multiplying by a whole quantity is exact in minor units.
    #[test]
    fn times_whole_quantity_is_exact(cents in 0i64..10_000_000, qty in 0u32..50) {
        let m = Money::from_cents(cents).times(f64::from(qty));
        prop_assert_eq!(m.as_cents(), cents * i64::from(qty));
    }

    // JSON numbers and numeric strings decode to the same amount.
    #[test]
    fn json_number_and_string_agree(cents in 0i64..10_000_000) {
        let text = Money::from_cents(cents).to_string();
        let from_str: Money = serde_json::from_str(&format!("\"{text}\"")).unwrap();
        let from_num: Money = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(from_str, from_num);
        prop_assert_eq!(from_num.as_cents(), cents);
    }
}

#[test]
fn rejects_non_numeric_shapes() {
    assert!(serde_json::from_str::<Money>("{\"amount\": 1}").is_err());
    assert!(serde_json::from_str::<Money>("\"ten\"").is_err());
    assert!(serde_json::from_str::<Money>("[1]").is_err());
}
