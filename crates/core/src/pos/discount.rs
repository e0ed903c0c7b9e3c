use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::round_clp;

/// A discount on a line or on the whole cart.
///
/// Out-of-range values are clamped rather than rejected: percentages to
/// `[0, 100]`, amounts to `[0, base]`. A negative value yields no discount.
///
/// ```
/// use optica_core::pos::Discount;
/// use rust_decimal::Decimal;
///
/// let base = Decimal::from(10_000);
/// assert_eq!(Discount::Percent(Decimal::from(15)).amount_off(base), Decimal::from(1_500));
/// assert_eq!(Discount::Percent(Decimal::from(150)).amount_off(base), base);
/// assert_eq!(Discount::Amount(Decimal::from(-500)).amount_off(base), Decimal::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Percent(Decimal),
    Amount(Decimal),
}

impl Discount {
    /// Pesos taken off `base`, always within `[0, base]`.
    #[must_use]
    pub fn amount_off(&self, base: Decimal) -> Decimal {
        if base <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let off = match *self {
            Self::Percent(p) => {
                let p = p.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                round_clp(base * p / Decimal::ONE_HUNDRED)
            }
            Self::Amount(a) => round_clp(a.max(Decimal::ZERO)),
        };
        off.min(base)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_rounds_to_pesos() {
        // 12.5% of 9990 = 1248.75
        assert_eq!(Discount::Percent(dec!(12.5)).amount_off(dec!(9990)), dec!(1249));
    }

    #[test]
    fn test_percent_clamped() {
        assert_eq!(Discount::Percent(dec!(-10)).amount_off(dec!(5000)), dec!(0));
        assert_eq!(Discount::Percent(dec!(101)).amount_off(dec!(5000)), dec!(5000));
        assert_eq!(Discount::Percent(dec!(100)).amount_off(dec!(5000)), dec!(5000));
    }

    #[test]
    fn test_amount_clamped_to_base() {
        assert_eq!(Discount::Amount(dec!(7000)).amount_off(dec!(5000)), dec!(5000));
        assert_eq!(Discount::Amount(dec!(-1)).amount_off(dec!(5000)), dec!(0));
        assert_eq!(Discount::Amount(dec!(1000)).amount_off(dec!(5000)), dec!(1000));
    }

    #[test]
    fn test_zero_base() {
        assert_eq!(Discount::Amount(dec!(1000)).amount_off(dec!(0)), dec!(0));
        assert_eq!(Discount::Percent(dec!(50)).amount_off(dec!(0)), dec!(0));
    }

    #[test]
    fn test_serde_shape() {
        let d: Discount = serde_json::from_str(r#"{"kind":"percent","value":"10"}"#).unwrap();
        assert_eq!(d, Discount::Percent(dec!(10)));

        let d: Discount = serde_json::from_str(r#"{"kind":"amount","value":2500}"#).unwrap();
        assert_eq!(d, Discount::Amount(dec!(2500)));
    }
}
