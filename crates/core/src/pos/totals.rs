use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Discount, LineItem};
use crate::types::{net_from_gross, round_clp};

/// Priced breakdown of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    pub unit_price: Decimal,
    pub gross: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl LineItem {
    /// Gross, line discount and discounted total for this line.
    #[must_use]
    pub fn price(&self, tax_rate: Decimal) -> LinePrice {
        let gross = self.gross(tax_rate);
        let discount = self
            .discount
            .as_ref()
            .map_or(Decimal::ZERO, |d| d.amount_off(gross));
        LinePrice {
            unit_price: self.gross_unit_price(tax_rate),
            gross,
            discount,
            total: gross - discount,
        }
    }
}

/// Cart totals in whole pesos.
///
/// `total = subtotal - discount` and `net + tax = total` always hold, and no
/// field is ever negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Gross before any discount.
    pub subtotal: Decimal,
    /// Line discounts plus the cart discount.
    pub discount: Decimal,
    /// Gross after discounts. This is what the customer pays.
    pub total: Decimal,
    /// Net amount (total without IVA).
    pub net: Decimal,
    /// IVA contained in `total`.
    pub tax: Decimal,
}

/// Price a set of lines.
///
/// Line discounts apply to each line's gross; the cart discount then
/// applies to the sum of the discounted lines. Tax is extracted from the
/// final total, so rounding never makes `net + tax` drift from `total`.
#[must_use]
pub fn compute_totals(lines: &[LineItem], cart_discount: Option<&Discount>, tax_rate: Decimal) -> Totals {
    let tax_rate = tax_rate.max(Decimal::ZERO);

    let (subtotal, line_discount) = lines
        .iter()
        .map(|l| l.price(tax_rate))
        .fold((Decimal::ZERO, Decimal::ZERO), |(g, d), p| {
            (g + p.gross, d + p.discount)
        });

    let after_lines = subtotal - line_discount;
    let cart_off = cart_discount.map_or(Decimal::ZERO, |d| d.amount_off(after_lines));

    let discount = round_clp(line_discount + cart_off);
    let total = subtotal - discount;
    let net = net_from_gross(total, tax_rate);

    Totals {
        subtotal,
        discount,
        total,
        net,
        tax: total - net,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_TAX_RATE, ProductId};
    use rust_decimal_macros::dec;

    fn line(id: i32, price: Decimal, qty: u32, inclusive: bool) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: String::from("item"),
            quantity: qty,
            unit_price: price,
            tax_inclusive: inclusive,
            discount: None,
        }
    }

    fn assert_invariants(t: &Totals) {
        assert_eq!(t.total, t.subtotal - t.discount);
        assert_eq!(t.net + t.tax, t.total);
        for v in [t.subtotal, t.discount, t.total, t.net, t.tax] {
            assert!(v >= Decimal::ZERO, "{t:?}");
        }
    }

    #[test]
    fn test_empty_cart() {
        let t = compute_totals(&[], None, DEFAULT_TAX_RATE);
        assert_eq!(t, Totals::default());
    }

    #[test]
    fn test_tax_inclusive_extracts_iva() {
        let t = compute_totals(&[line(1, dec!(11900), 2, true)], None, DEFAULT_TAX_RATE);
        assert_eq!(t.subtotal, dec!(23800));
        assert_eq!(t.total, dec!(23800));
        assert_eq!(t.net, dec!(20000));
        assert_eq!(t.tax, dec!(3800));
        assert_invariants(&t);
    }

    #[test]
    fn test_mixed_lines_with_line_and_cart_discount() {
        let mut frame = line(1, dec!(50000), 1, true);
        frame.discount = Some(Discount::Percent(dec!(10)));
        let lenses = line(2, dec!(40000), 2, false); // 47600 each

        let t = compute_totals(
            &[frame, lenses],
            Some(&Discount::Amount(dec!(5000))),
            DEFAULT_TAX_RATE,
        );

        assert_eq!(t.subtotal, dec!(145200));
        assert_eq!(t.discount, dec!(10000));
        assert_eq!(t.total, dec!(135200));
        assert_invariants(&t);
    }

    #[test]
    fn test_cart_discount_applies_after_line_discounts() {
        let mut a = line(1, dec!(10000), 1, true);
        a.discount = Some(Discount::Amount(dec!(2000)));

        // 50% of the discounted 8000, not of 10000
        let t = compute_totals(&[a], Some(&Discount::Percent(dec!(50))), DEFAULT_TAX_RATE);
        assert_eq!(t.discount, dec!(6000));
        assert_eq!(t.total, dec!(4000));
        assert_invariants(&t);
    }

    #[test]
    fn test_oversized_discounts_never_go_negative() {
        let mut a = line(1, dec!(1000), 1, true);
        a.discount = Some(Discount::Amount(dec!(5000)));
        let t = compute_totals(&[a], Some(&Discount::Percent(dec!(300))), DEFAULT_TAX_RATE);
        assert_eq!(t.total, dec!(0));
        assert_eq!(t.tax, dec!(0));
        assert_invariants(&t);
    }

    #[test]
    fn test_rounding_keeps_net_plus_tax_equal_total() {
        for price in [dec!(1), dec!(990), dec!(9990), dec!(12345), dec!(33333)] {
            let t = compute_totals(&[line(1, price, 3, true)], None, DEFAULT_TAX_RATE);
            assert_invariants(&t);
        }
    }

    #[test]
    fn test_line_price_breakdown() {
        let mut l = line(1, dec!(8403), 1, false);
        l.discount = Some(Discount::Percent(dec!(10)));
        let p = l.price(DEFAULT_TAX_RATE);
        // 8403 * 1.19 = 9999.57
        assert_eq!(p.unit_price, dec!(10000));
        assert_eq!(p.discount, dec!(1000));
        assert_eq!(p.total, dec!(9000));
    }
}
