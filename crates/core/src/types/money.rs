//! Chilean peso arithmetic.
//!
//! CLP has no minor unit. Amounts are carried as [`Decimal`] so intermediate
//! tax math stays exact, and every amount that leaves a calculation is
//! rounded to whole pesos with [`round_clp`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Chilean IVA (19%).
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// Largest amount a sale total or payment column holds (`NUMERIC(14, 0)`).
pub const MAX_CLP_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 0);

/// Round to whole pesos, half away from zero.
#[must_use]
pub fn round_clp(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax-inclusive amount for a net amount.
#[must_use]
pub fn gross_from_net(net: Decimal, tax_rate: Decimal) -> Decimal {
    round_clp(net * (Decimal::ONE + tax_rate))
}

/// Net amount contained in a tax-inclusive amount.
#[must_use]
pub fn net_from_gross(gross: Decimal, tax_rate: Decimal) -> Decimal {
    round_clp(gross / (Decimal::ONE + tax_rate))
}

/// Display form used on receipts: `$1.234.567`.
#[must_use]
pub fn format_clp(amount: Decimal) -> String {
    let rounded = round_clp(amount);
    let digits = rounded.abs().trunc().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    out.push('$');
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_tax_rate() {
        assert_eq!(DEFAULT_TAX_RATE, dec!(0.19));
        assert_eq!(MAX_CLP_AMOUNT, dec!(99_999_999_999_999));
    }

    #[test]
    fn test_round_clp_half_away_from_zero() {
        assert_eq!(round_clp(dec!(100.5)), dec!(101));
        assert_eq!(round_clp(dec!(100.49)), dec!(100));
        assert_eq!(round_clp(dec!(-100.5)), dec!(-101));
    }

    #[test]
    fn test_gross_and_net() {
        assert_eq!(gross_from_net(dec!(10000), DEFAULT_TAX_RATE), dec!(11900));
        assert_eq!(net_from_gross(dec!(11900), DEFAULT_TAX_RATE), dec!(10000));
        // 9990 / 1.19 = 8394.96...
        assert_eq!(net_from_gross(dec!(9990), DEFAULT_TAX_RATE), dec!(8395));
    }

    #[test]
    fn test_format_clp() {
        assert_eq!(format_clp(dec!(0)), "$0");
        assert_eq!(format_clp(dec!(990)), "$990");
        assert_eq!(format_clp(dec!(12990)), "$12.990");
        assert_eq!(format_clp(dec!(1234567.4)), "$1.234.567");
        assert_eq!(format_clp(dec!(-5000)), "-$5.000");
    }
}
