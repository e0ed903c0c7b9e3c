//! Catalog helpers shared by single-product and bulk operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, round_clp};

/// A price change applied to one or many products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PriceAdjustment {
    /// Raise (positive) or lower (negative) by a percentage.
    Percent(Decimal),
    /// Add a fixed amount; negative lowers the price.
    Amount(Decimal),
    /// Replace the price.
    Set(Decimal),
}

impl PriceAdjustment {
    /// New price in whole pesos, never below zero.
    ///
    /// ```
    /// use optica_core::catalog::PriceAdjustment;
    /// use rust_decimal::Decimal;
    ///
    /// let price = Decimal::from(39_990);
    /// assert_eq!(PriceAdjustment::Percent(Decimal::from(10)).apply(price), Ok(Decimal::from(43_989)));
    /// assert_eq!(PriceAdjustment::Amount(Decimal::from(-50_000)).apply(price), Ok(Decimal::ZERO));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::PriceOutOfRange`] if the result would exceed
    /// [`MAX_PRICE`].
    pub fn apply(&self, price: Decimal) -> Result<Decimal, CatalogError> {
        let next = match *self {
            Self::Percent(p) => price
                .checked_mul(p)
                .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
                .and_then(|d| price.checked_add(d)),
            Self::Amount(delta) => price.checked_add(delta),
            Self::Set(value) => Some(value),
        }
        .ok_or(CatalogError::PriceOutOfRange)?;
        let next = round_clp(next).max(Decimal::ZERO);
        if next > MAX_PRICE {
            return Err(CatalogError::PriceOutOfRange);
        }
        Ok(next)
    }
}

/// Per-item result of a bulk operation.
///
/// Bulk endpoints keep going after a failed item and report every failure
/// alongside the successes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<ProductId>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: ProductId,
    pub reason: String,
}

impl BulkOutcome {
    pub fn record<E: std::fmt::Display>(&mut self, id: ProductId, result: Result<(), E>) {
        match result {
            Ok(()) => self.succeeded.push(id),
            Err(e) => self.failed.push(BulkFailure {
                id,
                reason: e.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Errors for catalog input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("SKU cannot be empty")]
    EmptySku,
    #[error("SKU must be at most {max} characters")]
    SkuTooLong { max: usize },
    #[error("product name cannot be empty")]
    EmptyName,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("price must be whole pesos")]
    FractionalPrice,
    #[error("price cannot exceed {MAX_PRICE}")]
    PriceOutOfRange,
    #[error("inventory cannot go below zero (have {available}, change {delta})")]
    NegativeInventory { available: i32, delta: i32 },
}

pub const MAX_SKU_LENGTH: usize = 64;

/// Largest shelf price the products table holds (`NUMERIC(12, 0)`).
pub const MAX_PRICE: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 0);

/// Canonical SKU: trimmed, uppercased, internal whitespace removed.
///
/// # Errors
///
/// Returns an error if nothing is left after normalization or the result is
/// too long.
pub fn normalize_sku(raw: &str) -> Result<String, CatalogError> {
    let sku: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    if sku.is_empty() {
        return Err(CatalogError::EmptySku);
    }
    if sku.chars().count() > MAX_SKU_LENGTH {
        return Err(CatalogError::SkuTooLong {
            max: MAX_SKU_LENGTH,
        });
    }
    Ok(sku)
}

/// Validate a shelf price.
///
/// # Errors
///
/// Returns an error for negative, fractional or out-of-range prices.
pub fn validate_price(price: Decimal) -> Result<(), CatalogError> {
    if price < Decimal::ZERO {
        return Err(CatalogError::NegativePrice);
    }
    if price > MAX_PRICE {
        return Err(CatalogError::PriceOutOfRange);
    }
    if round_clp(price) != price {
        return Err(CatalogError::FractionalPrice);
    }
    Ok(())
}

/// Apply a stock movement.
///
/// # Errors
///
/// Returns an error if the result would be negative or overflow.
pub const fn adjust_inventory(available: i32, delta: i32) -> Result<i32, CatalogError> {
    match available.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        _ => Err(CatalogError::NegativeInventory { available, delta }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_adjustment_rounds() {
        // 9990 * 0.95 = 9490.5
        assert_eq!(PriceAdjustment::Percent(dec!(-5)).apply(dec!(9990)).unwrap(), dec!(9491));
        assert_eq!(PriceAdjustment::Percent(dec!(-150)).apply(dec!(9990)).unwrap(), dec!(0));
    }

    #[test]
    fn test_amount_and_set() {
        assert_eq!(PriceAdjustment::Amount(dec!(1000)).apply(dec!(9990)).unwrap(), dec!(10990));
        assert_eq!(PriceAdjustment::Set(dec!(4990.4)).apply(dec!(9990)).unwrap(), dec!(4990));
        assert_eq!(PriceAdjustment::Set(dec!(-1)).apply(dec!(9990)).unwrap(), dec!(0));
    }

    #[test]
    fn test_huge_adjustments_rejected() {
        let price = dec!(39990);
        assert_eq!(
            PriceAdjustment::Percent(Decimal::MAX).apply(price),
            Err(CatalogError::PriceOutOfRange)
        );
        assert_eq!(
            PriceAdjustment::Amount(Decimal::MAX).apply(price),
            Err(CatalogError::PriceOutOfRange)
        );
        assert_eq!(
            PriceAdjustment::Set(MAX_PRICE + dec!(1)).apply(price),
            Err(CatalogError::PriceOutOfRange)
        );
        assert_eq!(PriceAdjustment::Set(MAX_PRICE).apply(price), Ok(MAX_PRICE));
        assert_eq!(MAX_PRICE, dec!(999_999_999_999));
    }

    #[test]
    fn test_bulk_outcome_records() {
        let mut outcome = BulkOutcome::default();
        outcome.record::<String>(ProductId::new(1), Ok(()));
        outcome.record(ProductId::new(2), Err("not found"));

        assert_eq!(outcome.succeeded, vec![ProductId::new(1)]);
        assert_eq!(outcome.failed[0].reason, "not found");
        assert!(outcome.is_partial());
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku("  rb-3025 58 ").unwrap(), "RB-302558");
        assert_eq!(normalize_sku(" \t "), Err(CatalogError::EmptySku));
        assert!(matches!(
            normalize_sku(&"x".repeat(65)),
            Err(CatalogError::SkuTooLong { .. })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(dec!(0)).is_ok());
        assert_eq!(validate_price(dec!(-1)), Err(CatalogError::NegativePrice));
        assert_eq!(validate_price(dec!(10.5)), Err(CatalogError::FractionalPrice));
        assert!(validate_price(MAX_PRICE).is_ok());
        assert_eq!(
            validate_price(MAX_PRICE + dec!(1)),
            Err(CatalogError::PriceOutOfRange)
        );
    }

    #[test]
    fn test_adjust_inventory() {
        assert_eq!(adjust_inventory(5, -5), Ok(0));
        assert_eq!(adjust_inventory(5, 3), Ok(8));
        assert_eq!(
            adjust_inventory(2, -3),
            Err(CatalogError::NegativeInventory {
                available: 2,
                delta: -3
            })
        );
    }
}
