use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Discount, PosError, Totals, compute_totals};
use crate::types::{ProductId, round_clp};

/// One product line on the POS screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    /// Shelf price in whole pesos.
    pub unit_price: Decimal,
    /// Whether `unit_price` already includes IVA.
    pub tax_inclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
}

impl LineItem {
    /// Tax-inclusive unit price.
    #[must_use]
    pub fn gross_unit_price(&self, tax_rate: Decimal) -> Decimal {
        if self.tax_inclusive {
            self.unit_price
        } else {
            round_clp(self.unit_price * (Decimal::ONE + tax_rate))
        }
    }

    /// Tax-inclusive line amount before discounts.
    #[must_use]
    pub fn gross(&self, tax_rate: Decimal) -> Decimal {
        self.gross_unit_price(tax_rate) * Decimal::from(self.quantity)
    }
}

/// A POS cart: product lines plus an optional whole-cart discount.
///
/// Adding a product that is already in the cart merges the quantities into
/// the existing line, keeping that line's price and discount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    lines: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    discount: Option<Discount>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            discount: None,
        }
    }

    /// Build a cart from request lines, merging duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if any line has a zero quantity or a negative price.
    pub fn from_lines(
        lines: impl IntoIterator<Item = LineItem>,
        discount: Option<Discount>,
    ) -> Result<Self, PosError> {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line)?;
        }
        cart.discount = discount;
        Ok(cart)
    }

    /// Add a line, merging it into an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is zero or the price is negative.
    pub fn add(&mut self, item: LineItem) -> Result<(), PosError> {
        if item.quantity == 0 {
            return Err(PosError::InvalidQuantity);
        }
        if item.unit_price < Decimal::ZERO {
            return Err(PosError::NegativePrice);
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => self.lines.push(item),
        }
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), PosError> {
        if quantity == 0 {
            return if self.remove(product_id) {
                Ok(())
            } else {
                Err(PosError::NotInCart(product_id))
            };
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(PosError::NotInCart(product_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a product's line. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn set_discount(&mut self, discount: Option<Discount>) {
        self.discount = discount;
    }

    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    #[must_use]
    pub const fn discount(&self) -> Option<&Discount> {
        self.discount.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    #[must_use]
    pub fn totals(&self, tax_rate: Decimal) -> Totals {
        compute_totals(&self.lines, self.discount.as_ref(), tax_rate)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TAX_RATE;
    use rust_decimal_macros::dec;

    fn frame(id: i32, qty: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: format!("Marco {id}"),
            quantity: qty,
            unit_price: dec!(49990),
            tax_inclusive: true,
            discount: None,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        cart.add(frame(1, 1)).unwrap();
        cart.add(frame(2, 1)).unwrap();
        cart.add(frame(1, 2)).unwrap();

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_add_rejects_zero_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(frame(1, 0)), Err(PosError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_rejects_negative_price() {
        let mut line = frame(1, 1);
        line.unit_price = dec!(-1);
        assert_eq!(Cart::new().add(line), Err(PosError::NegativePrice));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::from_lines([frame(1, 2), frame(2, 1)], None).unwrap();
        cart.set_quantity(ProductId::new(1), 0).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(
            cart.set_quantity(ProductId::new(1), 4),
            Err(PosError::NotInCart(ProductId::new(1)))
        );
        cart.set_quantity(ProductId::new(2), 5).unwrap();
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_gross_tax_exclusive_rounds_unit_then_multiplies() {
        let line = LineItem {
            tax_inclusive: false,
            unit_price: dec!(8395),
            quantity: 3,
            ..frame(1, 1)
        };
        // 8395 * 1.19 = 9990.05 -> 9990
        assert_eq!(line.gross_unit_price(DEFAULT_TAX_RATE), dec!(9990));
        assert_eq!(line.gross(DEFAULT_TAX_RATE), dec!(29970));
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut cart = Cart::from_lines([frame(1, 1)], None).unwrap();
        assert!(cart.remove(ProductId::new(1)));
        assert!(!cart.remove(ProductId::new(1)));
    }
}
