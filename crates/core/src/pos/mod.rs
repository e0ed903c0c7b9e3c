//! Point-of-sale arithmetic.
//!
//! Everything here is pure: a cart arrives in a request payload, is priced
//! with [`compute_totals`], paid with [`settle`] and only then persisted by
//! the admin checkout service.
//!
//! All amounts are whole Chilean pesos carried as [`Decimal`](rust_decimal::Decimal).

mod cart;
mod discount;
mod document;
mod settlement;
mod totals;

pub use cart::{Cart, LineItem};
pub use discount::Discount;
pub use document::check_document;
pub use settlement::{Payment, Settlement, settle};
pub use totals::{LinePrice, Totals, compute_totals};

use rust_decimal::Decimal;

use crate::types::ProductId;

/// Errors raised by cart, payment and document rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PosError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    #[error("unit price cannot be negative")]
    NegativePrice,

    #[error("payment amounts must be positive whole pesos")]
    InvalidPayment,

    #[error("at least one payment is required")]
    NoPayment,

    #[error("card and transfer payments cannot exceed the amount due ({due})")]
    NonCashOverpayment { due: Decimal },

    #[error("nothing is owed on this sale")]
    NothingDue,

    #[error("a factura requires a customer")]
    FacturaRequiresCustomer,

    #[error("a factura requires the customer's RUT")]
    FacturaRequiresRut,

    #[error("a factura requires the customer's business name")]
    FacturaRequiresBusinessName,
}
