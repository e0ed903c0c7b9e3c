//! Ophthalmic lens pricing.
//!
//! A lens family (for example "Varilux Comfort 1.6 AR") is priced through a
//! matrix of rows, each covering a sphere range, a cylinder range and
//! optionally an addition range. Prescriptions are looked up in
//! minus-cylinder form.

mod matrix;
mod prescription;
mod solutions;

pub use matrix::{LensFamily, MatrixRow, PairPrice, price_lookup, price_pair};
pub use prescription::{EyeRx, Prescription};
pub use solutions::{Solution, SolutionKind, presbyopia_solutions};

use rust_decimal::Decimal;

use crate::types::Eye;

/// Errors raised by prescription validation and matrix pricing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    #[error("{field} {value} is outside the allowed range {min}..{max}")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("{field} {value} must be a multiple of 0.25")]
    NotQuarterStep { field: &'static str, value: Decimal },

    #[error("axis {0} must be between 0 and 180")]
    InvalidAxis(u16),

    #[error("{family} has no price for the {eye} eye")]
    NoCoverage { family: String, eye: Eye },

    #[error("matrix row has an inverted {0} range")]
    InvertedRange(&'static str),

    #[error("matrix row price and cost cannot be negative")]
    NegativePrice,
}
