//! Optica Core - Domain library for the optical retail back office.
//!
//! This crate holds everything that can be decided without I/O:
//! - `admin` - JSON API server uses it to price carts, lenses and bulk edits
//! - `cli` - Operator tooling uses it to validate imports before writing
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no database
//! access, no HTTP. The optional `postgres` feature adds `sqlx` encoding for
//! ids and enums so the admin crate can bind them directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, RUTs, CLP money helpers and status enums
//! - [`pos`] - Cart assembly, discount clamping, tax totals and payment settlement
//! - [`lens`] - Prescriptions, price-matrix lookup and presbyopia solutions
//! - [`catalog`] - Bulk product operations
//! - [`tenancy`] - Subscription plan limits and cascade-delete ordering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod lens;
pub mod pos;
pub mod tenancy;
pub mod types;

pub use types::*;
