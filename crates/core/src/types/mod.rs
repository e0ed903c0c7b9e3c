//! Core types for Optica.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod rut;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{
    DEFAULT_TAX_RATE, MAX_CLP_AMOUNT, format_clp, gross_from_net, net_from_gross, round_clp,
};
pub use rut::{Rut, RutError};
pub use status::*;
