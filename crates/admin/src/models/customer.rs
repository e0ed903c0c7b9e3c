//! Customer and prescription types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optica_core::lens::Prescription;
use optica_core::{CustomerId, Email, OrganizationId, PrescriptionId, Rut, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub rut: Option<Rut>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    /// Razón social, required to issue a factura.
    pub business_name: Option<String>,
    /// Giro, printed on facturas.
    pub business_activity: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub rut: Option<Rut>,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_activity: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A stored refraction for a customer.
#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionRecord {
    pub id: PrescriptionId,
    pub customer_id: CustomerId,
    #[serde(flatten)]
    pub rx: Prescription,
    /// Millimetres.
    pub pupillary_distance: Option<Decimal>,
    pub prescriber: Option<String>,
    pub notes: Option<String>,
    pub issued_on: NaiveDate,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionInput {
    #[serde(flatten)]
    pub rx: Prescription,
    #[serde(default)]
    pub pupillary_distance: Option<Decimal>,
    #[serde(default)]
    pub prescriber: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub issued_on: NaiveDate,
}
