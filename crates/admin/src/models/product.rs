//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optica_core::{OrganizationId, ProductCategory, ProductId, ProductStatus};

/// A sellable product: frame, sunglasses, contact lenses, accessory or service.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub sku: String,
    pub category: ProductCategory,
    pub brand: Option<String>,
    pub description: Option<String>,
    /// Whole pesos.
    pub price: Decimal,
    pub tax_inclusive: bool,
    pub inventory: i32,
    pub track_inventory: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub sku: String,
    pub category: ProductCategory,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub tax_inclusive: bool,
    #[serde(default)]
    pub inventory: i32,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
}

const fn default_true() -> bool {
    true
}

/// Search filter for the product list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Matches name, SKU or brand (case-insensitive).
    pub q: Option<String>,
    pub category: Option<ProductCategory>,
    pub status: Option<ProductStatus>,
}
