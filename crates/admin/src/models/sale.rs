//! Sale, cart request and payment types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optica_core::pos::{Discount, LineItem, LinePrice, Payment, Settlement, Totals};
use optica_core::{
    BranchId, CustomerId, DocumentType, OrganizationId, PaymentId, PaymentMethod, ProductId,
    QuoteId, SaleId, SaleStatus, UserId,
};

/// A cart line as sent by the POS screen. Price, name and tax flag are
/// always read from the catalog, never trusted from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRequest {
    pub lines: Vec<CartLineRequest>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

/// `POST /api/pos/sales` body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub cart: CartRequest,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Defaults to the seller's branch.
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: i32,
    /// Tax-inclusive unit price.
    pub unit_price: Decimal,
    pub gross: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalePayment {
    pub id: PaymentId,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub change: Decimal,
    pub received_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: SaleId,
    pub organization_id: OrganizationId,
    pub branch_id: Option<BranchId>,
    pub seller_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub quote_id: Option<QuoteId>,
    pub document_type: DocumentType,
    pub folio: i64,
    pub status: SaleStatus,
    #[serde(flatten)]
    pub totals: Totals,
    pub paid: Decimal,
    pub balance: Decimal,
    pub lines: Vec<SaleLine>,
    pub payments: Vec<SalePayment>,
    pub void_reason: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of a checkout or balance payment: the sale plus what to hand back.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub customer_id: Option<CustomerId>,
    pub document_type: Option<DocumentType>,
}

/// `POST /api/pos/preview` response: the repriced cart and its totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartPreview {
    pub lines: Vec<PreviewLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    pub totals: Totals,
    pub item_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewLine {
    #[serde(flatten)]
    pub item: LineItem,
    pub sku: String,
    pub price: LinePrice,
}
