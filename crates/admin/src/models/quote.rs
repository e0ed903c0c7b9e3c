//! Quote (presupuesto) types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use optica_core::pos::{Discount, LineItem, Payment, Totals};
use optica_core::{
    BranchId, CustomerId, DocumentType, OrganizationId, PrescriptionId, QuoteId, QuoteStatus,
    UserId,
};

use super::sale::CartRequest;

/// Days a quote stays valid when no date is given.
pub const DEFAULT_VALIDITY_DAYS: i64 = 15;

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub id: QuoteId,
    pub organization_id: OrganizationId,
    pub branch_id: Option<BranchId>,
    pub customer_id: Option<CustomerId>,
    pub prescription_id: Option<PrescriptionId>,
    pub status: QuoteStatus,
    pub lines: Vec<LineItem>,
    pub discount: Option<Discount>,
    pub totals: Totals,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Status as of `today`: an open quote past its validity date reads as
    /// expired even before anyone marks it.
    #[must_use]
    pub fn effective_status(&self, today: NaiveDate) -> QuoteStatus {
        if self.status.is_convertible() && self.valid_until < today {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteInput {
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub prescription_id: Option<PrescriptionId>,
    #[serde(flatten)]
    pub cart: CartRequest,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/quotes/{id}/status` body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuoteStatusRequest {
    pub status: QuoteStatus,
}

/// `POST /api/quotes/{id}/convert` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertQuoteRequest {
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub document_type: DocumentType,
    /// Defaults to the quote's branch, then the seller's.
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub customer_id: Option<CustomerId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quote(status: QuoteStatus, valid_until: NaiveDate) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId::new(1),
            organization_id: OrganizationId::new(1),
            branch_id: None,
            customer_id: None,
            prescription_id: None,
            status,
            lines: Vec::new(),
            discount: None,
            totals: Totals::default(),
            valid_until,
            notes: None,
            created_by: UserId::new(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_effective_status_expires_open_quotes() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let next = day.succ_opt().unwrap();

        assert_eq!(quote(QuoteStatus::Sent, day).effective_status(day), QuoteStatus::Sent);
        assert_eq!(quote(QuoteStatus::Sent, day).effective_status(next), QuoteStatus::Expired);
        assert_eq!(
            quote(QuoteStatus::Converted, day).effective_status(next),
            QuoteStatus::Converted
        );
    }
}
