//! Quotes (presupuestos): priced carts a customer can accept and later
//! convert into a sale.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};

use optica_core::pos::Cart;
use optica_core::{OrganizationId, QuoteId, QuoteStatus};

use super::ServiceError;
use super::checkout::{CheckoutService, Order, SaleContext, build_cart, check_buyer_for, place};
use super::tenancy::ensure_usable;
use crate::db::quotes::{self, NewQuote};
use crate::db::{CustomerRepository, ProductRepository, QuoteRepository};
use crate::models::quote::DEFAULT_VALIDITY_DAYS;
use crate::models::{
    CartLineRequest, CartRequest, ConvertQuoteRequest, Quote, QuoteInput, SaleReceipt,
};

/// Validity date for a new quote created on `today`.
///
/// # Errors
///
/// Returns a rule error if `requested` is in the past.
pub fn validity(requested: Option<NaiveDate>, today: NaiveDate) -> Result<NaiveDate, ServiceError> {
    match requested {
        Some(date) if date < today => Err(ServiceError::Rule(format!(
            "valid_until {date} is in the past"
        ))),
        Some(date) => Ok(date),
        None => Ok(today + Duration::days(DEFAULT_VALIDITY_DAYS)),
    }
}

/// Check a manual status change against the quote lifecycle.
///
/// # Errors
///
/// Returns `ServiceError::Conflict` for a transition the lifecycle forbids.
/// Conversion only happens through [`QuoteService::convert`].
pub fn check_transition(
    quote: &Quote,
    next: QuoteStatus,
    today: NaiveDate,
) -> Result<(), ServiceError> {
    let current = quote.effective_status(today);
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "a {current} quote cannot become {next}"
        )))
    }
}

/// Cart request that re-sells a quote's lines at current catalog prices.
#[must_use]
pub fn quote_cart(quote: &Quote) -> CartRequest {
    CartRequest {
        lines: quote
            .lines
            .iter()
            .map(|line| CartLineRequest {
                product_id: line.product_id,
                quantity: line.quantity,
                discount: line.discount,
            })
            .collect(),
        discount: quote.discount,
    }
}

pub struct QuoteService<'a> {
    pool: &'a PgPool,
    quotes: QuoteRepository<'a>,
}

impl<'a> QuoteService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            quotes: QuoteRepository::new(pool),
        }
    }

    async fn get(&self, org: OrganizationId, id: QuoteId) -> Result<Quote, ServiceError> {
        self.quotes
            .get(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("quote {id}")))
    }

    /// Price a cart from the catalog and store it as a draft quote.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or archived products, a customer or
    /// prescription outside the organization, or a past validity date.
    #[instrument(skip(self, input), fields(org = %context.organization_id))]
    pub async fn create(
        &self,
        context: SaleContext,
        input: &QuoteInput,
        now: DateTime<Utc>,
    ) -> Result<Quote, ServiceError> {
        let org = context.organization_id;
        let organization = ensure_usable(self.pool, org, now).await?;
        let valid_until = validity(input.valid_until, now.date_naive())?;

        if let Some(id) = input.customer_id {
            CustomerRepository::new(self.pool)
                .get(org, id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("customer {id}")))?;
        }
        if let Some(id) = input.prescription_id {
            let rx = CustomerRepository::new(self.pool)
                .prescription(org, id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("prescription {id}")))?;
            if input.customer_id.is_some_and(|c| c != rx.customer_id) {
                return Err(ServiceError::Rule(
                    "the prescription belongs to another customer".to_string(),
                ));
            }
        }
        let branch_id = CheckoutService::new(self.pool)
            .branch(org, input.branch_id.or(context.branch_id))
            .await?;

        let mut ids: Vec<_> = input.cart.lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = ProductRepository::new(self.pool).get_many(org, &ids).await?;
        let cart: Cart = build_cart(&input.cart, &products)?;
        let totals = cart.totals(organization.tax_rate);

        let quote = self
            .quotes
            .create(
                org,
                &NewQuote {
                    branch_id,
                    customer_id: input.customer_id,
                    prescription_id: input.prescription_id,
                    lines: cart.lines(),
                    discount: cart.discount(),
                    totals: &totals,
                    valid_until,
                    notes: input.notes.as_deref().filter(|n| !n.trim().is_empty()),
                    created_by: context.seller_id,
                },
            )
            .await?;

        info!(quote = %quote.id, total = %quote.totals.total, "Quote created");
        Ok(quote)
    }

    /// Move a quote to `next` (sent, accepted, expired or back to draft).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` when the lifecycle forbids the change.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        org: OrganizationId,
        id: QuoteId,
        next: QuoteStatus,
        today: NaiveDate,
    ) -> Result<Quote, ServiceError> {
        let quote = self.get(org, id).await?;
        check_transition(&quote, next, today)?;

        self.quotes.set_status(org, id, next).await?;
        info!(quote = %id, from = %quote.status, to = %next, "Quote status changed");
        self.get(org, id).await
    }

    /// Turn an open quote into a sale at current catalog prices and stock.
    ///
    /// The quote row is locked for the whole transaction, so a quote can be
    /// converted at most once.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Conflict` if the quote is expired, already
    /// converted or otherwise closed, plus every checkout error.
    #[instrument(skip(self, request), fields(org = %context.organization_id))]
    pub async fn convert(
        &self,
        context: SaleContext,
        id: QuoteId,
        request: &ConvertQuoteRequest,
        now: DateTime<Utc>,
    ) -> Result<SaleReceipt, ServiceError> {
        let org = context.organization_id;
        let organization = ensure_usable(self.pool, org, now).await?;
        let checkout = CheckoutService::new(self.pool);

        let mut tx = self.pool.begin().await?;
        let quote = quotes::fetch(&mut tx, org, id, true)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("quote {id}")))?;

        let status = quote.effective_status(now.date_naive());
        if !status.is_convertible() {
            return Err(ServiceError::Conflict(format!(
                "a {status} quote cannot be converted"
            )));
        }

        let customer = checkout.customer(org, quote.customer_id).await?;
        check_buyer_for(request.document_type, customer.as_ref())?;
        let branch_id = checkout
            .branch(
                org,
                request
                    .branch_id
                    .or(quote.branch_id)
                    .or(context.branch_id),
            )
            .await?;

        let cart = quote_cart(&quote);
        let (sale_id, settlement) = place(
            &mut tx,
            &Order {
                context,
                cart: &cart,
                payments: &request.payments,
                document_type: request.document_type,
                customer_id: quote.customer_id,
                branch_id,
                quote_id: Some(id),
                tax_rate: organization.tax_rate,
            },
        )
        .await?;
        quotes::set_status(&mut tx, org, id, QuoteStatus::Converted).await?;
        tx.commit().await?;

        info!(quote = %id, sale = %sale_id, "Quote converted");
        checkout.receipt(org, sale_id, settlement).await
    }

    /// Expire every open quote past its validity date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn expire_overdue(&self, today: NaiveDate) -> Result<u64, ServiceError> {
        let expired = self.quotes.expire_overdue(today).await?;
        if expired > 0 {
            info!(expired, "Expired overdue quotes");
        }
        Ok(expired)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use optica_core::pos::{Discount, LineItem, Totals};
    use optica_core::{ProductId, UserId};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn quote(status: QuoteStatus, valid_until: NaiveDate) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId::new(7),
            organization_id: OrganizationId::new(1),
            branch_id: None,
            customer_id: None,
            prescription_id: None,
            status,
            lines: vec![LineItem {
                product_id: ProductId::new(3),
                name: "Progresivo".into(),
                quantity: 1,
                unit_price: dec!(120000),
                tax_inclusive: true,
                discount: Some(Discount::Percent(dec!(10))),
            }],
            discount: Some(Discount::Amount(dec!(5000))),
            totals: Totals::default(),
            valid_until,
            notes: None,
            created_by: UserId::new(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validity_defaults_and_rejects_past() {
        assert_eq!(validity(None, day(1)).unwrap(), day(16));
        assert_eq!(validity(Some(day(5)), day(1)).unwrap(), day(5));
        assert!(matches!(
            validity(Some(day(1)), day(2)),
            Err(ServiceError::Rule(_))
        ));
    }

    #[test]
    fn test_transitions_follow_lifecycle() {
        let open = quote(QuoteStatus::Sent, day(20));
        assert!(check_transition(&open, QuoteStatus::Accepted, day(10)).is_ok());
        assert!(matches!(
            check_transition(&open, QuoteStatus::Converted, day(10)),
            Err(ServiceError::Conflict(_))
        ));

        // Past its date an open quote reads as expired.
        assert!(check_transition(&open, QuoteStatus::Accepted, day(21)).is_err());
    }

    #[test]
    fn test_quote_cart_keeps_discounts() {
        let cart = quote_cart(&quote(QuoteStatus::Accepted, day(20)));

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].product_id, ProductId::new(3));
        assert_eq!(cart.lines[0].discount, Some(Discount::Percent(dec!(10))));
        assert_eq!(cart.discount, Some(Discount::Amount(dec!(5000))));
    }
}
