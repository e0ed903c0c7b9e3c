//! Checkout, balance payments and voids.
//!
//! Carts arrive as product ids and quantities. Prices, names and tax flags
//! are always read from the catalog; inside a checkout the product rows are
//! locked so stock and price cannot change until the sale commits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use optica_core::catalog::adjust_inventory;
use optica_core::pos::{Cart, LineItem, Payment, PosError, Settlement, check_document, settle};
use optica_core::{
    BranchId, CustomerId, DocumentType, OrganizationId, PaymentMethod, ProductId, ProductStatus,
    QuoteId, SaleId, SaleStatus, UserId,
};

use super::ServiceError;
use super::tenancy::ensure_usable;
use crate::db::sales::{NewPayment, NewSale};
use crate::db::{CustomerRepository, OrganizationRepository, ProductRepository, SaleRepository};
use crate::db::{products, sales};
use crate::middleware::Tenant;
use crate::models::{
    CartPreview, CartRequest, CheckoutRequest, Customer, PreviewLine, Product, Sale, SaleLine,
    SaleReceipt,
};

/// Who is selling, for which organization, from which branch.
#[derive(Debug, Clone, Copy)]
pub struct SaleContext {
    pub organization_id: OrganizationId,
    pub seller_id: UserId,
    /// The seller's home branch, used when a request names none.
    pub branch_id: Option<BranchId>,
}

impl From<&Tenant> for SaleContext {
    fn from(tenant: &Tenant) -> Self {
        Self {
            organization_id: tenant.organization_id,
            seller_id: tenant.user.id,
            branch_id: tenant.user.branch_id,
        }
    }
}

/// Everything needed to write one sale inside a transaction.
pub(crate) struct Order<'a> {
    pub context: SaleContext,
    pub cart: &'a CartRequest,
    pub payments: &'a [Payment],
    pub document_type: DocumentType,
    pub customer_id: Option<CustomerId>,
    pub branch_id: Option<BranchId>,
    pub quote_id: Option<QuoteId>,
    pub tax_rate: Decimal,
}

// =============================================================================
// Service
// =============================================================================

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Price a cart without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if a product is unknown or archived, or a line is invalid.
    #[instrument(skip(self, request))]
    pub async fn preview(
        &self,
        org: OrganizationId,
        request: &CartRequest,
    ) -> Result<CartPreview, ServiceError> {
        let organization = OrganizationRepository::new(self.pool)
            .get(org)
            .await?
            .ok_or_else(|| ServiceError::NotFound("organization".to_string()))?;

        let products = ProductRepository::new(self.pool)
            .get_many(org, &product_ids(request))
            .await?;
        let cart = build_cart(request, &products)?;

        Ok(preview(&cart, &products, organization.tax_rate))
    }

    /// Sell a cart: price, settle, allocate a folio, write the sale and
    /// take the units out of stock, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or archived products, insufficient stock,
    /// invalid payments, missing factura data or an unusable subscription.
    /// Nothing is written on error.
    #[instrument(skip(self, request), fields(org = %context.organization_id))]
    pub async fn checkout(
        &self,
        context: SaleContext,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<SaleReceipt, ServiceError> {
        let organization = ensure_usable(self.pool, context.organization_id, now).await?;

        let customer = self
            .customer(context.organization_id, request.customer_id)
            .await?;
        check_buyer(request.document_type, customer.as_ref())?;
        let branch_id = self
            .branch(context.organization_id, request.branch_id.or(context.branch_id))
            .await?;

        let mut tx = self.pool.begin().await?;
        let (sale_id, settlement) = place(
            &mut tx,
            &Order {
                context,
                cart: &request.cart,
                payments: &request.payments,
                document_type: request.document_type,
                customer_id: request.customer_id,
                branch_id,
                quote_id: None,
                tax_rate: organization.tax_rate,
            },
        )
        .await?;
        tx.commit().await?;

        self.receipt(context.organization_id, sale_id, settlement)
            .await
    }

    /// Register a payment against a sale's outstanding balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the sale is voided, already paid, or the payments
    /// are invalid for the balance.
    #[instrument(skip(self, payments), fields(org = %context.organization_id))]
    pub async fn add_payment(
        &self,
        context: SaleContext,
        id: SaleId,
        payments: &[Payment],
        now: DateTime<Utc>,
    ) -> Result<SaleReceipt, ServiceError> {
        let org = context.organization_id;
        ensure_usable(self.pool, org, now).await?;

        let mut tx = self.pool.begin().await?;
        let sale = sales::fetch(&mut tx, org, id, true)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))?;

        if sale.status == SaleStatus::Voided {
            return Err(ServiceError::Conflict("the sale is voided".to_string()));
        }
        if sale.balance <= Decimal::ZERO {
            return Err(PosError::NothingDue.into());
        }

        let settlement = settle(sale.balance, payments)?;
        for payment in payment_rows(payments, settlement.change, context.seller_id) {
            sales::insert_payment(&mut tx, org, id, &payment).await?;
        }
        sales::set_payment_state(
            &mut tx,
            org,
            id,
            sale.paid + settlement.applied,
            settlement.balance,
            settlement.status,
        )
        .await?;
        tx.commit().await?;

        info!(sale = %id, applied = %settlement.applied, balance = %settlement.balance, "Balance payment registered");
        self.receipt(org, id, settlement).await
    }

    /// Void a sale and put its tracked units back in stock.
    ///
    /// # Errors
    ///
    /// Returns an error if the reason is blank or the sale is already voided.
    #[instrument(skip(self, reason), fields(org = %org))]
    pub async fn void(
        &self,
        org: OrganizationId,
        id: SaleId,
        reason: &str,
    ) -> Result<Sale, ServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::Rule("a reason is required to void a sale".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let sale = sales::fetch(&mut tx, org, id, true)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))?;
        if sale.status == SaleStatus::Voided {
            return Err(ServiceError::Conflict("the sale is already voided".to_string()));
        }

        let ids: Vec<ProductId> = sale.lines.iter().map(|l| l.product_id).collect();
        let locked = products::lock_many(&mut tx, org, &ids).await?;
        for (product_id, inventory) in stock_after_void(&sale.lines, &locked)? {
            products::set_inventory(&mut tx, org, product_id, inventory).await?;
        }

        sales::mark_voided(&mut tx, org, id, reason).await?;
        tx.commit().await?;

        info!(sale = %id, folio = sale.folio, "Sale voided");
        SaleRepository::new(self.pool)
            .get(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub(crate) async fn customer(
        &self,
        org: OrganizationId,
        id: Option<CustomerId>,
    ) -> Result<Option<Customer>, ServiceError> {
        let Some(id) = id else {
            return Ok(None);
        };
        CustomerRepository::new(self.pool)
            .get(org, id)
            .await?
            .map(Some)
            .ok_or_else(|| ServiceError::NotFound(format!("customer {id}")))
    }

    pub(crate) async fn branch(
        &self,
        org: OrganizationId,
        id: Option<BranchId>,
    ) -> Result<Option<BranchId>, ServiceError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let branch = OrganizationRepository::new(self.pool)
            .get_branch(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("branch {id}")))?;
        if !branch.active {
            return Err(ServiceError::Rule(format!("branch {} is inactive", branch.name)));
        }
        Ok(Some(branch.id))
    }

    pub(crate) async fn receipt(
        &self,
        org: OrganizationId,
        id: SaleId,
        settlement: Settlement,
    ) -> Result<SaleReceipt, ServiceError> {
        let sale = SaleRepository::new(self.pool)
            .get(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))?;
        Ok(SaleReceipt { sale, settlement })
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Write one sale. The caller owns the transaction.
pub(crate) async fn place(
    conn: &mut PgConnection,
    order: &Order<'_>,
) -> Result<(SaleId, Settlement), ServiceError> {
    let org = order.context.organization_id;

    let products = products::lock_many(&mut *conn, org, &product_ids(order.cart)).await?;
    let cart = build_cart(order.cart, &products)?;
    let stock = stock_after_sale(&cart, &products)?;

    let totals = cart.totals(order.tax_rate);
    let settlement = settle(totals.total, order.payments)?;
    let lines = sale_lines(&cart, &products, order.tax_rate)?;

    let folio = sales::next_folio(&mut *conn, org, order.document_type).await?;
    let sale_id = sales::insert(
        &mut *conn,
        org,
        &NewSale {
            branch_id: order.branch_id,
            seller_id: order.context.seller_id,
            customer_id: order.customer_id,
            quote_id: order.quote_id,
            document_type: order.document_type,
            folio,
            status: settlement.status,
            totals: &totals,
            paid: settlement.applied,
            balance: settlement.balance,
        },
        &lines,
    )
    .await?;

    for payment in payment_rows(order.payments, settlement.change, order.context.seller_id) {
        sales::insert_payment(&mut *conn, org, sale_id, &payment).await?;
    }
    for (product_id, inventory) in stock {
        products::set_inventory(&mut *conn, org, product_id, inventory).await?;
    }

    info!(
        sale = %sale_id,
        document = %order.document_type,
        folio,
        total = %totals.total,
        status = %settlement.status,
        "Sale recorded"
    );
    Ok((sale_id, settlement))
}

// =============================================================================
// Pricing
// =============================================================================

fn product_ids(request: &CartRequest) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = request.lines.iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Reprice a cart request from catalog rows.
///
/// # Errors
///
/// Returns an error for an empty cart, a product missing from `products`,
/// an archived product or a zero quantity.
pub fn build_cart(request: &CartRequest, products: &[Product]) -> Result<Cart, ServiceError> {
    if request.lines.is_empty() {
        return Err(ServiceError::Rule("the cart is empty".to_string()));
    }

    let lines = request
        .lines
        .iter()
        .map(|line| {
            let product = find(products, line.product_id)?;
            if product.status != ProductStatus::Active {
                return Err(ServiceError::Rule(format!(
                    "{} ({}) is archived",
                    product.name, product.sku
                )));
            }
            Ok(LineItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
                tax_inclusive: product.tax_inclusive,
                discount: line.discount,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(Cart::from_lines(lines, request.discount)?)
}

fn find(products: &[Product], id: ProductId) -> Result<&Product, ServiceError> {
    products
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
}

fn preview(cart: &Cart, products: &[Product], tax_rate: Decimal) -> CartPreview {
    let lines = cart
        .lines()
        .iter()
        .map(|item| PreviewLine {
            item: item.clone(),
            sku: products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| p.sku.clone())
                .unwrap_or_default(),
            price: item.price(tax_rate),
        })
        .collect();

    CartPreview {
        lines,
        discount: cart.discount().copied(),
        totals: cart.totals(tax_rate),
        item_count: cart.item_count(),
    }
}

/// Persisted lines, with tax-inclusive prices.
fn sale_lines(
    cart: &Cart,
    products: &[Product],
    tax_rate: Decimal,
) -> Result<Vec<SaleLine>, ServiceError> {
    cart.lines()
        .iter()
        .map(|item| {
            let product = find(products, item.product_id)?;
            let price = item.price(tax_rate);
            Ok(SaleLine {
                product_id: item.product_id,
                name: item.name.clone(),
                sku: product.sku.clone(),
                quantity: quantity(item.quantity)?,
                unit_price: price.unit_price,
                gross: price.gross,
                discount: price.discount,
                total: price.total,
            })
        })
        .collect()
}

fn quantity(units: u32) -> Result<i32, ServiceError> {
    i32::try_from(units).map_err(|_| ServiceError::Pos(PosError::InvalidQuantity))
}

/// Stock left for each tracked product once `cart` is sold.
///
/// # Errors
///
/// Returns a rule error naming the first product without enough stock.
pub fn stock_after_sale(
    cart: &Cart,
    products: &[Product],
) -> Result<Vec<(ProductId, i32)>, ServiceError> {
    let mut next = Vec::new();
    for item in cart.lines() {
        let product = find(products, item.product_id)?;
        if !product.track_inventory {
            continue;
        }
        let remaining = adjust_inventory(product.inventory, -quantity(item.quantity)?).map_err(
            |_| {
                ServiceError::Rule(format!(
                    "not enough stock of {} (available {}, requested {})",
                    product.sku, product.inventory, item.quantity
                ))
            },
        )?;
        next.push((product.id, remaining));
    }
    Ok(next)
}

/// Stock for each tracked product once a sale's lines are returned.
fn stock_after_void(
    lines: &[SaleLine],
    products: &[Product],
) -> Result<Vec<(ProductId, i32)>, ServiceError> {
    let mut next = Vec::new();
    for line in lines {
        // Lines always reference products of the same organization.
        let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
            continue;
        };
        if product.track_inventory {
            next.push((product.id, adjust_inventory(product.inventory, line.quantity)?));
        }
    }
    Ok(next)
}

/// One row per tender; the change is recorded on the last cash tender.
#[must_use]
pub fn payment_rows(payments: &[Payment], change: Decimal, received_by: UserId) -> Vec<NewPayment> {
    let last_cash = payments
        .iter()
        .rposition(|p| p.method == PaymentMethod::Cash);

    payments
        .iter()
        .enumerate()
        .map(|(i, p)| NewPayment {
            method: p.method,
            amount: p.amount,
            change: if Some(i) == last_cash {
                change
            } else {
                Decimal::ZERO
            },
            received_by,
        })
        .collect()
}

/// Check the buyer against the document type.
fn check_buyer(document: DocumentType, customer: Option<&Customer>) -> Result<(), PosError> {
    check_document(
        document,
        customer.map(|c| (c.rut.as_ref(), c.business_name.as_deref())),
    )
}

pub(crate) fn check_buyer_for(
    document: DocumentType,
    customer: Option<&Customer>,
) -> Result<(), ServiceError> {
    Ok(check_buyer(document, customer)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use optica_core::pos::Discount;
    use optica_core::{DEFAULT_TAX_RATE, ProductCategory};
    use rust_decimal_macros::dec;

    use crate::models::CartLineRequest;

    fn product(id: i32, price: Decimal, inventory: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            organization_id: OrganizationId::new(1),
            name: format!("Armazón {id}"),
            sku: format!("ARM-{id}"),
            category: ProductCategory::Frame,
            brand: None,
            description: None,
            price,
            tax_inclusive: true,
            inventory,
            track_inventory: true,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(lines: &[(i32, u32)]) -> CartRequest {
        CartRequest {
            lines: lines
                .iter()
                .map(|&(id, quantity)| CartLineRequest {
                    product_id: ProductId::new(id),
                    quantity,
                    discount: None,
                })
                .collect(),
            discount: None,
        }
    }

    #[test]
    fn test_build_cart_uses_catalog_prices_and_merges() {
        let products = [product(1, dec!(49990), 5), product(2, dec!(9990), 5)];
        let cart = build_cart(&request(&[(1, 1), (2, 2), (1, 1)]), &products).unwrap();

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[0].unit_price, dec!(49990));
        assert_eq!(cart.totals(DEFAULT_TAX_RATE).total, dec!(119960));
    }

    #[test]
    fn test_build_cart_rejects_unknown_archived_and_empty() {
        let mut archived = product(3, dec!(1000), 1);
        archived.status = ProductStatus::Archived;
        let products = [product(1, dec!(1000), 1), archived];

        assert!(matches!(
            build_cart(&request(&[(9, 1)]), &products),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            build_cart(&request(&[(3, 1)]), &products),
            Err(ServiceError::Rule(_))
        ));
        assert!(matches!(
            build_cart(&request(&[]), &products),
            Err(ServiceError::Rule(_))
        ));
        assert!(matches!(
            build_cart(&request(&[(1, 0)]), &products),
            Err(ServiceError::Pos(PosError::InvalidQuantity))
        ));
    }

    #[test]
    fn test_stock_after_sale() {
        let mut service = product(2, dec!(15000), 0);
        service.track_inventory = false;
        let products = [product(1, dec!(1000), 3), service];

        let cart = build_cart(&request(&[(1, 2), (2, 4)]), &products).unwrap();
        assert_eq!(
            stock_after_sale(&cart, &products).unwrap(),
            vec![(ProductId::new(1), 1)]
        );

        let cart = build_cart(&request(&[(1, 4)]), &products).unwrap();
        assert!(matches!(
            stock_after_sale(&cart, &products),
            Err(ServiceError::Rule(_))
        ));
    }

    #[test]
    fn test_sale_lines_carry_discounts() {
        let products = [product(1, dec!(20000), 3)];
        let mut req = request(&[(1, 2)]);
        req.lines[0].discount = Some(Discount::Percent(dec!(10)));
        let cart = build_cart(&req, &products).unwrap();

        let lines = sale_lines(&cart, &products, DEFAULT_TAX_RATE).unwrap();
        assert_eq!(lines[0].sku, "ARM-1");
        assert_eq!(lines[0].gross, dec!(40000));
        assert_eq!(lines[0].discount, dec!(4000));
        assert_eq!(lines[0].total, dec!(36000));
    }

    #[test]
    fn test_change_goes_on_last_cash_tender() {
        let payments = [
            Payment {
                method: PaymentMethod::Cash,
                amount: dec!(10000),
            },
            Payment {
                method: PaymentMethod::Debit,
                amount: dec!(5000),
            },
            Payment {
                method: PaymentMethod::Cash,
                amount: dec!(5000),
            },
        ];
        let rows = payment_rows(&payments, dec!(1500), UserId::new(4));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].change, dec!(0));
        assert_eq!(rows[1].change, dec!(0));
        assert_eq!(rows[2].change, dec!(1500));
        assert!(rows.iter().all(|r| r.received_by == UserId::new(4)));
    }

    #[test]
    fn test_stock_after_void_restores_tracked_units() {
        let products = [product(1, dec!(1000), 1)];
        let lines = [SaleLine {
            product_id: ProductId::new(1),
            name: "Armazón 1".into(),
            sku: "ARM-1".into(),
            quantity: 2,
            unit_price: dec!(1000),
            gross: dec!(2000),
            discount: dec!(0),
            total: dec!(2000),
        }];
        assert_eq!(
            stock_after_void(&lines, &products).unwrap(),
            vec![(ProductId::new(1), 3)]
        );
    }

    #[test]
    fn test_preview_lists_skus() {
        let products = [product(1, dec!(11900), 1)];
        let cart = build_cart(&request(&[(1, 1)]), &products).unwrap();
        let preview = preview(&cart, &products, DEFAULT_TAX_RATE);

        assert_eq!(preview.lines[0].sku, "ARM-1");
        assert_eq!(preview.totals.net, dec!(10000));
        assert_eq!(preview.totals.tax, dec!(1900));
        assert_eq!(preview.item_count, 1);
    }
}
