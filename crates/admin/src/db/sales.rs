//! Sale, sale line, payment and folio repository.
//!
//! Writes happen inside the checkout and payment transactions, so most of
//! this module is free functions over a `PgConnection`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use optica_core::pos::Totals;
use optica_core::{
    BranchId, CustomerId, DocumentType, OrganizationId, PaymentId, PaymentMethod, ProductId,
    QuoteId, SaleId, SaleStatus, UserId,
};

use super::RepositoryError;
use crate::models::{Pagination, Sale, SaleFilter, SaleLine, SalePayment};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: i32,
    organization_id: i32,
    branch_id: Option<i32>,
    seller_id: i32,
    customer_id: Option<i32>,
    quote_id: Option<i32>,
    document_type: DocumentType,
    folio: i64,
    status: SaleStatus,
    subtotal: Decimal,
    discount_total: Decimal,
    total: Decimal,
    net: Decimal,
    tax: Decimal,
    paid: Decimal,
    balance: Decimal,
    void_reason: Option<String>,
    voided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, lines: Vec<SaleLine>, payments: Vec<SalePayment>) -> Sale {
        Sale {
            id: SaleId::new(self.id),
            organization_id: OrganizationId::new(self.organization_id),
            branch_id: self.branch_id.map(BranchId::new),
            seller_id: UserId::new(self.seller_id),
            customer_id: self.customer_id.map(CustomerId::new),
            quote_id: self.quote_id.map(QuoteId::new),
            document_type: self.document_type,
            folio: self.folio,
            status: self.status,
            totals: Totals {
                subtotal: self.subtotal,
                discount: self.discount_total,
                total: self.total,
                net: self.net,
                tax: self.tax,
            },
            paid: self.paid,
            balance: self.balance,
            lines,
            payments,
            void_reason: self.void_reason,
            voided_at: self.voided_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleLineRow {
    sale_id: i32,
    product_id: i32,
    name: String,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
    gross: Decimal,
    discount: Decimal,
    total: Decimal,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price: row.unit_price,
            gross: row.gross,
            discount: row.discount,
            total: row.total,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    sale_id: i32,
    method: PaymentMethod,
    amount: Decimal,
    change: Decimal,
    received_by: i32,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for SalePayment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: PaymentId::new(row.id),
            method: row.method,
            amount: row.amount,
            change: row.change,
            received_by: UserId::new(row.received_by),
            created_at: row.created_at,
        }
    }
}

const SALE_COLUMNS: &str = "id, organization_id, branch_id, seller_id, customer_id, quote_id, \
     document_type, folio, status, subtotal, discount_total, total, net, tax, paid, balance, \
     void_reason, voided_at, created_at";

/// A sale header as written by checkout.
pub struct NewSale<'a> {
    pub branch_id: Option<BranchId>,
    pub seller_id: UserId,
    pub customer_id: Option<CustomerId>,
    pub quote_id: Option<QuoteId>,
    pub document_type: DocumentType,
    pub folio: i64,
    pub status: SaleStatus,
    pub totals: &'a Totals,
    pub paid: Decimal,
    pub balance: Decimal,
}

/// A payment row as written.
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub change: Decimal,
    pub received_by: UserId,
}

// =============================================================================
// Repository
// =============================================================================

/// Read side of sales.
pub struct SaleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SaleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sales of `org`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        org: OrganizationId,
        filter: &SaleFilter,
        page: Pagination,
    ) -> Result<(Vec<Sale>, i64), RepositoryError> {
        let condition = r"
            organization_id = $1
            AND ($2::sale_status IS NULL OR status = $2)
            AND ($3::int IS NULL OR customer_id = $3)
            AND ($4::document_type IS NULL OR document_type = $4)
        ";

        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE {condition} ORDER BY created_at DESC, id DESC OFFSET $5 LIMIT $6"
        ))
        .bind(org)
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(filter.document_type)
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sales WHERE {condition}"))
            .bind(org)
            .bind(filter.status)
            .bind(filter.customer_id)
            .bind(filter.document_type)
            .fetch_one(self.pool)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let sales = attach_details(&mut conn, rows).await?;
        Ok((sales, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, org: OrganizationId, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, org, id, false).await
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Allocate the next folio for `document_type` in `org`.
///
/// The upsert takes a row lock on the sequence, so concurrent checkouts
/// are serialized and folios never repeat or skip within a committed run.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn next_folio(
    conn: &mut PgConnection,
    org: OrganizationId,
    document_type: DocumentType,
) -> Result<i64, RepositoryError> {
    let folio: i64 = sqlx::query_scalar(
        r"
        INSERT INTO document_sequences (organization_id, document_type, last_folio)
        VALUES ($1, $2, 1)
        ON CONFLICT (organization_id, document_type) DO UPDATE
        SET last_folio = document_sequences.last_folio + 1
        RETURNING last_folio
        ",
    )
    .bind(org)
    .bind(document_type)
    .fetch_one(conn)
    .await?;
    Ok(folio)
}

/// Insert a sale header with its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn insert(
    conn: &mut PgConnection,
    org: OrganizationId,
    sale: &NewSale<'_>,
    lines: &[SaleLine],
) -> Result<SaleId, RepositoryError> {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO sales
            (organization_id, branch_id, seller_id, customer_id, quote_id, document_type, folio,
             status, subtotal, discount_total, total, net, tax, paid, balance)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        ",
    )
    .bind(org)
    .bind(sale.branch_id)
    .bind(sale.seller_id)
    .bind(sale.customer_id)
    .bind(sale.quote_id)
    .bind(sale.document_type)
    .bind(sale.folio)
    .bind(sale.status)
    .bind(sale.totals.subtotal)
    .bind(sale.totals.discount)
    .bind(sale.totals.total)
    .bind(sale.totals.net)
    .bind(sale.totals.tax)
    .bind(sale.paid)
    .bind(sale.balance)
    .fetch_one(&mut *conn)
    .await?;

    for (position, line) in (0_i32..).zip(lines) {
        sqlx::query(
            r"
            INSERT INTO sale_lines
                (organization_id, sale_id, position, product_id, name, sku, quantity,
                 unit_price, gross, discount, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(org)
        .bind(id)
        .bind(position)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(&line.sku)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.gross)
        .bind(line.discount)
        .bind(line.total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(SaleId::new(id))
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_payment(
    conn: &mut PgConnection,
    org: OrganizationId,
    sale: SaleId,
    payment: &NewPayment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO sale_payments (organization_id, sale_id, method, amount, change, received_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(org)
    .bind(sale)
    .bind(payment.method)
    .bind(payment.amount)
    .bind(payment.change)
    .bind(payment.received_by)
    .execute(conn)
    .await?;
    Ok(())
}

/// Record new paid and balance amounts on a sale.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the sale is not in `org`.
pub async fn set_payment_state(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: SaleId,
    paid: Decimal,
    balance: Decimal,
    status: SaleStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE sales SET paid = $3, balance = $4, status = $5 WHERE organization_id = $1 AND id = $2",
    )
    .bind(org)
    .bind(id)
    .bind(paid)
    .bind(balance)
    .bind(status)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns `RepositoryError::NotFound` if the sale is not in `org`.
pub async fn mark_voided(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: SaleId,
    reason: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE sales SET status = 'voided', void_reason = $3, voided_at = NOW()
        WHERE organization_id = $1 AND id = $2
        ",
    )
    .bind(org)
    .bind(id)
    .bind(reason)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Load a sale with lines and payments, optionally locking the sale row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fetch(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: SaleId,
    for_update: bool,
) -> Result<Option<Sale>, RepositoryError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, SaleRow>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE organization_id = $1 AND id = $2 {lock}"
    ))
    .bind(org)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut sales = attach_details(conn, vec![row]).await?;
    Ok(sales.pop())
}

async fn attach_details(
    conn: &mut PgConnection,
    rows: Vec<SaleRow>,
) -> Result<Vec<Sale>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let line_rows = sqlx::query_as::<_, SaleLineRow>(
        r"
        SELECT sale_id, product_id, name, sku, quantity, unit_price, gross, discount, total
        FROM sale_lines
        WHERE sale_id = ANY($1)
        ORDER BY sale_id, position
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let payment_rows = sqlx::query_as::<_, PaymentRow>(
        r"
        SELECT id, sale_id, method, amount, change, received_by, created_at
        FROM sale_payments
        WHERE sale_id = ANY($1)
        ORDER BY sale_id, created_at, id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines: HashMap<i32, Vec<SaleLine>> = HashMap::new();
    for row in line_rows {
        lines.entry(row.sale_id).or_default().push(row.into());
    }
    let mut payments: HashMap<i32, Vec<SalePayment>> = HashMap::new();
    for row in payment_rows {
        payments.entry(row.sale_id).or_default().push(row.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let sale_lines = lines.remove(&row.id).unwrap_or_default();
            let sale_payments = payments.remove(&row.id).unwrap_or_default();
            row.into_sale(sale_lines, sale_payments)
        })
        .collect())
}
