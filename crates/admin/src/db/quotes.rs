//! Quote repository.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use optica_core::pos::{Discount, LineItem, Totals};
use optica_core::{
    BranchId, CustomerId, OrganizationId, PrescriptionId, ProductId, QuoteId, QuoteStatus, UserId,
};

use super::RepositoryError;
use crate::models::{Pagination, Quote, QuoteFilter};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: i32,
    organization_id: i32,
    branch_id: Option<i32>,
    customer_id: Option<i32>,
    prescription_id: Option<i32>,
    status: QuoteStatus,
    discount: Option<Json<Discount>>,
    subtotal: Decimal,
    discount_total: Decimal,
    total: Decimal,
    net: Decimal,
    tax: Decimal,
    valid_until: NaiveDate,
    notes: Option<String>,
    created_by: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuoteRow {
    fn into_quote(self, lines: Vec<LineItem>) -> Quote {
        Quote {
            id: QuoteId::new(self.id),
            organization_id: OrganizationId::new(self.organization_id),
            branch_id: self.branch_id.map(BranchId::new),
            customer_id: self.customer_id.map(CustomerId::new),
            prescription_id: self.prescription_id.map(PrescriptionId::new),
            status: self.status,
            lines,
            discount: self.discount.map(|Json(d)| d),
            totals: Totals {
                subtotal: self.subtotal,
                discount: self.discount_total,
                total: self.total,
                net: self.net,
                tax: self.tax,
            },
            valid_until: self.valid_until,
            notes: self.notes,
            created_by: UserId::new(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuoteLineRow {
    quote_id: i32,
    product_id: i32,
    name: String,
    quantity: i32,
    unit_price: Decimal,
    tax_inclusive: bool,
    discount: Option<Json<Discount>>,
}

impl TryFrom<QuoteLineRow> for LineItem {
    type Error = RepositoryError;

    fn try_from(row: QuoteLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid quantity in database: {}", row.quantity))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            quantity,
            unit_price: row.unit_price,
            tax_inclusive: row.tax_inclusive,
            discount: row.discount.map(|Json(d)| d),
        })
    }
}

const QUOTE_COLUMNS: &str = "id, organization_id, branch_id, customer_id, prescription_id, \
     status, discount, subtotal, discount_total, total, net, tax, valid_until, notes, \
     created_by, created_at, updated_at";

/// A quote as written on creation, already priced.
pub struct NewQuote<'a> {
    pub branch_id: Option<BranchId>,
    pub customer_id: Option<CustomerId>,
    pub prescription_id: Option<PrescriptionId>,
    pub lines: &'a [LineItem],
    pub discount: Option<&'a Discount>,
    pub totals: &'a Totals,
    pub valid_until: NaiveDate,
    pub notes: Option<&'a str>,
    pub created_by: UserId,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for quotes and their lines.
pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Quotes of `org`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        org: OrganizationId,
        filter: &QuoteFilter,
        page: Pagination,
    ) -> Result<(Vec<Quote>, i64), RepositoryError> {
        let condition = r"
            organization_id = $1
            AND ($2::quote_status IS NULL OR status = $2)
            AND ($3::int IS NULL OR customer_id = $3)
        ";

        let rows = sqlx::query_as::<_, QuoteRow>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE {condition} ORDER BY created_at DESC, id DESC OFFSET $4 LIMIT $5"
        ))
        .bind(org)
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM quotes WHERE {condition}"))
            .bind(org)
            .bind(filter.status)
            .bind(filter.customer_id)
            .fetch_one(self.pool)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let quotes = attach_lines(&mut conn, rows).await?;
        Ok((quotes, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org: OrganizationId,
        id: QuoteId,
    ) -> Result<Option<Quote>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, org, id, false).await
    }

    /// Insert a priced quote with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create(
        &self,
        org: OrganizationId,
        quote: &NewQuote<'_>,
    ) -> Result<Quote, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuoteRow>(&format!(
            r"
            INSERT INTO quotes
                (organization_id, branch_id, customer_id, prescription_id, discount,
                 subtotal, discount_total, total, net, tax, valid_until, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(org)
        .bind(quote.branch_id)
        .bind(quote.customer_id)
        .bind(quote.prescription_id)
        .bind(quote.discount.map(Json))
        .bind(quote.totals.subtotal)
        .bind(quote.totals.discount)
        .bind(quote.totals.total)
        .bind(quote.totals.net)
        .bind(quote.totals.tax)
        .bind(quote.valid_until)
        .bind(quote.notes)
        .bind(quote.created_by)
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in (0_i32..).zip(quote.lines) {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::Conflict("quantity too large".to_string()))?;
            sqlx::query(
                r"
                INSERT INTO quote_lines
                    (organization_id, quote_id, position, product_id, name, quantity,
                     unit_price, tax_inclusive, discount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(org)
            .bind(row.id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(quantity)
            .bind(line.unit_price)
            .bind(line.tax_inclusive)
            .bind(line.discount.as_ref().map(Json))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_quote(quote.lines.to_vec()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the quote is not in `org`.
    pub async fn set_status(
        &self,
        org: OrganizationId,
        id: QuoteId,
        status: QuoteStatus,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, org, id, status).await
    }

    /// Mark open quotes whose validity date is before `today` as expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn expire_overdue(&self, today: NaiveDate) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quotes SET status = 'expired', updated_at = NOW()
            WHERE status IN ('draft', 'sent', 'accepted') AND valid_until < $1
            ",
        )
        .bind(today)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Load a quote with its lines, optionally locking the quote row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fetch(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: QuoteId,
    for_update: bool,
) -> Result<Option<Quote>, RepositoryError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, QuoteRow>(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes WHERE organization_id = $1 AND id = $2 {lock}"
    ))
    .bind(org)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut quotes = attach_lines(conn, vec![row]).await?;
    Ok(quotes.pop())
}

/// # Errors
///
/// Returns `RepositoryError::NotFound` if the quote is not in `org`.
pub async fn set_status(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: QuoteId,
    status: QuoteStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE quotes SET status = $3, updated_at = NOW() WHERE organization_id = $1 AND id = $2",
    )
    .bind(org)
    .bind(id)
    .bind(status)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

async fn attach_lines(
    conn: &mut PgConnection,
    rows: Vec<QuoteRow>,
) -> Result<Vec<Quote>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let line_rows = sqlx::query_as::<_, QuoteLineRow>(
        r"
        SELECT quote_id, product_id, name, quantity, unit_price, tax_inclusive, discount
        FROM quote_lines
        WHERE quote_id = ANY($1)
        ORDER BY quote_id, position
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut by_quote: HashMap<i32, Vec<LineItem>> = HashMap::new();
    for line in line_rows {
        by_quote
            .entry(line.quote_id)
            .or_default()
            .push(line.try_into()?);
    }

    let quotes = rows
        .into_iter()
        .map(|row| {
            let lines = by_quote.remove(&row.id).unwrap_or_default();
            row.into_quote(lines)
        })
        .collect();
    Ok(quotes)
}
