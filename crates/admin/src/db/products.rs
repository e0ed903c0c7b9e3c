//! Catalog product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use optica_core::catalog::{PriceAdjustment, adjust_inventory};
use optica_core::{OrganizationId, ProductCategory, ProductId, ProductStatus};

use super::{RepositoryError, like_pattern};
use crate::models::{Pagination, Product, ProductFilter, ProductInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    organization_id: i32,
    name: String,
    sku: String,
    category: ProductCategory,
    brand: Option<String>,
    description: Option<String>,
    price: Decimal,
    tax_inclusive: bool,
    inventory: i32,
    track_inventory: bool,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            organization_id: OrganizationId::new(row.organization_id),
            name: row.name,
            sku: row.sku,
            category: row.category,
            brand: row.brand,
            description: row.description,
            price: row.price,
            tax_inclusive: row.tax_inclusive,
            inventory: row.inventory,
            track_inventory: row.track_inventory,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, organization_id, name, sku, category, brand, description, \
     price, tax_inclusive, inventory, track_inventory, status, created_at, updated_at";

const SEARCH_CONDITION: &str = r"
    organization_id = $1
    AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2 OR brand ILIKE $2)
    AND ($3::product_category IS NULL OR category = $3)
    AND ($4::product_status IS NULL OR status = $4)
";

const SKU_TAKEN: &str = "a product with that SKU already exists";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog products. Every method is scoped to one
/// organization.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search products by text, category and status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        org: OrganizationId,
        filter: &ProductFilter,
        page: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = filter
            .q
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE {SEARCH_CONDITION}
            ORDER BY name, id
            OFFSET $5 LIMIT $6
            "
        ))
        .bind(org)
        .bind(pattern.as_deref())
        .bind(filter.category)
        .bind(filter.status)
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products WHERE {SEARCH_CONDITION}"
        ))
        .bind(org)
        .bind(pattern.as_deref())
        .bind(filter.category)
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org: OrganizationId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// The given products of `org`. Missing ids are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        org: OrganizationId,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = $1 AND id = ANY($2) ORDER BY id"
        ))
        .bind(org)
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a product. `input` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken in `org`.
    pub async fn create(
        &self,
        org: OrganizationId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products
                (organization_id, name, sku, category, brand, description,
                 price, tax_inclusive, inventory, track_inventory)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(org)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.category)
        .bind(input.brand.as_deref())
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.tax_inclusive)
        .bind(input.inventory)
        .bind(input.track_inventory)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, SKU_TAKEN))?;

        Ok(row.into())
    }

    /// Replace a product's editable fields. `input` must already be
    /// normalized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in `org`.
    pub async fn update(
        &self,
        org: OrganizationId,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = $3, sku = $4, category = $5, brand = $6, description = $7,
                price = $8, tax_inclusive = $9, inventory = $10, track_inventory = $11,
                updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(org)
        .bind(id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.category)
        .bind(input.brand.as_deref())
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.tax_inclusive)
        .bind(input.inventory)
        .bind(input.track_inventory)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, SKU_TAKEN))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Archive or restore a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in `org`.
    pub async fn set_status(
        &self,
        org: OrganizationId,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET status = $3, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            ",
        )
        .bind(org)
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in `org`.
    pub async fn set_category(
        &self,
        org: OrganizationId,
        id: ProductId,
        category: ProductCategory,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET category = $3, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            ",
        )
        .bind(org)
        .bind(id)
        .bind(category)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a price adjustment, returning the new price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in `org`, or
    /// `RepositoryError::Conflict` if the new price is out of range.
    pub async fn adjust_price(
        &self,
        org: OrganizationId,
        id: ProductId,
        adjustment: PriceAdjustment,
    ) -> Result<Decimal, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let product = lock(&mut tx, org, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let price = adjustment
            .apply(product.price)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        sqlx::query(
            "UPDATE products SET price = $3, updated_at = NOW() WHERE organization_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(id)
        .bind(price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(price)
    }

    /// Add `delta` units (negative removes), returning the new stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock would go negative.
    pub async fn adjust_stock(
        &self,
        org: OrganizationId,
        id: ProductId,
        delta: i32,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let product = lock(&mut tx, org, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let inventory = adjust_inventory(product.inventory, delta)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        set_inventory(&mut tx, org, id, inventory).await?;

        tx.commit().await?;
        Ok(inventory)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Load and lock one product row for the rest of the transaction.
async fn lock(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE organization_id = $1 AND id = $2 FOR UPDATE"
    ))
    .bind(org)
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Load and lock the given products of `org`, in id order so concurrent
/// checkouts lock in the same sequence. Ids of other organizations are
/// silently absent from the result.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_many(
    conn: &mut PgConnection,
    org: OrganizationId,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        r"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE organization_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "
    ))
    .bind(org)
    .bind(&raw)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_inventory(
    conn: &mut PgConnection,
    org: OrganizationId,
    id: ProductId,
    inventory: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products SET inventory = $3, updated_at = NOW() WHERE organization_id = $1 AND id = $2",
    )
    .bind(org)
    .bind(id)
    .bind(inventory)
    .execute(conn)
    .await?;
    Ok(())
}
