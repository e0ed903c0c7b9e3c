//! Lens family and price matrix repository.

use rust_decimal::Decimal;
use sqlx::PgPool;

use optica_core::lens::{LensFamily, MatrixRow};
use optica_core::{LensFamilyId, LensType, OrganizationId};

use super::RepositoryError;
use crate::models::LensFamilyInput;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct FamilyRow {
    id: i32,
    name: String,
    brand: Option<String>,
    lens_type: LensType,
    material: Option<String>,
    treatments: Vec<String>,
    active: bool,
}

impl From<FamilyRow> for LensFamily {
    fn from(row: FamilyRow) -> Self {
        Self {
            id: LensFamilyId::new(row.id),
            name: row.name,
            brand: row.brand,
            lens_type: row.lens_type,
            material: row.material,
            treatments: row.treatments,
            active: row.active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MatrixRowRecord {
    family_id: i32,
    sphere_min: Decimal,
    sphere_max: Decimal,
    cylinder_min: Decimal,
    cylinder_max: Decimal,
    addition_min: Option<Decimal>,
    addition_max: Option<Decimal>,
    price: Decimal,
    cost: Decimal,
}

impl From<MatrixRowRecord> for MatrixRow {
    fn from(row: MatrixRowRecord) -> Self {
        Self {
            sphere_min: row.sphere_min,
            sphere_max: row.sphere_max,
            cylinder_min: row.cylinder_min,
            cylinder_max: row.cylinder_max,
            addition_min: row.addition_min,
            addition_max: row.addition_max,
            price: row.price,
            cost: row.cost,
        }
    }
}

const FAMILY_COLUMNS: &str = "id, name, brand, lens_type, material, treatments, active";

const MATRIX_COLUMNS: &str = "family_id, sphere_min, sphere_max, cylinder_min, cylinder_max, \
     addition_min, addition_max, price, cost";

const NAME_TAKEN: &str = "a lens family with that name already exists";

// =============================================================================
// Repository
// =============================================================================

/// Repository for lens families and their price matrices.
pub struct LensRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LensRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn families(&self, org: OrganizationId) -> Result<Vec<LensFamily>, RepositoryError> {
        let rows = sqlx::query_as::<_, FamilyRow>(&format!(
            "SELECT {FAMILY_COLUMNS} FROM lens_families WHERE organization_id = $1 ORDER BY name"
        ))
        .bind(org)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn family(
        &self,
        org: OrganizationId,
        id: LensFamilyId,
    ) -> Result<Option<LensFamily>, RepositoryError> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            "SELECT {FAMILY_COLUMNS} FROM lens_families WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken in `org`.
    pub async fn create_family(
        &self,
        org: OrganizationId,
        input: &LensFamilyInput,
    ) -> Result<LensFamily, RepositoryError> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            r"
            INSERT INTO lens_families (organization_id, name, brand, lens_type, material, treatments, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {FAMILY_COLUMNS}
            "
        ))
        .bind(org)
        .bind(input.name.trim())
        .bind(input.brand.as_deref())
        .bind(input.lens_type)
        .bind(input.material.as_deref())
        .bind(&input.treatments)
        .bind(input.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, NAME_TAKEN))?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the family is not in `org`.
    pub async fn update_family(
        &self,
        org: OrganizationId,
        id: LensFamilyId,
        input: &LensFamilyInput,
    ) -> Result<LensFamily, RepositoryError> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            r"
            UPDATE lens_families
            SET name = $3, brand = $4, lens_type = $5, material = $6, treatments = $7,
                active = $8, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {FAMILY_COLUMNS}
            "
        ))
        .bind(org)
        .bind(id)
        .bind(input.name.trim())
        .bind(input.brand.as_deref())
        .bind(input.lens_type)
        .bind(input.material.as_deref())
        .bind(&input.treatments)
        .bind(input.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, NAME_TAKEN))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Create the family, or update the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_family(
        &self,
        org: OrganizationId,
        input: &LensFamilyInput,
    ) -> Result<LensFamily, RepositoryError> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            r"
            INSERT INTO lens_families (organization_id, name, brand, lens_type, material, treatments, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (organization_id, name) DO UPDATE
            SET brand = EXCLUDED.brand,
                lens_type = EXCLUDED.lens_type,
                material = EXCLUDED.material,
                treatments = EXCLUDED.treatments,
                active = EXCLUDED.active,
                updated_at = NOW()
            RETURNING {FAMILY_COLUMNS}
            "
        ))
        .bind(org)
        .bind(input.name.trim())
        .bind(input.brand.as_deref())
        .bind(input.lens_type)
        .bind(input.material.as_deref())
        .bind(&input.treatments)
        .bind(input.active)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    // =========================================================================
    // Matrix
    // =========================================================================

    /// Matrix rows of one family, in sphere order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn matrix(
        &self,
        org: OrganizationId,
        family: LensFamilyId,
    ) -> Result<Vec<MatrixRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, MatrixRowRecord>(&format!(
            r"
            SELECT {MATRIX_COLUMNS}
            FROM lens_matrix_rows
            WHERE organization_id = $1 AND family_id = $2
            ORDER BY sphere_min, cylinder_min, addition_min NULLS FIRST, id
            "
        ))
        .bind(org)
        .bind(family)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace a family's whole matrix. Rows must already be validated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the family is not in `org`.
    pub async fn replace_matrix(
        &self,
        org: OrganizationId,
        family: LensFamilyId,
        rows: &[MatrixRow],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM lens_families WHERE organization_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(org)
        .bind(family)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM lens_matrix_rows WHERE organization_id = $1 AND family_id = $2")
            .bind(org)
            .bind(family)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r"
                INSERT INTO lens_matrix_rows
                    (organization_id, family_id, sphere_min, sphere_max, cylinder_min,
                     cylinder_max, addition_min, addition_max, price, cost)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(org)
            .bind(family)
            .bind(row.sphere_min)
            .bind(row.sphere_max)
            .bind(row.cylinder_min)
            .bind(row.cylinder_max)
            .bind(row.addition_min)
            .bind(row.addition_max)
            .bind(row.price)
            .bind(row.cost)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE lens_families SET updated_at = NOW() WHERE id = $1")
            .bind(family)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Every active family of `org` with its matrix, for solution search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_catalog(
        &self,
        org: OrganizationId,
    ) -> Result<Vec<(LensFamily, Vec<MatrixRow>)>, RepositoryError> {
        let families: Vec<LensFamily> = sqlx::query_as::<_, FamilyRow>(&format!(
            "SELECT {FAMILY_COLUMNS} FROM lens_families WHERE organization_id = $1 AND active ORDER BY name"
        ))
        .bind(org)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let rows = sqlx::query_as::<_, MatrixRowRecord>(&format!(
            r"
            SELECT {MATRIX_COLUMNS}
            FROM lens_matrix_rows
            WHERE organization_id = $1
            ORDER BY family_id, id
            "
        ))
        .bind(org)
        .fetch_all(self.pool)
        .await?;

        let mut catalog: Vec<(LensFamily, Vec<MatrixRow>)> =
            families.into_iter().map(|f| (f, Vec::new())).collect();
        for row in rows {
            let family_id = LensFamilyId::new(row.family_id);
            if let Some((_, matrix)) = catalog.iter_mut().find(|(f, _)| f.id == family_id) {
                matrix.push(row.into());
            }
        }
        Ok(catalog)
    }
}
