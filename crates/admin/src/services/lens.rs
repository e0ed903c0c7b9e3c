//! Lens pricing with a per-organization matrix cache.
//!
//! Matrices are read on every price quote but only change when a manager
//! replaces them, so rows are cached per `(organization, family)` and the
//! entry is invalidated on replace.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info, instrument};

use optica_core::lens::{
    LensFamily, MatrixRow, PairPrice, Prescription, Solution, presbyopia_solutions,
    price_pair,
};
use optica_core::{LensFamilyId, OrganizationId};

use super::ServiceError;
use crate::db::LensRepository;
use crate::models::{LensFamilyInput, LensMatrix};
use crate::state::LensMatrixCache;

/// Check every row of a matrix before it is stored.
///
/// # Errors
///
/// Returns the first row's error, or a rule error for an empty matrix.
pub fn validate_matrix(rows: &[MatrixRow]) -> Result<(), ServiceError> {
    if rows.is_empty() {
        return Err(ServiceError::Rule("a price matrix needs at least one row".to_string()));
    }
    for (i, row) in rows.iter().enumerate() {
        row.validate()
            .map_err(|e| ServiceError::Rule(format!("row {}: {e}", i + 1)))?;
    }
    Ok(())
}

pub struct LensService<'a> {
    repo: LensRepository<'a>,
    cache: &'a LensMatrixCache,
}

impl<'a> LensService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a LensMatrixCache) -> Self {
        Self {
            repo: LensRepository::new(pool),
            cache,
        }
    }

    async fn family(&self, org: OrganizationId, id: LensFamilyId) -> Result<LensFamily, ServiceError> {
        self.repo
            .family(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("lens family {id}")))
    }

    /// Matrix rows for a family, from cache when possible.
    async fn rows(
        &self,
        org: OrganizationId,
        family: LensFamilyId,
    ) -> Result<Arc<Vec<MatrixRow>>, ServiceError> {
        if let Some(rows) = self.cache.get(&(org, family)).await {
            debug!(family = %family, "Lens matrix cache hit");
            return Ok(rows);
        }

        let rows = Arc::new(self.repo.matrix(org, family).await?);
        self.cache.insert((org, family), Arc::clone(&rows)).await;
        Ok(rows)
    }

    /// A family with its full matrix.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the family is not in `org`.
    pub async fn matrix(
        &self,
        org: OrganizationId,
        id: LensFamilyId,
    ) -> Result<LensMatrix, ServiceError> {
        let family = self.family(org, id).await?;
        let rows = self.rows(org, id).await?;
        Ok(LensMatrix {
            family,
            rows: rows.as_ref().clone(),
        })
    }

    /// Replace a family's matrix and drop the cached copy.
    ///
    /// # Errors
    ///
    /// Returns a rule error for invalid rows and `NotFound` for an unknown family.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn replace_matrix(
        &self,
        org: OrganizationId,
        id: LensFamilyId,
        rows: &[MatrixRow],
    ) -> Result<LensMatrix, ServiceError> {
        validate_matrix(rows)?;
        self.repo.replace_matrix(org, id, rows).await?;
        self.cache.invalidate(&(org, id)).await;

        info!(family = %id, "Lens matrix replaced");
        self.matrix(org, id).await
    }

    /// Create or update a family by name and replace its matrix. Used by
    /// bulk imports.
    ///
    /// # Errors
    ///
    /// Returns a rule error for invalid rows; nothing is written in that case.
    pub async fn import(
        &self,
        org: OrganizationId,
        family: &LensFamilyInput,
        rows: &[MatrixRow],
    ) -> Result<LensMatrix, ServiceError> {
        validate_matrix(rows)?;
        let stored = self.repo.upsert_family(org, family).await?;
        self.replace_matrix(org, stored.id, rows).await
    }

    /// Price a pair of lenses of one family for a prescription.
    ///
    /// # Errors
    ///
    /// Returns a lens error for an invalid prescription or when the matrix
    /// does not cover one of the eyes.
    #[instrument(skip(self, rx))]
    pub async fn price(
        &self,
        org: OrganizationId,
        id: LensFamilyId,
        rx: &Prescription,
    ) -> Result<PairPrice, ServiceError> {
        rx.validate()?;
        let family = self.family(org, id).await?;
        if !family.active {
            return Err(ServiceError::Rule(format!("lens family {} is inactive", family.name)));
        }
        let rows = self.rows(org, id).await?;
        Ok(price_pair(&family, &rows, rx)?)
    }

    /// Every way the organization's active families can solve a
    /// prescription, cheapest first. Without an addition only distance
    /// options are listed.
    ///
    /// # Errors
    ///
    /// Returns a lens error for an invalid prescription.
    #[instrument(skip(self, rx))]
    pub async fn solutions(
        &self,
        org: OrganizationId,
        rx: &Prescription,
    ) -> Result<Vec<Solution>, ServiceError> {
        rx.validate()?;

        let mut catalog = Vec::new();
        for family in self.repo.families(org).await? {
            if !family.active {
                continue;
            }
            let rows = self.rows(org, family.id).await?;
            catalog.push((family, rows.as_ref().clone()));
        }

        Ok(presbyopia_solutions(rx, &catalog))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(sphere_min: rust_decimal::Decimal, sphere_max: rust_decimal::Decimal) -> MatrixRow {
        MatrixRow {
            sphere_min,
            sphere_max,
            cylinder_min: dec!(-2),
            cylinder_max: dec!(0),
            addition_min: None,
            addition_max: None,
            price: dec!(25000),
            cost: dec!(9000),
        }
    }

    #[test]
    fn test_validate_matrix() {
        assert!(validate_matrix(&[row(dec!(-4), dec!(4))]).is_ok());
        assert!(matches!(validate_matrix(&[]), Err(ServiceError::Rule(_))));

        let err = validate_matrix(&[row(dec!(-4), dec!(4)), row(dec!(4), dec!(-4))]).unwrap_err();
        assert!(err.to_string().starts_with("row 2:"));
    }
}
