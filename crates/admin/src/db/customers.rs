//! Customer and prescription repository.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use optica_core::lens::{EyeRx, Prescription};
use optica_core::{CustomerId, Email, OrganizationId, PrescriptionId, Rut, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::{Customer, CustomerInput, Pagination, PrescriptionInput, PrescriptionRecord};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    organization_id: i32,
    name: String,
    rut: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    business_name: Option<String>,
    business_activity: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let rut = row
            .rut
            .as_deref()
            .map(Rut::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid RUT in database: {e}")))?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            organization_id: OrganizationId::new(row.organization_id),
            name: row.name,
            rut,
            email,
            phone: row.phone,
            business_name: row.business_name,
            business_activity: row.business_activity,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrescriptionRow {
    id: i32,
    customer_id: i32,
    od_sphere: Decimal,
    od_cylinder: Decimal,
    od_axis: i32,
    od_addition: Decimal,
    oi_sphere: Decimal,
    oi_cylinder: Decimal,
    oi_axis: i32,
    oi_addition: Decimal,
    pupillary_distance: Option<Decimal>,
    prescriber: Option<String>,
    notes: Option<String>,
    issued_on: NaiveDate,
    created_by: Option<i32>,
    created_at: DateTime<Utc>,
}

fn axis(raw: i32) -> Result<u16, RepositoryError> {
    u16::try_from(raw)
        .map_err(|_| RepositoryError::DataCorruption(format!("invalid axis in database: {raw}")))
}

impl TryFrom<PrescriptionRow> for PrescriptionRecord {
    type Error = RepositoryError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PrescriptionId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            rx: Prescription {
                right: EyeRx {
                    sphere: row.od_sphere,
                    cylinder: row.od_cylinder,
                    axis: axis(row.od_axis)?,
                    addition: row.od_addition,
                },
                left: EyeRx {
                    sphere: row.oi_sphere,
                    cylinder: row.oi_cylinder,
                    axis: axis(row.oi_axis)?,
                    addition: row.oi_addition,
                },
            },
            pupillary_distance: row.pupillary_distance,
            prescriber: row.prescriber,
            notes: row.notes,
            issued_on: row.issued_on,
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "id, organization_id, name, rut, email, phone, business_name, \
     business_activity, address, created_at, updated_at";

const PRESCRIPTION_COLUMNS: &str = "id, customer_id, od_sphere, od_cylinder, od_axis, \
     od_addition, oi_sphere, oi_cylinder, oi_axis, oi_addition, pupillary_distance, prescriber, \
     notes, issued_on, created_by, created_at";

const RUT_TAKEN: &str = "a customer with that RUT already exists";

// =============================================================================
// Repository
// =============================================================================

/// Repository for customers and their prescriptions.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search customers by name, RUT, email or phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        org: OrganizationId,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<(Vec<Customer>, i64), RepositoryError> {
        let pattern = q.filter(|s| !s.trim().is_empty()).map(like_pattern);
        let condition = r"
            organization_id = $1
            AND ($2::text IS NULL OR name ILIKE $2 OR rut ILIKE $2 OR email ILIKE $2 OR phone ILIKE $2)
        ";

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {condition} ORDER BY name, id OFFSET $3 LIMIT $4"
        ))
        .bind(org)
        .bind(pattern.as_deref())
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers WHERE {condition}"))
                .bind(org)
                .bind(pattern.as_deref())
                .fetch_one(self.pool)
                .await?;

        let customers = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((customers, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org: OrganizationId,
        id: CustomerId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the RUT is taken in `org`.
    pub async fn create(
        &self,
        org: OrganizationId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO customers
                (organization_id, name, rut, email, phone, business_name, business_activity, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(org)
        .bind(input.name.trim())
        .bind(input.rut.as_ref().map(Rut::as_str))
        .bind(input.email.as_ref().map(Email::as_str))
        .bind(input.phone.as_deref())
        .bind(input.business_name.as_deref())
        .bind(input.business_activity.as_deref())
        .bind(input.address.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, RUT_TAKEN))?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer is not in `org`.
    pub async fn update(
        &self,
        org: OrganizationId,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE customers
            SET name = $3, rut = $4, email = $5, phone = $6, business_name = $7,
                business_activity = $8, address = $9, updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(org)
        .bind(id)
        .bind(input.name.trim())
        .bind(input.rut.as_ref().map(Rut::as_str))
        .bind(input.email.as_ref().map(Email::as_str))
        .bind(input.phone.as_deref())
        .bind(input.business_name.as_deref())
        .bind(input.business_activity.as_deref())
        .bind(input.address.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, RUT_TAKEN))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    // =========================================================================
    // Prescriptions
    // =========================================================================

    /// Prescriptions of a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prescriptions(
        &self,
        org: OrganizationId,
        customer: CustomerId,
    ) -> Result<Vec<PrescriptionRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, PrescriptionRow>(&format!(
            r"
            SELECT {PRESCRIPTION_COLUMNS}
            FROM prescriptions
            WHERE organization_id = $1 AND customer_id = $2
            ORDER BY issued_on DESC, id DESC
            "
        ))
        .bind(org)
        .bind(customer)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prescription(
        &self,
        org: OrganizationId,
        id: PrescriptionId,
    ) -> Result<Option<PrescriptionRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, PrescriptionRow>(&format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Store a validated prescription for a customer of `org`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer is not in `org`.
    pub async fn create_prescription(
        &self,
        org: OrganizationId,
        customer: CustomerId,
        input: &PrescriptionInput,
        created_by: UserId,
    ) -> Result<PrescriptionRecord, RepositoryError> {
        let Prescription { right, left } = &input.rx;

        // INSERT ... SELECT keeps the customer lookup tenant-scoped.
        let row = sqlx::query_as::<_, PrescriptionRow>(&format!(
            r"
            INSERT INTO prescriptions
                (organization_id, customer_id,
                 od_sphere, od_cylinder, od_axis, od_addition,
                 oi_sphere, oi_cylinder, oi_axis, oi_addition,
                 pupillary_distance, prescriber, notes, issued_on, created_by)
            SELECT $1, c.id, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
            FROM customers c
            WHERE c.organization_id = $1 AND c.id = $2
            RETURNING {PRESCRIPTION_COLUMNS}
            "
        ))
        .bind(org)
        .bind(customer)
        .bind(right.sphere)
        .bind(right.cylinder)
        .bind(i32::from(right.axis))
        .bind(right.addition)
        .bind(left.sphere)
        .bind(left.cylinder)
        .bind(i32::from(left.axis))
        .bind(left.addition)
        .bind(input.pupillary_distance)
        .bind(input.prescriber.as_deref())
        .bind(input.notes.as_deref())
        .bind(input.issued_on)
        .bind(created_by)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
