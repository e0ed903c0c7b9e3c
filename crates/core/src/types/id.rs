//! Newtype IDs for tenant-scoped records.
//!
//! Every table gets its own id type so a `ProductId` can never be passed
//! where a `CustomerId` is expected.

/// Define a type-safe `i32` id wrapper.
///
/// The generated type is `Copy`, serializes as a bare number and, with the
/// `postgres` feature, binds and decodes as `INTEGER`.
///
/// ```rust
/// # use optica_core::define_id;
/// define_id!(FrameId);
/// define_id!(CaseId);
///
/// let frame = FrameId::new(7);
/// assert_eq!(frame.as_i32(), 7);
/// // let _: CaseId = frame; // does not compile
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw database id.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Tenancy
define_id!(OrganizationId);
define_id!(BranchId);
define_id!(UserId);

// Catalog
define_id!(ProductId);

// Clinical
define_id!(CustomerId);
define_id!(PrescriptionId);

// Sales
define_id!(QuoteId);
define_id!(SaleId);
define_id!(PaymentId);

// Lens pricing
define_id!(LensFamilyId);
define_id!(LensMatrixRowId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_through_i32() {
        let id = ProductId::new(42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(ProductId::from(42), id);
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&SaleId::new(9)).unwrap_or_default();
        assert_eq!(json, "9");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(OrganizationId::new(3).to_string(), "3");
    }
}
