//! Status and classification enums.
//!
//! Enums that are stored in PostgreSQL map to native enum types of the same
//! snake_case name (see `crates/admin/migrations`). Enums that are read from
//! the CLI or query strings also implement `FromStr`.

use serde::{Deserialize, Serialize};

/// Implements `Display`, `FromStr` and `as_str` from a fixed variant/text table.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable snake_case identifier.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("invalid {}: {s}", $label)),
                }
            }
        }
    };
}

/// Back-office user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// SaaS operator. Not bound to an organization.
    PlatformAdmin,
    /// Organization owner: users, branches and everything below.
    Owner,
    /// Store manager: catalog, lens pricing, voids.
    Manager,
    /// Sales floor: POS, customers, quotes.
    Seller,
    /// Clinical staff: customers and prescriptions.
    Optometrist,
}

text_enum!(UserRole, "user role", {
    PlatformAdmin => "platform_admin",
    Owner => "owner",
    Manager => "manager",
    Seller => "seller",
    Optometrist => "optometrist",
});

impl UserRole {
    /// Can edit products and lens pricing, and void sales.
    #[must_use]
    pub const fn can_manage_catalog(self) -> bool {
        matches!(self, Self::Owner | Self::Manager)
    }

    /// Can manage users and branches of their organization.
    #[must_use]
    pub const fn can_manage_organization(self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Catalog lifecycle. Archived products are hidden from the POS but kept for
/// sales history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Archived,
}

text_enum!(ProductStatus, "product status", {
    Active => "active",
    Archived => "archived",
});

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_category", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Frame,
    Sunglasses,
    ContactLens,
    Accessory,
    Service,
    Other,
}

text_enum!(ProductCategory, "product category", {
    Frame => "frame",
    Sunglasses => "sunglasses",
    ContactLens => "contact_lens",
    Accessory => "accessory",
    Service => "service",
    Other => "other",
});

/// Quote lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "quote_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Converted,
    Expired,
}

text_enum!(QuoteStatus, "quote status", {
    Draft => "draft",
    Sent => "sent",
    Accepted => "accepted",
    Converted => "converted",
    Expired => "expired",
});

impl QuoteStatus {
    /// Whether a manual status change from `self` to `next` is allowed.
    ///
    /// `Converted` is only reached through quote conversion, never set by hand.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent | Self::Accepted | Self::Expired)
                | (Self::Sent, Self::Accepted | Self::Expired | Self::Draft)
                | (Self::Accepted, Self::Expired)
        )
    }

    /// Whether the quote can still become a sale.
    #[must_use]
    pub const fn is_convertible(self) -> bool {
        matches!(self, Self::Draft | Self::Sent | Self::Accepted)
    }
}

/// Sale payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sale_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Paid,
    /// A deposit was taken; balance due on delivery.
    PartiallyPaid,
    Voided,
}

text_enum!(SaleStatus, "sale status", {
    Paid => "paid",
    PartiallyPaid => "partially_paid",
    Voided => "voided",
});

/// SII tax document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "document_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Consumer receipt.
    #[default]
    Boleta,
    /// Business invoice. Requires the buyer's RUT and business name.
    Factura,
}

text_enum!(DocumentType, "document type", {
    Boleta => "boleta",
    Factura => "factura",
});

/// Tender type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Debit,
    Credit,
    Transfer,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Debit => "debit",
    Credit => "credit",
    Transfer => "transfer",
});

/// SaaS subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "subscription_plan", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Basic,
    Pro,
    Enterprise,
}

text_enum!(SubscriptionPlan, "subscription plan", {
    Basic => "basic",
    Pro => "pro",
    Enterprise => "enterprise",
});

/// SaaS subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Trial,
    Active,
    PastDue,
    Cancelled,
}

text_enum!(SubscriptionStatus, "subscription status", {
    Trial => "trial",
    Active => "active",
    PastDue => "past_due",
    Cancelled => "cancelled",
});

/// Commercial lens design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "lens_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum LensType {
    SingleVision,
    Bifocal,
    Progressive,
    /// Intermediate/near "office" progressive.
    Occupational,
}

text_enum!(LensType, "lens type", {
    SingleVision => "single_vision",
    Bifocal => "bifocal",
    Progressive => "progressive",
    Occupational => "occupational",
});

impl LensType {
    /// Whether the design carries the addition in the lens itself.
    #[must_use]
    pub const fn is_multifocal(self) -> bool {
        !matches!(self, Self::SingleVision)
    }
}

/// Which eye a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    /// OD (oculus dexter).
    Right,
    /// OI (oculus izquierdo).
    Left,
}

text_enum!(Eye, "eye", {
    Right => "right",
    Left => "left",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_round_trip() {
        for role in [
            UserRole::PlatformAdmin,
            UserRole::Owner,
            UserRole::Manager,
            UserRole::Seller,
            UserRole::Optometrist,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("root".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Owner.can_manage_organization());
        assert!(!UserRole::Manager.can_manage_organization());
        assert!(UserRole::Manager.can_manage_catalog());
        assert!(!UserRole::Seller.can_manage_catalog());
        assert!(!UserRole::PlatformAdmin.can_manage_catalog());
    }

    #[test]
    fn test_quote_transitions() {
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Sent));
        assert!(QuoteStatus::Sent.can_transition_to(QuoteStatus::Accepted));
        assert!(!QuoteStatus::Accepted.can_transition_to(QuoteStatus::Draft));
        assert!(!QuoteStatus::Draft.can_transition_to(QuoteStatus::Converted));
        assert!(!QuoteStatus::Converted.can_transition_to(QuoteStatus::Draft));
        assert!(!QuoteStatus::Expired.is_convertible());
        assert!(QuoteStatus::Accepted.is_convertible());
    }

    #[test]
    fn test_serde_names_match_text() {
        let json = serde_json::to_string(&ProductCategory::ContactLens).unwrap();
        assert_eq!(json, "\"contact_lens\"");
        assert_eq!(ProductCategory::ContactLens.to_string(), "contact_lens");

        let parsed: SubscriptionStatus = serde_json::from_str("\"past_due\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::PastDue);
    }

    #[test]
    fn test_lens_type_multifocal() {
        assert!(!LensType::SingleVision.is_multifocal());
        assert!(LensType::Progressive.is_multifocal());
        assert!(LensType::Occupational.is_multifocal());
    }
}
