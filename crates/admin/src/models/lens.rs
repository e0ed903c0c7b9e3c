//! Lens family and pricing request types.

use serde::{Deserialize, Serialize};

use optica_core::lens::{LensFamily, MatrixRow, Prescription};
use optica_core::{LensFamilyId, LensType};

/// Fields accepted when creating or editing a lens family.
#[derive(Debug, Clone, Deserialize)]
pub struct LensFamilyInput {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub lens_type: LensType,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub treatments: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// A family with its full price matrix.
#[derive(Debug, Clone, Serialize)]
pub struct LensMatrix {
    pub family: LensFamily,
    pub rows: Vec<MatrixRow>,
}

/// `POST /api/lens/price` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LensPriceRequest {
    pub family_id: LensFamilyId,
    pub prescription: Prescription,
}

/// `POST /api/lens/solutions` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SolutionsRequest {
    pub prescription: Prescription,
}
