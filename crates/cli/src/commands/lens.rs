//! Lens matrix import.
//!
//! # File format
//!
//! ```yaml
//! families:
//!   - name: Varilux Comfort
//!     brand: Essilor
//!     lens_type: progressive
//!     material: polycarbonate
//!     treatments: [antireflex]
//!     rows:
//!       - { sphere_min: -4, sphere_max: 4, cylinder_min: -2, cylinder_max: 0,
//!           addition_min: 0.75, addition_max: 3.5, price: 89990, cost: 31000 }
//! ```
//!
//! The whole file is validated before anything is written. Families are
//! matched by name, so re-importing a file replaces matrices in place.

use std::path::Path;

use serde::Deserialize;

use optica_admin::models::LensFamilyInput;
use optica_admin::services::LensService;
use optica_admin::services::lens::validate_matrix;
use optica_admin::state::LensMatrixCache;
use optica_core::OrganizationId;
use optica_core::lens::MatrixRow;

use super::{CliError, connect};

#[derive(Debug, Deserialize)]
pub struct LensImport {
    pub families: Vec<FamilyImport>,
}

#[derive(Debug, Deserialize)]
pub struct FamilyImport {
    #[serde(flatten)]
    pub family: LensFamilyInput,
    pub rows: Vec<MatrixRow>,
}

/// Parse and validate an import file.
///
/// # Errors
///
/// Returns `CliError::Yaml` for malformed files and `CliError::Invalid`
/// naming the family for an empty list, a blank or repeated name, or a bad
/// matrix row.
pub fn parse(yaml: &str) -> Result<LensImport, CliError> {
    let import: LensImport = serde_yaml::from_str(yaml)?;
    if import.families.is_empty() {
        return Err(CliError::Invalid("no families to import".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for entry in &import.families {
        let name = entry.family.name.trim();
        if name.is_empty() {
            return Err(CliError::Invalid("family name is required".to_string()));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(CliError::Invalid(format!("family {name} appears twice")));
        }
        validate_matrix(&entry.rows).map_err(|e| CliError::Invalid(format!("{name}: {e}")))?;
    }
    Ok(import)
}

/// Import every family in `file` into organization `org`.
pub async fn import(org: i32, file: &Path, dry_run: bool) -> Result<(), CliError> {
    let yaml = std::fs::read_to_string(file).map_err(|source| CliError::Read {
        path: file.display().to_string(),
        source,
    })?;
    let import = parse(&yaml)?;
    let rows: usize = import.families.iter().map(|f| f.rows.len()).sum();
    tracing::info!("{} families, {rows} rows validated", import.families.len());

    if dry_run {
        return Ok(());
    }

    let pool = connect().await?;
    // Process-local; the server's cache expires on its own TTL.
    let cache = LensMatrixCache::builder().max_capacity(64).build();
    let lens = LensService::new(&pool, &cache);
    let org = OrganizationId::new(org);

    for entry in &import.families {
        let stored = lens.import(org, &entry.family, &entry.rows).await?;
        tracing::info!(
            "Imported {} (ID: {}) with {} rows",
            stored.family.name,
            stored.family.id,
            stored.rows.len()
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use optica_core::LensType;
    use rust_decimal_macros::dec;

    const FILE: &str = r"
families:
  - name: Varilux Comfort
    brand: Essilor
    lens_type: progressive
    treatments: [antireflex]
    rows:
      - sphere_min: -4
        sphere_max: 4
        cylinder_min: -2
        cylinder_max: 0
        addition_min: 0.75
        addition_max: 3.5
        price: 89990
        cost: 31000
  - name: Monofocal CR-39
    lens_type: single_vision
    rows:
      - { sphere_min: -6, sphere_max: 6, cylinder_min: -2, cylinder_max: 0, price: 19990 }
";

    #[test]
    fn test_parse_reads_families_and_rows() {
        let import = parse(FILE).unwrap();
        assert_eq!(import.families.len(), 2);

        let progressive = &import.families[0];
        assert_eq!(progressive.family.lens_type, LensType::Progressive);
        assert_eq!(progressive.family.treatments, vec!["antireflex".to_string()]);
        assert!(progressive.family.active);
        assert_eq!(progressive.rows[0].addition_max, Some(dec!(3.5)));

        let single = &import.families[1];
        assert_eq!(single.rows[0].addition_min, None);
        assert_eq!(single.rows[0].cost, dec!(0));
    }

    #[test]
    fn test_parse_rejects_bad_rows_by_family() {
        let yaml = FILE.replace("sphere_min: -6, sphere_max: 6", "sphere_min: 6, sphere_max: -6");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().starts_with("Monofocal CR-39: row 1:"), "{err}");
    }

    #[test]
    fn test_parse_rejects_duplicates_and_empty_files() {
        let twice = FILE.replace("Monofocal CR-39", "varilux comfort");
        assert!(matches!(parse(&twice), Err(CliError::Invalid(_))));
        assert!(matches!(parse("families: []"), Err(CliError::Invalid(_))));
        assert!(matches!(parse("families: 3"), Err(CliError::Yaml(_))));
    }
}
