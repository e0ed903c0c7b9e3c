use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EyeRx, LensError, Prescription};
use crate::types::{Eye, LensFamilyId, LensType};

/// A commercial lens line as sold by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensFamily {
    pub id: LensFamilyId,
    pub name: String,
    pub brand: Option<String>,
    pub lens_type: LensType,
    pub material: Option<String>,
    #[serde(default)]
    pub treatments: Vec<String>,
    pub active: bool,
}

/// One price band of a family's matrix.
///
/// Bounds are inclusive. Cylinder bounds are in minus-cylinder notation.
/// A row without an addition range prices single-vision lenses and only
/// matches a zero addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub sphere_min: Decimal,
    pub sphere_max: Decimal,
    pub cylinder_min: Decimal,
    pub cylinder_max: Decimal,
    #[serde(default)]
    pub addition_min: Option<Decimal>,
    #[serde(default)]
    pub addition_max: Option<Decimal>,
    /// Price per lens, whole pesos, tax included.
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
}

impl MatrixRow {
    /// Check bound ordering and non-negative amounts.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first inverted range, or a negative price.
    pub fn validate(&self) -> Result<(), LensError> {
        if self.sphere_min > self.sphere_max {
            return Err(LensError::InvertedRange("sphere"));
        }
        if self.cylinder_min > self.cylinder_max {
            return Err(LensError::InvertedRange("cylinder"));
        }
        match (self.addition_min, self.addition_max) {
            (Some(min), Some(max)) if min > max => return Err(LensError::InvertedRange("addition")),
            (Some(_), None) | (None, Some(_)) => return Err(LensError::InvertedRange("addition")),
            _ => {}
        }
        if self.price < Decimal::ZERO || self.cost < Decimal::ZERO {
            return Err(LensError::NegativePrice);
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, sphere: Decimal, cylinder: Decimal, addition: Decimal) -> bool {
        let addition_ok = match (self.addition_min, self.addition_max) {
            (Some(min), Some(max)) => (min..=max).contains(&addition),
            _ => addition.is_zero(),
        };
        addition_ok
            && (self.sphere_min..=self.sphere_max).contains(&sphere)
            && (self.cylinder_min..=self.cylinder_max).contains(&cylinder)
    }
}

/// Find the row pricing one eye.
///
/// The eye is transposed to minus cylinder first. When bands overlap the
/// cheapest matching row wins.
#[must_use]
pub fn price_lookup<'a>(rows: &'a [MatrixRow], eye: &EyeRx) -> Option<&'a MatrixRow> {
    let eye = eye.to_minus_cylinder();
    rows.iter()
        .filter(|r| r.contains(eye.sphere, eye.cylinder, eye.addition))
        .min_by_key(|r| r.price)
}

/// Price of a pair of lenses from one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPrice {
    pub family_id: LensFamilyId,
    pub family_name: String,
    pub lens_type: LensType,
    pub right: Decimal,
    pub left: Decimal,
    pub total: Decimal,
    pub cost: Decimal,
}

/// Price both eyes of `rx` in `family`.
///
/// Single-vision families are priced on the distance Rx (any addition is
/// ignored). Multifocal families are priced on the full Rx.
///
/// # Errors
///
/// Returns [`LensError::NoCoverage`] naming the first eye (right, then
/// left) the matrix does not cover.
pub fn price_pair(family: &LensFamily, rows: &[MatrixRow], rx: &Prescription) -> Result<PairPrice, LensError> {
    let rx = if family.lens_type.is_multifocal() {
        *rx
    } else {
        rx.distance()
    };

    let lookup = |eye: Eye| {
        price_lookup(rows, rx.eye(eye)).ok_or_else(|| LensError::NoCoverage {
            family: family.name.clone(),
            eye,
        })
    };
    let right = lookup(Eye::Right)?;
    let left = lookup(Eye::Left)?;

    Ok(PairPrice {
        family_id: family.id,
        family_name: family.name.clone(),
        lens_type: family.lens_type,
        right: right.price,
        left: left.price,
        total: right.price + left.price,
        cost: right.cost + left.cost,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sv_row(sph: (Decimal, Decimal), cyl_min: Decimal, price: Decimal) -> MatrixRow {
        MatrixRow {
            sphere_min: sph.0,
            sphere_max: sph.1,
            cylinder_min: cyl_min,
            cylinder_max: dec!(0),
            addition_min: None,
            addition_max: None,
            price,
            cost: price / dec!(2),
        }
    }

    fn family(lens_type: LensType) -> LensFamily {
        LensFamily {
            id: LensFamilyId::new(1),
            name: String::from("Monofocal 1.56"),
            brand: None,
            lens_type,
            material: Some(String::from("1.56")),
            treatments: vec![String::from("AR")],
            active: true,
        }
    }

    fn eye(sphere: Decimal, cylinder: Decimal, addition: Decimal) -> EyeRx {
        EyeRx {
            sphere,
            cylinder,
            axis: 90,
            addition,
        }
    }

    #[test]
    fn test_contains_is_inclusive() {
        let row = sv_row((dec!(-4), dec!(4)), dec!(-2), dec!(20000));
        assert!(row.contains(dec!(-4), dec!(-2), dec!(0)));
        assert!(row.contains(dec!(4), dec!(0), dec!(0)));
        assert!(!row.contains(dec!(4.25), dec!(0), dec!(0)));
        assert!(!row.contains(dec!(0), dec!(-2.25), dec!(0)));
    }

    #[test]
    fn test_row_without_addition_only_matches_zero_add() {
        let row = sv_row((dec!(-4), dec!(4)), dec!(-2), dec!(20000));
        assert!(!row.contains(dec!(0), dec!(0), dec!(1)));

        let prog = MatrixRow {
            addition_min: Some(dec!(0.75)),
            addition_max: Some(dec!(3.5)),
            ..row
        };
        assert!(prog.contains(dec!(0), dec!(0), dec!(2)));
        assert!(!prog.contains(dec!(0), dec!(0), dec!(0)));
    }

    #[test]
    fn test_lookup_transposes_and_picks_cheapest() {
        let rows = [
            sv_row((dec!(-6), dec!(6)), dec!(-4), dec!(35000)),
            sv_row((dec!(-2), dec!(2)), dec!(-2), dec!(18000)),
        ];

        // +1.00 / +1.00 x 90 is 2.00 / -1.00 x 180 in minus cylinder
        let row = price_lookup(&rows, &eye(dec!(1), dec!(1), dec!(0))).unwrap();
        assert_eq!(row.price, dec!(18000));

        // -3.00 only fits the wide band
        let row = price_lookup(&rows, &eye(dec!(-3), dec!(0), dec!(0))).unwrap();
        assert_eq!(row.price, dec!(35000));

        assert!(price_lookup(&rows, &eye(dec!(-8), dec!(0), dec!(0))).is_none());
    }

    #[test]
    fn test_price_pair_names_missing_eye() {
        let rows = [sv_row((dec!(-2), dec!(2)), dec!(-2), dec!(18000))];
        let rx = Prescription {
            right: eye(dec!(-1), dec!(0), dec!(0)),
            left: eye(dec!(-5), dec!(0), dec!(0)),
        };
        let err = price_pair(&family(LensType::SingleVision), &rows, &rx).unwrap_err();
        assert_eq!(
            err,
            LensError::NoCoverage {
                family: String::from("Monofocal 1.56"),
                eye: Eye::Left
            }
        );
    }

    #[test]
    fn test_single_vision_ignores_addition() {
        let rows = [sv_row((dec!(-2), dec!(2)), dec!(-2), dec!(18000))];
        let rx = Prescription {
            right: eye(dec!(-1), dec!(0), dec!(2)),
            left: eye(dec!(-1.5), dec!(-0.5), dec!(2)),
        };
        let pair = price_pair(&family(LensType::SingleVision), &rows, &rx).unwrap();
        assert_eq!(pair.total, dec!(36000));
        assert_eq!(pair.cost, dec!(18000));
    }

    #[test]
    fn test_validate_row() {
        let mut row = sv_row((dec!(2), dec!(-2)), dec!(-2), dec!(1));
        assert_eq!(row.validate(), Err(LensError::InvertedRange("sphere")));
        row.sphere_min = dec!(-2);
        row.addition_min = Some(dec!(1));
        assert_eq!(row.validate(), Err(LensError::InvertedRange("addition")));
        row.addition_max = Some(dec!(3));
        assert!(row.validate().is_ok());
        row.price = dec!(-1);
        assert_eq!(row.validate(), Err(LensError::NegativePrice));
    }
}
