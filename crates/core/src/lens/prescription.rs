use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LensError;
use crate::types::Eye;

const SPHERE_LIMIT: Decimal = Decimal::from_parts(30, 0, 0, false, 0);
const CYLINDER_LIMIT: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
const ADDITION_MAX: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
const QUARTER: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Refraction for one eye, in diopters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeRx {
    pub sphere: Decimal,
    #[serde(default)]
    pub cylinder: Decimal,
    /// Degrees, 0-180. Meaningless when `cylinder` is zero.
    #[serde(default)]
    pub axis: u16,
    #[serde(default)]
    pub addition: Decimal,
}

impl EyeRx {
    /// Validate ranges and quarter-diopter steps.
    ///
    /// # Errors
    ///
    /// Returns the first field that is out of range or off-step.
    pub fn validate(&self) -> Result<(), LensError> {
        check("sphere", self.sphere, -SPHERE_LIMIT, SPHERE_LIMIT)?;
        check("cylinder", self.cylinder, -CYLINDER_LIMIT, CYLINDER_LIMIT)?;
        check("addition", self.addition, Decimal::ZERO, ADDITION_MAX)?;
        if self.axis > 180 {
            return Err(LensError::InvalidAxis(self.axis));
        }
        Ok(())
    }

    /// The same refraction written with a negative (or zero) cylinder.
    ///
    /// ```
    /// use optica_core::lens::EyeRx;
    /// use rust_decimal::Decimal;
    ///
    /// let plus = EyeRx {
    ///     sphere: Decimal::new(-200, 2),
    ///     cylinder: Decimal::new(150, 2),
    ///     axis: 30,
    ///     addition: Decimal::ZERO,
    /// };
    /// let minus = plus.to_minus_cylinder();
    /// assert_eq!(minus.sphere, Decimal::new(-50, 2));
    /// assert_eq!(minus.cylinder, Decimal::new(-150, 2));
    /// assert_eq!(minus.axis, 120);
    /// ```
    #[must_use]
    pub fn to_minus_cylinder(&self) -> Self {
        if self.cylinder <= Decimal::ZERO {
            return *self;
        }
        Self {
            sphere: self.sphere + self.cylinder,
            cylinder: -self.cylinder,
            axis: (self.axis + 90) % 180,
            addition: self.addition,
        }
    }

    /// Near-vision equivalent: the addition folded into the sphere.
    #[must_use]
    pub fn near(&self) -> Self {
        Self {
            sphere: self.sphere + self.addition,
            addition: Decimal::ZERO,
            ..*self
        }
    }

    /// Distance-vision part: the addition dropped.
    #[must_use]
    pub fn distance(&self) -> Self {
        Self {
            addition: Decimal::ZERO,
            ..*self
        }
    }

    #[must_use]
    pub fn has_addition(&self) -> bool {
        self.addition > Decimal::ZERO
    }

    /// No refractive power at distance.
    #[must_use]
    pub fn is_plano(&self) -> bool {
        self.sphere.is_zero() && self.cylinder.is_zero()
    }
}

fn check(field: &'static str, value: Decimal, min: Decimal, max: Decimal) -> Result<(), LensError> {
    if value < min || value > max {
        return Err(LensError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    if !(value % QUARTER).is_zero() {
        return Err(LensError::NotQuarterStep { field, value });
    }
    Ok(())
}

/// Both eyes of a prescription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    /// OD
    pub right: EyeRx,
    /// OI
    pub left: EyeRx,
}

impl Prescription {
    /// Validate both eyes.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found, right eye first.
    pub fn validate(&self) -> Result<(), LensError> {
        self.right.validate()?;
        self.left.validate()
    }

    #[must_use]
    pub const fn eye(&self, eye: Eye) -> &EyeRx {
        match eye {
            Eye::Right => &self.right,
            Eye::Left => &self.left,
        }
    }

    /// Whether either eye carries a near addition (presbyopia).
    #[must_use]
    pub fn has_addition(&self) -> bool {
        self.right.has_addition() || self.left.has_addition()
    }

    #[must_use]
    pub fn near(&self) -> Self {
        Self {
            right: self.right.near(),
            left: self.left.near(),
        }
    }

    #[must_use]
    pub fn distance(&self) -> Self {
        Self {
            right: self.right.distance(),
            left: self.left.distance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rx(sphere: Decimal, cylinder: Decimal, axis: u16, addition: Decimal) -> EyeRx {
        EyeRx {
            sphere,
            cylinder,
            axis,
            addition,
        }
    }

    #[test]
    fn test_validate_accepts_common_rx() {
        assert!(rx(dec!(-2.25), dec!(-0.75), 180, dec!(2.00)).validate().is_ok());
        assert!(rx(dec!(30), dec!(-10), 0, dec!(4)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = rx(dec!(-30.25), dec!(0), 0, dec!(0)).validate();
        assert!(matches!(err, Err(LensError::OutOfRange { field: "sphere", .. })));

        let err = rx(dec!(0), dec!(0), 0, dec!(4.25)).validate();
        assert!(matches!(err, Err(LensError::OutOfRange { field: "addition", .. })));

        let err = rx(dec!(0), dec!(0), 0, dec!(-0.25)).validate();
        assert!(matches!(err, Err(LensError::OutOfRange { field: "addition", .. })));

        assert_eq!(
            rx(dec!(0), dec!(-1), 181, dec!(0)).validate(),
            Err(LensError::InvalidAxis(181))
        );
    }

    #[test]
    fn test_validate_rejects_off_step() {
        let err = rx(dec!(-1.10), dec!(0), 0, dec!(0)).validate();
        assert_eq!(
            err,
            Err(LensError::NotQuarterStep {
                field: "sphere",
                value: dec!(-1.10)
            })
        );
    }

    #[test]
    fn test_transposition() {
        let minus = rx(dec!(1.00), dec!(2.00), 170, dec!(0)).to_minus_cylinder();
        assert_eq!(minus, rx(dec!(3.00), dec!(-2.00), 80, dec!(0)));

        let already = rx(dec!(-1.00), dec!(-0.50), 90, dec!(0));
        assert_eq!(already.to_minus_cylinder(), already);

        // 90 + 90 wraps to 0
        assert_eq!(rx(dec!(0), dec!(1), 90, dec!(0)).to_minus_cylinder().axis, 0);
    }

    #[test]
    fn test_near_and_distance() {
        let eye = rx(dec!(-1.50), dec!(-0.50), 10, dec!(2.25));
        assert_eq!(eye.near(), rx(dec!(0.75), dec!(-0.50), 10, dec!(0)));
        assert_eq!(eye.distance(), rx(dec!(-1.50), dec!(-0.50), 10, dec!(0)));
        assert!(eye.has_addition());
        assert!(!eye.near().has_addition());
    }

    #[test]
    fn test_prescription_addition_on_one_eye() {
        let p = Prescription {
            right: rx(dec!(0), dec!(0), 0, dec!(0)),
            left: rx(dec!(0), dec!(0), 0, dec!(1.5)),
        };
        assert!(p.has_addition());
        assert!(p.right.is_plano());
        assert_eq!(p.eye(Eye::Left).addition, dec!(1.5));
    }
}
