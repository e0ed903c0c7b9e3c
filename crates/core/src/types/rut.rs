//! Chilean RUT (Rol Único Tributario).
//!
//! Organizations and invoice customers are identified by their RUT. The last
//! character is a modulo-11 check digit (`0`-`9` or `K`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Rut`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RutError {
    #[error("RUT cannot be empty")]
    Empty,
    #[error("RUT must have a body and a check digit")]
    MissingCheckDigit,
    #[error("RUT body must contain only digits")]
    InvalidBody,
    #[error("RUT body must have between 7 and 8 digits")]
    BodyLength,
    #[error("RUT check digit is invalid (expected {expected})")]
    CheckDigit { expected: char },
}

/// A validated RUT, stored canonically as `12345678-5`.
///
/// Dots and whitespace are accepted on input; the dash is optional.
///
/// ```
/// use optica_core::Rut;
///
/// let rut = Rut::parse("12.345.678-5").unwrap();
/// assert_eq!(rut.as_str(), "12345678-5");
/// assert_eq!(rut.formatted(), "12.345.678-5");
///
/// assert!(Rut::parse("12.345.678-9").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Rut(String);

impl Rut {
    /// Parse and validate a RUT.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, the body is not 7-8 digits, or
    /// the check digit does not match.
    pub fn parse(s: &str) -> Result<Self, RutError> {
        let cleaned: String = s
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | ' '))
            .collect::<String>()
            .to_uppercase();

        if cleaned.is_empty() {
            return Err(RutError::Empty);
        }
        if cleaned.len() < 2 {
            return Err(RutError::MissingCheckDigit);
        }

        let (body, dv) = cleaned.split_at(cleaned.len() - 1);
        if !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(RutError::InvalidBody);
        }
        if !(7..=8).contains(&body.len()) {
            return Err(RutError::BodyLength);
        }

        let expected = check_digit(body);
        if dv.chars().next() != Some(expected) {
            return Err(RutError::CheckDigit { expected });
        }

        Ok(Self(format!("{body}-{expected}")))
    }

    /// Canonical form without dots (`12345678-5`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human form with thousands dots (`12.345.678-5`).
    #[must_use]
    pub fn formatted(&self) -> String {
        let (body, dv) = self.0.split_once('-').unwrap_or((&self.0, ""));
        let mut grouped = String::with_capacity(body.len() + 3);
        for (i, c) in body.chars().enumerate() {
            if i > 0 && (body.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        format!("{grouped}-{dv}")
    }
}

/// Modulo-11 check digit for a string of ASCII digits.
fn check_digit(body: &str) -> char {
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip([2, 3, 4, 5, 6, 7].into_iter().cycle())
        .map(|(d, m)| d * m)
        .sum();

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl std::str::FromStr for Rut {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Rut {
    type Error = RutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rut> for String {
    fn from(rut: Rut) -> Self {
        rut.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Rut {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Rut {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Rut {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
