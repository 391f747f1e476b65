//! Weight strings arrive as `<number> kg`. Every consumer goes through
//! [`parse_weight_kg`] so the unit convention lives in one place.

use thiserror::Error;

pub const WEIGHT_UNIT: &str = "kg";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeightError {
    #[error("weight '{0}' does not end with the 'kg' unit")]
    MissingUnit(String),
    #[error("weight '{0}' has no numeric part")]
    Empty(String),
    #[error("weight '{0}' is not a number followed by 'kg'")]
    NotNumeric(String),
}

/// Parses `"13.2 kg"` or `"13.2kg"` into `13.2`.
pub fn parse_weight_kg(raw: &str) -> Result<f64, WeightError> {
    let number = raw
        .trim_end()
        .strip_suffix(WEIGHT_UNIT)
        .ok_or_else(|| WeightError::MissingUnit(raw.to_owned()))?
        .trim();

    if number.is_empty() {
        return Err(WeightError::Empty(raw.to_owned()));
    }

    let value = number
        .parse::<f64>()
        .map_err(|_| WeightError::NotNumeric(raw.to_owned()))?;
    if !value.is_finite() {
        return Err(WeightError::NotNumeric(raw.to_owned()));
    }

    Ok(value)
}

/// True when `evolved` weighs at least twice as much as `base`.
pub fn is_weight_doubling(base: f64, evolved: f64) -> bool {
    evolved >= 2.0 * base
}
