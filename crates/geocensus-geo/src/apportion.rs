//! Area-weighted apportionment and its rounding rule.

use crate::error::{GeoError, Result};

/// Decimal places kept by interpolated values.
pub const INTERPOLATION_PLACES: u32 = 2;

/// Round half away from zero to `places` decimals.
///
/// The scaled value is nudged by a few ulps first so that decimal ties that
/// binary floating point stores just below `.5` (e.g. `2.675`) still round
/// the way a decimal `round()` would.
pub fn round_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let scaled = value * factor;
    let nudged = scaled + scaled.signum() * scaled.abs() * 4.0 * f64::EPSILON;
    nudged.round() / factor
}

/// `round(value × child_area / parent_area, 2)`.
pub fn apportion(value: f64, child_area: f64, parent_area: f64) -> Result<f64> {
    if parent_area.is_nan() || parent_area <= 0.0 {
        return Err(GeoError::NonPositiveParentArea(parent_area));
    }
    let raw = value * (child_area / parent_area);
    if !raw.is_finite() {
        return Err(GeoError::NonFiniteValue);
    }
    Ok(round_places(raw, INTERPOLATION_PLACES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(apportion(100.0, 1.0, 3.0).unwrap(), 33.33);
        assert_eq!(apportion(100.0, 2.0, 3.0).unwrap(), 66.67);
        assert_eq!(apportion(-100.0, 2.0, 3.0).unwrap(), -66.67);
    }

    #[test]
    fn decimal_ties_round_away_from_zero() {
        assert_eq!(round_places(2.675, 2), 2.68);
        assert_eq!(round_places(1.005, 2), 1.01);
        assert_eq!(round_places(-0.125, 2), -0.13);
    }

    #[test]
    fn repeated_computation_is_identical() {
        let first = apportion(1234.5678, 17.0, 91.0).unwrap();
        for _ in 0..100 {
            assert_eq!(apportion(1234.5678, 17.0, 91.0).unwrap().to_bits(), first.to_bits());
        }
    }

    #[test]
    fn zero_parent_area_is_an_error() {
        assert!(apportion(1.0, 1.0, 0.0).is_err());
        assert!(apportion(1.0, 1.0, f64::NAN).is_err());
    }
}
