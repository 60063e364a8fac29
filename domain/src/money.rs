//! Money is stored in integer minor units (cents), never as floating point,
//! so rows can't drift from repeated (de)serialization. `to_minor_units` is
//! the one place a calculator accrual crosses that boundary.

/// Convert a calculator accrual (major units, e.g. `12.34`) to integer minor
/// units (e.g. `1234`) by rounding rather than truncating.
#[must_use]
pub fn to_minor_units(accrual: f64) -> i64 {
    (accrual * 100.0).round() as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_values_round_instead_of_truncating() {
        assert_eq!(to_minor_units(12.34), 1234);
        assert_eq!(to_minor_units(0.005), 1);
        assert_eq!(to_minor_units(0.004), 0);
        assert_eq!(to_minor_units(-3.996), -400);
    }

    proptest! {
        #[test]
        fn rounds_to_the_nearest_cent_and_never_truncates(accrual in -1_000_000.0f64..1_000_000.0) {
            let minor = to_minor_units(accrual);
            let expected = (accrual * 100.0).round() as i64;
            prop_assert_eq!(minor, expected);

            // the rounded result is never farther than half a cent from the
            // scaled input, which a truncating cast would violate whenever
            // the fractional part is >= 0.5
            let distance = (accrual * 100.0 - minor as f64).abs();
            prop_assert!(distance <= 0.5 + f64::EPSILON);
        }
    }
}
