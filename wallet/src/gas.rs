//! Gas limit padding applied between the estimate and submit phases.

/// Numerator of the 1.2 safety margin
const MARGIN_NUMERATOR: u128 = 6;
/// Denominator of the 1.2 safety margin
const MARGIN_DENOMINATOR: u128 = 5;

/// Scales a gas estimate by 1.2, rounding down.
///
/// Computed in 128-bit integers so large estimates neither overflow nor pick up
/// floating point drift. Results beyond `u64::MAX` saturate.
pub fn apply_safety_margin(estimate: u64) -> u64 {
    let padded = u128::from(estimate) * MARGIN_NUMERATOR / MARGIN_DENOMINATOR;
    u64::try_from(padded).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_rounds_down() {
        assert_eq!(apply_safety_margin(100_000), 120_000);
        assert_eq!(apply_safety_margin(100_001), 120_001);
        assert_eq!(apply_safety_margin(100_004), 120_004);
        assert_eq!(apply_safety_margin(21_000), 25_200);
    }

    #[test]
    fn test_margin_edges() {
        assert_eq!(apply_safety_margin(0), 0);
        assert_eq!(apply_safety_margin(1), 1);
        assert_eq!(apply_safety_margin(5), 6);
        assert_eq!(apply_safety_margin(u64::MAX), u64::MAX);
    }
}
