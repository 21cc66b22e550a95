//! CPU quantity parsing
//!
//! kubectl reports CPU either as a milli-suffixed integer ("500m") or as
//! a decimal number of whole cores ("0.5"). Two encodings of the same
//! quantity must normalize to the same milli value.

/// Sentinel recorded when a probe could not read a field.
pub const UNAVAILABLE: &str = "N/A";

/// Parse a CPU quantity string into millicores.
///
/// Never fails: empty input, the "N/A" sentinel, and garbage all map to
/// 0 so a single bad reading degrades instead of halting a collection.
/// Negative values clamp to 0; quantities are magnitudes.
pub fn parse_quantity(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNAVAILABLE {
        return 0;
    }

    if let Some(digits) = raw.strip_suffix('m') {
        return digits.parse::<i64>().unwrap_or(0).max(0);
    }

    match raw.parse::<f64>() {
        Ok(cores) if cores.is_finite() => ((cores * 1000.0).trunc() as i64).max(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli_suffix_and_decimal_agree() {
        assert_eq!(parse_quantity("500m"), 500);
        assert_eq!(parse_quantity("0.5"), 500);
        assert_eq!(parse_quantity("1000m"), parse_quantity("1"));
        assert_eq!(parse_quantity("1500m"), parse_quantity("1.5"));
        assert_eq!(parse_quantity("2"), 2000);
    }

    #[test]
    fn sentinel_and_empty_are_zero() {
        assert_eq!(parse_quantity(""), 0);
        assert_eq!(parse_quantity("   "), 0);
        assert_eq!(parse_quantity("N/A"), 0);
    }

    #[test]
    fn garbage_never_panics_and_maps_to_zero() {
        for raw in ["abc", "12x", "m", "--", "1.2.3", "NaN", "inf", "500mi"] {
            assert_eq!(parse_quantity(raw), 0, "input {raw:?}");
        }
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(parse_quantity("-100m"), 0);
        assert_eq!(parse_quantity("-0.5"), 0);
    }

    #[test]
    fn decimal_truncates_toward_zero() {
        assert_eq!(parse_quantity("0.0015"), 1);
        assert_eq!(parse_quantity("0.0009"), 0);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(parse_quantity(" 250m "), 250);
        assert_eq!(parse_quantity("  0.25\n"), 250);
    }
}
