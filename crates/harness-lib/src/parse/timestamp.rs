//! Timestamp parsing for run records
//!
//! Artifact timestamps arrive in several shapes, e.g.
//! `2026-01-01T14:40:36.7415259+01:00` or `2026-01-01T14:40:36`. The
//! offset and sub-second digits are dropped before parsing: the result
//! is only used for relative ordering and delta computation, never for
//! wall-clock guarantees across timezones.

use chrono::NaiveDateTime;

use crate::error::HarnessError;

const ISO_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a timestamp, truncating any `+offset` and `.fraction` suffix.
///
/// Callers decide how to react: a run's start time is essential and the
/// error propagates, while a malformed per-sample timestamp is skippable.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, HarnessError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.split('+').next().unwrap_or(trimmed);
    let trimmed = trimmed.split('.').next().unwrap_or(trimmed);

    NaiveDateTime::parse_from_str(trimmed, ISO_FMT)
        .map_err(|_| HarnessError::MalformedTimestamp {
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parses_plain_iso() {
        let ts = parse_timestamp("2026-01-01T14:40:36").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(14, 40, 36)
                .unwrap()
        );
    }

    #[test]
    fn truncates_offset_and_fraction() {
        let full = parse_timestamp("2026-01-01T14:40:36.7415259+01:00").unwrap();
        let plain = parse_timestamp("2026-01-01T14:40:36").unwrap();
        assert_eq!(full, plain);
        assert_eq!(full.nanosecond(), 0);
    }

    #[test]
    fn fraction_only_and_offset_only() {
        assert!(parse_timestamp("2026-01-01T14:40:36.5").is_ok());
        assert!(parse_timestamp("2026-01-01T14:40:36+00:00").is_ok());
    }

    #[test]
    fn deltas_order_correctly() {
        let a = parse_timestamp("2026-01-01T14:40:00").unwrap();
        let b = parse_timestamp("2026-01-01T14:40:30+02:00").unwrap();
        assert_eq!((b - a).num_seconds(), 30);
    }

    #[test]
    fn malformed_is_an_error() {
        for raw in ["", "garbage", "2026-01-01", "14:40:36", "2026-01-01 14:40:36"] {
            let err = parse_timestamp(raw).unwrap_err();
            assert!(
                matches!(err, HarnessError::MalformedTimestamp { .. }),
                "input {raw:?}"
            );
        }
    }
}
