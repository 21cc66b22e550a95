//! Temporal alignment between a primary run and candidate counterparts.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::Run;

/// How many samples the nearest-sample window holds.
pub const NEAREST_WINDOW: usize = 3;

/// One counterpart sample close in time to the primary run's start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestSample {
    /// Signed seconds from the primary run's start to this sample.
    pub delta_secs: i64,
    pub timestamp: NaiveDateTime,
    pub elapsed: i64,
}

/// Result of aligning a primary run against a set of counterparts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alignment {
    pub counterpart_id: String,
    pub counterpart_started: NaiveDateTime,
    pub nearest: Vec<NearestSample>,
}

/// Pick the counterpart whose start is latest without being after the
/// primary's start, then collect its samples nearest in time to that
/// start. Counterparts started after the primary describe a different
/// experiment and are never matched.
pub fn align<'a>(
    primary: &Run,
    candidates: impl IntoIterator<Item = &'a Run>,
) -> Option<Alignment> {
    let mut best: Option<&Run> = None;
    for candidate in candidates {
        if candidate.started > primary.started {
            continue;
        }
        // Strict comparison keeps the first candidate on ties, so the
        // result does not depend on iteration luck.
        match best {
            Some(current) if candidate.started > current.started => best = Some(candidate),
            None => best = Some(candidate),
            _ => {}
        }
    }
    let best = best?;

    let mut nearest: Vec<NearestSample> = best
        .samples
        .iter()
        .filter_map(|s| {
            let timestamp = s.timestamp?;
            Some(NearestSample {
                delta_secs: (timestamp - primary.started).num_seconds(),
                timestamp,
                elapsed: s.elapsed,
            })
        })
        .collect();
    // Ties on |delta| resolve toward the earlier timestamp.
    nearest.sort_by_key(|n| (n.delta_secs.abs(), n.timestamp));
    nearest.truncate(NEAREST_WINDOW);

    Some(Alignment {
        counterpart_id: best.run_id.clone(),
        counterpart_started: best.started,
        nearest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Run, RunKind, RunParams, Sample};
    use crate::parse::parse_timestamp;
    use chrono::NaiveDateTime;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn monitor(run_id: &str, started: &str, sample_stamps: &[&str]) -> Run {
        Run {
            run_id: run_id.into(),
            kind: RunKind::MonitorRun,
            started: ts(started),
            ended: None,
            namespace: "demo".into(),
            target: "checkout".into(),
            params: RunParams::Monitor { interval_secs: 10 },
            samples: sample_stamps
                .iter()
                .enumerate()
                .map(|(i, stamp)| Sample {
                    timestamp: Some(ts(stamp)),
                    elapsed: (i as i64 + 1) * 10,
                    ..Sample::default()
                })
                .collect(),
            events: Vec::new(),
        }
    }

    fn load(run_id: &str, started: &str) -> Run {
        Run {
            run_id: run_id.into(),
            kind: RunKind::LoadRun,
            started: ts(started),
            ended: None,
            namespace: "demo".into(),
            target: "checkout".into(),
            params: RunParams::Load {
                duration_secs: 60,
                intensity: 8,
                background: false,
            },
            samples: Vec::new(),
            events: Vec::new(),
        }
    }

    #[test]
    fn picks_latest_counterpart_not_after_primary() {
        let primary = load("lr", "2026-01-01T12:00:00");
        let old = monitor("mr-old", "2026-01-01T11:59:30", &[]);
        let near = monitor("mr-near", "2026-01-01T11:59:50", &[]);
        let future = monitor("mr-future", "2026-01-01T12:00:10", &[]);

        let alignment = align(&primary, [&old, &near, &future]).unwrap();
        assert_eq!(alignment.counterpart_id, "mr-near");
    }

    #[test]
    fn no_match_when_all_counterparts_start_later() {
        let primary = load("lr", "2026-01-01T12:00:00");
        let later = monitor("mr", "2026-01-01T12:00:01", &[]);
        assert!(align(&primary, [&later]).is_none());
    }

    #[test]
    fn nearest_window_is_sorted_and_bounded() {
        let primary = load("lr", "2026-01-01T12:00:30");
        let counterpart = monitor(
            "mr",
            "2026-01-01T12:00:00",
            &[
                "2026-01-01T12:00:10",
                "2026-01-01T12:00:20",
                "2026-01-01T12:00:31",
                "2026-01-01T12:00:40",
                "2026-01-01T12:00:50",
            ],
        );

        let alignment = align(&primary, [&counterpart]).unwrap();
        assert_eq!(alignment.nearest.len(), NEAREST_WINDOW);
        assert_eq!(alignment.nearest[0].delta_secs, 1);
        let deltas: Vec<i64> = alignment.nearest.iter().map(|n| n.delta_secs).collect();
        assert_eq!(deltas, vec![1, -10, 10]);
    }

    #[test]
    fn equal_distance_resolves_to_earlier_timestamp() {
        let primary = load("lr", "2026-01-01T12:00:30");
        let counterpart = monitor(
            "mr",
            "2026-01-01T12:00:00",
            &["2026-01-01T12:00:20", "2026-01-01T12:00:40"],
        );

        let alignment = align(&primary, [&counterpart]).unwrap();
        assert_eq!(alignment.nearest[0].timestamp, ts("2026-01-01T12:00:20"));
    }

    #[test]
    fn equal_start_tie_keeps_first_candidate() {
        let primary = load("lr", "2026-01-01T12:00:00");
        let a = monitor("mr-a", "2026-01-01T11:59:00", &[]);
        let b = monitor("mr-b", "2026-01-01T11:59:00", &[]);

        let alignment = align(&primary, [&a, &b]).unwrap();
        assert_eq!(alignment.counterpart_id, "mr-a");
    }

    #[test]
    fn timestampless_samples_are_ignored() {
        let primary = load("lr", "2026-01-01T12:00:00");
        let mut counterpart = monitor("mr", "2026-01-01T11:59:00", &["2026-01-01T11:59:50"]);
        counterpart.samples.push(Sample {
            timestamp: None,
            elapsed: 20,
            ..Sample::default()
        });

        let alignment = align(&primary, [&counterpart]).unwrap();
        assert_eq!(alignment.nearest.len(), 1);
    }

    #[test]
    fn alignment_is_deterministic() {
        let primary = load("lr", "2026-01-01T12:00:00");
        let counterpart = monitor(
            "mr",
            "2026-01-01T11:59:00",
            &["2026-01-01T11:59:30", "2026-01-01T11:59:50"],
        );

        let first = align(&primary, [&counterpart]).unwrap();
        let second = align(&primary, [&counterpart]).unwrap();
        assert_eq!(first, second);
    }
}
