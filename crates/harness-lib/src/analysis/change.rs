//! Allocation change detection over a run's sample sequence.

use serde::Serialize;

use crate::models::{Run, Sample};

/// Which allocation series of a sample a computation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationField {
    Request,
    #[default]
    Limit,
    Usage,
}

impl AllocationField {
    pub fn value(&self, sample: &Sample) -> i64 {
        match self {
            AllocationField::Request => sample.request.milli,
            AllocationField::Limit => sample.limit.milli,
            AllocationField::Usage => sample.usage.milli,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationField::Request => "request",
            AllocationField::Limit => "limit",
            AllocationField::Usage => "usage",
        }
    }
}

/// One detected allocation transition between consecutive samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Elapsed seconds of the sample where the new value first appears.
    pub elapsed: i64,
    pub from_milli: i64,
    pub to_milli: i64,
    pub delta_milli: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChangeSummary {
    pub count: usize,
    /// Elapsed seconds of the first change, if any occurred.
    pub first_change: Option<i64>,
}

/// Scan consecutive sample pairs for transitions in the chosen series.
/// Comparison is on parsed milli values, so "1" and "1000m" never
/// register as a change.
pub fn detect_changes(run: &Run, field: AllocationField) -> Vec<ChangeEvent> {
    run.samples
        .windows(2)
        .filter_map(|pair| {
            let from = field.value(&pair[0]);
            let to = field.value(&pair[1]);
            (from != to).then(|| ChangeEvent {
                elapsed: pair[1].elapsed,
                from_milli: from,
                to_milli: to,
                delta_milli: to - from,
            })
        })
        .collect()
}

pub fn summarize_changes(run: &Run, field: AllocationField) -> ChangeSummary {
    let changes = detect_changes(run, field);
    ChangeSummary {
        count: changes.len(),
        first_change: changes.first().map(|c| c.elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reading, Run, RunKind, RunParams, Sample};
    use crate::parse::parse_timestamp;

    fn run_with_limits(points: &[(i64, &str)]) -> Run {
        Run {
            run_id: "idle_metrics_test".into(),
            kind: RunKind::IdleTrack,
            started: parse_timestamp("2026-01-01T10:00:00").unwrap(),
            ended: None,
            namespace: "mbcas-test".into(),
            target: "idle-overprovisioned".into(),
            params: RunParams::Idle {
                duration_secs: 300,
                interval_secs: 5,
                request: "500m".into(),
                limit: "1000m".into(),
            },
            samples: points
                .iter()
                .map(|(elapsed, limit)| Sample {
                    elapsed: *elapsed,
                    limit: Reading::parse(*limit),
                    ..Sample::default()
                })
                .collect(),
            events: Vec::new(),
        }
    }

    #[test]
    fn single_downsize_yields_one_event() {
        let run = run_with_limits(&[(5, "1000m"), (10, "500m"), (15, "500m")]);

        let changes = detect_changes(&run, AllocationField::Limit);
        assert_eq!(
            changes,
            vec![ChangeEvent {
                elapsed: 10,
                from_milli: 1000,
                to_milli: 500,
                delta_milli: -500,
            }]
        );

        let summary = summarize_changes(&run, AllocationField::Limit);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.first_change, Some(10));
    }

    #[test]
    fn equivalent_encodings_are_not_a_change() {
        let run = run_with_limits(&[(5, "1"), (10, "1000m")]);
        assert!(detect_changes(&run, AllocationField::Limit).is_empty());
    }

    #[test]
    fn reversal_is_two_events() {
        let run = run_with_limits(&[(5, "1000m"), (10, "500m"), (15, "1000m")]);
        let changes = detect_changes(&run, AllocationField::Limit);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].delta_milli, -500);
        assert_eq!(changes[1].delta_milli, 500);
    }

    #[test]
    fn empty_and_single_sample_runs_have_no_changes() {
        assert!(detect_changes(&run_with_limits(&[]), AllocationField::Limit).is_empty());
        assert!(
            detect_changes(&run_with_limits(&[(5, "1000m")]), AllocationField::Limit).is_empty()
        );
        assert_eq!(
            summarize_changes(&run_with_limits(&[]), AllocationField::Limit).first_change,
            None
        );
    }

    #[test]
    fn detection_is_pure() {
        let run = run_with_limits(&[(5, "1000m"), (10, "500m")]);
        let first = detect_changes(&run, AllocationField::Limit);
        let second = detect_changes(&run, AllocationField::Limit);
        assert_eq!(first, second);
    }

    #[test]
    fn field_selector_reads_the_chosen_series() {
        let mut run = run_with_limits(&[(5, "1000m"), (10, "1000m")]);
        run.samples[0].request = Reading::parse("500m");
        run.samples[1].request = Reading::parse("250m");

        assert!(detect_changes(&run, AllocationField::Limit).is_empty());
        assert_eq!(detect_changes(&run, AllocationField::Request).len(), 1);
    }
}
