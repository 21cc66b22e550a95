//! Efficiency metrics and run-level comparison.

use serde::Serialize;

use crate::analysis::change::{detect_changes, AllocationField, ChangeSummary};
use crate::models::{Run, RunKind};

/// Utilization and overhead percentages for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SampleEfficiency {
    pub request_utilization_pct: f64,
    pub limit_utilization_pct: f64,
    pub overhead_pct: f64,
}

/// Per-sample efficiency. A non-positive denominator yields 0 for the
/// metrics that depend on it; a usage spike above the limit keeps its
/// negative overhead so bursts stay visible.
pub fn sample_efficiency(usage_milli: i64, request_milli: i64, limit_milli: i64) -> SampleEfficiency {
    let ratio = |num: i64, den: i64| {
        if den > 0 {
            num as f64 / den as f64 * 100.0
        } else {
            0.0
        }
    };
    SampleEfficiency {
        request_utilization_pct: ratio(usage_milli, request_milli),
        limit_utilization_pct: ratio(usage_milli, limit_milli),
        overhead_pct: ratio(limit_milli - usage_milli, limit_milli),
    }
}

/// Mean, max, min over a value series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Aggregate {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub samples: usize,
}

impl Aggregate {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        Aggregate {
            mean: sum / values.len() as f64,
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            samples: values.len(),
        }
    }
}

/// Aggregated efficiency statistics over a whole run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunStats {
    pub usage_milli: Aggregate,
    pub request_utilization_pct: Aggregate,
    pub limit_utilization_pct: Aggregate,
    pub overhead_pct: Aggregate,
}

/// Aggregate efficiency over a run. Usage covers every sample; the
/// ratio metrics only aggregate samples whose denominator is positive,
/// so provisioning gaps do not drag the means to zero.
pub fn run_stats(run: &Run) -> RunStats {
    let usage: Vec<f64> = run.samples.iter().map(|s| s.usage.milli as f64).collect();

    let mut request_util = Vec::new();
    let mut limit_util = Vec::new();
    let mut overhead = Vec::new();
    for s in &run.samples {
        let eff = sample_efficiency(s.usage.milli, s.request.milli, s.limit.milli);
        if s.request.milli > 0 {
            request_util.push(eff.request_utilization_pct);
        }
        if s.limit.milli > 0 {
            limit_util.push(eff.limit_utilization_pct);
            overhead.push(eff.overhead_pct);
        }
    }

    RunStats {
        usage_milli: Aggregate::from_values(&usage),
        request_utilization_pct: Aggregate::from_values(&request_util),
        limit_utilization_pct: Aggregate::from_values(&limit_util),
        overhead_pct: Aggregate::from_values(&overhead),
    }
}

/// Absolute and relative delta between the same metric on two runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricDiff {
    pub a: f64,
    pub b: f64,
    pub diff: f64,
    pub diff_pct: f64,
}

impl MetricDiff {
    pub fn new(a: f64, b: f64) -> Self {
        MetricDiff {
            a,
            b,
            diff: a - b,
            diff_pct: if b != 0.0 { (a - b) / b * 100.0 } else { 0.0 },
        }
    }
}

/// Single-run summary of allocation behavior over one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub kind: RunKind,
    pub sample_count: usize,
    pub initial_milli: i64,
    pub final_milli: i64,
    pub reduction_pct: f64,
    pub changes: ChangeSummary,
    /// Elapsed seconds of the first sample carrying a positive
    /// autoscaler target.
    pub first_recommendation: Option<i64>,
    pub stats: RunStats,
}

pub fn summarize_run(run: &Run, field: AllocationField) -> RunSummary {
    let initial = run.samples.first().map(|s| field.value(s)).unwrap_or(0);
    let fin = run.samples.last().map(|s| field.value(s)).unwrap_or(0);
    let reduction_pct = if initial > 0 {
        (initial - fin) as f64 / initial as f64 * 100.0
    } else {
        0.0
    };

    let changes = detect_changes(run, field);
    RunSummary {
        run_id: run.run_id.clone(),
        kind: run.kind,
        sample_count: run.samples.len(),
        initial_milli: initial,
        final_milli: fin,
        reduction_pct,
        changes: ChangeSummary {
            count: changes.len(),
            first_change: changes.first().map(|c| c.elapsed),
        },
        first_recommendation: run
            .samples
            .iter()
            .find(|s| s.autoscaler.target.milli > 0)
            .map(|s| s.elapsed),
        stats: run_stats(run),
    }
}

/// Side-by-side comparison of two runs over the same field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub field: AllocationField,
    pub a: RunSummary,
    pub b: RunSummary,
    pub change_count: MetricDiff,
    pub mean_usage_milli: MetricDiff,
    pub mean_request_utilization_pct: MetricDiff,
    pub mean_limit_utilization_pct: MetricDiff,
    pub mean_overhead_pct: MetricDiff,
    pub final_allocation_milli: MetricDiff,
}

pub fn compare(a: &Run, b: &Run, field: AllocationField) -> Comparison {
    let sa = summarize_run(a, field);
    let sb = summarize_run(b, field);
    Comparison {
        field,
        change_count: MetricDiff::new(sa.changes.count as f64, sb.changes.count as f64),
        mean_usage_milli: MetricDiff::new(sa.stats.usage_milli.mean, sb.stats.usage_milli.mean),
        mean_request_utilization_pct: MetricDiff::new(
            sa.stats.request_utilization_pct.mean,
            sb.stats.request_utilization_pct.mean,
        ),
        mean_limit_utilization_pct: MetricDiff::new(
            sa.stats.limit_utilization_pct.mean,
            sb.stats.limit_utilization_pct.mean,
        ),
        mean_overhead_pct: MetricDiff::new(sa.stats.overhead_pct.mean, sb.stats.overhead_pct.mean),
        final_allocation_milli: MetricDiff::new(sa.final_milli as f64, sb.final_milli as f64),
        a: sa,
        b: sb,
    }
}
