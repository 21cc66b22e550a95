//! Pure analysis over loaded runs: temporal alignment, allocation change
//! detection, and efficiency metrics. Nothing in this module touches the
//! cluster or the filesystem.

pub mod align;
pub mod change;
pub mod efficiency;

pub use align::{align, Alignment, NearestSample, NEAREST_WINDOW};
pub use change::{
    detect_changes, summarize_changes, AllocationField, ChangeEvent, ChangeSummary,
};
pub use efficiency::{
    compare, run_stats, sample_efficiency, summarize_run, Aggregate, Comparison, MetricDiff,
    RunStats, RunSummary, SampleEfficiency,
};
