//! Run comparison command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use harness_lib::analysis::{compare, AllocationField, Comparison, RunSummary};
use harness_lib::loader::load_run;

use crate::output::{format_cpu, format_pct, print_success, section};

/// Allocation series selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Request,
    Limit,
    Usage,
}

impl From<FieldArg> for AllocationField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Request => AllocationField::Request,
            FieldArg::Limit => AllocationField::Limit,
            FieldArg::Usage => AllocationField::Usage,
        }
    }
}

/// Row in the side-by-side metric table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Allocator")]
    a: String,
    #[tabled(rename = "Autoscaler")]
    b: String,
    #[tabled(rename = "Diff")]
    diff: String,
}

pub fn run(
    alloc_file: &Path,
    vpa_file: &Path,
    field: FieldArg,
    output: Option<PathBuf>,
    stats_only: bool,
) -> Result<()> {
    let a = load_run(alloc_file)?;
    let b = load_run(vpa_file)?;
    let comparison = compare(&a, &b, field.into());

    print_report(&comparison);

    if !stats_only {
        let path = output.unwrap_or_else(|| PathBuf::from("comparison.json"));
        let json = serde_json::to_string_pretty(&comparison)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        print_success(&format!("comparison written to {}", path.display()));
    }
    Ok(())
}

fn print_report(comparison: &Comparison) {
    section(&format!(
        "Comparison over the {} series",
        comparison.field.as_str()
    ));
    print_summary("Allocator run", &comparison.a);
    print_summary("Autoscaler run", &comparison.b);

    let rows = vec![
        MetricRow {
            metric: "Allocation changes".into(),
            a: format!("{}", comparison.a.changes.count),
            b: format!("{}", comparison.b.changes.count),
            diff: format!("{:+.0}", comparison.change_count.diff),
        },
        MetricRow {
            metric: "Mean usage".into(),
            a: format_cpu(comparison.a.stats.usage_milli.mean as i64),
            b: format_cpu(comparison.b.stats.usage_milli.mean as i64),
            diff: format!("{:+.0}m", comparison.mean_usage_milli.diff),
        },
        MetricRow {
            metric: "Mean request utilization".into(),
            a: format_pct(comparison.a.stats.request_utilization_pct.mean),
            b: format_pct(comparison.b.stats.request_utilization_pct.mean),
            diff: format!("{:+.1}pp", comparison.mean_request_utilization_pct.diff),
        },
        MetricRow {
            metric: "Mean limit utilization".into(),
            a: format_pct(comparison.a.stats.limit_utilization_pct.mean),
            b: format_pct(comparison.b.stats.limit_utilization_pct.mean),
            diff: format!("{:+.1}pp", comparison.mean_limit_utilization_pct.diff),
        },
        MetricRow {
            metric: "Mean overhead".into(),
            a: format_pct(comparison.a.stats.overhead_pct.mean),
            b: format_pct(comparison.b.stats.overhead_pct.mean),
            diff: format!("{:+.1}pp", comparison.mean_overhead_pct.diff),
        },
        MetricRow {
            metric: "Final allocation".into(),
            a: format_cpu(comparison.a.final_milli),
            b: format_cpu(comparison.b.final_milli),
            diff: format!("{:+.0}m", comparison.final_allocation_milli.diff),
        },
    ];
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn print_summary(label: &str, summary: &RunSummary) {
    println!();
    println!("{} ({})", label.bold(), summary.run_id.cyan());
    println!("  samples:              {}", summary.sample_count);
    println!(
        "  allocation:           {} -> {} ({} reduction)",
        format_cpu(summary.initial_milli),
        format_cpu(summary.final_milli),
        format_pct(summary.reduction_pct)
    );
    match summary.changes.first_change {
        Some(elapsed) => println!("  first change:         {elapsed}s"),
        None => println!("  first change:         never"),
    }
    if let Some(elapsed) = summary.first_recommendation {
        println!("  first recommendation: {elapsed}s");
    }
}
