//! Artifact directory inspection command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::warn;

use harness_lib::analysis::{align, summarize_run, AllocationField};
use harness_lib::loader::load_run;
use harness_lib::models::{Run, RunKind};

use crate::output::{format_cpu, format_pct, print_info, section};

/// Load every run file in the directory and print a per-kind summary,
/// then align each load run with its closest monitor run. Files that
/// fail to load are skipped with a warning so one corrupt artifact does
/// not hide the rest.
pub fn run(dir: &Path) -> Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut runs = Vec::new();
    for path in &paths {
        match load_run(path) {
            Ok(run) => runs.push(run),
            Err(err) => warn!(path = %path.display(), %err, "skipping unreadable artifact"),
        }
    }

    if runs.is_empty() {
        print_info(&format!("no readable run files in {}", dir.display()));
        return Ok(());
    }
    print_info(&format!(
        "{} runs loaded from {}",
        runs.len(),
        dir.display()
    ));

    let load_runs: Vec<&Run> = runs.iter().filter(|r| r.kind == RunKind::LoadRun).collect();
    let monitor_runs: Vec<&Run> = runs
        .iter()
        .filter(|r| r.kind == RunKind::MonitorRun)
        .collect();
    let tracker_runs: Vec<&Run> = runs
        .iter()
        .filter(|r| matches!(r.kind, RunKind::IdleTrack | RunKind::VpaTrack))
        .collect();

    if !load_runs.is_empty() {
        section("Load runs");
        for run in &load_runs {
            println!(
                "{}  started {}  target {}",
                run.run_id.cyan(),
                run.started,
                run.target
            );
            for event in &run.events {
                println!("    {:<16} {}", event.event_type, event.timestamp);
            }
        }
    }

    if !monitor_runs.is_empty() {
        section("Monitor runs");
        for run in &monitor_runs {
            println!(
                "{}  started {}  {} samples",
                run.run_id.cyan(),
                run.started,
                run.samples.len()
            );
            if let (Some(first), Some(last)) = (run.samples.first(), run.samples.last()) {
                if let (Some(a), Some(b)) = (first.timestamp, last.timestamp) {
                    println!("    coverage {a} to {b}");
                }
            }
            if let Some(last) = run.samples.last() {
                let mut pods: Vec<_> = last.pods.iter().collect();
                pods.sort_by_key(|p| std::cmp::Reverse(p.cpu_usage.milli));
                for pod in pods.iter().take(5) {
                    println!(
                        "    {:<30} {:>8}  {}",
                        pod.name,
                        format_cpu(pod.cpu_usage.milli),
                        pod.phase
                    );
                }
            }
        }
    }

    if !tracker_runs.is_empty() {
        section("Tracker runs");
        for run in &tracker_runs {
            let summary = summarize_run(run, AllocationField::Limit);
            println!(
                "{}  [{}]  {} samples",
                run.run_id.cyan(),
                run.kind,
                summary.sample_count
            );
            println!(
                "    limit {} -> {} ({} reduction), {} changes, mean usage {}",
                format_cpu(summary.initial_milli),
                format_cpu(summary.final_milli),
                format_pct(summary.reduction_pct),
                summary.changes.count,
                format_cpu(summary.stats.usage_milli.mean as i64)
            );
        }
    }

    if !load_runs.is_empty() && !monitor_runs.is_empty() {
        section("Alignment");
        for lr in &load_runs {
            match align(lr, monitor_runs.iter().copied()) {
                Some(alignment) => {
                    println!(
                        "{} aligns with {} (started {})",
                        lr.run_id.cyan(),
                        alignment.counterpart_id.cyan(),
                        alignment.counterpart_started
                    );
                    for nearest in &alignment.nearest {
                        println!(
                            "    {:+}s at {} (elapsed {}s)",
                            nearest.delta_secs, nearest.timestamp, nearest.elapsed
                        );
                    }
                }
                None => {
                    println!("{} has no monitor run starting before it", lr.run_id);
                }
            }
        }
    }

    Ok(())
}
