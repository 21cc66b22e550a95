//! Tracking session command

use anyhow::Result;
use colored::Colorize;
use harness_lib::kubectl::Kubectl;
use harness_lib::models::Sample;
use harness_lib::sampler::{SessionOutcome, Tracker, TrackerConfig, TrackerKind};
use tokio::sync::{broadcast, mpsc};

use crate::output::{color_phase, print_info, print_success, print_warning};
use crate::TrackArgs;

/// Provision the fixture, sample until done or Ctrl-C, report the
/// artifact. Samples stream to the terminal as they are taken.
pub async fn run(kind: TrackerKind, args: TrackArgs) -> Result<()> {
    let mut config = TrackerConfig::new(kind);
    if let Some(namespace) = args.namespace {
        config.namespace = namespace;
    }
    if let Some(name) = args.name {
        config.name = name;
    }
    config.duration_secs = args.duration;
    config.interval_secs = args.interval;
    config.request = args.request;
    config.limit = args.limit;
    config.update_mode = args.mode;
    config.cleanup = !args.no_cleanup;
    config.output = args.output;

    let title = match kind {
        TrackerKind::Idle => "Tracking idle pod under the adaptive allocator",
        TrackerKind::Vpa => "Tracking idle deployment under the vertical pod autoscaler",
    };
    println!("{}", title.bold());
    print_info(&format!(
        "namespace {}, workload {}, {}s at {}s intervals",
        config.namespace, config.name, config.duration_secs, config.interval_secs
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<Sample>();
    let printer = tokio::spawn(async move {
        print_row_header(kind);
        while let Some(sample) = sample_rx.recv().await {
            print_row(kind, &sample);
        }
    });

    let kubectl = Kubectl::new();
    let report = Tracker::new(&kubectl, config)
        .with_sample_stream(sample_tx)
        .run(shutdown_rx)
        .await?;
    // Tracker::run consumed the sender, so the printer drains and exits.
    let _ = printer.await;

    let summary = format!(
        "{} samples written to {}",
        report.sample_count,
        report.output_path.display()
    );
    match report.outcome {
        SessionOutcome::Completed => print_success(&format!("session complete, {summary}")),
        SessionOutcome::Interrupted => print_warning(&format!("session interrupted, {summary}")),
    }
    Ok(())
}

fn print_row_header(kind: TrackerKind) {
    match kind {
        TrackerKind::Idle => {
            println!(
                "{:>8}  {:>8}  {:>8}  {:>8}  {:>10}  {}",
                "elapsed", "usage", "request", "limit", "desired", "phase"
            );
        }
        TrackerKind::Vpa => {
            println!(
                "{:>8}  {:>8}  {:>8}  {:>8}  {:>10}  {}",
                "elapsed", "usage", "request", "limit", "target", "mode"
            );
        }
    }
}

fn print_row(kind: TrackerKind, sample: &Sample) {
    match kind {
        TrackerKind::Idle => {
            println!(
                "{:>7}s  {:>8}  {:>8}  {:>8}  {:>10}  {}",
                sample.elapsed,
                sample.usage.raw,
                sample.request.raw,
                sample.limit.raw,
                sample.alloc.limit.raw,
                color_phase(&sample.alloc.phase)
            );
        }
        TrackerKind::Vpa => {
            println!(
                "{:>7}s  {:>8}  {:>8}  {:>8}  {:>10}  {}",
                sample.elapsed,
                sample.usage.raw,
                sample.request.raw,
                sample.limit.raw,
                sample.autoscaler.target.raw,
                sample.autoscaler.mode
            );
        }
    }
}
