//! Timed telemetry collection sessions
//!
//! A [`Tracker`] provisions its fixture, samples at a fixed interval,
//! and persists the run. Persistence happens before teardown and before
//! any error propagates, so a session that dies mid-loop still leaves
//! its partial samples on disk.

mod fixture;
mod probe;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

use crate::error::HarnessError;
use crate::kubectl::{ControlPlane, DEFAULT_TIMEOUT};
use crate::models::{Run, RunKind, RunParams, Sample};

/// Which controller variant a session observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerKind {
    Idle,
    Vpa,
}

impl TrackerKind {
    pub fn run_kind(&self) -> RunKind {
        match self {
            TrackerKind::Idle => RunKind::IdleTrack,
            TrackerKind::Vpa => RunKind::VpaTrack,
        }
    }

    fn output_prefix(&self) -> &'static str {
        match self {
            TrackerKind::Idle => "idle_metrics",
            TrackerKind::Vpa => "vpa_metrics",
        }
    }
}

/// Session parameters. `new` supplies the defaults each kind was
/// designed around; callers override what they need.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub kind: TrackerKind,
    pub namespace: String,
    pub name: String,
    pub duration_secs: u64,
    pub interval_secs: u64,
    pub request: String,
    pub limit: String,
    pub update_mode: String,
    pub cleanup: bool,
    pub output: Option<PathBuf>,
    pub kubectl_timeout: Duration,
}

impl TrackerConfig {
    pub fn new(kind: TrackerKind) -> Self {
        let (namespace, name) = match kind {
            TrackerKind::Idle => ("mbcas-test", "idle-overprovisioned"),
            TrackerKind::Vpa => ("vpa-test", "idle-vpa"),
        };
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            duration_secs: 300,
            interval_secs: 5,
            request: "500m".to_string(),
            limit: "1000m".to_string(),
            update_mode: "InPlaceOrRecreate".to_string(),
            cleanup: true,
            output: None,
            kubectl_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How a session's sample loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The configured duration elapsed.
    Completed,
    /// A shutdown signal arrived mid-run.
    Interrupted,
}

/// What a finished session left behind.
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub output_path: PathBuf,
    pub sample_count: usize,
}

/// One collection session against a control plane.
pub struct Tracker<'a> {
    cp: &'a dyn ControlPlane,
    config: TrackerConfig,
    sample_tx: Option<mpsc::UnboundedSender<Sample>>,
}

impl<'a> Tracker<'a> {
    pub fn new(cp: &'a dyn ControlPlane, config: TrackerConfig) -> Self {
        Self {
            cp,
            config,
            sample_tx: None,
        }
    }

    /// Stream each collected sample to a channel as it is taken. The
    /// sender drops when the session ends, closing the stream.
    pub fn with_sample_stream(mut self, tx: mpsc::UnboundedSender<Sample>) -> Self {
        self.sample_tx = Some(tx);
        self
    }

    /// Provision, sample until done or interrupted, persist, tear down.
    /// Consumes the tracker so the sample stream closes on return.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SessionReport, HarnessError> {
        let cfg = &self.config;
        let timeout = cfg.kubectl_timeout;

        fixture::check_cluster(self.cp, timeout).await?;

        let (pod, vpa_name) = match cfg.kind {
            TrackerKind::Idle => {
                fixture::wait_for_metrics_server(self.cp, timeout).await?;
                fixture::create_namespace(self.cp, &cfg.namespace, true, timeout).await?;
                fixture::create_idle_pod(
                    self.cp,
                    &cfg.namespace,
                    &cfg.name,
                    &cfg.request,
                    &cfg.limit,
                    timeout,
                )
                .await?;
                (cfg.name.clone(), None)
            }
            TrackerKind::Vpa => {
                fixture::check_vpa_crd(self.cp, timeout).await?;
                fixture::wait_for_metrics_server(self.cp, timeout).await?;
                fixture::create_namespace(self.cp, &cfg.namespace, false, timeout).await?;
                let pod = fixture::create_vpa_deployment(
                    self.cp,
                    &cfg.namespace,
                    &cfg.name,
                    &cfg.request,
                    &cfg.limit,
                    timeout,
                )
                .await?;
                let vpa = fixture::create_vpa_object(
                    self.cp,
                    &cfg.namespace,
                    &cfg.name,
                    &cfg.update_mode,
                    timeout,
                )
                .await?;
                fixture::wait_for_vpa_recommendation(self.cp, &cfg.namespace, &vpa, timeout)
                    .await?;
                (pod, Some(vpa))
            }
        };

        let started = Utc::now().naive_utc();
        let run_id = format!(
            "{}_{}",
            cfg.kind.output_prefix(),
            started.format("%Y%m%d_%H%M%S")
        );
        let output_path = cfg
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{run_id}.json")));

        let mut run = Run {
            run_id,
            kind: cfg.kind.run_kind(),
            started,
            ended: None,
            namespace: cfg.namespace.clone(),
            target: cfg.name.clone(),
            params: match cfg.kind {
                TrackerKind::Idle => RunParams::Idle {
                    duration_secs: cfg.duration_secs,
                    interval_secs: cfg.interval_secs,
                    request: cfg.request.clone(),
                    limit: cfg.limit.clone(),
                },
                TrackerKind::Vpa => RunParams::Vpa {
                    duration_secs: cfg.duration_secs,
                    interval_secs: cfg.interval_secs,
                    update_mode: cfg.update_mode.clone(),
                },
            },
            samples: Vec::new(),
            events: Vec::new(),
        };

        info!(
            kind = %run.kind,
            duration = cfg.duration_secs,
            interval = cfg.interval_secs,
            "sampling started"
        );
        let loop_result = self
            .sample_loop(&mut run, &pod, vpa_name.as_deref(), &mut shutdown)
            .await;
        run.ended = Some(Utc::now().naive_utc());

        // Samples already taken are persisted no matter how the loop
        // ended and before any fixture is removed.
        let persist_result = persist(&run, &output_path);
        if let Err(err) = &loop_result {
            error!(%err, "sampling aborted, partial run persisted");
        }

        if cfg.cleanup {
            match cfg.kind {
                TrackerKind::Idle => {
                    fixture::teardown_idle(self.cp, &cfg.namespace, &pod, timeout).await;
                }
                TrackerKind::Vpa => {
                    fixture::teardown_vpa(
                        self.cp,
                        &cfg.namespace,
                        &cfg.name,
                        vpa_name.as_deref().unwrap_or_default(),
                        timeout,
                    )
                    .await;
                }
            }
        }

        let outcome = loop_result?;
        persist_result?;
        info!(path = %output_path.display(), samples = run.samples.len(), "run persisted");

        Ok(SessionReport {
            outcome,
            output_path,
            sample_count: run.samples.len(),
        })
    }

    async fn sample_loop(
        &self,
        run: &mut Run,
        pod: &str,
        vpa: Option<&str>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<SessionOutcome, HarnessError> {
        let interval = self.config.interval_secs;
        if interval == 0 {
            return Ok(SessionOutcome::Completed);
        }
        let iterations = self.config.duration_secs / interval;

        for i in 0..iterations {
            let elapsed = ((i + 1) * interval) as i64;
            let sample = match self.config.kind {
                TrackerKind::Idle => {
                    probe::idle_sample(
                        self.cp,
                        &self.config.namespace,
                        pod,
                        elapsed,
                        self.config.kubectl_timeout,
                    )
                    .await?
                }
                TrackerKind::Vpa => {
                    probe::vpa_sample(
                        self.cp,
                        &self.config.namespace,
                        pod,
                        vpa.unwrap_or_default(),
                        elapsed,
                        self.config.kubectl_timeout,
                    )
                    .await?
                }
            };

            info!(
                elapsed,
                usage = %sample.usage.raw,
                request = %sample.request.raw,
                limit = %sample.limit.raw,
                "sample"
            );
            if let Some(tx) = &self.sample_tx {
                // A closed receiver just means nobody is watching live.
                let _ = tx.send(sample.clone());
            }
            run.samples.push(sample);

            // Suspend until the next tick, skipped after the final one.
            // The suspension is the cooperative interruption point.
            if i + 1 < iterations {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!(samples = run.samples.len(), "interrupted");
                        return Ok(SessionOutcome::Interrupted);
                    }
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                }
            }
        }

        Ok(SessionOutcome::Completed)
    }
}

/// Write a run to disk as pretty-printed JSON.
pub fn persist(run: &Run, path: &Path) -> Result<(), HarnessError> {
    let doc = run.to_document();
    let text = serde_json::to_string_pretty(&doc).map_err(|e| HarnessError::RunWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e),
    })?;
    fs::write(path, text).map_err(|source| HarnessError::RunWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubectl::CommandOutput;
    use crate::loader::load_run;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted control plane. Answers every query a session makes and
    /// can be told to fail the nth usage probe.
    struct MockControlPlane {
        top_pod_calls: AtomicUsize,
        fail_top_pod_on: Option<usize>,
    }

    impl MockControlPlane {
        fn new() -> Self {
            Self {
                top_pod_calls: AtomicUsize::new(0),
                fail_top_pod_on: None,
            }
        }

        fn failing_on_probe(n: usize) -> Self {
            Self {
                top_pod_calls: AtomicUsize::new(0),
                fail_top_pod_on: Some(n),
            }
        }

        fn ok(stdout: &str) -> CommandOutput {
            CommandOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }
        }
    }

    #[async_trait]
    impl ControlPlane for MockControlPlane {
        async fn invoke(
            &self,
            args: &[&str],
            _input: Option<&str>,
            timeout: Duration,
        ) -> Result<CommandOutput, HarnessError> {
            let joined = args.join(" ");

            if joined.starts_with("top pod") {
                let n = self.top_pod_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.fail_top_pod_on == Some(n) {
                    return Err(HarnessError::ProcessTimeout {
                        args: joined,
                        timeout_secs: timeout.as_secs(),
                    });
                }
                return Ok(Self::ok("idle-overprovisioned 3m 10Mi"));
            }

            if joined.contains("jsonpath") {
                let answer = if joined.contains("resources.requests.cpu") {
                    "500m"
                } else if joined.contains("resources.limits.cpu") {
                    "1"
                } else if joined.contains("desiredCPURequest") {
                    "300m"
                } else if joined.contains("desiredCPULimit") {
                    "250m"
                } else if joined.contains(".status.phase") {
                    "Active"
                } else if joined.contains("shadowPriceCPU") {
                    "0.12"
                } else if joined.contains(".items[0].metadata.name") {
                    "idle-vpa-7c9d4"
                } else if joined.contains("target.cpu") {
                    "120m"
                } else if joined.contains("lowerBound.cpu") {
                    "80m"
                } else if joined.contains("upperBound.cpu") {
                    "200m"
                } else if joined.contains("updateMode") {
                    "InPlaceOrRecreate"
                } else if joined.contains(".status.recommendation") {
                    r#"{"containerRecommendations":[{}]}"#
                } else {
                    ""
                };
                return Ok(Self::ok(answer));
            }

            if joined.starts_with("create namespace") {
                return Ok(Self::ok("apiVersion: v1\nkind: Namespace"));
            }

            // get nodes, top nodes, get crd, apply, label, wait, delete,
            // existence probes: all succeed.
            Ok(Self::ok(""))
        }
    }

    fn quick_config(kind: TrackerKind, dir: &tempfile::TempDir) -> TrackerConfig {
        let mut config = TrackerConfig::new(kind);
        config.duration_secs = 2;
        config.interval_secs = 1;
        config.output = Some(dir.path().join("run.json"));
        config
    }

    #[tokio::test]
    async fn idle_session_completes_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cp = MockControlPlane::new();
        let config = quick_config(TrackerKind::Idle, &dir);
        let path = config.output.clone().unwrap();

        let (_tx, rx) = broadcast::channel(1);
        let report = Tracker::new(&cp, config).run(rx).await.unwrap();
        assert_eq!(report.outcome, SessionOutcome::Completed);
        assert_eq!(report.sample_count, 2);

        let run = load_run(&path).unwrap();
        assert_eq!(run.kind, RunKind::IdleTrack);
        assert!(run.ended.is_some());
        let elapsed: Vec<i64> = run.samples.iter().map(|s| s.elapsed).collect();
        assert_eq!(elapsed, vec![1, 2]);
        let s = &run.samples[0];
        assert_eq!(s.usage.milli, 3);
        assert_eq!(s.request.milli, 500);
        assert_eq!(s.limit.milli, 1000);
        assert_eq!(s.alloc.limit.milli, 250);
        assert_eq!(s.alloc.phase, "Active");
    }

    #[tokio::test]
    async fn vpa_session_records_recommendations() {
        let dir = tempfile::tempdir().unwrap();
        let cp = MockControlPlane::new();
        let mut config = quick_config(TrackerKind::Vpa, &dir);
        config.duration_secs = 1;
        let path = config.output.clone().unwrap();

        let (_tx, rx) = broadcast::channel(1);
        let report = Tracker::new(&cp, config).run(rx).await.unwrap();
        assert_eq!(report.outcome, SessionOutcome::Completed);

        let run = load_run(&path).unwrap();
        assert_eq!(run.kind, RunKind::VpaTrack);
        assert_eq!(run.samples.len(), 1);
        assert_eq!(run.samples[0].autoscaler.target.milli, 120);
        assert_eq!(run.samples[0].autoscaler.mode, "InPlaceOrRecreate");
    }

    #[tokio::test]
    async fn interrupt_persists_partial_run() {
        let dir = tempfile::tempdir().unwrap();
        let cp = MockControlPlane::new();
        let mut config = quick_config(TrackerKind::Idle, &dir);
        config.duration_secs = 60;
        let path = config.output.clone().unwrap();

        let (tx, rx) = broadcast::channel(1);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            let _ = tx.send(());
        });

        let report = Tracker::new(&cp, config).run(rx).await.unwrap();
        assert_eq!(report.outcome, SessionOutcome::Interrupted);
        assert_eq!(report.sample_count, 2);

        let run = load_run(&path).unwrap();
        assert_eq!(run.samples.len(), 2);
        assert!(run.ended.is_some());
    }

    #[tokio::test]
    async fn fatal_probe_error_still_persists_taken_samples() {
        let dir = tempfile::tempdir().unwrap();
        let cp = MockControlPlane::failing_on_probe(2);
        let mut config = quick_config(TrackerKind::Idle, &dir);
        config.duration_secs = 3;
        let path = config.output.clone().unwrap();

        let (_tx, rx) = broadcast::channel(1);
        let err = Tracker::new(&cp, config).run(rx).await.unwrap_err();
        assert!(matches!(err, HarnessError::ProcessTimeout { .. }));

        let run = load_run(&path).unwrap();
        assert_eq!(run.samples.len(), 1);
        assert!(run.ended.is_some());
    }

    #[tokio::test]
    async fn sample_stream_sees_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let cp = MockControlPlane::new();
        let config = quick_config(TrackerKind::Idle, &dir);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let report = Tracker::new(&cp, config)
            .with_sample_stream(tx)
            .run(shutdown_rx)
            .await
            .unwrap();
        assert_eq!(report.sample_count, 2);

        let mut streamed = 0;
        while rx.recv().await.is_some() {
            streamed += 1;
        }
        assert_eq!(streamed, 2);
    }
}
