//! Core data models for the measurement harness

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::parse::{parse_quantity, UNAVAILABLE};

/// One telemetry field: the raw string as reported plus its parsed milli
/// value. The parsed value is always present, defaulting to 0 when the
/// raw string is the "N/A" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub raw: String,
    pub milli: i64,
}

impl Reading {
    /// Build a reading from a raw quantity string.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let milli = parse_quantity(&raw);
        Reading { raw, milli }
    }

    /// Build a reading from an already-parsed milli value.
    pub fn from_milli(milli: i64) -> Self {
        Reading {
            raw: format!("{milli}m"),
            milli,
        }
    }

    pub fn unavailable() -> Self {
        Reading {
            raw: UNAVAILABLE.to_string(),
            milli: 0,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Status read from the adaptive allocator's podallocation object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorStatus {
    pub request: Reading,
    pub limit: Reading,
    pub phase: String,
    pub shadow_price: String,
}

impl Default for AllocatorStatus {
    fn default() -> Self {
        Self {
            request: Reading::unavailable(),
            limit: Reading::unavailable(),
            phase: UNAVAILABLE.to_string(),
            shadow_price: UNAVAILABLE.to_string(),
        }
    }
}

/// Recommendation state read from the vertical autoscaler object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalerStatus {
    pub target: Reading,
    pub lower: Reading,
    pub upper: Reading,
    pub mode: String,
}

impl Default for AutoscalerStatus {
    fn default() -> Self {
        Self {
            target: Reading::unavailable(),
            lower: Reading::unavailable(),
            upper: Reading::unavailable(),
            mode: UNAVAILABLE.to_string(),
        }
    }
}

/// One pod observation inside a monitor-run sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub cpu_usage: Reading,
    pub desired: String,
    pub phase: String,
}

/// One observation tick within a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Option<NaiveDateTime>,
    /// Seconds since the run started. Monotonically non-decreasing
    /// across a run's sample sequence.
    pub elapsed: i64,
    pub request: Reading,
    pub limit: Reading,
    pub usage: Reading,
    pub alloc: AllocatorStatus,
    pub autoscaler: AutoscalerStatus,
    pub pods: Vec<PodSnapshot>,
}

/// Point-in-time marker inside a load run. Display only, never part of
/// numeric aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_type: String,
    pub timestamp: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunKind {
    LoadRun,
    MonitorRun,
    IdleTrack,
    VpaTrack,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::LoadRun => "load-run",
            RunKind::MonitorRun => "monitor-run",
            RunKind::IdleTrack => "idle-track",
            RunKind::VpaTrack => "vpa-track",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific collection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunParams {
    Load {
        duration_secs: u64,
        intensity: u32,
        background: bool,
    },
    Monitor {
        interval_secs: u64,
    },
    Idle {
        duration_secs: u64,
        interval_secs: u64,
        request: String,
        limit: String,
    },
    Vpa {
        duration_secs: u64,
        interval_secs: u64,
        update_mode: String,
    },
}

impl RunParams {
    pub fn interval_secs(&self) -> Option<u64> {
        match self {
            RunParams::Monitor { interval_secs }
            | RunParams::Idle { interval_secs, .. }
            | RunParams::Vpa { interval_secs, .. } => Some(*interval_secs),
            RunParams::Load { .. } => None,
        }
    }
}

/// One complete timed observation session: metadata plus an ordered
/// sample sequence. Written once by the sampler; analysis only ever sees
/// read-only copies produced by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub kind: RunKind,
    pub started: NaiveDateTime,
    pub ended: Option<NaiveDateTime>,
    pub namespace: String,
    /// Pod, deployment, or service name depending on kind.
    pub target: String,
    pub params: RunParams,
    pub samples: Vec<Sample>,
    pub events: Vec<RunEvent>,
}

impl Run {
    /// Flat persisted layout. Field names vary by kind; the variation is
    /// an external contract kept for compatibility with files written by
    /// earlier tracker generations, and the loader's synonym tables undo
    /// it on the way back in.
    pub fn to_document(&self) -> Value {
        let started = fmt_timestamp(self.started);
        let ended = self.ended.map(fmt_timestamp);

        match &self.params {
            RunParams::Idle {
                duration_secs,
                interval_secs,
                request,
                limit,
            } => json!({
                "kind": self.kind.as_str(),
                "runId": self.run_id,
                "start": started,
                "end": ended,
                "namespace": self.namespace,
                "pod": self.target,
                "duration_seconds": duration_secs,
                "interval_seconds": interval_secs,
                "initial_request": request,
                "initial_limit": limit,
                "samples": self.samples.iter().map(idle_sample_doc).collect::<Vec<_>>(),
            }),
            RunParams::Vpa {
                duration_secs,
                interval_secs,
                update_mode,
            } => json!({
                "kind": self.kind.as_str(),
                "runId": self.run_id,
                "start": started,
                "end": ended,
                "namespace": self.namespace,
                "name": self.target,
                "duration_seconds": duration_secs,
                "interval_seconds": interval_secs,
                "update_mode": update_mode,
                "samples": self.samples.iter().map(vpa_sample_doc).collect::<Vec<_>>(),
            }),
            RunParams::Load {
                duration_secs,
                intensity,
                background,
            } => json!({
                "kind": self.kind.as_str(),
                "runId": self.run_id,
                "started": started,
                "namespace": self.namespace,
                "service": self.target,
                "durationSeconds": duration_secs,
                "intensity": intensity,
                "background": background,
                "events": self.events.iter().map(|e| json!({
                    "type": e.event_type,
                    "timestamp": e.timestamp,
                    "data": e.data,
                })).collect::<Vec<_>>(),
            }),
            RunParams::Monitor { interval_secs } => json!({
                "kind": self.kind.as_str(),
                "runId": self.run_id,
                "started": started,
                "namespace": self.namespace,
                "service": self.target,
                "intervalSeconds": interval_secs,
                "samples": self.samples.iter()
                    .map(|s| monitor_sample_doc(s, *interval_secs))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

fn fmt_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn idle_sample_doc(s: &Sample) -> Value {
    json!({
        "timestamp": s.timestamp.map(fmt_timestamp),
        "elapsed": s.elapsed,
        "request": s.request.raw,
        "limit": s.limit.raw,
        "usage": s.usage.raw,
        "request_m": s.request.milli,
        "limit_m": s.limit.milli,
        "usage_m": s.usage.milli,
        "pa_request": s.alloc.request.raw,
        "pa_limit": s.alloc.limit.raw,
        "pa_status": s.alloc.phase,
        "shadow_price": s.alloc.shadow_price,
    })
}

fn vpa_sample_doc(s: &Sample) -> Value {
    json!({
        "timestamp": s.timestamp.map(fmt_timestamp),
        "elapsed_seconds": s.elapsed,
        "request": s.request.raw,
        "limit": s.limit.raw,
        "usage": s.usage.raw,
        "request_milli": s.request.milli,
        "limit_milli": s.limit.milli,
        "usage_milli": s.usage.milli,
        "vpa_target": s.autoscaler.target.raw,
        "vpa_lower": s.autoscaler.lower.raw,
        "vpa_upper": s.autoscaler.upper.raw,
        "vpa_target_milli": s.autoscaler.target.milli,
        "mode": s.autoscaler.mode,
    })
}

fn monitor_sample_doc(s: &Sample, interval_secs: u64) -> Value {
    let iteration = if interval_secs > 0 {
        s.elapsed / interval_secs as i64
    } else {
        s.elapsed
    };
    json!({
        "iteration": iteration,
        "timestamp": s.timestamp.map(fmt_timestamp),
        "pods": s.pods.iter().map(|p| json!({
            "namespace": p.namespace,
            "name": p.name,
            "cpuUsage": p.cpu_usage.raw,
            "desired": p.desired,
            "phase": p.phase,
        })).collect::<Vec<_>>(),
    })
}
