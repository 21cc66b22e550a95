//! Run-record loading and normalization
//!
//! Persisted run files come in four kinds with drifting field names
//! (`elapsed` vs `elapsed_seconds` vs `time`, `limit_m` vs `limit_milli`
//! vs `lim_m`, ...). The drift is an external contract: files written by
//! earlier tracker generations must keep loading. Each kind carries one
//! synonym table feeding the canonical constructor instead of scattering
//! conditional lookups.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::HarnessError;
use crate::models::{
    AllocatorStatus, AutoscalerStatus, PodSnapshot, Reading, Run, RunEvent, RunKind, RunParams,
    Sample,
};
use crate::parse::{parse_quantity, parse_timestamp, UNAVAILABLE};

/// Synonym table for one tracker kind's per-sample fields.
struct FieldMap {
    elapsed: &'static [&'static str],
    request_raw: &'static [&'static str],
    request_milli: &'static [&'static str],
    limit_raw: &'static [&'static str],
    limit_milli: &'static [&'static str],
    usage_raw: &'static [&'static str],
    usage_milli: &'static [&'static str],
}

const IDLE_FIELDS: FieldMap = FieldMap {
    elapsed: &["elapsed"],
    request_raw: &["request"],
    request_milli: &["request_m"],
    limit_raw: &["limit"],
    limit_milli: &["limit_m"],
    usage_raw: &["usage"],
    usage_milli: &["usage_m"],
};

const VPA_FIELDS: FieldMap = FieldMap {
    elapsed: &["elapsed_seconds", "time", "elapsed"],
    request_raw: &["request", "req"],
    request_milli: &["request_milli", "req_m", "request_m"],
    limit_raw: &["limit", "lim"],
    limit_milli: &["limit_milli", "lim_m", "limit_m"],
    usage_raw: &["usage", "use"],
    usage_milli: &["usage_milli", "use_m", "usage_m"],
};

/// Load and normalize one run file.
pub fn load_run(path: &Path) -> Result<Run, HarnessError> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarnessError::RunFileNotFound {
            path: path.to_path_buf(),
        },
        _ => HarnessError::InvalidRunFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    let doc: Value = serde_json::from_str(&text).map_err(|e| HarnessError::InvalidRunFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    parse_run(&doc, path)
}

/// Normalize an already-deserialized run document.
pub fn parse_run(doc: &Value, path: &Path) -> Result<Run, HarnessError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| invalid(path, "top-level value is not an object"))?;

    let kind =
        detect_kind(obj).ok_or_else(|| invalid(path, "cannot determine run kind"))?;

    // The start time is essential; a malformed one is fatal.
    let started_raw = str_field(obj, &["started", "start"])
        .ok_or_else(|| invalid(path, "missing start timestamp"))?;
    let started = parse_timestamp(started_raw)?;
    let ended = str_field(obj, &["end", "ended"]).and_then(|s| parse_timestamp(s).ok());

    let run_id = str_field(obj, &["runId", "run_id"])
        .map(str::to_string)
        .unwrap_or_else(|| derive_run_id(path));
    let namespace = str_field(obj, &["namespace"]).unwrap_or("").to_string();
    let target = str_field(obj, &["service", "pod", "name", "deployment"])
        .unwrap_or("")
        .to_string();

    let params = parse_params(kind, obj);
    let (mut samples, events) = match kind {
        RunKind::LoadRun => (Vec::new(), parse_events(obj)),
        RunKind::MonitorRun => (parse_monitor_samples(obj, &params), Vec::new()),
        RunKind::IdleTrack => (parse_tracker_samples(obj, &IDLE_FIELDS, kind), Vec::new()),
        RunKind::VpaTrack => (parse_tracker_samples(obj, &VPA_FIELDS, kind), Vec::new()),
    };

    // Restore the ordering invariant; stable sort keeps equal-elapsed
    // samples in file order.
    samples.sort_by_key(|s| s.elapsed);

    Ok(Run {
        run_id,
        kind,
        started,
        ended,
        namespace,
        target,
        params,
        samples,
        events,
    })
}

fn invalid(path: &Path, reason: &str) -> HarnessError {
    HarnessError::InvalidRunFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn derive_run_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Determine the run kind: an explicit tag wins; legacy tracker files
/// carry none and are inferred from structure.
fn detect_kind(obj: &Map<String, Value>) -> Option<RunKind> {
    if let Some(tag) = obj.get("kind").and_then(Value::as_str) {
        return match tag {
            "load-run" => Some(RunKind::LoadRun),
            "monitor-run" => Some(RunKind::MonitorRun),
            "idle-track" => Some(RunKind::IdleTrack),
            "vpa-track" => Some(RunKind::VpaTrack),
            _ => None,
        };
    }

    if obj.contains_key("events") || obj.contains_key("intensity") {
        return Some(RunKind::LoadRun);
    }

    let samples = obj.get("samples").and_then(Value::as_array)?;
    if let Some(first) = samples.first().and_then(Value::as_object) {
        if first.contains_key("pods") {
            Some(RunKind::MonitorRun)
        } else if first.keys().any(|k| k.starts_with("vpa_")) {
            Some(RunKind::VpaTrack)
        } else {
            Some(RunKind::IdleTrack)
        }
    } else if obj.contains_key("pod") {
        // An interrupted legacy idle file can be sample-less.
        Some(RunKind::IdleTrack)
    } else {
        Some(RunKind::VpaTrack)
    }
}

fn parse_params(kind: RunKind, obj: &Map<String, Value>) -> RunParams {
    let duration = int_field(obj, &["duration_seconds", "durationSeconds", "duration"])
        .unwrap_or(0)
        .max(0) as u64;
    let interval = int_field(obj, &["interval_seconds", "intervalSeconds", "interval"])
        .unwrap_or(0)
        .max(0) as u64;

    match kind {
        RunKind::LoadRun => RunParams::Load {
            duration_secs: duration,
            intensity: int_field(obj, &["intensity"]).unwrap_or(0).max(0) as u32,
            background: obj
                .get("background")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        RunKind::MonitorRun => RunParams::Monitor {
            interval_secs: interval,
        },
        RunKind::IdleTrack => RunParams::Idle {
            duration_secs: duration,
            interval_secs: interval,
            request: str_field(obj, &["initial_request"]).unwrap_or("").to_string(),
            limit: str_field(obj, &["initial_limit"]).unwrap_or("").to_string(),
        },
        RunKind::VpaTrack => RunParams::Vpa {
            duration_secs: duration,
            interval_secs: interval,
            update_mode: str_field(obj, &["update_mode", "mode"]).unwrap_or("").to_string(),
        },
    }
}

fn parse_tracker_samples(obj: &Map<String, Value>, map: &FieldMap, kind: RunKind) -> Vec<Sample> {
    let Some(raw_samples) = obj.get("samples").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(raw_samples.len());
    for entry in raw_samples {
        let Some(s) = entry.as_object() else { continue };

        // A per-sample timestamp is auxiliary: malformed means the
        // record is dropped and the series continues.
        let timestamp = match str_field(s, &["timestamp"]) {
            Some(raw) => match parse_timestamp(raw) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(timestamp = raw, "skipping sample with malformed timestamp");
                    continue;
                }
            },
            None => None,
        };

        let mut sample = Sample {
            timestamp,
            elapsed: int_field(s, map.elapsed).unwrap_or(0),
            request: reading(s, map.request_raw, map.request_milli),
            limit: reading(s, map.limit_raw, map.limit_milli),
            usage: reading(s, map.usage_raw, map.usage_milli),
            ..Sample::default()
        };

        match kind {
            RunKind::IdleTrack => {
                sample.alloc = AllocatorStatus {
                    request: reading(s, &["pa_request"], &[]),
                    limit: reading(s, &["pa_limit"], &[]),
                    phase: str_field(s, &["pa_status"]).unwrap_or(UNAVAILABLE).to_string(),
                    shadow_price: str_field(s, &["shadow_price"])
                        .unwrap_or(UNAVAILABLE)
                        .to_string(),
                };
            }
            RunKind::VpaTrack => {
                sample.autoscaler = AutoscalerStatus {
                    target: reading(s, &["vpa_target"], &["vpa_target_milli"]),
                    lower: reading(s, &["vpa_lower"], &["vpa_lower_milli"]),
                    upper: reading(s, &["vpa_upper"], &["vpa_upper_milli"]),
                    mode: str_field(s, &["mode", "vpa_mode"])
                        .unwrap_or(UNAVAILABLE)
                        .to_string(),
                };
            }
            _ => {}
        }

        out.push(sample);
    }
    out
}

fn parse_monitor_samples(obj: &Map<String, Value>, params: &RunParams) -> Vec<Sample> {
    let interval = params.interval_secs().unwrap_or(0) as i64;
    let Some(raw_samples) = obj.get("samples").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(raw_samples.len());
    for entry in raw_samples {
        let Some(s) = entry.as_object() else { continue };

        let timestamp = match str_field(s, &["timestamp"]) {
            Some(raw) => match parse_timestamp(raw) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(timestamp = raw, "skipping sample with malformed timestamp");
                    continue;
                }
            },
            None => None,
        };

        let iteration = int_field(s, &["iteration"]).unwrap_or(0);
        let pods = s
            .get("pods")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_object)
                    .map(|p| PodSnapshot {
                        namespace: str_field(p, &["namespace"]).unwrap_or("").to_string(),
                        name: str_field(p, &["name"]).unwrap_or("").to_string(),
                        cpu_usage: reading(p, &["cpuUsage", "cpu_usage"], &[]),
                        desired: str_field(p, &["desired"]).unwrap_or(UNAVAILABLE).to_string(),
                        phase: str_field(p, &["phase"]).unwrap_or(UNAVAILABLE).to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        out.push(Sample {
            timestamp,
            elapsed: if interval > 0 { iteration * interval } else { iteration },
            pods,
            ..Sample::default()
        });
    }
    out
}

fn parse_events(obj: &Map<String, Value>) -> Vec<RunEvent> {
    obj.get("events")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_object)
                .map(|e| RunEvent {
                    event_type: str_field(e, &["type", "event_type"]).unwrap_or("").to_string(),
                    timestamp: str_field(e, &["timestamp"]).unwrap_or("").to_string(),
                    data: e.get("data").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
}

fn int_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_i64))
}

/// Build a reading, preferring an explicit milli field and falling back
/// to parsing the raw string.
fn reading(obj: &Map<String, Value>, raw_keys: &[&str], milli_keys: &[&str]) -> Reading {
    let raw = str_field(obj, raw_keys).unwrap_or(UNAVAILABLE).to_string();
    let milli = int_field(obj, milli_keys)
        .unwrap_or_else(|| parse_quantity(&raw))
        .max(0);
    Reading { raw, milli }
}
