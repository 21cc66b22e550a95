//! Per-tick telemetry probes
//!
//! Each probe maps an unavailable or failed query to the "N/A" sentinel
//! rather than an error: a pod mid-restart or a metrics pipeline still
//! warming up produces a degraded sample, not an aborted run. Only
//! transport failures (timeout, spawn) propagate.

use std::time::Duration;

use chrono::Utc;

use crate::error::HarnessError;
use crate::kubectl::ControlPlane;
use crate::models::{AllocatorStatus, AutoscalerStatus, Reading, Sample};
use crate::parse::UNAVAILABLE;

/// Query one jsonpath expression off a resource, mapping any non-zero
/// exit or empty output to the sentinel.
async fn jsonpath(
    cp: &dyn ControlPlane,
    resource: &str,
    name: &str,
    namespace: &str,
    path: &str,
    timeout: Duration,
) -> Result<String, HarnessError> {
    let selector = format!("jsonpath={{{path}}}");
    let out = cp
        .invoke(
            &["get", resource, name, "-n", namespace, "-o", &selector],
            None,
            timeout,
        )
        .await?;
    if out.success() {
        Ok(out.text().unwrap_or(UNAVAILABLE).to_string())
    } else {
        Ok(UNAVAILABLE.to_string())
    }
}

/// Read the pod's declared CPU request and limit.
async fn pod_cpu(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    timeout: Duration,
) -> Result<(Reading, Reading), HarnessError> {
    let request = jsonpath(
        cp,
        "pod",
        pod,
        namespace,
        ".spec.containers[0].resources.requests.cpu",
        timeout,
    )
    .await?;
    let limit = jsonpath(
        cp,
        "pod",
        pod,
        namespace,
        ".spec.containers[0].resources.limits.cpu",
        timeout,
    )
    .await?;
    Ok((Reading::parse(request), Reading::parse(limit)))
}

/// Read measured CPU usage from the metrics pipeline. The usage column
/// is the second whitespace-separated field of the headerless row.
async fn pod_usage(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    timeout: Duration,
) -> Result<Reading, HarnessError> {
    let out = cp
        .invoke(
            &["top", "pod", pod, "-n", namespace, "--no-headers"],
            None,
            timeout,
        )
        .await?;
    let raw = out
        .text()
        .filter(|_| out.success())
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or(UNAVAILABLE)
        .to_string();
    Ok(Reading::parse(raw))
}

/// Read the adaptive allocator's podallocation object for a pod. An
/// absent object (the allocator has not adopted the pod yet) yields the
/// all-sentinel status.
async fn allocator_status(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    timeout: Duration,
) -> Result<AllocatorStatus, HarnessError> {
    let exists = cp
        .invoke(&["get", "podallocation", pod, "-n", namespace], None, timeout)
        .await?;
    if !exists.success() {
        return Ok(AllocatorStatus::default());
    }

    let request = jsonpath(cp, "podallocation", pod, namespace, ".spec.desiredCPURequest", timeout).await?;
    let limit = jsonpath(cp, "podallocation", pod, namespace, ".spec.desiredCPULimit", timeout).await?;
    let phase = jsonpath(cp, "podallocation", pod, namespace, ".status.phase", timeout).await?;
    let shadow_price =
        jsonpath(cp, "podallocation", pod, namespace, ".status.shadowPriceCPU", timeout).await?;

    Ok(AllocatorStatus {
        request: Reading::parse(request),
        limit: Reading::parse(limit),
        phase,
        shadow_price,
    })
}

/// Read the vertical autoscaler's recommendation for its target.
async fn autoscaler_status(
    cp: &dyn ControlPlane,
    namespace: &str,
    vpa: &str,
    timeout: Duration,
) -> Result<AutoscalerStatus, HarnessError> {
    let exists = cp
        .invoke(&["get", "vpa", vpa, "-n", namespace], None, timeout)
        .await?;
    if !exists.success() {
        return Ok(AutoscalerStatus::default());
    }

    let mode = jsonpath(cp, "vpa", vpa, namespace, ".spec.updatePolicy.updateMode", timeout).await?;
    let target = jsonpath(
        cp,
        "vpa",
        vpa,
        namespace,
        ".status.recommendation.containerRecommendations[0].target.cpu",
        timeout,
    )
    .await?;
    let lower = jsonpath(
        cp,
        "vpa",
        vpa,
        namespace,
        ".status.recommendation.containerRecommendations[0].lowerBound.cpu",
        timeout,
    )
    .await?;
    let upper = jsonpath(
        cp,
        "vpa",
        vpa,
        namespace,
        ".status.recommendation.containerRecommendations[0].upperBound.cpu",
        timeout,
    )
    .await?;

    Ok(AutoscalerStatus {
        target: Reading::parse(target),
        lower: Reading::parse(lower),
        upper: Reading::parse(upper),
        mode,
    })
}

/// Collect one sample for an allocator-managed pod.
pub(crate) async fn idle_sample(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    elapsed: i64,
    timeout: Duration,
) -> Result<Sample, HarnessError> {
    let (request, limit) = pod_cpu(cp, namespace, pod, timeout).await?;
    let usage = pod_usage(cp, namespace, pod, timeout).await?;
    let alloc = allocator_status(cp, namespace, pod, timeout).await?;

    Ok(Sample {
        timestamp: Some(Utc::now().naive_utc()),
        elapsed,
        request,
        limit,
        usage,
        alloc,
        ..Sample::default()
    })
}

/// Collect one sample for an autoscaler-managed pod.
pub(crate) async fn vpa_sample(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    vpa: &str,
    elapsed: i64,
    timeout: Duration,
) -> Result<Sample, HarnessError> {
    let (request, limit) = pod_cpu(cp, namespace, pod, timeout).await?;
    let usage = pod_usage(cp, namespace, pod, timeout).await?;
    let autoscaler = autoscaler_status(cp, namespace, vpa, timeout).await?;

    Ok(Sample {
        timestamp: Some(Utc::now().naive_utc()),
        elapsed,
        request,
        limit,
        usage,
        autoscaler,
        ..Sample::default()
    })
}
