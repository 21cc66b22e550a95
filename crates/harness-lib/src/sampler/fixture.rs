//! Cluster preflight checks and workload fixtures
//!
//! Fixtures are applied through `kubectl apply -f -` with the manifest
//! fed over stdin, so every run observes exactly the manifest this
//! binary was built with. Namespace creation goes through a client-side
//! dry-run render piped back into apply, which makes it idempotent
//! across repeated runs.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::HarnessError;
use crate::kubectl::ControlPlane;

pub(crate) const READY_TIMEOUT_SECS: u64 = 90;
pub(crate) const METRICS_WAIT_SECS: u64 = 180;
pub(crate) const VPA_RECOMMENDATION_WAIT_SECS: u64 = 300;

/// Label marking a namespace as eligible for allocator management.
const MANAGED_LABEL: &str = "mbcas.io/managed=true";

/// Fail fast when no cluster is reachable.
pub(crate) async fn check_cluster(
    cp: &dyn ControlPlane,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let out = cp.invoke(&["get", "nodes"], None, timeout).await?;
    if out.success() {
        Ok(())
    } else {
        Err(HarnessError::PrerequisiteFailed {
            what: "cluster unreachable".to_string(),
            detail: out.stderr.trim().to_string(),
        })
    }
}

async fn metrics_server_ready(
    cp: &dyn ControlPlane,
    timeout: Duration,
) -> Result<bool, HarnessError> {
    let out = cp.invoke(&["top", "nodes"], None, timeout).await?;
    Ok(out.success())
}

/// Wait for the metrics pipeline to start serving. On a fresh cluster
/// the metrics-server needs a scrape cycle or two before `top` works.
pub(crate) async fn wait_for_metrics_server(
    cp: &dyn ControlPlane,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let mut waited = 0u64;
    loop {
        if metrics_server_ready(cp, timeout).await? {
            return Ok(());
        }
        if waited >= METRICS_WAIT_SECS {
            return Err(HarnessError::ProvisioningTimeout {
                what: "metrics-server".to_string(),
                timeout_secs: METRICS_WAIT_SECS,
            });
        }
        debug!(waited, "metrics-server not serving yet");
        tokio::time::sleep(Duration::from_secs(5)).await;
        waited += 5;
    }
}

/// Fail fast when the VPA CRD is not installed.
pub(crate) async fn check_vpa_crd(
    cp: &dyn ControlPlane,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let out = cp
        .invoke(
            &["get", "crd", "verticalpodautoscalers.autoscaling.k8s.io"],
            None,
            timeout,
        )
        .await?;
    if out.success() {
        Ok(())
    } else {
        Err(HarnessError::PrerequisiteFailed {
            what: "VPA CRD not installed".to_string(),
            detail: "install the vertical-pod-autoscaler before running this tracker".to_string(),
        })
    }
}

/// Create (or confirm) the namespace, optionally labeling it for
/// allocator management.
pub(crate) async fn create_namespace(
    cp: &dyn ControlPlane,
    namespace: &str,
    label_managed: bool,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let rendered = cp
        .invoke(
            &["create", "namespace", namespace, "--dry-run=client", "-o", "yaml"],
            None,
            timeout,
        )
        .await?;
    if !rendered.success() {
        return Err(HarnessError::FixtureFailed {
            what: format!("namespace {namespace}"),
            detail: rendered.stderr.trim().to_string(),
        });
    }

    let applied = cp
        .invoke(&["apply", "-f", "-"], Some(&rendered.stdout), timeout)
        .await?;
    if !applied.success() {
        return Err(HarnessError::FixtureFailed {
            what: format!("namespace {namespace}"),
            detail: applied.stderr.trim().to_string(),
        });
    }

    if label_managed {
        let labeled = cp
            .invoke(
                &["label", "namespace", namespace, MANAGED_LABEL, "--overwrite"],
                None,
                timeout,
            )
            .await?;
        if !labeled.success() {
            return Err(HarnessError::FixtureFailed {
                what: format!("namespace label on {namespace}"),
                detail: labeled.stderr.trim().to_string(),
            });
        }
    }

    info!(namespace, "namespace ready");
    Ok(())
}

fn idle_pod_manifest(namespace: &str, name: &str, request: &str, limit: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Pod
metadata:
  name: {name}
  namespace: {namespace}
  labels:
    mbcas.io/managed: "true"
spec:
  containers:
  - name: idle
    image: busybox:1.36
    command: ["sh", "-c", "while true; do sleep 3600; done"]
    resources:
      requests:
        cpu: {request}
        memory: 64Mi
      limits:
        cpu: {limit}
        memory: 128Mi
"#
    )
}

fn idle_deployment_manifest(namespace: &str, name: &str, request: &str, limit: &str) -> String {
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  namespace: {namespace}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
      - name: idle
        image: busybox:1.36
        command: ["sh", "-c", "while true; do sleep 3600; done"]
        resources:
          requests:
            cpu: {request}
            memory: 64Mi
          limits:
            cpu: {limit}
            memory: 128Mi
"#
    )
}

fn vpa_manifest(namespace: &str, deployment: &str, update_mode: &str) -> String {
    format!(
        r#"apiVersion: autoscaling.k8s.io/v1
kind: VerticalPodAutoscaler
metadata:
  name: {deployment}-vpa
  namespace: {namespace}
spec:
  targetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: {deployment}
  updatePolicy:
    updateMode: "{update_mode}"
  resourcePolicy:
    containerPolicies:
    - containerName: idle
      minAllowed:
        cpu: 100m
      maxAllowed:
        cpu: 2000m
"#
    )
}

async fn apply_manifest(
    cp: &dyn ControlPlane,
    what: &str,
    manifest: &str,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let out = cp
        .invoke(&["apply", "-f", "-"], Some(manifest), timeout)
        .await?;
    if out.success() {
        Ok(())
    } else {
        Err(HarnessError::FixtureFailed {
            what: what.to_string(),
            detail: out.stderr.trim().to_string(),
        })
    }
}

/// Block until the pod reports Ready.
pub(crate) async fn wait_for_pod_ready(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
) -> Result<(), HarnessError> {
    let target = format!("pod/{pod}");
    let deadline = format!("--timeout={READY_TIMEOUT_SECS}s");
    // The invoke deadline sits above kubectl's own so the child gets to
    // report its failure itself.
    let out = cp
        .invoke(
            &["wait", "--for=condition=Ready", &target, "-n", namespace, &deadline],
            None,
            Duration::from_secs(READY_TIMEOUT_SECS + 10),
        )
        .await?;
    if out.success() {
        Ok(())
    } else {
        Err(HarnessError::ProvisioningTimeout {
            what: format!("pod {pod}"),
            timeout_secs: READY_TIMEOUT_SECS,
        })
    }
}

/// Apply the idle pod fixture and wait for readiness.
pub(crate) async fn create_idle_pod(
    cp: &dyn ControlPlane,
    namespace: &str,
    name: &str,
    request: &str,
    limit: &str,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let manifest = idle_pod_manifest(namespace, name, request, limit);
    apply_manifest(cp, &format!("pod {name}"), &manifest, timeout).await?;
    wait_for_pod_ready(cp, namespace, name).await?;
    info!(pod = name, namespace, request, limit, "idle pod ready");
    Ok(())
}

/// Apply the idle deployment fixture, resolve its pod, and wait for
/// readiness. Returns the pod name the tracker will sample.
pub(crate) async fn create_vpa_deployment(
    cp: &dyn ControlPlane,
    namespace: &str,
    name: &str,
    request: &str,
    limit: &str,
    timeout: Duration,
) -> Result<String, HarnessError> {
    let manifest = idle_deployment_manifest(namespace, name, request, limit);
    apply_manifest(cp, &format!("deployment {name}"), &manifest, timeout).await?;

    let selector = format!("app={name}");
    let mut pod = None;
    for _ in 0..30 {
        let out = cp
            .invoke(
                &[
                    "get", "pods", "-n", namespace, "-l", &selector, "-o",
                    "jsonpath={.items[0].metadata.name}",
                ],
                None,
                timeout,
            )
            .await?;
        if out.success() {
            if let Some(name) = out.text() {
                pod = Some(name.to_string());
                break;
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    let pod = pod.ok_or_else(|| HarnessError::ProvisioningTimeout {
        what: format!("deployment {name} pod"),
        timeout_secs: 60,
    })?;

    wait_for_pod_ready(cp, namespace, &pod).await?;
    info!(deployment = name, pod, namespace, "deployment ready");
    Ok(pod)
}

/// Apply the autoscaler object targeting the deployment. Returns the
/// object's name.
pub(crate) async fn create_vpa_object(
    cp: &dyn ControlPlane,
    namespace: &str,
    deployment: &str,
    update_mode: &str,
    timeout: Duration,
) -> Result<String, HarnessError> {
    let manifest = vpa_manifest(namespace, deployment, update_mode);
    let name = format!("{deployment}-vpa");
    apply_manifest(cp, &format!("vpa {name}"), &manifest, timeout).await?;
    info!(vpa = name, update_mode, "autoscaler object applied");
    Ok(name)
}

/// Wait for the autoscaler to publish a first recommendation. Expiry is
/// a warning, not an error: samples collected without a recommendation
/// still record the sentinel and remain useful.
pub(crate) async fn wait_for_vpa_recommendation(
    cp: &dyn ControlPlane,
    namespace: &str,
    vpa: &str,
    timeout: Duration,
) -> Result<(), HarnessError> {
    let mut waited = 0u64;
    while waited < VPA_RECOMMENDATION_WAIT_SECS {
        let out = cp
            .invoke(
                &[
                    "get", "vpa", vpa, "-n", namespace, "-o",
                    "jsonpath={.status.recommendation}",
                ],
                None,
                timeout,
            )
            .await?;
        if out.success() {
            if let Some(text) = out.text() {
                if text != "{}" {
                    info!(vpa, "recommendation available");
                    return Ok(());
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        waited += 10;
    }
    warn!(
        vpa,
        waited_secs = VPA_RECOMMENDATION_WAIT_SECS,
        "no recommendation yet, sampling anyway"
    );
    Ok(())
}

/// Best-effort delete; a failed delete is logged, never fatal.
async fn delete(cp: &dyn ControlPlane, args: &[&str], timeout: Duration) {
    match cp.invoke(args, None, timeout).await {
        Ok(out) if out.success() => {}
        Ok(out) => warn!(args = args.join(" "), stderr = %out.stderr.trim(), "delete failed"),
        Err(err) => warn!(args = args.join(" "), %err, "delete failed"),
    }
}

pub(crate) async fn teardown_idle(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    timeout: Duration,
) {
    delete(
        cp,
        &["delete", "pod", pod, "-n", namespace, "--ignore-not-found"],
        timeout,
    )
    .await;
    delete(
        cp,
        &["delete", "namespace", namespace, "--ignore-not-found"],
        timeout,
    )
    .await;
    info!(namespace, "fixtures removed");
}

pub(crate) async fn teardown_vpa(
    cp: &dyn ControlPlane,
    namespace: &str,
    deployment: &str,
    vpa: &str,
    timeout: Duration,
) {
    delete(
        cp,
        &["delete", "vpa", vpa, "-n", namespace, "--ignore-not-found"],
        timeout,
    )
    .await;
    delete(
        cp,
        &["delete", "deployment", deployment, "-n", namespace, "--ignore-not-found"],
        timeout,
    )
    .await;
    delete(
        cp,
        &["delete", "namespace", namespace, "--ignore-not-found"],
        timeout,
    )
    .await;
    info!(namespace, "fixtures removed");
}
