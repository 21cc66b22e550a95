//! Error taxonomy for the measurement harness
//!
//! Every variant here is fatal at its point of use. Quantity-parse
//! failures never appear: they degrade to zero inside
//! [`crate::parse::parse_quantity`] so a single bad reading cannot abort
//! a long collection.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The control-plane query did not return within its deadline.
    /// Collection cannot proceed without a responsive control plane.
    #[error("kubectl timed out after {timeout_secs}s: kubectl {args}")]
    ProcessTimeout { args: String, timeout_secs: u64 },

    /// kubectl could not be spawned or its streams could not be read.
    #[error("failed to run kubectl: {source}")]
    ProcessSpawn {
        #[source]
        source: std::io::Error,
    },

    /// A preflight check failed before provisioning started.
    #[error("{what}: {detail}")]
    PrerequisiteFailed { what: String, detail: String },

    /// Applying a fixture manifest was rejected by the control plane.
    #[error("failed to provision {what}: {detail}")]
    FixtureFailed { what: String, detail: String },

    /// A provisioned fixture never reached its readiness condition.
    #[error("{what} not ready within {timeout_secs}s")]
    ProvisioningTimeout { what: String, timeout_secs: u64 },

    /// A timestamp did not match `YYYY-MM-DDTHH:MM:SS` after truncation.
    /// Fatal on a run's start time; per-sample occurrences are recovered
    /// by skipping the sample.
    #[error("malformed timestamp {raw:?}")]
    MalformedTimestamp { raw: String },

    #[error("run file not found: {path}")]
    RunFileNotFound { path: PathBuf },

    #[error("invalid run file {path}: {reason}")]
    InvalidRunFile { path: PathBuf, reason: String },

    #[error("failed to write run file {path}: {source}")]
    RunWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
