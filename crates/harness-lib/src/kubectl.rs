//! kubectl process invoker
//!
//! All control-plane access goes through a single subprocess seam so the
//! sampler can be exercised against a scripted mock. A call, once
//! started, always resolves to either an output or a timeout;
//! `kill_on_drop` guarantees a timed-out child does not linger as an
//! orphan.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::HarnessError;

/// Default per-call deadline for control-plane queries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one control-plane query.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout, or `None` when empty.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.stdout.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Seam for control-plane queries. Implemented by [`Kubectl`] in
/// production and by scripted mocks in tests.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Run one query with a bounded timeout, optionally feeding `input`
    /// to the child's stdin. A non-zero exit code is a result, not an
    /// error: existence probes rely on the non-zero-means-absent
    /// convention, and each call site decides what failure means.
    async fn invoke(
        &self,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput, HarnessError>;
}

/// Invoker that shells out to the real kubectl binary.
pub struct Kubectl {
    program: String,
}

impl Kubectl {
    pub fn new() -> Self {
        Self {
            program: "kubectl".to_string(),
        }
    }

    /// Use a different program (for tests).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlPlane for Kubectl {
    async fn invoke(
        &self,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput, HarnessError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|source| HarnessError::ProcessSpawn { source })?;

        let fed = async move {
            if let Some(text) = input {
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(text.as_bytes()).await?;
                    // Dropping the handle closes the pipe so the child
                    // sees EOF.
                }
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(timeout, fed).await {
            Ok(Ok(out)) => Ok(CommandOutput {
                exit_code: out.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }),
            Ok(Err(source)) => Err(HarnessError::ProcessSpawn { source }),
            // The elapsed timeout drops the future and with it the
            // child; kill_on_drop has the runtime reap it.
            Err(_) => Err(HarnessError::ProcessTimeout {
                args: args.join(" "),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}
