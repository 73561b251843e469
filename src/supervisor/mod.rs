//! External command supervision.
//!
//! One invocation at a time: the build tools hold exclusive locks on shared
//! intermediate directories, so nothing here runs concurrently across
//! invocations. Within an invocation, output streaming, the hang timers and
//! the wait-for-exit all live in one event loop (see [`diagnostic`]).

mod diagnostic;

use crate::config::{BuildConfig, ToolPaths, HANG_CHECKPOINT_MARKER};
use crate::planner::BuildInvocation;
use diagnostic::Watchdog;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SuperviseError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while supervising process: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to signal process: {0}")]
    Signal(String),
}

/// Terminal classification of one supervised invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionStatus {
    Completed,
    /// First attempt hung and was killed; the retry completed cleanly.
    TimedOutRecovered,
    /// The retry hung as well. There is no second retry.
    TimedOutFailed,
    /// The tool exited with a failure code of its own accord.
    Errored { exit_code: Option<i32> },
}

/// Outcome of a supervised run. Captured output is present regardless of
/// how the process ended.
#[derive(Debug)]
pub struct SupervisionOutcome {
    pub status: SupervisionStatus,
    pub output: String,
}

impl SupervisionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            SupervisionStatus::Completed | SupervisionStatus::TimedOutRecovered
        )
    }
}

/// Executes build invocations, with hang detection for the mdtool back-end.
pub struct Supervisor {
    tools: ToolPaths,
    hang_timeout: Duration,
    force_kill_timeout: Duration,
    diagnostic_mode: bool,
    checkpoint_marker: String,
}

impl Supervisor {
    pub fn new(
        tools: ToolPaths,
        hang_timeout: Duration,
        force_kill_timeout: Duration,
        diagnostic_mode: bool,
    ) -> Self {
        Self {
            tools,
            hang_timeout,
            force_kill_timeout,
            diagnostic_mode,
            checkpoint_marker: HANG_CHECKPOINT_MARKER.to_string(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(
            config.tools.clone(),
            config.hang_timeout,
            config.force_kill_timeout,
            config.diagnostic_mode,
        )
    }

    pub async fn run(&self, invocation: &BuildInvocation) -> Result<SupervisionOutcome, SuperviseError> {
        self.run_with_env(invocation, &[]).await
    }

    /// Runs the invocation, retrying exactly once if the watchdog had to
    /// kill a hung process. A hang on the retry is terminal.
    pub async fn run_with_env(
        &self,
        invocation: &BuildInvocation,
        envs: &[(String, String)],
    ) -> Result<SupervisionOutcome, SuperviseError> {
        let program = invocation.tool.program(&self.tools).clone();
        let args = invocation.args();
        let watchdog = self.watchdog_for(invocation);

        let attempt = diagnostic::run_once(&program, &args, envs, watchdog.as_ref()).await?;

        if !attempt.killed_by_watchdog {
            let status = if attempt.status.success() {
                SupervisionStatus::Completed
            } else {
                SupervisionStatus::Errored {
                    exit_code: attempt.status.code(),
                }
            };
            return Ok(SupervisionOutcome {
                status,
                output: attempt.output,
            });
        }

        warn!("build process hung and was killed, retrying once");
        // Text captured before the kill stays part of the outcome.
        let mut output = attempt.output;
        let retry = diagnostic::run_once(&program, &args, envs, watchdog.as_ref()).await?;
        output.push_str(&retry.output);

        let status = if retry.killed_by_watchdog {
            SupervisionStatus::TimedOutFailed
        } else if retry.status.success() {
            SupervisionStatus::TimedOutRecovered
        } else {
            SupervisionStatus::Errored {
                exit_code: retry.status.code(),
            }
        };

        Ok(SupervisionOutcome { status, output })
    }

    fn watchdog_for(&self, invocation: &BuildInvocation) -> Option<Watchdog> {
        if self.diagnostic_mode && invocation.supports_diagnostic_mode() {
            Some(Watchdog {
                marker: self.checkpoint_marker.clone(),
                hang_timeout: self.hang_timeout,
                force_kill_timeout: self.force_kill_timeout,
            })
        } else {
            None
        }
    }
}
