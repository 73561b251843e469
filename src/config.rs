//! Run configuration.
//!
//! All run parameters live in one [`BuildConfig`] constructed at the process
//! boundary (CLI args + `XAMBUILD_*` environment variables) and passed down.
//! Core logic never reads the environment on its own.
//!
//! # Environment Variables
//!
//! - `XAMBUILD_MDTOOL_PATH`: mdtool binary - default: the Xamarin Studio bundle path
//! - `XAMBUILD_XBUILD_PATH`: xbuild/msbuild binary - default: "xbuild"
//! - `XAMBUILD_NUNIT_PATH`: NUnit 3 console binary - default: "nunit3-console"
//! - `XAMBUILD_HANG_TIMEOUT`: hang-detection window in seconds - default: "300"
//! - `XAMBUILD_KILL_TIMEOUT`: force-kill window in seconds - default: "60"
//! - `XAMBUILD_ARCHIVES_DIR`: Xcode archives directory - default: `$HOME/Library/Developer/Xcode/Archives`
//! - `XAMBUILD_LOG_LEVEL`: logging level - default: "info"

use crate::solution::ProjectType;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MDTOOL_PATH: &str = "/Applications/Xamarin Studio.app/Contents/MacOS/mdtool";
const DEFAULT_XBUILD_PATH: &str = "xbuild";
const DEFAULT_NUNIT_PATH: &str = "nunit3-console";
const DEFAULT_HANG_TIMEOUT_SECS: u64 = 300;
const DEFAULT_KILL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Output line marking the start of the mdtool phase known to hang.
pub const HANG_CHECKPOINT_MARKER: &str = "Loading projects";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("solution graph not found at: {0}")]
    SolutionNotFound(PathBuf),

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Locations of the external tool binaries.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub mdtool: PathBuf,
    pub xbuild: PathBuf,
    pub nunit_console: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mdtool: env_path("XAMBUILD_MDTOOL_PATH", DEFAULT_MDTOOL_PATH),
            xbuild: env_path("XAMBUILD_XBUILD_PATH", DEFAULT_XBUILD_PATH),
            nunit_console: env_path("XAMBUILD_NUNIT_PATH", DEFAULT_NUNIT_PATH),
        }
    }
}

/// Main configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// JSON project graph produced by the external solution parser.
    pub solution_graph: PathBuf,

    /// Solution configuration name, e.g. "Release".
    pub configuration: String,

    /// Solution platform name, e.g. "iPhone".
    pub platform: String,

    /// Allowed project types; empty means every non-unknown type.
    pub project_types: Vec<ProjectType>,

    /// Drive Apple builds through mdtool instead of xbuild.
    pub force_mdtool: bool,

    /// Enable hang detection for the mdtool back-end.
    pub diagnostic_mode: bool,

    /// How long the checkpoint phase may stay silent before termination.
    pub hang_timeout: Duration,

    /// Grace period between SIGTERM and SIGKILL.
    pub force_kill_timeout: Duration,

    /// Where Xcode drops `.xcarchive` bundles.
    pub archives_dir: PathBuf,

    /// Where the test-result log is written.
    pub deploy_dir: Option<PathBuf>,

    /// NUnit test filter, passed to the console runner.
    pub test_to_run: Option<String>,

    pub tools: ToolPaths,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for BuildConfig {
    /// Loads environment-sourced defaults; CLI args overwrite fields after.
    fn default() -> Self {
        Self {
            solution_graph: PathBuf::new(),
            configuration: String::new(),
            platform: String::new(),
            project_types: Vec::new(),
            force_mdtool: false,
            diagnostic_mode: true,
            hang_timeout: env_duration_secs("XAMBUILD_HANG_TIMEOUT", DEFAULT_HANG_TIMEOUT_SECS),
            force_kill_timeout: env_duration_secs("XAMBUILD_KILL_TIMEOUT", DEFAULT_KILL_TIMEOUT_SECS),
            archives_dir: default_archives_dir(),
            deploy_dir: None,
            test_to_run: None,
            tools: ToolPaths::default(),
            log_level: env::var("XAMBUILD_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.solution_graph.exists() {
            return Err(ConfigError::SolutionNotFound(self.solution_graph.clone()));
        }
        if self.configuration.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "configuration must not be empty".to_string(),
            ));
        }
        if self.hang_timeout.is_zero() || self.force_kill_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "hang and kill timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The "Configuration|Platform" key this run builds.
    pub fn solution_config(&self) -> String {
        crate::solution::solution_config_key(&self.configuration, &self.platform)
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn env_duration_secs(var: &str, default: u64) -> Duration {
    let secs = env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

fn default_archives_dir() -> PathBuf {
    if let Some(var) = env::var_os("XAMBUILD_ARCHIVES_DIR") {
        return PathBuf::from(var);
    }
    let home = env::var("HOME").unwrap_or_default();
    PathBuf::from(home).join("Library/Developer/Xcode/Archives")
}
