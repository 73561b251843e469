//! xambuild - CI build runner for Xamarin solutions
//!
//! This library plans, executes and post-processes the builds a Xamarin CI
//! run needs: every buildable project of a solution, or the UI-test projects
//! together with the app projects they exercise, followed by the test runs.
//!
//! # Core Concepts
//!
//! - **Solution graph**: the project graph of a parsed `.sln`, handed over
//!   as JSON by the external solution parser
//! - **Planning**: turning the graph into an ordered list of tool
//!   invocations (mdtool, xbuild, nunit3-console) for one configuration
//! - **Supervision**: running each invocation with output streaming and,
//!   for the mdtool back-end, hang detection with staged kill escalation
//! - **Artifact location**: finding what the build left behind (apk, ipa,
//!   xcarchive, app bundles, dSYMs, test assemblies) via glob and ranked
//!   name heuristics
//!
//! # Project Structure
//!
//! - [`solution`]: the in-memory solution/project model
//! - [`planner`]: build planning and invocation shaping
//! - [`supervisor`]: supervised process execution
//! - [`locator`]: artifact lookup
//! - [`pipeline`]: the driver tying the stages together

pub mod cli;
pub mod config;
pub mod locator;
pub mod pipeline;
pub mod planner;
pub mod solution;
pub mod supervisor;
pub mod util;

pub use config::{BuildConfig, ConfigError, ToolPaths};
pub use locator::{ArtifactKind, LocateError, Locator, OutputArtifact};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, PlanMode};
pub use planner::{BuildInvocation, Planner, PlanningError, ToolKind};
pub use solution::{Project, ProjectType, Solution};
pub use supervisor::{SupervisionOutcome, SupervisionStatus, Supervisor};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn name_is_xambuild() {
        assert_eq!(NAME, "xambuild");
    }
}
