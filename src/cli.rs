//! Command-line interface.

use crate::config::BuildConfig;
use crate::pipeline::PlanMode;
use crate::solution::ProjectType;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// CI build runner for Xamarin solutions
#[derive(Parser, Debug)]
#[command(
    name = "xambuild",
    about = "Builds Xamarin solutions and runs their test projects",
    version,
    long_about = "xambuild takes a pre-parsed solution graph, plans the build commands for \
                  the requested configuration, runs them one at a time under hang \
                  supervision, and locates the produced artifacts (apk, ipa, xcarchive, \
                  app bundles, test assemblies)."
)]
pub struct CliArgs {
    #[arg(
        value_name = "GRAPH",
        help = "Path to the solution graph JSON produced by the solution parser"
    )]
    pub solution_graph: PathBuf,

    #[arg(
        short = 'c',
        long,
        value_name = "NAME",
        help = "Solution configuration, e.g. Release"
    )]
    pub configuration: String,

    #[arg(
        short = 'p',
        long,
        value_name = "NAME",
        default_value = "",
        help = "Solution platform, e.g. iPhone (empty for configuration-only solutions)"
    )]
    pub platform: String,

    #[arg(
        long,
        value_enum,
        default_value = "all",
        help = "What to build and run"
    )]
    pub mode: PlanMode,

    #[arg(
        long = "project-type",
        value_enum,
        value_delimiter = ',',
        help = "Restrict building to these project types (default: all buildable types)"
    )]
    pub project_types: Vec<ProjectTypeArg>,

    #[arg(long, help = "Drive Apple builds through mdtool instead of xbuild")]
    pub force_mdtool: bool,

    #[arg(long, help = "Disable hang detection for mdtool builds")]
    pub no_diagnostic: bool,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory the NUnit result log is written to"
    )]
    pub deploy_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Run only the named NUnit test or fixture"
    )]
    pub test_to_run: Option<String>,

    #[arg(long, help = "Print the planned commands without executing anything")]
    pub dry_run: bool,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, help = "Verbose output (debug logging)")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

/// User-facing spelling of the buildable project types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectTypeArg {
    Ios,
    Tvos,
    Macos,
    Android,
    Uitest,
    Nunit,
}

impl From<ProjectTypeArg> for ProjectType {
    fn from(arg: ProjectTypeArg) -> Self {
        match arg {
            ProjectTypeArg::Ios => ProjectType::Ios,
            ProjectTypeArg::Tvos => ProjectType::Tvos,
            ProjectTypeArg::Macos => ProjectType::Macos,
            ProjectTypeArg::Android => ProjectType::Android,
            ProjectTypeArg::Uitest => ProjectType::Uitest,
            ProjectTypeArg::Nunit => ProjectType::Nunit,
        }
    }
}

impl CliArgs {
    /// Builds the run configuration: environment defaults first, CLI
    /// arguments on top.
    pub fn to_config(&self) -> BuildConfig {
        let mut config = BuildConfig::default();
        config.solution_graph = self.solution_graph.clone();
        config.configuration = self.configuration.clone();
        config.platform = self.platform.clone();
        config.project_types = self.project_types.iter().copied().map(Into::into).collect();
        config.force_mdtool = self.force_mdtool;
        config.diagnostic_mode = !self.no_diagnostic;
        config.deploy_dir = self.deploy_dir.clone();
        config.test_to_run = self.test_to_run.clone();
        if let Some(level) = &self.log_level {
            config.log_level = level.to_lowercase();
        }
        config
    }
}
