//! Pipeline driver.
//!
//! Ties the stages together: load the solution graph, plan, execute each
//! invocation under supervision, collect artifacts, and for UI-test runs
//! pair each test assembly with the app bundles it exercises. The driver is
//! single-threaded on purpose: the build tools lock shared intermediate
//! directories, so invocations must run strictly one after another.

use crate::config::{BuildConfig, ConfigError};
use crate::locator::{ArtifactKind, LocateError, Locator, OutputArtifact};
use crate::planner::{BuildInvocation, BuildPlan, Planner, PlanningError, ToolKind};
use crate::solution::{ProjectType, Solution};
use crate::supervisor::{SupervisionStatus, SuperviseError, Supervisor};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Env var the UITest harness reads to find the app bundle under test.
const APP_BUNDLE_ENV: &str = "APP_BUNDLE_PATH";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read solution graph {path}: {source}")]
    GraphRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse solution graph: {0}")]
    GraphParse(#[from] serde_json::Error),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Supervision(#[from] SuperviseError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("build of {project} failed: {detail}")]
    BuildFailed { project: String, detail: String },

    #[error("no app generated for project: {project}")]
    MissingAppBundle { project: String },

    #[error("no test assembly generated for project: {project}")]
    MissingTestAssembly { project: String },

    #[error("test run for {project} failed: {detail}")]
    TestRunFailed { project: String, detail: String },
}

/// What a run should do with the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlanMode {
    /// Build every buildable project.
    All,
    /// Build UI-test projects and their referred apps, then run the tests.
    Test,
    /// Build the solution, then run NUnit test projects.
    Nunit,
    /// One solution-level build, nothing per project.
    Solution,
}

/// One located artifact attributed to the project that produced it.
#[derive(Debug, Clone)]
pub struct ProjectArtifact {
    pub project_name: String,
    pub artifact: OutputArtifact,
}

/// Summary of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Printable command lines, in execution (or dry-run print) order.
    pub commands: Vec<String>,
    /// Structurally duplicate invocations that were skipped.
    pub skipped_duplicates: usize,
    pub artifacts: Vec<ProjectArtifact>,
    pub test_runs: usize,
}

pub struct Pipeline {
    config: BuildConfig,
    supervisor: Supervisor,
    locator: Locator,
}

impl Pipeline {
    pub fn new(config: BuildConfig) -> Self {
        let supervisor = Supervisor::from_config(&config);
        let locator = Locator::from_config(&config);
        Self {
            config,
            supervisor,
            locator,
        }
    }

    pub async fn run(&self, mode: PlanMode, dry_run: bool) -> Result<PipelineReport, PipelineError> {
        self.config.validate()?;
        let solution = self.load_solution()?;

        let planner = Planner::new(
            &solution,
            self.config.project_types.clone(),
            self.config.force_mdtool,
        );
        let plan = match mode {
            PlanMode::All => {
                planner.plan_all_projects(&self.config.configuration, &self.config.platform)?
            }
            PlanMode::Test => {
                planner.plan_test_and_referred(&self.config.configuration, &self.config.platform)?
            }
            PlanMode::Nunit => {
                planner.plan_nunit_tests(&self.config.configuration, &self.config.platform)?
            }
            PlanMode::Solution => {
                planner.plan_solution(&self.config.configuration, &self.config.platform)?
            }
        };

        for warning in &plan.warnings {
            warn!("{}", warning);
        }

        if dry_run {
            let mut report = PipelineReport::default();
            for build in &plan.builds {
                let command = build.invocation.printable(&self.config.tools);
                println!("{}", command);
                report.commands.push(command);
            }
            return Ok(report);
        }

        let mut report = PipelineReport::default();
        self.execute_plan(&plan, &mut report).await?;

        match mode {
            PlanMode::All => {
                report.artifacts = self.collect_artifacts(&solution, &plan)?;
            }
            PlanMode::Test => {
                report.artifacts = self.collect_artifacts(&solution, &plan)?;
                self.run_ui_tests(&solution, &plan, &mut report).await?;
            }
            PlanMode::Nunit | PlanMode::Solution => {}
        }

        Ok(report)
    }

    fn load_solution(&self) -> Result<Solution, PipelineError> {
        let path = &self.config.solution_graph;
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::GraphRead {
            path: path.clone(),
            source,
        })?;
        let solution: Solution = serde_json::from_str(&content)?;
        info!(
            solution = %solution.name,
            projects = solution.projects.len(),
            "loaded solution graph"
        );
        Ok(solution)
    }

    /// Runs every planned invocation in order, skipping structural
    /// duplicates. Any failure aborts the run.
    async fn execute_plan(
        &self,
        plan: &BuildPlan,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let mut performed: HashSet<BuildInvocation> = HashSet::new();

        for build in &plan.builds {
            let invocation = self.decorate(build.invocation.clone());
            if !performed.insert(invocation.clone()) {
                warn!(
                    project = %build.project_name,
                    "build command already performed, skipping"
                );
                report.skipped_duplicates += 1;
                continue;
            }

            let command = invocation.printable(&self.config.tools);
            info!(project = %build.project_name, command = %command, "running build command");
            report.commands.push(command);

            let outcome = self.supervisor.run(&invocation).await?;
            match outcome.status {
                SupervisionStatus::Completed => {}
                SupervisionStatus::TimedOutRecovered => {
                    info!(project = %build.project_name, "build recovered after hang retry");
                }
                SupervisionStatus::TimedOutFailed => {
                    return Err(PipelineError::BuildFailed {
                        project: build.project_name.clone(),
                        detail: "build hung twice and was killed".to_string(),
                    });
                }
                SupervisionStatus::Errored { exit_code } => {
                    return Err(PipelineError::BuildFailed {
                        project: build.project_name.clone(),
                        detail: match exit_code {
                            Some(code) => format!("tool exited with status {}", code),
                            None => "tool was terminated by a signal".to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// NUnit console steps pick up the run-wide result path and test filter.
    fn decorate(&self, invocation: BuildInvocation) -> BuildInvocation {
        if invocation.tool != ToolKind::NunitConsole {
            return invocation;
        }
        let mut invocation = invocation;
        if let Some(deploy_dir) = &self.config.deploy_dir {
            invocation = invocation.flag(format!(
                "--result={}",
                deploy_dir.join("TestResult.xml").display()
            ));
        }
        if let Some(test) = &self.config.test_to_run {
            invocation = invocation.flag(format!("--test={}", test));
        }
        invocation
    }

    /// Locates outputs for every distinct non-test project the plan built.
    fn collect_artifacts(
        &self,
        solution: &Solution,
        plan: &BuildPlan,
    ) -> Result<Vec<ProjectArtifact>, PipelineError> {
        let solution_config = self.config.solution_config();
        let mut seen = HashSet::new();
        let mut artifacts = Vec::new();

        for build in &plan.builds {
            if build.project_type.is_test() || build.project_type == ProjectType::Unknown {
                continue;
            }
            let project_id = match &build.project_id {
                Some(id) => id,
                None => continue,
            };
            if !seen.insert(project_id.clone()) {
                continue;
            }
            let proj = match solution.project_by_id(project_id) {
                Some(proj) => proj,
                None => continue,
            };

            for artifact in self.locator.collect_project_outputs(proj, &solution_config)? {
                info!(
                    project = %proj.name,
                    kind = %artifact.kind,
                    path = %artifact.path.display(),
                    "collected artifact"
                );
                artifacts.push(ProjectArtifact {
                    project_name: proj.name.clone(),
                    artifact,
                });
            }
        }

        Ok(artifacts)
    }

    /// Runs each built test assembly once per referred app bundle, passing
    /// the bundle through the environment.
    async fn run_ui_tests(
        &self,
        solution: &Solution,
        plan: &BuildPlan,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let solution_config = self.config.solution_config();

        let mut bundles: BTreeMap<String, OutputArtifact> = BTreeMap::new();
        for entry in &report.artifacts {
            if matches!(entry.artifact.kind, ArtifactKind::App | ArtifactKind::Apk) {
                bundles
                    .entry(entry.project_name.clone())
                    .or_insert_with(|| entry.artifact.clone());
            }
        }

        let test_projects: Vec<_> = {
            let mut seen = HashSet::new();
            plan.builds
                .iter()
                .filter(|b| b.project_type == ProjectType::Uitest)
                .filter_map(|b| b.project_id.as_deref())
                .filter(|id| seen.insert(id.to_string()))
                .filter_map(|id| solution.project_by_id(id))
                .collect()
        };

        for proj in test_projects {
            let outputs =
                self.locator
                    .collect_test_project_outputs(solution, proj, &solution_config)?;

            let assembly = outputs
                .assembly
                .ok_or_else(|| PipelineError::MissingTestAssembly {
                    project: proj.name.clone(),
                })?;

            for referred_name in &outputs.referred_project_names {
                let bundle = bundles.get(referred_name).ok_or_else(|| {
                    PipelineError::MissingAppBundle {
                        project: referred_name.clone(),
                    }
                })?;

                let invocation =
                    self.decorate(BuildInvocation::new(ToolKind::NunitConsole, &assembly.path));
                info!(
                    test = %proj.name,
                    app = %referred_name,
                    bundle = %bundle.path.display(),
                    "running ui tests against app bundle"
                );
                report.commands.push(invocation.printable(&self.config.tools));

                let envs = [(
                    APP_BUNDLE_ENV.to_string(),
                    bundle.path.to_string_lossy().into_owned(),
                )];
                let outcome = self.supervisor.run_with_env(&invocation, &envs).await?;
                if !outcome.succeeded() {
                    return Err(PipelineError::TestRunFailed {
                        project: proj.name.clone(),
                        detail: match outcome.status {
                            SupervisionStatus::Errored { exit_code: Some(code) } => {
                                format!("runner exited with status {}", code)
                            }
                            _ => "runner did not complete".to_string(),
                        },
                    });
                }
                report.test_runs += 1;
            }
        }

        Ok(())
    }
}
