//! Build planning.
//!
//! Turns the read-only project graph into an ordered list of build
//! invocations for one solution configuration. The planner is pure: it never
//! touches the filesystem or starts a process, so a plan can be printed,
//! diffed, and deduplicated before anything runs.

mod commands;
mod filters;
mod invocation;

pub use commands::is_architecture_archiveable;
pub use invocation::{BuildInvocation, ToolKind};

use crate::solution::{solution_config_key, ProjectType, Solution};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("invalid solution config ({requested}), available: {}", available.join(", "))]
    InvalidConfiguration {
        requested: String,
        available: Vec<String>,
    },

    /// A CI run that "succeeds" by building nothing must not look like
    /// success, so an empty plan is a hard error.
    #[error("no project to build found")]
    NothingToBuild,
}

/// One planned build step: the invocation plus the project it came from.
#[derive(Debug, Clone)]
pub struct PlannedBuild {
    /// Absent for solution-level steps. Names are not guaranteed unique in
    /// a solution; this is the lookup key back into the graph.
    pub project_id: Option<String>,
    pub project_name: String,
    pub project_type: ProjectType,
    pub invocation: BuildInvocation,
}

/// Ordered invocations plus the warnings planning accumulated.
#[derive(Debug, Default)]
pub struct BuildPlan {
    pub builds: Vec<PlannedBuild>,
    pub warnings: Vec<String>,
}

/// Plans builds for one solution. Owns nothing but borrowed graph data.
pub struct Planner<'a> {
    solution: &'a Solution,
    type_filter: Vec<ProjectType>,
    force_mdtool: bool,
}

impl<'a> Planner<'a> {
    pub fn new(solution: &'a Solution, type_filter: Vec<ProjectType>, force_mdtool: bool) -> Self {
        Self {
            solution,
            type_filter,
            force_mdtool,
        }
    }

    /// A single solution-level build invocation.
    pub fn plan_solution(&self, configuration: &str, platform: &str) -> Result<BuildPlan, PlanningError> {
        self.validate_config(configuration, platform)?;

        let invocation =
            commands::solution_invocation(self.solution, configuration, platform, self.force_mdtool);

        Ok(BuildPlan {
            builds: vec![PlannedBuild {
                project_id: None,
                project_name: self.solution.name.clone(),
                project_type: ProjectType::Unknown,
                invocation,
            }],
            warnings: Vec::new(),
        })
    }

    /// Every buildable project, in discovery order.
    pub fn plan_all_projects(
        &self,
        configuration: &str,
        platform: &str,
    ) -> Result<BuildPlan, PlanningError> {
        self.validate_config(configuration, platform)?;
        let solution_config = solution_config_key(configuration, platform);

        let (projects, mut warnings) =
            filters::buildable_projects(self.solution, &self.type_filter, &solution_config);
        if projects.is_empty() {
            return Err(PlanningError::NothingToBuild);
        }

        let mut builds = Vec::new();
        for proj in projects {
            let (invocations, warns) = commands::project_invocations(
                self.solution,
                proj,
                configuration,
                platform,
                &solution_config,
                self.force_mdtool,
            );
            warnings.extend(warns);
            for invocation in invocations {
                builds.push(PlannedBuild {
                    project_id: Some(proj.id.clone()),
                    project_name: proj.name.clone(),
                    project_type: proj.project_type,
                    invocation,
                });
            }
        }

        debug!(steps = builds.len(), "planned all-projects build");
        Ok(BuildPlan { builds, warnings })
    }

    /// UI-test projects and everything they refer to.
    ///
    /// Two-phase ordering: every referred project across every test project
    /// is planned first, then the test projects themselves, so a referred
    /// app is never built after the harness that exercises it.
    pub fn plan_test_and_referred(
        &self,
        configuration: &str,
        platform: &str,
    ) -> Result<BuildPlan, PlanningError> {
        self.validate_config(configuration, platform)?;
        let solution_config = solution_config_key(configuration, platform);

        let (test_projects, referred_projects, mut warnings) =
            filters::buildable_test_and_referred_projects(
                self.solution,
                &self.type_filter,
                &solution_config,
            );
        if test_projects.is_empty() || referred_projects.is_empty() {
            return Err(PlanningError::NothingToBuild);
        }

        let mut builds = Vec::new();

        for proj in referred_projects {
            let (invocations, warns) = commands::project_invocations(
                self.solution,
                proj,
                configuration,
                platform,
                &solution_config,
                self.force_mdtool,
            );
            warnings.extend(warns);
            for invocation in invocations {
                builds.push(PlannedBuild {
                    project_id: Some(proj.id.clone()),
                    project_name: proj.name.clone(),
                    project_type: proj.project_type,
                    invocation,
                });
            }
        }

        for proj in test_projects {
            let (invocation, warns) =
                commands::test_project_invocation(self.solution, proj, &solution_config);
            warnings.extend(warns);
            if let Some(invocation) = invocation {
                builds.push(PlannedBuild {
                    project_id: Some(proj.id.clone()),
                    project_name: proj.name.clone(),
                    project_type: proj.project_type,
                    invocation,
                });
            }
        }

        debug!(steps = builds.len(), "planned test-and-referred build");
        Ok(BuildPlan { builds, warnings })
    }

    /// Solution build first, then one NUnit console run per test project.
    pub fn plan_nunit_tests(
        &self,
        configuration: &str,
        platform: &str,
    ) -> Result<BuildPlan, PlanningError> {
        self.validate_config(configuration, platform)?;
        let solution_config = solution_config_key(configuration, platform);

        let (test_projects, mut warnings) =
            filters::buildable_nunit_projects(self.solution, &solution_config);
        if test_projects.is_empty() {
            return Err(PlanningError::NothingToBuild);
        }

        let mut builds = vec![PlannedBuild {
            project_id: None,
            project_name: self.solution.name.clone(),
            project_type: ProjectType::Unknown,
            invocation: commands::solution_invocation(
                self.solution,
                configuration,
                platform,
                self.force_mdtool,
            ),
        }];

        for proj in test_projects {
            let (invocation, warns) = commands::nunit_project_invocation(proj, &solution_config);
            warnings.extend(warns);
            if let Some(invocation) = invocation {
                builds.push(PlannedBuild {
                    project_id: Some(proj.id.clone()),
                    project_name: proj.name.clone(),
                    project_type: proj.project_type,
                    invocation,
                });
            }
        }

        Ok(BuildPlan { builds, warnings })
    }

    fn validate_config(&self, configuration: &str, platform: &str) -> Result<(), PlanningError> {
        let requested = solution_config_key(configuration, platform);
        if !self.solution.has_config(&requested) {
            return Err(PlanningError::InvalidConfiguration {
                requested,
                available: self.solution.configs.clone(),
            });
        }
        Ok(())
    }
}
