//! Invocation shaping.
//!
//! A single pure function per project kind turns (back-end kind, project,
//! project config) into [`BuildInvocation`] values. Tool selection is a
//! capability choice over the `force_mdtool` flag, not a type hierarchy.

use super::invocation::{BuildInvocation, ToolKind};
use crate::solution::{is_any_cpu, Project, ProjectType, Solution};

/// True when every architecture targets an ARM device, which is what makes
/// a build archiveable. An empty list defaults to armv7.
pub fn is_architecture_archiveable(architectures: &[String]) -> bool {
    architectures
        .iter()
        .all(|arch| arch.to_lowercase().starts_with("arm"))
}

/// Solution-level build through the selected back-end.
pub(crate) fn solution_invocation(
    solution: &Solution,
    configuration: &str,
    platform: &str,
    force_mdtool: bool,
) -> BuildInvocation {
    if force_mdtool {
        BuildInvocation::new(ToolKind::MdTool, &solution.path)
            .target("build")
            .configuration(configuration)
            .platform(platform)
    } else {
        BuildInvocation::new(ToolKind::XBuild, &solution.path)
            .target("Build")
            .configuration(configuration)
            .platform(platform)
    }
}

/// Build invocations for one application project.
///
/// Returns an empty list plus a warning when the project does not expose the
/// requested solution configuration; the caller treats that as a skip.
pub(crate) fn project_invocations(
    solution: &Solution,
    proj: &Project,
    configuration: &str,
    platform: &str,
    solution_config: &str,
    force_mdtool: bool,
) -> (Vec<BuildInvocation>, Vec<String>) {
    let mut warnings = Vec::new();

    let project_config = match proj.config_for(solution_config) {
        Some(config) => config,
        None => {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            return (Vec::new(), warnings);
        }
    };

    let archiveable = is_architecture_archiveable(&project_config.mtouch_archs);
    let mut invocations = Vec::new();

    match proj.project_type {
        ProjectType::Ios | ProjectType::Tvos => {
            if force_mdtool {
                let build = BuildInvocation::new(ToolKind::MdTool, &solution.path)
                    .target("build")
                    .configuration(&project_config.configuration)
                    .platform(&project_config.platform)
                    .project_name(&proj.name);
                invocations.push(build.clone());

                if archiveable {
                    invocations.push(build.target("archive"));
                }
            } else {
                let mut build = BuildInvocation::new(ToolKind::XBuild, &solution.path)
                    .target("Build")
                    .configuration(configuration)
                    .platform(platform);

                if archiveable {
                    build = build.flag("/p:BuildIpa=true").flag("/p:ArchiveOnBuild=true");
                }

                invocations.push(build);
            }
        }
        ProjectType::Macos => {
            if force_mdtool {
                let build = BuildInvocation::new(ToolKind::MdTool, &solution.path)
                    .target("build")
                    .configuration(&project_config.configuration)
                    .platform(&project_config.platform)
                    .project_name(&proj.name);
                invocations.push(build.clone());
                invocations.push(build.target("archive"));
            } else {
                invocations.push(
                    BuildInvocation::new(ToolKind::XBuild, &solution.path)
                        .target("Build")
                        .configuration(configuration)
                        .platform(platform)
                        .flag("/p:ArchiveOnBuild=true"),
                );
            }
        }
        ProjectType::Android => {
            // Android always goes through the project file, never the IDE.
            let target = if project_config.sign_android {
                "SignAndroidPackage"
            } else {
                "PackageForAndroid"
            };

            let mut build = BuildInvocation::new(ToolKind::XBuild, &proj.path)
                .target(target)
                .configuration(&project_config.configuration);

            if !is_any_cpu(&project_config.platform) {
                build = build.platform(&project_config.platform);
            }

            invocations.push(build);
        }
        ProjectType::Uitest | ProjectType::Nunit | ProjectType::Unknown => {}
    }

    (invocations, warnings)
}

/// Build invocation for a Xamarin.UITest harness project. Always mdtool,
/// scoped to the project, no platform.
pub(crate) fn test_project_invocation(
    solution: &Solution,
    proj: &Project,
    solution_config: &str,
) -> (Option<BuildInvocation>, Vec<String>) {
    let mut warnings = Vec::new();

    let project_config = match proj.config_for(solution_config) {
        Some(config) => config,
        None => {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            return (None, warnings);
        }
    };

    let invocation = BuildInvocation::new(ToolKind::MdTool, &solution.path)
        .target("build")
        .configuration(&project_config.configuration)
        .project_name(&proj.name);

    (Some(invocation), warnings)
}

/// NUnit console invocation for a unit-test project.
pub(crate) fn nunit_project_invocation(
    proj: &Project,
    solution_config: &str,
) -> (Option<BuildInvocation>, Vec<String>) {
    let mut warnings = Vec::new();

    let project_config = match proj.config_for(solution_config) {
        Some(config) => config,
        None => {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            return (None, warnings);
        }
    };

    let invocation = BuildInvocation::new(ToolKind::NunitConsole, &proj.path)
        .configuration(&project_config.configuration);

    (Some(invocation), warnings)
}
