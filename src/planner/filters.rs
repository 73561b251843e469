//! Project filtering.
//!
//! Narrows the solution's project graph down to the projects a planning mode
//! may build. Every dropped project produces a human-readable warning so the
//! driver can surface why a project was skipped without aborting the run.

use crate::solution::{OutputKind, Project, ProjectType, Solution};

/// Empty filter allows every non-unknown type.
pub(crate) fn filter_allows(filter: &[ProjectType], project_type: ProjectType) -> bool {
    if project_type == ProjectType::Unknown {
        return false;
    }
    filter.is_empty() || filter.contains(&project_type)
}

/// Projects the "build everything" mode may build, with skip warnings.
pub(crate) fn buildable_projects<'a>(
    solution: &'a Solution,
    filter: &[ProjectType],
    solution_config: &str,
) -> (Vec<&'a Project>, Vec<String>) {
    let mut projects = Vec::new();
    let mut warnings = Vec::new();

    for proj in &solution.projects {
        if !filter_allows(filter, proj.project_type) {
            continue;
        }

        if proj.config_map.get(solution_config).is_none() {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            continue;
        }

        if proj.project_type.is_apple_app() && proj.output_kind != OutputKind::Exe {
            warnings.push(format!(
                "project ({}) is not archivable based on output kind, skipping",
                proj.name
            ));
            continue;
        }

        if proj.project_type == ProjectType::Android && !proj.android_application {
            warnings.push(format!(
                "({}) is not an android application project, skipping",
                proj.name
            ));
            continue;
        }

        projects.push(proj);
    }

    (projects, warnings)
}

/// UI-test projects plus every project they refer to, both in discovery
/// order. Referred projects are collected across all test projects so the
/// planner can build them in one leading phase.
pub(crate) fn buildable_test_and_referred_projects<'a>(
    solution: &'a Solution,
    filter: &[ProjectType],
    solution_config: &str,
) -> (Vec<&'a Project>, Vec<&'a Project>, Vec<String>) {
    let mut test_projects = Vec::new();
    let mut referred_projects: Vec<&Project> = Vec::new();
    let mut warnings = Vec::new();

    for proj in &solution.projects {
        if proj.project_type != ProjectType::Uitest {
            continue;
        }

        if proj.config_map.get(solution_config).is_none() {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            continue;
        }

        if proj.referred_project_ids.is_empty() {
            warnings.push(format!(
                "no referred projects found for test project: {}, skipping",
                proj.name
            ));
            continue;
        }

        let mut referred_count = 0;
        for referred_id in &proj.referred_project_ids {
            let referred = match solution.project_by_id(referred_id) {
                Some(p) => p,
                None => {
                    warnings.push(format!(
                        "project reference exists with project id: {}, but project not found in solution",
                        referred_id
                    ));
                    continue;
                }
            };

            if referred.project_type == ProjectType::Unknown {
                warnings.push(format!("project's ({}) project type is unknown", referred.name));
                continue;
            }

            if filter_allows(filter, referred.project_type) {
                referred_projects.push(referred);
                referred_count += 1;
            }
        }

        if referred_count == 0 {
            warnings.push(format!(
                "test project ({}) does not refer to any buildable project, skipping",
                proj.name
            ));
            continue;
        }

        test_projects.push(proj);
    }

    (test_projects, referred_projects, warnings)
}

/// NUnit test projects that expose the requested solution configuration.
pub(crate) fn buildable_nunit_projects<'a>(
    solution: &'a Solution,
    solution_config: &str,
) -> (Vec<&'a Project>, Vec<String>) {
    let mut projects = Vec::new();
    let mut warnings = Vec::new();

    for proj in &solution.projects {
        if proj.project_type != ProjectType::Nunit {
            continue;
        }

        if proj.config_map.get(solution_config).is_none() {
            warnings.push(format!(
                "project ({}) does not have config for solution config ({}), skipping",
                proj.name, solution_config
            ));
            continue;
        }

        projects.push(proj);
    }

    (projects, warnings)
}
