//! In-memory model of a parsed Xamarin solution.
//!
//! The solution/project parser is an external collaborator: it hands us the
//! whole project graph as a JSON document which deserializes into [`Solution`].
//! The graph is built once per run and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project type tags recognized in a solution.
///
/// Anything the parser could not classify arrives as `Unknown` and is never
/// buildable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Ios,
    Tvos,
    Macos,
    Android,
    /// Xamarin.UITest harness project.
    Uitest,
    /// NUnit unit-test project.
    Nunit,
    #[serde(other)]
    Unknown,
}

impl ProjectType {
    /// iOS, tvOS and macOS projects share the Apple toolchain rules
    /// (mdtool/xbuild back-end selection, `exe` output requirement).
    pub fn is_apple_app(self) -> bool {
        matches!(self, ProjectType::Ios | ProjectType::Tvos | ProjectType::Macos)
    }

    pub fn is_test(self) -> bool {
        matches!(self, ProjectType::Uitest | ProjectType::Nunit)
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProjectType::Ios => "iOS",
            ProjectType::Tvos => "tvOS",
            ProjectType::Macos => "macOS",
            ProjectType::Android => "Android",
            ProjectType::Uitest => "Xamarin.UITest",
            ProjectType::Nunit => "NUnit",
            ProjectType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// What the compiler emits for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Exe,
    #[default]
    #[serde(other)]
    Library,
}

/// Concrete settings a project uses for one solution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub configuration: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Android: build a signed package.
    #[serde(default)]
    pub sign_android: bool,
    /// iOS: mtouch target architectures, e.g. `["ARMv7", "ARM64"]`.
    #[serde(default)]
    pub mtouch_archs: Vec<String>,
}

/// One project of the solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub project_type: ProjectType,
    #[serde(default)]
    pub output_kind: OutputKind,
    /// Name of the produced assembly, used by artifact filename heuristics.
    pub assembly_name: String,
    /// Android: whether this is an application project (vs a bindings/library
    /// project that happens to use the Android SDK).
    #[serde(default)]
    pub android_application: bool,
    /// Android: path to AndroidManifest.xml.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
    /// Solution configuration ("Config|Platform") to project-config key.
    #[serde(default)]
    pub config_map: std::collections::BTreeMap<String, String>,
    /// Project-config key to concrete settings.
    #[serde(default)]
    pub configs: std::collections::BTreeMap<String, ProjectConfig>,
    /// Ids of referenced projects, in reference-declaration order.
    #[serde(default)]
    pub referred_project_ids: Vec<String>,
}

impl Project {
    /// Settings for the given solution configuration, if the project maps it.
    pub fn config_for(&self, solution_config: &str) -> Option<&ProjectConfig> {
        let key = self.config_map.get(solution_config)?;
        self.configs.get(key)
    }
}

/// A parsed solution: its valid configurations plus the project graph.
///
/// Projects are kept in parser discovery order; planning order is derived
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub name: String,
    pub path: PathBuf,
    /// Valid "Configuration|Platform" strings.
    pub configs: Vec<String>,
    pub projects: Vec<Project>,
}

impl Solution {
    pub fn has_config(&self, solution_config: &str) -> bool {
        self.configs.iter().any(|c| c == solution_config)
    }

    pub fn project_by_id(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }
}

/// Builds the "Configuration|Platform" lookup key.
pub fn solution_config_key(configuration: &str, platform: &str) -> String {
    format!("{}|{}", configuration, platform)
}

/// The "build for any architecture" platform sentinel comes in two spellings.
pub fn is_any_cpu(platform: &str) -> bool {
    platform == "Any CPU" || platform == "AnyCPU"
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_key_joins_with_pipe() {
        assert_eq!(solution_config_key("Release", "iPhone"), "Release|iPhone");
    }

    #[test]
    fn any_cpu_sentinel_both_spellings() {
        assert!(is_any_cpu("Any CPU"));
        assert!(is_any_cpu("AnyCPU"));
        assert!(!is_any_cpu("iPhone"));
        assert!(!is_any_cpu(""));
    }

    #[test]
    fn unknown_project_type_from_unrecognized_tag() {
        let ty: ProjectType = serde_json::from_str("\"sharedcode\"").unwrap();
        assert_eq!(ty, ProjectType::Unknown);
    }

    #[test]
    fn solution_deserializes_from_parser_json() {
        let json = r#"{
            "name": "Multiplatform",
            "path": "/work/Multiplatform.sln",
            "configs": ["Release|iPhone", "Debug|iPhoneSimulator"],
            "projects": [{
                "id": "90F3C584-FD69-4926-9903-6B9771059EC4",
                "name": "Multiplatform.iOS",
                "path": "/work/iOS/Multiplatform.iOS.csproj",
                "project_type": "ios",
                "output_kind": "exe",
                "assembly_name": "Multiplatform.iOS",
                "config_map": { "Release|iPhone": "Release|iPhone" },
                "configs": {
                    "Release|iPhone": {
                        "configuration": "Release",
                        "platform": "iPhone",
                        "output_dir": "/work/iOS/bin/iPhone/Release",
                        "mtouch_archs": ["ARMv7", "ARM64"]
                    }
                }
            }]
        }"#;

        let solution: Solution = serde_json::from_str(json).unwrap();
        assert!(solution.has_config("Release|iPhone"));
        assert!(!solution.has_config("Release|iPhone 5"));

        let proj = solution.project_by_id("90F3C584-FD69-4926-9903-6B9771059EC4").unwrap();
        assert_eq!(proj.project_type, ProjectType::Ios);
        assert_eq!(proj.output_kind, OutputKind::Exe);

        let config = proj.config_for("Release|iPhone").unwrap();
        assert_eq!(config.mtouch_archs, vec!["ARMv7", "ARM64"]);
        assert!(proj.config_for("Debug|iPhoneSimulator").is_none());
    }
}
