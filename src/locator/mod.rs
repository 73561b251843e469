//! Artifact location.
//!
//! Build tools of this era scatter their outputs: apks under the project's
//! output directory with inconsistent naming, xcarchives under a global
//! Xcode archives directory in date-stamped folders, ipas in timestamped
//! subdirectories. Nothing reports where an artifact landed, so every lookup
//! is a glob plus ranked name heuristics (see [`candidates`]) and, where the
//! path encodes a timestamp, newest-first selection (see [`dated`]).
//!
//! Absence is not failure here: a missing artifact yields `Ok(None)` and the
//! driver decides whether that is fatal for the mode it runs in.

mod candidates;
mod dated;
mod manifest;

use crate::planner::is_architecture_archiveable;
use crate::solution::{Project, ProjectType, Solution};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("invalid artifact name pattern: {0}")]
    Pattern(#[source] regex::Error),

    #[error("invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("failed to read globbed path: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("failed to read android manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse android manifest: {0}")]
    ManifestParse(#[source] roxmltree::Error),
}

/// The artifact flavors a build can leave behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    XcArchive,
    Ipa,
    Dsym,
    App,
    Pkg,
    Apk,
    Dll,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactKind::XcArchive => "xcarchive",
            ArtifactKind::Ipa => "ipa",
            ArtifactKind::Dsym => "dSYM",
            ArtifactKind::App => "app",
            ArtifactKind::Pkg => "pkg",
            ArtifactKind::Apk => "apk",
            ArtifactKind::Dll => "dll",
        };
        write!(f, "{}", name)
    }
}

/// One located build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Artifacts of one UI-test project, plus the names of the app projects its
/// test assembly exercises.
#[derive(Debug, Default)]
pub struct TestArtifacts {
    pub assembly: Option<OutputArtifact>,
    pub referred_project_names: Vec<String>,
    pub warnings: Vec<String>,
}

/// Latest `<Assembly> ... .xcarchive` under the date-stamped Xcode archives
/// directory.
pub fn locate_latest_xcarchive(
    archives_dir: &Path,
    assembly_name: &str,
) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(archives_dir, "*/*.xcarchive")?;
    let tiers = vec![candidates::tier(format!(
        r".*/{} .*\.xcarchive",
        regex::escape(assembly_name)
    ))?];
    Ok(dated::latest_by(candidates::narrow(found, &tiers), dated::archive_stamp))
}

/// Latest ipa under the output directory, either directly or in a
/// timestamped export subdirectory.
pub fn locate_latest_ipa(
    output_dir: &Path,
    assembly_name: &str,
) -> Result<Option<PathBuf>, LocateError> {
    let mut found = candidates::glob_under(output_dir, "*.ipa")?;
    found.extend(candidates::glob_under(output_dir, "*/*.ipa")?);

    let escaped = regex::escape(assembly_name);
    let tiers = vec![
        candidates::tier(format!(r"{} .*/{}\.ipa", escaped, escaped))?,
        candidates::tier(format!(r"{}\.ipa", escaped))?,
    ];
    Ok(dated::latest_by(candidates::narrow(found, &tiers), dated::ipa_stamp))
}

pub fn locate_app_dsym(
    output_dir: &Path,
    assembly_name: &str,
) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(output_dir, "*.app.dSYM")?;
    let tiers = vec![candidates::tier(format!(
        r"{}\.app\.dSYM",
        regex::escape(assembly_name)
    ))?];
    Ok(first_of(candidates::narrow(found, &tiers)))
}

pub fn locate_app(output_dir: &Path, assembly_name: &str) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(output_dir, "*.app")?;
    let tiers = vec![candidates::tier(format!(
        r"{}\.app",
        regex::escape(assembly_name)
    ))?];
    Ok(first_of(candidates::narrow(found, &tiers)))
}

pub fn locate_pkg(output_dir: &Path, assembly_name: &str) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(output_dir, "*.pkg")?;
    let tiers = vec![candidates::tier(format!(
        r"{}.*\.pkg",
        regex::escape(assembly_name)
    ))?];
    Ok(first_of(candidates::narrow(found, &tiers)))
}

/// Apk lookup prefers the signed package over the unsigned one with the same
/// name. `name` is the manifest package name when the manifest declares one,
/// the assembly name otherwise.
pub fn locate_apk(output_dir: &Path, name: &str) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(output_dir, "*.apk")?;
    let escaped = regex::escape(name);
    let tiers = vec![
        candidates::tier(format!(r"(?i){}.*signed\.apk", escaped))?,
        candidates::tier(format!(r"(?i){}\.apk", escaped))?,
    ];
    Ok(first_of(candidates::narrow(found, &tiers)))
}

pub fn locate_dll(output_dir: &Path, assembly_name: &str) -> Result<Option<PathBuf>, LocateError> {
    let found = candidates::glob_under(output_dir, "*.dll")?;
    let tiers = vec![candidates::tier(format!(
        r"{}\.dll",
        regex::escape(assembly_name)
    ))?];
    Ok(first_of(candidates::narrow(found, &tiers)))
}

fn first_of(mut paths: Vec<PathBuf>) -> Option<PathBuf> {
    if paths.is_empty() {
        None
    } else {
        Some(paths.remove(0))
    }
}

/// Finds build outputs for built projects.
pub struct Locator {
    archives_dir: PathBuf,
}

impl Locator {
    pub fn new(archives_dir: impl Into<PathBuf>) -> Self {
        Self {
            archives_dir: archives_dir.into(),
        }
    }

    pub fn from_config(config: &crate::config::BuildConfig) -> Self {
        Self::new(config.archives_dir.clone())
    }

    /// Collects every artifact the project's type can produce for the given
    /// solution configuration. Missing artifacts are silently absent.
    pub fn collect_project_outputs(
        &self,
        proj: &Project,
        solution_config: &str,
    ) -> Result<Vec<OutputArtifact>, LocateError> {
        let config = match proj.config_for(solution_config) {
            Some(config) => config,
            None => return Ok(Vec::new()),
        };
        let output_dir = &config.output_dir;
        let assembly = proj.assembly_name.as_str();

        let mut artifacts = Vec::new();
        let mut push = |kind: ArtifactKind, path: Option<PathBuf>| {
            if let Some(path) = path {
                debug!(kind = %kind, path = %path.display(), "located artifact");
                artifacts.push(OutputArtifact { kind, path });
            }
        };

        match proj.project_type {
            ProjectType::Ios | ProjectType::Tvos => {
                if is_architecture_archiveable(&config.mtouch_archs) {
                    push(
                        ArtifactKind::XcArchive,
                        locate_latest_xcarchive(&self.archives_dir, assembly)?,
                    );
                    push(ArtifactKind::Ipa, locate_latest_ipa(output_dir, assembly)?);
                    push(ArtifactKind::Dsym, locate_app_dsym(output_dir, assembly)?);
                }
                push(ArtifactKind::App, locate_app(output_dir, assembly)?);
            }
            ProjectType::Macos => {
                push(
                    ArtifactKind::XcArchive,
                    locate_latest_xcarchive(&self.archives_dir, assembly)?,
                );
                push(ArtifactKind::App, locate_app(output_dir, assembly)?);
                push(ArtifactKind::Pkg, locate_pkg(output_dir, assembly)?);
            }
            ProjectType::Android => {
                let package = match &proj.manifest_path {
                    Some(manifest) => manifest::android_package_name(manifest)?,
                    None => None,
                };
                let name = package.as_deref().unwrap_or(assembly);
                push(ArtifactKind::Apk, locate_apk(output_dir, name)?);
            }
            ProjectType::Uitest | ProjectType::Nunit => {
                push(ArtifactKind::Dll, locate_dll(output_dir, assembly)?);
            }
            ProjectType::Unknown => {}
        }

        Ok(artifacts)
    }

    /// Collects the test assembly of a UI-test project together with the
    /// names of the projects it refers to, so the driver can pair the
    /// assembly with each referred app bundle.
    pub fn collect_test_project_outputs(
        &self,
        solution: &Solution,
        proj: &Project,
        solution_config: &str,
    ) -> Result<TestArtifacts, LocateError> {
        let mut result = TestArtifacts::default();

        let config = match proj.config_for(solution_config) {
            Some(config) => config,
            None => return Ok(result),
        };

        result.assembly = locate_dll(&config.output_dir, &proj.assembly_name)?
            .map(|path| OutputArtifact {
                kind: ArtifactKind::Dll,
                path,
            });

        for referred_id in &proj.referred_project_ids {
            match solution.project_by_id(referred_id) {
                Some(referred) => result.referred_project_names.push(referred.name.clone()),
                None => {
                    let warning = format!(
                        "project reference exists with project id: {}, but project not found in solution",
                        referred_id
                    );
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::testutil::{project, solution, with_config};
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn newest_dated_xcarchive_is_selected() {
        let archives = TempDir::new().unwrap();
        touch(&archives.path().join("2016-10-07/App.iOS 10-07-16 3.41 PM.xcarchive"));
        touch(&archives.path().join("2017-10-09/App.iOS 10-09-17 9.15 AM.xcarchive"));
        touch(&archives.path().join("2017-10-09/Other.iOS 10-09-17 9.20 AM.xcarchive"));

        let found = locate_latest_xcarchive(archives.path(), "App.iOS").unwrap().unwrap();
        assert!(found.to_string_lossy().contains("2017-10-09/App.iOS"));
    }

    #[test]
    fn ipa_in_timestamped_export_directory_is_found() {
        let out = TempDir::new().unwrap();
        touch(&out.path().join("App.iOS 2016-10-06 11-45-23/App.iOS.ipa"));
        touch(&out.path().join("App.iOS 2016-10-07 09-00-00/App.iOS.ipa"));

        let found = locate_latest_ipa(out.path(), "App.iOS").unwrap().unwrap();
        assert!(found.to_string_lossy().contains("2016-10-07"));
    }

    #[test]
    fn signed_apk_is_preferred_over_unsigned() {
        let out = TempDir::new().unwrap();
        touch(&out.path().join("com.example.app.apk"));
        touch(&out.path().join("com.example.app-Signed.apk"));

        let found = locate_apk(out.path(), "com.example.app").unwrap().unwrap();
        assert!(found.to_string_lossy().contains("Signed"));
    }

    #[test]
    fn absent_artifact_is_none_not_error() {
        let out = TempDir::new().unwrap();
        assert!(locate_app(out.path(), "App.iOS").unwrap().is_none());
        assert!(locate_latest_xcarchive(out.path(), "App.iOS").unwrap().is_none());
    }

    #[test]
    fn ios_project_without_arm_archs_yields_app_only() {
        let out = TempDir::new().unwrap();
        touch(&out.path().join("App.iOS.app"));
        touch(&out.path().join("App.iOS 2016-10-06 11-45-23/App.iOS.ipa"));

        let mut ios = with_config(project("ios", "App.iOS", ProjectType::Ios), "Debug|iPhoneSimulator");
        {
            let config = ios.configs.get_mut("Debug|iPhoneSimulator").unwrap();
            config.output_dir = out.path().to_path_buf();
            config.mtouch_archs = vec!["x86_64".to_string()];
        }

        let archives = TempDir::new().unwrap();
        let artifacts = Locator::new(archives.path())
            .collect_project_outputs(&ios, "Debug|iPhoneSimulator")
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ArtifactKind::App);
    }

    #[test]
    fn android_project_uses_manifest_package_name() {
        let out = TempDir::new().unwrap();
        touch(&out.path().join("com.example.app-Signed.apk"));
        let manifest = out.path().join("AndroidManifest.xml");
        fs::write(&manifest, r#"<manifest package="com.example.app"><application /></manifest>"#)
            .unwrap();

        let mut droid = with_config(project("droid", "App.Droid", ProjectType::Android), "Release|Any CPU");
        droid.manifest_path = Some(manifest);
        droid.configs.get_mut("Release|Any CPU").unwrap().output_dir = out.path().to_path_buf();

        let archives = TempDir::new().unwrap();
        let artifacts = Locator::new(archives.path())
            .collect_project_outputs(&droid, "Release|Any CPU")
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ArtifactKind::Apk);
        assert!(artifacts[0].path.to_string_lossy().contains("com.example.app"));
    }

    #[test]
    fn test_project_outputs_pair_assembly_with_referred_names() {
        let out = TempDir::new().unwrap();
        touch(&out.path().join("App.UITests.dll"));

        let ios = with_config(project("ios", "App.iOS", ProjectType::Ios), "Release|iPhone");
        let mut uitest = with_config(project("uitest", "App.UITests", ProjectType::Uitest), "Release|iPhone");
        uitest.referred_project_ids = vec!["ios".to_string(), "ghost".to_string()];
        uitest.configs.get_mut("Release|iPhone").unwrap().output_dir = out.path().to_path_buf();
        let solution = solution(vec![ios, uitest.clone()]);

        let archives = TempDir::new().unwrap();
        let outputs = Locator::new(archives.path())
            .collect_test_project_outputs(&solution, &uitest, "Release|iPhone")
            .unwrap();

        assert_eq!(outputs.assembly.as_ref().unwrap().kind, ArtifactKind::Dll);
        assert_eq!(outputs.referred_project_names, vec!["App.iOS".to_string()]);
        assert!(outputs.warnings.iter().any(|w| w.contains("ghost")));
    }
}
