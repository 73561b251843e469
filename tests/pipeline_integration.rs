//! End-to-end pipeline tests
//!
//! Drives the public pipeline API against a realistic multi-project solution
//! graph with fake build tools (shell scripts) and pre-created artifact
//! files, covering:
//! - planning and execution across project types
//! - duplicate-invocation skipping
//! - artifact collection
//! - UI-test pairing of assemblies with app bundles
//! - NUnit console flag decoration

#![cfg(unix)]

use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xambuild::config::{BuildConfig, ToolPaths};
use xambuild::locator::ArtifactKind;
use xambuild::pipeline::{Pipeline, PipelineError, PlanMode};
use xambuild::planner::PlanningError;

struct Fixture {
    dir: TempDir,
    graph: PathBuf,
    call_log: PathBuf,
    tool: PathBuf,
}

impl Fixture {
    /// A solution with an iOS app, a signed Android app, two UI-test
    /// projects (both referring to the iOS app) and an NUnit project.
    /// Artifact files exist up front; the fake tool only logs its calls.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let ios_bin = root.join("ios-bin");
        let droid_bin = root.join("droid-bin");
        let test_bin = root.join("test-bin");
        let nunit_bin = root.join("nunit-bin");
        for out in [&ios_bin, &droid_bin, &test_bin, &nunit_bin] {
            fs::create_dir_all(out).unwrap();
        }
        fs::create_dir_all(ios_bin.join("App.iOS.app")).unwrap();
        fs::write(droid_bin.join("com.example.app-Signed.apk"), b"").unwrap();
        fs::write(test_bin.join("App.UITests.dll"), b"").unwrap();
        fs::write(nunit_bin.join("App.Tests.dll"), b"").unwrap();

        let manifest = root.join("AndroidManifest.xml");
        fs::write(
            &manifest,
            r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.app">
  <application android:label="App"></application>
</manifest>"#,
        )
        .unwrap();

        let graph = root.join("solution.json");
        fs::write(
            &graph,
            serde_json::to_string_pretty(&json!({
                "name": "Multiplatform",
                "path": "/work/Multiplatform.sln",
                "configs": ["Release|iPhone"],
                "projects": [
                    {
                        "id": "ios",
                        "name": "App.iOS",
                        "path": "/work/iOS/App.iOS.csproj",
                        "project_type": "ios",
                        "output_kind": "exe",
                        "assembly_name": "App.iOS",
                        "config_map": { "Release|iPhone": "Release|iPhone" },
                        "configs": {
                            "Release|iPhone": {
                                "configuration": "Release",
                                "platform": "iPhone",
                                "output_dir": ios_bin,
                                "mtouch_archs": ["x86_64"]
                            }
                        }
                    },
                    {
                        "id": "droid",
                        "name": "App.Droid",
                        "path": "/work/Droid/App.Droid.csproj",
                        "project_type": "android",
                        "output_kind": "exe",
                        "assembly_name": "App.Droid",
                        "android_application": true,
                        "manifest_path": manifest,
                        "config_map": { "Release|iPhone": "Release|AnyCPU" },
                        "configs": {
                            "Release|AnyCPU": {
                                "configuration": "Release",
                                "platform": "Any CPU",
                                "output_dir": droid_bin,
                                "sign_android": true
                            }
                        }
                    },
                    {
                        "id": "uitest",
                        "name": "App.UITests",
                        "path": "/work/UITests/App.UITests.csproj",
                        "project_type": "uitest",
                        "assembly_name": "App.UITests",
                        "config_map": { "Release|iPhone": "Release|iPhone" },
                        "configs": {
                            "Release|iPhone": {
                                "configuration": "Release",
                                "platform": "iPhone",
                                "output_dir": test_bin
                            }
                        },
                        "referred_project_ids": ["ios", "droid"]
                    },
                    {
                        "id": "uitest2",
                        "name": "App.MoreUITests",
                        "path": "/work/MoreUITests/App.MoreUITests.csproj",
                        "project_type": "uitest",
                        "assembly_name": "App.UITests",
                        "config_map": { "Release|iPhone": "Release|iPhone" },
                        "configs": {
                            "Release|iPhone": {
                                "configuration": "Release",
                                "platform": "iPhone",
                                "output_dir": test_bin
                            }
                        },
                        "referred_project_ids": ["ios"]
                    },
                    {
                        "id": "nunit",
                        "name": "App.Tests",
                        "path": "/work/Tests/App.Tests.csproj",
                        "project_type": "nunit",
                        "assembly_name": "App.Tests",
                        "config_map": { "Release|iPhone": "Release|iPhone" },
                        "configs": {
                            "Release|iPhone": {
                                "configuration": "Release",
                                "platform": "iPhone",
                                "output_dir": nunit_bin
                            }
                        }
                    }
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let call_log = root.join("calls.log");
        let tool = write_tool(root, &call_log);

        Self {
            dir,
            graph,
            call_log,
            tool,
        }
    }

    fn config(&self) -> BuildConfig {
        BuildConfig {
            solution_graph: self.graph.clone(),
            configuration: "Release".to_string(),
            platform: "iPhone".to_string(),
            archives_dir: self.dir.path().join("archives"),
            tools: ToolPaths {
                mdtool: self.tool.clone(),
                xbuild: self.tool.clone(),
                nunit_console: self.tool.clone(),
            },
            ..BuildConfig::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.call_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_tool(dir: &Path, call_log: &Path) -> PathBuf {
    let path = dir.join("fake-tool");
    fs::write(
        &path,
        format!(
            "#!/bin/sh\necho \"$* bundle=$APP_BUNDLE_PATH\" >> {}\necho done\n",
            call_log.display()
        ),
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

#[tokio::test]
async fn all_mode_builds_every_project_and_collects_artifacts() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.force_mdtool = true;
    let pipeline = Pipeline::new(config);

    let report = pipeline.run(PlanMode::All, false).await.unwrap();

    // iOS via mdtool (simulator archs, so build only), Android via xbuild.
    let calls = fixture.calls();
    assert!(calls.iter().any(|c| c.contains("build /work/Multiplatform.sln")
        && c.contains("-p:App.iOS")));
    assert!(calls
        .iter()
        .any(|c| c.contains("SignAndroidPackage") && c.contains("App.Droid.csproj")));

    let kinds: Vec<ArtifactKind> = report.artifacts.iter().map(|a| a.artifact.kind).collect();
    assert!(kinds.contains(&ArtifactKind::App));
    assert!(kinds.contains(&ArtifactKind::Apk));

    // The apk was matched by the manifest package name, not the assembly name.
    let apk = report
        .artifacts
        .iter()
        .find(|a| a.artifact.kind == ArtifactKind::Apk)
        .unwrap();
    assert!(apk.artifact.path.to_string_lossy().contains("com.example.app"));
}

#[tokio::test]
async fn test_mode_skips_duplicate_builds_and_runs_each_pairing() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.force_mdtool = true;
    let pipeline = Pipeline::new(config);

    let report = pipeline.run(PlanMode::Test, false).await.unwrap();

    // Both UI-test projects refer to App.iOS; its build runs only once.
    assert!(report.skipped_duplicates >= 1);
    let ios_builds = fixture
        .calls()
        .iter()
        .filter(|c| c.contains("-p:App.iOS"))
        .count();
    assert_eq!(ios_builds, 1);

    // uitest: iOS + Droid pairings, uitest2: iOS only.
    assert_eq!(report.test_runs, 3);

    // The app bundle reached the runner through the environment.
    assert!(fixture
        .calls()
        .iter()
        .any(|c| c.contains("App.UITests.dll") && c.contains("bundle=") && c.contains("App.iOS.app")));
    assert!(fixture
        .calls()
        .iter()
        .any(|c| c.contains("App.UITests.dll") && c.contains("com.example.app-Signed.apk")));
}

#[tokio::test]
async fn nunit_mode_decorates_console_with_result_and_filter() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.deploy_dir = Some(fixture.dir.path().join("deploy"));
    config.test_to_run = Some("LoginTests".to_string());
    let pipeline = Pipeline::new(config);

    pipeline.run(PlanMode::Nunit, false).await.unwrap();

    let calls = fixture.calls();
    // Solution build first, then the console run.
    assert!(calls[0].contains("Build /work/Multiplatform.sln"));
    let console = calls
        .iter()
        .find(|c| c.contains("App.Tests.csproj"))
        .expect("nunit console call");
    assert!(console.contains("--config=Release"));
    assert!(console.contains("deploy/TestResult.xml"));
    assert!(console.contains("--test=LoginTests"));
}

#[tokio::test]
async fn solution_mode_runs_exactly_one_build() {
    let fixture = Fixture::new();
    let pipeline = Pipeline::new(fixture.config());

    let report = pipeline.run(PlanMode::Solution, false).await.unwrap();

    assert_eq!(report.commands.len(), 1);
    assert_eq!(fixture.calls().len(), 1);
    assert!(report.artifacts.is_empty());
}

#[tokio::test]
async fn unknown_solution_configuration_fails_before_running_anything() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.platform = "iPhone 7".to_string();
    let pipeline = Pipeline::new(config);

    let result = pipeline.run(PlanMode::All, false).await;

    match result {
        Err(PipelineError::Planning(PlanningError::InvalidConfiguration { requested, .. })) => {
            assert_eq!(requested, "Release|iPhone 7");
        }
        other => panic!("expected InvalidConfiguration, got {:?}", other.map(|r| r.commands)),
    }
    assert!(fixture.calls().is_empty());
}

#[tokio::test]
async fn dry_run_prints_the_full_plan_without_touching_tools() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.force_mdtool = true;
    let pipeline = Pipeline::new(config);

    let report = pipeline.run(PlanMode::Test, false).await.unwrap();
    let executed = fixture.calls().len();
    assert!(executed > 0);
    assert!(report.test_runs > 0);

    // A second pipeline against a missing tool must still dry-run fine.
    let mut config = fixture.config();
    config.force_mdtool = true;
    config.tools = ToolPaths {
        mdtool: fixture.dir.path().join("missing"),
        xbuild: fixture.dir.path().join("missing"),
        nunit_console: fixture.dir.path().join("missing"),
    };
    let dry = Pipeline::new(config).run(PlanMode::All, true).await.unwrap();
    assert!(!dry.commands.is_empty());
    assert!(dry.artifacts.is_empty());
}
