//! Build invocation values.
//!
//! A [`BuildInvocation`] is an immutable description of one external tool
//! call. Structural equality is the deduplication key: two invocations with
//! identical fields would run the identical command, so the second one is
//! skipped by the driver.

use crate::config::ToolPaths;
use crate::solution::is_any_cpu;
use std::path::PathBuf;

/// Which external tool an invocation drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// IDE-driven back-end (Xamarin Studio's mdtool). Known to hang while
    /// loading projects, so it is the only diagnostic-mode candidate.
    MdTool,
    /// Project-file-driven back-end (xbuild/msbuild).
    XBuild,
    /// NUnit 3 console runner.
    NunitConsole,
}

impl ToolKind {
    pub fn program<'a>(self, tools: &'a ToolPaths) -> &'a PathBuf {
        match self {
            ToolKind::MdTool => &tools.mdtool,
            ToolKind::XBuild => &tools.xbuild,
            ToolKind::NunitConsole => &tools.nunit_console,
        }
    }
}

/// One external tool call, comparable without being executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildInvocation {
    pub tool: ToolKind,
    /// Build target, e.g. "build", "archive", "SignAndroidPackage".
    pub target: Option<String>,
    /// Solution path, or the project path for project-scoped tools.
    pub path: PathBuf,
    pub configuration: String,
    pub platform: Option<String>,
    /// Project selector inside the solution (`-p:` flag).
    pub project_name: Option<String>,
    /// Tool-specific flags appended verbatim.
    pub extra_flags: Vec<String>,
}

impl BuildInvocation {
    pub fn new(tool: ToolKind, path: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            target: None,
            path: path.into(),
            configuration: String::new(),
            platform: None,
            project_name: None,
            extra_flags: Vec::new(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = configuration.into();
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.extra_flags.push(flag.into());
        self
    }

    /// Whether hang detection applies to this tool.
    pub fn supports_diagnostic_mode(&self) -> bool {
        self.tool == ToolKind::MdTool
    }

    /// Renders the argument vector, without the program itself.
    ///
    /// Build back-ends follow the shape
    /// `<target> <path> -c:<configuration>[|<platform>] [-p:<project>] [flags]`;
    /// the platform suffix is dropped when empty or the Any CPU sentinel.
    pub fn args(&self) -> Vec<String> {
        match self.tool {
            ToolKind::MdTool | ToolKind::XBuild => self.build_tool_args(),
            ToolKind::NunitConsole => self.nunit_args(),
        }
    }

    fn build_tool_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(target) = &self.target {
            args.push(target.clone());
        }

        args.push(self.path.to_string_lossy().into_owned());

        let mut config = self.configuration.clone();
        if let Some(platform) = &self.platform {
            if !platform.is_empty() && !is_any_cpu(platform) {
                config.push('|');
                config.push_str(platform);
            }
        }
        if !config.is_empty() {
            args.push(format!("-c:{}", config));
        }

        if let Some(project) = &self.project_name {
            args.push(format!("-p:{}", project));
        }

        args.extend(self.extra_flags.iter().cloned());
        args
    }

    fn nunit_args(&self) -> Vec<String> {
        let mut args = vec![self.path.to_string_lossy().into_owned()];
        if !self.configuration.is_empty() {
            args.push(format!("--config={}", self.configuration));
        }
        args.extend(self.extra_flags.iter().cloned());
        args
    }

    /// Full command line for operator-facing logs.
    pub fn printable(&self, tools: &ToolPaths) -> String {
        let mut parts = vec![self.tool.program(tools).to_string_lossy().into_owned()];
        parts.extend(self.args());
        parts
            .into_iter()
            .map(|p| {
                if p.contains(' ') {
                    format!("\"{}\"", p)
                } else {
                    p
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
