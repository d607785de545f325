//! # Tool Path Resolver
//!
//! Locates the external engine binaries (`ffmpeg`, `ffprobe`):
//! - Explicitly configured path
//! - Bundled tools directory (`TOOLS_DIR`, or `tools/` next to the executable)
//! - System `PATH`

use crate::error::{Result, TranscodeError};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENGINE_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Tool path resolver for different deployment environments
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    /// Directory where tools are bundled
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
        }
    }

    /// Resolver that only looks in `tools_dir` and `PATH`
    pub fn with_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
        }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Ok(tools_dir) = env::var("TOOLS_DIR") {
            let tools_path = PathBuf::from(tools_dir);
            debug!("Checking TOOLS_DIR environment variable: {:?}", tools_path);
            if tools_path.is_dir() {
                return Some(tools_path);
            }
        }

        let exe_path = env::current_exe().ok()?;
        let tools_path = exe_path.parent()?.join("tools");
        debug!("Checking bundled tools path: {:?}", tools_path);
        if tools_path.is_dir() {
            return Some(tools_path);
        }

        debug!("No bundled tools directory found");
        None
    }

    fn executable_name(tool_name: &str) -> String {
        format!("{}{}", tool_name, env::consts::EXE_SUFFIX)
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        debug!("Resolving tool: {}", tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            if let Some(bundled) = self.find_bundled(tools_dir, tool_name) {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let system_path = self.find_in_system_path(tool_name);
        if let Some(ref path) = system_path {
            debug!("Using system tool: {} -> {:?}", tool_name, path);
        }
        system_path
    }

    /// Resolve a tool, preferring an explicitly configured path
    pub fn resolve_or_configured(&self, tool_name: &str, configured: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = configured {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(TranscodeError::MissingDependency(format!(
                "configured {} not found at {}",
                tool_name,
                path.display()
            )));
        }

        self.resolve_tool(tool_name)
            .ok_or_else(|| TranscodeError::MissingDependency(self.missing_message(tool_name)))
    }

    // tools/<name> or tools/<name>/<name>
    fn find_bundled(&self, tools_dir: &Path, tool_name: &str) -> Option<PathBuf> {
        let exe = Self::executable_name(tool_name);
        [tools_dir.join(&exe), tools_dir.join(tool_name).join(&exe)]
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Find tool in system PATH
    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        let exe = Self::executable_name(tool_name);
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(&exe))
            .find(|path| path.is_file())
    }

    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    pub fn ffmpeg(&self) -> Option<PathBuf> {
        self.resolve_tool("ffmpeg")
    }

    pub fn ffprobe(&self) -> Option<PathBuf> {
        self.resolve_tool("ffprobe")
    }

    fn install_instructions(tool_name: &str) -> &'static str {
        match tool_name {
            "ffmpeg" | "ffprobe" if cfg!(target_os = "linux") => "sudo apt-get install ffmpeg",
            "ffmpeg" | "ffprobe" if cfg!(target_os = "macos") => "brew install ffmpeg",
            _ => "download a build from https://ffmpeg.org/download.html",
        }
    }

    fn missing_message(&self, tool_name: &str) -> String {
        format!(
            "{} not found in bundled tools or PATH (install with: {})",
            tool_name,
            Self::install_instructions(tool_name)
        )
    }

    /// Get a report of tool availability
    pub fn tools_report(&self) -> String {
        let mut report = String::from("Tool Path Resolver Report\n");
        report.push_str(&format!("Platform: {} {}\n", env::consts::OS, env::consts::ARCH));
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));
        report.push_str("\nTool Availability:\n");

        for tool in ENGINE_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                None => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    Self::install_instructions(tool)
                )),
            }
        }

        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(ToolPathResolver::executable_name(name));
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        path
    }

    #[test]
    fn test_bundled_tool_found() {
        let dir = TempDir::new().unwrap();
        let expected = fake_tool(dir.path(), "ffmpeg");

        let resolver = ToolPathResolver::with_tools_dir(dir.path());
        assert_eq!(resolver.resolve_tool("ffmpeg"), Some(expected));
    }

    #[test]
    fn test_bundled_subfolder_layout() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("ffprobe");
        std::fs::create_dir(&sub).unwrap();
        let expected = fake_tool(&sub, "ffprobe");

        let resolver = ToolPathResolver::with_tools_dir(dir.path());
        assert_eq!(resolver.ffprobe(), Some(expected));
    }

    #[test]
    fn test_configured_path_wins_or_fails() {
        let dir = TempDir::new().unwrap();
        let configured = fake_tool(dir.path(), "my-ffmpeg");
        let resolver = ToolPathResolver::with_tools_dir(dir.path());

        assert_eq!(
            resolver.resolve_or_configured("ffmpeg", Some(&configured)).unwrap(),
            configured
        );

        let missing = dir.path().join("nope");
        let err = resolver.resolve_or_configured("ffmpeg", Some(&missing)).unwrap_err();
        assert!(matches!(err, TranscodeError::MissingDependency(_)));
    }

    #[test]
    fn test_unknown_tool_is_missing_dependency() {
        let dir = TempDir::new().unwrap();
        let resolver = ToolPathResolver::with_tools_dir(dir.path());
        let err = resolver
            .resolve_or_configured("definitely-not-a-real-tool-xyz", None)
            .unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-real-tool-xyz"));
    }

    #[test]
    fn test_report_lists_engine_tools() {
        let report = ToolPathResolver::with_tools_dir("/nonexistent").tools_report();
        assert!(report.contains("ffmpeg"));
        assert!(report.contains("ffprobe"));
    }
}
