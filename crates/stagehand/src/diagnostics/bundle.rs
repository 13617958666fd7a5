//! Failure bundles: everything needed to investigate one failed case.
//!
//! Layout: `<base>/<yyyy-MM-dd_HH-mm-ss>/<test>/` holding `diagnostics.json`,
//! `diagnostics.md`, `failure_screenshot.png`, `hierarchy.txt`,
//! `test-results.json` and a `logs/` directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Local;
use tracing::{info, warn};

use super::DiagnosticsContext;
use crate::error::Result;

/// Inputs of one bundle.
#[derive(Debug, Clone)]
pub struct FailureBundle<'a> {
    /// Case display name.
    pub test_name: &'a str,
    /// Context of the failed run.
    pub context: Option<&'a DiagnosticsContext>,
    /// Screenshot captured by the failing check.
    pub screenshot: Option<&'a Path>,
    /// Hierarchy dump taken at failure time.
    pub hierarchy: Option<&'a str>,
    /// Latest JSON report to copy.
    pub report: Option<&'a Path>,
    /// Log files to copy.
    pub logs: &'a [PathBuf],
}

/// File-name-safe form of a test name.
pub fn sanitize(name: &str) -> String {
    let s: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if s.is_empty() { "unknown_test".into() } else { s }
}

/// Copy `src` to `dst` when it exists, logging failures.
fn copy_if_present(src: &Path, dst: &Path) {
    if !src.is_file() {
        return;
    }
    if let Err(e) = fs::copy(src, dst) {
        warn!(src = %src.display(), error = %e, "bundle_copy_failed");
    }
}

/// Write a bundle under `base` and return its directory.
pub fn write_bundle(base: &Path, bundle: &FailureBundle<'_>) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let dir = base.join(stamp).join(sanitize(bundle.test_name));
    fs::create_dir_all(&dir)?;

    if let Some(ctx) = bundle.context {
        fs::write(dir.join("diagnostics.json"), ctx.to_json()?)?;
        fs::write(dir.join("diagnostics.md"), ctx.to_markdown())?;
    }
    if let Some(shot) = bundle.screenshot {
        copy_if_present(shot, &dir.join("failure_screenshot.png"));
    }
    if let Some(text) = bundle.hierarchy {
        fs::write(dir.join("hierarchy.txt"), text)?;
    }
    if let Some(report) = bundle.report {
        copy_if_present(report, &dir.join("test-results.json"));
    }
    let present: Vec<&PathBuf> = bundle.logs.iter().filter(|p| p.is_file()).collect();
    if !present.is_empty() {
        let logs = dir.join("logs");
        fs::create_dir_all(&logs)?;
        for src in present {
            if let Some(name) = src.file_name() {
                copy_if_present(src, &logs.join(name));
            }
        }
    }
    info!(path = %dir.display(), "failure_bundle_written");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{diagnostics::Environment, input::InputMode};

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize("menu/play [Ada]"), "menu_play [Ada]");
        assert_eq!(sanitize("  "), "unknown_test");
    }

    #[test]
    fn bundle_contains_every_artifact() {
        let dir = TempDir::new().unwrap();
        let shot = dir.path().join("shot.png");
        fs::write(&shot, b"png").unwrap();
        let log = dir.path().join("game.log");
        fs::write(&log, b"log line").unwrap();
        let ctx = DiagnosticsContext::new("a/b", Environment::new("S", "1", InputMode::Polling));
        let logs = vec![log, dir.path().join("missing.log")];
        let out = write_bundle(
            &dir.path().join("bundles"),
            &FailureBundle {
                test_name: "a/b",
                context: Some(&ctx),
                screenshot: Some(&shot),
                hierarchy: Some("=== Active Scene Hierarchy ==="),
                report: None,
                logs: &logs,
            },
        )
        .unwrap();
        assert!(out.ends_with("a_b"));
        for f in ["diagnostics.json", "diagnostics.md", "failure_screenshot.png", "hierarchy.txt"] {
            assert!(out.join(f).exists(), "{f}");
        }
        assert!(!out.join("test-results.json").exists());
        assert!(out.join("logs").join("game.log").exists());
        assert!(!out.join("logs").join("missing.log").exists());
    }
}
