//! What the running test is doing right now.
//!
//! The [`DiagnosticsTracker`] holds one [`DiagnosticsContext`] per active test.
//! Every mutation rewrites a JSON and a Markdown snapshot next to the reports,
//! so a hung or crashed run still leaves its last known state on disk. Only
//! the case runner begins and ends contexts.

use std::{
    env,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::CONTEXT_FILE_STEM, error::Result, input::InputMode};

pub mod bundle;

pub use bundle::{FailureBundle, write_bundle};

/// Where the test runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Active scene.
    pub scene: String,
    /// Version of the application under test.
    pub app_version: String,
    /// Version of this harness.
    pub harness_version: String,
    /// Operating system.
    pub platform: String,
    /// Keyboard backend in use.
    pub input_mode: InputMode,
}

impl Environment {
    /// Describe the current environment.
    pub fn new(scene: impl Into<String>, app_version: impl Into<String>, input_mode: InputMode) -> Self {
        Self {
            scene: scene.into(),
            app_version: app_version.into(),
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: env::consts::OS.to_string(),
            input_mode,
        }
    }
}

/// An application event worth remembering, e.g. a placement attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Event kind.
    pub kind: String,
    /// Free-form detail.
    pub detail: String,
    /// When it happened.
    pub at: DateTime<Local>,
}

/// State of one test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsContext {
    /// Display name of the case.
    pub test_name: String,
    /// Unique id of this run.
    pub test_id: Uuid,
    /// When the case started.
    pub start_time: DateTime<Local>,
    /// When the case finished.
    pub end_time: Option<DateTime<Local>>,
    /// Where it ran.
    pub environment: Environment,
    /// Last step or gesture.
    pub last_action: Option<String>,
    /// Last panel the test looked at.
    pub last_panel: Option<String>,
    /// Last recorded domain event.
    pub last_event: Option<DomainEvent>,
}

impl DiagnosticsContext {
    /// Fresh context for `test_name`.
    pub fn new(test_name: impl Into<String>, environment: Environment) -> Self {
        Self {
            test_name: test_name.into(),
            test_id: Uuid::new_v4(),
            start_time: Local::now(),
            end_time: None,
            environment,
            last_action: None,
            last_panel: None,
            last_event: None,
        }
    }

    /// Seconds between start and end (or now when still running).
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Local::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable Markdown.
    pub fn to_markdown(&self) -> String {
        let na = "N/A";
        let ts = |t: &DateTime<Local>| t.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut out = String::new();
        let _ignored = writeln!(out, "# Test Run Context\n");
        let _ignored = writeln!(out, "## Test Information");
        let _ignored = writeln!(out, "- **Test Name**: {}", self.test_name);
        let _ignored = writeln!(out, "- **Test ID**: {}", self.test_id);
        let _ignored = writeln!(out, "- **Start Time**: {}", ts(&self.start_time));
        let _ignored = writeln!(
            out,
            "- **End Time**: {}",
            self.end_time.as_ref().map_or_else(|| na.to_string(), ts)
        );
        let _ignored = writeln!(out, "- **Duration**: {:.2}s\n", self.duration_secs());
        let env = &self.environment;
        let _ignored = writeln!(out, "## Environment");
        let _ignored = writeln!(out, "- **Scene**: {}", env.scene);
        let _ignored = writeln!(out, "- **App Version**: {}", env.app_version);
        let _ignored = writeln!(out, "- **Harness Version**: {}", env.harness_version);
        let _ignored = writeln!(out, "- **Platform**: {}", env.platform);
        let _ignored = writeln!(out, "- **Input Mode**: {}\n", env.input_mode);
        let _ignored = writeln!(out, "## Test State");
        let _ignored = writeln!(out, "- **Last Action**: {}", self.last_action.as_deref().unwrap_or(na));
        let _ignored = writeln!(out, "- **Last Panel**: {}", self.last_panel.as_deref().unwrap_or(na));
        if let Some(ev) = &self.last_event {
            let _ignored = writeln!(out, "\n## Last Event");
            let _ignored = writeln!(out, "- **Kind**: {}", ev.kind);
            let _ignored = writeln!(out, "- **Detail**: {}", ev.detail);
            let _ignored = writeln!(out, "- **At**: {}", ts(&ev.at));
        }
        out
    }
}

/// Holder of the current context.
pub struct DiagnosticsTracker {
    /// Directory for the snapshot files; `None` disables them.
    dir: Option<PathBuf>,
    /// The active context.
    current: Mutex<Option<DiagnosticsContext>>,
}

impl DiagnosticsTracker {
    /// Track contexts, snapshotting into `dir` when given.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            current: Mutex::new(None),
        }
    }

    /// Paths of the JSON and Markdown snapshots.
    pub fn snapshot_paths(&self) -> Option<(PathBuf, PathBuf)> {
        self.dir.as_ref().map(|d| {
            (
                d.join(format!("{CONTEXT_FILE_STEM}.json")),
                d.join(format!("{CONTEXT_FILE_STEM}.md")),
            )
        })
    }

    /// Copy of the active context.
    pub fn current(&self) -> Option<DiagnosticsContext> {
        self.current.lock().clone()
    }

    /// Start a context for `test_name`, replacing any active one.
    pub(crate) fn begin_test(&self, test_name: &str, environment: Environment) -> Uuid {
        let ctx = DiagnosticsContext::new(test_name, environment);
        let id = ctx.test_id;
        let replaced = self.current.lock().replace(ctx.clone());
        if let Some(old) = replaced {
            warn!(old = %old.test_name, new = test_name, "diagnostics_context_replaced");
        }
        self.persist(&ctx);
        id
    }

    /// Stamp the end time, clear the context and return it.
    pub(crate) fn end_test(&self) -> Option<DiagnosticsContext> {
        let mut ctx = self.current.lock().take()?;
        ctx.end_time = Some(Local::now());
        self.persist(&ctx);
        Some(ctx)
    }

    /// Apply `f` to the active context and snapshot it.
    fn update(&self, f: impl FnOnce(&mut DiagnosticsContext)) {
        let snapshot = {
            let mut guard = self.current.lock();
            let Some(ctx) = guard.as_mut() else {
                return;
            };
            f(ctx);
            ctx.clone()
        };
        self.persist(&snapshot);
    }

    /// Record the last action.
    pub fn update_action(&self, action: &str) {
        self.update(|c| c.last_action = Some(action.to_string()));
    }

    /// Record the last panel.
    pub fn update_panel(&self, panel: &str) {
        self.update(|c| c.last_panel = Some(panel.to_string()));
    }

    /// Record a domain event.
    pub fn record_event(&self, kind: &str, detail: &str) {
        self.update(|c| {
            c.last_event = Some(DomainEvent {
                kind: kind.to_string(),
                detail: detail.to_string(),
                at: Local::now(),
            });
        });
    }

    /// Best-effort snapshot write.
    fn persist(&self, ctx: &DiagnosticsContext) {
        let Some((json, md)) = self.snapshot_paths() else {
            return;
        };
        if let Err(e) = write_snapshot(&json, &md, ctx) {
            warn!(error = %e, "diagnostics_snapshot_failed");
        } else {
            debug!(path = %json.display(), "diagnostics_snapshot_written");
        }
    }
}

/// Write both snapshot files.
fn write_snapshot(json: &Path, md: &Path, ctx: &DiagnosticsContext) -> Result<()> {
    if let Some(parent) = json.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(json, ctx.to_json()?)?;
    fs::write(md, ctx.to_markdown())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn env() -> Environment {
        Environment::new("Menu", "1.2.3", InputMode::EventQueue)
    }

    #[test]
    fn mutations_are_snapshotted() {
        let dir = TempDir::new().unwrap();
        let t = DiagnosticsTracker::new(Some(dir.path().to_path_buf()));
        t.update_action("ignored without a test");
        assert!(t.current().is_none());
        t.begin_test("menu.play", env());
        t.update_action("click Play");
        t.update_panel("MainMenu");
        t.record_event("placement", "tower at 3,4: ok");
        let (json, md) = t.snapshot_paths().unwrap();
        let text = fs::read_to_string(&json).unwrap();
        let parsed: DiagnosticsContext = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.last_action.as_deref(), Some("click Play"));
        assert!(text.contains("\"testName\": \"menu.play\""));
        let md = fs::read_to_string(md).unwrap();
        assert!(md.starts_with("# Test Run Context"));
        assert!(md.contains("- **Last Panel**: MainMenu"));
        assert!(md.contains("- **Input Mode**: event-queue"));
    }

    #[test]
    fn end_stamps_and_clears() {
        let t = DiagnosticsTracker::new(None);
        let id = t.begin_test("a", env());
        let ended = t.end_test().unwrap();
        assert_eq!(ended.test_id, id);
        assert!(ended.end_time.is_some());
        assert!(t.current().is_none());
        assert!(t.end_test().is_none());
    }

    #[test]
    fn ids_are_unique() {
        let a = DiagnosticsContext::new("a", env());
        let b = DiagnosticsContext::new("a", env());
        assert_ne!(a.test_id, b.test_id);
    }
}
