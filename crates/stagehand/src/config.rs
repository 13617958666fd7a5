//! Configuration constants and the loadable harness configuration.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use keysym::LegacyKey;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Harness-wide tunables.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    /// Deadline armed for every test case, in seconds.
    pub case_timeout_secs: f64,
    /// Extra body attempts after the first failure.
    pub max_retries: u32,
    /// Cadence of the frame driver in milliseconds.
    pub frame_interval_ms: u64,
    /// Timeout for `wait_for_loading_complete`, in seconds.
    pub loading_timeout_secs: f64,
    /// Interval between visual health scans, in seconds.
    pub health_interval_secs: f64,
    /// Maximum depth of hierarchy dumps.
    pub hierarchy_depth: usize,
    /// Label text longer than this is truncated in hierarchy dumps.
    pub hierarchy_text_len: usize,
    /// Allowed fraction of differing pixels for baseline comparisons.
    pub baseline_tolerance: f64,
}

/// Default harness tunables.
pub const DEFAULTS: Defaults = Defaults {
    case_timeout_secs: 120.0,
    max_retries: 0,
    frame_interval_ms: 16,
    loading_timeout_secs: 30.0,
    health_interval_secs: 1.0,
    hierarchy_depth: 15,
    hierarchy_text_len: 20,
    baseline_tolerance: 0.05,
};

/// Gesture timing constants, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct GestureTimings {
    /// Contact time of a tap.
    pub tap_secs: f64,
    /// Contact time of a long press.
    pub long_press_secs: f64,
    /// Duration of a swipe.
    pub swipe_secs: f64,
    /// Duration of a pinch.
    pub pinch_secs: f64,
    /// Default delay between the clicks of a double click.
    pub double_click_delay_secs: f64,
    /// Lower bound applied to double-click delays.
    pub double_click_min_secs: f64,
    /// Upper bound applied to double-click delays.
    pub double_click_max_secs: f64,
    /// Delay between typed characters.
    pub typing_delay_secs: f64,
}

/// Default gesture timings.
pub const GESTURES: GestureTimings = GestureTimings {
    tap_secs: 0.1,
    long_press_secs: 1.0,
    swipe_secs: 0.3,
    pinch_secs: 0.5,
    double_click_delay_secs: 0.05,
    double_click_min_secs: 0.01,
    double_click_max_secs: 0.1,
    typing_delay_secs: 0.05,
};

/// File name of the default JSON report inside the reports directory.
pub const REPORT_FILE: &str = "test-results.json";
/// File stem of the diagnostics snapshot inside the reports directory.
pub const CONTEXT_FILE_STEM: &str = "current-test-context";

/// How scroll containers are nudged until a target is visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollPolicy {
    /// Change of the normalized scroll position per tick.
    pub step: f32,
    /// Give up (and click anyway) after this many seconds.
    pub timeout_secs: f64,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            step: 0.1,
            timeout_secs: 5.0,
        }
    }
}

/// Which keyboard backend to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendChoice {
    /// Probe the available devices; the event queue wins when present.
    #[default]
    Auto,
    /// Force the state-polling backend.
    Polling,
    /// Force the event-queue backend.
    EventQueue,
}

/// Harness configuration, loadable from a RON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root directory for reports, screenshots and bundles.
    pub reports_dir: PathBuf,
    /// Override for the JSON report location.
    pub report_path: Option<PathBuf>,
    /// Per-case deadline, in seconds.
    pub case_timeout_secs: f64,
    /// Extra body attempts after a retryable failure.
    pub max_retries: u32,
    /// Keyboard backend selection.
    pub input_backend: BackendChoice,
    /// Key spec of the interactive run hotkey.
    pub hotkey: String,
    /// Frame driver cadence in milliseconds.
    pub frame_interval_ms: u64,
    /// Scroll-into-view policy.
    pub scroll: ScrollPolicy,
    /// Include the asset-index discovery source.
    pub authoring: bool,
    /// Write a failure bundle for every failed case.
    pub failure_bundles: bool,
    /// Host log files copied into failure bundles.
    pub log_files: Vec<PathBuf>,
    /// Application version recorded in diagnostics.
    pub app_version: String,
    /// Exit after a command-line triggered run.
    pub quit_on_finish: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("test-reports"),
            report_path: None,
            case_timeout_secs: DEFAULTS.case_timeout_secs,
            max_retries: DEFAULTS.max_retries,
            input_backend: BackendChoice::Auto,
            hotkey: "f9".to_string(),
            frame_interval_ms: DEFAULTS.frame_interval_ms,
            scroll: ScrollPolicy::default(),
            authoring: false,
            failure_bundles: false,
            log_files: Vec::new(),
            app_version: "0.0.0".to_string(),
            quit_on_finish: false,
        }
    }
}

impl HarnessConfig {
    /// Load a configuration from a RON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a RON document.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        ron::from_str(text).map_err(|e| e.to_string())
    }

    /// Location of the default JSON report.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.reports_dir.join(REPORT_FILE))
    }

    /// Directory for assertion screenshots.
    pub fn failures_dir(&self) -> PathBuf {
        self.reports_dir.join("failures")
    }

    /// Directory holding visual baselines.
    pub fn baselines_dir(&self) -> PathBuf {
        self.reports_dir.join("baselines")
    }

    /// Directory receiving captures that did not match their baseline.
    pub fn mismatches_dir(&self) -> PathBuf {
        self.reports_dir.join("test-failures")
    }

    /// Per-case deadline.
    pub fn case_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.case_timeout_secs.max(0.0))
    }

    /// Frame driver cadence.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Parsed run hotkey.
    pub fn hotkey_key(&self) -> Result<LegacyKey> {
        LegacyKey::from_spec(&self.hotkey)
            .ok_or_else(|| Error::InvalidState(format!("unknown hotkey spec: {}", self.hotkey)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = HarnessConfig::parse("()").unwrap();
        assert_eq!(cfg, HarnessConfig::default());
        assert_eq!(cfg.case_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.report_path(), PathBuf::from("test-reports/test-results.json"));
    }

    #[test]
    fn partial_document_overrides_fields() {
        let cfg = HarnessConfig::parse(
            r#"(max_retries: 2, input_backend: Polling, scroll: (step: 0.25), hotkey: "f5")"#,
        )
        .unwrap();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.input_backend, BackendChoice::Polling);
        assert_eq!(cfg.scroll.step, 0.25);
        assert_eq!(cfg.scroll.timeout_secs, 5.0);
        assert_eq!(cfg.hotkey_key().unwrap(), LegacyKey::F5);
    }

    #[test]
    fn bad_document_is_an_error() {
        assert!(HarnessConfig::parse("(max_retries: \"many\")").is_err());
    }
}
