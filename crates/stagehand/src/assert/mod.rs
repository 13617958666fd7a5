//! Checks that fail loudly.
//!
//! Every failing check goes through [`Asserter::fail`], which captures a
//! screenshot, shows the failure overlay, freezes simulated time and returns
//! a [`Failure::Assertion`]. Test code propagates it with `?`.

use std::{
    borrow::Cow,
    fmt::Debug,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::Local;
use tracing::{info, warn};

use crate::{
    error::{Failure, FailureKind, Outcome},
    host::Host,
    ui::{ElementId, Substrate, active_in_hierarchy, all_elements, find, panel},
};

pub mod logs;
pub mod overlay;
pub mod visual;

pub use logs::LogAssert;
pub use overlay::FailureOverlay;
use overlay::overlay_text;
pub use visual::{BaselineCheck, BaselineStore};

/// Message used when a check supplies none.
pub const DEFAULT_MESSAGE: &str = "Assertion failed.";

/// The failure path shared by every check.
pub struct Asserter {
    /// Clock whose time scale is frozen on failure.
    host: Host,
    /// Capture, UI and asset capabilities.
    substrate: Substrate,
    /// The single failure overlay.
    overlay: FailureOverlay,
    /// Where failure screenshots go.
    failures_dir: PathBuf,
    /// Visual baselines.
    baselines: BaselineStore,
    /// Failures raised since startup.
    failures: AtomicUsize,
}

/// `message` or the fallback.
fn or<'m>(message: Option<&'m str>, fallback: impl FnOnce() -> String) -> Cow<'m, str> {
    match message {
        Some(m) => m.into(),
        None => fallback().into(),
    }
}

impl Asserter {
    /// Build the failure path.
    pub fn new(host: Host, substrate: Substrate, failures_dir: PathBuf, baselines: BaselineStore) -> Self {
        let overlay = FailureOverlay::new(host.clone(), substrate.ui.clone());
        Self {
            host,
            substrate,
            overlay,
            failures_dir,
            baselines,
            failures: AtomicUsize::new(0),
        }
    }

    /// The overlay manager.
    pub fn overlay(&self) -> &FailureOverlay {
        &self.overlay
    }

    /// Baseline storage.
    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    /// Failures raised since startup.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Capture the screen into the failures directory. Problems are logged and
    /// yield `None`.
    pub fn capture_screenshot(&self) -> Option<PathBuf> {
        let img = match self.substrate.capture.capture() {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "failure_screenshot_capture_failed");
                return None;
            }
        };
        let path = unique_path(&self.failures_dir, &Local::now().format("%Y%m%d_%H%M%S").to_string());
        match visual::save(&path, &img) {
            Ok(()) => {
                info!(path = %path.display(), "failure_screenshot_captured");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failure_screenshot_write_failed");
                None
            }
        }
    }

    /// Raise a failure: screenshot, overlay, freeze, then the failure value.
    pub fn fail(&self, message: &str) -> Failure {
        let message = if message.is_empty() {
            DEFAULT_MESSAGE
        } else {
            message
        };
        let screenshot = self.capture_screenshot();
        let shown = screenshot.as_ref().map(|p| p.display().to_string());
        self.overlay.show(overlay_text(message, shown.as_deref()));
        self.host.set_time_scale(0.0);
        self.failures.fetch_add(1, Ordering::SeqCst);
        let composed = match &shown {
            Some(path) => format!("{message} (Screenshot: {path})"),
            None => message.to_string(),
        };
        warn!(message = %composed, "assertion_failed");
        Failure::Assertion {
            message: composed,
            screenshot,
        }
    }

    /// Fail unless `condition` holds.
    pub fn check(&self, condition: bool, message: &str) -> Outcome<()> {
        if condition { Ok(()) } else { Err(self.fail(message)) }
    }

    /// Fail unless `condition` is true.
    pub fn is_true(&self, condition: bool, message: Option<&str>) -> Outcome<()> {
        self.check(condition, message.unwrap_or("Expected condition to be true."))
    }

    /// Fail unless `condition` is false.
    pub fn is_false(&self, condition: bool, message: Option<&str>) -> Outcome<()> {
        self.check(!condition, message.unwrap_or("Expected condition to be false."))
    }

    /// Fail unless `expected == actual`.
    pub fn are_equal<T: PartialEq + Debug>(&self, expected: T, actual: T, message: Option<&str>) -> Outcome<()> {
        if expected == actual {
            return Ok(());
        }
        Err(self.fail(&or(message, || format!("Expected: {expected:?}, Actual: {actual:?}"))))
    }

    /// Fail unless `value` is `None`.
    pub fn is_none<T: Debug>(&self, value: Option<T>, message: Option<&str>) -> Outcome<()> {
        match value {
            None => Ok(()),
            Some(v) => Err(self.fail(&or(message, || format!("Expected none but was {v:?}")))),
        }
    }

    /// Fail unless `value` is `Some`.
    pub fn is_some<T>(&self, value: Option<T>, message: Option<&str>) -> Outcome<()> {
        self.check(value.is_some(), message.unwrap_or("Expected a value"))
    }

    /// Fail unless `value > threshold`.
    pub fn greater<T: PartialOrd + Debug>(&self, value: T, threshold: T, message: Option<&str>) -> Outcome<()> {
        if value > threshold {
            return Ok(());
        }
        Err(self.fail(&or(message, || format!("Expected {value:?} > {threshold:?}"))))
    }

    /// Fail unless `value < threshold`.
    pub fn less<T: PartialOrd + Debug>(&self, value: T, threshold: T, message: Option<&str>) -> Outcome<()> {
        if value < threshold {
            return Ok(());
        }
        Err(self.fail(&or(message, || format!("Expected {value:?} < {threshold:?}"))))
    }

    /// Fail unless `min <= value <= max`.
    pub fn in_range<T: PartialOrd + Debug>(&self, value: T, min: T, max: T, message: Option<&str>) -> Outcome<()> {
        if value >= min && value <= max {
            return Ok(());
        }
        Err(self.fail(&or(message, || format!("{value:?} not in range [{min:?}, {max:?}]"))))
    }

    /// Fail unless `haystack` contains `needle`.
    pub fn contains(&self, haystack: &str, needle: &str, message: Option<&str>) -> Outcome<()> {
        if haystack.contains(needle) {
            return Ok(());
        }
        Err(self.fail(&or(message, || format!("'{haystack}' does not contain '{needle}'"))))
    }

    /// Fail unless `result` failed with a failure of `expected` kind.
    pub fn raises<T>(&self, expected: FailureKind, result: Outcome<T>, message: Option<&str>) -> Outcome<()> {
        match result {
            Err(f) if f.kind() == expected => Ok(()),
            Err(f) => Err(self.fail(&or(message, || {
                format!("Expected {expected:?} but got {:?}", f.kind())
            }))),
            Ok(_) => Err(self.fail(&or(message, || format!("Expected {expected:?} to be raised")))),
        }
    }

    /// Fail unless `check` succeeds; its error becomes the detail.
    pub fn state_matches<F>(&self, check: F, message: Option<&str>) -> Outcome<()>
    where
        F: FnOnce() -> Result<(), String>,
    {
        match check() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(&or(message, || format!("Game state validation failed: {e}")))),
        }
    }

    /// Fail unless the element is active and not hidden by a transparent
    /// group.
    pub fn is_visible(&self, id: ElementId, message: Option<&str>) -> Outcome<()> {
        let ui = self.substrate.ui.as_ref();
        let name = ui.element(id).map_or_else(|| id.to_string(), |e| e.name);
        self.check(
            panel::is_visible(ui, id),
            &or(message, || format!("Expected '{name}' to be visible")),
        )
    }

    /// Look up an element by name and fail unless it is visible.
    pub fn screen_element_visible(&self, name: &str, message: Option<&str>) -> Outcome<()> {
        match find::find_by_name(self.substrate.ui.as_ref(), name) {
            Some(id) => self.is_visible(id, message),
            None => Err(self.fail(&or(message, || {
                format!("Could not find element with name '{name}'.")
            }))),
        }
    }

    /// Fail unless the element displays `sprite`.
    pub fn has_sprite(&self, id: ElementId, sprite: &str, message: Option<&str>) -> Outcome<()> {
        let actual = self.substrate.ui.element(id).and_then(|e| e.sprite);
        if actual.as_deref() == Some(sprite) {
            return Ok(());
        }
        Err(self.fail(&or(message, || {
            format!("Expected sprite '{sprite}' but found {actual:?}")
        })))
    }

    /// Fail unless the named asset is loaded.
    pub fn asset_loaded(&self, asset: &str, message: Option<&str>) -> Outcome<()> {
        self.check(
            self.substrate.assets.is_loaded(asset),
            &or(message, || format!("Failed to load asset at path '{asset}'.")),
        )
    }

    /// Fail when an active element references an asset that did not resolve.
    pub fn no_missing_assets(&self, message: Option<&str>) -> Outcome<()> {
        let ui = self.substrate.ui.as_ref();
        let broken: Vec<String> = all_elements(ui)
            .into_iter()
            .filter(|e| e.missing_asset && active_in_hierarchy(ui, e.id))
            .map(|e| e.name)
            .collect();
        if broken.is_empty() {
            return Ok(());
        }
        Err(self.fail(&or(message, || {
            format!("Found {} object(s) with missing assets: {}", broken.len(), broken.join(", "))
        })))
    }

    /// Capture the screen and compare it with the named baseline.
    ///
    /// A missing baseline is created from the capture and passes.
    pub fn visual_state_matches(&self, name: &str, message: Option<&str>) -> Outcome<()> {
        let img = self.substrate.capture.capture()?;
        let res = self.baselines.check(name, &img)?;
        match res {
            BaselineCheck::Mismatched { difference, .. } => Err(self.fail(&or(message, || {
                format!(
                    "Visual state '{name}' does not match baseline (difference {:.2}%, tolerance {:.2}%)",
                    difference * 100.0,
                    self.baselines.tolerance() * 100.0
                )
            }))),
            _ => Ok(()),
        }
    }
}

/// `<dir>/<stem>.png`, or `<stem>_<n>.png` when that exists.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.png"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.png")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
