//! The single failure overlay.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{host::Host, ui::UiSurface};

/// Overlay bookkeeping shared with owner-thread jobs.
#[derive(Debug, Default)]
struct OverlayState {
    /// Text of the overlay currently on screen.
    shown: Option<String>,
    /// Overlays built since startup.
    created: usize,
}

/// Full-screen failure overlay. At most one exists; while it is up, further
/// failures leave the first message on screen.
#[derive(Clone)]
pub struct FailureOverlay {
    /// Owning-thread bridge.
    host: Host,
    /// Surface that renders the overlay.
    ui: Arc<dyn UiSurface>,
    /// Shared state.
    state: Arc<Mutex<OverlayState>>,
}

/// Overlay text for a failure message and optional screenshot path.
pub fn overlay_text(message: &str, screenshot: Option<&str>) -> String {
    match screenshot {
        Some(path) => format!("Test Assertion Failed\n{message}\nScreenshot: {path}"),
        None => format!("Test Assertion Failed\n{message}"),
    }
}

impl FailureOverlay {
    /// Build an overlay manager over `ui`.
    pub fn new(host: Host, ui: Arc<dyn UiSurface>) -> Self {
        Self {
            host,
            ui,
            state: Arc::new(Mutex::new(OverlayState::default())),
        }
    }

    /// Show `text` unless an overlay is already up. Runs on the owning thread.
    pub fn show(&self, text: String) {
        let ui = self.ui.clone();
        let state = self.state.clone();
        self.host.run_on_owner(move || {
            let mut st = state.lock();
            if st.shown.is_some() {
                debug!("failure_overlay_already_shown");
                return;
            }
            ui.show_overlay(&text);
            st.shown = Some(text);
            st.created += 1;
        });
    }

    /// Remove the overlay. Runs on the owning thread.
    pub fn hide(&self) {
        let ui = self.ui.clone();
        let state = self.state.clone();
        self.host.run_on_owner(move || {
            if state.lock().shown.take().is_some() {
                ui.hide_overlay();
            }
        });
    }

    /// Whether an overlay is up.
    pub fn is_shown(&self) -> bool {
        self.state.lock().shown.is_some()
    }

    /// Text of the overlay on screen.
    pub fn text(&self) -> Option<String> {
        self.state.lock().shown.clone()
    }

    /// Number of overlays built so far.
    pub fn instances_created(&self) -> usize {
        self.state.lock().created
    }
}
