//! The handle test code receives.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    assert::{Asserter, LogAssert},
    config::DEFAULTS,
    diagnostics::DiagnosticsTracker,
    error::{Failure, Outcome},
    events::EventTracker,
    harness::Harness,
    input::{Keys, TextInput},
    pointer::{Pointer, Touch},
    ui::{
        ElementId, UiSurface, find, hierarchy,
        panel::{self, PanelState},
    },
    wait::Waiter,
};

/// Runtime state plus the token of the scope a test body runs in.
#[derive(Clone)]
pub struct Tester {
    /// Runtime state.
    harness: Arc<Harness>,
    /// Scope token checked at every suspension point.
    token: CancellationToken,
}

impl Tester {
    /// Bind `harness` to a scope token.
    pub fn new(harness: Arc<Harness>, token: CancellationToken) -> Self {
        Self { harness, token }
    }

    /// Bind `harness` to the token of the scope it is currently executing.
    pub fn current(harness: Arc<Harness>) -> Self {
        let token = harness.current_token();
        Self { harness, token }
    }

    /// Runtime state.
    pub fn harness(&self) -> &Arc<Harness> {
        &self.harness
    }

    /// Scope token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// UI substrate.
    pub fn ui(&self) -> &dyn UiSurface {
        self.harness.substrate().ui.as_ref()
    }

    /// Cooperative waits.
    pub fn wait(&self) -> Waiter {
        self.harness.waiter(self.token.clone())
    }

    /// Keyboard.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self.harness.keyboard(), self.wait())
    }

    /// Pointer gestures.
    pub fn pointer(&self) -> Pointer<'_> {
        Pointer::new(&self.harness, self.token.clone())
    }

    /// Touch gestures.
    pub fn touch(&self) -> Touch<'_> {
        Touch::new(&self.harness, self.token.clone())
    }

    /// Text entry.
    pub fn text(&self) -> TextInput<'_> {
        TextInput::new(&self.harness, self.wait())
    }

    /// Checks.
    pub fn check(&self) -> &Asserter {
        self.harness.asserter()
    }

    /// Error-log assertion, e.g. to register expected errors.
    pub fn logs(&self) -> &LogAssert {
        self.harness.logs()
    }

    /// Named event counters.
    pub fn events(&self) -> &EventTracker {
        self.harness.events()
    }

    /// Current test context.
    pub fn diagnostics(&self) -> &DiagnosticsTracker {
        self.harness.diagnostics()
    }

    /// Log a named step and remember it as the last action.
    pub fn step(&self, label: &str) {
        self.wait().step(label);
        self.harness.diagnostics().update_action(label);
    }

    /// Find an element by name.
    pub fn find(&self, name: &str) -> Option<ElementId> {
        find::find_by_name(self.ui(), name)
    }

    /// Panel state of an element, remembered as the last panel.
    pub fn panel(&self, id: ElementId) -> Option<PanelState> {
        let state = panel::panel_state(self.ui(), id)?;
        if let Some(info) = self.ui().element(id) {
            self.harness.diagnostics().update_panel(&info.name);
        }
        Some(state)
    }

    /// Hierarchy dump of the active scene.
    pub fn hierarchy(&self) -> String {
        hierarchy::dump(self.ui())
    }

    /// Wait until an element with this name exists.
    pub async fn wait_for_object(&self, name: &str, timeout: Duration) -> Outcome<ElementId> {
        let mut found = None;
        self.wait()
            .until_with_diagnostics(
                || {
                    found = self.find(name);
                    found.is_some()
                },
                timeout,
                "object_exists",
                Some(name),
            )
            .await?;
        found.ok_or_else(|| Failure::other(format!("'{name}' vanished")))
    }

    /// Wait until an element with this name exists and is visible.
    pub async fn wait_for_ui_visible(&self, name: &str, timeout: Duration) -> Outcome<ElementId> {
        let mut found = None;
        self.wait()
            .until_with_diagnostics(
                || {
                    found = self.find(name).filter(|id| panel::is_visible(self.ui(), *id));
                    found.is_some()
                },
                timeout,
                "ui_visible",
                Some(name),
            )
            .await?;
        found.ok_or_else(|| Failure::other(format!("'{name}' vanished")))
    }

    /// Wait until the element can take routed input.
    pub async fn wait_for_ready(&self, id: ElementId, timeout: Duration) -> Outcome<()> {
        self.wait()
            .until_with_diagnostics(|| panel::is_ready(self.ui(), id), timeout, "ui_ready", None)
            .await
    }

    /// Wait until the named scene is active.
    pub async fn wait_for_scene(&self, scene: &str, timeout: Duration) -> Outcome<()> {
        self.wait()
            .until_with_diagnostics(|| self.ui().scene_name() == scene, timeout, "scene_active", Some(scene))
            .await
    }

    /// Wait until no asynchronous load is in flight (30 s when `None`).
    pub async fn wait_for_loading_complete(&self, timeout: Option<Duration>) -> Outcome<()> {
        let timeout = timeout.unwrap_or(Duration::from_secs_f64(DEFAULTS.loading_timeout_secs));
        let assets = self.harness.substrate().assets.clone();
        self.wait()
            .until_with_diagnostics(|| !assets.is_loading(), timeout, "loading_complete", None)
            .await
    }
}
