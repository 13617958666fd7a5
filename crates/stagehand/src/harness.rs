//! The owned runtime state shared by every component of a run.
//!
//! Ownership of the mutable fields:
//! - `selected`: written by pointer and text gestures on the test flow.
//! - `context`: swapped by the case runner only, restored by [`ContextGuard`].
//! - diagnostics: begun and ended by the case runner; any component may
//!   update the last action, panel or event.
//! - the overlay and time scale: written by the assertion path and by
//!   [`Harness::resume`].

use std::{mem, sync::Arc};

use logging::capture::ErrorSink;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    assert::{Asserter, BaselineStore, LogAssert},
    config::{DEFAULTS, HarnessConfig},
    diagnostics::{DiagnosticsTracker, Environment},
    error::Result,
    events::EventTracker,
    host::Host,
    input::{InputBackend, InputDevices, Keyboard, TextAdapters, TextFieldAdapter},
    ui::{ElementId, Substrate},
    wait::Waiter,
};

/// Runtime state of the harness.
pub struct Harness {
    /// Loaded configuration.
    config: HarnessConfig,
    /// Scheduling bridge.
    host: Host,
    /// Application capabilities.
    substrate: Substrate,
    /// Keyboard facade over the selected backend.
    keyboard: Keyboard,
    /// Text-field adapters.
    text: TextAdapters,
    /// Failure path.
    asserter: Asserter,
    /// Error-log assertion.
    logs: LogAssert,
    /// Current test context.
    diagnostics: DiagnosticsTracker,
    /// Named event counters.
    events: EventTracker,
    /// Currently selected input target.
    selected: Mutex<Option<ElementId>>,
    /// Cancellation token of the running scope.
    context: Mutex<CancellationToken>,
}

/// Restores the previous execution token on drop.
pub struct ContextGuard<'a> {
    /// Harness whose token is restored.
    harness: &'a Harness,
    /// Token active before the swap.
    previous: Option<CancellationToken>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(prev) = self.previous.take() {
            *self.harness.context.lock() = prev;
        }
    }
}

/// Builder for [`Harness`].
pub struct HarnessBuilder {
    /// Application capabilities.
    substrate: Substrate,
    /// Configuration.
    config: HarnessConfig,
    /// Keyboard devices offered by the application.
    devices: InputDevices,
    /// Text-field adapters.
    text: TextAdapters,
    /// Sink fed by the log capture layer.
    sink: ErrorSink,
    /// Host to drive; a fresh one when unset.
    host: Option<Host>,
}

impl HarnessBuilder {
    /// Use `config`.
    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Offer keyboard devices to the backend probe.
    #[must_use]
    pub fn with_devices(mut self, devices: InputDevices) -> Self {
        self.devices = devices;
        self
    }

    /// Register a text-field adapter.
    #[must_use]
    pub fn with_text_adapter(mut self, adapter: Arc<dyn TextFieldAdapter>) -> Self {
        self.text.register(adapter);
        self
    }

    /// Read captured error logs from `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = sink;
        self
    }

    /// Drive an existing host.
    #[must_use]
    pub fn with_host(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }

    /// Validate the configuration, select the input backend and assemble the
    /// runtime state.
    pub fn build(self) -> Result<Arc<Harness>> {
        let cfg = self.config;
        cfg.hotkey_key()?;
        let host = self.host.unwrap_or_default();
        let backend = InputBackend::select(cfg.input_backend, &self.devices);
        let baselines = BaselineStore::new(cfg.baselines_dir(), cfg.mismatches_dir(), DEFAULTS.baseline_tolerance);
        let asserter = Asserter::new(host.clone(), self.substrate.clone(), cfg.failures_dir(), baselines);
        let harness = Harness {
            diagnostics: DiagnosticsTracker::new(Some(cfg.reports_dir.clone())),
            keyboard: Keyboard::new(backend),
            logs: LogAssert::new(self.sink),
            text: self.text,
            events: EventTracker::new(),
            selected: Mutex::new(None),
            context: Mutex::new(CancellationToken::new()),
            substrate: self.substrate,
            asserter,
            host,
            config: cfg,
        };
        info!(
            reports = %harness.config.reports_dir.display(),
            input = %harness.keyboard.mode(),
            "harness_ready"
        );
        Ok(Arc::new(harness))
    }
}

impl Harness {
    /// Start building a harness over `substrate`.
    pub fn builder(substrate: Substrate) -> HarnessBuilder {
        HarnessBuilder {
            substrate,
            config: HarnessConfig::default(),
            devices: InputDevices::default(),
            text: TextAdapters::default(),
            sink: ErrorSink::new(),
            host: None,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Scheduling bridge.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Application capabilities.
    pub fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    /// Keyboard facade.
    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Text-field adapters.
    pub fn text_adapters(&self) -> &TextAdapters {
        &self.text
    }

    /// Failure path.
    pub fn asserter(&self) -> &Asserter {
        &self.asserter
    }

    /// Error-log assertion.
    pub fn logs(&self) -> &LogAssert {
        &self.logs
    }

    /// Current test context.
    pub fn diagnostics(&self) -> &DiagnosticsTracker {
        &self.diagnostics
    }

    /// Named event counters.
    pub fn events(&self) -> &EventTracker {
        &self.events
    }

    /// Waits bound to `token`.
    pub fn waiter(&self, token: CancellationToken) -> Waiter {
        Waiter::new(self.host.clone(), token)
    }

    /// Currently selected input target.
    pub fn selected(&self) -> Option<ElementId> {
        *self.selected.lock()
    }

    /// Change the selected input target.
    pub fn set_selected(&self, id: Option<ElementId>) {
        *self.selected.lock() = id;
    }

    /// Token of the scope currently executing.
    pub fn current_token(&self) -> CancellationToken {
        self.context.lock().clone()
    }

    /// Make `token` current until the guard drops.
    pub fn enter_scope(&self, token: CancellationToken) -> ContextGuard<'_> {
        let previous = mem::replace(&mut *self.context.lock(), token);
        ContextGuard {
            harness: self,
            previous: Some(previous),
        }
    }

    /// Environment description for diagnostics.
    pub fn environment(&self) -> Environment {
        Environment::new(
            self.substrate.ui.scene_name(),
            self.config.app_version.clone(),
            self.keyboard.mode(),
        )
    }

    /// Clear a failure: hide the overlay and let simulated time run again.
    pub fn resume(&self) {
        self.asserter.overlay().hide();
        self.host.set_time_scale(1.0);
        debug!("harness_resumed");
    }
}
