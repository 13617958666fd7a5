//! The two keyboard backends and the capability probe that picks one.

use std::{fmt, sync::Arc};

use keysym::{Key, LegacyKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BackendChoice;

/// State-polling keyboard: keys have a persistent down/up state.
pub trait PollingKeyboard: Send + Sync {
    /// Set the state of `key`.
    fn set_key(&self, key: LegacyKey, down: bool);
    /// Whether `key` is held.
    fn is_down(&self, key: LegacyKey) -> bool;
    /// Whether `key` went down during the previous frame.
    fn pressed_this_frame(&self, key: LegacyKey) -> bool;
}

/// Event-queue keyboard: transitions are queued as discrete state changes and
/// consumed by the application's own update loop.
pub trait EventQueueKeyboard: Send + Sync {
    /// Queue a state change for `key`.
    fn queue_key(&self, key: Key, down: bool);
    /// Whether `key` is held after the queued changes.
    fn is_down(&self, key: Key) -> bool;
    /// Whether `key` went down during the previous frame.
    fn pressed_this_frame(&self, key: Key) -> bool;
}

/// Keyboard devices the application exposes.
#[derive(Clone, Default)]
pub struct InputDevices {
    /// Legacy polling device, when compiled into the application.
    pub polling: Option<Arc<dyn PollingKeyboard>>,
    /// Event-queue device, when compiled into the application.
    pub event_queue: Option<Arc<dyn EventQueueKeyboard>>,
}

/// The authoritative keyboard backend.
#[derive(Clone)]
pub enum InputBackend {
    /// Drive the state-polling device with legacy symbols.
    Polling(Arc<dyn PollingKeyboard>),
    /// Drive the event-queue device with translated symbols.
    EventQueue(Arc<dyn EventQueueKeyboard>),
}

impl fmt::Debug for InputBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputBackend::{:?}", self.mode())
    }
}

/// Backend tag recorded in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    /// State-polling backend.
    Polling,
    /// Event-queue backend.
    EventQueue,
    /// No keyboard available.
    Unavailable,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Polling => "polling",
            Self::EventQueue => "event-queue",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

impl InputBackend {
    /// Tag of this backend.
    pub fn mode(&self) -> InputMode {
        match self {
            Self::Polling(_) => InputMode::Polling,
            Self::EventQueue(_) => InputMode::EventQueue,
        }
    }

    /// Pick the backend once at startup.
    ///
    /// `Auto` prefers the event queue when both devices exist. A forced choice
    /// whose device is missing yields `None`, and key operations become
    /// warnings.
    pub fn select(choice: BackendChoice, devices: &InputDevices) -> Option<Self> {
        let polling = devices.polling.clone().map(Self::Polling);
        let queue = devices.event_queue.clone().map(Self::EventQueue);
        let picked = match choice {
            BackendChoice::Auto => queue.or(polling),
            BackendChoice::Polling => polling,
            BackendChoice::EventQueue => queue,
        };
        match &picked {
            Some(b) => info!(?choice, mode = %b.mode(), "input_backend_selected"),
            None => warn!(?choice, "input_backend_unavailable"),
        }
        picked
    }
}
