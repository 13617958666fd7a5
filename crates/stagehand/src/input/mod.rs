//! Keyboard shim routing every key operation to exactly one backend.
//!
//! Test code names keys in the legacy symbol space. The polling backend takes
//! them as-is; the event-queue backend needs the symbol translated through the
//! `keysym` table. Keys without a translation, and any key when no backend is
//! available, degrade to a warning and a no-op.

use std::{
    collections::{BTreeSet, HashSet},
    mem,
};

use keysym::LegacyKey;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{error::Outcome, wait::Waiter};

pub mod backend;
pub mod text;

pub use backend::{EventQueueKeyboard, InputBackend, InputDevices, InputMode, PollingKeyboard};
pub use text::{TextAdapters, TextFieldAdapter, TextInput};

/// What happened to a key operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOp {
    /// The backend received the signal.
    Sent,
    /// The event-queue backend has no symbol for this key.
    Unsupported,
    /// No backend is available.
    Unavailable,
}

/// Key-press facade over the selected backend.
pub struct Keyboard {
    /// Authoritative backend, if any.
    backend: Option<InputBackend>,
    /// Keys already warned about as unmapped.
    warned: Mutex<HashSet<LegacyKey>>,
    /// Whether the missing-backend warning was emitted.
    warned_unavailable: Mutex<bool>,
    /// Keys this facade currently holds down.
    held: Mutex<BTreeSet<LegacyKey>>,
}

impl Keyboard {
    /// Wrap the selected backend.
    pub fn new(backend: Option<InputBackend>) -> Self {
        Self {
            backend,
            warned: Mutex::new(HashSet::new()),
            warned_unavailable: Mutex::new(false),
            held: Mutex::new(BTreeSet::new()),
        }
    }

    /// Tag of the active backend.
    pub fn mode(&self) -> InputMode {
        self.backend
            .as_ref()
            .map_or(InputMode::Unavailable, InputBackend::mode)
    }

    /// Signal that `key` went down. Repeated downs are passed through.
    pub fn key_down(&self, key: LegacyKey) -> KeyOp {
        let op = self.send(key, true);
        if op == KeyOp::Sent {
            self.held.lock().insert(key);
        }
        op
    }

    /// Signal that `key` went up.
    pub fn key_up(&self, key: LegacyKey) -> KeyOp {
        let op = self.send(key, false);
        self.held.lock().remove(&key);
        op
    }

    /// Whether `key` went down during the previous frame.
    pub fn pressed_this_frame(&self, key: LegacyKey) -> bool {
        match &self.backend {
            Some(InputBackend::Polling(dev)) => dev.pressed_this_frame(key),
            Some(InputBackend::EventQueue(dev)) => {
                key.to_modern().is_some_and(|k| dev.pressed_this_frame(k))
            }
            None => false,
        }
    }

    /// Whether the backend reports `key` as held.
    pub fn is_down(&self, key: LegacyKey) -> bool {
        match &self.backend {
            Some(InputBackend::Polling(dev)) => dev.is_down(key),
            Some(InputBackend::EventQueue(dev)) => key.to_modern().is_some_and(|k| dev.is_down(k)),
            None => false,
        }
    }

    /// Keys currently held by this facade.
    pub fn held(&self) -> Vec<LegacyKey> {
        self.held.lock().iter().copied().collect()
    }

    /// Release every key this facade still holds.
    pub fn release_all(&self) {
        let keys = mem::take(&mut *self.held.lock());
        for key in keys {
            debug!(%key, "key_released_on_cleanup");
            self.send(key, false);
        }
    }

    /// Route one transition to the backend.
    fn send(&self, key: LegacyKey, down: bool) -> KeyOp {
        match &self.backend {
            Some(InputBackend::Polling(dev)) => {
                dev.set_key(key, down);
                debug!(%key, down, "key_polling");
                KeyOp::Sent
            }
            Some(InputBackend::EventQueue(dev)) => match key.to_modern() {
                Some(modern) => {
                    dev.queue_key(modern, down);
                    debug!(%key, code = modern.code(), down, "key_queued");
                    KeyOp::Sent
                }
                None => {
                    if self.warned.lock().insert(key) {
                        warn!(%key, "key_unmapped");
                    }
                    KeyOp::Unsupported
                }
            },
            None => {
                let mut warned = self.warned_unavailable.lock();
                if !*warned {
                    *warned = true;
                    warn!(%key, "no keyboard backend available; key operations are ignored");
                }
                KeyOp::Unavailable
            }
        }
    }
}

/// Timed key presses, bound to one scope.
pub struct Keys<'a> {
    /// Backend facade.
    keyboard: &'a Keyboard,
    /// Scope waits.
    waiter: Waiter,
}

impl<'a> Keys<'a> {
    /// Bind key presses to a waiter.
    pub fn new(keyboard: &'a Keyboard, waiter: Waiter) -> Self {
        Self { keyboard, waiter }
    }

    /// Signal key down.
    pub fn down(&self, key: LegacyKey) -> KeyOp {
        self.keyboard.key_down(key)
    }

    /// Signal key up.
    pub fn up(&self, key: LegacyKey) -> KeyOp {
        self.keyboard.key_up(key)
    }

    /// Whether `key` went down during the previous frame.
    pub fn down_this_frame(&self, key: LegacyKey) -> bool {
        self.keyboard.pressed_this_frame(key)
    }

    /// Down, wait `seconds` of scaled time, up.
    ///
    /// A key the backend cannot take is skipped without waiting.
    pub async fn press(&self, key: LegacyKey, seconds: f64) -> Outcome<KeyOp> {
        let op = self.keyboard.key_down(key);
        if op != KeyOp::Sent {
            return Ok(op);
        }
        let waited = self.waiter.seconds(seconds).await;
        self.keyboard.key_up(key);
        waited.map(|()| op)
    }

    /// Press a key named by a spec string such as `"f1"` or `"space"`.
    pub async fn press_named(&self, spec: &str, seconds: f64) -> Outcome<KeyOp> {
        match LegacyKey::from_spec(spec) {
            Some(key) => self.press(key, seconds).await,
            None => {
                warn!(spec, "key_spec_unknown");
                Ok(KeyOp::Unsupported)
            }
        }
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use std::sync::Arc;

    use keysym::Key;

    use super::*;
    use crate::{config::BackendChoice, mimic::MimicKeyboard};

    fn devices() -> (Arc<MimicKeyboard>, Arc<MimicKeyboard>, InputDevices) {
        let polling = Arc::new(MimicKeyboard::new());
        let queue = Arc::new(MimicKeyboard::new());
        let devices = InputDevices {
            polling: Some(polling.clone()),
            event_queue: Some(queue.clone()),
        };
        (polling, queue, devices)
    }

    #[test]
    fn auto_prefers_event_queue() {
        let (_, _, devices) = devices();
        let backend = InputBackend::select(BackendChoice::Auto, &devices).unwrap();
        assert_eq!(backend.mode(), InputMode::EventQueue);
        let polling_only = InputDevices {
            event_queue: None,
            ..devices
        };
        let backend = InputBackend::select(BackendChoice::Auto, &polling_only).unwrap();
        assert_eq!(backend.mode(), InputMode::Polling);
        assert!(InputBackend::select(BackendChoice::EventQueue, &polling_only).is_none());
    }

    #[test]
    fn only_the_selected_backend_receives_keys() {
        let (polling, queue, devices) = devices();
        let kb = Keyboard::new(InputBackend::select(BackendChoice::Polling, &devices));
        assert_eq!(kb.key_down(LegacyKey::Space), KeyOp::Sent);
        assert_eq!(kb.key_up(LegacyKey::Space), KeyOp::Sent);
        assert_eq!(polling.signals().len(), 2);
        assert!(queue.signals().is_empty());
    }

    #[test]
    fn event_queue_translates_symbols() {
        let (_, queue, devices) = devices();
        let kb = Keyboard::new(InputBackend::select(BackendChoice::EventQueue, &devices));
        kb.key_down(LegacyKey::Alpha1);
        let signals = queue.signals();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].code, Key::Digit1.code());
        assert!(signals[0].down);
        assert!(kb.is_down(LegacyKey::Alpha1));
    }

    #[test]
    fn unmapped_key_is_a_noop() {
        let (_, queue, devices) = devices();
        let kb = Keyboard::new(InputBackend::select(BackendChoice::EventQueue, &devices));
        assert_eq!(kb.key_down(LegacyKey::F13), KeyOp::Unsupported);
        assert_eq!(kb.key_down(LegacyKey::F13), KeyOp::Unsupported);
        assert!(queue.signals().is_empty());
        assert!(kb.held().is_empty());
    }

    #[test]
    fn missing_backend_is_a_noop() {
        let kb = Keyboard::new(None);
        assert_eq!(kb.mode(), InputMode::Unavailable);
        assert_eq!(kb.key_down(LegacyKey::A), KeyOp::Unavailable);
        assert_eq!(kb.key_up(LegacyKey::A), KeyOp::Unavailable);
        assert!(!kb.pressed_this_frame(LegacyKey::A));
    }

    #[test]
    fn release_all_lifts_held_keys() {
        let (polling, _, devices) = devices();
        let kb = Keyboard::new(InputBackend::select(BackendChoice::Polling, &devices));
        kb.key_down(LegacyKey::LeftShift);
        kb.key_down(LegacyKey::W);
        kb.release_all();
        assert!(!polling.is_held(LegacyKey::W.code()));
        assert!(kb.held().is_empty());
    }
}
