//! Phase-tagged pointer events delivered to the UI substrate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::Vec2;

/// Phase of a routed pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerPhase {
    /// The pointer entered the target.
    Enter,
    /// A button or contact went down.
    Down,
    /// The pointer moved without a drag in progress.
    Move,
    /// A drag started.
    BeginDrag,
    /// The drag moved.
    Drag,
    /// The button or contact was released.
    Up,
    /// The drag ended.
    EndDrag,
    /// Something was dropped on the target.
    Drop,
    /// A completed click.
    Click,
}

impl fmt::Display for PointerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which button a pointer event reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerButton {
    /// Primary button, and every touch contact.
    #[default]
    Left,
    /// Secondary button.
    Right,
    /// Middle button.
    Middle,
}

/// One event routed to one target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase.
    pub phase: PointerPhase,
    /// Screen position.
    pub position: Vec2,
    /// Reported button.
    pub button: PointerButton,
    /// Contact id: 0 for the mouse and the first finger, 1 for the second.
    pub pointer_id: i32,
    /// Click count for `Click` events, otherwise 0.
    pub click_count: u32,
    /// Movement since the previous event of the gesture.
    pub delta: Vec2,
    /// Interpolation parameter of path gestures in `0..=1`.
    pub progress: f32,
}

/// Where a gesture is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum GesturePhase {
    /// Nothing dispatched yet.
    #[default]
    Idle,
    /// Enter dispatched.
    Entered,
    /// Down dispatched; the contact is held.
    Pressed,
    /// Moving with the contact held.
    Dragging,
    /// Up dispatched.
    Released,
    /// Click dispatched; the gesture is over.
    Clicked,
}
