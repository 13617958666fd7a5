//! Routed pointer input.
//!
//! Every gesture resolves its target once, up front: an explicit preferred
//! target wins, then the frontmost UI hit, then a world raycast. Targets that
//! are inactive or sit behind a transparent or non-interactable group are
//! skipped with a warning. A gesture with nothing to hit dispatches nothing and
//! is not an error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::GESTURES,
    error::Outcome,
    geom::{Rect, Vec2, clamp01},
    harness::Harness,
    host::Routine,
    ui::{ElementId, ElementKind, UiSurface, find, panel},
};

pub mod event;
pub mod gesture;
pub mod scroll;
pub mod touch;

pub use event::{GesturePhase, PointerButton, PointerEvent, PointerPhase};
use gesture::{Emitter, PathGesture, PathStyle, PressGesture};
use scroll::{ScrollIntoView, ScrollLerp, in_viewport, scroll_ancestor};
pub use touch::Touch;

/// Pointer gestures against the harness substrate, bound to one scope.
pub struct Pointer<'a> {
    /// Runtime state.
    harness: &'a Harness,
    /// Scope token.
    token: CancellationToken,
}

impl<'a> Pointer<'a> {
    /// Bind pointer gestures to `token`.
    pub fn new(harness: &'a Harness, token: CancellationToken) -> Self {
        Self { harness, token }
    }

    /// The UI substrate.
    fn ui(&self) -> &Arc<dyn UiSurface> {
        &self.harness.substrate().ui
    }

    /// Full screen rectangle.
    fn screen(&self) -> Rect {
        let size = self.ui().screen_size();
        Rect::new(0.0, 0.0, size.x, size.y)
    }

    /// Resolve the target for a gesture at `position`.
    ///
    /// `preferred` overrides hit-testing when it still exists.
    pub fn resolve(&self, position: Vec2, preferred: Option<ElementId>) -> Option<ElementId> {
        let ui = self.ui();
        if let Some(id) = preferred.filter(|id| ui.element(*id).is_some()) {
            return Some(id);
        }
        ui.hit_test(position)
            .into_iter()
            .next()
            .or_else(|| self.harness.substrate().world.raycast(position))
    }

    /// Resolve and gate a target, logging why a gesture is skipped.
    fn ready_target(&self, position: Vec2, preferred: Option<ElementId>, gesture: &str) -> Option<ElementId> {
        let Some(target) = self.resolve(position, preferred) else {
            warn!(gesture, x = position.x, y = position.y, "pointer_no_target");
            return None;
        };
        if !panel::is_ready(self.ui().as_ref(), target) {
            warn!(gesture, target = %target, "pointer_target_not_ready");
            return None;
        }
        Some(target)
    }

    /// Drive one routine to completion on the host.
    async fn run<R: Routine + 'static>(&self, routine: R) -> Outcome<()> {
        self.harness.host().run_routine(routine, &self.token).await
    }

    /// Record a dispatched gesture in the runtime state.
    fn note(&self, target: ElementId, action: &str) {
        self.harness.set_selected(Some(target));
        let name = self
            .ui()
            .element(target)
            .map_or_else(|| target.to_string(), |e| e.name);
        self.harness.diagnostics().update_action(&format!("{action} {name}"));
        debug!(action, target = %target, "pointer_gesture");
    }

    /// Shared press path for every click flavour.
    async fn press(
        &self,
        position: Vec2,
        preferred: Option<ElementId>,
        button: PointerButton,
        hold: f64,
        click_count: Option<u32>,
        action: &str,
    ) -> Outcome<Option<ElementId>> {
        let Some(target) = self.ready_target(position, preferred, action) else {
            return Ok(None);
        };
        let emitter = Emitter::new(self.ui().clone(), target).with_button(button);
        let mut gesture = PressGesture::hold(emitter, position, hold);
        if let Some(count) = click_count {
            gesture = gesture.with_click_count(count);
        }
        self.run(gesture).await?;
        self.note(target, action);
        Ok(Some(target))
    }

    /// Left click at a screen position. Returns the clicked element, `None`
    /// when the click was skipped.
    pub async fn click_at(&self, position: Vec2) -> Outcome<Option<ElementId>> {
        self.press(position, None, PointerButton::Left, 0.0, Some(1), "click")
            .await
    }

    /// Left click at a position on a preferred target.
    pub async fn click_at_on(&self, position: Vec2, target: ElementId) -> Outcome<Option<ElementId>> {
        self.press(position, Some(target), PointerButton::Left, 0.0, Some(1), "click")
            .await
    }

    /// Left click at fractions of the screen size, each clamped to `0..=1`.
    pub async fn click_screen_percent(&self, x: f32, y: f32) -> Outcome<Option<ElementId>> {
        let size = self.ui().screen_size();
        self.click_at(Vec2::new(clamp01(x) * size.x, clamp01(y) * size.y))
            .await
    }

    /// Left click at pixel coordinates clamped to the screen.
    pub async fn click_pixels(&self, x: f32, y: f32) -> Outcome<Option<ElementId>> {
        let size = self.ui().screen_size();
        let pos = Vec2::new(x, y).clamp(Vec2::ZERO, size);
        self.click_at(pos).await
    }

    /// Right click at a screen position.
    pub async fn right_click(&self, position: Vec2) -> Outcome<Option<ElementId>> {
        self.press(position, None, PointerButton::Right, 0.0, Some(1), "right_click")
            .await
    }

    /// Middle click at a screen position.
    pub async fn middle_click(&self, position: Vec2) -> Outcome<Option<ElementId>> {
        self.press(position, None, PointerButton::Middle, 0.0, Some(1), "middle_click")
            .await
    }

    /// Two clicks separated by `delay` seconds (clamped to the double-click
    /// window); the second reports a click count of 2.
    pub async fn double_click(&self, position: Vec2, delay: Option<f64>) -> Outcome<Option<ElementId>> {
        let delay = delay
            .unwrap_or(GESTURES.double_click_delay_secs)
            .clamp(GESTURES.double_click_min_secs, GESTURES.double_click_max_secs);
        let Some(target) = self
            .press(position, None, PointerButton::Left, 0.0, Some(1), "double_click")
            .await?
        else {
            return Ok(None);
        };
        self.harness.waiter(self.token.clone()).seconds(delay).await?;
        self.press(position, Some(target), PointerButton::Left, 0.0, Some(2), "double_click")
            .await
    }

    /// Press at `position`, hold for `seconds`, release without a click.
    pub async fn hold(&self, position: Vec2, seconds: f64) -> Outcome<Option<ElementId>> {
        self.press(position, None, PointerButton::Left, seconds, None, "hold")
            .await
    }

    /// Scroll `target`'s enclosing container until it is in view.
    ///
    /// Returns `true` when the target ends up visible or has no scroll
    /// container. A timeout is logged and reported as `false`.
    pub async fn scroll_into_view(&self, target: ElementId) -> Outcome<bool> {
        let ui = self.ui().clone();
        let Some(container) = scroll_ancestor(ui.as_ref(), target) else {
            return Ok(true);
        };
        if in_viewport(ui.as_ref(), container, target) {
            return Ok(true);
        }
        let policy = self.harness.config().scroll;
        self.run(ScrollIntoView::new(ui.clone(), container, target, policy))
            .await?;
        let visible = in_viewport(ui.as_ref(), container, target);
        if !visible {
            warn!(
                target = %target,
                timeout_secs = policy.timeout_secs,
                "scroll_into_view timed out; clicking anyway"
            );
        }
        Ok(visible)
    }

    /// Click an element, scrolling it into view first when it lives in a
    /// scroll container. The click position is recomputed after scrolling.
    pub async fn click_on(&self, target: ElementId) -> Outcome<Option<ElementId>> {
        if self.ui().element(target).is_none() {
            warn!(target = %target, "click_on_missing_target");
            return Ok(None);
        }
        self.scroll_into_view(target).await?;
        let Some(position) = self.screen_position(target) else {
            warn!(target = %target, "click_on_no_position");
            return Ok(None);
        };
        if !self.screen().contains(position) {
            warn!(target = %target, x = position.x, y = position.y, "click_on_offscreen");
            return Ok(None);
        }
        self.press(position, Some(target), PointerButton::Left, 0.0, Some(1), "click")
            .await
    }

    /// Current screen position of an element's center.
    fn screen_position(&self, target: ElementId) -> Option<Vec2> {
        let info = self.ui().element(target)?;
        if info.kind == ElementKind::WorldObject {
            self.harness.substrate().world.world_to_screen(target)
        } else {
            Some(info.bounds.center())
        }
    }

    /// Click the first active button whose label contains `text`.
    pub async fn click_button_with_text(&self, text: &str) -> Outcome<Option<ElementId>> {
        match find::find_button_with_text(self.ui().as_ref(), text) {
            Some(id) => self.click_on(id).await,
            None => {
                warn!(text, "button_with_text_not_found");
                Ok(None)
            }
        }
    }

    /// Click a world object at its projected screen position. Skipped when the
    /// object is behind the camera or off-screen.
    pub async fn click_world_object(&self, object: ElementId) -> Outcome<Option<ElementId>> {
        let Some(position) = self.harness.substrate().world.world_to_screen(object) else {
            warn!(object = %object, "world_object_not_projected");
            return Ok(None);
        };
        if !self.screen().contains(position) {
            warn!(object = %object, "world_object_offscreen");
            return Ok(None);
        }
        self.press(position, Some(object), PointerButton::Left, 0.0, Some(1), "click")
            .await
    }

    /// Drag from `from` to `to` over `seconds`. The target is whatever sits at
    /// `from`; it receives every event of the gesture.
    pub async fn drag(&self, from: Vec2, to: Vec2, seconds: f64) -> Outcome<Option<ElementId>> {
        let Some(target) = self.ready_target(from, None, "drag") else {
            return Ok(None);
        };
        let emitter = Emitter::new(self.ui().clone(), target);
        self.run(PathGesture::new(emitter, from, to, seconds, PathStyle::Drag))
            .await?;
        self.note(target, "drag");
        Ok(Some(target))
    }

    /// Animate a scroll container to its bottom.
    pub async fn scroll_to_bottom(&self, container: ElementId, seconds: f64) -> Outcome<()> {
        self.run(ScrollLerp::new(self.ui().clone(), container, 0.0, seconds))
            .await
    }

    /// Animate a scroll container to its top.
    pub async fn scroll_to_top(&self, container: ElementId, seconds: f64) -> Outcome<()> {
        self.run(ScrollLerp::new(self.ui().clone(), container, 1.0, seconds))
            .await
    }
}
