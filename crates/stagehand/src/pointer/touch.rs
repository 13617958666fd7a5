//! Touch gestures built from the same press and path primitives.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{
    Pointer, PointerButton,
    gesture::{Emitter, PathGesture, PathStyle, PinchGesture},
};
use crate::{config::GESTURES, error::Outcome, geom::Vec2, harness::Harness, ui::ElementId};

/// Touch gestures, bound to one scope.
pub struct Touch<'a> {
    /// Shared resolution and press path.
    pointer: Pointer<'a>,
    /// Runtime state.
    harness: &'a Harness,
    /// Scope token.
    token: CancellationToken,
}

impl<'a> Touch<'a> {
    /// Bind touch gestures to `token`.
    pub fn new(harness: &'a Harness, token: CancellationToken) -> Self {
        Self {
            pointer: Pointer::new(harness, token.clone()),
            harness,
            token,
        }
    }

    /// Short contact with a click on release.
    pub async fn tap(&self, position: Vec2) -> Outcome<Option<ElementId>> {
        self.pointer
            .press(position, None, PointerButton::Left, GESTURES.tap_secs, Some(1), "tap")
            .await
    }

    /// Long contact with a click on release.
    pub async fn long_press(&self, position: Vec2) -> Outcome<Option<ElementId>> {
        self.long_press_for(position, GESTURES.long_press_secs).await
    }

    /// Contact held for `seconds`, then released with a click.
    pub async fn long_press_for(&self, position: Vec2, seconds: f64) -> Outcome<Option<ElementId>> {
        self.pointer
            .press(position, None, PointerButton::Left, seconds, Some(1), "long_press")
            .await
    }

    /// Swipe over the default duration.
    pub async fn swipe(&self, from: Vec2, to: Vec2) -> Outcome<Option<ElementId>> {
        self.swipe_over(from, to, GESTURES.swipe_secs).await
    }

    /// Contact down at `from`, moved to `to` over `seconds`, released there.
    pub async fn swipe_over(&self, from: Vec2, to: Vec2, seconds: f64) -> Outcome<Option<ElementId>> {
        let Some(target) = self.pointer.ready_target(from, None, "swipe") else {
            return Ok(None);
        };
        let emitter = Emitter::new(self.harness.substrate().ui.clone(), target);
        self.harness
            .host()
            .run_routine(PathGesture::new(emitter, from, to, seconds, PathStyle::Swipe), &self.token)
            .await?;
        self.pointer.note(target, "swipe");
        Ok(Some(target))
    }

    /// Pinch over the default duration.
    pub async fn pinch(&self, center: Vec2, start: f32, end: f32) -> Outcome<usize> {
        self.pinch_over(center, start, end, GESTURES.pinch_secs).await
    }

    /// Two contacts around `center` whose distance goes from `start` to `end`
    /// over `seconds`. Returns how many contacts found a target.
    pub async fn pinch_over(&self, center: Vec2, start: f32, end: f32, seconds: f64) -> Outcome<usize> {
        let ui = &self.harness.substrate().ui;
        let [p0, p1] = PinchGesture::start_positions(center, start);
        let emitter = |pos: Vec2, id: i32| {
            self.pointer
                .ready_target(pos, None, "pinch")
                .map(|t| Emitter::new(ui.clone(), t).with_pointer_id(id))
        };
        let fingers = [emitter(p0, 0), emitter(p1, 1)];
        let hits = fingers.iter().flatten().count();
        if hits == 0 {
            warn!(x = center.x, y = center.y, "pinch_no_target");
            return Ok(0);
        }
        self.harness
            .host()
            .run_routine(PinchGesture::new(center, start, end, seconds, fingers), &self.token)
            .await?;
        Ok(hits)
    }
}
