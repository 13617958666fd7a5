//! Scroll-container routines: nudge until visible, and animate to an end.

use std::sync::Arc;

use tracing::debug;

use crate::{
    config::ScrollPolicy,
    geom::clamp01,
    host::{FrameInfo, Routine, RoutineStep},
    ui::{ElementId, UiSurface, ancestors},
};

/// Nearest scroll container enclosing `id`, excluding `id` itself.
pub fn scroll_ancestor(ui: &dyn UiSurface, id: ElementId) -> Option<ElementId> {
    ancestors(ui, id)
        .skip(1)
        .find(|info| info.scroll.is_some())
        .map(|info| info.id)
}

/// Whether the vertical extent of `target` lies inside the viewport of
/// `container`. Horizontal position is not considered.
pub fn in_viewport(ui: &dyn UiSurface, container: ElementId, target: ElementId) -> bool {
    let (Some(c), Some(t)) = (ui.element(container), ui.element(target)) else {
        return false;
    };
    c.scroll
        .is_some_and(|s| s.viewport.contains_vertically(&t.bounds))
}

/// Moves a scroll container by a fixed fraction per pass until the target is
/// inside its viewport or the policy timeout (real time) elapses.
pub struct ScrollIntoView {
    /// Substrate owning the container.
    ui: Arc<dyn UiSurface>,
    /// Scroll container.
    container: ElementId,
    /// Element to reveal.
    target: ElementId,
    /// Step and timeout.
    policy: ScrollPolicy,
    /// Real seconds spent so far.
    elapsed: f64,
}

impl ScrollIntoView {
    /// Build the routine.
    pub fn new(ui: Arc<dyn UiSurface>, container: ElementId, target: ElementId, policy: ScrollPolicy) -> Self {
        Self {
            ui,
            container,
            target,
            policy,
            elapsed: 0.0,
        }
    }
}

impl Routine for ScrollIntoView {
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep {
        if in_viewport(self.ui.as_ref(), self.container, self.target) {
            return RoutineStep::Done;
        }
        if self.elapsed >= self.policy.timeout_secs {
            return RoutineStep::Done;
        }
        let (Some(c), Some(t)) = (self.ui.element(self.container), self.ui.element(self.target)) else {
            return RoutineStep::Done;
        };
        let Some(scroll) = c.scroll else {
            return RoutineStep::Done;
        };
        let offset = t.bounds.center().y - scroll.viewport.center().y;
        let next = clamp01(scroll.vertical + offset.signum() * self.policy.step);
        debug!(container = %self.container, vertical = next, "scroll_nudge");
        self.ui.set_scroll(self.container, next);
        self.elapsed += frame.unscaled_delta;
        RoutineStep::Continue
    }
}

/// Interpolates a container's scroll position to a fixed end over a duration.
pub struct ScrollLerp {
    /// Substrate owning the container.
    ui: Arc<dyn UiSurface>,
    /// Scroll container.
    container: ElementId,
    /// Position at start, read on the first step.
    from: Option<f32>,
    /// Final position.
    to: f32,
    /// Seconds to cover the change.
    duration: f64,
    /// Time so far.
    elapsed: f64,
}

impl ScrollLerp {
    /// Animate `container` to `to` over `duration` seconds.
    pub fn new(ui: Arc<dyn UiSurface>, container: ElementId, to: f32, duration: f64) -> Self {
        Self {
            ui,
            container,
            from: None,
            to: clamp01(to),
            duration,
            elapsed: 0.0,
        }
    }
}

impl Routine for ScrollLerp {
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep {
        let Some(from) = self.from.or_else(|| {
            self.ui
                .element(self.container)
                .and_then(|c| c.scroll)
                .map(|s| s.vertical)
        }) else {
            return RoutineStep::Done;
        };
        self.from = Some(from);
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            clamp01((self.elapsed / self.duration) as f32)
        };
        if t >= 1.0 {
            self.ui.set_scroll(self.container, self.to);
            return RoutineStep::Done;
        }
        self.ui.set_scroll(self.container, from + (self.to - from) * t);
        self.elapsed += frame.effective_delta();
        RoutineStep::Continue
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use super::*;
    use crate::{geom::Rect, mimic::MimicApp, ui::ElementKind};

    fn frame() -> FrameInfo {
        FrameInfo {
            delta: 0.016,
            unscaled_delta: 0.016,
            ..FrameInfo::default()
        }
    }

    /// A 100px viewport over 10 rows of 50px; rows laid out from the top.
    fn list() -> (Arc<MimicApp>, ElementId, Vec<ElementId>) {
        let app = Arc::new(MimicApp::new());
        let view = app.add_root("List", ElementKind::ScrollView, Rect::new(0.0, 0.0, 200.0, 100.0));
        app.make_scrollable(view, 500.0);
        let rows = (0..10)
            .map(|i| {
                let y = 50.0 - 50.0 * i as f32;
                app.add_child(view, &format!("Row{i}"), ElementKind::Button, Rect::new(0.0, y, 200.0, 50.0))
            })
            .collect();
        (app, view, rows)
    }

    #[test]
    fn finds_the_enclosing_container() {
        let (app, view, rows) = list();
        assert_eq!(scroll_ancestor(app.as_ref(), rows[3]), Some(view));
        assert_eq!(scroll_ancestor(app.as_ref(), view), None);
    }

    #[test]
    fn nudges_until_the_row_is_visible() {
        let (app, view, rows) = list();
        assert!(in_viewport(app.as_ref(), view, rows[0]));
        assert!(!in_viewport(app.as_ref(), view, rows[8]));
        let mut r = ScrollIntoView::new(app.clone(), view, rows[8], ScrollPolicy::default());
        let mut steps = 0;
        while r.step(&frame()) == RoutineStep::Continue {
            steps += 1;
            assert!(steps < 100);
        }
        assert!(in_viewport(app.as_ref(), view, rows[8]));
        assert!(app.scroll_position(view) < 1.0);
    }

    #[test]
    fn gives_up_after_the_timeout() {
        let (app, view, _) = list();
        let ghost = app.add_child(view, "Ghost", ElementKind::Label, Rect::new(0.0, -5000.0, 10.0, 10.0));
        let policy = ScrollPolicy {
            step: 0.1,
            timeout_secs: 0.1,
        };
        let mut r = ScrollIntoView::new(app.clone(), view, ghost, policy);
        let mut steps = 0;
        while r.step(&frame()) == RoutineStep::Continue {
            steps += 1;
        }
        assert_eq!(steps, 7);
        assert!(!in_viewport(app.as_ref(), view, ghost));
    }

    #[test]
    fn lerp_lands_on_the_end() {
        let (app, view, _) = list();
        let mut r = ScrollLerp::new(app.clone(), view, 0.0, 0.05);
        while r.step(&frame()) == RoutineStep::Continue {}
        assert_eq!(app.scroll_position(view), 0.0);
    }
}
