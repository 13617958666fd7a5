//! Per-tick gesture state machines.
//!
//! Each gesture is a [`Routine`] stepped once per scheduler pass by the
//! [`Host`](crate::host::Host). The target is fixed when the gesture is built;
//! positions are interpolated from elapsed time rather than re-resolved.

use std::sync::Arc;

use tracing::trace;

use super::event::{GesturePhase, PointerButton, PointerEvent, PointerPhase};
use crate::{
    geom::{Vec2, clamp01},
    host::{FrameInfo, Routine, RoutineStep},
    ui::{ElementId, UiSurface},
};

/// Dispatches events for one contact to one target.
#[derive(Clone)]
pub struct Emitter {
    /// Event sink.
    ui: Arc<dyn UiSurface>,
    /// Target resolved at gesture start.
    target: ElementId,
    /// Contact id.
    pointer_id: i32,
    /// Reported button.
    button: PointerButton,
}

impl Emitter {
    /// Emit events for `target` as contact 0 with the left button.
    pub fn new(ui: Arc<dyn UiSurface>, target: ElementId) -> Self {
        Self {
            ui,
            target,
            pointer_id: 0,
            button: PointerButton::Left,
        }
    }

    /// Use a different button.
    #[must_use]
    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    /// Use a different contact id.
    #[must_use]
    pub fn with_pointer_id(mut self, pointer_id: i32) -> Self {
        self.pointer_id = pointer_id;
        self
    }

    /// The resolved target.
    pub fn target(&self) -> ElementId {
        self.target
    }

    /// Dispatch one event.
    fn emit(&self, phase: PointerPhase, position: Vec2, delta: Vec2, progress: f32, click_count: u32) {
        trace!(target_id = %self.target, %phase, pointer = self.pointer_id, "pointer_event");
        self.ui.dispatch(
            self.target,
            &PointerEvent {
                phase,
                position,
                button: self.button,
                pointer_id: self.pointer_id,
                click_count,
                delta,
                progress,
            },
        );
    }

    /// Dispatch a positional phase without movement.
    fn at(&self, phase: PointerPhase, position: Vec2) {
        self.emit(phase, position, Vec2::ZERO, 0.0, 0);
    }
}

/// Enter and Down, hold for a while, then Up and optionally Click.
///
/// The first step presses. Later steps accumulate time until the hold is
/// over, so a zero hold releases on the very next pass.
pub struct PressGesture {
    /// Event sink for the single contact.
    emitter: Emitter,
    /// Press position.
    position: Vec2,
    /// Seconds to keep the contact down.
    hold: f64,
    /// Click count to report after release, `None` for no click.
    click: Option<u32>,
    /// Time held so far.
    held: f64,
    /// Lifecycle state.
    phase: GesturePhase,
}

impl PressGesture {
    /// A single click: press, release on the next pass, click.
    pub fn click(emitter: Emitter, position: Vec2) -> Self {
        Self::hold(emitter, position, 0.0).with_click_count(1)
    }

    /// Press and hold for `seconds` without a click.
    pub fn hold(emitter: Emitter, position: Vec2, seconds: f64) -> Self {
        Self {
            emitter,
            position,
            hold: seconds.max(0.0),
            click: None,
            held: 0.0,
            phase: GesturePhase::Idle,
        }
    }

    /// Report a click with `count` after release.
    #[must_use]
    pub fn with_click_count(mut self, count: u32) -> Self {
        self.click = Some(count);
        self
    }

    /// Lifecycle state.
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }
}

impl Routine for PressGesture {
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep {
        match self.phase {
            GesturePhase::Idle => {
                self.emitter.at(PointerPhase::Enter, self.position);
                self.phase = GesturePhase::Entered;
                self.emitter.at(PointerPhase::Down, self.position);
                self.phase = GesturePhase::Pressed;
                RoutineStep::Continue
            }
            GesturePhase::Pressed => {
                self.held += frame.effective_delta();
                if self.held < self.hold {
                    return RoutineStep::Continue;
                }
                self.emitter.at(PointerPhase::Up, self.position);
                self.phase = GesturePhase::Released;
                if let Some(count) = self.click {
                    self.emitter
                        .emit(PointerPhase::Click, self.position, Vec2::ZERO, 1.0, count);
                    self.phase = GesturePhase::Clicked;
                }
                RoutineStep::Done
            }
            _ => RoutineStep::Done,
        }
    }
}

/// Event vocabulary of a path gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStyle {
    /// Enter, Down, BeginDrag, Drag per pass, then Up, EndDrag, Drop.
    Drag,
    /// Enter, Down, Move per pass, then Up and Click (a touch swipe).
    Swipe,
}

/// A contact moved in a straight line over a duration.
pub struct PathGesture {
    /// Event sink for the single contact.
    emitter: Emitter,
    /// Start position.
    from: Vec2,
    /// End position.
    to: Vec2,
    /// Seconds to cover the path; non-positive jumps straight to the end.
    duration: f64,
    /// Event vocabulary.
    style: PathStyle,
    /// Time since the contact went down.
    elapsed: f64,
    /// Position of the previous event.
    last: Vec2,
    /// Lifecycle state.
    phase: GesturePhase,
}

impl PathGesture {
    /// Build a path gesture.
    pub fn new(emitter: Emitter, from: Vec2, to: Vec2, duration: f64, style: PathStyle) -> Self {
        Self {
            emitter,
            from,
            to,
            duration,
            style,
            elapsed: 0.0,
            last: from,
            phase: GesturePhase::Idle,
        }
    }

    /// Lifecycle state.
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Interpolation parameter after `elapsed` seconds.
    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            clamp01((self.elapsed / self.duration) as f32)
        }
    }
}

impl Routine for PathGesture {
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep {
        match self.phase {
            GesturePhase::Idle => {
                self.emitter.at(PointerPhase::Enter, self.from);
                self.phase = GesturePhase::Entered;
                self.emitter.at(PointerPhase::Down, self.from);
                self.phase = GesturePhase::Pressed;
                if self.style == PathStyle::Drag {
                    self.emitter.at(PointerPhase::BeginDrag, self.from);
                }
                self.phase = GesturePhase::Dragging;
                RoutineStep::Continue
            }
            GesturePhase::Dragging => {
                self.elapsed += frame.effective_delta();
                let t = self.progress();
                let pos = self.from.lerp(self.to, t);
                let phase = match self.style {
                    PathStyle::Drag => PointerPhase::Drag,
                    PathStyle::Swipe => PointerPhase::Move,
                };
                self.emitter.emit(phase, pos, pos - self.last, t, 0);
                self.last = pos;
                if t < 1.0 {
                    return RoutineStep::Continue;
                }
                self.emitter.at(PointerPhase::Up, self.to);
                self.phase = GesturePhase::Released;
                match self.style {
                    PathStyle::Drag => {
                        self.emitter.at(PointerPhase::EndDrag, self.to);
                        self.emitter.at(PointerPhase::Drop, self.to);
                    }
                    PathStyle::Swipe => {
                        self.emitter
                            .emit(PointerPhase::Click, self.to, Vec2::ZERO, 1.0, 1);
                        self.phase = GesturePhase::Clicked;
                    }
                }
                RoutineStep::Done
            }
            _ => RoutineStep::Done,
        }
    }
}

/// One finger of a pinch.
struct Finger {
    /// Event sink, `None` when nothing was under the finger at start.
    emitter: Option<Emitter>,
    /// Unit direction from the center.
    direction: Vec2,
    /// Position of the previous event.
    last: Vec2,
}

/// Two contacts moving symmetrically around a shared center.
///
/// Each finger interpolates its own radius from `start / 2` to `end / 2`.
pub struct PinchGesture {
    /// Shared center.
    center: Vec2,
    /// Initial distance between the contacts.
    start: f32,
    /// Final distance between the contacts.
    end: f32,
    /// Seconds to cover the change.
    duration: f64,
    /// Time since the contacts went down.
    elapsed: f64,
    /// Contacts 0 and 1.
    fingers: [Finger; 2],
    /// Lifecycle state.
    phase: GesturePhase,
}

impl PinchGesture {
    /// Build a pinch from the targets already resolved under each finger.
    pub fn new(
        center: Vec2,
        start: f32,
        end: f32,
        duration: f64,
        targets: [Option<Emitter>; 2],
    ) -> Self {
        let [first, second] = targets;
        let finger = |emitter: Option<Emitter>, direction: Vec2| Finger {
            emitter,
            direction,
            last: center + direction * (start / 2.0),
        };
        Self {
            center,
            start,
            end,
            duration,
            elapsed: 0.0,
            fingers: [finger(first, Vec2::UP), finger(second, Vec2::UP * -1.0)],
            phase: GesturePhase::Idle,
        }
    }

    /// Start positions of both contacts.
    pub fn start_positions(center: Vec2, start: f32) -> [Vec2; 2] {
        [
            center + Vec2::UP * (start / 2.0),
            center - Vec2::UP * (start / 2.0),
        ]
    }

    /// Lifecycle state.
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }
}

impl Routine for PinchGesture {
    fn step(&mut self, frame: &FrameInfo) -> RoutineStep {
        match self.phase {
            GesturePhase::Idle => {
                for f in &self.fingers {
                    if let Some(e) = &f.emitter {
                        e.at(PointerPhase::Enter, f.last);
                        e.at(PointerPhase::Down, f.last);
                    }
                }
                self.phase = GesturePhase::Dragging;
                RoutineStep::Continue
            }
            GesturePhase::Dragging => {
                self.elapsed += frame.effective_delta();
                let t = if self.duration <= 0.0 {
                    1.0
                } else {
                    clamp01((self.elapsed / self.duration) as f32)
                };
                for f in &mut self.fingers {
                    let radius = (self.start / 2.0) + (self.end / 2.0 - self.start / 2.0) * t;
                    let pos = self.center + f.direction * radius;
                    if let Some(e) = &f.emitter {
                        e.emit(PointerPhase::Drag, pos, pos - f.last, t, 0);
                    }
                    f.last = pos;
                }
                if t < 1.0 {
                    return RoutineStep::Continue;
                }
                for f in &self.fingers {
                    if let Some(e) = &f.emitter {
                        e.at(PointerPhase::Up, f.last);
                        e.emit(PointerPhase::Click, f.last, Vec2::ZERO, 1.0, 1);
                    }
                }
                self.phase = GesturePhase::Clicked;
                RoutineStep::Done
            }
            _ => RoutineStep::Done,
        }
    }
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use super::*;
    use crate::{geom::Rect, mimic::MimicApp, ui::ElementKind};

    fn frame(dt: f64) -> FrameInfo {
        FrameInfo {
            delta: dt,
            unscaled_delta: dt,
            ..FrameInfo::default()
        }
    }

    fn app() -> (Arc<MimicApp>, ElementId) {
        let app = Arc::new(MimicApp::new());
        let id = app.add_root("Target", ElementKind::Button, Rect::new(0.0, 0.0, 100.0, 100.0));
        (app, id)
    }

    fn run(routine: &mut dyn Routine, dt: f64) -> usize {
        let mut steps = 1;
        while routine.step(&frame(dt)) == RoutineStep::Continue {
            steps += 1;
            assert!(steps < 1000, "routine never finished");
        }
        steps
    }

    #[test]
    fn click_releases_on_the_next_pass() {
        let (app, id) = app();
        let mut g = PressGesture::click(Emitter::new(app.clone(), id), Vec2::new(5.0, 5.0));
        assert_eq!(g.step(&frame(0.016)), RoutineStep::Continue);
        assert_eq!(g.phase(), GesturePhase::Pressed);
        assert_eq!(app.phases(id), vec![PointerPhase::Enter, PointerPhase::Down]);
        assert_eq!(g.step(&frame(0.016)), RoutineStep::Done);
        assert_eq!(g.phase(), GesturePhase::Clicked);
        assert_eq!(
            app.phases(id),
            vec![
                PointerPhase::Enter,
                PointerPhase::Down,
                PointerPhase::Up,
                PointerPhase::Click
            ]
        );
    }

    #[test]
    fn hold_waits_out_its_duration() {
        let (app, id) = app();
        let mut g = PressGesture::hold(Emitter::new(app.clone(), id), Vec2::ZERO, 0.5);
        let steps = run(&mut g, 0.125);
        assert_eq!(steps, 5);
        assert_eq!(g.phase(), GesturePhase::Released);
        assert_eq!(app.phases(id).last(), Some(&PointerPhase::Up));
    }

    #[test]
    fn drag_progress_is_monotonic_and_complete() {
        let (app, id) = app();
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(100.0, 0.0);
        let mut g = PathGesture::new(Emitter::new(app.clone(), id), from, to, 0.25, PathStyle::Drag);
        run(&mut g, 0.1);
        let events = app.events_for(id);
        let count = |p| events.iter().filter(|e| e.phase == p).count();
        assert_eq!(count(PointerPhase::BeginDrag), 1);
        assert_eq!(count(PointerPhase::EndDrag), 1);
        assert_eq!(count(PointerPhase::Drop), 1);
        let ts: Vec<f32> = events
            .iter()
            .filter(|e| e.phase == PointerPhase::Drag)
            .map(|e| e.progress)
            .collect();
        assert_eq!(ts.len(), 3);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ts.last(), Some(&1.0));
        let last_drag = events.iter().rfind(|e| e.phase == PointerPhase::Drag).unwrap();
        assert_eq!(last_drag.position, to);
    }

    #[test]
    fn zero_duration_drag_jumps_to_the_end() {
        let (app, id) = app();
        let mut g = PathGesture::new(
            Emitter::new(app.clone(), id),
            Vec2::ZERO,
            Vec2::new(10.0, 10.0),
            0.0,
            PathStyle::Drag,
        );
        assert_eq!(run(&mut g, 0.1), 2);
        let drags: Vec<_> = app
            .events_for(id)
            .into_iter()
            .filter(|e| e.phase == PointerPhase::Drag)
            .collect();
        assert_eq!(drags.len(), 1);
        assert_eq!(drags[0].progress, 1.0);
    }

    #[test]
    fn swipe_moves_then_clicks() {
        let (app, id) = app();
        let mut g = PathGesture::new(
            Emitter::new(app.clone(), id),
            Vec2::ZERO,
            Vec2::new(50.0, 0.0),
            0.3,
            PathStyle::Swipe,
        );
        run(&mut g, 0.1);
        let phases = app.phases(id);
        assert_eq!(phases.first(), Some(&PointerPhase::Enter));
        assert!(!phases.contains(&PointerPhase::BeginDrag));
        assert_eq!(&phases[phases.len() - 2..], &[PointerPhase::Up, PointerPhase::Click]);
    }

    #[test]
    fn pinch_drives_two_contacts() {
        let (app, id) = app();
        let center = Vec2::new(50.0, 50.0);
        let e0 = Emitter::new(app.clone(), id);
        let e1 = Emitter::new(app.clone(), id).with_pointer_id(1);
        let mut g = PinchGesture::new(center, 20.0, 60.0, 0.2, [Some(e0), Some(e1)]);
        run(&mut g, 0.1);
        let events = app.events_for(id);
        let last = |pid: i32| {
            events
                .iter()
                .rfind(|e| e.pointer_id == pid && e.phase == PointerPhase::Drag)
                .map(|e| e.position)
                .unwrap()
        };
        assert_eq!(last(0), Vec2::new(50.0, 80.0));
        assert_eq!(last(1), Vec2::new(50.0, 20.0));
        assert_eq!(
            events.iter().filter(|e| e.phase == PointerPhase::Click).count(),
            2
        );
    }
}
