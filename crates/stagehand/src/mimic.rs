//! An in-memory application implementing every consumed capability.
//!
//! [`MimicApp`] keeps a tree of elements with screen-space bounds, routes
//! pointer events to them, renders a flat-colour frame for captures and
//! answers asset queries. [`MimicKeyboard`] implements both keyboard backends
//! and records every signal it receives. [`MimicTextAdapter`] edits the
//! app's text fields.
//!
//! Coordinates follow the harness convention: origin bottom-left, y up.
//! Children of a scroll container are declared in content coordinates as seen
//! with the container scrolled to the top.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    mem,
    sync::Arc,
};

use image::{Rgba, RgbaImage};
use keysym::{Key, LegacyKey};
use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    geom::{Rect, Vec2, clamp01},
    host::Host,
    input::{EventQueueKeyboard, PollingKeyboard, TextFieldAdapter},
    pointer::{PointerEvent, PointerPhase},
    ui::{
        AssetLookup, ElementId, ElementInfo, ElementKind, GroupState, ScreenCapture, ScrollState, UiSurface,
        WorldRaycaster, active_in_hierarchy, all_elements, panel,
    },
};

/// Default screen size of a mimic app.
pub const SCREEN: Vec2 = Vec2::new(800.0, 600.0);

/// Background colour of captures.
const BACKGROUND: Rgba<u8> = Rgba([24, 24, 32, 255]);

/// Callback run when an element receives a click.
type ClickHandler = Arc<dyn Fn(&PointerEvent) + Send + Sync>;

/// Scroll content of a container.
#[derive(Debug, Clone, Copy)]
struct Scroll {
    /// Normalized position, 1.0 at the top.
    vertical: f32,
    /// Height of the scrolled content.
    content_height: f32,
}

/// One element of the tree.
#[derive(Debug, Clone)]
struct Node {
    /// Object name.
    name: String,
    /// Widget category.
    kind: ElementKind,
    /// Parent element.
    parent: Option<ElementId>,
    /// Children in draw order.
    children: Vec<ElementId>,
    /// Own active flag.
    active: bool,
    /// Whether the widget accepts input.
    interactable: bool,
    /// Displayed text.
    text: Option<String>,
    /// Displayed sprite.
    sprite: Option<String>,
    /// Bounds before scroll offsets.
    bounds: Rect,
    /// Group flags.
    group: Option<GroupState>,
    /// Scroll content, for scroll containers.
    scroll: Option<Scroll>,
    /// Unresolved asset reference.
    missing_asset: bool,
    /// World objects only: whether the camera sees the object.
    in_front_of_camera: bool,
}

/// Everything the app knows.
struct AppState {
    /// Next identifier to hand out.
    next_id: u64,
    /// Every element.
    nodes: BTreeMap<ElementId, Node>,
    /// Top-level elements in draw order.
    roots: Vec<ElementId>,
    /// Every dispatched event, in order.
    events: Vec<(ElementId, PointerEvent)>,
    /// Click callbacks.
    on_click: HashMap<ElementId, Vec<ClickHandler>>,
    /// Overlay currently shown.
    overlay: Option<String>,
    /// Overlays shown since creation.
    overlay_instances: usize,
    /// Make captures fail.
    capture_broken: bool,
    /// Screen size.
    screen: Vec2,
    /// Name of the active scene.
    scene: String,
    /// Loaded asset names.
    loaded: HashSet<String>,
    /// Whether an asynchronous load is in flight.
    loading: bool,
}

/// In-memory application.
pub struct MimicApp {
    /// Shared state.
    state: Mutex<AppState>,
}

impl Default for MimicApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic colour for an element.
fn color_for(info: &ElementInfo) -> [u8; 3] {
    let key = info.sprite.as_deref().unwrap_or(&info.name);
    let mut h: u32 = 0x811c_9dc5;
    for b in key.bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    let [r, g, b, _] = h.to_le_bytes();
    [r | 0x40, g | 0x40, b | 0x40]
}

/// Blend `color` over `base` with opacity `alpha`.
fn blend(base: Rgba<u8>, color: [u8; 3], alpha: f32) -> Rgba<u8> {
    let a = clamp01(alpha);
    let mix = |from: u8, to: u8| (f32::from(from) + (f32::from(to) - f32::from(from)) * a).round() as u8;
    Rgba([mix(base[0], color[0]), mix(base[1], color[1]), mix(base[2], color[2]), 255])
}

/// Paint `rect` (y up) into `img` (y down).
fn fill(img: &mut RgbaImage, rect: Rect, color: [u8; 3], alpha: f32) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let x0 = rect.left().clamp(0.0, w) as u32;
    let x1 = rect.right().clamp(0.0, w) as u32;
    let y0 = (h - rect.top()).clamp(0.0, h) as u32;
    let y1 = (h - rect.bottom()).clamp(0.0, h) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = *img.get_pixel(x, y);
            img.put_pixel(x, y, blend(px, color, alpha));
        }
    }
}

impl MimicApp {
    /// Empty app with an 800x600 screen.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState {
                next_id: 1,
                nodes: BTreeMap::new(),
                roots: Vec::new(),
                events: Vec::new(),
                on_click: HashMap::new(),
                overlay: None,
                overlay_instances: 0,
                capture_broken: false,
                screen: SCREEN,
                scene: "Main".to_string(),
                loaded: HashSet::new(),
                loading: false,
            }),
        }
    }

    /// Insert a node and return its id.
    fn insert(&self, parent: Option<ElementId>, name: &str, kind: ElementKind, bounds: Rect) -> ElementId {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let id = ElementId(st.next_id);
        st.next_id += 1;
        st.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                kind,
                parent,
                children: Vec::new(),
                active: true,
                interactable: !matches!(kind, ElementKind::Label | ElementKind::Image | ElementKind::Panel),
                text: None,
                sprite: None,
                bounds,
                group: None,
                scroll: None,
                missing_asset: false,
                in_front_of_camera: true,
            },
        );
        match parent.and_then(|p| st.nodes.get_mut(&p)) {
            Some(p) => p.children.push(id),
            None => st.roots.push(id),
        }
        id
    }

    /// Add a top-level element.
    pub fn add_root(&self, name: &str, kind: ElementKind, bounds: Rect) -> ElementId {
        self.insert(None, name, kind, bounds)
    }

    /// Add an element under `parent`, drawn above its earlier siblings.
    pub fn add_child(&self, parent: ElementId, name: &str, kind: ElementKind, bounds: Rect) -> ElementId {
        self.insert(Some(parent), name, kind, bounds)
    }

    /// Add a physical-world object whose screen projection covers `bounds`.
    pub fn add_world_object(&self, name: &str, bounds: Rect) -> ElementId {
        self.insert(None, name, ElementKind::WorldObject, bounds)
    }

    /// Remove an element and its subtree.
    pub fn remove(&self, id: ElementId) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let Some(node) = st.nodes.get(&id).cloned() else {
            return;
        };
        match node.parent.and_then(|p| st.nodes.get_mut(&p)) {
            Some(p) => p.children.retain(|c| *c != id),
            None => st.roots.retain(|r| *r != id),
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(n) = st.nodes.remove(&next) {
                stack.extend(n.children);
            }
            st.on_click.remove(&next);
        }
    }

    /// Apply `f` to a node, ignoring unknown ids.
    fn with_node(&self, id: ElementId, f: impl FnOnce(&mut Node)) {
        if let Some(node) = self.state.lock().nodes.get_mut(&id) {
            f(node);
        }
    }

    /// Set the element's own active flag.
    pub fn set_active(&self, id: ElementId, active: bool) {
        self.with_node(id, |n| n.active = active);
    }

    /// Enable or disable input on the widget itself.
    pub fn set_interactable(&self, id: ElementId, interactable: bool) {
        self.with_node(id, |n| n.interactable = interactable);
    }

    /// Set the displayed text.
    pub fn set_text(&self, id: ElementId, text: &str) {
        self.with_node(id, |n| n.text = Some(text.to_string()));
    }

    /// Set the displayed sprite.
    pub fn set_sprite(&self, id: ElementId, sprite: &str) {
        self.with_node(id, |n| n.sprite = Some(sprite.to_string()));
    }

    /// Turn the element into a group container.
    pub fn set_group(&self, id: ElementId, group: GroupState) {
        self.with_node(id, |n| n.group = Some(group));
    }

    /// Mark the element's asset reference as broken or fixed.
    pub fn set_missing_asset(&self, id: ElementId, missing: bool) {
        self.with_node(id, |n| n.missing_asset = missing);
    }

    /// Move the element.
    pub fn set_bounds(&self, id: ElementId, bounds: Rect) {
        self.with_node(id, |n| n.bounds = bounds);
    }

    /// Put a world object behind the camera, or back in front of it.
    pub fn set_behind_camera(&self, id: ElementId, behind: bool) {
        self.with_node(id, |n| n.in_front_of_camera = !behind);
    }

    /// Make `id` a vertical scroll container over `content_height` of
    /// content, scrolled to the top.
    pub fn make_scrollable(&self, id: ElementId, content_height: f32) {
        self.with_node(id, |n| {
            n.scroll = Some(Scroll {
                vertical: 1.0,
                content_height,
            });
        });
    }

    /// Normalized scroll position of a container, 1.0 when not scrollable.
    pub fn scroll_position(&self, id: ElementId) -> f32 {
        self.state
            .lock()
            .nodes
            .get(&id)
            .and_then(|n| n.scroll)
            .map_or(1.0, |s| s.vertical)
    }

    /// Run `handler` whenever `id` receives a click.
    pub fn on_click<F>(&self, id: ElementId, handler: F)
    where
        F: Fn(&PointerEvent) + Send + Sync + 'static,
    {
        self.state
            .lock()
            .on_click
            .entry(id)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Every event dispatched so far.
    pub fn events(&self) -> Vec<(ElementId, PointerEvent)> {
        self.state.lock().events.clone()
    }

    /// Events dispatched to `id`.
    pub fn events_for(&self, id: ElementId) -> Vec<PointerEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|(target, _)| *target == id)
            .map(|(_, e)| *e)
            .collect()
    }

    /// Phases dispatched to `id`.
    pub fn phases(&self, id: ElementId) -> Vec<PointerPhase> {
        self.events_for(id).into_iter().map(|e| e.phase).collect()
    }

    /// Number of clicks `id` received.
    pub fn clicks(&self, id: ElementId) -> usize {
        self.phases(id)
            .into_iter()
            .filter(|p| *p == PointerPhase::Click)
            .count()
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Overlays shown since creation.
    pub fn overlay_instances(&self) -> usize {
        self.state.lock().overlay_instances
    }

    /// Text of the overlay on screen.
    pub fn overlay_text(&self) -> Option<String> {
        self.state.lock().overlay.clone()
    }

    /// Make captures fail.
    pub fn set_capture_broken(&self, broken: bool) {
        self.state.lock().capture_broken = broken;
    }

    /// Change the screen size.
    pub fn set_screen_size(&self, size: Vec2) {
        self.state.lock().screen = size;
    }

    /// Switch the active scene.
    pub fn set_scene(&self, name: &str) {
        self.state.lock().scene = name.to_string();
    }

    /// Mark an asset as loaded.
    pub fn mark_loaded(&self, asset: &str) {
        self.state.lock().loaded.insert(asset.to_string());
    }

    /// Flag an asynchronous load as in flight or done.
    pub fn set_loading(&self, loading: bool) {
        self.state.lock().loading = loading;
    }

    /// Vertical offset applied to `id` by its scrolled ancestors.
    fn scroll_offset(st: &AppState, id: ElementId) -> f32 {
        let mut offset = 0.0;
        let mut next = st.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = next {
            let Some(p) = st.nodes.get(&pid) else { break };
            if let Some(s) = p.scroll {
                offset += (1.0 - s.vertical) * (s.content_height - p.bounds.h).max(0.0);
            }
            next = p.parent;
        }
        offset
    }

    /// Displayed bounds of `id`.
    fn displayed(st: &AppState, id: ElementId) -> Option<Rect> {
        let node = st.nodes.get(&id)?;
        Some(node.bounds.translated(Vec2::new(0.0, Self::scroll_offset(st, id))))
    }

    /// Whether every scroll ancestor of `id` shows `position`.
    fn unclipped(st: &AppState, id: ElementId, position: Vec2) -> bool {
        let mut next = st.nodes.get(&id).and_then(|n| n.parent);
        while let Some(pid) = next {
            let Some(p) = st.nodes.get(&pid) else { break };
            if p.scroll.is_some() && !Self::displayed(st, pid).is_some_and(|r| r.contains(position)) {
                return false;
            }
            next = p.parent;
        }
        true
    }

    /// Flat-colour frame of every visible element, tinted red under an
    /// overlay.
    fn render(&self) -> RgbaImage {
        let (size, overlay) = {
            let st = self.state.lock();
            (st.screen, st.overlay.is_some())
        };
        let (w, h) = (size.x.max(1.0) as u32, size.y.max(1.0) as u32);
        let mut img = RgbaImage::from_pixel(w, h, BACKGROUND);
        for info in all_elements(self) {
            if !active_in_hierarchy(self, info.id) {
                continue;
            }
            if info.kind == ElementKind::WorldObject && self.world_to_screen(info.id).is_none() {
                continue;
            }
            let alpha = panel::panel_state(self, info.id).map_or(1.0, |s| s.alpha);
            fill(&mut img, info.bounds, color_for(&info), alpha);
        }
        if overlay {
            fill(&mut img, Rect::new(0.0, 0.0, size.x, size.y), [200, 0, 0], 0.5);
        }
        img
    }
}

impl UiSurface for MimicApp {
    fn screen_size(&self) -> Vec2 {
        self.state.lock().screen
    }

    fn hit_test(&self, position: Vec2) -> Vec<ElementId> {
        let order: Vec<ElementId> = all_elements(self).into_iter().map(|e| e.id).collect();
        let hits: Vec<ElementId> = {
            let st = self.state.lock();
            order
                .into_iter()
                .filter(|id| {
                    st.nodes.get(id).is_some_and(|n| {
                        matches!(
                            n.kind,
                            ElementKind::Button
                                | ElementKind::Toggle
                                | ElementKind::TextField
                                | ElementKind::ScrollView
                                | ElementKind::Slider
                        )
                    }) && Self::displayed(&st, *id).is_some_and(|r| r.contains(position))
                        && Self::unclipped(&st, *id, position)
                })
                .collect()
        };
        hits.into_iter()
            .rev()
            .filter(|id| active_in_hierarchy(self, *id))
            .collect()
    }

    fn dispatch(&self, target: ElementId, event: &PointerEvent) {
        let handlers = {
            let mut st = self.state.lock();
            if !st.nodes.contains_key(&target) {
                return;
            }
            st.events.push((target, *event));
            if event.phase == PointerPhase::Click {
                st.on_click.get(&target).cloned().unwrap_or_default()
            } else {
                Vec::new()
            }
        };
        for handler in handlers {
            handler(event);
        }
    }

    fn element(&self, id: ElementId) -> Option<ElementInfo> {
        let st = self.state.lock();
        let node = st.nodes.get(&id)?;
        let bounds = Self::displayed(&st, id)?;
        Some(ElementInfo {
            id,
            name: node.name.clone(),
            kind: node.kind,
            parent: node.parent,
            active: node.active,
            interactable: node.interactable,
            text: node.text.clone(),
            sprite: node.sprite.clone(),
            bounds,
            group: node.group,
            scroll: node.scroll.map(|s| ScrollState {
                vertical: s.vertical,
                viewport: bounds,
            }),
            missing_asset: node.missing_asset,
        })
    }

    fn roots(&self) -> Vec<ElementId> {
        self.state.lock().roots.clone()
    }

    fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.state
            .lock()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn set_scroll(&self, container: ElementId, vertical: f32) {
        self.with_node(container, |n| {
            if let Some(s) = n.scroll.as_mut() {
                s.vertical = clamp01(vertical);
            }
        });
    }

    fn scene_name(&self) -> String {
        self.state.lock().scene.clone()
    }

    fn show_overlay(&self, text: &str) {
        let mut st = self.state.lock();
        st.overlay = Some(text.to_string());
        st.overlay_instances += 1;
    }

    fn hide_overlay(&self) {
        self.state.lock().overlay = None;
    }
}

impl WorldRaycaster for MimicApp {
    fn raycast(&self, position: Vec2) -> Option<ElementId> {
        let st = self.state.lock();
        st.roots
            .iter()
            .rev()
            .copied()
            .find(|id| {
                st.nodes.get(id).is_some_and(|n| {
                    n.kind == ElementKind::WorldObject
                        && n.active
                        && n.in_front_of_camera
                        && n.bounds.contains(position)
                })
            })
    }

    fn world_to_screen(&self, id: ElementId) -> Option<Vec2> {
        let st = self.state.lock();
        let node = st.nodes.get(&id)?;
        (node.kind == ElementKind::WorldObject && node.in_front_of_camera).then(|| node.bounds.center())
    }
}

impl ScreenCapture for MimicApp {
    fn capture(&self) -> Result<RgbaImage> {
        if self.state.lock().capture_broken {
            return Err(Error::Capture("mimic capture disabled".into()));
        }
        Ok(self.render())
    }
}

impl AssetLookup for MimicApp {
    fn is_loaded(&self, asset: &str) -> bool {
        self.state.lock().loaded.contains(asset)
    }

    fn is_loading(&self) -> bool {
        self.state.lock().loading
    }
}

/// One signal received by a [`MimicKeyboard`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySignal {
    /// Key code in the space of the backend that sent it.
    pub code: u16,
    /// Down or up.
    pub down: bool,
    /// Unscaled host time of the last pass before the signal.
    pub time: f64,
}

/// Keyboard state.
#[derive(Debug, Default)]
struct KeyboardState {
    /// Held codes.
    held: HashSet<u16>,
    /// Every signal received.
    signals: Vec<KeySignal>,
    /// Physical keys that went down since the last pass.
    pending: HashSet<LegacyKey>,
    /// Physical keys that went down during the previous frame.
    frame: HashSet<LegacyKey>,
    /// Host time seen by the last pass.
    now: f64,
}

/// Keyboard implementing both backends.
#[derive(Debug, Default)]
pub struct MimicKeyboard {
    /// Shared state.
    state: Mutex<KeyboardState>,
}

impl MimicKeyboard {
    /// Idle keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow `host`'s passes for frame-edge detection and timestamps.
    pub fn attach(self: &Arc<Self>, host: &Host) {
        let kb = Arc::clone(self);
        host.add_tick_hook(move |frame| {
            let mut st = kb.state.lock();
            st.frame = mem::take(&mut st.pending);
            st.now = frame.unscaled_time;
        });
    }

    /// Every signal received so far.
    pub fn signals(&self) -> Vec<KeySignal> {
        self.state.lock().signals.clone()
    }

    /// Whether `code` is held.
    pub fn is_held(&self, code: u16) -> bool {
        self.state.lock().held.contains(&code)
    }

    /// Simulate a physical key press seen by the application.
    pub fn press_physical(&self, key: LegacyKey) {
        self.state.lock().pending.insert(key);
    }

    /// Record a transition. `physical` is the key as the application sees it,
    /// `None` when it has no legacy symbol.
    fn signal(&self, code: u16, physical: Option<LegacyKey>, down: bool) {
        let mut st = self.state.lock();
        let time = st.now;
        st.signals.push(KeySignal { code, down, time });
        if down {
            if st.held.insert(code)
                && let Some(key) = physical
            {
                st.pending.insert(key);
            }
        } else {
            st.held.remove(&code);
        }
    }
}

impl PollingKeyboard for MimicKeyboard {
    fn set_key(&self, key: LegacyKey, down: bool) {
        self.signal(key.code(), Some(key), down);
    }

    fn is_down(&self, key: LegacyKey) -> bool {
        self.is_held(key.code())
    }

    fn pressed_this_frame(&self, key: LegacyKey) -> bool {
        self.state.lock().frame.contains(&key)
    }
}

impl EventQueueKeyboard for MimicKeyboard {
    fn queue_key(&self, key: Key, down: bool) {
        self.signal(key.code(), key.to_legacy(), down);
    }

    fn is_down(&self, key: Key) -> bool {
        self.is_held(key.code())
    }

    fn pressed_this_frame(&self, key: Key) -> bool {
        key.to_legacy()
            .is_some_and(|k| self.state.lock().frame.contains(&k))
    }
}

/// Edits the text fields of a [`MimicApp`].
pub struct MimicTextAdapter {
    /// App owning the fields.
    app: Arc<MimicApp>,
    /// Focus and submit history.
    log: Mutex<Vec<String>>,
}

impl MimicTextAdapter {
    /// Adapter over `app`.
    pub fn new(app: Arc<MimicApp>) -> Self {
        Self {
            app,
            log: Mutex::new(Vec::new()),
        }
    }

    /// `focus <id>` and `submit <id>` entries, in order.
    pub fn history(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl TextFieldAdapter for MimicTextAdapter {
    fn name(&self) -> &str {
        "mimic"
    }

    fn accepts(&self, field: &ElementInfo) -> bool {
        field.kind == ElementKind::TextField
    }

    fn text(&self, field: ElementId) -> Option<String> {
        self.app.element(field)?.text
    }

    fn set_text(&self, field: ElementId, text: &str) {
        self.app.set_text(field, text);
    }

    fn focus(&self, field: ElementId) {
        self.log.lock().push(format!("focus {field}"));
    }

    fn submit(&self, field: ElementId) {
        self.log.lock().push(format!("submit {field}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerButton;

    #[test]
    fn hit_test_prefers_the_frontmost_widget() {
        let app = MimicApp::new();
        let canvas = app.add_root("Canvas", ElementKind::Panel, Rect::new(0.0, 0.0, 800.0, 600.0));
        let back = app.add_child(canvas, "Back", ElementKind::Button, Rect::new(0.0, 0.0, 100.0, 100.0));
        let front = app.add_child(canvas, "Front", ElementKind::Button, Rect::new(50.0, 50.0, 100.0, 100.0));
        assert_eq!(app.hit_test(Vec2::new(75.0, 75.0)), vec![front, back]);
        assert_eq!(app.hit_test(Vec2::new(10.0, 10.0)), vec![back]);
        assert!(app.hit_test(Vec2::new(700.0, 500.0)).is_empty());
        app.set_active(front, false);
        assert_eq!(app.hit_test(Vec2::new(75.0, 75.0)), vec![back]);
    }

    #[test]
    fn scrolling_moves_children_and_clips_hits() {
        let app = MimicApp::new();
        let view = app.add_root("List", ElementKind::ScrollView, Rect::new(0.0, 0.0, 100.0, 100.0));
        app.make_scrollable(view, 300.0);
        let row = app.add_child(view, "Row", ElementKind::Button, Rect::new(0.0, -150.0, 100.0, 50.0));
        assert!(!app.hit_test(Vec2::new(50.0, -125.0)).contains(&row));
        app.set_scroll(view, 0.0);
        assert_eq!(app.element(row).unwrap().bounds, Rect::new(0.0, 50.0, 100.0, 50.0));
        assert_eq!(app.hit_test(Vec2::new(50.0, 75.0))[0], row);
        assert_eq!(app.scroll_position(view), 0.0);
    }

    #[test]
    fn world_objects_are_raycast_not_hit_tested() {
        let app = MimicApp::new();
        let crate_obj = app.add_world_object("Crate", Rect::new(300.0, 300.0, 40.0, 40.0));
        assert!(app.hit_test(Vec2::new(320.0, 320.0)).is_empty());
        assert_eq!(app.raycast(Vec2::new(320.0, 320.0)), Some(crate_obj));
        assert_eq!(app.world_to_screen(crate_obj), Some(Vec2::new(320.0, 320.0)));
        app.set_behind_camera(crate_obj, true);
        assert_eq!(app.raycast(Vec2::new(320.0, 320.0)), None);
        assert_eq!(app.world_to_screen(crate_obj), None);
    }

    #[test]
    fn captures_are_deterministic_and_reflect_changes() {
        let app = MimicApp::new();
        let logo = app.add_root("Logo", ElementKind::Image, Rect::new(10.0, 10.0, 50.0, 50.0));
        let a = app.capture().unwrap();
        assert_eq!(a, app.capture().unwrap());
        assert_eq!(a.dimensions(), (800, 600));
        app.set_sprite(logo, "logo_alt");
        assert_ne!(a, app.capture().unwrap());
    }

    #[test]
    fn keyboard_reports_presses_for_one_frame() {
        let host = Host::new();
        let kb = Arc::new(MimicKeyboard::new());
        kb.attach(&host);
        PollingKeyboard::set_key(kb.as_ref(), LegacyKey::F9, true);
        assert!(!PollingKeyboard::pressed_this_frame(kb.as_ref(), LegacyKey::F9));
        host.tick(0.016);
        assert!(PollingKeyboard::pressed_this_frame(kb.as_ref(), LegacyKey::F9));
        host.tick(0.016);
        assert!(!PollingKeyboard::pressed_this_frame(kb.as_ref(), LegacyKey::F9));
        assert!(kb.is_held(LegacyKey::F9.code()));
    }

    #[test]
    fn click_handlers_run_outside_the_lock() {
        let app = Arc::new(MimicApp::new());
        let button = app.add_root("Spawn", ElementKind::Button, Rect::new(0.0, 0.0, 10.0, 10.0));
        let inner = app.clone();
        app.on_click(button, move |_| {
            inner.add_root("Spawned", ElementKind::Label, Rect::new(0.0, 0.0, 1.0, 1.0));
        });
        let click = PointerEvent {
            phase: PointerPhase::Click,
            position: Vec2::new(5.0, 5.0),
            button: PointerButton::Left,
            pointer_id: 0,
            click_count: 1,
            delta: Vec2::ZERO,
            progress: 0.0,
        };
        app.dispatch(button, &click);
        assert_eq!(app.roots().len(), 2);
        assert_eq!(app.clicks(button), 1);
    }
}
