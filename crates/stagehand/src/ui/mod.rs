//! Capabilities consumed from the application under test.
//!
//! The harness never talks to a widget toolkit directly. Everything it needs
//! from the running application is expressed by the traits in this module:
//!
//! - [`UiSurface`]: element metadata, hit-testing, phase-tagged event dispatch,
//!   scroll positions and the failure overlay.
//! - [`WorldRaycaster`]: resolving physical-world objects under a screen point.
//! - [`ScreenCapture`]: grabbing the current frame as pixels.
//! - [`AssetLookup`]: asking whether assets and scenes are loaded.
//!
//! [`Substrate`] bundles one implementation of each.

use std::{fmt, iter, sync::Arc};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    geom::{Rect, Vec2},
    pointer::PointerEvent,
};

pub mod find;
pub mod hierarchy;
pub mod panel;

/// Opaque identifier of an element in the application's UI or world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad widget category, used for lookups and hierarchy dumps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Layout container without input handling of its own.
    Panel,
    /// Clickable button.
    Button,
    /// Two-state toggle.
    Toggle,
    /// Static text.
    Label,
    /// Editable text field.
    TextField,
    /// Image or sprite.
    Image,
    /// Scrollable container.
    ScrollView,
    /// Continuous value control.
    Slider,
    /// Object living in the physical world rather than the UI layer.
    WorldObject,
}

/// Opacity and interactability of a container that groups its descendants.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    /// Opacity multiplier in `0..=1`.
    pub alpha: f32,
    /// Whether descendants accept input.
    pub interactable: bool,
    /// Stop the ancestor walk at this group.
    pub ignore_parent_groups: bool,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            interactable: true,
            ignore_parent_groups: false,
        }
    }
}

/// Vertical scroll state of a scroll container.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    /// Normalized position: 1.0 shows the top of the content, 0.0 the bottom.
    pub vertical: f32,
    /// Visible region in screen coordinates.
    pub viewport: Rect,
}

/// Snapshot of one element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Element identity.
    pub id: ElementId,
    /// Object name.
    pub name: String,
    /// Widget category.
    pub kind: ElementKind,
    /// Parent element, `None` for roots.
    pub parent: Option<ElementId>,
    /// Whether the element itself is active. Ancestors are not considered.
    pub active: bool,
    /// Whether the widget accepts input (disabled buttons report `false`).
    pub interactable: bool,
    /// Displayed or edited text.
    pub text: Option<String>,
    /// Name of the displayed sprite.
    pub sprite: Option<String>,
    /// Current screen-space bounds.
    pub bounds: Rect,
    /// Group flags when the element is a group container.
    pub group: Option<GroupState>,
    /// Scroll state when the element is a scroll container.
    pub scroll: Option<ScrollState>,
    /// Set when a texture, material or sprite reference failed to resolve.
    pub missing_asset: bool,
}

/// UI hit-testing and event-routing substrate.
pub trait UiSurface: Send + Sync {
    /// Screen size in pixels.
    fn screen_size(&self) -> Vec2;
    /// Elements under `position`, frontmost first.
    fn hit_test(&self, position: Vec2) -> Vec<ElementId>;
    /// Deliver one pointer event to `target`.
    fn dispatch(&self, target: ElementId, event: &PointerEvent);
    /// Metadata for `id`, `None` once the element is gone.
    fn element(&self, id: ElementId) -> Option<ElementInfo>;
    /// Top-level elements of the active scene.
    fn roots(&self) -> Vec<ElementId>;
    /// Direct children of `id`, in sibling order.
    fn children(&self, id: ElementId) -> Vec<ElementId>;
    /// Set the normalized vertical scroll position of a scroll container.
    fn set_scroll(&self, container: ElementId, vertical: f32);
    /// Name of the active scene.
    fn scene_name(&self) -> String;
    /// Show (or replace the text of) the full-screen failure overlay.
    fn show_overlay(&self, text: &str);
    /// Remove the failure overlay.
    fn hide_overlay(&self);
}

/// Physical-world raycasting substrate.
pub trait WorldRaycaster: Send + Sync {
    /// Object hit by a ray from the active camera through `position`.
    fn raycast(&self, position: Vec2) -> Option<ElementId>;
    /// Screen position of a world object, `None` when behind the camera.
    fn world_to_screen(&self, id: ElementId) -> Option<Vec2>;
}

/// Screen-pixel capture substrate.
pub trait ScreenCapture: Send + Sync {
    /// Capture the current frame.
    fn capture(&self) -> Result<RgbaImage>;
}

/// Resource and asset lookup substrate.
pub trait AssetLookup: Send + Sync {
    /// Whether the named asset is loaded.
    fn is_loaded(&self, asset: &str) -> bool;
    /// Whether any asynchronous load is still in flight.
    fn is_loading(&self) -> bool;
}

/// One implementation of every consumed capability.
#[derive(Clone)]
pub struct Substrate {
    /// UI layer.
    pub ui: Arc<dyn UiSurface>,
    /// Physical world.
    pub world: Arc<dyn WorldRaycaster>,
    /// Pixel capture.
    pub capture: Arc<dyn ScreenCapture>,
    /// Asset queries.
    pub assets: Arc<dyn AssetLookup>,
}

impl Substrate {
    /// Use one object for every capability.
    pub fn from_app<T>(app: Arc<T>) -> Self
    where
        T: UiSurface + WorldRaycaster + ScreenCapture + AssetLookup + 'static,
    {
        Self {
            ui: app.clone(),
            world: app.clone(),
            capture: app.clone(),
            assets: app,
        }
    }
}

/// Whether `id` and every ancestor are active.
pub fn active_in_hierarchy(ui: &dyn UiSurface, id: ElementId) -> bool {
    ancestors(ui, id).all(|e| e.active)
}

/// The element itself followed by its ancestors, nearest first.
pub fn ancestors(ui: &dyn UiSurface, id: ElementId) -> impl Iterator<Item = ElementInfo> + '_ {
    let mut next = Some(id);
    let mut budget = MAX_ANCESTRY;
    iter::from_fn(move || {
        if budget == 0 {
            return None;
        }
        budget -= 1;
        let info = ui.element(next?)?;
        next = info.parent;
        Some(info)
    })
}

/// Walk bound guarding against cyclic parent links.
const MAX_ANCESTRY: usize = 256;

/// Every element of the active scene in depth-first order.
pub fn all_elements(ui: &dyn UiSurface) -> Vec<ElementInfo> {
    let mut out = Vec::new();
    let mut stack: Vec<ElementId> = ui.roots().into_iter().rev().collect();
    while let Some(id) = stack.pop() {
        if let Some(info) = ui.element(id) {
            out.push(info);
        }
        stack.extend(ui.children(id).into_iter().rev());
    }
    out
}
