//! Effective visibility and interactability of an element.
//!
//! Group containers multiply their opacity into every descendant and can
//! switch input off for the whole subtree. A group flagged with
//! `ignore_parent_groups` is the last one considered on the way up.

use serde::Serialize;

use super::{ElementId, UiSurface, active_in_hierarchy, ancestors};

/// Opacity below which an element counts as invisible.
const VISIBLE_ALPHA: f32 = 0.01;

/// Aggregated state of an element and its enclosing groups.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PanelState {
    /// Active and not effectively transparent.
    pub visible: bool,
    /// Minimum opacity over the enclosing groups.
    pub alpha: f32,
    /// Every enclosing group accepts input.
    pub interactable: bool,
    /// The element and all of its ancestors are active.
    pub active: bool,
    /// At least one enclosing group exists.
    pub has_group: bool,
}

/// Compute the panel state of `id`, `None` when the element is gone.
pub fn panel_state(ui: &dyn UiSurface, id: ElementId) -> Option<PanelState> {
    ui.element(id)?;
    let active = active_in_hierarchy(ui, id);
    let mut alpha: f32 = 1.0;
    let mut interactable = true;
    let mut has_group = false;
    for info in ancestors(ui, id) {
        let Some(group) = info.group else { continue };
        has_group = true;
        alpha = alpha.min(group.alpha);
        interactable &= group.interactable;
        if group.ignore_parent_groups {
            break;
        }
    }
    Some(PanelState {
        visible: active && alpha > VISIBLE_ALPHA,
        alpha,
        interactable,
        active,
        has_group,
    })
}

/// Whether `id` may receive routed input.
///
/// Not ready when inactive, behind a fully transparent group, or behind a
/// group that has input switched off.
pub fn is_ready(ui: &dyn UiSurface, id: ElementId) -> bool {
    panel_state(ui, id).is_some_and(|s| s.active && s.alpha > 0.0 && s.interactable)
}

/// Whether `id` is visible as far as panels and groups are concerned.
pub fn is_visible(ui: &dyn UiSurface, id: ElementId) -> bool {
    panel_state(ui, id).is_some_and(|s| s.visible)
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use super::*;
    use crate::{
        geom::Rect,
        mimic::MimicApp,
        ui::{ElementKind, GroupState},
    };

    #[test]
    fn transparent_ancestor_blocks_readiness() {
        let app = MimicApp::new();
        let root = app.add_root("Canvas", ElementKind::Panel, Rect::new(0.0, 0.0, 100.0, 100.0));
        let menu = app.add_child(root, "Menu", ElementKind::Panel, Rect::new(0.0, 0.0, 100.0, 100.0));
        let button = app.add_child(menu, "Ok", ElementKind::Button, Rect::new(10.0, 10.0, 20.0, 10.0));
        assert!(is_ready(&app, button));

        app.set_group(
            menu,
            GroupState {
                alpha: 0.0,
                ..GroupState::default()
            },
        );
        assert!(!is_ready(&app, button));
        let state = panel_state(&app, button).unwrap();
        assert!(state.has_group);
        assert!(!state.visible);
    }

    #[test]
    fn ignore_parent_groups_stops_the_walk() {
        let app = MimicApp::new();
        let root = app.add_root("Canvas", ElementKind::Panel, Rect::new(0.0, 0.0, 100.0, 100.0));
        let dialog = app.add_child(root, "Dialog", ElementKind::Panel, Rect::new(0.0, 0.0, 50.0, 50.0));
        let button = app.add_child(dialog, "Ok", ElementKind::Button, Rect::new(0.0, 0.0, 10.0, 10.0));
        app.set_group(
            root,
            GroupState {
                interactable: false,
                ..GroupState::default()
            },
        );
        assert!(!is_ready(&app, button));

        app.set_group(
            dialog,
            GroupState {
                ignore_parent_groups: true,
                ..GroupState::default()
            },
        );
        assert!(is_ready(&app, button));
    }

    #[test]
    fn inactive_ancestor_hides_element() {
        let app = MimicApp::new();
        let root = app.add_root("Canvas", ElementKind::Panel, Rect::new(0.0, 0.0, 100.0, 100.0));
        let label = app.add_child(root, "Title", ElementKind::Label, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(is_visible(&app, label));
        app.set_active(root, false);
        assert!(!is_visible(&app, label));
        assert!(!is_ready(&app, label));
    }
}
