//! Name and label lookups over the active scene.

use tracing::warn;

use super::{ElementId, ElementInfo, ElementKind, UiSurface, active_in_hierarchy, all_elements};

/// Find an element by name.
///
/// Tries an exact match, then a case-insensitive match, then a
/// case-insensitive substring match. The last tier logs a warning because it
/// usually means the test names a renamed element.
pub fn find_by_name(ui: &dyn UiSurface, name: &str) -> Option<ElementId> {
    let elements = all_elements(ui);
    if let Some(e) = elements.iter().find(|e| e.name == name) {
        return Some(e.id);
    }
    if let Some(e) = elements.iter().find(|e| e.name.eq_ignore_ascii_case(name)) {
        return Some(e.id);
    }
    let needle = name.to_lowercase();
    let hit = elements
        .iter()
        .find(|e| e.name.to_lowercase().contains(&needle))?;
    warn!(query = name, found = %hit.name, "find_fuzzy_match");
    Some(hit.id)
}

/// Find an active button whose own text, or the text of a descendant label,
/// contains `text` (case-insensitive).
pub fn find_button_with_text(ui: &dyn UiSurface, text: &str) -> Option<ElementId> {
    let needle = text.to_lowercase();
    let elements = all_elements(ui);
    let matches = |e: &ElementInfo| {
        e.text
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(&needle))
    };
    for button in elements
        .iter()
        .filter(|e| matches!(e.kind, ElementKind::Button | ElementKind::Toggle))
    {
        if !active_in_hierarchy(ui, button.id) {
            continue;
        }
        if matches(button) || label_matches(ui, button.id, &matches) {
            return Some(button.id);
        }
    }
    None
}

/// Whether any descendant of `id` satisfies `pred`.
fn label_matches(ui: &dyn UiSurface, id: ElementId, pred: &dyn Fn(&ElementInfo) -> bool) -> bool {
    let mut stack = ui.children(id);
    while let Some(child) = stack.pop() {
        if let Some(info) = ui.element(child)
            && pred(&info)
        {
            return true;
        }
        stack.extend(ui.children(child));
    }
    false
}
