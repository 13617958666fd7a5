//! Plain-text dump of the active scene, attached to failures.

use std::fmt::Write as _;

use super::{ElementId, ElementInfo, ElementKind, UiSurface};
use crate::config::DEFAULTS;

/// Heading line of every dump.
pub const HEADING: &str = "=== Active Scene Hierarchy ===";

/// Dump the active scene with the default depth limit.
pub fn dump(ui: &dyn UiSurface) -> String {
    dump_with_depth(ui, DEFAULTS.hierarchy_depth)
}

/// Dump the active scene, descending at most `max_depth` levels.
///
/// Each line is `[+]` (active) or `[-]` (inactive), the element name, its kind
/// and any notable state. Long texts are truncated.
pub fn dump_with_depth(ui: &dyn UiSurface, max_depth: usize) -> String {
    let mut out = String::new();
    let _ignored = writeln!(out, "{HEADING}");
    let _ignored = writeln!(out, "Scene: {}", ui.scene_name());
    for root in ui.roots() {
        write_node(ui, root, 0, max_depth, &mut out);
    }
    out
}

/// Append one element and its subtree.
fn write_node(ui: &dyn UiSurface, id: ElementId, depth: usize, max_depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    if depth > max_depth {
        let _ignored = writeln!(out, "{indent}... (max depth reached)");
        return;
    }
    let Some(info) = ui.element(id) else { return };
    let _ignored = writeln!(out, "{indent}{}", describe(&info));
    for child in ui.children(id) {
        write_node(ui, child, depth + 1, max_depth, out);
    }
}

/// One-line description of an element.
fn describe(info: &ElementInfo) -> String {
    let marker = if info.active { "[+]" } else { "[-]" };
    let mut line = format!("{marker} {} ({:?})", info.name, info.kind);
    if matches!(
        info.kind,
        ElementKind::Button | ElementKind::Toggle | ElementKind::TextField | ElementKind::Slider
    ) && !info.interactable
    {
        line.push_str(" disabled");
    }
    if let Some(group) = info.group {
        let _ignored = write!(
            line,
            " group(alpha={:.2}, interactable={})",
            group.alpha, group.interactable
        );
    }
    if let Some(scroll) = info.scroll {
        let _ignored = write!(line, " scroll={:.2}", scroll.vertical);
    }
    if let Some(text) = &info.text {
        let _ignored = write!(line, " \"{}\"", truncate(text, DEFAULTS.hierarchy_text_len));
    }
    if info.missing_asset {
        line.push_str(" MISSING-ASSET");
    }
    line
}

/// Truncate to `max` characters, appending an ellipsis when shortened.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max).collect();
    s.push_str("...");
    s
}

#[cfg(all(test, feature = "mimic"))]
mod tests {
    use super::*;
    use crate::{geom::Rect, mimic::MimicApp};

    #[test]
    fn dump_marks_active_state_and_truncates_text() {
        let app = MimicApp::new();
        let root = app.add_root("Canvas", ElementKind::Panel, Rect::new(0.0, 0.0, 10.0, 10.0));
        let label = app.add_child(root, "Body", ElementKind::Label, Rect::new(0.0, 0.0, 1.0, 1.0));
        app.set_text(label, "A very long sentence that keeps going");
        let hidden = app.add_child(root, "Hidden", ElementKind::Button, Rect::new(0.0, 0.0, 1.0, 1.0));
        app.set_active(hidden, false);

        let text = dump(&app);
        assert!(text.starts_with(HEADING));
        assert!(text.contains("[+] Canvas (Panel)"));
        assert!(text.contains("  [+] Body (Label) \"A very long sentence...\""));
        assert!(text.contains("  [-] Hidden (Button)"));
    }

    #[test]
    fn depth_limit_is_reported() {
        let app = MimicApp::new();
        let mut parent = app.add_root("L0", ElementKind::Panel, Rect::new(0.0, 0.0, 1.0, 1.0));
        for i in 1..5 {
            parent = app.add_child(parent, &format!("L{i}"), ElementKind::Panel, Rect::new(0.0, 0.0, 1.0, 1.0));
        }
        let text = dump_with_depth(&app, 2);
        assert!(text.contains("    [+] L2 (Panel)"));
        assert!(text.contains("      ... (max depth reached)"));
        assert!(!text.contains("L4"));
    }
}
