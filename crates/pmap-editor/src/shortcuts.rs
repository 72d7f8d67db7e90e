//! Keyboard bindings for the map canvas.
//!
//! Hosts pass `KeyboardEvent.key` plus modifiers and get back a
//! `ShortcutAction`; the session decides what the action means for the
//! current page. Page navigation is not bound here: it needs the host's
//! persistence and goes through breadcrumb clicks and portal activation.

use crate::input::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
    /// Remove every selected block; their connections go with them.
    Delete,
    SelectAll,

    ZoomIn,
    ZoomOut,
    /// Frame every block on the page.
    ZoomToFit,
    /// Back to offset (0, 0) at zoom 1.
    ResetView,

    SendBackward,
    BringForward,
    SendToBack,
    BringToFront,

    /// Escape: abandon a live drag, or drop the selection when idle.
    Deselect,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// `ctrl` and `meta` are interchangeable so one table serves macOS and
    /// everything else. Shifted command combos are checked before plain
    /// command combos; bare keys only match with no modifier held.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        use ShortcutAction::*;

        if modifiers.command() {
            let action = if modifiers.shift {
                match key {
                    "z" | "Z" => Redo,
                    // Shift turns [ ] into { } on most layouts
                    "[" | "{" => SendToBack,
                    "]" | "}" => BringToFront,
                    _ => return None,
                }
            } else {
                match key {
                    "z" | "Z" => Undo,
                    "y" | "Y" => Redo,
                    "a" | "A" => SelectAll,
                    "=" | "+" => ZoomIn,
                    "-" => ZoomOut,
                    "0" => ZoomToFit,
                    "1" => ResetView,
                    "[" => SendBackward,
                    "]" => BringForward,
                    _ => return None,
                }
            };
            return Some(action);
        }

        if modifiers.shift || modifiers.alt {
            return None;
        }
        match key {
            "Delete" | "Backspace" => Some(Delete),
            "Escape" => Some(Deselect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: Modifiers = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
    const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    const META_SHIFT: Modifiers = Modifiers {
        shift: true,
        ..META
    };

    fn check(cases: &[(&str, Modifiers, Option<ShortcutAction>)]) {
        for &(key, mods, expected) in cases {
            assert_eq!(ShortcutMap::resolve(key, mods), expected, "{key} with {mods:?}");
        }
    }

    #[test]
    fn history_keys_accept_ctrl_or_meta() {
        use ShortcutAction::*;
        check(&[
            ("z", META, Some(Undo)),
            ("z", CTRL, Some(Undo)),
            ("Z", META_SHIFT, Some(Redo)),
            ("y", CTRL, Some(Redo)),
        ]);
    }

    #[test]
    fn bare_keys_edit_the_selection() {
        use ShortcutAction::*;
        check(&[
            ("Delete", Modifiers::NONE, Some(Delete)),
            ("Backspace", Modifiers::NONE, Some(Delete)),
            ("Escape", Modifiers::NONE, Some(Deselect)),
            ("a", META, Some(SelectAll)),
        ]);
    }

    #[test]
    fn bracket_keys_restack_blocks() {
        use ShortcutAction::*;
        check(&[
            ("[", META, Some(SendBackward)),
            ("]", CTRL, Some(BringForward)),
            ("{", META_SHIFT, Some(SendToBack)),
            ("}", META_SHIFT, Some(BringToFront)),
        ]);
    }

    #[test]
    fn view_keys() {
        use ShortcutAction::*;
        check(&[
            ("+", META, Some(ZoomIn)),
            ("-", CTRL, Some(ZoomOut)),
            ("0", META, Some(ZoomToFit)),
            ("1", META, Some(ResetView)),
        ]);
    }

    #[test]
    fn unbound_combos_resolve_to_nothing() {
        check(&[
            ("z", Modifiers::NONE, None),
            ("Delete", Modifiers::SHIFT, None),
            ("q", META, None),
            ("0", META_SHIFT, None),
        ]);
    }
}
