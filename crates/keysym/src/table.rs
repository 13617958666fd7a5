use crate::{Key, LegacyKey};

// Translation table between the two symbol spaces. Legacy keys missing from
// this list (F13-F15, pointer buttons, Clear, Help) have no event-queue
// counterpart.
macro_rules! key_table {
    ($m:ident, $arg:tt) => {
        $m! { $arg,
            A => A, B => B, C => C, D => D, E => E, F => F, G => G,
            H => H, I => I, J => J, K => K, L => L, M => M, N => N,
            O => O, P => P, Q => Q, R => R, S => S, T => T, U => U,
            V => V, W => W, X => X, Y => Y, Z => Z,

            Alpha0 => Digit0, Alpha1 => Digit1, Alpha2 => Digit2,
            Alpha3 => Digit3, Alpha4 => Digit4, Alpha5 => Digit5,
            Alpha6 => Digit6, Alpha7 => Digit7, Alpha8 => Digit8,
            Alpha9 => Digit9,

            F1 => F1, F2 => F2, F3 => F3, F4 => F4, F5 => F5, F6 => F6,
            F7 => F7, F8 => F8, F9 => F9, F10 => F10, F11 => F11, F12 => F12,

            Space => Space,
            Return => Enter,
            Tab => Tab,
            Escape => Escape,
            Backspace => Backspace,
            Delete => Delete,
            Insert => Insert,
            Home => Home,
            End => End,
            PageUp => PageUp,
            PageDown => PageDown,
            Pause => Pause,
            Print => PrintScreen,
            Menu => ContextMenu,
            CapsLock => CapsLock,
            Numlock => NumLock,
            ScrollLock => ScrollLock,

            UpArrow => UpArrow,
            DownArrow => DownArrow,
            LeftArrow => LeftArrow,
            RightArrow => RightArrow,

            LeftShift => LeftShift,
            RightShift => RightShift,
            LeftControl => LeftCtrl,
            RightControl => RightCtrl,
            LeftAlt => LeftAlt,
            RightAlt => RightAlt,
            LeftCommand => LeftMeta,
            RightCommand => RightMeta,

            Keypad0 => Numpad0, Keypad1 => Numpad1, Keypad2 => Numpad2,
            Keypad3 => Numpad3, Keypad4 => Numpad4, Keypad5 => Numpad5,
            Keypad6 => Numpad6, Keypad7 => Numpad7, Keypad8 => Numpad8,
            Keypad9 => Numpad9,
            KeypadPeriod => NumpadPeriod,
            KeypadDivide => NumpadDivide,
            KeypadMultiply => NumpadMultiply,
            KeypadMinus => NumpadMinus,
            KeypadPlus => NumpadPlus,
            KeypadEnter => NumpadEnter,
            KeypadEquals => NumpadEquals,

            Quote => Quote,
            BackQuote => Backquote,
            Comma => Comma,
            Period => Period,
            Slash => Slash,
            Backslash => Backslash,
            Semicolon => Semicolon,
            LeftBracket => LeftBracket,
            RightBracket => RightBracket,
            Minus => Minus,
            Equals => Equals,
        }
    };
}

macro_rules! to_modern_match {
    ( $key:expr, $( $l:ident => $k:ident, )* ) => {
        match $key {
            $( LegacyKey::$l => Some(Key::$k), )*
            _ => None,
        }
    };
}

macro_rules! to_legacy_match {
    ( $key:expr, $( $l:ident => $k:ident, )* ) => {
        match $key {
            $( Key::$k => Some(LegacyKey::$l), )*
        }
    };
}

macro_rules! legacy_list {
    ( $unused:tt, $( $l:ident => $k:ident, )* ) => {
        &[ $( LegacyKey::$l, )* ]
    };
}

/// Every legacy key that has an event-queue counterpart, in table order.
pub fn mapped_legacy_keys() -> &'static [LegacyKey] {
    key_table!(legacy_list, ())
}

impl LegacyKey {
    /// Translate into the event-queue symbol space.
    ///
    /// Returns `None` for keys the event-queue backend has no symbol for.
    pub fn to_modern(self) -> Option<Key> {
        key_table!(to_modern_match, self)
    }
}

impl Key {
    /// Translate into the state-polling symbol space.
    ///
    /// Every event-queue symbol has a legacy counterpart.
    pub fn to_legacy(self) -> Option<LegacyKey> {
        key_table!(to_legacy_match, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_map() {
        assert_eq!(LegacyKey::A.to_modern(), Some(Key::A));
        assert_eq!(LegacyKey::Z.to_modern(), Some(Key::Z));
        assert_eq!(LegacyKey::Alpha0.to_modern(), Some(Key::Digit0));
        assert_eq!(LegacyKey::Alpha9.to_modern(), Some(Key::Digit9));
    }

    #[test]
    fn function_and_keypad_keys_do_not_collide() {
        assert_eq!(LegacyKey::F1.to_modern(), Some(Key::F1));
        assert_eq!(LegacyKey::Keypad0.to_modern(), Some(Key::Numpad0));
        assert_ne!(
            LegacyKey::F1.to_modern().map(Key::code),
            LegacyKey::Keypad8.to_modern().map(Key::code)
        );
    }

    #[test]
    fn unmapped_keys_are_none() {
        assert_eq!(LegacyKey::F13.to_modern(), None);
        assert_eq!(LegacyKey::Mouse0.to_modern(), None);
        assert_eq!(LegacyKey::Help.to_modern(), None);
    }

    #[test]
    fn table_is_injective_and_reversible() {
        let keys = mapped_legacy_keys();
        assert!(keys.len() >= 60);
        for &legacy in keys {
            let modern = legacy.to_modern();
            assert!(modern.is_some(), "{legacy} should map");
            assert_eq!(modern.and_then(Key::to_legacy), Some(legacy));
        }
    }

    #[test]
    fn every_modern_key_has_a_legacy_source() {
        for &key in Key::ALL {
            assert!(key.to_legacy().is_some(), "{key} has no legacy source");
        }
    }
}
