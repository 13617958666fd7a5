use crate::LegacyKey;

// Shorthand symbols accepted and emitted for digits and punctuation.
macro_rules! key_spec_map {
    ($m:ident, $arg:tt) => {
        $m! { $arg,
            Alpha0 => "0",
            Alpha1 => "1",
            Alpha2 => "2",
            Alpha3 => "3",
            Alpha4 => "4",
            Alpha5 => "5",
            Alpha6 => "6",
            Alpha7 => "7",
            Alpha8 => "8",
            Alpha9 => "9",
            Space => " ",
            Minus => "-",
            Equals => "=",
            LeftBracket => "[",
            RightBracket => "]",
            Backslash => "\\",
            Semicolon => ";",
            Quote => "'",
            Comma => ",",
            Period => ".",
            Slash => "/",
            BackQuote => "`",
        }
    };
}

macro_rules! to_spec_match {
    ( $key:expr, $( $k:ident => $s:expr, )* ) => {
        match $key {
            $( LegacyKey::$k => $s, )*
            _ => $key.name(),
        }
    }
}

macro_rules! from_spec_match {
    ( $s:expr, $( $k:ident => $v:expr, )* ) => {{
        match $s {
            $( $v => Some(LegacyKey::$k), )*
            _ => None,
        }
    }}
}

// Aliases that only apply to parsing specs (not emitted by to_spec).
macro_rules! key_spec_aliases {
    ($m:ident, $arg:expr) => {
        $m! { $arg,
            LeftControl => "ctrl",
            LeftShift => "shift",
            LeftAlt => "alt",
            LeftCommand => "cmd",
            CapsLock => "caps",

            Return => "enter",
            Return => "ret",
            Escape => "esc",
            Space => "space",
            Delete => "del",
            Backspace => "bksp",
            Print => "prtsc",

            LeftArrow => "left",
            RightArrow => "right",
            UpArrow => "up",
            DownArrow => "down",
            PageUp => "pgup",
            PageDown => "pgdn",

            KeypadEnter => "kpenter",
        }
    };
}

/// Parses a key specification into a `LegacyKey`.
///
/// First tries a case-insensitive variant name. If that fails, falls back to
/// symbol shorthands for digits and punctuation, then to alias words.
pub fn from_spec(s: &str) -> Option<LegacyKey> {
    if let Some(k) = LegacyKey::from_name(s) {
        return Some(k);
    }
    if let some @ Some(_) = key_spec_map!(from_spec_match, s) {
        return some;
    }
    let lowered = s.to_ascii_lowercase();
    key_spec_aliases!(from_spec_match, lowered.as_str())
}

/// Returns the key specification string for a `LegacyKey`.
pub fn to_spec(key: LegacyKey) -> String {
    let s = key_spec_map!(to_spec_match, key);
    s.to_ascii_lowercase()
}

impl LegacyKey {
    /// Parses a key specification string, e.g. `"f9"`, `"esc"` or `"1"`.
    pub fn from_spec(s: &str) -> Option<Self> {
        from_spec(s).or_else(|| from_spec(s.trim()))
    }

    /// Returns the key specification string for this key.
    ///
    /// Digits, punctuation and space emit their symbol; everything else emits
    /// the lower-cased variant name.
    pub fn to_spec(self) -> String {
        to_spec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roundtrip(k: LegacyKey) {
        let spec = to_spec(k);
        assert_eq!(
            from_spec(&spec),
            Some(k),
            "roundtrip failed for {} -> {}",
            k.name(),
            spec
        );
    }

    #[test]
    fn function_keys() {
        assert_roundtrip(LegacyKey::F9);
        assert_eq!(LegacyKey::from_spec("F9"), Some(LegacyKey::F9));
        assert_eq!(LegacyKey::from_spec(" f12 "), Some(LegacyKey::F12));
    }

    #[test]
    fn digits_and_punctuation() {
        assert_roundtrip(LegacyKey::Alpha1);
        assert_eq!(from_spec("1"), Some(LegacyKey::Alpha1));
        assert_eq!(to_spec(LegacyKey::Comma), ",");
        assert_eq!(from_spec("`"), Some(LegacyKey::BackQuote));
    }

    #[test]
    fn aliases() {
        assert_eq!(from_spec("esc"), Some(LegacyKey::Escape));
        assert_eq!(from_spec("Enter"), Some(LegacyKey::Return));
        assert_eq!(from_spec("ctrl"), Some(LegacyKey::LeftControl));
        assert_eq!(from_spec("pgdn"), Some(LegacyKey::PageDown));
        assert_eq!(from_spec("nonsense"), None);
    }
}
