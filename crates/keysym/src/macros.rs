// Declares a key symbol enum with stable numeric codes plus name and code
// lookups. Both symbol spaces are declared through this macro so the helper
// surface stays identical.
macro_rules! key_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $repr:ty {
            $( $variant:ident = $code:expr, )*
        }
    ) => {
        $(#[$meta])*
        #[allow(missing_docs)]
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[repr($repr)]
        pub enum $name {
            $( $variant = $code, )*
        }

        impl $name {
            /// Every symbol in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Numeric code of this symbol.
            pub fn code(self) -> $repr {
                self as $repr
            }

            /// Variant name, e.g. `"LeftArrow"`.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )*
                }
            }

            /// Case-insensitive lookup by variant name.
            pub fn from_name(s: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|k| k.name().eq_ignore_ascii_case(s))
            }

            /// Lookup by numeric code.
            pub fn from_code(code: $repr) -> Option<Self> {
                Self::ALL.iter().copied().find(|k| k.code() == code)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
