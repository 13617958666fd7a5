//! keysym: the two key symbol spaces spoken by the input shim.
//!
//! - `LegacyKey`: symbols of the state-polling input API. Test code names keys
//!   in this space.
//! - `Key`: symbols of the event-queue input API, with their numeric codes.
//! - `LegacyKey::to_modern` / `Key::to_legacy`: the partial translation table.
//!   Unmapped symbols translate to `None`.
//! - Spec helpers: `LegacyKey::from_spec` and `LegacyKey::to_spec` for config
//!   files and command lines ("f9", "esc", "1", ...).

#[macro_use]
mod macros;

mod legacy;
pub use legacy::LegacyKey;

mod key;
pub use key::Key;

mod spec;

mod table;
pub use table::mapped_legacy_keys;
