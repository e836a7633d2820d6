//! # keyguard-core
//!
//! Shared library for KeyGuard containing the Windows virtual-key table and
//! the shortcut interception filter.
//!
//! This crate has zero dependencies on OS APIs.  The OS hook that feeds it
//! events, and the live modifier-key state it queries, live in the `keyguard`
//! crate.
//!
//! # Architecture overview (for beginners)
//!
//! KeyGuard locks a machine down to a single foreground application by
//! swallowing the OS-level shortcuts a user could otherwise use to escape it
//! (the Windows key, Alt+Tab, Alt+F4, Ctrl+Esc and friends).  Every other key
//! is passed through untouched.
//!
//! - **`keymap`** – Named Windows Virtual Key codes for the keys the filter
//!   cares about, plus a small name table for diagnostics.
//!
//! - **`filter`** – The decision function evaluated for every keystroke on the
//!   system.  It answers "block or pass through?" given the key code and the
//!   instantaneous state of the modifier keys.

pub mod filter;
pub mod keymap;

pub use filter::modifiers::{HeldKeys, ModifierState};
pub use filter::{
    classify, decide, BlockedShortcut, Decision, KeyDirection, KeyEvent, BLOCKED_SHORTCUTS,
};
