//! keyguard library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::hook_lifecycle::{HookError, HookLifecycle};
pub use infrastructure::host_bridge::{start_hook, stop_hook, HookSession};
