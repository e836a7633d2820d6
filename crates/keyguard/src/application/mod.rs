//! Application layer for KeyGuard.
//!
//! - **`hook_lifecycle`** – The start/stop state machine for the system
//!   keyboard hook and the event-pump thread that keeps it alive.  It depends
//!   only on the [`hook_lifecycle::HookBackend`] trait, so it is tested
//!   against the in-memory backend and run against the Win32 one.

pub mod hook_lifecycle;
