//! Hook backends: the OS side of the [`HookBackend`] seam.
//!
//! On Windows, [`windows::WindowsHookBackend`] installs a `WH_KEYBOARD_LL`
//! hook on the pump thread and runs its Win32 message loop.  The hook
//! callback must complete within the system's low-level hook timeout or
//! Windows silently removes it, which is why the filter it runs is pure.
//!
//! # Testability
//!
//! [`mock::MockHookBackend`] simulates installation, message queues and key
//! state in memory so the lifecycle can be tested without Windows hooks.
//!
//! [`HookBackend`]: crate::application::hook_lifecycle::HookBackend

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;
