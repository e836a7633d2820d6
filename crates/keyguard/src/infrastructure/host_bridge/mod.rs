//! Host bridge: the two boundary operations the host application calls.
//!
//! The host (an application shell, or a runtime binding that marshals calls
//! across a language boundary) sees exactly:
//!
//! | Operation      | Result                                                    |
//! |----------------|-----------------------------------------------------------|
//! | [`start_hook`] | `Ok(())`, `AlreadyRunning`, or `InstallFailed { code }`   |
//! | [`stop_hook`]  | never fails; no-op when not running                       |
//!
//! Both act on one process-wide [`HookLifecycle`], because the OS hook itself
//! is process-global and its callback carries no instance context.
//!
//! # `CommandResult<T>` wrapper
//!
//! Hosts that marshal results as JSON can use [`start_hook_command`] and
//! [`stop_hook_command`], which return `CommandResult<T>` rather than
//! `Result<T, E>`.  Every response has the same shape:
//! `{ success: bool, data: T | null, error: string | null, error_kind: string | null }`.
//! `error_kind` lets the host tell "already running" (nothing to do) apart
//! from "install failed" (worth retrying) without parsing messages.
//!
//! [`HookLifecycle`]: crate::application::hook_lifecycle::HookLifecycle

use serde::Serialize;
use tracing::debug;

use crate::application::hook_lifecycle::HookError;
use crate::infrastructure::storage::config::GuardConfig;

/// Options applied when the process-wide lifecycle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    pub boost_pump_priority: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            boost_pump_priority: true,
        }
    }
}

impl From<&GuardConfig> for BridgeOptions {
    fn from(config: &GuardConfig) -> Self {
        Self {
            boost_pump_priority: config.boost_pump_priority,
        }
    }
}

/// Creates the process-wide lifecycle with `options`.
///
/// Optional; without it the first [`start_hook`] uses
/// [`BridgeOptions::default`].  Returns `false` if the lifecycle already
/// exists or the platform has no hook facility.
pub fn init(options: BridgeOptions) -> bool {
    platform::init(options)
}

/// Starts intercepting keystrokes system-wide.
///
/// # Errors
///
/// - [`HookError::AlreadyRunning`] if interception is already active.
/// - [`HookError::InstallFailed`] if the OS refused the hook.
/// - [`HookError::PumpSpawnFailed`] if the pump thread could not start.
/// - [`HookError::UnsupportedPlatform`] off Windows.
pub fn start_hook() -> Result<(), HookError> {
    platform::start()
}

/// Stops intercepting keystrokes.  Safe to call at any time.
pub fn stop_hook() {
    platform::stop();
}

/// Returns `true` while interception is active.
pub fn is_hook_running() -> bool {
    platform::is_running()
}

/// [`start_hook`] as a serialisable command result.
pub fn start_hook_command() -> CommandResult<()> {
    start_hook().into()
}

/// [`stop_hook`] as a serialisable command result.  Always successful.
pub fn stop_hook_command() -> CommandResult<()> {
    stop_hook();
    CommandResult::ok(())
}

/// Uniform response wrapper for hosts that marshal results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn err(error: &HookError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }

    /// Serialises the result as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `T` fails to serialise.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T: Serialize> From<Result<T, HookError>> for CommandResult<T> {
    fn from(result: Result<T, HookError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                debug!(kind = e.kind(), "hook command failed: {e}");
                Self::err(&e)
            }
        }
    }
}

/// Keeps interception active for its lifetime.
///
/// Dropping the session calls [`stop_hook`], so unwinding out of the host's
/// main function or returning early with an error still removes the hook
/// before the process exits.
#[must_use = "dropping the session stops interception immediately"]
#[derive(Debug)]
pub struct HookSession {
    _private: (),
}

impl HookSession {
    /// Calls [`start_hook`] and returns a guard that stops it on drop.
    ///
    /// # Errors
    ///
    /// Same as [`start_hook`]; no guard is returned on error.
    pub fn start() -> Result<Self, HookError> {
        start_hook()?;
        Ok(Self { _private: () })
    }
}

impl Drop for HookSession {
    fn drop(&mut self) {
        stop_hook();
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use std::sync::OnceLock;

    use super::BridgeOptions;
    use crate::application::hook_lifecycle::{HookError, HookLifecycle};
    use crate::infrastructure::hook_backend::windows::WindowsHookBackend;

    static LIFECYCLE: OnceLock<HookLifecycle<WindowsHookBackend>> = OnceLock::new();

    fn make(options: BridgeOptions) -> HookLifecycle<WindowsHookBackend> {
        HookLifecycle::new(WindowsHookBackend::new(options.boost_pump_priority))
    }

    pub(super) fn init(options: BridgeOptions) -> bool {
        LIFECYCLE.set(make(options)).is_ok()
    }

    pub(super) fn start() -> Result<(), HookError> {
        LIFECYCLE
            .get_or_init(|| make(BridgeOptions::default()))
            .start()
    }

    pub(super) fn stop() {
        if let Some(lifecycle) = LIFECYCLE.get() {
            lifecycle.stop();
        }
    }

    pub(super) fn is_running() -> bool {
        LIFECYCLE.get().is_some_and(HookLifecycle::is_running)
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::BridgeOptions;
    use crate::application::hook_lifecycle::HookError;

    pub(super) fn init(_options: BridgeOptions) -> bool {
        false
    }

    pub(super) fn start() -> Result<(), HookError> {
        Err(HookError::UnsupportedPlatform(format!(
            "low-level keyboard hooks are only available on Windows, not {}",
            std::env::consts::OS
        )))
    }

    pub(super) fn stop() {}

    pub(super) fn is_running() -> bool {
        false
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
