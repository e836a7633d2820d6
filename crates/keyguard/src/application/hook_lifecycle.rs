//! HookLifecycle: installs and removes the system keyboard hook.
//!
//! The lifecycle owns the installed hook handle, the running flag and the
//! identity of the pump thread, and exposes exactly two transitions:
//! [`HookLifecycle::start`] and [`HookLifecycle::stop`].
//!
//! # Threads
//!
//! ```text
//! caller thread                     pump thread
//! ─────────────                     ───────────
//! start() ── spawn ───────────────► register_pump_thread()
//!    │                              install()
//!    │ ◄──────── install report ─── (Ok(handle, thread) | Err(code))
//!    │ running = true
//!    │ ─────────────── go ────────► loop { wait_message(); check running; dispatch() }
//! stop()
//!    │ running = false
//!    │ wake(thread) ──────────────► wait_message() returns, running is false, exit
//!    │ uninstall(handle)
//! ```
//!
//! Windows delivers low-level hook callbacks on the thread that installed the
//! hook, and only while that thread is retrieving messages.  The pump thread
//! therefore installs the hook itself and reports the outcome back, so
//! `start()` still fails synchronously when installation is refused.
//! `start()` waits for that report and nothing else.
//!
//! `stop()` uninstalls the hook synchronously before returning; the pump
//! thread's own exit is best-effort and never joined.
//!
//! # Concurrency
//!
//! `start()` and `stop()` are serialized by the session mutex.  The running
//! flag is an atomic owned by each session, so a pump thread left parked by a
//! previous session can never be revived by a later `start()`.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Name given to the spawned message-pump thread.
pub const PUMP_THREAD_NAME: &str = "keyguard-pump";

/// OS identifier of the pump thread (a Win32 thread id on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpThreadId(pub u32);

impl fmt::Display for PumpThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one blocking message retrieval on the pump thread.
#[derive(Debug)]
pub enum Retrieved<M> {
    /// A message was retrieved and may be dispatched.
    Message(M),
    /// The queue signalled termination (`WM_QUIT`).
    Quit,
    /// Retrieval failed with the given platform error code.
    Failed(u32),
}

/// Error type for hook lifecycle operations.
#[derive(Debug, Error)]
pub enum HookError {
    /// `start()` was called while a hook is already installed.
    #[error("keyboard hook is already running")]
    AlreadyRunning,

    /// The OS refused to install the hook.
    #[error("failed to install keyboard hook: os error {code}")]
    InstallFailed { code: u32 },

    /// The pump thread could not be created, or died before reporting.
    #[error("failed to start hook pump thread: {0}")]
    PumpSpawnFailed(#[source] io::Error),

    /// No low-level keyboard hook facility on this platform.
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

impl HookError {
    /// Stable machine-readable name for host layers that branch on the error.
    pub fn kind(&self) -> &'static str {
        match self {
            HookError::AlreadyRunning => "already_running",
            HookError::InstallFailed { .. } => "install_failed",
            HookError::PumpSpawnFailed(_) => "pump_spawn_failed",
            HookError::UnsupportedPlatform(_) => "unsupported_platform",
        }
    }
}

/// OS seam for the lifecycle.
///
/// The production implementation wraps the Win32 hook and message APIs; the
/// mock implementation simulates them in memory so the lifecycle can be
/// exercised on any platform.
pub trait HookBackend: Send + Sync + 'static {
    /// Opaque handle to an installed hook.
    type Handle: Copy + Send + fmt::Debug + 'static;
    /// A retrieved message, only ever touched on the pump thread.
    type Message;

    /// Called first on the pump thread; returns its identity.
    fn register_pump_thread(&self) -> PumpThreadId;

    /// Installs the keyboard hook bound to the interception filter.
    ///
    /// Called on the pump thread.  The error is the platform error code.
    fn install(&self) -> Result<Self::Handle, u32>;

    /// Removes a hook returned by [`HookBackend::install`].  Synchronous.
    fn uninstall(&self, handle: Self::Handle);

    /// Blocks until the next message for the calling pump thread.
    fn wait_message(&self) -> Retrieved<Self::Message>;

    /// Translates and dispatches a retrieved message.
    fn dispatch(&self, message: &Self::Message);

    /// Posts a no-op message to `thread` so a blocked
    /// [`HookBackend::wait_message`] returns.  Must not block.
    ///
    /// Returns `false` if the message could not be posted.
    fn wake(&self, thread: PumpThreadId) -> bool;
}

/// State guarded by the transition lock.
struct Session<H> {
    hook: Option<H>,
    pump_thread: Option<PumpThreadId>,
    running: Arc<AtomicBool>,
}

impl<H> Session<H> {
    fn idle() -> Self {
        Self {
            hook: None,
            pump_thread: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

type InstallReport<H> = Result<(H, PumpThreadId), u32>;

/// Start/stop state machine for the system keyboard hook.
pub struct HookLifecycle<B: HookBackend> {
    backend: Arc<B>,
    session: Mutex<Session<B::Handle>>,
    live_pumps: Arc<AtomicUsize>,
}

impl<B: HookBackend> HookLifecycle<B> {
    /// Creates an idle lifecycle over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            session: Mutex::new(Session::idle()),
            live_pumps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Installs the keyboard hook and starts the pump thread.
    ///
    /// # Errors
    ///
    /// - [`HookError::AlreadyRunning`] if a hook is already installed.
    /// - [`HookError::InstallFailed`] if the OS refused the hook.
    /// - [`HookError::PumpSpawnFailed`] if the pump thread could not run.
    ///
    /// No state changes on any error.
    pub fn start(&self) -> Result<(), HookError> {
        let mut session = self.lock_session();
        if session.hook.is_some() {
            debug!("start requested while the hook is already installed");
            return Err(HookError::AlreadyRunning);
        }

        let running = Arc::new(AtomicBool::new(false));
        let (report_tx, report_rx) = mpsc::sync_channel::<InstallReport<B::Handle>>(1);
        let (go_tx, go_rx) = mpsc::sync_channel::<()>(1);

        let backend = Arc::clone(&self.backend);
        let pump_running = Arc::clone(&running);
        let live_pumps = Arc::clone(&self.live_pumps);

        let spawned = thread::Builder::new()
            .name(PUMP_THREAD_NAME.to_string())
            .spawn(move || {
                let _live = LivePump::enter(&live_pumps);
                let thread = backend.register_pump_thread();

                let handle = match backend.install() {
                    Ok(handle) => handle,
                    Err(code) => {
                        let _ = report_tx.send(Err(code));
                        return;
                    }
                };
                if report_tx.send(Ok((handle, thread))).is_err() {
                    // Nobody is waiting for the hook any more.
                    backend.uninstall(handle);
                    return;
                }
                if go_rx.recv().is_ok() {
                    run_pump(&*backend, &pump_running, thread);
                }
            });

        if let Err(e) = spawned {
            error!("failed to spawn {PUMP_THREAD_NAME}: {e}");
            return Err(HookError::PumpSpawnFailed(e));
        }

        match report_rx.recv() {
            Ok(Ok((handle, thread))) => {
                running.store(true, Ordering::SeqCst);
                session.hook = Some(handle);
                session.pump_thread = Some(thread);
                session.running = running;
                let _ = go_tx.send(());
                info!(pump_thread = %thread, "keyboard hook installed");
                Ok(())
            }
            Ok(Err(code)) => {
                warn!(code, "keyboard hook installation refused");
                Err(HookError::InstallFailed { code })
            }
            Err(_) => {
                error!("{PUMP_THREAD_NAME} exited before reporting the hook installation");
                Err(HookError::PumpSpawnFailed(io::Error::other(
                    "pump thread exited before reporting",
                )))
            }
        }
    }

    /// Removes the keyboard hook and tells the pump thread to exit.
    ///
    /// A no-op when not running.  The hook is uninstalled before this returns.
    pub fn stop(&self) {
        let mut session = self.lock_session();
        let Some(handle) = session.hook.take() else {
            debug!("stop requested while the hook is not installed");
            return;
        };

        session.running.store(false, Ordering::SeqCst);

        if let Some(thread) = session.pump_thread.take() {
            if !self.backend.wake(thread) {
                warn!(
                    pump_thread = %thread,
                    "could not wake pump thread; it exits on its next message"
                );
            }
        }

        self.backend.uninstall(handle);
        info!("keyboard hook removed");
    }

    /// Returns `true` while a hook is installed and its pump is running.
    pub fn is_running(&self) -> bool {
        let session = self.lock_session();
        session.hook.is_some() && session.running.load(Ordering::SeqCst)
    }

    /// Identity of the current session's pump thread, if any.
    pub fn pump_thread(&self) -> Option<PumpThreadId> {
        self.lock_session().pump_thread
    }

    /// Number of pump threads that have not exited yet, across all sessions.
    pub fn live_pump_threads(&self) -> usize {
        self.live_pumps.load(Ordering::SeqCst)
    }

    /// The backend this lifecycle drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // A panic inside a transition must not make stop() unreachable.
    fn lock_session(&self) -> MutexGuard<'_, Session<B::Handle>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: HookBackend> Drop for HookLifecycle<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Event-pump loop run on the spawned thread.
fn run_pump<B: HookBackend>(backend: &B, running: &AtomicBool, thread: PumpThreadId) {
    debug!(pump_thread = %thread, "pump loop entered");

    while running.load(Ordering::SeqCst) {
        let message = match backend.wait_message() {
            Retrieved::Message(message) => message,
            Retrieved::Quit => {
                debug!(pump_thread = %thread, "pump received quit");
                break;
            }
            Retrieved::Failed(code) => {
                if running.load(Ordering::SeqCst) {
                    warn!(pump_thread = %thread, code, "message retrieval failed; pump exiting while hook is installed");
                }
                break;
            }
        };

        if !running.load(Ordering::SeqCst) {
            break;
        }
        backend.dispatch(&message);
    }

    debug!(pump_thread = %thread, "pump thread exited");
}

/// Counts a pump thread as live for as long as it is held.
struct LivePump<'a>(&'a AtomicUsize);

impl<'a> LivePump<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LivePump<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::hook_backend::mock::{wait_until, MockHookBackend};

    const SETTLE: Duration = Duration::from_secs(2);

    fn make_lifecycle() -> HookLifecycle<MockHookBackend> {
        HookLifecycle::new(MockHookBackend::new())
    }

    #[test]
    fn test_new_lifecycle_is_idle() {
        let lifecycle = make_lifecycle();

        assert!(!lifecycle.is_running());
        assert_eq!(lifecycle.pump_thread(), None);
        assert_eq!(lifecycle.backend().installed_hooks(), 0);
    }

    #[test]
    fn test_start_installs_hook_and_records_pump_thread() {
        // Arrange
        let lifecycle = make_lifecycle();

        // Act
        lifecycle.start().expect("start should succeed");

        // Assert
        assert!(lifecycle.is_running());
        assert_eq!(lifecycle.backend().installed_hooks(), 1);
        assert!(lifecycle.pump_thread().is_some());
        assert_eq!(lifecycle.live_pump_threads(), 1);
    }

    #[test]
    fn test_hook_installed_from_pump_thread() {
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("start should succeed");

        let installer = lifecycle.backend().last_installer();
        assert_eq!(installer, lifecycle.pump_thread());
    }

    #[test]
    fn test_start_twice_reports_already_running() {
        // Arrange
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("first start should succeed");
        let thread = lifecycle.pump_thread();

        // Act
        let second = lifecycle.start();

        // Assert
        assert!(matches!(second, Err(HookError::AlreadyRunning)));
        assert_eq!(lifecycle.backend().installed_hooks(), 1);
        assert_eq!(lifecycle.backend().install_attempts(), 1);
        assert_eq!(lifecycle.pump_thread(), thread);
    }

    #[test]
    fn test_install_failure_carries_code_and_leaves_no_state() {
        // Arrange
        let lifecycle = make_lifecycle();
        lifecycle.backend().fail_next_install(5);

        // Act
        let result = lifecycle.start();

        // Assert
        assert!(matches!(result, Err(HookError::InstallFailed { code: 5 })));
        assert!(!lifecycle.is_running());
        assert_eq!(lifecycle.pump_thread(), None);
        assert_eq!(lifecycle.backend().installed_hooks(), 0);
        assert!(wait_until(SETTLE, || lifecycle.live_pump_threads() == 0));
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let lifecycle = make_lifecycle();

        lifecycle.stop();
        lifecycle.stop();

        assert!(!lifecycle.is_running());
        assert_eq!(lifecycle.backend().uninstall_count(), 0);
        assert_eq!(lifecycle.backend().wake_count(), 0);
    }

    #[test]
    fn test_stop_uninstalls_before_returning_and_wakes_pump() {
        // Arrange
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("start should succeed");

        // Act
        lifecycle.stop();

        // Assert: uninstall is synchronous
        assert_eq!(lifecycle.backend().installed_hooks(), 0);
        assert_eq!(lifecycle.backend().uninstall_count(), 1);
        assert_eq!(lifecycle.backend().wake_count(), 1);
        assert!(!lifecycle.is_running());
        assert_eq!(lifecycle.pump_thread(), None);
        assert!(wait_until(SETTLE, || lifecycle.live_pump_threads() == 0));
    }

    #[test]
    fn test_pump_dispatches_messages_while_running() {
        // Arrange
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("start should succeed");
        let thread = lifecycle.pump_thread().expect("pump thread recorded");

        // Act
        assert!(lifecycle.backend().post_input(thread));
        assert!(lifecycle.backend().post_input(thread));

        // Assert
        assert!(wait_until(SETTLE, || lifecycle.backend().dispatched_count() == 2));
        assert!(lifecycle.is_running());
    }

    #[test]
    fn test_pump_exits_on_retrieval_failure_without_touching_hook() {
        // Arrange
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("start should succeed");
        let thread = lifecycle.pump_thread().expect("pump thread recorded");

        // Act
        lifecycle.backend().post_failure(thread, 1444);

        // Assert: the pump is gone but only stop() removes the hook
        assert!(wait_until(SETTLE, || lifecycle.live_pump_threads() == 0));
        assert_eq!(lifecycle.backend().installed_hooks(), 1);
        lifecycle.stop();
        assert_eq!(lifecycle.backend().installed_hooks(), 0);
    }

    #[test]
    fn test_pump_exits_on_quit() {
        let lifecycle = make_lifecycle();
        lifecycle.start().expect("start should succeed");
        let thread = lifecycle.pump_thread().expect("pump thread recorded");

        lifecycle.backend().post_quit(thread);

        assert!(wait_until(SETTLE, || lifecycle.live_pump_threads() == 0));
    }

    #[test]
    fn test_drop_uninstalls_live_hook() {
        // Arrange
        let backend_handle;
        {
            let lifecycle = make_lifecycle();
            lifecycle.start().expect("start should succeed");
            backend_handle = lifecycle.backend().clone();

            // Act: lifecycle dropped here
        }

        // Assert
        assert_eq!(backend_handle.installed_hooks(), 0);
        assert_eq!(backend_handle.uninstall_count(), 1);
    }

    #[test]
    fn test_hook_error_kinds_are_distinct() {
        let errors = [
            HookError::AlreadyRunning,
            HookError::InstallFailed { code: 5 },
            HookError::PumpSpawnFailed(io::Error::other("x")),
            HookError::UnsupportedPlatform("linux".to_string()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(HookError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_install_failed_message_includes_code() {
        let msg = HookError::InstallFailed { code: 1428 }.to_string();
        assert!(msg.contains("1428"), "message was: {msg}");
    }
}
