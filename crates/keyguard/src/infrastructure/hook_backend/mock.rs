//! Mock hook backend for unit and integration testing.
//!
//! Simulates the parts of Win32 the lifecycle relies on: hook installation
//! (with injectable failure), per-thread message queues with a blocking
//! retrieve, thread-targeted wake messages, and the live keyboard state the
//! filter queries.  No OS hooks are installed.
//!
//! [`MockHookBackend::press`] plays the role of the OS delivering a keystroke
//! through the hook chain: the filter runs only while a hook is installed.

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use keyguard_core::{decide, Decision, HeldKeys, KeyEvent};

use crate::application::hook_lifecycle::{HookBackend, PumpThreadId, Retrieved};

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns the final value of `condition`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Handle returned by [`MockHookBackend::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockHookHandle(pub u64);

/// A message retrieved by the mock pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMessage {
    /// `WM_NULL`: posted by wakes and by [`MockHookBackend::post_input`].
    Null,
}

#[derive(Debug)]
enum Queued {
    Message(MockMessage),
    Quit,
    Fail(u32),
}

#[derive(Debug, Default)]
struct MockState {
    installed: HashSet<MockHookHandle>,
    next_handle: u64,
    next_thread: u32,
    install_attempts: u32,
    uninstall_count: u32,
    wake_count: u32,
    dispatched_count: u32,
    parked: usize,
    fail_next_install: Option<u32>,
    wake_enabled: bool,
    last_installer: Option<PumpThreadId>,
    queues: HashMap<PumpThreadId, VecDeque<Queued>>,
    held: HeldKeys,
    decisions: Vec<(KeyEvent, Decision)>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    queue_changed: Condvar,
}

thread_local! {
    static CURRENT_PUMP: Cell<Option<PumpThreadId>> = const { Cell::new(None) };
}

/// In-memory implementation of [`HookBackend`].
///
/// Clones share the same simulated system, so a test can keep a handle after
/// handing the backend to a lifecycle.
#[derive(Debug, Clone)]
pub struct MockHookBackend {
    shared: Arc<Shared>,
}

impl MockHookBackend {
    /// Creates a backend with no hooks installed and wakes enabled.
    pub fn new() -> Self {
        let shared = Shared::default();
        shared.state.lock().unwrap_or_else(PoisonError::into_inner).wake_enabled = true;
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Makes the next [`HookBackend::install`] fail with `code`.
    pub fn fail_next_install(&self, code: u32) {
        self.state().fail_next_install = Some(code);
    }

    /// Makes future wakes fail, as if `PostThreadMessageW` was refused.
    pub fn set_wake_enabled(&self, enabled: bool) {
        self.state().wake_enabled = enabled;
    }

    /// Marks `vk` as physically held down.
    pub fn hold(&self, vk: u32) {
        self.state().held.press(vk);
    }

    /// Marks `vk` as released.
    pub fn release(&self, vk: u32) {
        self.state().held.release(vk);
    }

    /// Delivers a keystroke through the simulated hook chain.
    ///
    /// Returns the filter's decision, or `None` if no hook is installed and
    /// the key went straight to the focused application.
    pub fn press(&self, event: KeyEvent) -> Option<Decision> {
        let mut state = self.state();
        if state.installed.is_empty() {
            return None;
        }
        let decision = decide(&event, &state.held);
        state.decisions.push((event, decision));
        Some(decision)
    }

    /// Posts an unrelated input message to `thread`'s queue.
    ///
    /// Stands in for the next real event a parked pump would receive.
    pub fn post_input(&self, thread: PumpThreadId) -> bool {
        self.post(thread, Queued::Message(MockMessage::Null))
    }

    /// Posts `WM_QUIT` to `thread`.
    pub fn post_quit(&self, thread: PumpThreadId) -> bool {
        self.post(thread, Queued::Quit)
    }

    /// Makes the next retrieval on `thread` fail with `code`.
    pub fn post_failure(&self, thread: PumpThreadId, code: u32) -> bool {
        self.post(thread, Queued::Fail(code))
    }

    /// Number of hooks currently installed.
    pub fn installed_hooks(&self) -> usize {
        self.state().installed.len()
    }

    pub fn install_attempts(&self) -> u32 {
        self.state().install_attempts
    }

    pub fn uninstall_count(&self) -> u32 {
        self.state().uninstall_count
    }

    /// Number of successfully posted wake messages.
    pub fn wake_count(&self) -> u32 {
        self.state().wake_count
    }

    /// Number of messages dispatched by pump threads.
    pub fn dispatched_count(&self) -> u32 {
        self.state().dispatched_count
    }

    /// Number of pump threads blocked in [`HookBackend::wait_message`] on an
    /// empty queue.
    ///
    /// A thread counted here has released the state lock inside the condvar
    /// wait, so anything posted afterwards reaches it through the queue.
    pub fn parked_pumps(&self) -> usize {
        self.state().parked
    }

    /// The pump thread that performed the most recent successful install.
    pub fn last_installer(&self) -> Option<PumpThreadId> {
        self.state().last_installer
    }

    /// Every decision the filter made, in delivery order.
    pub fn decisions(&self) -> Vec<(KeyEvent, Decision)> {
        self.state().decisions.clone()
    }

    fn post(&self, thread: PumpThreadId, item: Queued) -> bool {
        let mut state = self.state();
        let Some(queue) = state.queues.get_mut(&thread) else {
            return false;
        };
        queue.push_back(item);
        self.shared.queue_changed.notify_all();
        true
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockHookBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBackend for MockHookBackend {
    type Handle = MockHookHandle;
    type Message = MockMessage;

    fn register_pump_thread(&self) -> PumpThreadId {
        let mut state = self.state();
        state.next_thread += 1;
        let thread = PumpThreadId(state.next_thread);
        state.queues.insert(thread, VecDeque::new());
        CURRENT_PUMP.with(|current| current.set(Some(thread)));
        thread
    }

    fn install(&self) -> Result<MockHookHandle, u32> {
        let mut state = self.state();
        state.install_attempts += 1;
        if let Some(code) = state.fail_next_install.take() {
            return Err(code);
        }
        state.next_handle += 1;
        let handle = MockHookHandle(state.next_handle);
        state.installed.insert(handle);
        state.last_installer = CURRENT_PUMP.with(Cell::get);
        Ok(handle)
    }

    fn uninstall(&self, handle: MockHookHandle) {
        let mut state = self.state();
        if state.installed.remove(&handle) {
            state.uninstall_count += 1;
        }
    }

    fn wait_message(&self) -> Retrieved<MockMessage> {
        // ERROR_INVALID_THREAD_ID: retrieving on a thread that never registered.
        let Some(thread) = CURRENT_PUMP.with(Cell::get) else {
            return Retrieved::Failed(1444);
        };

        let mut state = self.state();
        loop {
            let next = state.queues.get_mut(&thread).and_then(VecDeque::pop_front);
            match next {
                Some(Queued::Message(message)) => return Retrieved::Message(message),
                Some(Queued::Quit) => return Retrieved::Quit,
                Some(Queued::Fail(code)) => return Retrieved::Failed(code),
                None => {
                    state.parked += 1;
                    state = self
                        .shared
                        .queue_changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                    state.parked -= 1;
                }
            }
        }
    }

    fn dispatch(&self, _message: &MockMessage) {
        self.state().dispatched_count += 1;
    }

    fn wake(&self, thread: PumpThreadId) -> bool {
        if !self.state().wake_enabled {
            return false;
        }
        let posted = self.post(thread, Queued::Message(MockMessage::Null));
        if posted {
            self.state().wake_count += 1;
        }
        posted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyguard_core::keymap::windows_vk::{VK_LWIN, VK_MENU, VK_TAB};

    #[test]
    fn test_press_without_hook_bypasses_filter() {
        let backend = MockHookBackend::new();

        assert_eq!(backend.press(KeyEvent::down(VK_LWIN)), None);
        assert!(backend.decisions().is_empty());
    }

    #[test]
    fn test_press_with_hook_runs_filter_against_held_keys() {
        // Arrange
        let backend = MockHookBackend::new();
        backend.install().expect("install should succeed");
        backend.hold(VK_MENU);

        // Act
        let alt_tab = backend.press(KeyEvent::down(VK_TAB));
        backend.release(VK_MENU);
        let plain_tab = backend.press(KeyEvent::down(VK_TAB));

        // Assert
        assert_eq!(alt_tab, Some(Decision::Block));
        assert_eq!(plain_tab, Some(Decision::PassThrough));
        assert_eq!(backend.decisions().len(), 2);
    }

    #[test]
    fn test_fail_next_install_applies_once() {
        let backend = MockHookBackend::new();
        backend.fail_next_install(8);

        assert_eq!(backend.install(), Err(8));
        assert!(backend.install().is_ok());
        assert_eq!(backend.install_attempts(), 2);
        assert_eq!(backend.installed_hooks(), 1);
    }

    #[test]
    fn test_uninstall_unknown_handle_is_ignored() {
        let backend = MockHookBackend::new();
        backend.uninstall(MockHookHandle(99));
        assert_eq!(backend.uninstall_count(), 0);
    }

    #[test]
    fn test_post_to_unregistered_thread_fails() {
        let backend = MockHookBackend::new();

        assert!(!backend.post_input(PumpThreadId(7)));
        assert!(!backend.wake(PumpThreadId(7)));
        assert_eq!(backend.wake_count(), 0);
    }

    #[test]
    fn test_wait_message_returns_queued_items_in_order() {
        // Arrange
        let backend = MockHookBackend::new();
        let worker = backend.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        // Act: a registered thread drains its queue
        let handle = thread::spawn(move || {
            let thread = worker.register_pump_thread();
            tx.send(thread).expect("send thread id");
            let mut seen = Vec::new();
            loop {
                match worker.wait_message() {
                    Retrieved::Message(m) => seen.push(format!("{m:?}")),
                    Retrieved::Quit => {
                        seen.push("quit".to_string());
                        break;
                    }
                    Retrieved::Failed(code) => {
                        seen.push(format!("failed {code}"));
                        break;
                    }
                }
            }
            seen
        });
        let thread = rx.recv().expect("thread id");
        backend.post_input(thread);
        backend.wake(thread);
        backend.post_quit(thread);

        // Assert
        let seen = handle.join().expect("worker panicked");
        assert_eq!(seen, vec!["Null", "Null", "quit"]);
        assert_eq!(backend.wake_count(), 1);
    }

    #[test]
    fn test_parked_pumps_counts_threads_blocked_on_empty_queue() {
        // Arrange
        let backend = MockHookBackend::new();
        let worker = backend.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            let thread = worker.register_pump_thread();
            tx.send(thread).expect("send thread id");
            worker.wait_message()
        });
        let thread = rx.recv().expect("thread id");

        // Act / Assert: parked until something is posted
        assert!(wait_until(Duration::from_secs(2), || backend.parked_pumps() == 1));
        backend.post_quit(thread);
        let result = handle.join().expect("worker panicked");

        assert!(matches!(result, Retrieved::Quit));
        assert_eq!(backend.parked_pumps(), 0);
    }

    #[test]
    fn test_wait_message_on_unregistered_thread_fails() {
        let backend = MockHookBackend::new();
        let result = thread::spawn(move || backend.wait_message())
            .join()
            .expect("worker panicked");
        assert!(matches!(result, Retrieved::Failed(1444)));
    }

    #[test]
    fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(20), || false));
        assert!(wait_until(Duration::from_millis(20), || true));
    }
}
