//! Windows low-level keyboard hook implementation.
//!
//! This module installs a `WH_KEYBOARD_LL` hook from the pump thread and
//! drives that thread's Win32 message loop.  The hook procedure runs the
//! interception filter for every keystroke on the system and either swallows
//! the event or forwards it with `CallNextHookEx`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    GetLastError, ERROR_INVALID_HOOK_HANDLE, HINSTANCE, LPARAM, LRESULT, WPARAM,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::{
    GetCurrentThread, GetCurrentThreadId, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
};
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK,
    KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYUP, WM_NULL, WM_SYSKEYUP, WM_USER,
};

use keyguard_core::{decide, KeyDirection, KeyEvent, ModifierState};

use crate::application::hook_lifecycle::{HookBackend, PumpThreadId, Retrieved};

/// `true` between a successful install and the matching uninstall.
///
/// The hook procedure has no user-data parameter, so this is the only state it
/// can consult.  While `false` every event is forwarded unchanged.
static FILTER_LIVE: AtomicBool = AtomicBool::new(false);

/// Live modifier state backed by `GetAsyncKeyState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncKeyState;

impl ModifierState for AsyncKeyState {
    fn is_down(&self, vk: u32) -> bool {
        // SAFETY: GetAsyncKeyState has no preconditions.
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        (state as u16) & 0x8000 != 0
    }
}

/// Raw `HHOOK` value.  `HHOOK` wraps a pointer and is not `Send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsHookHandle(usize);

impl WindowsHookHandle {
    fn from_hhook(hook: HHOOK) -> Self {
        Self(hook.0 as usize)
    }

    fn as_hhook(self) -> HHOOK {
        HHOOK(self.0 as *mut c_void)
    }
}

/// Win32 implementation of [`HookBackend`].
#[derive(Debug, Clone, Copy)]
pub struct WindowsHookBackend {
    /// Raise the pump thread to `THREAD_PRIORITY_TIME_CRITICAL`.
    boost_priority: bool,
}

impl WindowsHookBackend {
    pub fn new(boost_priority: bool) -> Self {
        Self { boost_priority }
    }
}

impl Default for WindowsHookBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl HookBackend for WindowsHookBackend {
    type Handle = WindowsHookHandle;
    type Message = MSG;

    fn register_pump_thread(&self) -> PumpThreadId {
        // SAFETY: GetCurrentThreadId has no preconditions.
        let thread = PumpThreadId(unsafe { GetCurrentThreadId() });

        if self.boost_priority {
            // SAFETY: GetCurrentThread returns a pseudo-handle valid on this thread.
            if let Err(e) = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) } {
                warn!(
                    code = win32_code(e.code().0),
                    "could not raise pump thread priority"
                );
            }
        }

        // Force creation of the thread message queue so PostThreadMessageW
        // can reach this thread before its first GetMessageW call.
        let mut msg = MSG::default();
        // SAFETY: msg is a valid out-pointer; PM_NOREMOVE leaves the queue unchanged.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }

        thread
    }

    fn install(&self) -> Result<WindowsHookHandle, u32> {
        // SAFETY: a null module name returns the handle of the running executable.
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|e| win32_code(e.code().0))?;

        // SAFETY: keyboard_filter_proc has the HOOKPROC signature and lives for
        // the whole process.
        let hook = unsafe {
            SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_filter_proc),
                Some(HINSTANCE(module.0)),
                0,
            )
        }
        .map_err(|e| win32_code(e.code().0))?;

        FILTER_LIVE.store(true, Ordering::Release);
        Ok(WindowsHookHandle::from_hhook(hook))
    }

    fn uninstall(&self, handle: WindowsHookHandle) {
        FILTER_LIVE.store(false, Ordering::Release);

        // SAFETY: the handle came from SetWindowsHookExW and is unhooked once.
        if let Err(e) = unsafe { UnhookWindowsHookEx(handle.as_hhook()) } {
            let code = win32_code(e.code().0);
            if hook_already_removed(code) {
                // The woken pump thread exited first and took its hooks with it.
                debug!(code, "hook was already removed with its pump thread");
            } else {
                warn!(code, "UnhookWindowsHookEx failed");
            }
        }
    }

    fn wait_message(&self) -> Retrieved<MSG> {
        let mut msg = MSG::default();
        // SAFETY: msg is a valid out-pointer for the duration of the call.
        let result = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match result.0 {
            0 => Retrieved::Quit,
            // SAFETY: GetLastError has no preconditions.
            -1 => Retrieved::Failed(unsafe { GetLastError() }.0),
            _ => Retrieved::Message(msg),
        }
    }

    fn dispatch(&self, message: &MSG) {
        // SAFETY: message was filled in by GetMessageW on this thread.
        unsafe {
            let _ = TranslateMessage(message);
            DispatchMessageW(message);
        }
    }

    fn wake(&self, thread: PumpThreadId) -> bool {
        // SAFETY: posting WM_NULL has no side effects beyond waking GetMessageW.
        unsafe { PostThreadMessageW(thread.0, WM_NULL, WPARAM(0), LPARAM(0)) }.is_ok()
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows on the pump thread for every keystroke on the system.
/// It must return quickly; it only runs the allocation-free filter.
unsafe extern "system" fn keyboard_filter_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 && FILTER_LIVE.load(Ordering::Acquire) {
        // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
        let info = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

        let direction = match w_param.0 as u32 {
            WM_KEYUP | WM_SYSKEYUP => KeyDirection::Up,
            _ => KeyDirection::Down,
        };

        if decide(&KeyEvent::new(info.vkCode, direction), &AsyncKeyState).is_block() {
            return LRESULT(1);
        }
    }

    // SAFETY: Forward the event unchanged to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}

/// Extracts the Win32 error code from an `HRESULT`.
///
/// `HRESULT_FROM_WIN32` stores the code in the low word under facility 7;
/// any other `HRESULT` is returned as-is.
fn win32_code(hresult: i32) -> u32 {
    let raw = hresult as u32;
    if raw & 0xFFFF_0000 == 0x8007_0000 {
        raw & 0xFFFF
    } else {
        raw
    }
}

/// `true` when an unhook failure means Windows already removed the hook.
fn hook_already_removed(code: u32) -> bool {
    code == ERROR_INVALID_HOOK_HANDLE.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win32_code_unpacks_facility_win32() {
        // HRESULT_FROM_WIN32(ERROR_HOOK_NEEDS_HMOD = 1428)
        assert_eq!(win32_code(0x8007_0594_u32 as i32), 1428);
    }

    #[test]
    fn test_win32_code_passes_other_hresults_through() {
        assert_eq!(win32_code(0x8000_4005_u32 as i32), 0x8000_4005);
    }

    #[test]
    fn test_invalid_hook_handle_counts_as_already_removed() {
        // HRESULT_FROM_WIN32(ERROR_INVALID_HOOK_HANDLE = 1404)
        let code = win32_code(0x8007_057C_u32 as i32);

        assert_eq!(code, 1404);
        assert!(hook_already_removed(code));
        assert!(!hook_already_removed(5));
    }

    #[test]
    fn test_handle_round_trips_raw_value() {
        let hook = HHOOK(0x1234 as *mut c_void);
        assert_eq!(WindowsHookHandle::from_hhook(hook).as_hhook().0, hook.0);
    }
}
