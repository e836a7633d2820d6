//! The interception filter: block or pass through a single keystroke.
//!
//! [`decide`] is evaluated synchronously for every keyboard event on the
//! system, on the thread the OS uses to deliver low-level hook callbacks.
//! Every keystroke anywhere waits for it, so it only compares integers and
//! asks [`ModifierState`] about a handful of keys.  It never
//! allocates, logs, or blocks.
//!
//! # Rules
//!
//! Evaluated in order; the first match wins.
//!
//! | # | Condition                                   | Shortcut suppressed          |
//! |---|---------------------------------------------|------------------------------|
//! | 1 | key is LWin or RWin                         | Start menu / every Win combo |
//! | 2 | LWin or RWin held, key is Tab, D, R, L or E | task view, desktop, run, lock, explorer |
//! | 3 | Alt held, key is Tab or F4                  | app switcher, close window   |
//! | 4 | Ctrl held, key is Esc                       | Start menu                   |
//!
//! Key-up events go through the same rules as key-down.  A blocked key-down
//! whose matching key-up reached the focused application would otherwise
//! look like a stray release to it.

pub mod modifiers;

use crate::keymap::windows_vk::{
    META_KEYS, VK_CONTROL, VK_D, VK_E, VK_ESCAPE, VK_F4, VK_L, VK_MENU, VK_R, VK_TAB,
};
use self::modifiers::ModifierState;

/// Whether a key was pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A single keyboard event as seen by the low-level hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Windows Virtual Key code (`KBDLLHOOKSTRUCT.vkCode`).
    pub vk_code: u32,
    pub direction: KeyDirection,
}

impl KeyEvent {
    pub const fn new(vk_code: u32, direction: KeyDirection) -> Self {
        Self { vk_code, direction }
    }

    pub const fn down(vk_code: u32) -> Self {
        Self::new(vk_code, KeyDirection::Down)
    }

    pub const fn up(vk_code: u32) -> Self {
        Self::new(vk_code, KeyDirection::Up)
    }
}

/// Disposition of an intercepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Consume the event; no other process sees it.
    Block,
    /// Forward the event down the hook chain unchanged.
    PassThrough,
}

impl Decision {
    pub const fn is_block(self) -> bool {
        matches!(self, Decision::Block)
    }
}

/// The OS shortcut a blocked event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedShortcut {
    /// LWin or RWin on its own.
    MetaKey,
    /// Win+Tab.
    TaskView,
    /// Win+D.
    ShowDesktop,
    /// Win+R.
    RunDialog,
    /// Win+L.
    LockScreen,
    /// Win+E.
    FileExplorer,
    /// Alt+Tab.
    AppSwitch,
    /// Alt+F4.
    CloseWindow,
    /// Ctrl+Esc.
    StartMenu,
}

impl BlockedShortcut {
    /// The key combination as a user would write it.
    pub const fn label(self) -> &'static str {
        match self {
            BlockedShortcut::MetaKey => "Win",
            BlockedShortcut::TaskView => "Win+Tab",
            BlockedShortcut::ShowDesktop => "Win+D",
            BlockedShortcut::RunDialog => "Win+R",
            BlockedShortcut::LockScreen => "Win+L",
            BlockedShortcut::FileExplorer => "Win+E",
            BlockedShortcut::AppSwitch => "Alt+Tab",
            BlockedShortcut::CloseWindow => "Alt+F4",
            BlockedShortcut::StartMenu => "Ctrl+Esc",
        }
    }
}

/// Every shortcut the filter suppresses, in rule order.
pub const BLOCKED_SHORTCUTS: [BlockedShortcut; 9] = [
    BlockedShortcut::MetaKey,
    BlockedShortcut::TaskView,
    BlockedShortcut::ShowDesktop,
    BlockedShortcut::RunDialog,
    BlockedShortcut::LockScreen,
    BlockedShortcut::FileExplorer,
    BlockedShortcut::AppSwitch,
    BlockedShortcut::CloseWindow,
    BlockedShortcut::StartMenu,
];

/// Returns the shortcut `event` would trigger, or `None` if it is harmless.
///
/// Modifier keys are queried from `modifiers` lazily, only when the key code
/// could complete a blocked combination.
pub fn classify<M>(event: &KeyEvent, modifiers: &M) -> Option<BlockedShortcut>
where
    M: ModifierState + ?Sized,
{
    let vk = event.vk_code;

    // Rule 1
    if META_KEYS.contains(&vk) {
        return Some(BlockedShortcut::MetaKey);
    }

    // Rule 2
    let meta_combo = match vk {
        VK_TAB => Some(BlockedShortcut::TaskView),
        VK_D => Some(BlockedShortcut::ShowDesktop),
        VK_R => Some(BlockedShortcut::RunDialog),
        VK_L => Some(BlockedShortcut::LockScreen),
        VK_E => Some(BlockedShortcut::FileExplorer),
        _ => None,
    };
    if let Some(shortcut) = meta_combo {
        if META_KEYS.iter().any(|&meta| modifiers.is_down(meta)) {
            return Some(shortcut);
        }
    }

    // Rule 3
    let alt_combo = match vk {
        VK_TAB => Some(BlockedShortcut::AppSwitch),
        VK_F4 => Some(BlockedShortcut::CloseWindow),
        _ => None,
    };
    if let Some(shortcut) = alt_combo {
        if modifiers.is_down(VK_MENU) {
            return Some(shortcut);
        }
    }

    // Rule 4
    if vk == VK_ESCAPE && modifiers.is_down(VK_CONTROL) {
        return Some(BlockedShortcut::StartMenu);
    }

    None
}

/// Decides whether `event` is consumed or forwarded.
#[inline]
pub fn decide<M>(event: &KeyEvent, modifiers: &M) -> Decision
where
    M: ModifierState + ?Sized,
{
    match classify(event, modifiers) {
        Some(_) => Decision::Block,
        None => Decision::PassThrough,
    }
}
