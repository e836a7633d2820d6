//! Windows Virtual Key (VK) constants.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! These are defined in `<winuser.h>` and named `VK_*` (e.g., `VK_TAB = 0x09`,
//! `VK_ESCAPE = 0x1B`).  They are "virtual" because they represent *logical*
//! keys rather than physical scan codes: pressing the letter D on any keyboard
//! layout produces `0x44`, which is what the OS shortcut handler reacts to.
//!
//! Letter keys have no `VK_*` name in winuser.h; their codes equal the ASCII
//! code of the upper-case letter.
//!
//! Codes are `u32` because that is the width of `KBDLLHOOKSTRUCT.vkCode`.

/// Tab key.
pub const VK_TAB: u32 = 0x09;
/// Either Ctrl key (the "generic" code `GetAsyncKeyState` answers for both sides).
pub const VK_CONTROL: u32 = 0x11;
/// Either Alt key.
pub const VK_MENU: u32 = 0x12;
/// Esc key.
pub const VK_ESCAPE: u32 = 0x1B;
/// Letter D.
pub const VK_D: u32 = 0x44;
/// Letter E.
pub const VK_E: u32 = 0x45;
/// Letter L.
pub const VK_L: u32 = 0x4C;
/// Letter R.
pub const VK_R: u32 = 0x52;
/// Left Windows key.
pub const VK_LWIN: u32 = 0x5B;
/// Right Windows key.
pub const VK_RWIN: u32 = 0x5C;
/// F4 function key.
pub const VK_F4: u32 = 0x73;

/// Both OS-meta keys.  Either one held counts as "Windows key down".
pub const META_KEYS: [u32; 2] = [VK_LWIN, VK_RWIN];

/// Returns a short human-readable name for `vk`.
///
/// Only the keys KeyGuard reasons about, plus the letters and digits, are
/// named; everything else is `"Unknown"`.  Intended for logs and test
/// messages, never for the filter path.
pub fn key_name(vk: u32) -> &'static str {
    const LETTERS: [&str; 26] = [
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q",
        "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    ];
    const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

    match vk {
        VK_TAB => "Tab",
        VK_CONTROL => "Ctrl",
        VK_MENU => "Alt",
        VK_ESCAPE => "Esc",
        VK_LWIN => "LWin",
        VK_RWIN => "RWin",
        VK_F4 => "F4",
        0x30..=0x39 => DIGITS[(vk - 0x30) as usize],
        0x41..=0x5A => LETTERS[(vk - 0x41) as usize],
        _ => "Unknown",
    }
}
