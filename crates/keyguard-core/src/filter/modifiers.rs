//! Live modifier-key queries.
//!
//! The filter asks "is this key down right now?" at decision time instead of
//! tracking modifier state from earlier key events.  A hook that misses a
//! key-up (another hook swallowed it, or the session was locked mid-press)
//! therefore cannot leave the filter believing a modifier is stuck.

/// Answers whether a virtual key is currently held down.
///
/// The production implementation wraps `GetAsyncKeyState`; [`HeldKeys`] is a
/// fixed snapshot used by tests, benchmarks and the mock hook backend.
///
/// Implementations run on the OS input thread inside the hook callback and
/// must not block, allocate, or perform I/O.
#[cfg_attr(test, mockall::automock)]
pub trait ModifierState {
    /// Returns `true` if `vk` is held down at the moment of the call.
    fn is_down(&self, vk: u32) -> bool;
}

/// A fixed set of held virtual keys, stored as a 256-bit set.
///
/// Codes above `0xFF` are never held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    bits: [u64; 4],
}

impl HeldKeys {
    /// No keys held.
    pub const fn none() -> Self {
        Self { bits: [0; 4] }
    }

    /// Returns a copy with `vk` marked as held.
    pub const fn with(mut self, vk: u32) -> Self {
        if vk < 256 {
            self.bits[(vk / 64) as usize] |= 1 << (vk % 64);
        }
        self
    }

    /// Marks `vk` as held.
    pub fn press(&mut self, vk: u32) {
        *self = self.with(vk);
    }

    /// Marks `vk` as released.
    pub fn release(&mut self, vk: u32) {
        if vk < 256 {
            self.bits[(vk / 64) as usize] &= !(1 << (vk % 64));
        }
    }

    /// Returns `true` if no key is held.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }
}

impl ModifierState for HeldKeys {
    fn is_down(&self, vk: u32) -> bool {
        vk < 256 && self.bits[(vk / 64) as usize] & (1 << (vk % 64)) != 0
    }
}

impl<M: ModifierState + ?Sized> ModifierState for &M {
    fn is_down(&self, vk: u32) -> bool {
        (**self).is_down(vk)
    }
}
