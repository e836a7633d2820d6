//! Windows Virtual Key codes used by the interception filter.
//!
//! The filter works directly on the `vkCode` field the low-level keyboard
//! hook delivers, so no translation to another key representation happens
//! on the hot path.

pub mod windows_vk;

pub use windows_vk::key_name;
