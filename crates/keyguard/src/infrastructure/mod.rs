//! Infrastructure layer for KeyGuard.
//!
//! Contains OS-facing adapters: the keyboard hook backends, file-system
//! storage for the configuration, and the host bridge that exposes the two
//! boundary operations.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyguard_core`, but MUST NOT be imported by non-test code in the
//! `application` layer.  Application unit tests may use the mock backend.

pub mod hook_backend;
pub mod host_bridge;
pub mod storage;
