//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file from the
//! platform-appropriate directory, writes it back, and falls back to defaults
//! when the file does not exist yet (first run).
//!
//! The set of blocked shortcuts is compiled in and has no entry here.

pub mod config;
