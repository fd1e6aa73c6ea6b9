//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the client's TOML configuration
//! in the platform config directory and supplies defaults on first run.
//! Configuration values are handed to the controller and transport factory
//! explicitly; nothing reads them from a global.

pub mod config;
