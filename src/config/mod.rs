//! Configuration module
//!
//! Settings for the header filter, the handle registry and logging,
//! loaded from a TOML file.

pub mod config;

pub use config::{BridgeConfig, Config, FilterConfig, LoggingConfig};
