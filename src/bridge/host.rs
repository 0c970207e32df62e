//! Host-side interface the registry drives

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::BridgeConfig;

/// A UI surface that resources are scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Opaque id of one host-side resource. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Lines of the owner the resource is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

/// Options sent with `create_resource` and on every options change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    pub enable_scripts: bool,
    pub local_resource_roots: Vec<String>,
    pub anchor: Option<LineRange>,
}

impl ResourceOptions {
    /// Options for a new resource before the caller sets anything
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            enable_scripts: config.default_enable_scripts,
            ..Default::default()
        }
    }
}

/// The main UI process, as seen from the registry.
///
/// Calls are fire-and-forget except `send_to_resource`, which reports
/// whether the host accepted the payload.
pub trait HostBridge: Send + Sync {
    fn create_resource(&self, handle: Handle, owner: OwnerId, options: &ResourceOptions);

    fn set_resource_option(&self, handle: Handle, key: &str, value: Value);

    fn send_to_resource(&self, handle: Handle, payload: Value) -> bool;

    fn destroy_resource(&self, handle: Handle);
}
