//! Bridge between host-side resources and the owners they live in

pub mod host;
pub mod inset;
pub mod registry;

pub use host::{Handle, HostBridge, LineRange, OwnerId, ResourceOptions};
pub use inset::EmbeddedPanel;
pub use registry::{HandleRegistry, ResourceContext};
