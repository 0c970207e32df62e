pub mod bridge;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod logging;

pub use error::{FilterError, RegistryError};
