//! Error types for the header filter and the handle registry.

use crate::bridge::host::OwnerId;
use thiserror::Error;

/// Errors surfaced by [`crate::filter::HeaderFilter`].
///
/// Data-source failures never show up here: they are logged at the call
/// site and the committed state is left as it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// A menu command arrived while no filter menu is open.
    #[error("no filter menu is open")]
    NoActiveSession,

    /// A candidate fetch resolved after its menu session was superseded or
    /// closed. The result was dropped.
    #[error("discarded candidate values for stale menu session {session}")]
    StaleSession { session: u64 },

    /// The column is not known to the filter.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },

    /// The column was registered with filtering disabled.
    #[error("column '{column}' is not filterable")]
    NotFilterable { column: String },
}

/// Errors surfaced by [`crate::bridge::HandleRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Resources can only be created for an owner that is currently visible.
    #[error("owner {0} is not a visible owner")]
    InvalidOwner(OwnerId),
}
