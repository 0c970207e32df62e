//! Data layer behind the header filter
//!
//! This module provides the row source the filter talks to and an
//! in-memory implementation of it.

pub mod csv_loader;
pub mod data_source;
pub mod memory_table;

pub use data_source::FilterDataSource;
pub use memory_table::MemoryTable;
