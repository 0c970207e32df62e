//! Column header filter
//!
//! Each filterable column keeps a committed selection. Opening the header
//! menu copies it into a working selection that checkbox events edit; OK
//! writes it back, Cancel throws it away.

pub mod column_state;
pub mod command;
pub mod header_filter;
pub mod session;

pub use column_state::{ActiveFilters, ColumnFilterState};
pub use command::FilterCommand;
pub use header_filter::{FetchTicket, FilterEvent, FilterOutcome, FilterSubscriber, HeaderFilter};
pub use session::{MenuOption, MenuSession, MenuStep, MenuView, WorkingSelection};
