//! Data source trait for the header filter
//!
//! The filter never touches rows itself. It asks the source for candidate
//! values and tells it to re-derive its visible rows when a filter or sort
//! is applied.

use anyhow::Result;

use crate::filter::column_state::ActiveFilters;
use crate::filter::session::search_candidates;

/// Row data behind a filterable grid.
pub trait FilterDataSource {
    /// Distinct values of `column` over the rows that pass `constraints`,
    /// in display order.
    fn distinct_values(&self, column: &str, constraints: &ActiveFilters) -> Result<Vec<String>>;

    /// Distinct values of `column` containing `substring` (case-insensitive)
    /// over the rows that pass `constraints`.
    fn matching_values(
        &self,
        column: &str,
        substring: &str,
        constraints: &ActiveFilters,
    ) -> Result<Vec<String>> {
        let values = self.distinct_values(column, constraints)?;
        Ok(search_candidates(&values, substring))
    }

    /// Re-derive the visible rows from every column's committed filter
    fn apply_filter(&mut self, filters: &ActiveFilters) -> Result<()>;

    /// Re-order the visible rows by one column
    fn apply_sort(&mut self, column: &str, ascending: bool) -> Result<()>;
}
