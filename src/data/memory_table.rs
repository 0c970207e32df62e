use anyhow::{anyhow, Result};
use std::collections::HashSet;
use tracing::debug;

use crate::data::data_source::FilterDataSource;
use crate::filter::column_state::ActiveFilters;

/// An in-memory string table with a filtered, sorted view over its rows.
///
/// The rows themselves never change; filtering and sorting only rebuild
/// `visible_rows`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,

    /// Row indices that are visible (after filtering and sorting)
    visible_rows: Vec<usize>,

    /// Last sort applied, re-used after every filter change
    sort: Option<(usize, bool)>,
}

impl MemoryTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Append a row. Short rows are padded with empty cells.
    pub fn add_row(&mut self, mut row: Vec<String>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(anyhow!(
                "Row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        row.resize(self.columns.len(), String::new());
        self.visible_rows.push(self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn visible_row_count(&self) -> usize {
        self.visible_rows.len()
    }

    /// Visible rows in display order
    pub fn visible_rows(&self) -> Vec<&[String]> {
        self.visible_rows
            .iter()
            .map(|&idx| self.rows[idx].as_slice())
            .collect()
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| anyhow!("Unknown column '{}'", name))
    }

    fn row_passes(&self, row: &[String], filters: &ActiveFilters) -> bool {
        filters.matches(|column| {
            self.column_index(column)
                .and_then(|idx| row.get(idx))
                .map(|value| value.as_str())
        })
    }

    fn sort_visible(&mut self, column: usize, ascending: bool) {
        let rows = &self.rows;
        // stable, so equal keys keep their previous order
        self.visible_rows.sort_by(|&a, &b| {
            let cmp = rows[a][column].cmp(&rows[b][column]);
            if ascending {
                cmp
            } else {
                cmp.reverse()
            }
        });
    }
}

impl FilterDataSource for MemoryTable {
    fn distinct_values(&self, column: &str, constraints: &ActiveFilters) -> Result<Vec<String>> {
        let col_idx = self.require_column(column)?;
        // first-seen row order keeps an error row right after its parent
        let mut seen = HashSet::new();
        Ok(self
            .rows
            .iter()
            .filter(|row| self.row_passes(row, constraints))
            .map(|row| row[col_idx].as_str())
            .filter(|value| !value.is_empty() && seen.insert(*value))
            .map(String::from)
            .collect())
    }

    fn apply_filter(&mut self, filters: &ActiveFilters) -> Result<()> {
        for (column, _) in filters.iter() {
            self.require_column(column)?;
        }
        self.visible_rows = (0..self.rows.len())
            .filter(|&idx| self.row_passes(&self.rows[idx], filters))
            .collect();
        if let Some((column, ascending)) = self.sort {
            self.sort_visible(column, ascending);
        }
        debug!(target: "data",
            "filter over {} column(s) left {} of {} rows visible",
            filters.len(),
            self.visible_rows.len(),
            self.rows.len()
        );
        Ok(())
    }

    fn apply_sort(&mut self, column: &str, ascending: bool) -> Result<()> {
        let col_idx = self.require_column(column)?;
        self.sort = Some((col_idx, ascending));
        self.sort_visible(col_idx, ascending);
        Ok(())
    }
}
