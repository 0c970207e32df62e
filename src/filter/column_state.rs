use std::collections::{BTreeMap, BTreeSet};

/// Committed filter state for one column.
///
/// Lives as long as the grid does. `available_values` is the last candidate
/// domain shown for the column, in display order; `selected_values` is the
/// filter currently driving row visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilterState {
    pub name: String,
    pub filterable: bool,
    pub available_values: Vec<String>,
    pub selected_values: BTreeSet<String>,
}

impl ColumnFilterState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filterable: true,
            available_values: Vec::new(),
            selected_values: BTreeSet::new(),
        }
    }

    /// A column that never shows a filter button
    pub fn not_filterable(name: impl Into<String>) -> Self {
        Self {
            filterable: false,
            ..Self::new(name)
        }
    }

    /// Whether the header button should show the "filtered" indicator
    pub fn is_filtered(&self) -> bool {
        !self.selected_values.is_empty()
    }
}

/// Committed selections of every filtered column, keyed by column name.
///
/// Columns with an empty selection are not present: an empty selection
/// means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveFilters {
    columns: BTreeMap<String, BTreeSet<String>>,
}

impl ActiveFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, values: BTreeSet<String>) {
        let column = column.into();
        if values.is_empty() {
            self.columns.remove(&column);
        } else {
            self.columns.insert(column, values);
        }
    }

    pub fn get(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.columns.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.columns.iter()
    }

    /// Same filters with one column left out
    pub fn without(&self, column: &str) -> Self {
        let mut columns = self.columns.clone();
        columns.remove(column);
        Self { columns }
    }

    /// Whether a row passes every filter. `cell` looks up the row's value
    /// for a column name; a missing column never matches.
    pub fn matches<'a, F>(&self, cell: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.columns.iter().all(|(column, allowed)| {
            cell(column.as_str()).is_some_and(|value| allowed.contains(value))
        })
    }
}

impl<'a> FromIterator<&'a ColumnFilterState> for ActiveFilters {
    fn from_iter<I: IntoIterator<Item = &'a ColumnFilterState>>(iter: I) -> Self {
        let mut filters = ActiveFilters::new();
        for state in iter {
            filters.insert(state.name.clone(), state.selected_values.clone());
        }
        filters
    }
}
