//! Commands a filter menu can receive

/// Everything the header filter menu can ask for.
///
/// The menu's widgets map onto these: the two sort entries, the
/// "(Select All)" checkbox, one checkbox per candidate value, the search box
/// and the OK / Clear / Cancel buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    SortAscending,
    SortDescending,
    SelectAll { checked: bool },
    Toggle { value: String, checked: bool },
    Search(String),
    Apply,
    Clear,
    Cancel,
}

impl FilterCommand {
    pub fn toggle(value: impl Into<String>, checked: bool) -> Self {
        FilterCommand::Toggle {
            value: value.into(),
            checked,
        }
    }
}
