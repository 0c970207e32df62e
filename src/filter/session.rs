//! One open filter menu: the working selection and the reducer that folds
//! menu commands into it.

use std::collections::BTreeSet;

use tracing::debug;

use super::command::FilterCommand;

/// Uncommitted edit of a column's selection.
///
/// Seeded from the committed selection when the menu opens; thrown away on
/// cancel, written back on apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSelection {
    values: BTreeSet<String>,
}

impl WorkingSelection {
    pub fn seeded(committed: &BTreeSet<String>) -> Self {
        Self {
            values: committed.clone(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    pub fn into_values(self) -> BTreeSet<String> {
        self.values
    }

    /// Insert `value`. When the entry right after it in `displayed` is an
    /// error row, that row comes along.
    fn check(&mut self, displayed: &[String], value: &str, error_marker: &str) {
        if !self.values.insert(value.to_string()) {
            return;
        }
        let next = displayed
            .iter()
            .position(|candidate| candidate == value)
            .and_then(|idx| displayed.get(idx + 1));
        if let Some(next) = next {
            if is_error_row(next, error_marker) {
                debug!(target: "filter", "linking error row '{}' to '{}'", next, value);
                self.values.insert(next.clone());
            }
        }
    }

    /// Removal never cascades to a linked error row.
    fn uncheck(&mut self, value: &str) {
        self.values.remove(value);
    }

    fn select_all(&mut self, domain: &[String]) {
        self.values = domain.iter().cloned().collect();
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

/// Whether a candidate value is an error annotation of the row before it
pub fn is_error_row(value: &str, error_marker: &str) -> bool {
    !error_marker.is_empty() && value.starts_with(error_marker)
}

/// State of the filter menu while it is open on one column
#[derive(Debug, Clone)]
pub struct MenuSession {
    id: u64,
    column: String,
    candidates: Vec<String>,
    displayed: Vec<String>,
    search: String,
    working: WorkingSelection,
    error_marker: String,
}

/// Result of feeding one command to a [`MenuSession`]
#[derive(Debug, Clone)]
pub enum MenuStep {
    /// Menu stays open with the updated session
    Continue(MenuSession),
    /// Write the working selection back as the column's filter
    Apply {
        column: String,
        selection: WorkingSelection,
    },
    /// Drop the column's filter
    Clear { column: String },
    /// Close without touching committed state
    Cancel { column: String },
    Sort { column: String, ascending: bool },
}

impl MenuSession {
    pub fn new(
        id: u64,
        column: impl Into<String>,
        candidates: Vec<String>,
        working: WorkingSelection,
        error_marker: impl Into<String>,
    ) -> Self {
        Self {
            id,
            column: column.into(),
            displayed: candidates.clone(),
            candidates,
            search: String::new(),
            working,
            error_marker: error_marker.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Candidates after the current search
    pub fn displayed(&self) -> &[String] {
        &self.displayed
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn working(&self) -> &WorkingSelection {
        &self.working
    }

    /// Search is off when there is nothing to search
    pub fn search_enabled(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Fold one command into the session.
    pub fn reduce(mut self, command: FilterCommand) -> MenuStep {
        debug!(target: "filter", "session {} on '{}': {:?}", self.id, self.column, command);
        match command {
            FilterCommand::SortAscending => MenuStep::Sort {
                column: self.column,
                ascending: true,
            },
            FilterCommand::SortDescending => MenuStep::Sort {
                column: self.column,
                ascending: false,
            },
            FilterCommand::SelectAll { checked } => {
                if checked {
                    self.working.select_all(&self.candidates);
                } else if !self.candidates.is_empty() {
                    self.working.clear();
                }
                MenuStep::Continue(self)
            }
            FilterCommand::Toggle { value, checked } => {
                if checked {
                    if self.candidates.contains(&value) {
                        self.working
                            .check(&self.displayed, &value, &self.error_marker);
                    } else {
                        debug!(target: "filter", "ignoring check of '{}', not a candidate", value);
                    }
                } else {
                    self.working.uncheck(&value);
                }
                MenuStep::Continue(self)
            }
            FilterCommand::Search(text) => {
                let displayed = search_candidates(&self.candidates, &text);
                self.show_matches(text, &displayed);
                MenuStep::Continue(self)
            }
            FilterCommand::Apply => MenuStep::Apply {
                column: self.column,
                selection: self.working,
            },
            FilterCommand::Clear => MenuStep::Clear {
                column: self.column,
            },
            FilterCommand::Cancel => MenuStep::Cancel {
                column: self.column,
            },
        }
    }

    /// Narrow the displayed list to the candidates in `matches`, keeping
    /// candidate order. Ignored while search is disabled.
    pub fn show_matches(&mut self, text: String, matches: &[String]) {
        if !self.search_enabled() {
            return;
        }
        self.displayed = self
            .candidates
            .iter()
            .filter(|candidate| matches.contains(candidate))
            .cloned()
            .collect();
        self.search = text;
    }

    /// Render model for the menu's checkbox list.
    pub fn view(&self, select_all_label: &str) -> MenuView {
        let options = self
            .displayed
            .iter()
            .filter(|value| !is_error_row(value, &self.error_marker))
            .map(|value| MenuOption {
                value: value.clone(),
                checked: self.working.contains(value),
            })
            .collect();

        MenuView {
            column: self.column.clone(),
            select_all_label: select_all_label.to_string(),
            select_all_checked: !self.candidates.is_empty()
                && self.candidates.iter().all(|v| self.working.contains(v)),
            options,
            search_enabled: self.search_enabled(),
            search_text: self.search.clone(),
        }
    }
}

/// Case-insensitive substring match, keeping candidate order.
pub fn search_candidates(candidates: &[String], text: &str) -> Vec<String> {
    if text.is_empty() {
        return candidates.to_vec();
    }
    let needle = text.to_lowercase();
    candidates
        .iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub value: String,
    pub checked: bool,
}

/// What the menu shows right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub column: String,
    pub select_all_label: String,
    pub select_all_checked: bool,
    pub options: Vec<MenuOption>,
    pub search_enabled: bool,
    pub search_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "Error:";

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn session(candidates: &[&str], committed: &[&str]) -> MenuSession {
        let committed: BTreeSet<String> = committed.iter().map(|v| v.to_string()).collect();
        MenuSession::new(
            1,
            "status",
            strings(candidates),
            WorkingSelection::seeded(&committed),
            MARKER,
        )
    }

    fn step(session: MenuSession, command: FilterCommand) -> MenuSession {
        match session.reduce(command) {
            MenuStep::Continue(next) => next,
            other => panic!("expected menu to stay open, got {:?}", other),
        }
    }

    fn working(session: &MenuSession) -> Vec<&str> {
        session.working().values().iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_toggle_links_following_error_row() {
        let s = session(&["A", "B", "Error: B invalid", "C"], &[]);
        let s = step(s, FilterCommand::toggle("B", true));
        assert_eq!(working(&s), vec!["B", "Error: B invalid"]);

        let s = step(s, FilterCommand::toggle("B", false));
        assert_eq!(working(&s), vec!["Error: B invalid"]);
    }

    #[test]
    fn test_toggle_last_value_has_no_successor() {
        let s = session(&["A", "B"], &[]);
        let s = step(s, FilterCommand::toggle("B", true));
        assert_eq!(working(&s), vec!["B"]);
    }

    #[test]
    fn test_recheck_does_not_cascade_again() {
        let s = session(&["A", "Error: A bad"], &["A"]);
        // A is already selected, so the error row is not pulled in
        let s = step(s, FilterCommand::toggle("A", true));
        assert_eq!(working(&s), vec!["A"]);
    }

    #[test]
    fn test_check_outside_candidates_is_ignored() {
        let s = session(&["A", "B"], &["stale"]);
        let s = step(s, FilterCommand::toggle("ZZZ", true));
        assert_eq!(working(&s), vec!["stale"]);

        // a committed value the domain no longer offers can still be unchecked
        let s = step(s, FilterCommand::toggle("stale", false));
        assert!(s.working().is_empty());
    }

    #[test]
    fn test_matches_from_elsewhere_keep_candidate_order() {
        let mut s = session(&["apple", "banana", "apricot"], &[]);
        s.show_matches("ap".into(), &strings(&["apricot", "apple", "kiwi"]));
        assert_eq!(s.displayed(), &strings(&["apple", "apricot"])[..]);
        assert_eq!(s.search_text(), "ap");
    }

    #[test]
    fn test_select_all_and_none() {
        let s = session(&["A", "B", "C"], &["B"]);
        let s = step(s, FilterCommand::SelectAll { checked: true });
        assert_eq!(working(&s), vec!["A", "B", "C"]);
        assert!(s.view("(Select All)").select_all_checked);

        let s = step(s, FilterCommand::SelectAll { checked: false });
        assert!(s.working().is_empty());
    }

    #[test]
    fn test_empty_domain_disables_search_and_select_all() {
        let s = session(&[], &[]);
        assert!(!s.search_enabled());
        let s = step(s, FilterCommand::SelectAll { checked: true });
        let s = step(s, FilterCommand::Search("x".into()));
        assert!(s.working().is_empty());
        assert_eq!(s.search_text(), "");

        let view = s.view("(Select All)");
        assert!(view.options.is_empty());
        assert!(!view.select_all_checked);
    }

    #[test]
    fn test_search_is_case_insensitive_and_keeps_selection() {
        let s = session(&["Alpha", "beta", "ALPINE", "gamma"], &["gamma"]);
        let s = step(s, FilterCommand::Search("alp".into()));
        assert_eq!(s.displayed(), &strings(&["Alpha", "ALPINE"])[..]);
        assert_eq!(working(&s), vec!["gamma"]);

        let view = s.view("(Select All)");
        assert!(view.options.iter().all(|o| !o.checked));

        let s = step(s, FilterCommand::Search(String::new()));
        assert_eq!(s.displayed().len(), 4);
        let view = s.view("(Select All)");
        assert!(view.options.iter().any(|o| o.value == "gamma" && o.checked));
    }

    #[test]
    fn test_view_hides_error_rows() {
        let s = session(&["A", "Error: A bad", "B"], &[]);
        let view = s.view("(Select All)");
        let values: Vec<&str> = view.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B"]);
    }

    #[test]
    fn test_terminal_commands() {
        let s = session(&["A"], &[]);
        let s = step(s, FilterCommand::toggle("A", true));
        match s.clone().reduce(FilterCommand::Apply) {
            MenuStep::Apply { column, selection } => {
                assert_eq!(column, "status");
                assert!(selection.contains("A"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            s.clone().reduce(FilterCommand::SortDescending),
            MenuStep::Sort {
                ascending: false,
                ..
            }
        ));
        assert!(matches!(
            s.clone().reduce(FilterCommand::Clear),
            MenuStep::Clear { .. }
        ));
        assert!(matches!(
            s.reduce(FilterCommand::Cancel),
            MenuStep::Cancel { .. }
        ));
    }

    #[test]
    fn test_toggles_commute_per_value() {
        let forward = [
            FilterCommand::toggle("A", true),
            FilterCommand::toggle("C", true),
            FilterCommand::toggle("A", false),
        ];
        let backward = [
            FilterCommand::toggle("C", true),
            FilterCommand::toggle("A", true),
            FilterCommand::toggle("A", false),
        ];
        let run = |commands: &[FilterCommand]| {
            commands
                .iter()
                .cloned()
                .fold(session(&["A", "B", "C"], &[]), step)
                .working()
                .clone()
        };
        assert_eq!(run(&forward), run(&backward));
    }
}
