//! Header filter: per-column committed filters and the open menu session.
//!
//! Opening a menu is split in two so the candidate fetch can run on the
//! host's event loop: [`HeaderFilter::begin_open`] hands out a
//! [`FetchTicket`], and [`HeaderFilter::finish_open`] installs the menu only
//! if that ticket still names the active session. A menu closed or
//! superseded while its fetch was in flight drops the late result.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, error, info, warn};

use crate::config::FilterConfig;
use crate::data::data_source::FilterDataSource;
use crate::error::FilterError;
use crate::filter::column_state::{ActiveFilters, ColumnFilterState};
use crate::filter::command::FilterCommand;
use crate::filter::session::{
    search_candidates, MenuSession, MenuStep, MenuView, WorkingSelection,
};

/// Things that happened to the filter, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    Opened { column: String, candidates: usize },
    Applied { column: String, selected: usize },
    Cleared { column: String },
    Sorted { column: String, ascending: bool },
    Cancelled { column: String },
    FetchDiscarded { session: u64 },
    SourceFailed { operation: &'static str, message: String },
}

/// Trait for components that want to hear about filter events
pub trait FilterSubscriber {
    fn on_filter_event(&mut self, event: &FilterEvent);

    /// Get subscriber name for debugging
    fn name(&self) -> &str;
}

/// What a dispatched command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Menu still open, re-render with this view
    Updated(MenuView),
    /// Menu closed; the column's committed selection is now this
    Committed(BTreeSet<String>),
    Sorted { column: String, ascending: bool },
    /// Menu closed without changes
    Closed,
}

/// Candidate fetch for a menu that is being opened
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub session: u64,
    pub column: String,
    /// Rows the fetch must be restricted to
    pub constraints: ActiveFilters,
}

#[derive(Debug)]
struct PendingOpen {
    session: u64,
    column: String,
    working: WorkingSelection,
}

pub struct HeaderFilter {
    /// Columns in grid order
    columns: Vec<ColumnFilterState>,

    session: Option<MenuSession>,
    pending: Option<PendingOpen>,
    next_session: u64,

    settings: FilterConfig,
    subscribers: Vec<Box<dyn FilterSubscriber>>,
    event_history: VecDeque<FilterEvent>,
}

impl HeaderFilter {
    pub fn new(settings: FilterConfig) -> Self {
        Self {
            columns: Vec::new(),
            session: None,
            pending: None,
            next_session: 0,
            settings,
            subscribers: Vec::new(),
            event_history: VecDeque::new(),
        }
    }

    /// One filterable column per name
    pub fn with_columns<I, S>(settings: FilterConfig, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new(settings);
        for name in names {
            filter.add_column(ColumnFilterState::new(name));
        }
        filter
    }

    /// Register a column. A column with the same name is replaced.
    pub fn add_column(&mut self, state: ColumnFilterState) {
        match self.columns.iter_mut().find(|c| c.name == state.name) {
            Some(existing) => *existing = state,
            None => self.columns.push(state),
        }
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn FilterSubscriber>) {
        info!(target: "filter", "HeaderFilter: Adding subscriber: {}", subscriber.name());
        self.subscribers.push(subscriber);
    }

    pub fn column_state(&self, column: &str) -> Option<&ColumnFilterState> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Committed selection of every filtered column
    pub fn active_filters(&self) -> ActiveFilters {
        self.columns.iter().collect()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Column of the open menu, if any
    pub fn open_column(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.column())
    }

    pub fn view(&self) -> Option<MenuView> {
        self.session
            .as_ref()
            .map(|s| s.view(&self.settings.select_all_label))
    }

    pub fn working(&self) -> Option<&WorkingSelection> {
        self.session.as_ref().map(|s| s.working())
    }

    pub fn event_history(&self) -> impl Iterator<Item = &FilterEvent> {
        self.event_history.iter()
    }

    /// Start opening the menu on `column`.
    ///
    /// Any open or half-open menu is discarded. With nothing committed on
    /// the column the fetch sees every row; otherwise it sees the rows left
    /// by every other column's filter, so a narrowed filter can be widened
    /// again.
    pub fn begin_open(&mut self, column: &str) -> Result<FetchTicket, FilterError> {
        let state = self
            .column_state(column)
            .ok_or_else(|| FilterError::UnknownColumn {
                column: column.to_string(),
            })?;
        if !state.filterable {
            return Err(FilterError::NotFilterable {
                column: column.to_string(),
            });
        }
        let working = WorkingSelection::seeded(&state.selected_values);

        self.close();

        let constraints = self.candidate_constraints(column);

        self.next_session += 1;
        let session = self.next_session;
        debug!(target: "filter",
            "session {} opening on '{}' with {} constraint column(s)",
            session,
            column,
            constraints.len()
        );
        self.pending = Some(PendingOpen {
            session,
            column: column.to_string(),
            working,
        });

        Ok(FetchTicket {
            session,
            column: column.to_string(),
            constraints,
        })
    }

    /// Install the menu for `ticket` with the fetched candidates.
    ///
    /// A failed fetch still opens the menu, with nothing to pick.
    pub fn finish_open(
        &mut self,
        ticket: FetchTicket,
        fetched: anyhow::Result<Vec<String>>,
    ) -> Result<MenuView, FilterError> {
        let pending = match self.pending.take() {
            Some(pending) if pending.session == ticket.session => pending,
            other => {
                self.pending = other;
                debug!(target: "filter", "dropping candidates for stale session {}", ticket.session);
                self.record(FilterEvent::FetchDiscarded {
                    session: ticket.session,
                });
                return Err(FilterError::StaleSession {
                    session: ticket.session,
                });
            }
        };

        let candidates = match fetched {
            Ok(values) => dedup_in_order(values),
            Err(e) => {
                warn!(target: "filter", "candidate fetch for '{}' failed: {:#}", pending.column, e);
                self.record(FilterEvent::SourceFailed {
                    operation: "distinct_values",
                    message: e.to_string(),
                });
                Vec::new()
            }
        };

        if let Some(state) = self.columns.iter_mut().find(|c| c.name == pending.column) {
            state.available_values = candidates.clone();
        }

        let session = MenuSession::new(
            pending.session,
            pending.column.clone(),
            candidates,
            pending.working,
            self.settings.error_marker.clone(),
        );
        let view = session.view(&self.settings.select_all_label);
        self.record(FilterEvent::Opened {
            column: pending.column,
            candidates: session.candidates().len(),
        });
        self.session = Some(session);
        Ok(view)
    }

    /// Open the menu on `column`, fetching candidates synchronously
    pub fn open(
        &mut self,
        column: &str,
        source: &dyn FilterDataSource,
    ) -> Result<MenuView, FilterError> {
        let ticket = self.begin_open(column)?;
        let fetched = source.distinct_values(&ticket.column, &ticket.constraints);
        self.finish_open(ticket, fetched)
    }

    /// Feed one menu command through the session reducer and carry out
    /// whatever it asks for.
    pub fn dispatch(
        &mut self,
        command: FilterCommand,
        source: &mut dyn FilterDataSource,
    ) -> Result<FilterOutcome, FilterError> {
        let session = self.session.take().ok_or(FilterError::NoActiveSession)?;

        let step = match command {
            FilterCommand::Search(text) => {
                MenuStep::Continue(self.search_source(session, text, source))
            }
            command => session.reduce(command),
        };

        match step {
            MenuStep::Continue(next) => {
                let view = next.view(&self.settings.select_all_label);
                self.session = Some(next);
                Ok(FilterOutcome::Updated(view))
            }
            MenuStep::Apply { column, selection } => Ok(FilterOutcome::Committed(
                self.commit_selection(&column, selection, source),
            )),
            MenuStep::Clear { column } => {
                Ok(FilterOutcome::Committed(self.clear_column(&column, source)))
            }
            MenuStep::Cancel { column } => {
                self.record(FilterEvent::Cancelled { column });
                Ok(FilterOutcome::Closed)
            }
            MenuStep::Sort { column, ascending } => {
                self.run_sort(&column, ascending, source);
                Ok(FilterOutcome::Sorted { column, ascending })
            }
        }
    }

    /// OK button: write the working selection back and re-filter.
    ///
    /// An empty working selection leaves the committed filter alone; use
    /// [`HeaderFilter::clear`] to drop a filter.
    pub fn commit(
        &mut self,
        source: &mut dyn FilterDataSource,
    ) -> Result<BTreeSet<String>, FilterError> {
        let session = self.session.take().ok_or(FilterError::NoActiveSession)?;
        let column = session.column().to_string();
        let selection = session.working().clone();
        Ok(self.commit_selection(&column, selection, source))
    }

    /// Clear button: drop the open column's filter and re-filter
    pub fn clear(
        &mut self,
        source: &mut dyn FilterDataSource,
    ) -> Result<BTreeSet<String>, FilterError> {
        let session = self.session.take().ok_or(FilterError::NoActiveSession)?;
        Ok(self.clear_column(session.column(), source))
    }

    /// Cancel button
    pub fn cancel(&mut self) -> Result<(), FilterError> {
        let session = self.session.take().ok_or(FilterError::NoActiveSession)?;
        self.record(FilterEvent::Cancelled {
            column: session.column().to_string(),
        });
        Ok(())
    }

    /// Dismiss the menu (escape, click outside, column resize). Also
    /// abandons a menu whose candidates are still being fetched.
    pub fn close(&mut self) {
        self.pending = None;
        if let Some(session) = self.session.take() {
            self.record(FilterEvent::Cancelled {
                column: session.column().to_string(),
            });
        }
    }

    /// Sort by `column` whether or not a menu is open or a filter is set
    pub fn sort(
        &mut self,
        column: &str,
        ascending: bool,
        source: &mut dyn FilterDataSource,
    ) -> Result<(), FilterError> {
        if self.column_state(column).is_none() {
            return Err(FilterError::UnknownColumn {
                column: column.to_string(),
            });
        }
        // leaving the menu for a sort is not a cancel
        self.pending = None;
        self.session = None;
        self.run_sort(column, ascending, source);
        Ok(())
    }

    /// Rows a candidate fetch for `column` is restricted to. With nothing
    /// committed on the column the fetch sees every row; otherwise the rows
    /// left by every other column's filter.
    fn candidate_constraints(&self, column: &str) -> ActiveFilters {
        match self.column_state(column) {
            Some(state) if state.is_filtered() => self.active_filters().without(column),
            _ => ActiveFilters::new(),
        }
    }

    /// Ask the source which candidates match `text`. Falls back to matching
    /// the session's own candidates when the source fails.
    fn search_source(
        &mut self,
        mut session: MenuSession,
        text: String,
        source: &dyn FilterDataSource,
    ) -> MenuSession {
        if !session.search_enabled() {
            return session;
        }
        let constraints = self.candidate_constraints(session.column());
        match source.matching_values(session.column(), &text, &constraints) {
            Ok(found) => session.show_matches(text, &found),
            Err(e) => {
                warn!(target: "filter", "search on '{}' failed, matching locally: {:#}", session.column(), e);
                self.record(FilterEvent::SourceFailed {
                    operation: "matching_values",
                    message: e.to_string(),
                });
                let found = search_candidates(session.candidates(), &text);
                session.show_matches(text, &found);
            }
        }
        session
    }

    fn commit_selection(
        &mut self,
        column: &str,
        selection: WorkingSelection,
        source: &mut dyn FilterDataSource,
    ) -> BTreeSet<String> {
        let Some(idx) = self.columns.iter().position(|c| c.name == column) else {
            warn!(target: "filter", "commit for unknown column '{}'", column);
            return BTreeSet::new();
        };

        if selection.is_empty() {
            debug!(target: "filter", "empty working selection on '{}', filter unchanged", column);
            return self.columns[idx].selected_values.clone();
        }

        let previous = std::mem::replace(
            &mut self.columns[idx].selected_values,
            selection.into_values(),
        );
        if self.apply_or_restore(idx, previous, source) {
            self.record(FilterEvent::Applied {
                column: column.to_string(),
                selected: self.columns[idx].selected_values.len(),
            });
        }
        self.columns[idx].selected_values.clone()
    }

    fn clear_column(&mut self, column: &str, source: &mut dyn FilterDataSource) -> BTreeSet<String> {
        let Some(idx) = self.columns.iter().position(|c| c.name == column) else {
            warn!(target: "filter", "clear for unknown column '{}'", column);
            return BTreeSet::new();
        };

        let previous = std::mem::take(&mut self.columns[idx].selected_values);
        if self.apply_or_restore(idx, previous, source) {
            self.record(FilterEvent::Cleared {
                column: column.to_string(),
            });
        }
        self.columns[idx].selected_values.clone()
    }

    /// Push the current filters to the source. On failure the column at
    /// `idx` gets `previous` back.
    fn apply_or_restore(
        &mut self,
        idx: usize,
        previous: BTreeSet<String>,
        source: &mut dyn FilterDataSource,
    ) -> bool {
        let filters = self.active_filters();
        match source.apply_filter(&filters) {
            Ok(()) => {
                info!(target: "filter",
                    "applied filter on '{}' ({} value(s))",
                    self.columns[idx].name,
                    self.columns[idx].selected_values.len()
                );
                true
            }
            Err(e) => {
                error!(target: "filter",
                    "applying filter on '{}' failed, keeping previous filter: {:#}",
                    self.columns[idx].name,
                    e
                );
                self.columns[idx].selected_values = previous;
                self.record(FilterEvent::SourceFailed {
                    operation: "apply_filter",
                    message: e.to_string(),
                });
                false
            }
        }
    }

    fn run_sort(&mut self, column: &str, ascending: bool, source: &mut dyn FilterDataSource) {
        match source.apply_sort(column, ascending) {
            Ok(()) => self.record(FilterEvent::Sorted {
                column: column.to_string(),
                ascending,
            }),
            Err(e) => {
                error!(target: "filter", "sorting '{}' failed: {:#}", column, e);
                self.record(FilterEvent::SourceFailed {
                    operation: "apply_sort",
                    message: e.to_string(),
                });
            }
        }
    }

    fn record(&mut self, event: FilterEvent) {
        for subscriber in &mut self.subscribers {
            debug!(target: "filter", "HeaderFilter: Notifying subscriber: {}", subscriber.name());
            subscriber.on_filter_event(&event);
        }
        self.event_history.push_back(event);
        while self.event_history.len() > self.settings.history_size {
            self.event_history.pop_front();
        }
    }
}

/// Drops repeats and empty values, keeping first-seen order
fn dedup_in_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect()
}
