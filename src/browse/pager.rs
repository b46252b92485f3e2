//! Pagination and sort state machine.
//!
//! Every transition is tentative: it returns a [`FetchTicket`] and the new page state
//! is only committed once the matching fetch completes. A result for any other ticket
//! is stale and gets dropped, so a slow response can never overwrite a newer view.

use bson::{Document, doc};

use super::error::BrowseError;
use super::settings::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PAGE_SIZE_CHOICES};
use super::table::TablePage;
use crate::store::FindRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn to_document(&self) -> Document {
        doc! { self.field.as_str(): self.direction.as_i32() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u64);

impl PageSize {
    pub fn new(size: u64) -> Result<Self, BrowseError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(BrowseError::InvalidPageSize {
                size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(Self(size))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The next preset size, wrapping around. Custom sizes move to the first preset above them.
    pub fn next_choice(self) -> Self {
        let next = PAGE_SIZE_CHOICES
            .iter()
            .copied()
            .find(|choice| *choice > self.0)
            .unwrap_or(PAGE_SIZE_CHOICES[0]);
        Self(next)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub page_index: u64,
    pub page_size: PageSize,
    pub sort: Option<SortSpec>,
    /// Filter text as typed, kept for display.
    pub filter_text: String,
    pub filter: Document,
}

impl PageState {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_index: 0,
            page_size,
            sort: None,
            filter_text: String::new(),
            filter: Document::new(),
        }
    }

    pub fn find_request(&self) -> FindRequest {
        let page_size = self.page_size.get();
        FindRequest {
            filter: self.filter.clone(),
            sort: self.sort.as_ref().map(SortSpec::to_document),
            skip: self.page_index.saturating_mul(page_size),
            limit: i64::try_from(page_size).unwrap_or(i64::MAX),
        }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(PageSize::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Error(BrowseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub request_id: u64,
    pub request: FindRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    Failed(BrowseError),
    /// The ticket was superseded; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Pager {
    committed: PageState,
    pending: Option<(u64, PageState)>,
    load_state: LoadState,
    page: TablePage,
    has_loaded: bool,
    request_seq: u64,
}

impl Pager {
    pub fn new(state: PageState) -> Self {
        Self {
            committed: state,
            pending: None,
            load_state: LoadState::Idle,
            page: TablePage::default(),
            has_loaded: false,
            request_seq: 0,
        }
    }

    /// The last state whose page was loaded successfully.
    pub fn state(&self) -> &PageState {
        &self.committed
    }

    /// The state being loaded, if any.
    pub fn pending_state(&self) -> Option<&PageState> {
        self.pending.as_ref().map(|(_, state)| state)
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    pub fn page(&self) -> &TablePage {
        &self.page
    }

    pub fn sort_indicator(&self, column: &str) -> Option<&'static str> {
        self.target()
            .sort
            .as_ref()
            .filter(|sort| sort.field == column)
            .map(|sort| sort.direction.arrow())
    }

    pub fn is_active(&self, request_id: u64) -> bool {
        matches!(self.pending, Some((id, _)) if id == request_id)
    }

    // Transitions build on the newest intent so quick repeated input accumulates.
    fn target(&self) -> &PageState {
        self.pending_state().unwrap_or(&self.committed)
    }

    fn begin(&mut self, state: PageState) -> FetchTicket {
        self.request_seq += 1;
        let request = state.find_request();
        self.pending = Some((self.request_seq, state));
        self.load_state = LoadState::Loading;
        FetchTicket {
            request_id: self.request_seq,
            request,
        }
    }

    /// Fetch the current state again.
    pub fn load(&mut self) -> FetchTicket {
        let state = self.target().clone();
        self.begin(state)
    }

    pub fn next_page(&mut self) -> FetchTicket {
        let mut state = self.target().clone();
        state.page_index += 1;
        self.begin(state)
    }

    pub fn prev_page(&mut self) -> Result<FetchTicket, BrowseError> {
        let mut state = self.target().clone();
        if state.page_index == 0 {
            return Err(BrowseError::AtFirstPage);
        }
        state.page_index -= 1;
        Ok(self.begin(state))
    }

    pub fn set_page_size(&mut self, size: u64) -> Result<FetchTicket, BrowseError> {
        let page_size = PageSize::new(size)?;
        let mut state = self.target().clone();
        state.page_size = page_size;
        state.page_index = 0;
        Ok(self.begin(state))
    }

    pub fn cycle_page_size(&mut self) -> FetchTicket {
        let mut state = self.target().clone();
        state.page_size = state.page_size.next_choice();
        state.page_index = 0;
        self.begin(state)
    }

    pub fn set_filter(&mut self, text: impl Into<String>, filter: Document) -> FetchTicket {
        let mut state = self.target().clone();
        state.filter_text = text.into();
        state.filter = filter;
        state.page_index = 0;
        self.begin(state)
    }

    /// Same column flips direction, another column sorts ascending. Always back to page 0.
    pub fn toggle_sort(&mut self, column: &str) -> FetchTicket {
        let mut state = self.target().clone();
        state.sort = Some(match state.sort.take() {
            Some(sort) if sort.field == column => SortSpec {
                field: sort.field,
                direction: sort.direction.flipped(),
            },
            _ => SortSpec {
                field: column.to_string(),
                direction: SortDirection::Ascending,
            },
        });
        state.page_index = 0;
        self.begin(state)
    }

    /// Record a failure that happened before any fetch could be issued.
    ///
    /// Any fetch still in flight is abandoned.
    pub fn reject(&mut self, err: BrowseError) {
        self.request_seq += 1;
        self.pending = None;
        self.load_state = LoadState::Error(err);
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.request_seq += 1;
            self.load_state = if self.has_loaded {
                LoadState::Loaded
            } else {
                LoadState::Idle
            };
        }
    }

    pub fn complete(
        &mut self,
        request_id: u64,
        result: Result<TablePage, BrowseError>,
    ) -> Completion {
        if !self.is_active(request_id) {
            tracing::debug!(
                request_id,
                active = ?self.pending.as_ref().map(|(id, _)| *id),
                "Discarding stale page result"
            );
            return Completion::Stale;
        }
        let Some((_, state)) = self.pending.take() else {
            return Completion::Stale;
        };
        match result {
            Ok(page) => {
                self.committed = state;
                self.page = page;
                self.has_loaded = true;
                self.load_state = LoadState::Loaded;
                Completion::Applied
            }
            Err(err) => {
                tracing::debug!(request_id, error = %err, kind = %err.kind(), "Page fetch failed");
                self.load_state = LoadState::Error(err.clone());
                Completion::Failed(err)
            }
        }
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(PageState::default())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::browse::identity::IdentityResolver;

    fn page(values: &[i32]) -> TablePage {
        let documents = values.iter().map(|v| doc! { "_id": *v }).collect();
        TablePage::build(documents, &IdentityResolver::default(), 150)
    }

    fn loaded_pager() -> Pager {
        let mut pager = Pager::default();
        let ticket = pager.load();
        assert_eq!(pager.complete(ticket.request_id, Ok(page(&[1]))), Completion::Applied);
        pager
    }

    #[test]
    fn find_request_uses_skip_limit_and_sort() {
        let state = PageState {
            page_index: 2,
            page_size: PageSize::new(50).unwrap(),
            sort: Some(SortSpec {
                field: "value".to_string(),
                direction: SortDirection::Descending,
            }),
            filter_text: "value > 1".to_string(),
            filter: doc! { "value": { "$gt": 1 } },
        };
        let request = state.find_request();
        assert_eq!(request.skip, 100);
        assert_eq!(request.limit, 50);
        assert_eq!(request.sort, Some(doc! { "value": -1 }));
        assert_eq!(request.filter, doc! { "value": { "$gt": 1 } });
    }

    #[test]
    fn state_commits_only_on_completion() {
        let mut pager = loaded_pager();
        let ticket = pager.next_page();
        assert!(pager.is_loading());
        assert_eq!(pager.state().page_index, 0);
        pager.complete(ticket.request_id, Ok(page(&[2])));
        assert_eq!(pager.state().page_index, 1);
        assert_eq!(*pager.load_state(), LoadState::Loaded);
    }

    #[test]
    fn failed_fetch_keeps_previous_state_and_page() {
        let mut pager = loaded_pager();
        let before = pager.page().clone();
        let ticket = pager.next_page();
        let err = BrowseError::Connection("down".into());
        assert_eq!(
            pager.complete(ticket.request_id, Err(err.clone())),
            Completion::Failed(err.clone())
        );
        assert_eq!(pager.state().page_index, 0);
        assert_eq!(*pager.page(), before);
        assert_eq!(*pager.load_state(), LoadState::Error(err));
    }

    #[test]
    fn superseded_results_are_discarded() {
        let mut pager = loaded_pager();
        let first = pager.next_page();
        let second = pager.set_filter("x = 1", doc! { "x": 1 });
        assert_eq!(pager.complete(first.request_id, Ok(page(&[9]))), Completion::Stale);
        assert_eq!(pager.state().page_index, 0);
        assert_eq!(pager.complete(second.request_id, Ok(page(&[3]))), Completion::Applied);
        assert_eq!(pager.state().filter, doc! { "x": 1 });
    }

    #[test]
    fn prev_page_on_first_page_is_a_notice() {
        let mut pager = loaded_pager();
        assert_eq!(pager.prev_page().unwrap_err(), BrowseError::AtFirstPage);
        assert_eq!(*pager.load_state(), LoadState::Loaded);
    }

    #[test]
    fn filter_and_page_size_reset_to_first_page() {
        let mut pager = loaded_pager();
        let ticket = pager.next_page();
        pager.complete(ticket.request_id, Ok(page(&[2])));

        let ticket = pager.set_page_size(50).unwrap();
        assert_eq!(ticket.request.skip, 0);
        assert_eq!(ticket.request.limit, 50);

        let ticket = pager.set_filter("", doc! {});
        assert_eq!(ticket.request.skip, 0);
    }

    #[test]
    fn page_size_is_bounded() {
        let mut pager = Pager::default();
        assert_eq!(
            pager.set_page_size(0).unwrap_err(),
            BrowseError::InvalidPageSize { size: 0, max: 1000 }
        );
        assert!(pager.set_page_size(1001).is_err());
        assert!(pager.set_page_size(1000).is_ok());
    }

    #[test]
    fn page_size_cycles_through_presets() {
        let size = PageSize::default();
        assert_eq!(size.next_choice().get(), 50);
        assert_eq!(size.next_choice().next_choice().get(), 100);
        assert_eq!(PageSize::new(100).unwrap().next_choice().get(), 20);
        assert_eq!(PageSize::new(30).unwrap().next_choice().get(), 50);
    }

    #[test]
    fn toggle_sort_flips_same_column_and_resets_page() {
        let mut pager = loaded_pager();
        let ticket = pager.toggle_sort("value");
        assert_eq!(ticket.request.sort, Some(doc! { "value": 1 }));
        assert_eq!(pager.sort_indicator("value"), Some("↑"));
        let ticket = pager.toggle_sort("value");
        assert_eq!(ticket.request.sort, Some(doc! { "value": -1 }));
        let ticket = pager.toggle_sort("other");
        assert_eq!(ticket.request.sort, Some(doc! { "other": 1 }));
        assert_eq!(pager.sort_indicator("value"), None);
    }

    #[test]
    fn rejected_filter_abandons_in_flight_fetch() {
        let mut pager = loaded_pager();
        let ticket = pager.next_page();
        pager.reject(BrowseError::AtFirstPage);
        assert_eq!(pager.complete(ticket.request_id, Ok(page(&[2]))), Completion::Stale);
        assert_eq!(pager.state().page_index, 0);
    }

    #[test]
    fn cancel_returns_to_loaded() {
        let mut pager = loaded_pager();
        let ticket = pager.next_page();
        pager.cancel();
        assert_eq!(*pager.load_state(), LoadState::Loaded);
        assert_eq!(pager.complete(ticket.request_id, Ok(page(&[2]))), Completion::Stale);
    }
}
