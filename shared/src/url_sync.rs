use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::filter::FilterState;
use crate::query::{self, MapView, QueryParams};

/// Where the query string lives. The browser implementation uses `history.replaceState`.
pub trait QueryLocation {
    /// Current search string, with or without the leading `?`.
    fn search(&self) -> String;

    /// Replace the search string without adding a history entry.
    fn replace_search(&self, search: &str);
}

/// In-memory location for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    search: RefCell<String>,
    replacements: Cell<usize>,
}

impl MemoryLocation {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: RefCell::new(search.into()),
            replacements: Cell::new(0),
        }
    }

    /// Move to another entry the way back/forward navigation does. Not counted as a replacement.
    pub fn navigate(&self, search: impl Into<String>) {
        *self.search.borrow_mut() = search.into();
    }

    /// Number of `replace_search` calls so far.
    pub fn replacements(&self) -> usize {
        self.replacements.get()
    }
}

impl QueryLocation for MemoryLocation {
    fn search(&self) -> String {
        self.search.borrow().clone()
    }

    fn replace_search(&self, search: &str) {
        *self.search.borrow_mut() = search.to_owned();
        self.replacements.set(self.replacements.get() + 1);
    }
}

impl<L: QueryLocation + ?Sized> QueryLocation for Rc<L> {
    fn search(&self) -> String {
        (**self).search()
    }

    fn replace_search(&self, search: &str) {
        (**self).replace_search(search)
    }
}

/// Re-entrancy flag shared by everything that applies URL state.
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    active: Rc<Cell<bool>>,
}

impl SyncGuard {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Enter the guarded section. `None` if a pass is already running.
    pub fn try_enter(&self) -> Option<SyncToken> {
        if self.active.replace(true) {
            return None;
        }
        Some(SyncToken {
            active: Rc::clone(&self.active),
        })
    }
}

/// Clears the guard when dropped.
#[derive(Debug)]
pub struct SyncToken {
    active: Rc<Cell<bool>>,
}

impl Drop for SyncToken {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

/// Two-way binding between [`FilterState`] and the query string of a [`QueryLocation`].
pub struct UrlSync<L> {
    location: L,
    guard: SyncGuard,
}

impl<L: QueryLocation> UrlSync<L> {
    pub fn new(location: L) -> Self {
        Self {
            location,
            guard: SyncGuard::default(),
        }
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    pub fn params(&self) -> QueryParams {
        QueryParams::parse(&self.location.search())
    }

    /// URL to state.
    pub fn pull(&self) -> FilterState {
        FilterState::from_query(&self.params())
    }

    /// State to URL. Skipped while URL state is being applied; returns whether the URL was written.
    pub fn push(&self, state: &FilterState) -> bool {
        if self.guard.is_active() {
            return false;
        }
        let mut params = self.params();
        state.write_query(&mut params);
        self.write(&params);
        true
    }

    pub fn view(&self) -> MapView {
        MapView::from_query(&self.params())
    }

    pub fn push_view(&self, view: &MapView) {
        let mut params = self.params();
        view.write_query(&mut params);
        self.write(&params);
    }

    pub fn hide_ui(&self) -> bool {
        query::hide_ui(&self.params())
    }

    /// Read the URL state and hand it to `apply` inside the guard. `None` when already applying.
    pub fn apply_from_url<R>(&self, apply: impl FnOnce(FilterState) -> R) -> Option<R> {
        let _token = self.guard.try_enter()?;
        Some(apply(self.pull()))
    }

    fn write(&self, params: &QueryParams) {
        let search = params.to_search();
        if search != normalize_search(&self.location.search()) {
            self.location.replace_search(&search);
        }
    }
}

fn normalize_search(search: &str) -> String {
    if search.is_empty() || search == "?" {
        String::new()
    } else if search.starts_with('?') {
        search.to_owned()
    } else {
        format!("?{search}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TimeFilter;

    #[test]
    fn push_writes_filters_and_preserves_viewport() {
        let sync = UrlSync::new(MemoryLocation::new("?zoom=7&lat=1.000000&lng=2.000000"));
        let state = FilterState::default()
            .with_types(["oil"])
            .with_time(TimeFilter::last_days(3));

        assert!(sync.push(&state));
        assert_eq!(
            sync.location().search(),
            "?zoom=7&lat=1.000000&lng=2.000000&type=oil&time=3"
        );
        assert_eq!(sync.pull(), state);
    }

    #[test]
    fn push_without_changes_does_not_rewrite() {
        let sync = UrlSync::new(MemoryLocation::new("?type=oil"));
        let state = sync.pull();
        sync.push(&state);
        assert_eq!(sync.location().replacements(), 0);
    }

    #[test]
    fn apply_from_url_cannot_recurse() {
        let sync = UrlSync::new(MemoryLocation::new("?type=military"));
        let outer = sync.apply_from_url(|state| {
            assert!(sync.guard().is_active());
            assert!(!sync.push(&FilterState::default()));
            let inner = sync.apply_from_url(|_| ());
            (state, inner)
        });

        let (state, inner) = outer.expect("first application runs");
        assert!(state.selected_types.contains("military"));
        assert!(inner.is_none());
        assert!(!sync.guard().is_active());
        assert_eq!(sync.location().replacements(), 0);
    }

    #[test]
    fn viewport_is_read_and_written() {
        let sync = UrlSync::new(MemoryLocation::new(""));
        assert_eq!(sync.view(), MapView::default());

        sync.push_view(&MapView {
            zoom: 10,
            lat: 35.7,
            lng: 51.4,
        });
        assert_eq!(sync.location().search(), "?zoom=10&lat=35.700000&lng=51.400000");
        assert_eq!(sync.view().zoom, 10);
    }

    #[test]
    fn hide_ui_reads_flag() {
        assert!(UrlSync::new(MemoryLocation::new("?hideUI=true")).hide_ui());
        assert!(!UrlSync::new(MemoryLocation::new("?hideUI=false")).hide_ui());
    }

    #[test]
    fn shared_location_through_rc() {
        let location = Rc::new(MemoryLocation::new(""));
        let sync = UrlSync::new(Rc::clone(&location));
        sync.push(&FilterState::default().with_types(["nuclear"]));
        assert_eq!(location.search(), "?type=nuclear");
    }
}
