//! Page-wide owner of the filter engine and the URL sync.
//!
//! Everything here runs on the single wasm thread. UI handlers, the refresh timer and the SSE
//! channel all go through these functions instead of holding the engine themselves.

use std::cell::RefCell;

use warmap_shared::{
    FilterEngine, FilterPass, FilterState, Incident, Locale, MapView, StateOrigin, UrlSync,
};

use crate::leaflet::LeafletSurface;
use crate::location::BrowserLocation;

thread_local! {
    static ENGINE: RefCell<Option<FilterEngine<LeafletSurface>>> = const { RefCell::new(None) };
    static URL_SYNC: UrlSync<BrowserLocation> = UrlSync::new(BrowserLocation);
}

pub fn install(engine: FilterEngine<LeafletSurface>) {
    ENGINE.with(|slot| {
        *slot.borrow_mut() = Some(engine);
    });
}

pub fn is_installed() -> bool {
    ENGINE.with(|slot| slot.try_borrow().map(|engine| engine.is_some()).unwrap_or(true))
}

/// Run `f` against the engine. `None` before [`install`] or while the engine is already borrowed.
fn with_engine<R>(f: impl FnOnce(&mut FilterEngine<LeafletSurface>) -> R) -> Option<R> {
    ENGINE.with(|slot| {
        let Ok(mut slot) = slot.try_borrow_mut() else {
            web_sys::console::warn_1(&"filter engine is busy; dropping re-entrant call".into());
            return None;
        };
        slot.as_mut().map(f)
    })
}

fn log_pass(context: &str, pass: FilterPass) {
    web_sys::console::log_1(
        &format!(
            "{context}: {} visible, {} placed, {} without coordinates",
            pass.visible, pass.placed, pass.skipped_without_coordinates
        )
        .into(),
    );
}

/// Apply an edit made through the filter panel.
pub fn apply_ui(edit: impl FnOnce(&mut FilterState)) {
    if let Some(Some(pass)) = with_engine(|engine| engine.update_state(StateOrigin::Ui, edit)) {
        log_pass("filters", pass);
    }
}

/// Adopt whatever filter state the URL currently describes.
pub fn apply_url() {
    URL_SYNC.with(|sync| {
        let applied = sync.apply_from_url(|state| {
            with_engine(|engine| engine.set_state(state, StateOrigin::Url))
        });
        if let Some(Some(Some(pass))) = applied {
            log_pass("url filters", pass);
        }
    });
}

/// Swap in a freshly fetched dataset and redraw.
pub fn replace_data(records: Vec<Incident>) -> Option<FilterPass> {
    let pass = with_engine(|engine| engine.replace_data(records))?;
    log_pass("data refresh", pass);
    Some(pass)
}

pub fn site_types() -> Option<Vec<String>> {
    with_engine(|engine| engine.site_types())
}

pub fn set_clustering(on: bool) {
    if let Some(pass) = with_engine(|engine| engine.set_clustering(on)) {
        log_pass("clustering", pass);
    }
}

pub fn set_locale(locale: Locale) {
    with_engine(|engine| engine.store_mut().set_locale(locale));
}

/// Mirror a state change into the query string unless the URL produced it.
pub fn push_url(state: &FilterState, origin: StateOrigin) {
    if origin == StateOrigin::Url {
        return;
    }
    URL_SYNC.with(|sync| {
        sync.push(state);
    });
}

pub fn url_view() -> MapView {
    URL_SYNC.with(|sync| sync.view())
}

pub fn push_view(view: &MapView) {
    URL_SYNC.with(|sync| sync.push_view(view));
}

pub fn hide_ui() -> bool {
    URL_SYNC.with(|sync| sync.hide_ui())
}
