use std::cell::RefCell;

use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;

use warmap_shared::QueryLocation;

const POPSTATE: &str = "popstate";

thread_local! {
    static POPSTATE_LISTENER: RefCell<Option<Closure<dyn Fn()>>> = const { RefCell::new(None) };
}

/// `window.location.search`, rewritten with `history.replaceState` so no history entry is added.
#[derive(Clone, Copy, Default)]
pub struct BrowserLocation;

impl QueryLocation for BrowserLocation {
    fn search(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default()
    }

    fn replace_search(&self, search: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let pathname = window.location().pathname().unwrap_or_default();
        let Ok(history) = window.history() else {
            return;
        };
        let url = replacement_url(&pathname, search);
        if let Err(e) = history.replace_state_with_url(&JsValue::NULL, "", Some(&url)) {
            web_sys::console::warn_1(&format!("replaceState failed: {e:?}").into());
        }
    }
}

/// Call `handler` on browser back/forward navigation. Replaces any earlier listener.
pub fn on_history_navigation(handler: impl Fn() + 'static) {
    stop_history_navigation();
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::<dyn Fn()>::new(handler);
    if let Err(e) =
        window.add_event_listener_with_callback(POPSTATE, callback.as_ref().unchecked_ref())
    {
        web_sys::console::warn_1(&format!("popstate listener not installed: {e:?}").into());
        return;
    }
    POPSTATE_LISTENER.with(|slot| *slot.borrow_mut() = Some(callback));
}

pub fn stop_history_navigation() {
    let Some(callback) = POPSTATE_LISTENER.with(|slot| slot.borrow_mut().take()) else {
        return;
    };
    if let Some(window) = web_sys::window() {
        let _ = window
            .remove_event_listener_with_callback(POPSTATE, callback.as_ref().unchecked_ref());
    }
}

fn replacement_url(pathname: &str, search: &str) -> String {
    let search = search.trim_start_matches('?');
    if search.is_empty() {
        pathname.to_owned()
    } else {
        format!("{pathname}?{search}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_url_keeps_path_and_drops_empty_query() {
        assert_eq!(replacement_url("/map", "?type=oil"), "/map?type=oil");
        assert_eq!(replacement_url("/map", "type=oil"), "/map?type=oil");
        assert_eq!(replacement_url("/map", ""), "/map");
    }
}
