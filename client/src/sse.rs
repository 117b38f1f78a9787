use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{EventSource, MessageEvent};

use warmap_shared::IncidentEvent;

pub const EVENTS_URL: &str = "/api/events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting,
}

struct SseConnection {
    es: EventSource,
    on_open: Closure<dyn Fn()>,
    on_error: Closure<dyn Fn()>,
    snapshot_handler: Closure<dyn Fn(MessageEvent)>,
}

impl SseConnection {
    fn close(self) {
        let _ = self.on_open.as_ref();
        let _ = self.on_error.as_ref();
        self.es.set_onopen(None);
        self.es.set_onerror(None);
        self.es
            .remove_event_listener_with_callback(
                "snapshot",
                self.snapshot_handler.as_ref().unchecked_ref(),
            )
            .ok();
        self.es.close();
    }
}

thread_local! {
    static SSE_CONNECTION: RefCell<Option<SseConnection>> = const { RefCell::new(None) };
    static LAST_SEQ: Cell<Option<u64>> = const { Cell::new(None) };
}

pub fn disconnect() {
    SSE_CONNECTION.with(|slot| {
        if let Some(connection) = slot.borrow_mut().take() {
            connection.close();
        }
    });
}

/// Sequence number of a `snapshot` payload.
fn snapshot_seq(data: &str) -> Option<u64> {
    serde_json::from_str::<IncidentEvent>(data)
        .ok()
        .map(|event| event.seq())
}

/// Whether `incoming` describes a dataset newer than the last one seen. A lower sequence means
/// the server restarted, which also counts as new data.
fn is_new_snapshot(last: Option<u64>, incoming: u64) -> bool {
    last != Some(incoming)
}

/// Listen for server refreshes and call `on_refresh` once per new dataset.
pub fn connect(
    on_status: impl Fn(ConnectionStatus) + 'static,
    on_refresh: impl Fn(u64) + 'static,
) {
    on_status(ConnectionStatus::Connecting);

    let es = match EventSource::new(EVENTS_URL) {
        Ok(es) => es,
        Err(_) => {
            on_status(ConnectionStatus::Reconnecting);
            return;
        }
    };

    let on_status = Rc::new(on_status);

    let status = Rc::clone(&on_status);
    let on_open = Closure::<dyn Fn()>::new(move || status(ConnectionStatus::Live));
    es.set_onopen(Some(on_open.as_ref().unchecked_ref()));

    let snapshot_handler = Closure::<dyn Fn(MessageEvent)>::new(move |e: MessageEvent| {
        let Some(data) = e.data().as_string() else {
            return;
        };
        let Some(seq) = snapshot_seq(&data) else {
            web_sys::console::warn_1(&"ignoring malformed snapshot event".into());
            return;
        };
        let last = LAST_SEQ.with(|cell| cell.replace(Some(seq)));
        if is_new_snapshot(last, seq) {
            on_refresh(seq);
        }
    });
    es.add_event_listener_with_callback("snapshot", snapshot_handler.as_ref().unchecked_ref())
        .ok();

    let status = Rc::clone(&on_status);
    let on_error = Closure::<dyn Fn()>::new(move || status(ConnectionStatus::Reconnecting));
    es.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    SSE_CONNECTION.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(old) = slot.take() {
            old.close();
        }
        *slot = Some(SseConnection {
            es,
            on_open,
            on_error,
            snapshot_handler,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_seq_reads_tagged_payload() {
        assert_eq!(
            snapshot_seq(r#"{"type":"Snapshot","seq":7,"timestamp":"t","count":3}"#),
            Some(7)
        );
        assert_eq!(snapshot_seq("keep-alive"), None);
    }

    #[test]
    fn repeated_sequence_is_not_new() {
        assert!(!is_new_snapshot(Some(4), 4));
        assert!(is_new_snapshot(Some(4), 5));
        assert!(is_new_snapshot(Some(9), 1));
        assert!(is_new_snapshot(None, 1));
    }
}
