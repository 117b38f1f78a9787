use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::AppState;

/// Refresh notifications. A client first receives the current snapshot event
/// (once the first refresh has landed), then one event per refresh.
pub async fn incident_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        // Subscribe before reading the snapshot so a refresh in between is not lost.
        let rx = state.event_tx.subscribe();
        let (mut last_seq, data) = current_event(&state).await;
        if let Some(event) = snapshot_event(last_seq, &data) {
            yield Ok(event);
        }

        let mut stream = BroadcastStream::new(rx);
        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    if event.seq <= last_seq {
                        continue;
                    }
                    let Some(payload) = event_payload(event.json.as_ref()) else {
                        warn!(
                            seq = event.seq,
                            event = event.name,
                            "event payload is not valid utf-8; dropping SSE event"
                        );
                        continue;
                    };
                    last_seq = event.seq;
                    yield Ok(
                        Event::default()
                            .id(event.seq.to_string())
                            .event(event.name)
                            .data(payload),
                    );
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "SSE client lagged behind broadcast buffer; replaying snapshot"
                    );
                    let (seq, data) = current_event(&state).await;
                    if let Some(event) = snapshot_event(seq, &data) {
                        last_seq = seq;
                        yield Ok(event);
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

async fn current_event(state: &AppState) -> (u64, Bytes) {
    let snapshot = state.snapshot.read().await;
    (snapshot.seq, (*snapshot.event_json).clone())
}

fn snapshot_event(seq: u64, data: &Bytes) -> Option<Event> {
    if data.is_empty() {
        return None;
    }
    let Some(payload) = event_payload(data) else {
        warn!("snapshot payload is not valid utf-8; skipping SSE snapshot event");
        return None;
    };
    Some(
        Event::default()
            .id(seq.to_string())
            .event("snapshot")
            .data(payload),
    )
}

fn event_payload(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes.as_ref()).ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt as _;

    use crate::config::IncidentSource;
    use crate::services::incident_poller::apply_refresh;
    use crate::state::AppState;

    async fn read_until(
        stream: &mut (impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin),
        buffer: &mut String,
        needle: &str,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !buffer.contains(needle) {
                let chunk = stream
                    .next()
                    .await
                    .expect("stream should stay open")
                    .expect("chunk should be readable");
                buffer.push_str(&String::from_utf8_lossy(&chunk));
            }
        })
        .await
        .expect("expected SSE data before timeout");
    }

    #[tokio::test]
    async fn events_stream_replays_snapshot_then_follows_refreshes() {
        let state = AppState::new(IncidentSource::File("unused.json".into()));
        apply_refresh(&state, Vec::new()).await.expect("first refresh");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state.clone(), "client/dist".into());
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });

        let response = reqwest::Client::new()
            .get(format!("http://{addr}/api/events"))
            .send()
            .await
            .expect("events request");
        assert_eq!(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/event-stream")
        );

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        read_until(&mut stream, &mut buffer, "id: 1").await;
        assert!(buffer.contains("event: snapshot"));
        assert!(buffer.contains("\"seq\":1"));

        apply_refresh(&state, Vec::new()).await.expect("second refresh");
        read_until(&mut stream, &mut buffer, "id: 2").await;
        assert!(buffer.contains("\"seq\":2"));

        server_handle.abort();
        let _ = server_handle.await;
    }
}
