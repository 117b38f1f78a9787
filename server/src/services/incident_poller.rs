use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use warmap_shared::normalize::{expand_multi_type, unique_site_types};
use warmap_shared::refresh::next_refresh_delay;
use warmap_shared::{Incident, IncidentEvent};

use crate::config::{IncidentSource, refresh_lead};
use crate::error::SourceError;
use crate::state::{AppState, IncidentSnapshot, PreSerializedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub seq: u64,
    pub count: usize,
}

/// Fetch immediately, then again shortly before every top of the hour.
pub async fn run(state: AppState) {
    let lead = refresh_lead();

    loop {
        let delay = poll_once(&state, lead, Utc::now).await;
        tokio::time::sleep(delay).await;
    }
}

/// Refresh once and return the wait until the next aligned poll.
/// A failed cycle keeps the previous dataset and waits for the same slot.
async fn poll_once(
    state: &AppState,
    lead: Duration,
    clock: impl Fn() -> DateTime<Utc>,
) -> Duration {
    match refresh_once(state).await {
        Ok(outcome) => {
            info!(
                seq = outcome.seq,
                count = outcome.count,
                "incident dataset refreshed"
            );
        }
        Err(e) => {
            state.observability.record_refresh_failure();
            warn!(
                error = %e,
                source = %state.source.describe(),
                "failed to refresh incidents; keeping previous dataset"
            );
        }
    }
    next_refresh_delay(clock(), lead)
}

pub async fn refresh_once(state: &AppState) -> Result<RefreshOutcome, SourceError> {
    let body = fetch_source(&state.http_client, &state.source).await?;
    let records = parse_incident_payload(&body)?;
    apply_refresh(state, records).await
}

async fn fetch_source(
    client: &reqwest::Client,
    source: &IncidentSource,
) -> Result<Bytes, SourceError> {
    match source {
        IncidentSource::Remote(url) => {
            let resp = client.get(url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(SourceError::Status(status.as_u16()));
            }
            Ok(resp.bytes().await?)
        }
        IncidentSource::File(path) => tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            }),
    }
}

/// Decode the feed. The body must be a JSON array; non-object elements are skipped.
pub fn parse_incident_payload(body: &[u8]) -> Result<Vec<Incident>, SourceError> {
    let value: Value = serde_json::from_slice(body)?;
    let Value::Array(items) = value else {
        return Err(SourceError::Parse("expected a JSON array".to_owned()));
    };

    let total = items.len();
    let records: Vec<Incident> = items.into_iter().filter_map(Incident::from_value).collect();
    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            "skipped non-object entries in incident feed"
        );
    }
    Ok(records)
}

/// Expand, serialize and swap in a new snapshot, then notify SSE clients.
pub async fn apply_refresh(
    state: &AppState,
    raw: Vec<Incident>,
) -> Result<RefreshOutcome, SourceError> {
    let records = expand_multi_type(raw);
    let count = records.len();
    let incidents_json = Arc::new(Bytes::from(serde_json::to_vec(&records)?));
    let site_types_json = Arc::new(Bytes::from(serde_json::to_vec(&unique_site_types(
        &records,
    ))?));
    let now = Utc::now();

    let (seq, name, event_json) = {
        let mut snapshot = state.snapshot.write().await;
        let seq = snapshot.seq.saturating_add(1);
        let event = IncidentEvent::Snapshot {
            seq,
            timestamp: now.to_rfc3339(),
            count,
        };
        let event_json = Arc::new(Bytes::from(serde_json::to_vec(&event)?));
        *snapshot = IncidentSnapshot {
            seq,
            refreshed_at: Some(now),
            records: Arc::new(records),
            incidents_json,
            site_types_json,
            event_json: Arc::clone(&event_json),
        };
        (seq, event.event_name(), event_json)
    };

    state.observability.record_refresh();
    // No receivers just means no SSE clients are connected.
    let _ = state.event_tx.send(PreSerializedEvent {
        seq,
        name,
        json: event_json,
    });

    Ok(RefreshOutcome { seq, count })
}
