use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};
use tracing::warn;
use warmap_shared::Incident;
use warmap_shared::normalize::unique_site_types;

use crate::config::{
    IncidentSource, sse_broadcast_buffer, upstream_connect_timeout, upstream_http_timeout,
};

/// Pre-serialized SSE event, serialized once by the poller and shared by all clients via Arc.
#[derive(Debug, Clone)]
pub struct PreSerializedEvent {
    pub seq: u64,
    pub name: &'static str,
    pub json: Arc<Bytes>,
}

/// The latest normalized dataset plus its pre-serialized payloads.
#[derive(Debug, Clone)]
pub struct IncidentSnapshot {
    pub seq: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub records: Arc<Vec<Incident>>,
    pub incidents_json: Arc<Bytes>,
    pub site_types_json: Arc<Bytes>,
    pub event_json: Arc<Bytes>,
}

impl Default for IncidentSnapshot {
    fn default() -> Self {
        let site_types_json = serde_json::to_vec(&unique_site_types(&Vec::<Incident>::new()))
            .map(Bytes::from)
            .unwrap_or_else(|_| Bytes::from_static(b"[]"));
        Self {
            seq: 0,
            refreshed_at: None,
            records: Arc::new(Vec::new()),
            incidents_json: Arc::new(Bytes::from_static(b"[]")),
            site_types_json: Arc::new(site_types_json),
            event_json: Arc::new(Bytes::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<IncidentSnapshot>>,
    pub event_tx: broadcast::Sender<PreSerializedEvent>,
    pub http_client: reqwest::Client,
    pub source: Arc<IncidentSource>,
    pub observability: Arc<ObservabilityCounters>,
    /// Distinguishes this process's ETags from those of an earlier run, since `seq` restarts at 0.
    pub instance_id: Arc<str>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    refreshes_total: AtomicU64,
    refresh_failures_total: AtomicU64,
    incidents_requests_total: AtomicU64,
    filtered_requests_total: AtomicU64,
    not_modified_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub refreshes_total: u64,
    pub refresh_failures_total: u64,
    pub incidents_requests_total: u64,
    pub filtered_requests_total: u64,
    pub not_modified_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            refreshes_total: self.refreshes_total.load(Ordering::Relaxed),
            refresh_failures_total: self.refresh_failures_total.load(Ordering::Relaxed),
            incidents_requests_total: self.incidents_requests_total.load(Ordering::Relaxed),
            filtered_requests_total: self.filtered_requests_total.load(Ordering::Relaxed),
            not_modified_total: self.not_modified_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_refresh(&self) {
        self.refreshes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incidents_request(&self, filtered: bool) {
        self.incidents_requests_total.fetch_add(1, Ordering::Relaxed);
        if filtered {
            self.filtered_requests_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_not_modified(&self) {
        self.not_modified_total.fetch_add(1, Ordering::Relaxed);
    }
}

fn instance_id(started_at: DateTime<Utc>) -> Arc<str> {
    let nanos = started_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| started_at.timestamp_micros().saturating_mul(1000));
    Arc::from(format!("{nanos:x}"))
}

impl AppState {
    pub fn new(source: IncidentSource) -> Self {
        let (event_tx, _) = broadcast::channel(sse_broadcast_buffer());
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("warmap/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });
        Self {
            snapshot: Arc::new(RwLock::new(IncidentSnapshot::default())),
            event_tx,
            http_client,
            source: Arc::new(source),
            observability: Arc::new(ObservabilityCounters::default()),
            instance_id: instance_id(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instance_id_changes_with_start_time() {
        let first = Utc.with_ymd_and_hms(2025, 6, 13, 10, 0, 0).single().expect("start");
        let restarted = first + chrono::Duration::milliseconds(1);
        assert_ne!(instance_id(first), instance_id(restarted));
        assert_eq!(instance_id(first), instance_id(first));
    }
}
