use serde::{Deserialize, Serialize};

/// Server-sent notifications on the refresh channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IncidentEvent {
    /// A new dataset replaced the previous one.
    Snapshot {
        #[serde(default)]
        seq: u64,
        timestamp: String,
        count: usize,
    },
}

impl IncidentEvent {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Snapshot { seq, .. } => *seq,
        }
    }

    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_tagged_by_type() {
        let event = IncidentEvent::Snapshot {
            seq: 3,
            timestamp: "2025-06-01T00:00:00Z".into(),
            count: 12,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "Snapshot");
        assert_eq!(json["count"], 12);

        let parsed: IncidentEvent =
            serde_json::from_str(r#"{"type":"Snapshot","timestamp":"t","count":0}"#).expect("parse");
        assert_eq!(parsed.seq(), 0);
        assert_eq!(parsed.event_name(), "snapshot");
    }
}
