use std::path::PathBuf;
use std::time::Duration;

use warmap_shared::refresh::DEFAULT_REFRESH_LEAD;

pub const DEFAULT_INCIDENT_SOURCE: &str = "data/warData.json";
pub const DEFAULT_STATIC_DIR: &str = "client/dist";
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_BROADCAST_BUFFER: usize = 64;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Where incident data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentSource {
    Remote(String),
    File(PathBuf),
}

impl IncidentSource {
    /// `http://` and `https://` values are fetched; anything else is a file path.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let lowered = raw.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Some(Self::Remote(raw.to_owned()))
        } else {
            Some(Self::File(PathBuf::from(raw)))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Remote(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

pub fn incident_source() -> IncidentSource {
    std::env::var("INCIDENT_SOURCE")
        .ok()
        .and_then(|value| IncidentSource::parse(&value))
        .unwrap_or_else(|| IncidentSource::File(PathBuf::from(DEFAULT_INCIDENT_SOURCE)))
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR))
}

/// Zero is allowed here: refresh exactly on the hour.
pub fn refresh_lead() -> Duration {
    std::env::var("REFRESH_LEAD_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value < 3600)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REFRESH_LEAD)
}

pub fn sse_broadcast_buffer() -> usize {
    std::env::var("SSE_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_source_distinguishes_urls_and_paths() {
        assert_eq!(
            IncidentSource::parse(" HTTPS://example.org/data.json "),
            Some(IncidentSource::Remote("HTTPS://example.org/data.json".into()))
        );
        assert_eq!(
            IncidentSource::parse("./data/warData.json"),
            Some(IncidentSource::File(PathBuf::from("./data/warData.json")))
        );
        assert_eq!(IncidentSource::parse("   "), None);
    }

    #[test]
    fn env_overrides_are_applied() {
        temp_env::with_vars(
            [
                ("INCIDENT_SOURCE", Some("fixtures/incidents.json")),
                ("SERVER_PORT", Some("8080")),
                ("STATIC_DIR", Some("public")),
                ("REFRESH_LEAD_SECS", Some("0")),
                ("SSE_BROADCAST_BUFFER", Some("8")),
                ("UPSTREAM_HTTP_TIMEOUT_SECS", Some("3")),
                ("UPSTREAM_CONNECT_TIMEOUT_SECS", Some("1")),
            ],
            || {
                assert_eq!(
                    incident_source(),
                    IncidentSource::File(PathBuf::from("fixtures/incidents.json"))
                );
                assert_eq!(server_port(), 8080);
                assert_eq!(static_dir(), PathBuf::from("public"));
                assert_eq!(refresh_lead(), Duration::ZERO);
                assert_eq!(sse_broadcast_buffer(), 8);
                assert_eq!(upstream_http_timeout(), Duration::from_secs(3));
                assert_eq!(upstream_connect_timeout(), Duration::from_secs(1));
            },
        );
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        temp_env::with_vars(
            [
                ("INCIDENT_SOURCE", Some("")),
                ("SERVER_PORT", Some("0")),
                ("STATIC_DIR", Some(" ")),
                ("REFRESH_LEAD_SECS", Some("7200")),
                ("SSE_BROADCAST_BUFFER", Some("zero")),
                ("UPSTREAM_HTTP_TIMEOUT_SECS", Some("0")),
                ("UPSTREAM_CONNECT_TIMEOUT_SECS", None),
            ],
            || {
                assert_eq!(
                    incident_source(),
                    IncidentSource::File(PathBuf::from(DEFAULT_INCIDENT_SOURCE))
                );
                assert_eq!(server_port(), DEFAULT_SERVER_PORT);
                assert_eq!(static_dir(), PathBuf::from(DEFAULT_STATIC_DIR));
                assert_eq!(refresh_lead(), DEFAULT_REFRESH_LEAD);
                assert_eq!(sse_broadcast_buffer(), DEFAULT_BROADCAST_BUFFER);
                assert_eq!(
                    upstream_http_timeout(),
                    Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS)
                );
                assert_eq!(
                    upstream_connect_timeout(),
                    Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS)
                );
            },
        );
    }
}
