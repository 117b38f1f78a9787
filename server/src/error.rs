use std::path::PathBuf;

use thiserror::Error;

/// Why one fetch of the incident source failed. Every variant skips the cycle.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid incident payload: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(SourceError::Status(503).to_string(), "upstream returned HTTP 503");

        let io = SourceError::Io {
            path: PathBuf::from("data/warData.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(io.to_string(), "failed to read data/warData.json: missing");

        let parse: SourceError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(SourceError::from)
            .expect_err("truncated json");
        assert!(parse.to_string().starts_with("invalid incident payload:"));
    }
}
