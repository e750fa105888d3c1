use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::error::{CvError, Result};

/// Where a file-backed term source lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
    /// Content handed over in memory; it has no external copy that can drift.
    Inline,
}

impl SourceLocator {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Self::Url(raw.to_string());
        }
        let path = raw.strip_prefix("file://").unwrap_or(raw);
        Self::Path(PathBuf::from(path))
    }

    pub fn fetch(&self, timeout_ms: u64) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => std::fs::read(path).map_err(|err| {
                CvError::OntologyLoad(format!(
                    "term source is not readable: {} ({err})",
                    path.display()
                ))
            }),
            Self::Url(url) => {
                let http = Client::builder()
                    .timeout(Duration::from_millis(timeout_ms))
                    .build()?;
                let response = http.get(url).send()?;
                if !response.status().is_success() {
                    return Err(CvError::OntologyLoad(format!(
                        "term source fetch failed for {url} with status {}",
                        response.status()
                    )));
                }
                Ok(response.bytes()?.to_vec())
            }
            Self::Inline => Err(CvError::OntologyLoad(
                "inline term source cannot be re-fetched".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
            Self::Inline => f.write_str("<inline>"),
        }
    }
}

/// Content identity of a term source at the moment it was read.
///
/// Either signal may be missing; comparison then falls back to whichever
/// signal was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FreshnessSignature {
    pub content_hash: Option<String>,
    pub content_length: Option<u64>,
}

impl FreshnessSignature {
    #[must_use]
    pub fn capture(bytes: &[u8]) -> Self {
        Self {
            content_hash: Some(blake3::hash(bytes).to_hex().to_string()),
            content_length: u64::try_from(bytes.len()).ok(),
        }
    }

    /// Compares a signature captured at load time (`self`) with a freshly
    /// recomputed one.
    #[must_use]
    pub fn matches(&self, current: &Self) -> bool {
        match (&self.content_hash, self.content_length) {
            (Some(hash), Some(length)) => {
                current.content_hash.as_deref() == Some(hash.as_str())
                    && current.content_length == Some(length)
            }
            (Some(hash), None) => current.content_hash.as_deref() == Some(hash.as_str()),
            (None, Some(length)) => current.content_length == Some(length),
            (None, None) => false,
        }
    }
}
