//! Runtime configuration threaded explicitly through registry and backend
//! constructors. Nothing here is process-global; `from_env` is a convenience
//! for binaries.

mod env;

use self::env::{parse_enabled_default_true, read_env_u64, read_non_empty_env};

pub const ENV_SERVICE_URL: &str = "CVMAP_SERVICE_URL";
pub const ENV_SERVICE_TIMEOUT_MS: &str = "CVMAP_SERVICE_TIMEOUT_MS";
pub const ENV_SYNONYMS: &str = "CVMAP_SYNONYMS";
pub const ENV_FETCH_TIMEOUT_MS: &str = "CVMAP_FETCH_TIMEOUT_MS";

const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;
const MIN_TIMEOUT_MS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_SERVICE_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    fn from_env() -> Self {
        Self {
            base_url: read_non_empty_env(ENV_SERVICE_URL).map(|url| normalize_base_url(&url)),
            timeout_ms: read_env_u64(
                ENV_SERVICE_TIMEOUT_MS,
                DEFAULT_SERVICE_TIMEOUT_MS,
                MIN_TIMEOUT_MS,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvConfig {
    pub service: ServiceConfig,
    pub synonyms_enabled: bool,
    pub fetch_timeout_ms: u64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            synonyms_enabled: true,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl CvConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            service: ServiceConfig::from_env(),
            synonyms_enabled: parse_enabled_default_true(
                std::env::var(ENV_SYNONYMS).ok().as_deref(),
            ),
            fetch_timeout_ms: read_env_u64(
                ENV_FETCH_TIMEOUT_MS,
                DEFAULT_FETCH_TIMEOUT_MS,
                MIN_TIMEOUT_MS,
            ),
        }
    }

    #[must_use]
    pub fn with_synonyms(mut self, enabled: bool) -> Self {
        self.synonyms_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_service_url(mut self, base_url: &str) -> Self {
        self.service.base_url = Some(normalize_base_url(base_url));
        self
    }
}

#[must_use]
pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_synonyms_and_leave_service_unset() {
        let config = CvConfig::default();
        assert!(config.synonyms_enabled);
        assert_eq!(config.service.base_url, None);
        assert_eq!(config.service.timeout_ms, DEFAULT_SERVICE_TIMEOUT_MS);
        assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
    }

    #[test]
    fn service_url_is_normalized_without_trailing_slash() {
        let config = CvConfig::default().with_service_url(" http://terms.example/api/ ");
        assert_eq!(
            config.service.base_url.as_deref(),
            Some("http://terms.example/api")
        );
    }
}
