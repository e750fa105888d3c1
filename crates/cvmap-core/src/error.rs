use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CvError>;

#[derive(Debug, Error)]
pub enum CvError {
    #[error("ontology load failed: {0}")]
    OntologyLoad(String),

    #[error("unknown ontology: {0}")]
    UnknownOntology(String),

    #[error("unknown term: {0}")]
    UnknownTerm(String),

    #[error("term lookup failed: {0}")]
    Lookup(String),

    #[error("cache state error: {0}")]
    CacheState(String),

    #[error("path could not be compiled: {0}")]
    PathCompile(String),

    #[error("re-entrant evaluation of rule {0}")]
    ReentrantEvaluation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_norway::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CvError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OntologyLoad(_) => "ONTOLOGY_LOAD",
            Self::UnknownOntology(_) => "UNKNOWN_ONTOLOGY",
            Self::UnknownTerm(_) => "UNKNOWN_TERM",
            Self::Lookup(_) => "LOOKUP_FAILED",
            Self::CacheState(_) => "CACHE_STATE",
            Self::PathCompile(_) => "PATH_COMPILE",
            Self::ReentrantEvaluation(_) => "REENTRANT_EVALUATION",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
            Self::Toml(_) => "TOML_ERROR",
            Self::Http(_) => "HTTP_ERROR",
        }
    }

    /// Errors that mean "the answer could not be obtained", as opposed to
    /// "the answer is no". Callers must never fold these into a negative result.
    #[must_use]
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::Lookup(_) | Self::CacheState(_) | Self::Http(_))
    }

    pub(crate) fn mutex_poisoned(what: &str) -> Self {
        Self::CacheState(format!("{what} mutex poisoned"))
    }

    pub fn to_payload(&self, operation: impl Into<String>) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            details: None,
        }
    }
}
