use serde::{Deserialize, Serialize};

use crate::rule::CvRule;

/// Backend that answers graph queries for one ontology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendKind {
    #[default]
    File,
    Service,
    /// Name of a backend registered on the registry at runtime.
    Custom(String),
}

impl BackendKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Service => "service",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for BackendKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "obo" | "local" => Self::File,
            "service" | "ols" | "remote" => Self::Service,
            _ => Self::Custom(raw.trim().to_string()),
        }
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an ontology source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OntologyDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub locator: String,
    #[serde(default)]
    pub backend: BackendKind,
}

impl OntologyDescriptor {
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// The ontology source list, ordered as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OntologyCatalog {
    #[serde(default, alias = "ontology")]
    pub ontologies: Vec<OntologyDescriptor>,
}

/// An ontology a mapping document declares it draws terms from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CvSource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A parsed CV-mapping document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CvMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "source")]
    pub sources: Vec<CvSource>,
    #[serde(default, alias = "rule")]
    pub rules: Vec<CvRule>,
}
