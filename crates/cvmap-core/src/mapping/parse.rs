use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{CvError, Result};

use super::model::{BackendKind, CvMapping, OntologyCatalog};
use super::validate::{validate_catalog, validate_mapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(CvError::Validation(format!(
                "unsupported document extension: {}",
                path.display()
            ))),
        }
    }
}

pub fn parse_document<T: DeserializeOwned>(raw: &str, format: DocumentFormat) -> Result<T> {
    Ok(match format {
        DocumentFormat::Json => serde_json::from_str(raw)?,
        DocumentFormat::Yaml => serde_norway::from_str(raw)?,
        DocumentFormat::Toml => toml::from_str(raw)?,
    })
}

/// Reads a JSON, YAML or TOML document, choosing the format by extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = DocumentFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)?;
    parse_document(&raw, format)
}

pub fn parse_mapping(raw: &str, format: DocumentFormat) -> Result<CvMapping> {
    let mapping = parse_document::<CvMapping>(raw, format)?;
    validate_mapping(&mapping)?;
    Ok(mapping)
}

pub fn load_mapping(path: &Path) -> Result<CvMapping> {
    let raw = std::fs::read_to_string(path)?;
    parse_mapping(&raw, DocumentFormat::from_path(path)?)
}

pub fn parse_catalog(raw: &str, format: DocumentFormat) -> Result<OntologyCatalog> {
    let catalog = parse_document::<OntologyCatalog>(raw, format)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Loads an ontology source list. Relative file locators are resolved
/// against the directory holding the list.
pub fn load_catalog(path: &Path) -> Result<OntologyCatalog> {
    let raw = std::fs::read_to_string(path)?;
    let mut catalog = parse_catalog(&raw, DocumentFormat::from_path(path)?)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for descriptor in &mut catalog.ontologies {
        if descriptor.backend != BackendKind::File {
            continue;
        }
        let locator = descriptor.locator.trim();
        let is_remote = locator.starts_with("http://") || locator.starts_with("https://");
        let file_path = Path::new(locator.strip_prefix("file://").unwrap_or(locator));
        if !is_remote && file_path.is_relative() {
            descriptor.locator = base.join(file_path).display().to_string();
        }
    }
    Ok(catalog)
}
