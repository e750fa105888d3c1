use std::collections::HashSet;

use crate::error::{CvError, Result};

use super::model::{CvMapping, OntologyCatalog};

/// Shape checks that make a mapping unusable as a whole. Term-level problems
/// are left to the rule manager's self-check, which prunes instead of failing.
pub fn validate_mapping(mapping: &CvMapping) -> Result<()> {
    let mut source_ids = HashSet::new();
    for source in &mapping.sources {
        if source.id.trim().is_empty() {
            return Err(CvError::Validation(
                "mapping source id must not be empty".to_string(),
            ));
        }
        if !source_ids.insert(source.id.as_str()) {
            return Err(CvError::Validation(format!(
                "mapping source declared twice: {}",
                source.id
            )));
        }
    }

    let mut rule_ids = HashSet::new();
    for rule in &mapping.rules {
        if rule.id.trim().is_empty() {
            return Err(CvError::Validation("rule id must not be empty".to_string()));
        }
        if !rule_ids.insert(rule.id.as_str()) {
            return Err(CvError::Validation(format!("duplicate rule id: {}", rule.id)));
        }
    }
    Ok(())
}

pub fn validate_catalog(catalog: &OntologyCatalog) -> Result<()> {
    let mut ids = HashSet::new();
    for descriptor in &catalog.ontologies {
        if descriptor.id.trim().is_empty() {
            return Err(CvError::Validation(
                "ontology id must not be empty".to_string(),
            ));
        }
        if !ids.insert(descriptor.id.as_str()) {
            return Err(CvError::Validation(format!(
                "ontology declared twice: {}",
                descriptor.id
            )));
        }
    }
    Ok(())
}
