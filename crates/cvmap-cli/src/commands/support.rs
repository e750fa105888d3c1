use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cvmap_core::mapping::{load_catalog, load_mapping};
use cvmap_core::{CvConfig, CvRuleManager, OntologyRegistry, ValidationMessage};

use crate::cli::{CatalogArgs, MappingArgs};

pub(super) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub(super) fn resolve_config(args: &CatalogArgs) -> CvConfig {
    let mut config = CvConfig::from_env();
    if args.no_synonyms {
        config = config.with_synonyms(false);
    }
    if let Some(url) = args.service_url.as_deref() {
        config = config.with_service_url(url);
    }
    config
}

/// Loads the ontology source list. Ontologies that fail to load are reported
/// in the returned messages rather than aborting.
pub(super) fn load_registry(
    args: &CatalogArgs,
) -> Result<(OntologyRegistry, Vec<ValidationMessage>)> {
    let catalog = load_catalog(&args.config)
        .with_context(|| format!("failed to read ontology list {}", args.config.display()))?;
    let mut registry = OntologyRegistry::new(resolve_config(args));
    let messages = registry.load(&catalog.ontologies);
    Ok((registry, messages))
}

pub(super) fn load_manager(
    args: &MappingArgs,
) -> Result<(CvRuleManager, Vec<ValidationMessage>)> {
    let (registry, mut messages) = load_registry(&args.catalog)?;
    let mapping = load_mapping(&args.mapping)
        .with_context(|| format!("failed to read mapping {}", args.mapping.display()))?;
    let mut manager = CvRuleManager::for_json(mapping, Arc::new(registry));
    messages.extend(
        manager
            .check_cv_mapping()
            .context("mapping self-check failed")?,
    );
    Ok((manager, messages))
}

pub(super) fn display_path(path: &Path) -> String {
    path.display().to_string()
}
