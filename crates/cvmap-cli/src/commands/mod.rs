use anyhow::{Context, Result};
use cvmap_core::mapping::read_document;
use cvmap_core::message::max_level;
use cvmap_core::{MessageLevel, ValidationMessage};
use serde_json::Value;
use tracing::info;

use crate::cli::{CatalogArgs, Commands, MappingArgs, ValidateArgs};

mod support;

#[cfg(test)]
mod tests;

use self::support::{display_path, load_manager, load_registry, print_json};

pub(crate) fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Ontologies(args) => run_ontologies(&args),
        Commands::SelfCheck(args) => run_self_check(&args),
        Commands::Validate(args) => run_validate(&args),
    }
}

fn run_ontologies(args: &CatalogArgs) -> Result<()> {
    let (registry, messages) = load_registry(args)?;
    let ontologies = registry
        .summaries()
        .context("failed to summarise loaded ontologies")?;
    print_json(&serde_json::json!({
        "status": "ok",
        "config": display_path(&args.config),
        "ontologies": ontologies,
        "messages": messages,
    }))
}

fn run_self_check(args: &MappingArgs) -> Result<()> {
    let (manager, messages) = load_manager(args)?;
    print_json(&serde_json::json!({
        "status": "ok",
        "mapping": display_path(&args.mapping),
        "rules": manager.rules().len(),
        "messages": messages,
    }))
}

fn run_validate(args: &ValidateArgs) -> Result<()> {
    let (manager, setup_messages) = load_manager(&args.mapping)?;

    let mut documents = Vec::with_capacity(args.documents.len());
    let mut all_messages = setup_messages.clone();
    for path in &args.documents {
        let document: Value = read_document(path)
            .with_context(|| format!("failed to read document {}", path.display()))?;
        manager.reset_status()?;
        let mut messages = match args.prefix.as_deref() {
            Some(prefix) => manager.check_with_prefix(&document, prefix),
            None => manager.check(&document),
        }
        .with_context(|| format!("validation of {} failed", path.display()))?;
        if args.report_rules {
            messages.extend(manager.rule_status_report()?);
        }
        info!(document = %path.display(), messages = messages.len(), "document validated");
        all_messages.extend(messages.iter().cloned());
        documents.push(DocumentReport {
            document: display_path(path),
            messages,
        });
    }

    let errors = count_level(&all_messages, MessageLevel::Error);
    print_json(&serde_json::json!({
        "status": "ok",
        "mapping": display_path(&args.mapping.mapping),
        "setup_messages": setup_messages,
        "documents": documents,
        "errors": errors,
        "max_level": max_level(&all_messages),
    }))?;
    if args.enforce && errors > 0 {
        anyhow::bail!("validation failed: {errors} error message(s)");
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct DocumentReport {
    document: String,
    messages: Vec<ValidationMessage>,
}

fn count_level(messages: &[ValidationMessage], level: MessageLevel) -> usize {
    messages
        .iter()
        .filter(|message| message.level == level)
        .count()
}
