use clap::{Parser, Subcommand};

mod args;

#[cfg(test)]
mod tests;

pub use args::{CatalogArgs, MappingArgs, ValidateArgs};

#[derive(Debug, Parser)]
#[command(name = "cvmap")]
#[command(about = "Validate documents against controlled-vocabulary mappings", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load the ontology source list and report every ontology.
    Ontologies(CatalogArgs),
    /// Prune a mapping against the loaded ontologies.
    SelfCheck(MappingArgs),
    /// Self-check a mapping, then validate documents with it.
    Validate(ValidateArgs),
}
