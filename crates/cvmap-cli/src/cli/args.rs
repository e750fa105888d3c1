use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Ontology source list (JSON, YAML or TOML).
    #[arg(long)]
    pub config: PathBuf,

    /// Do not record synonyms while loading.
    #[arg(long, default_value_t = false)]
    pub no_synonyms: bool,

    /// Term service base url for service-backed ontologies.
    #[arg(long)]
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct MappingArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// CV-mapping document (JSON, YAML or TOML).
    #[arg(long)]
    pub mapping: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub mapping: MappingArgs,

    /// Documents to validate.
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,

    /// Path of the documents' root element inside the mapped schema.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Exit non-zero when any ERROR message was produced.
    #[arg(long, default_value_t = false)]
    pub enforce: bool,

    /// Append INFO messages for rules that never produced a value.
    #[arg(long, default_value_t = false)]
    pub report_rules: bool,
}
