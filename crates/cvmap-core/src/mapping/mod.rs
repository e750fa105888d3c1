//! Serde models for ontology source lists and CV-mapping documents, plus
//! their JSON/YAML/TOML readers.

mod model;
mod parse;
mod validate;

pub use model::{BackendKind, CvMapping, CvSource, OntologyCatalog, OntologyDescriptor};
pub use parse::{
    DocumentFormat, load_catalog, load_mapping, parse_catalog, parse_document, parse_mapping,
    read_document,
};
pub use validate::{validate_catalog, validate_mapping};
