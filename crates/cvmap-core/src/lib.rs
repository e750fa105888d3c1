//! Controlled-vocabulary mapping checks: ontology term graphs, a registry
//! over them, and rules that test document values against allowed terms.

// Every fallible item returns `CvError`; its variants are the error docs.
#![allow(
    clippy::missing_errors_doc,
    reason = "all fallible items return CvError"
)]

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod manager;
pub mod mapping;
pub mod message;
pub mod path;
pub mod registry;
pub mod rule;
pub mod service;
pub mod term;

pub use config::{CvConfig, ServiceConfig};
pub use error::{CvError, ErrorPayload, Result};
pub use graph::{FULL_DEPTH, FileOntology, OntologyGraph, ServiceOntology, TermGraph};
pub use manager::CvRuleManager;
pub use mapping::{BackendKind, CvMapping, CvSource, OntologyCatalog, OntologyDescriptor};
pub use message::{MessageLevel, ValidationMessage};
pub use path::{JsonPathEvaluator, PathEvaluator};
pub use registry::{BackendFactory, OntologyRegistry, OntologySummary};
pub use rule::{Combinator, CvRule, CvTerm, EvaluationContext, Requirement, RuleStatus};
pub use service::{HttpOntologyService, OntologyService};
pub use term::Term;
