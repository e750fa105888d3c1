//! Ontology registry: identifier-keyed access to loaded term graphs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::CvConfig;
use crate::error::{CvError, Result};
use crate::graph::{FileOntology, OntologyGraph, ServiceOntology, SourceLocator, TermGraph};
use crate::mapping::{BackendKind, OntologyDescriptor};
use crate::message::ValidationMessage;
use crate::service::{HttpOntologyService, OntologyService};
use crate::term::Term;

/// Builds a graph for a descriptor whose backend is not built in.
pub type BackendFactory =
    Arc<dyn Fn(&OntologyDescriptor, &CvConfig) -> Result<Box<dyn TermGraph>> + Send + Sync>;

#[derive(Debug)]
struct RegistryEntry {
    descriptor: Option<OntologyDescriptor>,
    graph: OntologyGraph,
}

/// Per-ontology overview, as printed by `cvmap ontologies`.
#[derive(Debug, Clone, Serialize)]
pub struct OntologySummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_count: Option<usize>,
    pub root_count: usize,
    pub up_to_date: bool,
}

#[derive(Default)]
pub struct OntologyRegistry {
    config: CvConfig,
    entries: BTreeMap<String, RegistryEntry>,
    service: Option<Arc<dyn OntologyService>>,
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for OntologyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyRegistry")
            .field("ontologies", &self.entries.keys().collect::<Vec<_>>())
            .field("service", &self.service)
            .field("backends", &self.factories.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl OntologyRegistry {
    #[must_use]
    pub fn new(config: CvConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Routes every service-backed ontology through `service` instead of an
    /// HTTP client built from the configuration.
    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn OntologyService>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn config(&self) -> &CvConfig {
        &self.config
    }

    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        self.factories.insert(name.trim().to_string(), factory);
    }

    /// Loads every descriptor. A descriptor that fails is dropped with a
    /// diagnostic; the others still load.
    pub fn load(&mut self, descriptors: &[OntologyDescriptor]) -> Vec<ValidationMessage> {
        let mut messages = Vec::new();
        for descriptor in descriptors {
            if let Err(err) = self.load_descriptor(descriptor) {
                warn!(ontology = %descriptor.id, error = %err, "ontology dropped");
                messages.push(
                    ValidationMessage::error(format!(
                        "ontology {} ({}) could not be loaded: {err}",
                        descriptor.id,
                        descriptor.display_name()
                    ))
                    .with_context(descriptor.locator.clone()),
                );
            }
        }
        messages
    }

    pub fn load_descriptor(&mut self, descriptor: &OntologyDescriptor) -> Result<()> {
        let graph = self.build_graph(descriptor)?;
        info!(
            ontology = %descriptor.id,
            backend = graph.backend_name(),
            version = descriptor.version.as_deref().unwrap_or("-"),
            "ontology registered"
        );
        self.entries.insert(
            descriptor.id.clone(),
            RegistryEntry {
                descriptor: Some(descriptor.clone()),
                graph,
            },
        );
        Ok(())
    }

    fn build_graph(&self, descriptor: &OntologyDescriptor) -> Result<OntologyGraph> {
        if let Some(format) = descriptor.format.as_deref()
            && descriptor.backend == BackendKind::File
            && !format.eq_ignore_ascii_case("obo")
        {
            return Err(CvError::OntologyLoad(format!(
                "unsupported term file format '{format}'"
            )));
        }
        match &descriptor.backend {
            BackendKind::File => {
                if descriptor.locator.trim().is_empty() {
                    return Err(CvError::OntologyLoad(
                        "file-backed ontology needs a locator".to_string(),
                    ));
                }
                let graph = FileOntology::load(
                    &descriptor.id,
                    SourceLocator::parse(&descriptor.locator),
                    self.config.fetch_timeout_ms,
                    self.config.synonyms_enabled,
                )?;
                Ok(OntologyGraph::File(graph))
            }
            BackendKind::Service => {
                let service = self.service_for(descriptor)?;
                let graph =
                    ServiceOntology::load(&descriptor.id, service, self.config.synonyms_enabled)?;
                Ok(OntologyGraph::Service(graph))
            }
            BackendKind::Custom(name) => {
                let factory = self.factories.get(name).ok_or_else(|| {
                    CvError::OntologyLoad(format!("no backend registered under '{name}'"))
                })?;
                Ok(OntologyGraph::Custom(factory(descriptor, &self.config)?))
            }
        }
    }

    fn service_for(&self, descriptor: &OntologyDescriptor) -> Result<Arc<dyn OntologyService>> {
        if let Some(service) = &self.service {
            return Ok(Arc::clone(service));
        }
        let locator = descriptor.locator.trim();
        let client = if locator.starts_with("http://") || locator.starts_with("https://") {
            HttpOntologyService::with_base_url(locator, self.config.service.timeout_ms)?
        } else if self.config.service.base_url.is_some() {
            HttpOntologyService::new(&self.config.service)?
        } else {
            return Err(CvError::OntologyLoad(format!(
                "no term service configured for ontology {}",
                descriptor.id
            )));
        };
        Ok(Arc::new(client))
    }

    /// Adds an already built graph under its own ontology id, replacing any
    /// previous graph with that id.
    pub fn insert(&mut self, graph: OntologyGraph) -> Option<OntologyGraph> {
        let id = graph.ontology_id().to_string();
        self.entries
            .insert(
                id,
                RegistryEntry {
                    descriptor: None,
                    graph,
                },
            )
            .map(|entry| entry.graph)
    }

    #[must_use]
    pub fn contains(&self, ontology_id: &str) -> bool {
        self.entries.contains_key(ontology_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn access(&self, ontology_id: &str) -> Result<&OntologyGraph> {
        self.entries
            .get(ontology_id)
            .map(|entry| &entry.graph)
            .ok_or_else(|| CvError::UnknownOntology(ontology_id.to_string()))
    }

    pub fn valid_terms(
        &self,
        ontology_id: &str,
        accession: &str,
        allow_children: bool,
        use_term: bool,
    ) -> Result<BTreeSet<Term>> {
        self.access(ontology_id)?
            .valid_terms(accession, allow_children, use_term)
    }

    pub fn valid_accessions(
        &self,
        ontology_id: &str,
        accession: &str,
        allow_children: bool,
        use_term: bool,
    ) -> Result<BTreeSet<String>> {
        Ok(self
            .valid_terms(ontology_id, accession, allow_children, use_term)?
            .into_iter()
            .map(|term| term.accession().to_string())
            .collect())
    }

    pub fn is_obsolete(&self, ontology_id: &str, accession: &str) -> Result<bool> {
        let graph = self.access(ontology_id)?;
        let term = graph.term_by_accession(accession)?.ok_or_else(|| {
            CvError::UnknownTerm(format!("{accession} is not a term of ontology {ontology_id}"))
        })?;
        graph.is_obsolete(&term)
    }

    /// `true` only if every loaded graph still matches its source.
    pub fn all_up_to_date(&self) -> Result<bool> {
        for entry in self.entries.values() {
            if !entry.graph.is_up_to_date()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn set_synonyms_enabled(&mut self, enabled: bool) -> Result<()> {
        self.config.synonyms_enabled = enabled;
        for entry in self.entries.values_mut() {
            entry.graph.set_synonyms_enabled(enabled)?;
        }
        Ok(())
    }

    pub fn summaries(&self) -> Result<Vec<OntologySummary>> {
        self.entries
            .iter()
            .map(|(id, entry)| {
                let descriptor = entry.descriptor.as_ref();
                let term_count = match &entry.graph {
                    OntologyGraph::File(graph) => Some(graph.term_count()),
                    OntologyGraph::Service(_) | OntologyGraph::Custom(_) => None,
                };
                Ok(OntologySummary {
                    id: id.clone(),
                    name: descriptor
                        .map_or(id.as_str(), OntologyDescriptor::display_name)
                        .to_string(),
                    version: descriptor.and_then(|descriptor| descriptor.version.clone()),
                    backend: entry.graph.backend_name().to_string(),
                    term_count,
                    root_count: entry.graph.roots()?.len(),
                    up_to_date: entry.graph.is_up_to_date()?,
                })
            })
            .collect()
    }
}
