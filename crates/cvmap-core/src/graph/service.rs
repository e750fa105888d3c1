use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::cache::{CacheKey, QueryCache};
use crate::error::{CvError, Result};
use crate::service::OntologyService;
use crate::term::Term;

use super::{FULL_DEPTH, TermGraph, transitive_closure};

const OP_TERM: &str = "term";
const OP_PARENTS: &str = "parents";
const OP_CHILDREN: &str = "children";
const OP_OBSOLETE: &str = "obsolete";
const OP_ROOTS: &str = "roots";

/// Term graph without a local copy: every query goes to an
/// [`OntologyService`], memoised per operation.
#[derive(Debug)]
pub struct ServiceOntology {
    ontology_id: String,
    service: Arc<dyn OntologyService>,
    loaded_at: DateTime<Utc>,
    root_accessions: BTreeSet<String>,
    synonyms_enabled: bool,
    term_cache: QueryCache<Option<Term>>,
    parents_cache: QueryCache<BTreeSet<Term>>,
    children_cache: QueryCache<BTreeSet<Term>>,
    obsolete_cache: QueryCache<bool>,
    roots_cache: QueryCache<BTreeSet<Term>>,
}

impl ServiceOntology {
    /// Connects the graph to `service` and fetches the root set once; roots
    /// act as the stop condition for ancestor traversal.
    pub fn load(
        ontology_id: &str,
        service: Arc<dyn OntologyService>,
        synonyms_enabled: bool,
    ) -> Result<Self> {
        let graph = Self {
            ontology_id: ontology_id.to_string(),
            service,
            loaded_at: Utc::now(),
            root_accessions: BTreeSet::new(),
            synonyms_enabled,
            term_cache: QueryCache::new("service-term"),
            parents_cache: QueryCache::new("service-parents"),
            children_cache: QueryCache::new("service-children"),
            obsolete_cache: QueryCache::new("service-obsolete"),
            roots_cache: QueryCache::new("service-roots"),
        };
        let roots = graph.roots().map_err(|err| {
            CvError::OntologyLoad(format!(
                "root terms of {ontology_id} could not be fetched: {err}"
            ))
        })?;
        let graph = Self {
            root_accessions: roots
                .iter()
                .map(|term| term.accession().to_string())
                .collect(),
            ..graph
        };
        info!(
            ontology = %graph.ontology_id,
            roots = graph.root_accessions.len(),
            "service-backed ontology connected"
        );
        Ok(graph)
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    #[must_use]
    pub fn root_accessions(&self) -> &BTreeSet<String> {
        &self.root_accessions
    }

    fn key(&self, operation: &'static str, accession: &str) -> CacheKey {
        CacheKey::new(operation, &self.ontology_id, accession)
    }

    fn fetch_term(&self, accession: &str) -> Result<Option<Term>> {
        let Some(name) = self.service.term_name(accession, &self.ontology_id)? else {
            return Ok(None);
        };
        let mut term = Term::new(accession, name);
        if self.synonyms_enabled {
            for synonym in self.service.synonyms(accession, &self.ontology_id)? {
                term.add_synonym(synonym);
            }
        }
        Ok(Some(term))
    }

    fn fetch_parents(&self, accession: &str) -> Result<BTreeSet<Term>> {
        Ok(to_terms(self.service.parents(accession, &self.ontology_id)?))
    }

    fn fetch_children(&self, accession: &str, depth: i32) -> Result<BTreeSet<Term>> {
        let mut children = to_terms(self.service.children(accession, &self.ontology_id, depth)?);
        children.retain(|term| term.accession() != accession);
        Ok(children)
    }

    fn fetch_obsolete(&self, accession: &str) -> Result<bool> {
        self.service.is_obsolete(accession, &self.ontology_id)
    }

    fn fetch_roots(&self) -> Result<BTreeSet<Term>> {
        Ok(to_terms(self.service.root_terms(&self.ontology_id)?))
    }

    /// Children of `term` down to `depth` levels; [`FULL_DEPTH`] asks the
    /// service for the whole closure in one call.
    pub fn children(&self, term: &Term, depth: i32) -> Result<BTreeSet<Term>> {
        let key = self
            .key(OP_CHILDREN, term.accession())
            .with_depth(depth);
        self.children_cache
            .get_or_try_insert_with(key, || self.fetch_children(term.accession(), depth))
    }

    fn clear_caches(&self) -> Result<()> {
        self.term_cache.clear()?;
        self.parents_cache.clear()?;
        self.children_cache.clear()?;
        self.obsolete_cache.clear()?;
        self.roots_cache.clear()
    }
}

impl TermGraph for ServiceOntology {
    fn ontology_id(&self) -> &str {
        &self.ontology_id
    }

    fn backend_name(&self) -> &'static str {
        "service"
    }

    fn has_terms(&self) -> Result<bool> {
        Ok(!self.roots()?.is_empty())
    }

    fn term_by_accession(&self, accession: &str) -> Result<Option<Term>> {
        self.term_cache
            .get_or_try_insert_with(self.key(OP_TERM, accession), || {
                self.fetch_term(accession)
            })
    }

    fn is_obsolete(&self, term: &Term) -> Result<bool> {
        if self.term_by_accession(term.accession())?.is_none() {
            return Err(CvError::UnknownTerm(format!(
                "{} is not a term of ontology {}",
                term.accession(),
                self.ontology_id
            )));
        }
        self.obsolete_cache
            .get_or_try_insert_with(self.key(OP_OBSOLETE, term.accession()), || {
                self.fetch_obsolete(term.accession())
            })
    }

    fn direct_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.parents_cache
            .get_or_try_insert_with(self.key(OP_PARENTS, term.accession()), || {
                self.fetch_parents(term.accession())
            })
    }

    fn direct_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.children(term, 1)
    }

    fn all_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        if self.root_accessions.contains(term.accession()) {
            return Ok(BTreeSet::new());
        }
        transitive_closure(
            term,
            |current| self.direct_parents(current),
            |ancestor| !self.root_accessions.contains(ancestor.accession()),
        )
    }

    fn all_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.children(term, FULL_DEPTH)
    }

    fn roots(&self) -> Result<BTreeSet<Term>> {
        self.roots_cache
            .get_or_try_insert_with(self.key(OP_ROOTS, ""), || self.fetch_roots())
    }

    fn is_up_to_date(&self) -> Result<bool> {
        let raw = self.service.last_publish_date(&self.ontology_id)?;
        let published = parse_publish_date(&raw)?;
        let fresh = self.loaded_at > published;
        debug!(ontology = %self.ontology_id, %published, fresh, "freshness check");
        Ok(fresh)
    }

    fn synonyms_enabled(&self) -> bool {
        self.synonyms_enabled
    }

    fn set_synonyms_enabled(&mut self, enabled: bool) -> Result<()> {
        let was_enabled = self.synonyms_enabled;
        self.synonyms_enabled = enabled;
        if enabled && !was_enabled {
            // Cached terms were fetched without synonyms.
            self.clear_caches()?;
        }
        Ok(())
    }
}

fn to_terms(refs: BTreeMap<String, String>) -> BTreeSet<Term> {
    refs.into_iter()
        .map(|(accession, name)| Term::new(accession, name))
        .collect()
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` and bare dates (read
/// as midnight UTC).
pub fn parse_publish_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        && let Some(midnight) = parsed.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    Err(CvError::Validation(format!(
        "unrecognised publish date '{raw}'"
    )))
}
