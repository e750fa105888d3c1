//! Term graphs: the queryable is-a/part-of hierarchy of one ontology.
//!
//! Two built-in backends implement [`TermGraph`]: [`FileOntology`] parses a
//! whole term file into memory, [`ServiceOntology`] answers every query
//! through a remote term service behind a per-operation cache. The registry
//! stores them as the closed [`OntologyGraph`] union.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::error::Result;
use crate::term::Term;

mod file;
mod obo;
mod service;
mod source;

pub use file::FileOntology;
pub use obo::{OboDocument, OboTerm, parse_obo};
pub use service::{ServiceOntology, parse_publish_date};
pub use source::{FreshnessSignature, SourceLocator};

/// Depth value asking the service for the full descendant closure in one call.
pub const FULL_DEPTH: i32 = -1;

/// The access contract shared by every term-graph backend.
///
/// All queries return owned sets (never `None` for "no relatives"). Remote
/// failures surface as [`crate::CvError::Lookup`] and must not be read as
/// "term not found".
pub trait TermGraph: Send + Sync + std::fmt::Debug {
    fn ontology_id(&self) -> &str;

    fn backend_name(&self) -> &'static str;

    fn has_terms(&self) -> Result<bool>;

    fn term_by_accession(&self, accession: &str) -> Result<Option<Term>>;

    /// Fails with [`crate::CvError::UnknownTerm`] when the term is not part of
    /// this graph.
    fn is_obsolete(&self, term: &Term) -> Result<bool>;

    fn direct_parents(&self, term: &Term) -> Result<BTreeSet<Term>>;

    fn direct_children(&self, term: &Term) -> Result<BTreeSet<Term>>;

    fn all_parents(&self, term: &Term) -> Result<BTreeSet<Term>>;

    fn all_children(&self, term: &Term) -> Result<BTreeSet<Term>>;

    fn roots(&self) -> Result<BTreeSet<Term>>;

    fn is_up_to_date(&self) -> Result<bool>;

    fn synonyms_enabled(&self) -> bool;

    fn set_synonyms_enabled(&mut self, enabled: bool) -> Result<()>;

    /// The term itself (if `use_term`) plus all its descendants (if
    /// `allow_children`). Unknown accessions yield an empty set.
    fn valid_terms(
        &self,
        accession: &str,
        allow_children: bool,
        use_term: bool,
    ) -> Result<BTreeSet<Term>> {
        let Some(term) = self.term_by_accession(accession)? else {
            return Ok(BTreeSet::new());
        };
        let mut valid = BTreeSet::new();
        if allow_children {
            valid.extend(self.all_children(&term)?);
        }
        if use_term {
            valid.insert(term);
        }
        Ok(valid)
    }
}

/// Backends the registry can hold. `Custom` carries graphs produced by
/// registered backend factories.
#[derive(Debug)]
pub enum OntologyGraph {
    File(FileOntology),
    Service(ServiceOntology),
    Custom(Box<dyn TermGraph>),
}

impl OntologyGraph {
    fn inner(&self) -> &dyn TermGraph {
        match self {
            Self::File(graph) => graph as &dyn TermGraph,
            Self::Service(graph) => graph as &dyn TermGraph,
            Self::Custom(graph) => graph.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TermGraph {
        match self {
            Self::File(graph) => graph as &mut dyn TermGraph,
            Self::Service(graph) => graph as &mut dyn TermGraph,
            Self::Custom(graph) => graph.as_mut(),
        }
    }
}

impl TermGraph for OntologyGraph {
    fn ontology_id(&self) -> &str {
        self.inner().ontology_id()
    }

    fn backend_name(&self) -> &'static str {
        self.inner().backend_name()
    }

    fn has_terms(&self) -> Result<bool> {
        self.inner().has_terms()
    }

    fn term_by_accession(&self, accession: &str) -> Result<Option<Term>> {
        self.inner().term_by_accession(accession)
    }

    fn is_obsolete(&self, term: &Term) -> Result<bool> {
        self.inner().is_obsolete(term)
    }

    fn direct_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.inner().direct_parents(term)
    }

    fn direct_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.inner().direct_children(term)
    }

    fn all_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.inner().all_parents(term)
    }

    fn all_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        self.inner().all_children(term)
    }

    fn roots(&self) -> Result<BTreeSet<Term>> {
        self.inner().roots()
    }

    fn is_up_to_date(&self) -> Result<bool> {
        self.inner().is_up_to_date()
    }

    fn synonyms_enabled(&self) -> bool {
        self.inner().synonyms_enabled()
    }

    fn set_synonyms_enabled(&mut self, enabled: bool) -> Result<()> {
        self.inner_mut().set_synonyms_enabled(enabled)
    }

    fn valid_terms(
        &self,
        accession: &str,
        allow_children: bool,
        use_term: bool,
    ) -> Result<BTreeSet<Term>> {
        self.inner()
            .valid_terms(accession, allow_children, use_term)
    }
}

/// Lazily computed root set. Any structural mutation resets it to `Stale`.
#[derive(Debug, Clone, Default)]
pub(crate) enum RootsState {
    #[default]
    Stale,
    Fresh(BTreeSet<Term>),
}

/// Breadth-first transitive closure from `start` over `step`.
///
/// Uses an explicit work-list and a visited-accession set, so converging
/// paths and cycles terminate and stack depth does not grow with hierarchy
/// depth. Nodes for which `expand` returns `false` are included but not
/// walked further. `start` itself is never part of the result.
pub(crate) fn transitive_closure<S, E>(
    start: &Term,
    mut step: S,
    expand: E,
) -> Result<BTreeSet<Term>>
where
    S: FnMut(&Term) -> Result<BTreeSet<Term>>,
    E: Fn(&Term) -> bool,
{
    let mut visited = HashSet::<String>::new();
    visited.insert(start.accession().to_string());
    let mut closure = BTreeSet::new();
    let mut queue = VecDeque::from([start.clone()]);

    while let Some(current) = queue.pop_front() {
        for next in step(&current)? {
            if !visited.insert(next.accession().to_string()) {
                continue;
            }
            if expand(&next) {
                queue.push_back(next.clone());
            }
            closure.insert(next);
        }
    }
    Ok(closure)
}
