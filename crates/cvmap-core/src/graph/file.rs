use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{CvError, Result};
use crate::term::Term;

use super::obo::{OboDocument, parse_obo};
use super::source::{FreshnessSignature, SourceLocator};
use super::{RootsState, TermGraph, transitive_closure};

/// Term graph built eagerly from a complete term file.
#[derive(Debug)]
pub struct FileOntology {
    ontology_id: String,
    locator: SourceLocator,
    fetch_timeout_ms: u64,
    signature: FreshnessSignature,
    data_version: Option<String>,
    terms: HashMap<String, Term>,
    children: HashMap<String, BTreeSet<String>>,
    parents: HashMap<String, BTreeSet<String>>,
    obsolete: HashSet<String>,
    roots: Mutex<RootsState>,
    synonyms_enabled: bool,
    synonyms_recorded: bool,
    deferred_synonyms: HashMap<String, Vec<String>>,
}

impl FileOntology {
    #[must_use]
    pub fn new(ontology_id: impl Into<String>, synonyms_enabled: bool) -> Self {
        Self {
            ontology_id: ontology_id.into(),
            locator: SourceLocator::Inline,
            fetch_timeout_ms: 0,
            signature: FreshnessSignature::default(),
            data_version: None,
            terms: HashMap::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
            obsolete: HashSet::new(),
            roots: Mutex::new(RootsState::Stale),
            synonyms_enabled,
            synonyms_recorded: false,
            deferred_synonyms: HashMap::new(),
        }
    }

    /// Fetches the source once, captures its freshness signature and builds
    /// the whole graph.
    pub fn load(
        ontology_id: &str,
        locator: SourceLocator,
        fetch_timeout_ms: u64,
        synonyms_enabled: bool,
    ) -> Result<Self> {
        let bytes = locator.fetch(fetch_timeout_ms)?;
        let raw = String::from_utf8(bytes.clone()).map_err(|err| {
            CvError::OntologyLoad(format!("term source {locator} is not UTF-8: {err}"))
        })?;
        let document = parse_obo(&raw)?;

        let mut graph = Self::new(ontology_id, synonyms_enabled);
        graph.build(document)?;
        graph.signature = FreshnessSignature::capture(&bytes);
        graph.locator = locator;
        graph.fetch_timeout_ms = fetch_timeout_ms;
        info!(
            ontology = %graph.ontology_id,
            terms = graph.terms.len(),
            source = %graph.locator,
            "file-backed ontology loaded"
        );
        Ok(graph)
    }

    /// Builds a graph from in-memory OBO text. The result has no external
    /// source and therefore always reports itself as up to date.
    pub fn from_obo_str(ontology_id: &str, raw: &str, synonyms_enabled: bool) -> Result<Self> {
        let mut graph = Self::new(ontology_id, synonyms_enabled);
        graph.build(parse_obo(raw)?)?;
        graph.signature = FreshnessSignature::capture(raw.as_bytes());
        Ok(graph)
    }

    fn build(&mut self, document: OboDocument) -> Result<()> {
        self.data_version = document.data_version().map(ToString::to_string);

        for record in &document.terms {
            let mut term = Term::new(
                record.id.clone(),
                record.name.clone().unwrap_or_else(|| record.id.clone()),
            );
            if self.synonyms_enabled {
                for synonym in &record.synonyms {
                    term.add_synonym(synonym.as_str());
                }
            } else if !record.synonyms.is_empty() {
                self.deferred_synonyms
                    .insert(record.id.clone(), record.synonyms.clone());
            }
            self.add_term(term, record.obsolete);
        }
        self.synonyms_recorded = self.synonyms_enabled;

        for record in &document.terms {
            for parent in &record.parents {
                self.add_link(parent, &record.id)?;
            }
        }
        Ok(())
    }

    pub fn add_term(&mut self, term: Term, obsolete: bool) {
        if obsolete {
            self.obsolete.insert(term.accession().to_string());
        }
        self.terms.insert(term.accession().to_string(), term);
        *self.roots_mut() = RootsState::Stale;
    }

    /// Records a parent→child edge. Both endpoints must already be terms of
    /// this graph.
    pub fn add_link(&mut self, parent: &str, child: &str) -> Result<()> {
        for endpoint in [parent, child] {
            if !self.terms.contains_key(endpoint) {
                return Err(CvError::OntologyLoad(format!(
                    "missing endpoint '{endpoint}' for link {parent} -> {child} in ontology {}",
                    self.ontology_id
                )));
            }
        }
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
        self.parents
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string());
        *self.roots_mut() = RootsState::Stale;
        Ok(())
    }

    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn data_version(&self) -> Option<&str> {
        self.data_version.as_deref()
    }

    #[must_use]
    pub fn signature(&self) -> &FreshnessSignature {
        &self.signature
    }

    #[must_use]
    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    fn roots_mut(&mut self) -> &mut RootsState {
        self.roots
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn resolve(&self, accessions: Option<&BTreeSet<String>>) -> BTreeSet<Term> {
        accessions
            .into_iter()
            .flatten()
            .filter_map(|accession| self.terms.get(accession).cloned())
            .collect()
    }

    fn compute_roots(&self) -> BTreeSet<Term> {
        self.terms
            .iter()
            .filter(|(accession, _)| {
                self.parents
                    .get(accession.as_str())
                    .is_none_or(BTreeSet::is_empty)
            })
            .map(|(_, term)| term.clone())
            .collect()
    }
}

impl TermGraph for FileOntology {
    fn ontology_id(&self) -> &str {
        &self.ontology_id
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn has_terms(&self) -> Result<bool> {
        Ok(!self.terms.is_empty())
    }

    fn term_by_accession(&self, accession: &str) -> Result<Option<Term>> {
        Ok(self.terms.get(accession).cloned())
    }

    fn is_obsolete(&self, term: &Term) -> Result<bool> {
        if !self.terms.contains_key(term.accession()) {
            return Err(CvError::UnknownTerm(format!(
                "{} is not a term of ontology {}",
                term.accession(),
                self.ontology_id
            )));
        }
        Ok(self.obsolete.contains(term.accession()))
    }

    fn direct_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        Ok(self.resolve(self.parents.get(term.accession())))
    }

    fn direct_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        Ok(self.resolve(self.children.get(term.accession())))
    }

    fn all_parents(&self, term: &Term) -> Result<BTreeSet<Term>> {
        transitive_closure(term, |current| self.direct_parents(current), |_| true)
    }

    fn all_children(&self, term: &Term) -> Result<BTreeSet<Term>> {
        transitive_closure(term, |current| self.direct_children(current), |_| true)
    }

    fn roots(&self) -> Result<BTreeSet<Term>> {
        let mut state = self
            .roots
            .lock()
            .map_err(|_| CvError::mutex_poisoned("roots"))?;
        if let RootsState::Fresh(roots) = &*state {
            return Ok(roots.clone());
        }
        let roots = self.compute_roots();
        *state = RootsState::Fresh(roots.clone());
        Ok(roots)
    }

    fn is_up_to_date(&self) -> Result<bool> {
        if self.locator == SourceLocator::Inline {
            return Ok(true);
        }
        let bytes = self.locator.fetch(self.fetch_timeout_ms)?;
        let current = FreshnessSignature::capture(&bytes);
        let fresh = self.signature.matches(&current);
        debug!(ontology = %self.ontology_id, fresh, "freshness check");
        Ok(fresh)
    }

    fn synonyms_enabled(&self) -> bool {
        self.synonyms_enabled
    }

    fn set_synonyms_enabled(&mut self, enabled: bool) -> Result<()> {
        self.synonyms_enabled = enabled;
        if !enabled || self.synonyms_recorded {
            return Ok(());
        }
        for (accession, synonyms) in self.deferred_synonyms.drain() {
            if let Some(term) = self.terms.get_mut(&accession) {
                for synonym in synonyms {
                    term.add_synonym(synonym);
                }
            }
        }
        self.synonyms_recorded = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI: &str = r#"
[Term]
id: MI:0000
name: molecular interaction

[Term]
id: MI:0001
name: interaction detection method
synonym: "detection" EXACT []
is_a: MI:0000

[Term]
id: MI:0013
name: biophysical
is_a: MI:0001

[Term]
id: MI:0018
name: two hybrid
is_a: MI:0001

[Term]
id: MI:0019
name: coimmunoprecipitation
is_a: MI:0013
is_a: MI:0018

[Term]
id: MI:0099
name: retired method
is_a: MI:0001
is_obsolete: true

[Term]
id: MOD:0001
name: free standing
"#;

    fn graph() -> FileOntology {
        FileOntology::from_obo_str("MI", MINI, true).expect("build graph")
    }

    fn term(graph: &FileOntology, accession: &str) -> Term {
        graph
            .term_by_accession(accession)
            .expect("lookup")
            .expect("term exists")
    }

    fn accessions(terms: &BTreeSet<Term>) -> Vec<&str> {
        terms.iter().map(Term::accession).collect()
    }

    #[test]
    fn roots_are_exactly_the_terms_without_parents() {
        let graph = graph();
        let roots = graph.roots().expect("roots");
        assert_eq!(accessions(&roots), vec!["MI:0000", "MOD:0001"]);

        for term in graph.terms.values() {
            let has_parent = !graph.direct_parents(term).expect("parents").is_empty();
            assert_eq!(roots.contains(term), !has_parent, "{}", term.accession());
        }
    }

    #[test]
    fn mutation_invalidates_cached_roots() {
        let mut graph = graph();
        assert_eq!(graph.roots().expect("roots").len(), 2);

        graph.add_term(Term::new("MI:1000", "new root"), false);
        assert_eq!(graph.roots().expect("roots").len(), 3);

        graph.add_link("MI:0000", "MOD:0001").expect("link");
        assert_eq!(
            accessions(&graph.roots().expect("roots")),
            vec!["MI:0000", "MI:1000"]
        );
    }

    #[test]
    fn add_link_rejects_missing_endpoint() {
        let mut graph = graph();
        let err = graph
            .add_link("MI:0001", "MI:7777")
            .expect_err("missing child");
        assert!(matches!(err, CvError::OntologyLoad(_)));
    }

    #[test]
    fn dangling_parent_reference_fails_the_whole_load() {
        let raw = "[Term]\nid: A:1\nname: a\nis_a: A:404\n";
        let err = FileOntology::from_obo_str("A", raw, true).expect_err("dangling parent");
        assert!(matches!(err, CvError::OntologyLoad(_)));
    }

    #[test]
    fn closures_follow_converging_paths_without_self() {
        let graph = graph();
        let method = term(&graph, "MI:0001");
        let children = graph.all_children(&method).expect("children");
        assert_eq!(
            accessions(&children),
            vec!["MI:0013", "MI:0018", "MI:0019", "MI:0099"]
        );
        assert!(!children.contains(&method));

        let coip = term(&graph, "MI:0019");
        assert_eq!(
            accessions(&graph.all_parents(&coip).expect("parents")),
            vec!["MI:0000", "MI:0001", "MI:0013", "MI:0018"]
        );
    }

    #[test]
    fn cyclic_source_still_terminates() {
        let raw = "[Term]\nid: C:1\nname: one\nis_a: C:3\n\n[Term]\nid: C:2\nname: two\nis_a: C:1\n\n[Term]\nid: C:3\nname: three\nis_a: C:2\n";
        let graph = FileOntology::from_obo_str("C", raw, true).expect("build");
        let one = term(&graph, "C:1");
        let children = graph.all_children(&one).expect("children");
        assert_eq!(accessions(&children), vec!["C:2", "C:3"]);
        assert!(graph.roots().expect("roots").is_empty());
    }

    #[test]
    fn valid_terms_honours_use_term_and_allow_children() {
        let graph = graph();
        let only_term = graph.valid_terms("MI:0013", false, true).expect("valid");
        assert_eq!(accessions(&only_term), vec!["MI:0013"]);

        let leaf_children = graph.valid_terms("MI:0018", true, false).expect("valid");
        assert_eq!(accessions(&leaf_children), vec!["MI:0019"]);

        let true_leaf = graph.valid_terms("MI:0019", true, false).expect("valid");
        assert!(true_leaf.is_empty());

        let both = graph.valid_terms("MI:0013", true, true).expect("valid");
        assert_eq!(accessions(&both), vec!["MI:0013", "MI:0019"]);

        assert!(graph.valid_terms("MI:4040", true, true).expect("valid").is_empty());
    }

    #[test]
    fn is_obsolete_rejects_foreign_terms() {
        let graph = graph();
        assert!(graph.is_obsolete(&term(&graph, "MI:0099")).expect("known"));
        assert!(!graph.is_obsolete(&term(&graph, "MI:0013")).expect("known"));

        let err = graph
            .is_obsolete(&Term::new("GO:0001", "elsewhere"))
            .expect_err("unknown term");
        assert!(matches!(err, CvError::UnknownTerm(_)));
    }

    #[test]
    fn enabling_synonyms_later_appends_them_once() {
        let mut graph = FileOntology::from_obo_str("MI", MINI, false).expect("build");
        assert!(term(&graph, "MI:0001").synonyms().is_empty());

        graph.set_synonyms_enabled(true).expect("enable");
        assert_eq!(term(&graph, "MI:0001").synonyms().len(), 1);

        graph.set_synonyms_enabled(false).expect("disable");
        assert_eq!(
            term(&graph, "MI:0001").synonyms().len(),
            1,
            "disabling must not purge recorded synonyms"
        );

        graph.set_synonyms_enabled(true).expect("re-enable");
        assert_eq!(term(&graph, "MI:0001").synonyms().len(), 1);
    }

    #[test]
    fn file_source_freshness_tracks_content_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mi.obo");
        std::fs::write(&path, MINI).expect("write source");

        let graph =
            FileOntology::load("MI", SourceLocator::Path(path.clone()), 1_000, true).expect("load");
        assert_eq!(graph.term_count(), 7);
        assert!(graph.is_up_to_date().expect("fresh"));

        std::fs::write(&path, MINI.replace("two hybrid", "two hybrids")).expect("rewrite");
        assert!(!graph.is_up_to_date().expect("stale"));
    }
}
