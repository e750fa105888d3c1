//! Remote term-lookup service contract and its blocking HTTP client.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{ServiceConfig, normalize_base_url};
use crate::error::{CvError, Result};

/// Commands the service-backed graph needs from a remote ontology service.
///
/// Relative sets are returned as `accession -> preferred name` maps. Any
/// transport or protocol failure must be reported as [`CvError::Lookup`];
/// `Ok(None)` from [`OntologyService::term_name`] is reserved for "no such
/// term".
pub trait OntologyService: Send + Sync + std::fmt::Debug {
    fn term_name(&self, accession: &str, ontology: &str) -> Result<Option<String>>;

    fn synonyms(&self, _accession: &str, _ontology: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn parents(&self, accession: &str, ontology: &str) -> Result<BTreeMap<String, String>>;

    /// `depth == -1` asks for the full descendant closure in one call.
    fn children(
        &self,
        accession: &str,
        ontology: &str,
        depth: i32,
    ) -> Result<BTreeMap<String, String>>;

    fn root_terms(&self, ontology: &str) -> Result<BTreeMap<String, String>>;

    fn is_obsolete(&self, accession: &str, ontology: &str) -> Result<bool>;

    fn last_publish_date(&self, ontology: &str) -> Result<String>;
}

#[derive(Debug, Clone, Deserialize)]
struct TermPayload {
    name: String,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    obsolete: bool,
}

/// Term documents by `(ontology, accession)`; `None` records a 404.
type TermMemo = HashMap<(String, String), Option<TermPayload>>;

#[derive(Debug, Deserialize)]
struct TermRefPayload {
    accession: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OntologyPayload {
    last_publish_date: String,
}

/// JSON-over-HTTP client for a term service laid out as
/// `{base}/ontologies/{id}[/terms/{accession}[/parents|/children]]` and
/// `{base}/ontologies/{id}/roots`.
///
/// Name, synonyms and obsolete flag share one term document, fetched once
/// per accession.
#[derive(Clone)]
pub struct HttpOntologyService {
    base_url: Url,
    http: Client,
    terms: Arc<Mutex<TermMemo>>,
}

impl std::fmt::Debug for HttpOntologyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOntologyService")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpOntologyService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base = config.base_url.as_deref().ok_or_else(|| {
            CvError::Validation("term service base url is not configured".to_string())
        })?;
        Self::with_base_url(base, config.timeout_ms)
    }

    pub fn with_base_url(base_url: &str, timeout_ms: u64) -> Result<Self> {
        let base_url = Url::parse(&normalize_base_url(base_url)).map_err(|err| {
            CvError::Validation(format!("invalid term service url '{base_url}': {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CvError::Validation(format!(
                "term service url cannot be a base: {base_url}"
            )));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            base_url,
            http,
            terms: Arc::default(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                CvError::Validation(format!(
                    "term service url cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|err| CvError::Lookup(format!("GET {url} failed: {err}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CvError::Lookup(format!(
                "GET {url} returned status {}",
                response.status()
            )));
        }
        response
            .json::<T>()
            .map(Some)
            .map_err(|err| CvError::Lookup(format!("GET {url} returned malformed body: {err}")))
    }

    fn term(&self, accession: &str, ontology: &str) -> Result<Option<TermPayload>> {
        let key = (ontology.to_string(), accession.to_string());
        if let Some(term) = self.memo()?.get(&key) {
            return Ok(term.clone());
        }
        let url = self.endpoint(&["ontologies", ontology, "terms", accession])?;
        let term = self.get_json::<TermPayload>(url)?;
        self.memo()?.insert(key, term.clone());
        Ok(term)
    }

    fn memo(&self) -> Result<MutexGuard<'_, TermMemo>> {
        self.terms
            .lock()
            .map_err(|_| CvError::mutex_poisoned("term documents"))
    }

    fn term_refs(&self, url: Url) -> Result<BTreeMap<String, String>> {
        let refs = self
            .get_json::<Vec<TermRefPayload>>(url.clone())?
            .ok_or_else(|| CvError::Lookup(format!("GET {url} returned not found")))?;
        Ok(refs
            .into_iter()
            .map(|entry| (entry.accession, entry.name))
            .collect())
    }
}

impl OntologyService for HttpOntologyService {
    fn term_name(&self, accession: &str, ontology: &str) -> Result<Option<String>> {
        Ok(self.term(accession, ontology)?.map(|term| term.name))
    }

    fn synonyms(&self, accession: &str, ontology: &str) -> Result<Vec<String>> {
        Ok(self
            .term(accession, ontology)?
            .map(|term| term.synonyms)
            .unwrap_or_default())
    }

    fn parents(&self, accession: &str, ontology: &str) -> Result<BTreeMap<String, String>> {
        let url = self.endpoint(&["ontologies", ontology, "terms", accession, "parents"])?;
        self.term_refs(url)
    }

    fn children(
        &self,
        accession: &str,
        ontology: &str,
        depth: i32,
    ) -> Result<BTreeMap<String, String>> {
        let mut url = self.endpoint(&["ontologies", ontology, "terms", accession, "children"])?;
        url.query_pairs_mut()
            .append_pair("depth", &depth.to_string());
        self.term_refs(url)
    }

    fn root_terms(&self, ontology: &str) -> Result<BTreeMap<String, String>> {
        let url = self.endpoint(&["ontologies", ontology, "roots"])?;
        self.term_refs(url)
    }

    fn is_obsolete(&self, accession: &str, ontology: &str) -> Result<bool> {
        self.term(accession, ontology)?
            .map(|term| term.obsolete)
            .ok_or_else(|| {
                CvError::UnknownTerm(format!("{accession} is not a term of ontology {ontology}"))
            })
    }

    fn last_publish_date(&self, ontology: &str) -> Result<String> {
        let url = self.endpoint(&["ontologies", ontology])?;
        self.get_json::<OntologyPayload>(url)?
            .map(|payload| payload.last_publish_date)
            .ok_or_else(|| CvError::UnknownOntology(ontology.to_string()))
    }
}
