use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// A single controlled-vocabulary entry.
///
/// Identity is the accession alone: two terms with the same accession are the
/// same term even if one of them has recorded more synonyms.
#[derive(Debug, Clone, Serialize)]
pub struct Term {
    accession: String,
    preferred_name: String,
    synonyms: BTreeSet<String>,
}

impl Term {
    pub fn new(accession: impl Into<String>, preferred_name: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            preferred_name: preferred_name.into(),
            synonyms: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn accession(&self) -> &str {
        &self.accession
    }

    #[must_use]
    pub fn preferred_name(&self) -> &str {
        &self.preferred_name
    }

    #[must_use]
    pub fn synonyms(&self) -> &BTreeSet<String> {
        &self.synonyms
    }

    /// Returns `true` when the synonym was not already recorded.
    pub fn add_synonym(&mut self, synonym: impl Into<String>) -> bool {
        let synonym = synonym.into();
        let synonym = synonym.trim();
        if synonym.is_empty() {
            return false;
        }
        self.synonyms.insert(synonym.to_string())
    }

    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for synonym in synonyms {
            self.add_synonym(synonym);
        }
        self
    }

    /// Matches an extracted value against the accession and, when asked, the
    /// preferred name.
    #[must_use]
    pub fn matches_value(&self, value: &str, use_name: bool) -> bool {
        self.accession == value || (use_name && self.preferred_name == value)
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.accession == other.accession
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accession.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.accession.cmp(&other.accession)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.accession, self.preferred_name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_and_hash_ignore_name_and_synonyms() {
        let a = Term::new("MI:0013", "biophysical").with_synonyms(["biophys"]);
        let b = Term::new("MI:0013", "renamed");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b), "same accession must collide");
    }

    #[test]
    fn add_synonym_rejects_blank_and_duplicates() {
        let mut term = Term::new("MI:0001", "interaction detection method");
        assert!(term.add_synonym("idm"));
        assert!(!term.add_synonym(" idm "));
        assert!(!term.add_synonym("   "));
        assert_eq!(term.synonyms().len(), 1);
    }

    #[test]
    fn matches_value_only_checks_name_when_requested() {
        let term = Term::new("MI:0018", "two hybrid");
        assert!(term.matches_value("MI:0018", false));
        assert!(!term.matches_value("two hybrid", false));
        assert!(term.matches_value("two hybrid", true));
    }
}
