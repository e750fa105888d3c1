//! Rule manager: owns the rules of one mapping, prunes them against the
//! registry once, then evaluates them per document.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CvError, Result};
use crate::graph::TermGraph;
use crate::mapping::{CvMapping, CvSource};
use crate::message::ValidationMessage;
use crate::path::{JsonPathEvaluator, PathEvaluator, relative_path};
use crate::registry::OntologyRegistry;
use crate::rule::{CvRule, CvTerm, EvaluationContext, RuleServices, RuleStatus};

#[derive(Debug)]
pub struct CvRuleManager {
    name: Option<String>,
    sources: Vec<CvSource>,
    rules: Vec<CvRule>,
    registry: Arc<OntologyRegistry>,
    paths: Arc<dyn PathEvaluator>,
    context: EvaluationContext,
}

impl CvRuleManager {
    pub fn new(
        mapping: CvMapping,
        registry: Arc<OntologyRegistry>,
        paths: Arc<dyn PathEvaluator>,
    ) -> Self {
        Self {
            name: mapping.name,
            sources: mapping.sources,
            rules: mapping.rules,
            registry,
            paths,
            context: EvaluationContext::new(),
        }
    }

    /// Manager over JSON documents.
    pub fn for_json(mapping: CvMapping, registry: Arc<OntologyRegistry>) -> Self {
        Self::new(mapping, registry, Arc::new(JsonPathEvaluator))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn rules(&self) -> &[CvRule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&CvRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    #[must_use]
    pub fn registry(&self) -> &OntologyRegistry {
        &self.registry
    }

    /// The context used by [`CvRuleManager::check`].
    #[must_use]
    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    fn services(&self) -> RuleServices<'_> {
        RuleServices {
            registry: &self.registry,
            paths: self.paths.as_ref(),
        }
    }

    /// Removes rules whose paths do not compile and terms that cannot be
    /// used, with one message per removal. A rule that loses every term is
    /// removed too, with a summary message of its own.
    pub fn check_cv_mapping(&mut self) -> Result<Vec<ValidationMessage>> {
        let mut messages = Vec::new();
        let rules = std::mem::take(&mut self.rules);
        let mut kept_rules = Vec::with_capacity(rules.len());

        for mut rule in rules {
            if let Some(reason) = self.path_problem(&rule)? {
                warn!(rule = %rule.id, %reason, "rule removed");
                messages.push(
                    ValidationMessage::error(format!("rule removed: {reason}"))
                        .with_rule(&rule.id, rule.name.as_deref()),
                );
                continue;
            }

            let declared = rule.terms.len();
            let mut kept_terms = Vec::with_capacity(declared);
            for term in std::mem::take(&mut rule.terms) {
                match self.term_problem(&term)? {
                    Some(reason) => {
                        warn!(rule = %rule.id, accession = %term.accession, %reason, "term removed");
                        messages.push(
                            ValidationMessage::error(format!(
                                "term {} ({}) removed: {reason}",
                                term.accession, term.ontology
                            ))
                            .with_rule(&rule.id, rule.name.as_deref()),
                        );
                    }
                    None => kept_terms.push(term),
                }
            }
            rule.terms = kept_terms;

            if declared > 0 && rule.terms.is_empty() {
                warn!(rule = %rule.id, "rule removed after losing all terms");
                messages.push(
                    ValidationMessage::error(format!(
                        "rule removed: none of its {declared} terms can be used"
                    ))
                    .with_rule(&rule.id, rule.name.as_deref()),
                );
                continue;
            }
            kept_rules.push(rule);
        }

        debug!(kept = kept_rules.len(), messages = messages.len(), "mapping self-check done");
        self.rules = kept_rules;
        Ok(messages)
    }

    fn path_problem(&self, rule: &CvRule) -> Result<Option<String>> {
        for path in [&rule.scope_path, &rule.element_path] {
            match self.paths.evaluate(path, &Value::Null) {
                Ok(_) => {}
                Err(CvError::PathCompile(reason)) => return Ok(Some(reason)),
                Err(err) => return Err(err),
            }
        }
        match rule.relative_element_path() {
            Ok(_) => Ok(None),
            Err(CvError::PathCompile(reason)) => Ok(Some(reason)),
            Err(err) => Err(err),
        }
    }

    fn term_problem(&self, term: &CvTerm) -> Result<Option<String>> {
        if !self.registry.contains(&term.ontology) {
            return Ok(Some(format!("ontology {} is not loaded", term.ontology)));
        }
        if !self.declares_source(&term.ontology) {
            return Ok(Some(format!(
                "ontology {} is not declared as a source of this mapping",
                term.ontology
            )));
        }
        let graph = self.registry.access(&term.ontology)?;
        let Some(resolved) = graph.term_by_accession(&term.accession)? else {
            return Ok(Some(format!(
                "accession not found in ontology {}",
                term.ontology
            )));
        };
        if graph.is_obsolete(&resolved)? {
            return Ok(Some("term is obsolete".to_string()));
        }
        let children_only = term.allow_children && !term.use_term;
        if children_only && graph.direct_children(&resolved)?.is_empty() {
            return Ok(Some(
                "only children are allowed but the term has none".to_string(),
            ));
        }
        if !term.use_term && !term.allow_children {
            return Ok(Some(
                "neither the term nor its children are allowed".to_string(),
            ));
        }
        Ok(None)
    }

    fn declares_source(&self, ontology_id: &str) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|source| source.id == ontology_id)
    }

    /// Evaluates every rule against a whole document.
    pub fn check(&self, object: &Value) -> Result<Vec<ValidationMessage>> {
        self.check_in(&self.context, object, None)
    }

    /// Evaluates the rules whose scope lies under `prefix` against `object`,
    /// which is the element found at `prefix` in a larger document.
    pub fn check_with_prefix(
        &self,
        object: &Value,
        prefix: &str,
    ) -> Result<Vec<ValidationMessage>> {
        self.check_in(&self.context, object, Some(prefix))
    }

    /// Like [`CvRuleManager::check_with_prefix`], with run state kept in
    /// `context` instead of the manager's own.
    pub fn check_in(
        &self,
        context: &EvaluationContext,
        object: &Value,
        prefix: Option<&str>,
    ) -> Result<Vec<ValidationMessage>> {
        if object.is_null() {
            return Err(CvError::Validation("no document to validate".to_string()));
        }
        let services = self.services();
        let mut messages = Vec::new();
        for rule in &self.rules {
            let scope = match prefix {
                None => rule.scope_path.clone(),
                Some(prefix) => match relative_path(&rule.scope_path, prefix) {
                    Some(scope) => scope,
                    None => continue,
                },
            };
            messages.extend(rule.check(object, &scope, services, context)?);
        }
        Ok(messages)
    }

    /// Returns every rule to `NotChecked` in the manager's own context.
    pub fn reset_status(&self) -> Result<()> {
        self.context.reset()
    }

    pub fn rule_statuses(&self) -> Result<BTreeMap<String, RuleStatus>> {
        self.rules
            .iter()
            .map(|rule| Ok((rule.id.clone(), self.context.status(&rule.id)?)))
            .collect()
    }

    /// Lists rules that never produced a value in the current run.
    pub fn rule_status_report(&self) -> Result<Vec<ValidationMessage>> {
        let mut messages = Vec::new();
        for rule in &self.rules {
            let text = match self.context.status(&rule.id)? {
                RuleStatus::NotChecked => {
                    format!("rule never applied: nothing matched scope {}", rule.scope_path)
                }
                RuleStatus::ValidXpath => format!(
                    "rule never found a value at {}",
                    rule.element_path
                ),
                RuleStatus::ValidRule | RuleStatus::InvalidXpath => continue,
            };
            messages.push(ValidationMessage::info(text).with_rule(&rule.id, rule.name.as_deref()));
        }
        Ok(messages)
    }
}
