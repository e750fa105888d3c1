//! CV rules: declarative term constraints and their evaluation.
//!
//! A [`CvRule`] is never mutated by evaluation. Run state (status and the
//! in-flight marker) lives in an [`EvaluationContext`] owned by the caller,
//! so parallel runs use one context each.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CvError, Result};
use crate::message::{MessageLevel, ValidationMessage};
use crate::path::{PathEvaluator, relative_path, value_text};
use crate::registry::OntologyRegistry;
use crate::term::Term;

fn default_true() -> bool {
    true
}

/// One permitted term (and optionally its descendants) of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CvTerm {
    pub ontology: String,
    pub accession: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub allow_children: bool,
    #[serde(default = "default_true")]
    pub use_term: bool,
    #[serde(default)]
    pub use_term_name: bool,
    #[serde(default = "default_true")]
    pub repeatable: bool,
}

impl CvTerm {
    pub fn new(ontology: impl Into<String>, accession: impl Into<String>) -> Self {
        Self {
            ontology: ontology.into(),
            accession: accession.into(),
            name: None,
            allow_children: false,
            use_term: true,
            use_term_name: false,
            repeatable: true,
        }
    }

    #[must_use]
    pub fn with_children(mut self, allow_children: bool, use_term: bool) -> Self {
        self.allow_children = allow_children;
        self.use_term = use_term;
        self
    }

    #[must_use]
    pub fn matching_name(mut self) -> Self {
        self.use_term_name = true;
        self
    }

    #[must_use]
    pub fn not_repeatable(mut self) -> Self {
        self.repeatable = false;
        self
    }
}

impl std::fmt::Display for CvTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.accession)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        match (self.use_term, self.allow_children) {
            (true, true) => f.write_str(" or any child"),
            (false, true) => f.write_str(" children only"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    #[default]
    Or,
    Xor,
}

impl Combinator {
    /// Decides pass/fail from aggregate hit counts, one per term.
    #[must_use]
    pub fn accepts(self, hits: &[usize]) -> bool {
        let matched = hits.iter().filter(|count| **count > 0).count();
        match self {
            Self::And => matched == hits.len(),
            Self::Or => matched >= 1,
            Self::Xor => matched == 1,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
        }
    }
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation level of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Requirement {
    May,
    Should,
    Must,
}

impl Requirement {
    #[must_use]
    pub const fn level(self) -> MessageLevel {
        match self {
            Self::May => MessageLevel::Info,
            Self::Should => MessageLevel::Warn,
            Self::Must => MessageLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    #[default]
    NotChecked,
    ValidXpath,
    ValidRule,
    InvalidXpath,
}

impl RuleStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ValidRule | Self::InvalidXpath)
    }

    /// Status after observing `next`. Terminal states never change and
    /// `ValidXpath` never falls back to `NotChecked`.
    #[must_use]
    pub const fn advance(self, next: Self) -> Self {
        match (self, next) {
            (Self::ValidRule | Self::InvalidXpath, _) => self,
            (Self::ValidXpath, Self::NotChecked) => self,
            _ => next,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RuleRun {
    status: RuleStatus,
    in_flight: bool,
}

/// Per-run state of every rule evaluated through it.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    runs: Mutex<HashMap<String, RuleRun>>,
}

/// Marks a rule as in flight until dropped.
#[derive(Debug)]
pub(crate) struct RunGuard<'a> {
    context: &'a EvaluationContext,
    rule_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut runs = match self.context.runs.lock() {
            Ok(runs) => runs,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(run) = runs.get_mut(&self.rule_id) {
            run.in_flight = false;
        }
    }
}

impl EvaluationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RuleRun>>> {
        self.runs
            .lock()
            .map_err(|_| CvError::mutex_poisoned("evaluation context"))
    }

    /// Claims `rule_id` for one evaluation. A second claim before the first
    /// guard is dropped is a caller bug.
    pub(crate) fn enter(&self, rule_id: &str) -> Result<RunGuard<'_>> {
        let mut runs = self.lock()?;
        let run = runs.entry(rule_id.to_string()).or_default();
        if run.in_flight {
            return Err(CvError::ReentrantEvaluation(rule_id.to_string()));
        }
        run.in_flight = true;
        Ok(RunGuard {
            context: self,
            rule_id: rule_id.to_string(),
        })
    }

    pub fn status(&self, rule_id: &str) -> Result<RuleStatus> {
        Ok(self
            .lock()?
            .get(rule_id)
            .map(|run| run.status)
            .unwrap_or_default())
    }

    pub(crate) fn advance(&self, rule_id: &str, next: RuleStatus) -> Result<RuleStatus> {
        let mut runs = self.lock()?;
        let run = runs.entry(rule_id.to_string()).or_default();
        let previous = run.status;
        run.status = previous.advance(next);
        if run.status != previous {
            debug!(rule = rule_id, from = ?previous, to = ?run.status, "rule status changed");
        }
        Ok(run.status)
    }

    /// Returns every rule to `NotChecked` for an independent run.
    pub fn reset(&self) -> Result<()> {
        let mut runs = self.lock()?;
        for run in runs.values_mut() {
            run.status = RuleStatus::NotChecked;
        }
        Ok(())
    }

    pub fn reset_rule(&self, rule_id: &str) -> Result<()> {
        if let Some(run) = self.lock()?.get_mut(rule_id) {
            run.status = RuleStatus::NotChecked;
        }
        Ok(())
    }
}

/// Collaborators a rule needs while it runs.
#[derive(Debug, Clone, Copy)]
pub struct RuleServices<'a> {
    pub registry: &'a OntologyRegistry,
    pub paths: &'a dyn PathEvaluator,
}

/// A declarative term constraint over the values found at `element_path`
/// inside every object selected by `scope_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CvRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub scope_path: String,
    pub element_path: String,
    #[serde(default)]
    pub terms: Vec<CvTerm>,
    #[serde(default)]
    pub combinator: Combinator,
    pub requirement: Requirement,
}

impl CvRule {
    #[must_use]
    pub fn level(&self) -> MessageLevel {
        self.requirement.level()
    }

    fn message(&self, level: MessageLevel, text: impl Into<String>) -> ValidationMessage {
        ValidationMessage::new(level, text).with_rule(&self.id, self.name.as_deref())
    }

    /// Element path relative to the scope path.
    pub fn relative_element_path(&self) -> Result<String> {
        relative_path(&self.element_path, &self.scope_path).ok_or_else(|| {
            CvError::PathCompile(format!(
                "element path {} of rule {} is not inside scope {}",
                self.element_path, self.id, self.scope_path
            ))
        })
    }

    /// Evaluates the rule against `object`, resolving `scope` (the rule's
    /// scope path, possibly made relative to a document prefix) first. Hits
    /// are counted over the values of every selected scope object together.
    pub fn check(
        &self,
        object: &Value,
        scope: &str,
        services: RuleServices<'_>,
        context: &EvaluationContext,
    ) -> Result<Vec<ValidationMessage>> {
        let _run = context.enter(&self.id)?;
        if context.status(&self.id)? == RuleStatus::InvalidXpath {
            return Ok(Vec::new());
        }

        let mut messages = Vec::new();
        let scopes = services.paths.evaluate(scope, object)?;
        if scopes.is_empty()
            && self.probe_structure(scope, object, services, context, &mut messages)?
        {
            return Ok(messages);
        }

        let element = self.relative_element_path()?;
        let mut values = Vec::new();
        for scope_object in &scopes {
            values.extend(services.paths.evaluate(&element, scope_object)?);
        }

        if values.is_empty() {
            if !scopes.is_empty() {
                let selected = Value::Array(scopes);
                if self.probe_structure(&element, &selected, services, context, &mut messages)? {
                    return Ok(messages);
                }
            }
            if !self.terms.is_empty() {
                messages.push(
                    self.message(
                        self.level(),
                        format!(
                            "no value found at {} where {} was expected",
                            self.element_path,
                            self.describe_terms()
                        ),
                    )
                    .with_context(self.scope_path.clone()),
                );
            }
            return Ok(messages);
        }

        context.advance(&self.id, RuleStatus::ValidRule)?;
        let valid_sets = self.resolve_valid_terms(services.registry)?;
        self.judge_values(&values, &valid_sets, &mut messages);
        Ok(messages)
    }

    fn resolve_valid_terms(&self, registry: &OntologyRegistry) -> Result<Vec<BTreeSet<Term>>> {
        self.terms
            .iter()
            .map(|spec| {
                registry.valid_terms(
                    &spec.ontology,
                    &spec.accession,
                    spec.allow_children,
                    spec.use_term,
                )
            })
            .collect()
    }

    /// Records the structure probe outcome. Returns `true` when the rule has
    /// just become `InvalidXpath`.
    fn probe_structure(
        &self,
        path: &str,
        object: &Value,
        services: RuleServices<'_>,
        context: &EvaluationContext,
        messages: &mut Vec<ValidationMessage>,
    ) -> Result<bool> {
        if context.status(&self.id)? == RuleStatus::ValidRule {
            return Ok(false);
        }
        match services.paths.check_structure(path, object)? {
            Some(reason) => {
                context.advance(&self.id, RuleStatus::InvalidXpath)?;
                warn!(rule = %self.id, %reason, "rule path does not match the document shape");
                messages.push(self.message(
                    MessageLevel::Warn,
                    format!("path {path} is invalid for this document: {reason}"),
                ));
                Ok(true)
            }
            None => {
                context.advance(&self.id, RuleStatus::ValidXpath)?;
                Ok(false)
            }
        }
    }

    fn judge_values(
        &self,
        values: &[Value],
        valid_sets: &[BTreeSet<Term>],
        messages: &mut Vec<ValidationMessage>,
    ) {
        let mut hits = vec![0_usize; self.terms.len()];
        let mut unmatched = Vec::new();
        for value in values {
            let text = value_text(value);
            let mut matched = false;
            if let Some(text) = text.as_deref() {
                for ((spec, valid), count) in self.terms.iter().zip(valid_sets).zip(&mut hits) {
                    if valid
                        .iter()
                        .any(|term| term.matches_value(text, spec.use_term_name))
                    {
                        *count += 1;
                        matched = true;
                    }
                }
            }
            if !matched {
                unmatched.push(value_label(value));
            }
        }

        if !self.combinator.accepts(&hits) {
            let offending = if unmatched.is_empty() {
                values.iter().map(value_label).collect()
            } else {
                unmatched
            };
            messages.push(
                self.message(
                    self.level(),
                    format!(
                        "values [{}] at {} do not satisfy {} of {}",
                        offending.join(", "),
                        self.element_path,
                        self.combinator,
                        self.describe_terms()
                    ),
                )
                .with_context(self.scope_path.clone()),
            );
        }

        for (spec, count) in self.terms.iter().zip(&hits) {
            if !spec.repeatable && *count > 1 {
                messages.push(
                    self.message(
                        self.level(),
                        format!(
                            "term {spec} may appear only once at {} but matched {count} values",
                            self.element_path
                        ),
                    )
                    .with_context(self.scope_path.clone()),
                );
            }
        }
    }

    fn describe_terms(&self) -> String {
        let listed = self
            .terms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        format!("[{}]", listed.join("; "))
    }
}

fn value_label(value: &Value) -> String {
    value_text(value).unwrap_or_else(|| value.to_string())
}
