//! Value extraction from JSON documents with slash-separated element paths.
//!
//! The syntax is a small XPath subset: `/a/b/@c` selects field `c` of every
//! `b` under `a`; `*` selects every field of an object; `.` is the context
//! node. Arrays are flattened at every step, so a path never has to spell out
//! indices. Absolute and relative paths are both resolved against the object
//! handed to the evaluator.

use serde_json::Value;

use crate::error::{CvError, Result};

/// The value-extraction collaborator consumed by rule evaluation.
pub trait PathEvaluator: Send + Sync + std::fmt::Debug {
    /// Ordered values selected by `path`. An empty result is not an error;
    /// [`CvError::PathCompile`] is reserved for malformed paths.
    fn evaluate(&self, path: &str, object: &Value) -> Result<Vec<Value>>;

    /// `Some(reason)` when `path` cannot exist in the shape of `object`.
    fn check_structure(&self, path: &str, object: &Value) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Wildcard,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompiledPath {
    steps: Vec<Step>,
}

fn compile(path: &str) -> Result<CompiledPath> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(CvError::PathCompile("empty path".to_string()));
    }
    if trimmed.contains("//") {
        return Err(CvError::PathCompile(format!(
            "descendant axis is not supported: {trimmed}"
        )));
    }
    if trimmed.contains(['[', ']', '(', ')']) {
        return Err(CvError::PathCompile(format!(
            "predicates and functions are not supported: {trimmed}"
        )));
    }
    let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if body.is_empty() {
        return Ok(CompiledPath { steps: Vec::new() });
    }

    let mut steps = Vec::new();
    for segment in body.split('/') {
        let name = segment.strip_prefix('@').unwrap_or(segment);
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(CvError::PathCompile(format!(
                "invalid segment '{segment}' in {trimmed}"
            )));
        }
        steps.push(match name {
            "." => Step::Context,
            "*" => Step::Wildcard,
            _ => Step::Field(name.to_string()),
        });
    }
    Ok(CompiledPath { steps })
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        other => out.push(other),
    }
}

fn apply<'a>(step: &Step, nodes: &[&'a Value]) -> Vec<&'a Value> {
    let mut next = Vec::new();
    for &node in nodes {
        match (step, node) {
            (Step::Context, _) => next.push(node),
            (Step::Wildcard, Value::Object(map)) => next.extend(map.values()),
            (Step::Field(key), Value::Object(map)) => next.extend(map.get(key)),
            _ => {}
        }
    }
    let mut flat = Vec::with_capacity(next.len());
    for value in next {
        flatten(value, &mut flat);
    }
    flat
}

/// [`PathEvaluator`] over `serde_json::Value` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathEvaluator;

impl PathEvaluator for JsonPathEvaluator {
    fn evaluate(&self, path: &str, object: &Value) -> Result<Vec<Value>> {
        let compiled = compile(path)?;
        let mut nodes = Vec::new();
        flatten(object, &mut nodes);
        for step in &compiled.steps {
            if nodes.is_empty() {
                break;
            }
            nodes = apply(step, &nodes);
        }
        Ok(nodes
            .into_iter()
            .filter(|value| !value.is_null())
            .cloned()
            .collect())
    }

    fn check_structure(&self, path: &str, object: &Value) -> Result<Option<String>> {
        let compiled = compile(path)?;
        let mut nodes = Vec::new();
        flatten(object, &mut nodes);
        let mut walked = String::new();
        for step in &compiled.steps {
            let next = apply(step, &nodes);
            if next.is_empty() {
                let Step::Field(key) = step else {
                    return Ok(None);
                };
                let parent = if walked.is_empty() { "/" } else { walked.as_str() };
                let lacks_key = nodes
                    .iter()
                    .any(|node| node.as_object().is_some_and(|map| !map.contains_key(key)));
                if lacks_key {
                    return Ok(Some(format!(
                        "element '{key}' does not exist under '{parent}' (path {path})"
                    )));
                }
                let only_scalars = !nodes.is_empty()
                    && nodes.iter().all(|node| !node.is_object())
                    && nodes.iter().any(|node| !node.is_null());
                if only_scalars {
                    return Ok(Some(format!(
                        "element '{key}' cannot exist under the scalar value at '{parent}' (path {path})"
                    )));
                }
                return Ok(None);
            }
            walked.push('/');
            walked.push_str(match step {
                Step::Field(key) => key.as_str(),
                Step::Wildcard => "*",
                Step::Context => ".",
            });
            nodes = next;
        }
        Ok(None)
    }
}

/// Text form used to compare an extracted value against term accessions and
/// names. Objects, arrays and null have none.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/')
    } else {
        trimmed
    }
}

/// `path` relative to `base` when `base` is a segment-aligned prefix of it.
/// Equal paths yield `"."`.
#[must_use]
pub fn relative_path(path: &str, base: &str) -> Option<String> {
    let path = normalize(path);
    let base = normalize(base);
    if path == base {
        return Some(".".to_string());
    }
    if base == "/" {
        return path.strip_prefix('/').map(ToString::to_string);
    }
    let rest = path.strip_prefix(base)?.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(".".to_string());
    }
    Some(rest.to_string())
}
