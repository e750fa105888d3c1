//! Reader for the OBO 1.2 flat file format.
//!
//! Only what the term graph needs is kept: term ids, names, exact/related
//! synonyms, `is_a` and `part_of` parents and the obsolete flag. Every other
//! tag and every non-`[Term]` stanza is skipped.

use std::collections::BTreeMap;

use crate::error::{CvError, Result};

const PARENT_RELATIONSHIPS: &[&str] = &["part_of"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OboTerm {
    pub id: String,
    pub name: Option<String>,
    pub synonyms: Vec<String>,
    pub parents: Vec<String>,
    pub obsolete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OboDocument {
    pub header: BTreeMap<String, String>,
    pub terms: Vec<OboTerm>,
}

impl OboDocument {
    #[must_use]
    pub fn data_version(&self) -> Option<&str> {
        self.header
            .get("data-version")
            .or_else(|| self.header.get("date"))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stanza {
    Header,
    Term,
    Other,
}

pub fn parse_obo(raw: &str) -> Result<OboDocument> {
    let mut document = OboDocument::default();
    let mut stanza = Stanza::Header;
    let mut current: Option<(usize, OboTerm)> = None;

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }

        if line.starts_with('[') {
            finish_term(&mut document, current.take())?;
            stanza = if line == "[Term]" {
                current = Some((line_no, OboTerm::default()));
                Stanza::Term
            } else {
                Stanza::Other
            };
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            return Err(CvError::OntologyLoad(format!(
                "obo line {line_no}: expected 'tag: value', got '{line}'"
            )));
        };
        let tag = tag.trim();
        let value = value.trim();

        match stanza {
            Stanza::Header => {
                document
                    .header
                    .entry(tag.to_string())
                    .or_insert_with(|| value.to_string());
            }
            Stanza::Other => {}
            Stanza::Term => {
                if let Some((_, term)) = current.as_mut() {
                    apply_term_tag(term, tag, value, line_no)?;
                }
            }
        }
    }
    finish_term(&mut document, current.take())?;
    Ok(document)
}

fn finish_term(document: &mut OboDocument, current: Option<(usize, OboTerm)>) -> Result<()> {
    let Some((line_no, term)) = current else {
        return Ok(());
    };
    if term.id.is_empty() {
        return Err(CvError::OntologyLoad(format!(
            "obo [Term] stanza starting at line {line_no} has no id"
        )));
    }
    document.terms.push(term);
    Ok(())
}

fn apply_term_tag(term: &mut OboTerm, tag: &str, value: &str, line_no: usize) -> Result<()> {
    match tag {
        "id" => term.id = strip_trailing_comment(value).to_string(),
        "name" => term.name = Some(value.to_string()),
        "synonym" | "exact_synonym" | "related_synonym" => {
            if let Some(text) = quoted_text(value) {
                term.synonyms.push(text);
            }
        }
        "is_a" => push_parent(term, strip_trailing_comment(value), line_no)?,
        "relationship" => {
            let mut parts = strip_trailing_comment(value).split_whitespace();
            if let (Some(kind), Some(target)) = (parts.next(), parts.next())
                && PARENT_RELATIONSHIPS.contains(&kind)
            {
                push_parent(term, target, line_no)?;
            }
        }
        "is_obsolete" => term.obsolete = value.eq_ignore_ascii_case("true"),
        _ => {}
    }
    Ok(())
}

fn push_parent(term: &mut OboTerm, target: &str, line_no: usize) -> Result<()> {
    let target = target.split_whitespace().next().unwrap_or_default();
    if target.is_empty() {
        return Err(CvError::OntologyLoad(format!(
            "obo line {line_no}: relationship without a target accession"
        )));
    }
    if !term.parents.iter().any(|parent| parent == target) {
        term.parents.push(target.to_string());
    }
    Ok(())
}

fn strip_trailing_comment(value: &str) -> &str {
    value
        .split_once(" !")
        .map_or(value, |(head, _)| head)
        .trim()
}

fn quoted_text(value: &str) -> Option<String> {
    let rest = value.strip_prefix('"')?;
    let mut text = String::new();
    let mut escaped = false;
    for ch in rest.chars() {
        match (escaped, ch) {
            (true, _) => {
                text.push(ch);
                escaped = false;
            }
            (false, '\\') => escaped = true,
            (false, '"') => return Some(text),
            (false, _) => text.push(ch),
        }
    }
    None
}
