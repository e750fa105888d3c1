use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;

use cvmap_core::config::CvConfig;
use cvmap_core::error::{CvError, Result};
use cvmap_core::graph::{FileOntology, OntologyGraph};
use cvmap_core::manager::CvRuleManager;
use cvmap_core::mapping::{CvMapping, load_catalog, load_mapping, read_document};
use cvmap_core::message::{MessageLevel, ValidationMessage};
use cvmap_core::path::{JsonPathEvaluator, PathEvaluator};
use cvmap_core::registry::OntologyRegistry;
use cvmap_core::rule::{Combinator, CvRule, CvTerm, EvaluationContext, Requirement};
use serde_json::{Value, json};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_registry() -> Arc<OntologyRegistry> {
    let catalog = load_catalog(&fixture_path("ontologies.toml")).expect("catalog");
    let mut registry = OntologyRegistry::new(CvConfig::default());
    let messages = registry.load(&catalog.ontologies);
    assert!(messages.is_empty(), "{messages:?}");
    Arc::new(registry)
}

fn fixture_manager() -> CvRuleManager {
    let mapping = load_mapping(&fixture_path("mapping.yaml")).expect("mapping");
    CvRuleManager::for_json(mapping, fixture_registry())
}

fn mi_rule(combinator: Combinator, terms: Vec<CvTerm>) -> CvRule {
    CvRule {
        id: "method".to_string(),
        name: None,
        scope_path: "/interaction".to_string(),
        element_path: "/interaction/method".to_string(),
        terms,
        combinator,
        requirement: Requirement::Must,
    }
}

fn single_rule_manager(rule: CvRule) -> CvRuleManager {
    CvRuleManager::for_json(
        CvMapping {
            rules: vec![rule],
            ..CvMapping::default()
        },
        fixture_registry(),
    )
}

fn levels(messages: &[ValidationMessage]) -> Vec<MessageLevel> {
    messages.iter().map(|message| message.level).collect()
}

#[test]
fn fixture_mapping_self_check_then_validates_document() {
    let mut manager = fixture_manager();
    let pruned = manager.check_cv_mapping().expect("self-check");
    assert_eq!(pruned.len(), 1, "{pruned:?}");
    assert_eq!(pruned[0].rule_id(), Some("method-name"));
    assert!(pruned[0].text.contains("MI:0040"));
    assert_eq!(manager.rules().len(), 3);

    let document: Value = read_document(&fixture_path("interaction.json")).expect("document");
    let messages = manager.check(&document).expect("check");
    assert_eq!(
        levels(&messages),
        vec![
            MessageLevel::Error,
            MessageLevel::Warn,
            MessageLevel::Warn,
            MessageLevel::Info
        ],
        "{messages:?}"
    );
    assert_eq!(messages[0].context.as_deref(), Some("/entry/interaction"));
    assert!(messages[0].text.contains("[MI:0001, MI:0500]"));

    // Roles are counted over all three participants of both interactions.
    assert_eq!(messages[1].rule_id(), Some("participant-role"));
    assert!(messages[1].text.contains("do not satisfy XOR"));
    assert!(messages[2].text.contains("matched 2 values"));
    assert!(messages[3].text.contains("Y2H"));
    assert!(manager.rule_status_report().expect("report").is_empty());
}

#[test]
fn xor_outcomes_for_one_both_and_neither() {
    let manager = single_rule_manager(mi_rule(
        Combinator::Xor,
        vec![CvTerm::new("MI", "MI:0496"), CvTerm::new("MI", "MI:0498")],
    ));
    let only_a = json!({ "interaction": { "method": "MI:0496" } });
    let both = json!({ "interaction": { "method": ["MI:0496", "MI:0498"] } });
    let neither = json!({ "interaction": { "method": "MI:0018" } });

    assert!(manager.check(&only_a).expect("only a").is_empty());
    assert_eq!(manager.check(&both).expect("both").len(), 1);
    assert_eq!(manager.check(&neither).expect("neither").len(), 1);
}

#[test]
fn and_requires_every_term() {
    let manager = single_rule_manager(mi_rule(
        Combinator::And,
        vec![CvTerm::new("MI", "MI:0496"), CvTerm::new("MI", "MI:0498")],
    ));
    let both = json!({ "interaction": { "method": ["MI:0496", "MI:0498"] } });
    let one = json!({ "interaction": { "method": ["MI:0496"] } });
    assert!(manager.check(&both).expect("both").is_empty());
    assert_eq!(manager.check(&one).expect("one").len(), 1);
}

#[test]
fn non_repeatable_term_matched_twice_yields_one_message() {
    let manager = single_rule_manager(mi_rule(
        Combinator::Or,
        vec![CvTerm::new("MI", "MI:0001").with_children(true, false).not_repeatable()],
    ));
    let doc = json!({ "interaction": { "method": ["MI:0018", "MI:0019"] } });
    let messages = manager.check(&doc).expect("check");
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].text.contains("only once"));
}

#[test]
fn pruning_counts_messages_per_term_and_rule() {
    let mut one_obsolete = single_rule_manager(mi_rule(
        Combinator::Or,
        vec![CvTerm::new("MI", "MI:0018"), CvTerm::new("MI", "MI:0040")],
    ));
    assert_eq!(one_obsolete.check_cv_mapping().expect("self-check").len(), 1);
    assert_eq!(one_obsolete.rules()[0].terms.len(), 1);

    let mut stale = OntologyRegistry::default();
    let raw = std::fs::read_to_string(fixture_path("mi_mini.obo")).expect("read")
        + "\n[Term]\nid: MI:0041\nname: electron tomography\nis_a: MI:0013\nis_obsolete: true\n";
    stale.insert(OntologyGraph::File(
        FileOntology::from_obo_str("MI", &raw, true).expect("graph"),
    ));
    let mut both_obsolete = CvRuleManager::for_json(
        CvMapping {
            rules: vec![mi_rule(
                Combinator::Or,
                vec![CvTerm::new("MI", "MI:0040"), CvTerm::new("MI", "MI:0041")],
            )],
            ..CvMapping::default()
        },
        Arc::new(stale),
    );
    assert_eq!(both_obsolete.check_cv_mapping().expect("self-check").len(), 3);
    assert!(both_obsolete.rules().is_empty());
}

/// Blocks the first `evaluate` call until released, to hold a rule in flight.
#[derive(Debug)]
struct PausingEvaluator {
    inner: JsonPathEvaluator,
    armed: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl PathEvaluator for PausingEvaluator {
    fn evaluate(&self, path: &str, object: &Value) -> Result<Vec<Value>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Ok(entered) = self.entered.lock() {
                let _ = entered.send(());
            }
            if let Ok(release) = self.release.lock() {
                let _ = release.recv();
            }
        }
        self.inner.evaluate(path, object)
    }

    fn check_structure(&self, path: &str, object: &Value) -> Result<Option<String>> {
        self.inner.check_structure(path, object)
    }
}

#[test]
fn overlapping_check_on_same_context_is_rejected() {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let paths = Arc::new(PausingEvaluator {
        inner: JsonPathEvaluator,
        armed: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let manager = Arc::new(CvRuleManager::new(
        CvMapping {
            rules: vec![mi_rule(Combinator::Or, vec![CvTerm::new("MI", "MI:0018")])],
            ..CvMapping::default()
        },
        fixture_registry(),
        paths.clone(),
    ));
    let doc = json!({ "interaction": { "method": "MI:0018" } });

    paths.armed.store(true, Ordering::SeqCst);
    let first = {
        let manager = Arc::clone(&manager);
        let doc = doc.clone();
        thread::spawn(move || manager.check(&doc))
    };
    entered_rx.recv().expect("first check paused");

    let err = manager.check(&doc).expect_err("overlapping check");
    assert!(matches!(err, CvError::ReentrantEvaluation(rule) if rule == "method"));

    let separate = EvaluationContext::new();
    assert!(manager.check_in(&separate, &doc, None).expect("own context").is_empty());

    release_tx.send(()).expect("release");
    let messages = first.join().expect("join").expect("first check");
    assert!(messages.is_empty());
    assert!(manager.check(&doc).expect("after release").is_empty());
}
