use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use super::run;
use crate::cli::{CatalogArgs, Commands, MappingArgs, ValidateArgs};

const MI_OBO: &str = "\
[Term]
id: MI:0001
name: interaction detection method

[Term]
id: MI:0018
name: two hybrid
is_a: MI:0001

[Term]
id: MI:0019
name: coimmunoprecipitation
is_a: MI:0001
";

const MAPPING_JSON: &str = r#"{
  "rules": [
    {
      "id": "method",
      "scope_path": "/interaction",
      "element_path": "/interaction/method",
      "requirement": "MUST",
      "terms": [
        { "ontology": "MI", "accession": "MI:0001", "allow_children": true, "use_term": false }
      ]
    }
  ]
}"#;

fn workspace() -> TempDir {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("mi.obo"), MI_OBO).expect("write obo");
    fs::write(
        temp.path().join("ontologies.yaml"),
        "ontologies:\n  - id: MI\n    locator: mi.obo\n",
    )
    .expect("write catalog");
    fs::write(temp.path().join("mapping.json"), MAPPING_JSON).expect("write mapping");
    temp
}

fn catalog_args(root: &Path) -> CatalogArgs {
    CatalogArgs {
        config: root.join("ontologies.yaml"),
        no_synonyms: false,
        service_url: None,
    }
}

fn mapping_args(root: &Path) -> MappingArgs {
    MappingArgs {
        catalog: catalog_args(root),
        mapping: root.join("mapping.json"),
    }
}

fn document(root: &Path, name: &str, method: &str) -> PathBuf {
    let path = root.join(name);
    fs::write(
        &path,
        format!(r#"{{ "interaction": {{ "method": "{method}" }} }}"#),
    )
    .expect("write document");
    path
}

#[test]
fn ontologies_and_self_check_succeed_on_valid_inputs() {
    let temp = workspace();
    run(Commands::Ontologies(catalog_args(temp.path()))).expect("ontologies");
    run(Commands::SelfCheck(mapping_args(temp.path()))).expect("self-check");
}

#[test]
fn validate_enforce_fails_only_on_error_messages() {
    let temp = workspace();
    let good = document(temp.path(), "good.json", "MI:0019");
    let bad = document(temp.path(), "bad.json", "MI:0001");

    run(Commands::Validate(ValidateArgs {
        mapping: mapping_args(temp.path()),
        documents: vec![good.clone()],
        prefix: None,
        enforce: true,
        report_rules: true,
    }))
    .expect("valid document passes");

    let err = run(Commands::Validate(ValidateArgs {
        mapping: mapping_args(temp.path()),
        documents: vec![good, bad],
        prefix: None,
        enforce: true,
        report_rules: false,
    }))
    .expect_err("must fail with enforce");
    assert!(format!("{err:#}").contains("validation failed: 1 error"));
}

#[test]
fn missing_mapping_file_is_reported_with_context() {
    let temp = workspace();
    let mut args = mapping_args(temp.path());
    args.mapping = temp.path().join("absent.json");
    let err = run(Commands::SelfCheck(args)).expect_err("missing mapping");
    assert!(format!("{err:#}").contains("failed to read mapping"));
}
