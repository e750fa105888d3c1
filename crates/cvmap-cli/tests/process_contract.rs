use std::fs;
use std::process::Command;
use std::{env, path::PathBuf};

use tempfile::tempdir;

fn cli_bin_path() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_cvmap") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .expect("workspace root");
    let bin_name = if cfg!(windows) { "cvmap.exe" } else { "cvmap" };
    let fallback = workspace_root.join("target").join("debug").join(bin_name);
    assert!(
        fallback.exists(),
        "cvmap binary not found at {}",
        fallback.display()
    );
    fallback
}

fn write_inputs(root: &std::path::Path) {
    fs::write(
        root.join("mi.obo"),
        "[Term]\nid: MI:0001\nname: interaction detection method\n\n[Term]\nid: MI:0018\nname: two hybrid\nis_a: MI:0001\n",
    )
    .expect("write obo");
    fs::write(
        root.join("ontologies.toml"),
        "[[ontology]]\nid = \"MI\"\nlocator = \"mi.obo\"\n",
    )
    .expect("write catalog");
    fs::write(
        root.join("mapping.json"),
        r#"{"rules": [{"id": "method", "scope_path": "/interaction", "element_path": "/interaction/method", "requirement": "MUST", "terms": [{"ontology": "MI", "accession": "MI:0018"}]}]}"#,
    )
    .expect("write mapping");
    fs::write(root.join("good.json"), r#"{"interaction": {"method": "MI:0018"}}"#)
        .expect("write good document");
    fs::write(root.join("bad.json"), r#"{"interaction": {"method": "MI:0001"}}"#)
        .expect("write bad document");
}

#[test]
fn validate_process_contract_emits_json_report() {
    // Given a one-rule mapping over a local term file
    // When running `cvmap validate` on a conforming document
    // Then the process succeeds and prints a JSON report without errors.
    let root = tempdir().expect("tempdir");
    write_inputs(root.path());
    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .args([
            "validate",
            "--config",
            "ontologies.toml",
            "--mapping",
            "mapping.json",
            "good.json",
        ])
        .output()
        .expect("run validate");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["errors"], 0);
    assert_eq!(report["documents"][0]["document"], "good.json");
}

#[test]
fn validate_enforce_process_contract_returns_non_zero_on_errors() {
    // Given a document whose value is outside the rule's term set
    // When running `cvmap validate --enforce`
    // Then the process exits non-zero and names the failure.
    let root = tempdir().expect("tempdir");
    write_inputs(root.path());
    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .args([
            "validate",
            "--config",
            "ontologies.toml",
            "--mapping",
            "mapping.json",
            "--enforce",
            "bad.json",
        ])
        .output()
        .expect("run validate enforce");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("validation failed"), "stderr: {stderr}");
}

#[test]
fn ontologies_process_contract_reports_term_counts() {
    let root = tempdir().expect("tempdir");
    write_inputs(root.path());
    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .args(["ontologies", "--config", "ontologies.toml"])
        .output()
        .expect("run ontologies");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["ontologies"][0]["id"], "MI");
    assert_eq!(report["ontologies"][0]["term_count"], 2);
    assert_eq!(report["ontologies"][0]["up_to_date"], true);
}
