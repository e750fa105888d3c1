use std::path::PathBuf;

use clap::Parser;

use super::{Cli, Commands};

#[test]
fn validate_parses_documents_and_flags() {
    let cli = Cli::try_parse_from([
        "cvmap",
        "validate",
        "--config",
        "ontologies.toml",
        "--mapping",
        "mapping.yaml",
        "--prefix",
        "/entry",
        "--enforce",
        "a.json",
        "b.yaml",
    ])
    .expect("parse");
    let Commands::Validate(args) = cli.command else {
        panic!("expected validate");
    };
    assert_eq!(args.mapping.catalog.config, PathBuf::from("ontologies.toml"));
    assert_eq!(args.mapping.mapping, PathBuf::from("mapping.yaml"));
    assert_eq!(args.prefix.as_deref(), Some("/entry"));
    assert!(args.enforce);
    assert!(!args.report_rules);
    assert_eq!(args.documents.len(), 2);
}

#[test]
fn validate_requires_at_least_one_document() {
    let err = Cli::try_parse_from([
        "cvmap",
        "validate",
        "--config",
        "ontologies.toml",
        "--mapping",
        "mapping.yaml",
    ])
    .expect_err("documents are required");
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn self_check_requires_mapping() {
    assert!(Cli::try_parse_from(["cvmap", "self-check", "--config", "o.toml"]).is_err());
    let cli = Cli::try_parse_from([
        "cvmap",
        "self-check",
        "--config",
        "o.toml",
        "--mapping",
        "m.json",
        "--no-synonyms",
    ])
    .expect("parse");
    assert!(matches!(
        cli.command,
        Commands::SelfCheck(args) if args.catalog.no_synonyms
    ));
}
