//! Integration Test: Core UI Independence
//!
//! **Policy**: `coach-core` is pure client logic. It MUST NOT depend on, or
//! import, terminal or UI frameworks; those belong in front-end crates such as
//! `coach-cli`.

use std::fs;

use architectural_enforcement::{dependency_names, production_lines, rust_sources, workspace_root};

/// Crates that only a front end may use
const UI_CRATES: &[&str] = &[
    "ratatui",
    "crossterm",
    "termion",
    "cursive",
    "console",
    "indicatif",
    "dialoguer",
    "clap",
    "tracing-subscriber",
];

#[test]
fn test_core_manifest_has_no_ui_dependencies() {
    let manifest_path = workspace_root().join("coach/core/Cargo.toml");
    let manifest = fs::read_to_string(&manifest_path).unwrap();

    let offending: Vec<String> = dependency_names(&manifest)
        .into_iter()
        .filter(|name| UI_CRATES.contains(&name.as_str()))
        .collect();

    assert!(
        offending.is_empty(),
        "coach-core depends on UI crates: {offending:?}"
    );
}

#[test]
fn test_core_sources_import_no_ui_crates() {
    let mut violations = Vec::new();

    for path in rust_sources("coach/core/src") {
        for (line_number, code) in production_lines(&path) {
            for krate in UI_CRATES {
                let ident = krate.replace('-', "_");
                if code.contains(&format!("{ident}::")) {
                    violations.push(format!("{}:{} - {}", path.display(), line_number, code.trim()));
                }
            }
        }
    }

    assert!(
        violations.is_empty(),
        "UI crate usage in coach-core:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_core_does_not_print() {
    let mut violations = Vec::new();

    for path in rust_sources("coach/core/src") {
        for (line_number, code) in production_lines(&path) {
            if code.contains("println!") || code.contains("eprintln!") {
                violations.push(format!("{}:{} - {}", path.display(), line_number, code.trim()));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "coach-core writes to the terminal directly:\n{}",
        violations.join("\n")
    );
}
