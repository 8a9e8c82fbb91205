//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code
//! - The core crate stays free of terminal and UI frameworks
//!
//! The helpers here locate workspace sources and strip what the rules should
//! not look at (comments, `#[cfg(test)]` modules).

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories checked by every rule
pub const PRODUCTION_DIRS: &[&str] = &["coach/core/src", "coach/cli/src"];

/// Workspace root (two levels above this package)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
#[must_use]
pub fn rust_sources(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Production lines of a source file as `(line_number, code)` pairs
///
/// Stops at the first `#[cfg(test)]` and drops `//` comments.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| (idx + 1, code_part(line).to_string()))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// The part of a line before a `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Names declared in the `[dependencies]` table of a manifest
#[must_use]
pub fn dependency_names(manifest: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_dependencies = false;

    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            names.push(name.trim().to_string());
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(5)"), "let x = 1; ");
        assert_eq!(code_part("// tokio::time::sleep"), "");
    }

    #[test]
    fn test_dependency_names() {
        let manifest = r#"
[package]
name = "demo"

[dependencies]
# Runtime
tokio = { version = "1", features = ["full"] }
serde = "1.0"

[dev-dependencies]
ratatui = "0.29"
"#;
        assert_eq!(dependency_names(manifest), vec!["tokio", "serde"]);
    }

    #[test]
    fn test_production_dirs_exist() {
        for dir in PRODUCTION_DIRS {
            assert!(
                workspace_root().join(dir).exists(),
                "missing production dir {dir}"
            );
        }
    }
}
