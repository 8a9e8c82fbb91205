//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. Streaming waits on
//! the transport and on the cancellation token, never on a timer.
//! **Exceptions**: test code (`#[cfg(test)]` modules and `tests/` directories)

use architectural_enforcement::{production_lines, rust_sources, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ Instead:");
        eprintln!("  - Await the next chunk from the transport");
        eprintln!("  - Await CancellationToken::cancelled()");
        eprintln!("  - Await watch::Receiver::changed() for snapshots");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all sleep() calls in production code
fn find_sleep_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_sources(dir) {
            for (line_number, code) in production_lines(&path) {
                if is_sleep_call(&code) {
                    violations.push(format!(
                        "{}:{} - {}",
                        path.display(),
                        line_number,
                        code.trim()
                    ));
                }
            }
        }
    }

    violations
}

fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(")
}

#[test]
fn test_sleep_detection() {
    assert!(is_sleep_call(
        "    tokio::time::sleep(Duration::from_millis(10)).await;"
    ));
    assert!(is_sleep_call("std::thread::sleep(delay);"));
    assert!(!is_sleep_call("let asleep = false;"));
}
