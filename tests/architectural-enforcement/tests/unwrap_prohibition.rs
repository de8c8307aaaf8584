//! Integration Test: Unwrap Prohibition
//!
//! **Policy**: production code propagates errors with `?` or logs them.
//! `.unwrap()` and `.expect(` are only allowed in tests, where a panic is
//! the failure report.

use architectural_enforcement::{is_panicking_unwrap, scan_production};

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = scan_production(is_panicking_unwrap);

    if !violations.is_empty() {
        eprintln!("\n❌ Panicking unwraps found in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        panic!(
            "\nFound {} unwrap/expect call(s) in production code.",
            violations.len()
        );
    }
}
