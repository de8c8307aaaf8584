//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code MUST NOT call sleep. The session loop waits
//! on input; handlers bound their I/O with timeouts, not pauses.
//! **Exceptions**: test modules.

use architectural_enforcement::{is_sleep_call, scan_production};

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan_production(is_sleep_call);

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::time::timeout around the I/O you are waiting on.");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}
