//! Architectural Enforcement Integration Tests
//!
//! Source-level checks that keep production code honest:
//! - No sleep calls (the session waits on I/O, never on a clock)
//! - No `unwrap()` / `expect(` outside tests (errors propagate or get logged)
//!
//! The scanners here are shared by the tests in `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees checked by the policies
pub const PRODUCTION_DIRS: &[&str] = &["parley/core/src", "parley/cli/src"];

/// A line that breaks a policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Trimmed line text
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this package
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Lines that belong to production code, with their 1-based numbers
///
/// Comment text is stripped, and scanning stops at the first
/// `#[cfg(test)]`: test modules live at the bottom of each file.
#[must_use]
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        let code = line.split("//").next().unwrap_or(line);
        lines.push((idx + 1, code));
    }
    lines
}

/// Scan one file for lines matching `forbidden`
pub fn check_file<F>(path: &Path, forbidden: &F, violations: &mut Vec<Violation>)
where
    F: Fn(&str) -> bool,
{
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    for (line, code) in production_lines(&content) {
        if forbidden(code) {
            violations.push(Violation {
                path: path.to_path_buf(),
                line,
                text: code.trim().to_string(),
            });
        }
    }
}

/// Scan every `.rs` file under `dir`
pub fn check_directory<F>(dir: &Path, forbidden: &F, violations: &mut Vec<Violation>)
where
    F: Fn(&str) -> bool,
{
    if !dir.exists() {
        return;
    }

    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            check_file(entry.path(), forbidden, violations);
        }
    }
}

/// Scan all production trees
#[must_use]
pub fn scan_production<F>(forbidden: F) -> Vec<Violation>
where
    F: Fn(&str) -> bool,
{
    let root = workspace_root();
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        check_directory(&root.join(dir), &forbidden, &mut violations);
    }
    violations
}

/// Sleep calls of any flavor
#[must_use]
pub fn is_sleep_call(code: &str) -> bool {
    code.contains("::sleep(") || code.contains(".sleep(")
}

/// Panicking unwraps
#[must_use]
pub fn is_panicking_unwrap(code: &str) -> bool {
    code.contains(".unwrap()") || code.contains(".expect(")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_tests() {
        let content = "fn a() {}\n// x.unwrap()\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
        let lines = production_lines(content);
        assert_eq!(lines, vec![(1, "fn a() {}")]);
    }

    #[test]
    fn test_trailing_comment_ignored() {
        let lines = production_lines("let x = y; // y.unwrap() is banned\n");
        assert!(!is_panicking_unwrap(lines[0].1));
    }

    #[test]
    fn test_detectors() {
        assert!(is_sleep_call("tokio::time::sleep(d).await;"));
        assert!(is_sleep_call("std::thread::sleep(d);"));
        assert!(!is_sleep_call("let asleep = true;"));

        assert!(is_panicking_unwrap("let v = r.unwrap();"));
        assert!(is_panicking_unwrap("let v = r.expect(\"msg\");"));
        assert!(!is_panicking_unwrap("let v = r.unwrap_or_default();"));
        assert!(!is_panicking_unwrap("let v = r.unwrap_or_else(|_| 0);"));
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }
}
