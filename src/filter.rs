//! Presentation-side false-positive annotation
//!
//! Best-effort heuristics for findings that are almost certainly noise.
//! These never suppress or delete stored findings; callers decide how to
//! present annotated entries.

use crate::scanner::SecretFinding;

/// Source locator prefixes for scripts injected by browser extensions
const EXTENSION_PREFIXES: &[&str] = &["chrome-extension://", "moz-extension://"];

/// Returns None for findings that should be shown, and a short reason for
/// those that are likely false positives
pub fn false_positive_reason(finding: &SecretFinding) -> Option<&'static str> {
    if EXTENSION_PREFIXES
        .iter()
        .any(|prefix| finding.source_locator.starts_with(prefix))
    {
        return Some("extension");
    }
    None
}
