//! Secret pattern catalog
//!
//! Ordered from most specific to most generic. Ordering matters: when two
//! patterns could match overlapping text, the earlier entry claims the range,
//! so a vendor token embedded in an `api_key = "..."` assignment is reported
//! as the vendor token, not as a generic API key.

use regex::Regex;

use super::findings::{SecretType, Severity};

/// A compiled detection pattern
#[derive(Debug)]
pub struct PatternDefinition {
    /// Type reported for matches of this pattern
    pub secret_type: SecretType,

    /// Severity attached to matches
    pub severity: Severity,

    /// The detector regex
    pub matcher: Regex,

    /// Candidates matching this are discarded as known false positives
    pub ignore_filter: Option<Regex>,
}

/// Raw catalog: (type, severity, matcher, ignore filter)
///
/// The generic `api_key` / `password` entries stay last. Their ignore filters
/// suppress the `".concat(` string-building idiom and values that merely
/// repeat the field name as a placeholder.
const CATALOG: &[(SecretType, Severity, &str, Option<&str>)] = &[
    (
        SecretType::PrivateKey,
        Severity::High,
        r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
        None,
    ),
    (
        SecretType::StripeAccessToken,
        Severity::High,
        r"(?:sk|rk)_(?:test|live|prod)_[a-zA-Z0-9]{24}",
        None,
    ),
    (
        SecretType::SlackBotToken,
        Severity::High,
        r"xoxb-[0-9]{11}-[0-9]{11}-[a-zA-Z0-9]{24}",
        None,
    ),
    (
        SecretType::AwsAccessKey,
        Severity::High,
        r"(?:A3T[A-Z0-9]|AKIA|ASIA|ABIA|ACCA)[A-Z2-7]{16}",
        None,
    ),
    (
        SecretType::GoogleApiKey,
        Severity::High,
        r"AIza[0-9A-Za-z\-_]{35}",
        None,
    ),
    (
        SecretType::AnthropicApiKey,
        Severity::High,
        r"sk-ant-api[0-9]{2}-[a-zA-Z0-9_-]{94}",
        None,
    ),
    (
        SecretType::OpenAiApiKey,
        Severity::High,
        r"sk-[a-zA-Z0-9]{20}T3BlbkFJ[a-zA-Z0-9]{20}",
        None,
    ),
    (
        SecretType::GitHubToken,
        Severity::High,
        r"(?:ghu|ghs|ghp|gho)_[0-9a-zA-Z]{36}",
        None,
    ),
    (
        SecretType::GitHubFineGrainedPat,
        Severity::High,
        r"github_pat_\w{82}",
        None,
    ),
    // generic patterns below
    (
        SecretType::ApiKey,
        Severity::Medium,
        r#"(?i)api[_-]?key\s*[:=]\s*['"][^'"]{6,}['"]"#,
        Some(r#"(?i)['"]((\))?\.concat\(|.*api[_-]?key)"#),
    ),
    (
        SecretType::Password,
        Severity::Medium,
        r#"(?i)passw(or)?d\s*[:=]\s*['"][^'"\n]{4,60}['"]"#,
        Some(r#"(?i)['"]([^'"]*password['"]|(\))?\.concat\()"#),
    ),
];

/// Compile the built-in catalog
///
/// Patterns are static and known-good; one failing to compile is a
/// programming error caught by the catalog test, so it is skipped here
/// rather than propagated.
pub fn catalog() -> Vec<PatternDefinition> {
    CATALOG
        .iter()
        .filter_map(|(secret_type, severity, matcher, ignore)| {
            let matcher = Regex::new(matcher).ok()?;
            let ignore_filter = ignore.and_then(|p| Regex::new(p).ok());
            Some(PatternDefinition {
                secret_type: *secret_type,
                severity: *severity,
                matcher,
                ignore_filter,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(catalog().len(), CATALOG.len());
        for (_, _, _, ignore) in CATALOG {
            if let Some(p) = ignore {
                assert!(Regex::new(p).is_ok(), "ignore filter failed: {p}");
            }
        }
    }

    #[test]
    fn test_specific_patterns_precede_generic() {
        let patterns = catalog();
        let api_key_pos = patterns
            .iter()
            .position(|p| p.secret_type == SecretType::ApiKey)
            .unwrap();
        let stripe_pos = patterns
            .iter()
            .position(|p| p.secret_type == SecretType::StripeAccessToken)
            .unwrap();
        assert!(stripe_pos < api_key_pos);
    }

    #[test]
    fn test_no_pattern_matches_empty() {
        for p in catalog() {
            assert!(!p.matcher.is_match(""), "{:?} matches empty", p.secret_type);
        }
    }
}
