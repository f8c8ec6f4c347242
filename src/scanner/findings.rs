//! Secret findings and per-tab state records

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for findings
///
/// Coarse triage hint used only for presentation priority, never for
/// suppressing a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

/// Types of secrets the catalog can detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretType {
    PrivateKey,
    StripeAccessToken,
    SlackBotToken,
    AwsAccessKey,
    GoogleApiKey,
    AnthropicApiKey,
    OpenAiApiKey,
    GitHubToken,
    GitHubFineGrainedPat,
    ApiKey,
    Password,
}

impl SecretType {
    pub fn name(&self) -> &'static str {
        match self {
            SecretType::PrivateKey => "Private Key",
            SecretType::StripeAccessToken => "Stripe Access Token",
            SecretType::SlackBotToken => "Slack Bot Token",
            SecretType::AwsAccessKey => "AWS Access Key",
            SecretType::GoogleApiKey => "Google API Key",
            SecretType::AnthropicApiKey => "Anthropic API Key",
            SecretType::OpenAiApiKey => "OpenAI API Key",
            SecretType::GitHubToken => "GitHub Token",
            SecretType::GitHubFineGrainedPat => "GitHub Fine-Grained PAT",
            SecretType::ApiKey => "API Key",
            SecretType::Password => "Password",
        }
    }
}

/// A secret found in script text, bound to the tab where it was seen
///
/// Immutable once created. Two findings with equal `matched_text` and
/// `source_locator` are the same finding no matter which channel or script
/// fetch produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretFinding {
    /// Type of secret
    pub secret_type: SecretType,

    /// Severity level
    pub severity: Severity,

    /// The matched secret text
    pub matched_text: String,

    /// Where the script came from (script URL, or document URL for inline)
    pub source_locator: String,

    /// When the finding was first committed
    pub discovered_at: DateTime<Utc>,
}

impl SecretFinding {
    /// Uniqueness key: (matched_text, source_locator)
    pub fn key(&self) -> (&str, &str) {
        (&self.matched_text, &self.source_locator)
    }
}

/// A failed attempt to retrieve an external script body
///
/// Unique per script URL; the most recent error wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFetchError {
    pub script_url: String,
    pub error: String,
}

/// Per-tab aggregate of everything observed so far
///
/// Created lazily on the first event for a tab, cleared (flag untouched) on
/// navigation start, deleted when the tab closes. Only the tab store mutates
/// it, through its serialized update entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabRecord {
    /// Whether the instrumented channel is attached to this tab
    pub instrumentation_active: bool,

    /// Findings in insertion order, unique by (matched_text, source_locator)
    pub findings: Vec<SecretFinding>,

    /// Fetch errors, unique by script URL
    pub errors: Vec<ScriptFetchError>,
}

impl TabRecord {
    /// True if a finding with the same uniqueness key is already present
    pub fn contains_finding(&self, matched_text: &str, source_locator: &str) -> bool {
        self.findings
            .iter()
            .any(|f| f.matched_text == matched_text && f.source_locator == source_locator)
    }

    /// Append a finding unless its key is already present
    pub fn push_finding(&mut self, finding: SecretFinding) -> bool {
        if self.contains_finding(&finding.matched_text, &finding.source_locator) {
            return false;
        }
        self.findings.push(finding);
        true
    }

    /// Record a fetch error, replacing any prior error for the same URL
    pub fn push_error(&mut self, error: ScriptFetchError) {
        if let Some(existing) = self
            .errors
            .iter_mut()
            .find(|e| e.script_url == error.script_url)
        {
            existing.error = error.error;
        } else {
            self.errors.push(error);
        }
    }

    /// Reset findings and errors for a navigation, keeping the
    /// instrumentation flag
    pub fn clear_results(&mut self) {
        self.findings.clear();
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(text: &str, source: &str) -> SecretFinding {
        SecretFinding {
            secret_type: SecretType::ApiKey,
            severity: Severity::Medium,
            matched_text: text.to_string(),
            source_locator: source.to_string(),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_finding_dedup_by_key() {
        let mut record = TabRecord::default();
        assert!(record.push_finding(finding("abc", "https://a/x.js")));
        assert!(!record.push_finding(finding("abc", "https://a/x.js")));
        // same text from a different source is a distinct finding
        assert!(record.push_finding(finding("abc", "https://b/y.js")));
        assert_eq!(record.findings.len(), 2);
    }

    #[test]
    fn test_error_replaced_per_url() {
        let mut record = TabRecord::default();
        record.push_error(ScriptFetchError {
            script_url: "https://x/y.js".into(),
            error: "timeout".into(),
        });
        record.push_error(ScriptFetchError {
            script_url: "https://x/y.js".into(),
            error: "404".into(),
        });
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.errors[0].error, "404");
    }

    #[test]
    fn test_clear_keeps_flag() {
        let mut record = TabRecord {
            instrumentation_active: true,
            ..Default::default()
        };
        record.push_finding(finding("abc", "src"));
        record.clear_results();
        assert!(record.findings.is_empty());
        assert!(record.errors.is_empty());
        assert!(record.instrumentation_active);
    }

    #[test]
    fn test_record_round_trips_in_order() {
        let mut record = TabRecord::default();
        for i in 0..5 {
            record.push_finding(finding(&format!("secret-{i}"), "src"));
        }
        let json = serde_json::to_string(&record).unwrap();
        let loaded: TabRecord = serde_json::from_str(&json).unwrap();
        let texts: Vec<_> = loaded
            .findings
            .iter()
            .map(|f| f.matched_text.as_str())
            .collect();
        assert_eq!(
            texts,
            ["secret-0", "secret-1", "secret-2", "secret-3", "secret-4"]
        );
    }
}
