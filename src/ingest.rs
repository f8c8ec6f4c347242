//! Ingestion coordinator
//!
//! Receives script-discovered events from both observation channels, runs
//! the scanner, and commits deduplicated deltas into the tab store. Scanning
//! happens outside the store lock; only the short append runs under it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{IngestError, StoreError};
use crate::scanner::{Scanner, ScriptFetchError, SecretFinding, TabRecord};
use crate::store::TabStore;

/// Where a passively discovered script's text comes from
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// Inline `<script>` body delivered with the event
    Inline { content: String },
    /// External script that must be fetched
    External { url: String },
}

/// A script-discovered event from the passive channel
#[derive(Debug, Clone)]
pub struct ScriptEvent {
    /// Tab the script appeared in; absent on malformed events
    pub tab_id: Option<u32>,
    /// Page the script was found on
    pub document_url: String,
    pub source: ScriptSource,
}

/// Ingestion coordinator
pub struct Ingestor {
    scanner: Arc<Scanner>,
    store: Arc<TabStore>,
    http: reqwest::Client,
}

impl Ingestor {
    /// Fails if the HTTP client cannot be built; falling back to a client
    /// without the configured fetch timeout is not acceptable
    pub fn new(
        scanner: Arc<Scanner>,
        store: Arc<TabStore>,
        fetch_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| IngestError::HttpClient(e.to_string()))?;
        Ok(Self {
            scanner,
            store,
            http,
        })
    }

    pub fn store(&self) -> &Arc<TabStore> {
        &self.store
    }

    /// Scan script text and commit new findings for a tab
    ///
    /// Append-only: findings already present (same matched text and source)
    /// are left untouched, so ingesting the same script twice, from either
    /// channel, changes nothing.
    pub async fn ingest(
        &self,
        tab_id: u32,
        script_text: &str,
        source_locator: &str,
    ) -> Result<TabRecord, IngestError> {
        let matches = self.scanner.scan(script_text);
        if !matches.is_empty() {
            tracing::info!(
                tab_id,
                source = source_locator,
                count = matches.len(),
                "Secrets matched in script"
            );
        }

        let source_locator = source_locator.to_string();
        let record = self
            .store
            .update(tab_id, move |record| {
                for m in matches {
                    record.push_finding(SecretFinding {
                        secret_type: m.secret_type,
                        severity: m.severity,
                        matched_text: m.matched_text,
                        source_locator: source_locator.clone(),
                        discovered_at: Utc::now(),
                    });
                }
            })
            .await?;
        Ok(record)
    }

    /// Record a failed fetch of an external script, replacing any prior
    /// error for the same URL
    pub async fn record_fetch_error(
        &self,
        tab_id: u32,
        script_url: &str,
        error: &str,
    ) -> Result<TabRecord, StoreError> {
        tracing::warn!(tab_id, url = script_url, error, "Script fetch failed");
        let entry = ScriptFetchError {
            script_url: script_url.to_string(),
            error: error.to_string(),
        };
        self.store
            .update(tab_id, move |record| record.push_error(entry))
            .await
    }

    /// Handle a passive-channel event end to end
    ///
    /// Malformed events are dropped with a diagnostic. While instrumentation
    /// is active for the tab, passive reports are ignored: the instrumented
    /// channel observes a strict superset of them.
    pub async fn handle_script_event(&self, event: ScriptEvent) -> Result<(), IngestError> {
        let Some(tab_id) = event.tab_id else {
            tracing::warn!(
                document_url = event.document_url,
                "Dropping script event without tab id"
            );
            return Err(IngestError::MissingTabId);
        };

        if let Some(record) = self.store.read(tab_id).await? {
            if record.instrumentation_active {
                tracing::debug!(tab_id, "Instrumentation active, ignoring passive report");
                return Ok(());
            }
        }

        match event.source {
            ScriptSource::Inline { content } => {
                self.ingest(tab_id, &content, &event.document_url).await?;
            }
            ScriptSource::External { url } => {
                match self.fetch_script(&url).await {
                    Ok(body) => {
                        self.ingest(tab_id, &body, &url).await?;
                    }
                    Err(e) => {
                        // never fatal, surfaced for operator visibility only
                        self.record_fetch_error(tab_id, &url, &e.to_string())
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn fetch_script(&self, url: &str) -> Result<String, reqwest::Error> {
        tracing::debug!(url, "Fetching external script");
        let response = self.http.get(url).send().await?.error_for_status()?;
        response.text().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::scanner::SecretType;

    fn ingestor() -> Ingestor {
        let store = Arc::new(TabStore::new(Arc::new(MemoryBackend::new())));
        Ingestor::new(Arc::new(Scanner::new()), store, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_ingestor_builds_with_fetch_timeout() {
        let store = Arc::new(TabStore::new(Arc::new(MemoryBackend::new())));
        let built = Ingestor::new(Arc::new(Scanner::new()), store, Duration::from_millis(250));
        assert!(built.is_ok());
    }

    const STRIPE_SNIPPET: &str = r#"const k = "sk_test_51H8L9fJyKzNmJqS7QkV4Kq3";"#;

    #[tokio::test]
    async fn test_ingest_commits_findings() {
        let ingestor = ingestor();
        let record = ingestor
            .ingest(1, STRIPE_SNIPPET, "https://page/app.js")
            .await
            .unwrap();
        assert_eq!(record.findings.len(), 1);
        assert_eq!(
            record.findings[0].secret_type,
            SecretType::StripeAccessToken
        );
        assert_eq!(record.findings[0].source_locator, "https://page/app.js");
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let ingestor = ingestor();
        ingestor
            .ingest(1, STRIPE_SNIPPET, "https://page/app.js")
            .await
            .unwrap();
        let record = ingestor
            .ingest(1, STRIPE_SNIPPET, "https://page/app.js")
            .await
            .unwrap();
        assert_eq!(record.findings.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_password_stores_one_finding() {
        let ingestor = ingestor();
        ingestor
            .ingest(1, r#"password: "hello""#, "https://page")
            .await
            .unwrap();
        let record = ingestor
            .ingest(1, r#"password: "hello""#, "https://page")
            .await
            .unwrap();
        assert_eq!(record.findings.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_channel_dedup() {
        // same secret, same source locator, once per channel path
        let ingestor = ingestor();
        ingestor
            .handle_script_event(ScriptEvent {
                tab_id: Some(1),
                document_url: "https://page".into(),
                source: ScriptSource::Inline {
                    content: STRIPE_SNIPPET.into(),
                },
            })
            .await
            .unwrap();
        // instrumented channel reports ingest directly
        let record = ingestor.ingest(1, STRIPE_SNIPPET, "https://page").await.unwrap();
        assert_eq!(record.findings.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ingests_both_land() {
        let ingestor = Arc::new(ingestor());
        let a = {
            let ingestor = ingestor.clone();
            tokio::spawn(async move {
                ingestor
                    .ingest(1, STRIPE_SNIPPET, "https://page/a.js")
                    .await
                    .unwrap();
            })
        };
        let b = {
            let ingestor = ingestor.clone();
            tokio::spawn(async move {
                ingestor
                    .ingest(1, r#"password: "hunter22""#, "https://page/b.js")
                    .await
                    .unwrap();
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        let record = ingestor.store().read(1).await.unwrap().unwrap();
        assert_eq!(record.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_tab_id_dropped_without_state() {
        let ingestor = ingestor();
        let result = ingestor
            .handle_script_event(ScriptEvent {
                tab_id: None,
                document_url: "https://page".into(),
                source: ScriptSource::Inline {
                    content: STRIPE_SNIPPET.into(),
                },
            })
            .await;
        assert!(matches!(result, Err(IngestError::MissingTabId)));
    }

    #[tokio::test]
    async fn test_passive_report_ignored_while_instrumented() {
        let ingestor = ingestor();
        ingestor
            .store()
            .update(1, |r| r.instrumentation_active = true)
            .await
            .unwrap();

        ingestor
            .handle_script_event(ScriptEvent {
                tab_id: Some(1),
                document_url: "https://page".into(),
                source: ScriptSource::Inline {
                    content: STRIPE_SNIPPET.into(),
                },
            })
            .await
            .unwrap();

        let record = ingestor.store().read(1).await.unwrap().unwrap();
        assert!(record.findings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_recorded_once_per_url() {
        let ingestor = ingestor();
        ingestor
            .record_fetch_error(1, "https://x/y.js", "timeout")
            .await
            .unwrap();
        let record = ingestor
            .record_fetch_error(1, "https://x/y.js", "connection refused")
            .await
            .unwrap();
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.errors[0].error, "connection refused");
    }

    #[tokio::test]
    async fn test_unreachable_url_maps_to_fetch_error() {
        let ingestor = ingestor();
        ingestor
            .handle_script_event(ScriptEvent {
                tab_id: Some(2),
                document_url: "https://page".into(),
                source: ScriptSource::External {
                    // reserved TEST-NET address, nothing listens here
                    url: "http://192.0.2.1:9/app.js".into(),
                },
            })
            .await
            .unwrap();

        let record = ingestor.store().read(2).await.unwrap().unwrap();
        assert!(record.findings.is_empty());
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.errors[0].script_url, "http://192.0.2.1:9/app.js");
    }
}
