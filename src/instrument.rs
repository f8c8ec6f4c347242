//! Instrumentation session manager
//!
//! Governs per-tab attach/detach of the active observation channel and
//! routes its script-parsed events into ingestion. The channel itself
//! (transport, protocol version) lives behind [`InstrumentChannel`] so tests
//! can substitute a scripted fake.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::InstrumentError;
use crate::ingest::Ingestor;

/// Per-tab session state
///
/// `Inactive -> Starting -> Active -> Stopping -> Inactive`; terminal equals
/// initial, so sessions are re-entrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentState {
    #[default]
    Inactive,
    Starting,
    Active,
    Stopping,
}

/// A script-parsed notification from the instrumented channel
#[derive(Debug, Clone)]
pub struct ScriptParsedEvent {
    pub tab_id: u32,
    pub script_id: String,
    /// Absent for dynamically evaluated code
    pub url: Option<String>,
}

/// The active observation channel (debugger-style instrumentation)
#[async_trait]
pub trait InstrumentChannel: Send + Sync {
    /// Attach to a tab and enable script-parse notifications
    async fn attach(&self, tab_id: u32) -> Result<(), InstrumentError>;

    /// Detach from a tab; must be idempotent
    async fn detach(&self, tab_id: u32) -> Result<(), InstrumentError>;

    /// Request the source text of a parsed script
    async fn get_script_source(
        &self,
        tab_id: u32,
        script_id: &str,
    ) -> Result<String, InstrumentError>;
}

/// Locator recorded for scripts the channel observed without a URL
const INLINE_SCRIPT_LOCATOR: &str = "inline script";

/// Manages instrumentation sessions across tabs
pub struct SessionManager {
    channel: Arc<dyn InstrumentChannel>,
    ingestor: Arc<Ingestor>,
    states: Mutex<HashMap<u32, InstrumentState>>,
}

impl SessionManager {
    pub fn new(channel: Arc<dyn InstrumentChannel>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            channel,
            ingestor,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, tab_id: u32) -> InstrumentState {
        self.states.lock().get(&tab_id).copied().unwrap_or_default()
    }

    fn set_state(&self, tab_id: u32, state: InstrumentState) {
        if state == InstrumentState::Inactive {
            self.states.lock().remove(&tab_id);
        } else {
            self.states.lock().insert(tab_id, state);
        }
    }

    /// Start instrumenting a tab
    ///
    /// The record's flag is set only once the attach succeeded; a rejected
    /// attach leaves the session Inactive and surfaces the failure.
    pub async fn start(&self, tab_id: u32) -> Result<(), InstrumentError> {
        self.set_state(tab_id, InstrumentState::Starting);
        tracing::info!(tab_id, "Attaching instrumentation");

        if let Err(e) = self.channel.attach(tab_id).await {
            self.set_state(tab_id, InstrumentState::Inactive);
            tracing::warn!(tab_id, error = %e, "Instrumentation attach rejected");
            return Err(e);
        }

        if let Err(e) = self
            .ingestor
            .store()
            .update(tab_id, |record| record.instrumentation_active = true)
            .await
        {
            // the caller is told the start failed, so no channel may stay
            // live: roll the attach back and land at Inactive
            if let Err(detach_err) = self.channel.detach(tab_id).await {
                tracing::debug!(tab_id, error = %detach_err, "Detach after failed start");
            }
            self.set_state(tab_id, InstrumentState::Inactive);
            return Err(InstrumentError::AttachFailed {
                tab_id,
                reason: e.to_string(),
            });
        }

        self.set_state(tab_id, InstrumentState::Active);
        Ok(())
    }

    /// Stop instrumenting a tab
    pub async fn stop(&self, tab_id: u32) -> Result<(), InstrumentError> {
        self.set_state(tab_id, InstrumentState::Stopping);
        tracing::info!(tab_id, "Detaching instrumentation");

        // clear the flag before detaching so a late script-parse burst
        // cannot observe an active record with no live channel; a failed
        // commit still detaches and lands at Inactive so the machine stays
        // re-entrant
        let flag_cleared = self
            .ingestor
            .store()
            .update(tab_id, |record| record.instrumentation_active = false)
            .await
            .map(|_| ())
            .map_err(|e| InstrumentError::DetachFailed {
                tab_id,
                reason: e.to_string(),
            });

        let detached = self.channel.detach(tab_id).await;
        self.set_state(tab_id, InstrumentState::Inactive);
        flag_cleared?;
        detached
    }

    /// The channel was torn down externally (navigation away from a
    /// debuggable context, user closed the tool)
    pub async fn on_detached(&self, tab_id: u32) {
        tracing::info!(tab_id, "Instrumentation channel detached externally");
        self.set_state(tab_id, InstrumentState::Inactive);
        if let Err(e) = self
            .ingestor
            .store()
            .update(tab_id, |record| record.instrumentation_active = false)
            .await
        {
            tracing::error!(tab_id, error = %e, "Failed to clear instrumentation flag");
        }
    }

    /// Route a script-parsed event into ingestion
    ///
    /// Events for tabs without an Active session are dropped; a failed
    /// source request is logged and mutates nothing.
    pub async fn on_script_parsed(&self, event: ScriptParsedEvent) {
        if self.state(event.tab_id) != InstrumentState::Active {
            tracing::debug!(
                tab_id = event.tab_id,
                script_id = event.script_id,
                "Dropping script-parse for non-active session"
            );
            return;
        }

        let source = match self
            .channel
            .get_script_source(event.tab_id, &event.script_id)
            .await
        {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(
                    tab_id = event.tab_id,
                    script_id = event.script_id,
                    error = %e,
                    "Failed to get script source"
                );
                return;
            }
        };

        let locator = event.url.as_deref().unwrap_or(INLINE_SCRIPT_LOCATOR);
        if let Err(e) = self.ingestor.ingest(event.tab_id, &source, locator).await {
            tracing::error!(tab_id = event.tab_id, error = %e, "Ingest failed");
        }
    }

    /// Tab closed: delete its record and, if a session was live, issue an
    /// idempotent stop
    pub async fn on_tab_closed(&self, tab_id: u32) {
        let was_active = self.state(tab_id) == InstrumentState::Active;
        self.set_state(tab_id, InstrumentState::Inactive);

        if let Err(e) = self.ingestor.store().delete(tab_id).await {
            tracing::error!(tab_id, error = %e, "Failed to delete tab record");
        }
        if was_active {
            if let Err(e) = self.channel.detach(tab_id).await {
                tracing::debug!(tab_id, error = %e, "Detach on close (already gone?)");
            }
        }
    }
}
