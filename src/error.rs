//! Custom error types for secretlens
//!
//! Scanning itself never fails; everything else surfaces to the immediate
//! caller and nothing here terminates the process or abandons a tab record.

#![allow(dead_code)]

use thiserror::Error;

/// Main error type for secretlens operations
#[derive(Error, Debug)]
pub enum SecretLensError {
    /// Tab state store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Instrumentation session errors
    #[error("Instrumentation error: {0}")]
    Instrument(#[from] InstrumentError),

    /// Ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError { path: String, source: std::io::Error },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Could not determine a data directory")]
    NoDataDir,
}

/// Durable store errors
///
/// A failed `update` or `delete` means the caller must not assume the
/// mutation applied.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read key '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Failed to write key '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Failed to remove key '{key}': {reason}")]
    RemoveFailed { key: String, reason: String },

    #[error("Stored record for key '{key}' is not valid JSON: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Failed to serialize record for key '{key}': {reason}")]
    Serialize { key: String, reason: String },
}

/// Instrumentation channel errors
#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("Failed to attach to tab {tab_id}: {reason}")]
    AttachFailed { tab_id: u32, reason: String },

    #[error("Failed to detach from tab {tab_id}: {reason}")]
    DetachFailed { tab_id: u32, reason: String },

    #[error("Failed to get source for script {script_id}: {reason}")]
    ScriptSourceFailed { script_id: String, reason: String },

    #[error("No instrumentation session for tab {0}")]
    NotAttached(u32),
}

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Event has no tab id")]
    MissingTabId,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Store error during ingest: {0}")]
    Store(#[from] StoreError),
}
