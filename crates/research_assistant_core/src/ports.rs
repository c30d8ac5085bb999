//! crates/research_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the remote table store, the timing of the pipeline stages
//! and whatever renders progress to the user.

use async_trait::async_trait;
use crate::domain::{
    CitationRecord, QueryPatch, QueryRecord, ResultRecord, Stage, UsagePatch, UsageRecord,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, JSON).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for the four research tables.
#[async_trait]
pub trait ResearchStore: Send + Sync {
    // --- Usage Ledger ---
    async fn find_usage(&self, session_id: &str) -> PortResult<Option<UsageRecord>>;

    async fn create_usage(&self, usage: &UsageRecord) -> PortResult<()>;

    async fn patch_usage(&self, usage_id: &str, patch: &UsagePatch) -> PortResult<()>;

    // --- Queries ---
    async fn create_query(&self, query: &QueryRecord) -> PortResult<()>;

    async fn patch_query(&self, query_id: &str, patch: &QueryPatch) -> PortResult<()>;

    /// The `limit` most recently created queries, newest first.
    async fn recent_queries(&self, limit: usize) -> PortResult<Vec<QueryRecord>>;

    // --- Results and Citations ---
    async fn create_result(&self, result: &ResultRecord) -> PortResult<()>;

    /// The `limit` most recently created results, newest first.
    async fn recent_results(&self, limit: usize) -> PortResult<Vec<ResultRecord>>;

    async fn create_citation(&self, citation: &CitationRecord) -> PortResult<()>;

    async fn citations_for_result(&self, result_id: &str) -> PortResult<Vec<CitationRecord>>;

    // --- Rollback ---
    // Only used to undo records written by a run that failed before finishing.
    async fn delete_result(&self, result_id: &str) -> PortResult<()>;

    async fn delete_citation(&self, citation_id: &str) -> PortResult<()>;
}

/// Performs the work of one pipeline stage.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, stage: Stage, progress: &dyn ProgressReporter) -> PortResult<()>;
}

//=========================================================================================
// Progress Reporting
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Everything the presentation layer can observe about a running pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageStarted { stage: Stage },
    /// Intermediate source count shown while searching. Never persisted.
    SourcesFound { count: u32 },
    StageCompleted { stage: Stage },
    Notification { level: NotificationLevel, message: String },
    Completed { query_id: String, result_id: String },
}

impl ProgressEvent {
    pub fn notification(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self::Notification {
            level,
            message: message.into(),
        }
    }
}

/// Receives progress events. Implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// A reporter that discards every event.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}
