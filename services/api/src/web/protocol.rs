//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for streaming report progress.

use research_assistant_core::ports::ProgressEvent;
use serde::Serialize;
use utoipa::ToSchema;

use crate::web::views::{CitationView, ResultView};

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// The client never sends structured messages on this socket; it only listens.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A stage became active. `index` is its position in the four-step progress list.
    StageStarted { stage: String, index: usize },

    /// Intermediate source count while searching.
    SourcesFound { count: u32 },

    /// A stage finished.
    StageCompleted { stage: String, index: usize },

    /// A transient toast for the user.
    Notification { level: String, message: String },

    /// The report is ready to render.
    ReportReady {
        query_id: String,
        result: ResultView,
        citations: Vec<CitationView>,
    },

    /// The run ended without a report.
    ReportFailed { message: String },
}

impl ServerMessage {
    /// Translates a pipeline progress event. Completion is not translated: the report
    /// task announces it with `ReportReady`, which carries the full report.
    pub fn from_progress(event: ProgressEvent) -> Option<Self> {
        match event {
            ProgressEvent::StageStarted { stage } => Some(Self::StageStarted {
                stage: stage.as_str().to_string(),
                index: stage.index(),
            }),
            ProgressEvent::SourcesFound { count } => Some(Self::SourcesFound { count }),
            ProgressEvent::StageCompleted { stage } => Some(Self::StageCompleted {
                stage: stage.as_str().to_string(),
                index: stage.index(),
            }),
            ProgressEvent::Notification { level, message } => Some(Self::Notification {
                level: level.as_str().to_string(),
                message,
            }),
            ProgressEvent::Completed { .. } => None,
        }
    }
}
