//! services/api/src/web/report_task.rs
//!
//! This module contains the asynchronous "worker" function that carries one report
//! request through the pipeline in the background and announces the outcome on the
//! session's progress channel.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, SessionEntry},
    views::{CitationView, ResultView},
};
use research_assistant_core::{QueryRecord, ResearchSession};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs `query` for a snapshot of the session.
///
/// The run works on its own copy of the session so that a reset arriving meanwhile
/// only clears the live entry. When the run ends the ledger and the last result are
/// written back to the live entry and the session is free for the next request.
pub async fn report_process(
    app_state: Arc<AppState>,
    entry: Arc<SessionEntry>,
    mut session: ResearchSession,
    query: QueryRecord,
) {
    let start_time = Instant::now();
    let query_id = query.id.clone();
    info!("Report process started for query {}.", query_id);

    let reporter = entry.reporter();
    let outcome = app_state
        .pipeline
        .run_query(&mut session, query, &reporter)
        .await;

    {
        let mut live = entry.session.lock().await;
        live.usage = session.usage.clone();
        if outcome.is_ok() {
            live.last_result_id = session.last_result_id.clone();
        }
    }
    entry.finish_run();

    match outcome {
        Ok(report) => {
            info!(
                "Report process for query {} finished in {:?}.",
                query_id,
                start_time.elapsed()
            );
            entry.publish(ServerMessage::ReportReady {
                query_id: report.query.id.clone(),
                result: ResultView::from(&report.result),
                citations: report.citations.iter().map(CitationView::from).collect(),
            });
        }
        Err(e) => {
            error!("Report process for query {} failed: {}", query_id, e);
            entry.publish(ServerMessage::ReportFailed {
                message: e.user_message(),
            });
        }
    }
}
