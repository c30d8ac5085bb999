//! crates/research_assistant_core/src/pipeline.rs
//!
//! The report pipeline: validates a request, persists the query, walks it through
//! the four stages and finishes the research.
//!
//! Stage status patches are best effort: a failed patch is logged, reported as a
//! notification and the run carries on. The closing sequence (completion patch,
//! result, citations, usage) is all-or-nothing: each finished step leaves a
//! compensating action behind, and a failing step unwinds them in reverse.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    CitationRecord, QueryPatch, QueryRecord, QueryStatus, ReportDepth, ResultRecord, Stage,
    UsagePatch, UsageRecord, CREDITS_PER_REPORT,
};
use crate::ports::{
    NotificationLevel, PortError, ProgressEvent, ProgressReporter, ResearchStore, StageExecutor,
};
use crate::report::{self, SIMULATED_SOURCES_FOUND};
use crate::session::ResearchSession;

//=========================================================================================
// Requests, Outputs and Errors
//=========================================================================================

/// What the user submitted.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub question: String,
    pub depth: ReportDepth,
    pub include_news: bool,
    pub include_blogs: bool,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct CompletedReport {
    pub query: QueryRecord,
    pub result: ResultRecord,
    pub citations: Vec<CitationRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Please enter a research question.")]
    EmptyQuestion,

    #[error("Insufficient credits: {remaining} remaining, {required} required.")]
    InsufficientCredits { remaining: u32, required: u32 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PortError),

    #[error("Stage '{stage}' failed: {source}")]
    Stage { stage: Stage, source: PortError },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: QueryStatus, to: QueryStatus },
}

impl PipelineError {
    /// True for errors raised before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyQuestion | Self::InsufficientCredits { .. })
    }

    /// The notification text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyQuestion => self.to_string(),
            Self::InsufficientCredits { .. } => {
                "Insufficient credits. Each report requires 3 credits.".to_string()
            }
            _ => "Error generating research report. Please try again.".to_string(),
        }
    }
}

/// An undo step for a write made while finishing a run.
#[derive(Debug, Clone, PartialEq)]
enum Compensation {
    RevertQueryStatus { query_id: String, previous: QueryStatus },
    DeleteResult(String),
    DeleteCitation(String),
}

//=========================================================================================
// The Pipeline
//=========================================================================================

#[derive(Clone)]
pub struct ReportPipeline {
    store: Arc<dyn ResearchStore>,
    executor: Arc<dyn StageExecutor>,
}

impl ReportPipeline {
    pub fn new(store: Arc<dyn ResearchStore>, executor: Arc<dyn StageExecutor>) -> Self {
        Self { store, executor }
    }

    /// Checks the preconditions of a run against the session's cached ledger.
    /// Callers that want the freshest balance refresh the session first.
    pub fn validate(
        session: &ResearchSession,
        request: &ResearchRequest,
    ) -> Result<(), PipelineError> {
        if request.question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        if !session.usage.can_afford_report() {
            return Err(PipelineError::InsufficientCredits {
                remaining: session.usage.credits_remaining,
                required: CREDITS_PER_REPORT,
            });
        }
        Ok(())
    }

    /// Builds the pending query record for `request` from the session's staged files.
    pub fn new_query(session: &ResearchSession, request: &ResearchRequest) -> QueryRecord {
        QueryRecord {
            id: format!("query_{}", Uuid::new_v4().simple()),
            question: request.question.trim().to_string(),
            depth: request.depth,
            include_news: request.include_news,
            include_blogs: request.include_blogs,
            status: QueryStatus::Pending,
            files_uploaded: u32::try_from(session.uploads.len()).unwrap_or(u32::MAX),
            file_names: session.uploads.file_names(),
            estimated_time: report::estimate_seconds(request.depth, session.uploads.len()),
            sources_found: 0,
            credits_used: CREDITS_PER_REPORT,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Runs one request from submission to finished report.
    pub async fn run(
        &self,
        session: &mut ResearchSession,
        request: ResearchRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<CompletedReport, PipelineError> {
        Self::validate(session, &request)?;
        let query = Self::new_query(session, &request);
        self.run_query(session, query, progress).await
    }

    /// Runs an already built query record. The record must still be pending.
    pub async fn run_query(
        &self,
        session: &mut ResearchSession,
        mut query: QueryRecord,
        progress: &dyn ProgressReporter,
    ) -> Result<CompletedReport, PipelineError> {
        if let Err(e) = self.store.create_query(&query).await {
            error!("Error creating query {}: {}", query.id, e);
            progress.report(ProgressEvent::notification(
                NotificationLevel::Error,
                "Error starting research. Please try again.",
            ));
            return Err(e.into());
        }
        info!(
            "Query {} created for session {} ({} depth, {} files).",
            query.id, session.session_id, query.depth, query.files_uploaded
        );
        self.record_submission(session).await;

        for stage in Stage::ALL {
            self.enter_stage(&mut query, stage, progress).await?;
            self.executor
                .execute(stage, progress)
                .await
                .map_err(|source| PipelineError::Stage { stage, source })?;
            progress.report(ProgressEvent::StageCompleted { stage });
        }

        let mut compensations = Vec::new();
        match self
            .finish(session, &mut query, &mut compensations)
            .await
        {
            Ok((result, citations)) => {
                info!("Query {} completed with result {}.", query.id, result.id);
                session.last_result_id = Some(result.id.clone());
                progress.report(ProgressEvent::Completed {
                    query_id: query.id.clone(),
                    result_id: result.id.clone(),
                });
                progress.report(ProgressEvent::notification(
                    NotificationLevel::Success,
                    "Research report generated successfully!",
                ));
                Ok(CompletedReport {
                    query,
                    result,
                    citations,
                })
            }
            Err(e) => {
                error!("Error completing query {}: {}. Rolling back.", query.id, e);
                self.roll_back(compensations).await;
                progress.report(ProgressEvent::notification(
                    NotificationLevel::Error,
                    "Error generating research report. Please try again.",
                ));
                Err(e)
            }
        }
    }

    /// Bumps the query counter on the ledger. Failure is not fatal.
    async fn record_submission(&self, session: &mut ResearchSession) {
        let patch = UsagePatch {
            total_queries: Some(session.usage.total_queries + 1),
            last_activity: Some(Utc::now()),
            ..UsagePatch::default()
        };
        match self.store.patch_usage(&session.usage.id, &patch).await {
            Ok(()) => patch.apply_to(&mut session.usage),
            Err(e) => warn!("Error recording query for session {}: {}", session.session_id, e),
        }
    }

    async fn enter_stage(
        &self,
        query: &mut QueryRecord,
        stage: Stage,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let to = stage.status();
        if !query.status.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: query.status,
                to,
            });
        }

        let mut patch = QueryPatch::status(to);
        if stage == Stage::Searching {
            patch.sources_found = Some(SIMULATED_SOURCES_FOUND);
        }
        patch.apply_to(query);

        if let Err(e) = self.store.patch_query(&query.id, &patch).await {
            error!("Error updating query {} status to {}: {}", query.id, to, e);
            progress.report(ProgressEvent::notification(
                NotificationLevel::Error,
                format!("Error updating research status to {to}."),
            ));
        }
        info!("Query {} entered stage {}.", query.id, stage);
        progress.report(ProgressEvent::StageStarted { stage });
        Ok(())
    }

    async fn finish(
        &self,
        session: &mut ResearchSession,
        query: &mut QueryRecord,
        compensations: &mut Vec<Compensation>,
    ) -> Result<(ResultRecord, Vec<CitationRecord>), PipelineError> {
        let now = Utc::now();
        if !query.status.can_transition_to(QueryStatus::Completed) {
            return Err(PipelineError::InvalidTransition {
                from: query.status,
                to: QueryStatus::Completed,
            });
        }
        let previous = query.status;
        let patch = QueryPatch {
            status: Some(QueryStatus::Completed),
            completed_at: Some(Some(now)),
            ..QueryPatch::default()
        };
        self.store.patch_query(&query.id, &patch).await?;
        patch.apply_to(query);
        compensations.push(Compensation::RevertQueryStatus {
            query_id: query.id.clone(),
            previous,
        });

        let result = report::build_result(
            &report::new_result_id(),
            &query.id,
            &query.question,
            query.depth,
            now,
        );
        self.store.create_result(&result).await?;
        compensations.push(Compensation::DeleteResult(result.id.clone()));

        let citations = report::build_citations(&result.id, now);
        for citation in &citations {
            self.store.create_citation(citation).await?;
            compensations.push(Compensation::DeleteCitation(citation.id.clone()));
        }

        self.charge_report(session).await?;
        Ok((result, citations))
    }

    /// Debits one report from the ledger, starting from the store's copy.
    async fn charge_report(&self, session: &mut ResearchSession) -> Result<(), PipelineError> {
        let now = Utc::now();
        match self.store.find_usage(&session.session_id).await? {
            Some(mut stored) => {
                // The run was validated against the cached ledger, which may be stale.
                if !stored.can_afford_report() {
                    return Err(PipelineError::InsufficientCredits {
                        remaining: stored.credits_remaining,
                        required: CREDITS_PER_REPORT,
                    });
                }
                let patch = UsagePatch {
                    credits_remaining: Some(stored.credits_remaining - CREDITS_PER_REPORT),
                    total_reports: Some(stored.total_reports + 1),
                    total_credits_used: Some(stored.total_credits_used + CREDITS_PER_REPORT),
                    last_activity: Some(now),
                    ..UsagePatch::default()
                };
                self.store.patch_usage(&stored.id, &patch).await?;
                patch.apply_to(&mut stored);
                session.usage = stored;
            }
            None => {
                let mut usage: UsageRecord = session.usage.clone();
                usage.credits_remaining = usage.credits_remaining.saturating_sub(CREDITS_PER_REPORT);
                usage.total_reports += 1;
                usage.total_credits_used += CREDITS_PER_REPORT;
                usage.last_activity = now;
                warn!(
                    "No usage record for session {}; creating one.",
                    session.session_id
                );
                self.store.create_usage(&usage).await?;
                session.usage = usage;
            }
        }
        Ok(())
    }

    async fn roll_back(&self, compensations: Vec<Compensation>) {
        for compensation in compensations.into_iter().rev() {
            let outcome = match &compensation {
                Compensation::RevertQueryStatus { query_id, previous } => {
                    let patch = QueryPatch {
                        status: Some(*previous),
                        completed_at: Some(None),
                        ..QueryPatch::default()
                    };
                    self.store.patch_query(query_id, &patch).await
                }
                Compensation::DeleteResult(id) => self.store.delete_result(id).await,
                Compensation::DeleteCitation(id) => self.store.delete_citation(id).await,
            };
            if let Err(e) = outcome {
                error!("Rollback step {:?} failed: {}", compensation, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoopReporter;
    use crate::testing::{CollectingReporter, InstantExecutor, RecordingStore, StoreCall};
    use crate::upload::FileDescriptor;
    use pretty_assertions::assert_eq;

    fn request(question: &str) -> ResearchRequest {
        ResearchRequest {
            question: question.to_string(),
            depth: ReportDepth::Detailed,
            include_news: true,
            include_blogs: false,
        }
    }

    async fn setup(credits: u32) -> (Arc<RecordingStore>, ReportPipeline, ResearchSession) {
        let store = Arc::new(RecordingStore::default());
        let session = ResearchSession::open(store.as_ref(), "session_test", credits).await;
        let pipeline = ReportPipeline::new(store.clone(), Arc::new(InstantExecutor));
        (store, pipeline, session)
    }

    #[tokio::test]
    async fn insufficient_credits_creates_nothing() {
        let (store, pipeline, mut session) = setup(2).await;
        let calls_before = store.calls().len();

        let err = pipeline
            .run(&mut session, request("Why?"), &NoopReporter)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::InsufficientCredits {
                remaining: 2,
                required: 3
            }
        ));
        assert!(err.is_validation());
        assert_eq!(store.calls().len(), calls_before);
        assert!(store.queries().is_empty());
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let (store, pipeline, mut session) = setup(50).await;
        let err = pipeline
            .run(&mut session, request("   \n"), &NoopReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyQuestion));
        assert!(store.queries().is_empty());
    }

    #[tokio::test]
    async fn status_moves_through_every_stage_in_order() {
        let (store, pipeline, mut session) = setup(50).await;
        let report = pipeline
            .run(&mut session, request("What drives EV adoption?"), &NoopReporter)
            .await
            .unwrap();

        let statuses = store.status_history(&report.query.id);
        assert_eq!(
            statuses,
            vec![
                QueryStatus::Pending,
                QueryStatus::Analyzing,
                QueryStatus::Searching,
                QueryStatus::Processing,
                QueryStatus::Generating,
                QueryStatus::Completed,
            ]
        );

        let sources: Vec<Option<u32>> = store
            .query_patches(&report.query.id)
            .iter()
            .map(|p| p.sources_found)
            .collect();
        assert_eq!(sources, vec![None, Some(18), None, None, None]);

        let stored = store.query(&report.query.id).unwrap();
        assert_eq!(stored.status, QueryStatus::Completed);
        assert_eq!(stored.sources_found, 18);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn run_writes_result_with_three_citations_and_charges_credits() {
        let (store, pipeline, mut session) = setup(50).await;
        let report = pipeline
            .run(&mut session, request("Is fusion viable?"), &NoopReporter)
            .await
            .unwrap();

        assert_eq!(report.result.query_id, report.query.id);
        assert_eq!(report.result.word_count, 1500);
        assert_eq!(report.result.reading_time, 8);

        let mut types: Vec<_> = store
            .citations()
            .iter()
            .filter(|c| c.result_id == report.result.id)
            .map(|c| c.source_type)
            .collect();
        types.sort();
        assert_eq!(
            types,
            vec![
                crate::domain::SourceType::Academic,
                crate::domain::SourceType::News,
                crate::domain::SourceType::Blog,
            ]
        );

        let usage = store.usage("session_test").unwrap();
        assert_eq!(usage.credits_remaining, 47);
        assert_eq!(usage.total_reports, 1);
        assert_eq!(usage.total_credits_used, 3);
        assert_eq!(usage.total_queries, 1);
        assert_eq!(session.usage, usage);
        assert_eq!(session.last_result_id.as_deref(), Some(report.result.id.as_str()));
    }

    #[tokio::test]
    async fn two_runs_charge_six_credits() {
        let (store, pipeline, mut session) = setup(50).await;
        for q in ["first", "second"] {
            pipeline
                .run(&mut session, request(q), &NoopReporter)
                .await
                .unwrap();
        }
        let usage = store.usage("session_test").unwrap();
        assert_eq!(usage.credits_remaining, 44);
        assert_eq!(usage.total_reports, 2);
        assert_eq!(store.results().len(), 2);
    }

    #[tokio::test]
    async fn staged_files_are_recorded_on_the_query() {
        let (store, pipeline, mut session) = setup(50).await;
        session.uploads.stage_batch([
            FileDescriptor {
                name: "notes.txt".to_string(),
                size_bytes: 1024,
                media_type: "text/plain".to_string(),
            },
            FileDescriptor {
                name: "huge.pdf".to_string(),
                size_bytes: 15 * 1024 * 1024,
                media_type: "application/pdf".to_string(),
            },
        ]);

        let report = pipeline
            .run(&mut session, request("Files?"), &NoopReporter)
            .await
            .unwrap();
        let stored = store.query(&report.query.id).unwrap();
        assert_eq!(stored.files_uploaded, 1);
        assert_eq!(stored.file_names, vec!["notes.txt".to_string()]);
        assert_eq!(stored.estimated_time, 70);
        assert_eq!(stored.credits_used, 3);
    }

    #[tokio::test]
    async fn progress_events_follow_the_stages() {
        let (_store, pipeline, mut session) = setup(50).await;
        let reporter = CollectingReporter::default();
        let report = pipeline
            .run(&mut session, request("Progress?"), &reporter)
            .await
            .unwrap();

        let mut expected = Vec::new();
        for stage in Stage::ALL {
            expected.push(ProgressEvent::StageStarted { stage });
            expected.push(ProgressEvent::StageCompleted { stage });
        }
        expected.push(ProgressEvent::Completed {
            query_id: report.query.id.clone(),
            result_id: report.result.id.clone(),
        });
        expected.push(ProgressEvent::notification(
            NotificationLevel::Success,
            "Research report generated successfully!",
        ));
        assert_eq!(reporter.events(), expected);
    }

    #[tokio::test]
    async fn failed_stage_patch_is_reported_but_not_fatal() {
        let (store, pipeline, mut session) = setup(50).await;
        store.fail_query_patches_to(QueryStatus::Processing);
        let reporter = CollectingReporter::default();

        let report = pipeline
            .run(&mut session, request("Flaky store"), &reporter)
            .await
            .unwrap();

        assert!(reporter.events().contains(&ProgressEvent::notification(
            NotificationLevel::Error,
            "Error updating research status to processing.",
        )));
        assert_eq!(store.query(&report.query.id).unwrap().status, QueryStatus::Completed);
    }

    #[tokio::test]
    async fn query_creation_failure_aborts_the_run() {
        let (store, pipeline, mut session) = setup(50).await;
        store.fail_next(StoreCall::CreateQuery);

        let err = pipeline
            .run(&mut session, request("Offline"), &NoopReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
        assert!(store.results().is_empty());
        assert_eq!(session.usage.credits_remaining, 50);
    }

    #[tokio::test]
    async fn failure_while_finishing_rolls_back_in_reverse() {
        let (store, pipeline, mut session) = setup(50).await;
        store.fail_next(StoreCall::PatchUsage);
        // The submission bump consumes the first failure; fail the charge too.
        store.fail_next(StoreCall::PatchUsage);

        let err = pipeline
            .run(&mut session, request("Rollback"), &NoopReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));

        assert!(store.results().is_empty());
        assert!(store.citations().is_empty());
        let query = store.queries().pop().unwrap();
        assert_eq!(query.status, QueryStatus::Generating);
        assert_eq!(query.completed_at, None);

        let usage = store.usage("session_test").unwrap();
        assert_eq!(usage.credits_remaining, 50);
        assert_eq!(usage.total_reports, 0);
        assert_eq!(session.last_result_id, None);

        let undo: Vec<StoreCall> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::DeleteCitation | StoreCall::DeleteResult))
            .collect();
        assert_eq!(
            undo,
            vec![
                StoreCall::DeleteCitation,
                StoreCall::DeleteCitation,
                StoreCall::DeleteCitation,
                StoreCall::DeleteResult,
            ]
        );
    }

    #[tokio::test]
    async fn missing_ledger_is_recreated_when_charging() {
        let (store, pipeline, mut session) = setup(50).await;
        store.forget_usage("session_test");

        pipeline
            .run(&mut session, request("Ledger gone"), &NoopReporter)
            .await
            .unwrap();

        let usage = store.usage("session_test").unwrap();
        assert_eq!(usage.credits_remaining, 47);
        assert_eq!(usage.total_reports, 1);
    }

    #[tokio::test]
    async fn stale_cached_balance_is_rechecked_when_charging() {
        let store = Arc::new(RecordingStore::default());
        store
            .create_usage(&UsageRecord::new("session_test", 1, Utc::now()))
            .await
            .unwrap();
        // The lookup fails, so the session opens on the default ledger.
        store.fail_next(StoreCall::FindUsage);
        let mut session = ResearchSession::open(store.as_ref(), "session_test", 50).await;
        assert_eq!(session.usage.credits_remaining, 50);
        let pipeline = ReportPipeline::new(store.clone(), Arc::new(InstantExecutor));

        let mut brief = request("Stale ledger");
        brief.depth = ReportDepth::Brief;
        let err = pipeline
            .run(&mut session, brief, &NoopReporter)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::InsufficientCredits {
                remaining: 1,
                required: 3
            }
        ));
        let usage = store.usage("session_test").unwrap();
        assert_eq!(usage.credits_remaining, 1);
        assert_eq!(usage.total_reports, 0);
        assert_eq!(usage.total_credits_used, 0);
        assert!(store.results().is_empty());
        assert!(store.citations().is_empty());
        assert_eq!(store.queries().pop().unwrap().status, QueryStatus::Generating);
    }
}
