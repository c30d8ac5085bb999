//! In-crate test doubles for the ports.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{
    CitationRecord, QueryPatch, QueryRecord, QueryStatus, ResultRecord, Stage, UsagePatch,
    UsageRecord,
};
use crate::ports::{
    PortError, PortResult, ProgressEvent, ProgressReporter, ResearchStore, StageExecutor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    FindUsage,
    CreateUsage,
    PatchUsage,
    CreateQuery,
    PatchQuery,
    RecentQueries,
    CreateResult,
    RecentResults,
    CreateCitation,
    CitationsForResult,
    DeleteResult,
    DeleteCitation,
}

#[derive(Default)]
struct State {
    usage: Vec<UsageRecord>,
    queries: Vec<QueryRecord>,
    query_patches: Vec<(String, QueryPatch)>,
    results: Vec<ResultRecord>,
    citations: Vec<CitationRecord>,
    calls: Vec<StoreCall>,
    pending_failures: HashMap<StoreCall, u32>,
    failing_status: Option<QueryStatus>,
}

/// An in-memory store that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<State>,
}

impl RecordingStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Makes the next call of kind `call` fail. Stacks.
    pub fn fail_next(&self, call: StoreCall) {
        *self.lock().pending_failures.entry(call).or_default() += 1;
    }

    /// Makes every query patch that sets `status` fail.
    pub fn fail_query_patches_to(&self, status: QueryStatus) {
        self.lock().failing_status = Some(status);
    }

    pub fn forget_usage(&self, session_id: &str) {
        self.lock().usage.retain(|u| u.session_id != session_id);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn usage(&self, session_id: &str) -> Option<UsageRecord> {
        self.lock()
            .usage
            .iter()
            .find(|u| u.session_id == session_id)
            .cloned()
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        self.lock().queries.clone()
    }

    pub fn query(&self, id: &str) -> Option<QueryRecord> {
        self.lock().queries.iter().find(|q| q.id == id).cloned()
    }

    pub fn query_patches(&self, id: &str) -> Vec<QueryPatch> {
        self.lock()
            .query_patches
            .iter()
            .filter(|(qid, _)| qid == id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// The created status followed by every status a successful patch wrote.
    pub fn status_history(&self, id: &str) -> Vec<QueryStatus> {
        let mut history = vec![QueryStatus::Pending];
        history.extend(self.query_patches(id).iter().filter_map(|p| p.status));
        history
    }

    pub fn results(&self) -> Vec<ResultRecord> {
        self.lock().results.clone()
    }

    pub fn citations(&self) -> Vec<CitationRecord> {
        self.lock().citations.clone()
    }

    fn begin(&self, call: StoreCall) -> PortResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(n) = state.pending_failures.get_mut(&call) {
            if *n > 0 {
                *n -= 1;
                return Err(PortError::Unexpected(format!("injected {call:?} failure")));
            }
        }
        Ok(state)
    }
}

#[async_trait]
impl ResearchStore for RecordingStore {
    async fn find_usage(&self, session_id: &str) -> PortResult<Option<UsageRecord>> {
        let state = self.begin(StoreCall::FindUsage)?;
        Ok(state
            .usage
            .iter()
            .find(|u| u.session_id == session_id)
            .cloned())
    }

    async fn create_usage(&self, usage: &UsageRecord) -> PortResult<()> {
        self.begin(StoreCall::CreateUsage)?.usage.push(usage.clone());
        Ok(())
    }

    async fn patch_usage(&self, usage_id: &str, patch: &UsagePatch) -> PortResult<()> {
        let mut state = self.begin(StoreCall::PatchUsage)?;
        let usage = state
            .usage
            .iter_mut()
            .find(|u| u.id == usage_id)
            .ok_or_else(|| PortError::NotFound(usage_id.to_string()))?;
        patch.apply_to(usage);
        Ok(())
    }

    async fn create_query(&self, query: &QueryRecord) -> PortResult<()> {
        self.begin(StoreCall::CreateQuery)?.queries.push(query.clone());
        Ok(())
    }

    async fn patch_query(&self, query_id: &str, patch: &QueryPatch) -> PortResult<()> {
        let mut state = self.begin(StoreCall::PatchQuery)?;
        if patch.status.is_some() && patch.status == state.failing_status {
            return Err(PortError::Unexpected("injected status failure".to_string()));
        }
        let query = state
            .queries
            .iter_mut()
            .find(|q| q.id == query_id)
            .ok_or_else(|| PortError::NotFound(query_id.to_string()))?;
        patch.apply_to(query);
        state
            .query_patches
            .push((query_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn recent_queries(&self, limit: usize) -> PortResult<Vec<QueryRecord>> {
        let state = self.begin(StoreCall::RecentQueries)?;
        Ok(state.queries.iter().rev().take(limit).cloned().collect())
    }

    async fn create_result(&self, result: &ResultRecord) -> PortResult<()> {
        self.begin(StoreCall::CreateResult)?.results.push(result.clone());
        Ok(())
    }

    async fn recent_results(&self, limit: usize) -> PortResult<Vec<ResultRecord>> {
        let state = self.begin(StoreCall::RecentResults)?;
        Ok(state.results.iter().rev().take(limit).cloned().collect())
    }

    async fn create_citation(&self, citation: &CitationRecord) -> PortResult<()> {
        self.begin(StoreCall::CreateCitation)?
            .citations
            .push(citation.clone());
        Ok(())
    }

    async fn citations_for_result(&self, result_id: &str) -> PortResult<Vec<CitationRecord>> {
        let state = self.begin(StoreCall::CitationsForResult)?;
        Ok(state
            .citations
            .iter()
            .filter(|c| c.result_id == result_id)
            .cloned()
            .collect())
    }

    async fn delete_result(&self, result_id: &str) -> PortResult<()> {
        self.begin(StoreCall::DeleteResult)?
            .results
            .retain(|r| r.id != result_id);
        Ok(())
    }

    async fn delete_citation(&self, citation_id: &str) -> PortResult<()> {
        self.begin(StoreCall::DeleteCitation)?
            .citations
            .retain(|c| c.id != citation_id);
        Ok(())
    }
}

/// Completes every stage immediately.
pub struct InstantExecutor;

#[async_trait]
impl StageExecutor for InstantExecutor {
    async fn execute(&self, _stage: Stage, _progress: &dyn ProgressReporter) -> PortResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
