//! services/api/src/adapters/memory.rs
//!
//! A process-local implementation of the `ResearchStore` port. It backs the service
//! when `STORE_BACKEND=memory` and the integration tests. Records are kept in
//! insertion order; "recent" means most recently inserted.

use async_trait::async_trait;
use research_assistant_core::domain::{
    CitationRecord, QueryPatch, QueryRecord, ResultRecord, UsagePatch, UsageRecord,
};
use research_assistant_core::ports::{PortError, PortResult, ResearchStore};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    usage: Vec<UsageRecord>,
    queries: Vec<QueryRecord>,
    results: Vec<ResultRecord>,
    citations: Vec<CitationRecord>,
}

#[derive(Default)]
pub struct MemoryAdapter {
    tables: RwLock<Tables>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn query(&self, query_id: &str) -> Option<QueryRecord> {
        self.tables
            .read()
            .await
            .queries
            .iter()
            .find(|q| q.id == query_id)
            .cloned()
    }
}

fn duplicate(table: &str, id: &str) -> PortError {
    PortError::Unexpected(format!("{} record {} already exists", table, id))
}

#[async_trait]
impl ResearchStore for MemoryAdapter {
    async fn find_usage(&self, session_id: &str) -> PortResult<Option<UsageRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .usage
            .iter()
            .find(|u| u.session_id == session_id)
            .cloned())
    }

    async fn create_usage(&self, usage: &UsageRecord) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.usage.iter().any(|u| u.id == usage.id) {
            return Err(duplicate("user_usage", &usage.id));
        }
        tables.usage.push(usage.clone());
        Ok(())
    }

    async fn patch_usage(&self, usage_id: &str, patch: &UsagePatch) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let usage = tables
            .usage
            .iter_mut()
            .find(|u| u.id == usage_id)
            .ok_or_else(|| PortError::NotFound(format!("Usage record {} not found", usage_id)))?;
        patch.apply_to(usage);
        Ok(())
    }

    async fn create_query(&self, query: &QueryRecord) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.queries.iter().any(|q| q.id == query.id) {
            return Err(duplicate("research_queries", &query.id));
        }
        tables.queries.push(query.clone());
        Ok(())
    }

    async fn patch_query(&self, query_id: &str, patch: &QueryPatch) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let query = tables
            .queries
            .iter_mut()
            .find(|q| q.id == query_id)
            .ok_or_else(|| PortError::NotFound(format!("Query {} not found", query_id)))?;
        patch.apply_to(query);
        Ok(())
    }

    async fn recent_queries(&self, limit: usize) -> PortResult<Vec<QueryRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.queries.iter().rev().take(limit).cloned().collect())
    }

    async fn create_result(&self, result: &ResultRecord) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.results.iter().any(|r| r.id == result.id) {
            return Err(duplicate("research_results", &result.id));
        }
        tables.results.push(result.clone());
        Ok(())
    }

    async fn recent_results(&self, limit: usize) -> PortResult<Vec<ResultRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.results.iter().rev().take(limit).cloned().collect())
    }

    async fn create_citation(&self, citation: &CitationRecord) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables.citations.iter().any(|c| c.id == citation.id) {
            return Err(duplicate("citations", &citation.id));
        }
        tables.citations.push(citation.clone());
        Ok(())
    }

    async fn citations_for_result(&self, result_id: &str) -> PortResult<Vec<CitationRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .citations
            .iter()
            .filter(|c| c.result_id == result_id)
            .cloned()
            .collect())
    }

    async fn delete_result(&self, result_id: &str) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.results.len();
        tables.results.retain(|r| r.id != result_id);
        if tables.results.len() == before {
            return Err(PortError::NotFound(format!("Result {} not found", result_id)));
        }
        Ok(())
    }

    async fn delete_citation(&self, citation_id: &str) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.citations.len();
        tables.citations.retain(|c| c.id != citation_id);
        if tables.citations.len() == before {
            return Err(PortError::NotFound(format!("Citation {} not found", citation_id)));
        }
        Ok(())
    }
}
