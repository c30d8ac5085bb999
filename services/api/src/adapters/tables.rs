//! services/api/src/adapters/tables.rs
//!
//! This module contains the table store adapter, which is the concrete implementation
//! of the `ResearchStore` port from the `core` crate. It talks to the remote REST
//! table API (`<base>/<table>`) over HTTP using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use research_assistant_core::domain::{
    CitationRecord, QueryPatch, QueryRecord, ResultRecord, UsagePatch, UsageRecord,
};
use research_assistant_core::ports::{PortError, PortResult, ResearchStore};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

//=========================================================================================
// Tables
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    UserUsage,
    ResearchQueries,
    ResearchResults,
    Citations,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserUsage => "user_usage",
            Self::ResearchQueries => "research_queries",
            Self::ResearchResults => "research_results",
            Self::Citations => "citations",
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A table store adapter that implements the `ResearchStore` port.
#[derive(Clone)]
pub struct TablesAdapter {
    client: Client,
    base_url: String,
}

impl TablesAdapter {
    /// Creates a new `TablesAdapter` rooted at `base_url` (e.g. `https://host/tables`).
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.as_str())
    }

    fn record_url(&self, table: Table, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, table.as_str(), id)
    }

    /// `GET <base>/<table>?search=<value>`
    async fn search<T: DeserializeOwned>(&self, table: Table, value: &str) -> PortResult<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("search", value)])
            .send()
            .await
            .map_err(transport_error)?;
        read_list(check(response, table.as_str()).await?).await
    }

    /// `GET <base>/<table>?limit=<n>&sort=<field>`
    async fn recent<T: DeserializeOwned>(&self, table: Table, limit: usize) -> PortResult<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("limit", limit.to_string()), ("sort", "created_at".to_string())])
            .send()
            .await
            .map_err(transport_error)?;
        read_list(check(response, table.as_str()).await?).await
    }

    /// `POST <base>/<table>`
    async fn create<T: Serialize>(&self, table: Table, body: &T) -> PortResult<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check(response, table.as_str()).await?;
        Ok(())
    }

    /// `PATCH <base>/<table>/<id>`
    async fn patch(&self, table: Table, id: &str, body: Map<String, Value>) -> PortResult<()> {
        debug!("PATCH {}/{}: {:?}", table.as_str(), id, body);
        let response = self
            .client
            .patch(self.record_url(table, id))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        check(response, id).await?;
        Ok(())
    }

    /// `DELETE <base>/<table>/<id>`
    async fn delete(&self, table: Table, id: &str) -> PortResult<()> {
        let response = self
            .client
            .delete(self.record_url(table, id))
            .send()
            .await
            .map_err(transport_error)?;
        check(response, id).await?;
        Ok(())
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

async fn check(response: Response, what: &str) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(PortError::NotFound(what.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(PortError::Unexpected(format!(
        "table store returned {} for {}: {}",
        status, what, body
    )))
}

async fn read_list<T: DeserializeOwned>(response: Response) -> PortResult<Vec<T>> {
    let list: ListResponse<T> = response.json().await.map_err(transport_error)?;
    Ok(list.data)
}

//=========================================================================================
// Wire Shapes
//=========================================================================================
// Timestamps travel as milliseconds since the Unix epoch, enums as lowercase strings.

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

fn millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> PortResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PortError::Unexpected(format!("timestamp {} out of range", ms)))
}

fn parse<T: std::str::FromStr>(value: &str) -> PortResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

#[derive(Serialize, Deserialize)]
pub(crate) struct UsageRow {
    id: String,
    session_id: String,
    credits_remaining: u32,
    #[serde(default)]
    total_queries: u32,
    #[serde(default)]
    total_reports: u32,
    #[serde(default)]
    total_credits_used: u32,
    last_activity: i64,
}

impl UsageRow {
    fn from_domain(u: &UsageRecord) -> Self {
        Self {
            id: u.id.clone(),
            session_id: u.session_id.clone(),
            credits_remaining: u.credits_remaining,
            total_queries: u.total_queries,
            total_reports: u.total_reports,
            total_credits_used: u.total_credits_used,
            last_activity: millis(u.last_activity),
        }
    }

    fn to_domain(self) -> PortResult<UsageRecord> {
        Ok(UsageRecord {
            id: self.id,
            session_id: self.session_id,
            credits_remaining: self.credits_remaining,
            total_queries: self.total_queries,
            total_reports: self.total_reports,
            total_credits_used: self.total_credits_used,
            last_activity: from_millis(self.last_activity)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct QueryRow {
    id: String,
    question: String,
    depth: String,
    include_news: bool,
    include_blogs: bool,
    status: String,
    files_uploaded: u32,
    #[serde(default)]
    file_names: Vec<String>,
    estimated_time: u32,
    #[serde(default)]
    sources_found: u32,
    credits_used: u32,
    created_at: i64,
    #[serde(default)]
    completed_at: Option<i64>,
}

impl QueryRow {
    fn from_domain(q: &QueryRecord) -> Self {
        Self {
            id: q.id.clone(),
            question: q.question.clone(),
            depth: q.depth.as_str().to_string(),
            include_news: q.include_news,
            include_blogs: q.include_blogs,
            status: q.status.as_str().to_string(),
            files_uploaded: q.files_uploaded,
            file_names: q.file_names.clone(),
            estimated_time: q.estimated_time,
            sources_found: q.sources_found,
            credits_used: q.credits_used,
            created_at: millis(q.created_at),
            completed_at: q.completed_at.map(millis),
        }
    }

    fn to_domain(self) -> PortResult<QueryRecord> {
        Ok(QueryRecord {
            id: self.id,
            question: self.question,
            depth: parse(&self.depth)?,
            include_news: self.include_news,
            include_blogs: self.include_blogs,
            status: parse(&self.status)?,
            files_uploaded: self.files_uploaded,
            file_names: self.file_names,
            estimated_time: self.estimated_time,
            sources_found: self.sources_found,
            credits_used: self.credits_used,
            created_at: from_millis(self.created_at)?,
            completed_at: self.completed_at.map(from_millis).transpose()?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ResultRow {
    id: String,
    query_id: String,
    title: String,
    summary: String,
    key_findings: Vec<String>,
    detailed_analysis: String,
    conclusions: String,
    recommendations: Vec<String>,
    word_count: u32,
    reading_time: u32,
    created_at: i64,
    updated_at: i64,
}

impl ResultRow {
    fn from_domain(r: &ResultRecord) -> Self {
        Self {
            id: r.id.clone(),
            query_id: r.query_id.clone(),
            title: r.title.clone(),
            summary: r.summary.clone(),
            key_findings: r.key_findings.clone(),
            detailed_analysis: r.detailed_analysis.clone(),
            conclusions: r.conclusions.clone(),
            recommendations: r.recommendations.clone(),
            word_count: r.word_count,
            reading_time: r.reading_time,
            created_at: millis(r.created_at),
            updated_at: millis(r.updated_at),
        }
    }

    fn to_domain(self) -> PortResult<ResultRecord> {
        Ok(ResultRecord {
            id: self.id,
            query_id: self.query_id,
            title: self.title,
            summary: self.summary,
            key_findings: self.key_findings,
            detailed_analysis: self.detailed_analysis,
            conclusions: self.conclusions,
            recommendations: self.recommendations,
            word_count: self.word_count,
            reading_time: self.reading_time,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct CitationRow {
    id: String,
    result_id: String,
    source_type: String,
    title: String,
    url: String,
    author: String,
    publication_date: i64,
    excerpt: String,
    relevance_score: u8,
    created_at: i64,
}

impl CitationRow {
    fn from_domain(c: &CitationRecord) -> Self {
        Self {
            id: c.id.clone(),
            result_id: c.result_id.clone(),
            source_type: c.source_type.as_str().to_string(),
            title: c.title.clone(),
            url: c.url.clone(),
            author: c.author.clone(),
            publication_date: millis(c.publication_date),
            excerpt: c.excerpt.clone(),
            relevance_score: c.relevance_score,
            created_at: millis(c.created_at),
        }
    }

    fn to_domain(self) -> PortResult<CitationRecord> {
        Ok(CitationRecord {
            id: self.id,
            result_id: self.result_id,
            source_type: parse(&self.source_type)?,
            title: self.title,
            url: self.url,
            author: self.author,
            publication_date: from_millis(self.publication_date)?,
            excerpt: self.excerpt,
            relevance_score: self.relevance_score,
            created_at: from_millis(self.created_at)?,
        })
    }
}

/// The JSON body of a query patch. Only the fields set on the patch are sent.
pub(crate) fn query_patch_body(patch: &QueryPatch) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(status) = patch.status {
        body.insert("status".into(), json!(status.as_str()));
    }
    if let Some(sources) = patch.sources_found {
        body.insert("sources_found".into(), json!(sources));
    }
    if let Some(completed_at) = patch.completed_at {
        body.insert("completed_at".into(), json!(completed_at.map(millis)));
    }
    body
}

/// The JSON body of a usage patch. Always stamps `updated_at`.
pub(crate) fn usage_patch_body(patch: &UsagePatch, now: DateTime<Utc>) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(v) = patch.credits_remaining {
        body.insert("credits_remaining".into(), json!(v));
    }
    if let Some(v) = patch.total_queries {
        body.insert("total_queries".into(), json!(v));
    }
    if let Some(v) = patch.total_reports {
        body.insert("total_reports".into(), json!(v));
    }
    if let Some(v) = patch.total_credits_used {
        body.insert("total_credits_used".into(), json!(v));
    }
    if let Some(v) = patch.last_activity {
        body.insert("last_activity".into(), json!(millis(v)));
    }
    body.insert("updated_at".into(), json!(millis(now)));
    body
}

//=========================================================================================
// `ResearchStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResearchStore for TablesAdapter {
    async fn find_usage(&self, session_id: &str) -> PortResult<Option<UsageRecord>> {
        let rows: Vec<UsageRow> = self.search(Table::UserUsage, session_id).await?;
        // `search` is a fuzzy match; keep only the exact session.
        rows.into_iter()
            .find(|r| r.session_id == session_id)
            .map(UsageRow::to_domain)
            .transpose()
    }

    async fn create_usage(&self, usage: &UsageRecord) -> PortResult<()> {
        self.create(Table::UserUsage, &UsageRow::from_domain(usage))
            .await
    }

    async fn patch_usage(&self, usage_id: &str, patch: &UsagePatch) -> PortResult<()> {
        self.patch(Table::UserUsage, usage_id, usage_patch_body(patch, Utc::now()))
            .await
    }

    async fn create_query(&self, query: &QueryRecord) -> PortResult<()> {
        self.create(Table::ResearchQueries, &QueryRow::from_domain(query))
            .await
    }

    async fn patch_query(&self, query_id: &str, patch: &QueryPatch) -> PortResult<()> {
        self.patch(Table::ResearchQueries, query_id, query_patch_body(patch))
            .await
    }

    async fn recent_queries(&self, limit: usize) -> PortResult<Vec<QueryRecord>> {
        let rows: Vec<QueryRow> = self.recent(Table::ResearchQueries, limit).await?;
        let mut queries = rows
            .into_iter()
            .map(QueryRow::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        queries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        queries.truncate(limit);
        Ok(queries)
    }

    async fn create_result(&self, result: &ResultRecord) -> PortResult<()> {
        self.create(Table::ResearchResults, &ResultRow::from_domain(result))
            .await
    }

    async fn recent_results(&self, limit: usize) -> PortResult<Vec<ResultRecord>> {
        let rows: Vec<ResultRow> = self.recent(Table::ResearchResults, limit).await?;
        let mut results = rows
            .into_iter()
            .map(ResultRow::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit);
        Ok(results)
    }

    async fn create_citation(&self, citation: &CitationRecord) -> PortResult<()> {
        self.create(Table::Citations, &CitationRow::from_domain(citation))
            .await
    }

    async fn citations_for_result(&self, result_id: &str) -> PortResult<Vec<CitationRecord>> {
        let rows: Vec<CitationRow> = self.search(Table::Citations, result_id).await?;
        rows.into_iter()
            .filter(|r| r.result_id == result_id)
            .map(CitationRow::to_domain)
            .collect()
    }

    async fn delete_result(&self, result_id: &str) -> PortResult<()> {
        self.delete(Table::ResearchResults, result_id).await
    }

    async fn delete_citation(&self, citation_id: &str) -> PortResult<()> {
        self.delete(Table::Citations, citation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_assistant_core::domain::{QueryStatus, ReportDepth};

    #[test]
    fn query_patch_only_carries_set_fields() {
        let mut patch = QueryPatch::status(QueryStatus::Searching);
        patch.sources_found = Some(18);
        assert_eq!(
            Value::Object(query_patch_body(&patch)),
            json!({ "status": "searching", "sources_found": 18 })
        );

        let clear = QueryPatch {
            status: Some(QueryStatus::Generating),
            completed_at: Some(None),
            ..QueryPatch::default()
        };
        assert_eq!(
            Value::Object(query_patch_body(&clear)),
            json!({ "status": "generating", "completed_at": null })
        );
    }

    #[test]
    fn usage_patch_stamps_updated_at() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let patch = UsagePatch {
            credits_remaining: Some(47),
            ..UsagePatch::default()
        };
        assert_eq!(
            Value::Object(usage_patch_body(&patch, now)),
            json!({ "credits_remaining": 47, "updated_at": 1_700_000_000_000i64 })
        );
    }

    #[test]
    fn query_row_uses_millis_and_lowercase_enums() {
        let created_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let query = QueryRecord {
            id: "query_1".to_string(),
            question: "Why?".to_string(),
            depth: ReportDepth::Comprehensive,
            include_news: true,
            include_blogs: false,
            status: QueryStatus::Pending,
            files_uploaded: 1,
            file_names: vec!["a.pdf".to_string()],
            estimated_time: 130,
            sources_found: 0,
            credits_used: 3,
            created_at,
            completed_at: None,
        };
        let value = serde_json::to_value(QueryRow::from_domain(&query)).unwrap();
        assert_eq!(value["depth"], "comprehensive");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["created_at"], 1_700_000_000_123i64);
        assert_eq!(value["completed_at"], Value::Null);
    }

    #[test]
    fn list_envelope_tolerates_missing_data_and_extra_fields() {
        let empty: ListResponse<UsageRow> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.data.is_empty());

        let list: ListResponse<CitationRow> = serde_json::from_value(json!({
            "data": [{
                "id": "citation_x_1",
                "result_id": "result_x",
                "source_type": "news",
                "title": "t",
                "url": "https://example.com",
                "author": "a",
                "publication_date": 0,
                "excerpt": "e",
                "relevance_score": 88,
                "created_at": 0,
                "gs_project_id": "ignored"
            }],
            "total": 1
        }))
        .unwrap();
        let citation = list.data.into_iter().next().unwrap().to_domain().unwrap();
        assert_eq!(citation.relevance_score, 88);
        assert_eq!(citation.source_type.as_str(), "news");
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let bad = CitationRow {
            id: "c".into(),
            result_id: "r".into(),
            source_type: "podcast".into(),
            title: String::new(),
            url: String::new(),
            author: String::new(),
            publication_date: 0,
            excerpt: String::new(),
            relevance_score: 1,
            created_at: 0,
        };
        assert!(bad.to_domain().is_err());
    }

    #[test]
    fn urls_are_built_from_the_base() {
        let adapter = TablesAdapter::new(Client::new(), "http://store.local/tables/");
        assert_eq!(
            adapter.table_url(Table::ResearchQueries),
            "http://store.local/tables/research_queries"
        );
        assert_eq!(
            adapter.record_url(Table::UserUsage, "usage_1"),
            "http://store.local/tables/user_usage/usage_1"
        );
    }
}
