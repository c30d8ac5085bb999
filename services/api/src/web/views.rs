//! services/api/src/web/views.rs
//!
//! JSON shapes handed to the browser. Each view is built from a core record.

use chrono::{DateTime, Utc};
use research_assistant_core::domain::{CitationRecord, QueryRecord, ResultRecord, UsageRecord};
use research_assistant_core::report::{self, SIMULATED_SOURCES_FOUND};
use research_assistant_core::upload::FileDescriptor;
use research_assistant_core::DashboardStats;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct UsageView {
    pub credits_remaining: u32,
    pub total_queries: u32,
    pub total_reports: u32,
    pub total_credits_used: u32,
    pub last_activity: DateTime<Utc>,
}

impl From<&UsageRecord> for UsageView {
    fn from(u: &UsageRecord) -> Self {
        Self {
            credits_remaining: u.credits_remaining,
            total_queries: u.total_queries,
            total_reports: u.total_reports,
            total_credits_used: u.total_credits_used,
            last_activity: u.last_activity,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct StagedFileView {
    pub name: String,
    pub size: u64,
    pub media_type: String,
}

impl From<&FileDescriptor> for StagedFileView {
    fn from(f: &FileDescriptor) -> Self {
        Self {
            name: f.name.clone(),
            size: f.size_bytes,
            media_type: f.media_type.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct QueryView {
    pub id: String,
    pub question: String,
    pub depth: String,
    pub status: String,
    pub files_uploaded: u32,
    pub sources_found: u32,
    pub credits_used: u32,
    pub estimated_time: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&QueryRecord> for QueryView {
    fn from(q: &QueryRecord) -> Self {
        Self {
            id: q.id.clone(),
            question: q.question.clone(),
            depth: q.depth.as_str().to_string(),
            status: q.status.as_str().to_string(),
            files_uploaded: q.files_uploaded,
            sources_found: q.sources_found,
            credits_used: q.credits_used,
            estimated_time: q.estimated_time,
            created_at: q.created_at,
            completed_at: q.completed_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ResultView {
    pub id: String,
    pub query_id: String,
    pub title: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub detailed_analysis: String,
    pub conclusions: String,
    pub recommendations: Vec<String>,
    pub word_count: u32,
    pub reading_time: u32,
    pub sources: u32,
    pub created_at: DateTime<Utc>,
}

impl From<&ResultRecord> for ResultView {
    fn from(r: &ResultRecord) -> Self {
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
            sources: SIMULATED_SOURCES_FOUND,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct CitationView {
    pub id: String,
    pub source_type: String,
    pub source_label: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub excerpt: String,
    pub relevance_score: u8,
}

impl From<&CitationRecord> for CitationView {
    fn from(c: &CitationRecord) -> Self {
        Self {
            id: c.id.clone(),
            source_type: c.source_type.as_str().to_string(),
            source_label: report::source_label(c.source_type).to_string(),
            title: c.title.clone(),
            url: c.url.clone(),
            author: c.author.clone(),
            publication_date: c.publication_date,
            excerpt: c.excerpt.clone(),
            relevance_score: c.relevance_score,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct DashboardStatsView {
    pub total_reports: u32,
    pub credits_remaining: u32,
    pub total_credits_used: u32,
}

impl From<&DashboardStats> for DashboardStatsView {
    fn from(s: &DashboardStats) -> Self {
        Self {
            total_reports: s.total_reports,
            credits_remaining: s.credits_remaining,
            total_credits_used: s.total_credits_used,
        }
    }
}
