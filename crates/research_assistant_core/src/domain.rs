//! crates/research_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any store or serialization format; the
//! adapters translate them to and from their wire shapes.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Credits debited from the usage ledger for every completed report.
pub const CREDITS_PER_REPORT: u32 = 3;

/// Returned when a string does not name a known variant of one of the domain enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

//=========================================================================================
// Enumerations
//=========================================================================================

/// How long a report should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportDepth {
    Brief,
    Detailed,
    Comprehensive,
}

impl ReportDepth {
    pub const ALL: [ReportDepth; 3] = [Self::Brief, Self::Detailed, Self::Comprehensive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }

    /// Word count of a report generated at this depth.
    pub fn word_count(&self) -> u32 {
        match self {
            Self::Brief => 500,
            Self::Detailed => 1500,
            Self::Comprehensive => 3000,
        }
    }

    /// Base of the advisory time estimate, in seconds.
    pub fn base_estimate_secs(&self) -> u32 {
        match self {
            Self::Brief => 30,
            Self::Detailed => 60,
            Self::Comprehensive => 120,
        }
    }
}

impl fmt::Display for ReportDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportDepth {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brief" => Ok(Self::Brief),
            "detailed" => Ok(Self::Detailed),
            "comprehensive" => Ok(Self::Comprehensive),
            other => Err(ParseEnumError::new("report depth", other)),
        }
    }
}

/// The lifecycle of a query record. Transitions only ever move one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryStatus {
    Pending,
    Analyzing,
    Searching,
    Processing,
    Generating,
    Completed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Searching => "searching",
            Self::Processing => "processing",
            Self::Generating => "generating",
            Self::Completed => "completed",
        }
    }

    /// The status that follows this one, or `None` once completed.
    pub fn next(&self) -> Option<QueryStatus> {
        match self {
            Self::Pending => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Searching),
            Self::Searching => Some(Self::Processing),
            Self::Processing => Some(Self::Generating),
            Self::Generating => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn can_transition_to(&self, to: QueryStatus) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "analyzing" => Ok(Self::Analyzing),
            "searching" => Ok(Self::Searching),
            "processing" => Ok(Self::Processing),
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("query status", other)),
        }
    }
}

/// One named phase of the report pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Analyzing,
    Searching,
    Processing,
    Generating,
}

impl Stage {
    /// The fixed order in which the pipeline runs its stages.
    pub const ALL: [Stage; 4] = [
        Self::Analyzing,
        Self::Searching,
        Self::Processing,
        Self::Generating,
    ];

    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Analyzing => 0,
            Self::Searching => 1,
            Self::Processing => 2,
            Self::Generating => 3,
        }
    }

    /// The query status written when this stage begins.
    pub fn status(&self) -> QueryStatus {
        match self {
            Self::Analyzing => QueryStatus::Analyzing,
            Self::Searching => QueryStatus::Searching,
            Self::Processing => QueryStatus::Processing,
            Self::Generating => QueryStatus::Generating,
        }
    }

    /// Simulated work time of the stage, in milliseconds.
    pub fn simulated_duration_ms(&self) -> u64 {
        match self {
            Self::Analyzing => 2000,
            Self::Searching => 4000,
            Self::Processing => 6000,
            Self::Generating => 8000,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a citation claims to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    Academic,
    News,
    Blog,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::News => "news",
            Self::Blog => "blog",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(Self::Academic),
            "news" => Ok(Self::News),
            "blog" => Ok(Self::Blog),
            other => Err(ParseEnumError::new("source type", other)),
        }
    }
}

//=========================================================================================
// Records
//=========================================================================================

/// The credit ledger of one browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub id: String,
    pub session_id: String,
    pub credits_remaining: u32,
    pub total_queries: u32,
    pub total_reports: u32,
    pub total_credits_used: u32,
    pub last_activity: DateTime<Utc>,
}

impl UsageRecord {
    /// A fresh ledger holding `starting_credits` and zeroed counters.
    pub fn new(session_id: &str, starting_credits: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("usage_{}", uuid::Uuid::new_v4().simple()),
            session_id: session_id.to_string(),
            credits_remaining: starting_credits,
            total_queries: 0,
            total_reports: 0,
            total_credits_used: 0,
            last_activity: now,
        }
    }

    pub fn can_afford_report(&self) -> bool {
        self.credits_remaining >= CREDITS_PER_REPORT
    }
}

/// One submitted research request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub id: String,
    pub question: String,
    pub depth: ReportDepth,
    pub include_news: bool,
    pub include_blogs: bool,
    pub status: QueryStatus,
    pub files_uploaded: u32,
    pub file_names: Vec<String>,
    /// Advisory estimate in seconds.
    pub estimated_time: u32,
    pub sources_found: u32,
    pub credits_used: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The generated report of a completed query. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub id: String,
    pub query_id: String,
    pub title: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    /// HTML fragment.
    pub detailed_analysis: String,
    pub conclusions: String,
    pub recommendations: Vec<String>,
    pub word_count: u32,
    /// Minutes.
    pub reading_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationRecord {
    pub id: String,
    pub result_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub url: String,
    pub author: String,
    pub publication_date: DateTime<Utc>,
    pub excerpt: String,
    pub relevance_score: u8,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Partial updates
//=========================================================================================

/// Fields merged into an existing query record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPatch {
    pub status: Option<QueryStatus>,
    pub sources_found: Option<u32>,
    /// `Some(None)` clears the completion time.
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl QueryPatch {
    pub fn status(status: QueryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Fields merged into an existing usage record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsagePatch {
    pub credits_remaining: Option<u32>,
    pub total_queries: Option<u32>,
    pub total_reports: Option<u32>,
    pub total_credits_used: Option<u32>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl UsagePatch {
    /// Applies the patch to a local copy, mirroring what the store does.
    pub fn apply_to(&self, usage: &mut UsageRecord) {
        if let Some(v) = self.credits_remaining {
            usage.credits_remaining = v;
        }
        if let Some(v) = self.total_queries {
            usage.total_queries = v;
        }
        if let Some(v) = self.total_reports {
            usage.total_reports = v;
        }
        if let Some(v) = self.total_credits_used {
            usage.total_credits_used = v;
        }
        if let Some(v) = self.last_activity {
            usage.last_activity = v;
        }
    }
}

impl QueryPatch {
    pub fn apply_to(&self, query: &mut QueryRecord) {
        if let Some(status) = self.status {
            query.status = status;
        }
        if let Some(sources) = self.sources_found {
            query.sources_found = sources;
        }
        if let Some(completed_at) = self.completed_at {
            query.completed_at = completed_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_walks_forward_one_step_at_a_time() {
        let mut current = QueryStatus::Pending;
        let mut seen = vec![current];
        while let Some(next) = current.next() {
            seen.push(next);
            current = next;
        }
        assert_eq!(
            seen,
            vec![
                QueryStatus::Pending,
                QueryStatus::Analyzing,
                QueryStatus::Searching,
                QueryStatus::Processing,
                QueryStatus::Generating,
                QueryStatus::Completed,
            ]
        );
        assert!(!QueryStatus::Pending.can_transition_to(QueryStatus::Searching));
        assert!(!QueryStatus::Completed.can_transition_to(QueryStatus::Pending));
    }

    #[test]
    fn stages_map_onto_the_middle_statuses() {
        let statuses: Vec<_> = Stage::ALL.iter().map(|s| s.status()).collect();
        assert_eq!(
            statuses,
            vec![
                QueryStatus::Analyzing,
                QueryStatus::Searching,
                QueryStatus::Processing,
                QueryStatus::Generating,
            ]
        );
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn stage_durations_are_fixed() {
        let ms: Vec<_> = Stage::ALL.iter().map(|s| s.simulated_duration_ms()).collect();
        assert_eq!(ms, vec![2000, 4000, 6000, 8000]);
    }

    #[test]
    fn enums_parse_their_own_names() {
        for depth in ReportDepth::ALL {
            assert_eq!(depth.as_str().parse::<ReportDepth>(), Ok(depth));
        }
        assert_eq!("news".parse::<SourceType>(), Ok(SourceType::News));
        let err = "exhaustive".parse::<ReportDepth>().unwrap_err();
        assert_eq!(err.to_string(), "unknown report depth 'exhaustive'");
    }

    #[test]
    fn new_ledger_starts_with_zeroed_counters() {
        let usage = UsageRecord::new("session_abc", 50, Utc::now());
        assert_eq!(usage.credits_remaining, 50);
        assert_eq!(usage.total_reports, 0);
        assert!(usage.id.starts_with("usage_"));
        assert!(usage.can_afford_report());

        let broke = UsageRecord {
            credits_remaining: 2,
            ..usage
        };
        assert!(!broke.can_afford_report());
    }
}
