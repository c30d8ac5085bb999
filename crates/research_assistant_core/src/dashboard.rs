//! crates/research_assistant_core/src/dashboard.rs
//!
//! Read-only aggregate of recent activity and the session's counters.

use tracing::error;

use crate::domain::{QueryRecord, ResultRecord};
use crate::ports::ResearchStore;

/// How many recent queries and results the dashboard shows.
pub const DASHBOARD_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_reports: u32,
    pub credits_remaining: u32,
    pub total_credits_used: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_queries: Vec<QueryRecord>,
    pub recent_results: Vec<ResultRecord>,
}

/// Fetches the three sections concurrently. A failing fetch leaves its section empty
/// (or zeroed) and does not affect the others.
pub async fn load_dashboard(store: &dyn ResearchStore, session_id: &str) -> Dashboard {
    let (queries, results, usage) = futures::join!(
        store.recent_queries(DASHBOARD_HISTORY_LIMIT),
        store.recent_results(DASHBOARD_HISTORY_LIMIT),
        store.find_usage(session_id),
    );

    let recent_queries = queries.unwrap_or_else(|e| {
        error!("Error loading queries: {}", e);
        Vec::new()
    });
    let recent_results = results.unwrap_or_else(|e| {
        error!("Error loading results: {}", e);
        Vec::new()
    });
    let stats = match usage {
        Ok(Some(usage)) => DashboardStats {
            total_reports: usage.total_reports,
            credits_remaining: usage.credits_remaining,
            total_credits_used: usage.total_credits_used,
        },
        Ok(None) => DashboardStats::default(),
        Err(e) => {
            error!("Error loading usage: {}", e);
            DashboardStats::default()
        }
    };

    Dashboard {
        stats,
        recent_queries,
        recent_results,
    }
}
