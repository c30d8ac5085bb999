//! crates/research_assistant_core/src/session.rs
//!
//! The explicit per-session context passed to each operation. The store owns the
//! durable fields; `ResearchSession::usage` is a cache that is refreshed from it.

use chrono::Utc;
use rand::{distributions::Uniform, Rng};
use tracing::{info, warn};

use crate::domain::UsageRecord;
use crate::ports::ResearchStore;
use crate::upload::UploadStaging;

/// Credits a new session starts with.
pub const DEFAULT_STARTING_CREDITS: u32 = 50;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates an id of the form `session_<9 base36 chars><epoch millis>`.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let alphabet = Uniform::from(0..BASE36.len());
    let random: String = (0..9)
        .map(|_| BASE36[rng.sample(alphabet)] as char)
        .collect();
    format!("session_{}{}", random, Utc::now().timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct ResearchSession {
    pub session_id: String,
    pub usage: UsageRecord,
    pub uploads: UploadStaging,
    /// The result shown after the most recent successful run.
    pub last_result_id: Option<String>,
}

impl ResearchSession {
    /// Opens the session `session_id`, loading its usage ledger or creating one with
    /// `starting_credits` when the store has none. Store failures are logged and the
    /// session falls back to an unsaved default ledger.
    pub async fn open(store: &dyn ResearchStore, session_id: &str, starting_credits: u32) -> Self {
        let usage = match store.find_usage(session_id).await {
            Ok(Some(usage)) => {
                info!(
                    "Loaded usage for session {}: {} credits remaining.",
                    session_id, usage.credits_remaining
                );
                usage
            }
            Ok(None) => {
                let usage = UsageRecord::new(session_id, starting_credits, Utc::now());
                if let Err(e) = store.create_usage(&usage).await {
                    warn!("Failed to create usage record for session {}: {}", session_id, e);
                }
                usage
            }
            Err(e) => {
                warn!("Error initializing usage for session {}: {}", session_id, e);
                UsageRecord::new(session_id, starting_credits, Utc::now())
            }
        };

        Self {
            session_id: session_id.to_string(),
            usage,
            uploads: UploadStaging::new(),
            last_result_id: None,
        }
    }

    /// Replaces the cached ledger with the store's copy. Keeps the cache if the store
    /// cannot be reached or has no record.
    pub async fn refresh_usage(&mut self, store: &dyn ResearchStore) {
        match store.find_usage(&self.session_id).await {
            Ok(Some(usage)) => self.usage = usage,
            Ok(None) => warn!("No usage record found for session {}.", self.session_id),
            Err(e) => warn!("Error loading usage for session {}: {}", self.session_id, e),
        }
    }

    /// Starts a new research: forgets the staged files and the last result.
    /// A run already in flight is not affected.
    pub fn reset(&mut self) {
        self.uploads.clear();
        self.last_result_id = None;
    }
}
