//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use research_assistant_core::ports::{
    ProgressEvent, ProgressReporter, ResearchStore, StageExecutor,
};
use research_assistant_core::{ReportPipeline, ResearchSession};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Buffered progress messages per session before slow subscribers start lagging.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: Arc<dyn ResearchStore>,
    pub pipeline: ReportPipeline,
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ResearchStore>,
        executor: Arc<dyn StageExecutor>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            pipeline: ReportPipeline::new(store.clone(), executor),
            store,
            config,
            sessions: SessionRegistry::default(),
        }
    }
}

//=========================================================================================
// SessionEntry (Specific to One Browser Session)
//=========================================================================================

/// The live state of one session: its context, its progress channel and whether a
/// report run is in flight.
pub struct SessionEntry {
    pub session: Mutex<ResearchSession>,
    pub progress: broadcast::Sender<ServerMessage>,
    running: AtomicBool,
    last_seen: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    pub fn new(session: ResearchSession) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            session: Mutex::new(session),
            progress,
            running: AtomicBool::new(false),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// Idle, with no run in flight and no socket listening.
    fn is_evictable(&self, max_idle: Duration) -> bool {
        !self.is_running()
            && self.progress.receiver_count() == 0
            && self.idle_for() >= max_idle
    }

    /// Marks a run as started. Returns false if one is already in flight.
    pub fn try_start_run(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish_run(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sends a message to every connected socket. Nobody listening is not an error.
    pub fn publish(&self, message: ServerMessage) {
        let _ = self.progress.send(message);
    }

    pub fn reporter(&self) -> BroadcastReporter {
        BroadcastReporter {
            sender: self.progress.clone(),
        }
    }
}

/// All sessions opened since startup, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    pub async fn insert(&self, session: ResearchSession) -> Arc<SessionEntry> {
        let id = session.session_id.clone();
        let entry = Arc::new(SessionEntry::new(session));
        self.entries.write().await.insert(id, entry.clone());
        entry
    }

    /// Looks up a session and marks it as seen.
    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.entries.read().await.get(session_id).cloned()?;
        entry.touch();
        Some(entry)
    }

    /// Drops every session idle for at least `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_evictable(max_idle));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Periodically evicts sessions idle for longer than the configured timeout.
pub fn spawn_session_sweeper(app_state: Arc<AppState>) -> JoinHandle<()> {
    let max_idle = app_state.config.session_idle_timeout;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(max_idle.max(Duration::from_secs(1)) / 2);
        loop {
            interval.tick().await;
            let evicted = app_state.sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                info!(
                    "Evicted {} idle sessions; {} remain.",
                    evicted,
                    app_state.sessions.len().await
                );
            }
        }
    })
}

//=========================================================================================
// Progress Reporting
//=========================================================================================

/// Forwards pipeline progress onto a session's broadcast channel.
pub struct BroadcastReporter {
    sender: broadcast::Sender<ServerMessage>,
}

impl ProgressReporter for BroadcastReporter {
    fn report(&self, event: ProgressEvent) {
        if let Some(message) = ServerMessage::from_progress(event) {
            let _ = self.sender.send(message);
        }
    }
}
