//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{MemoryAdapter, SimulatedStageExecutor, TablesAdapter},
    config::{Config, StoreBackend},
    error::ApiError,
    web::{
        build_router,
        state::{spawn_session_sweeper, AppState},
    },
};
use research_assistant_core::ports::ResearchStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the Store ---
    let store: Arc<dyn ResearchStore> = match &config.store {
        StoreBackend::Tables { base_url } => {
            info!("Using the table store at {}", base_url);
            let client = reqwest::Client::builder().build()?;
            Arc::new(TablesAdapter::new(client, base_url.clone()))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; records are lost on restart.");
            Arc::new(MemoryAdapter::new())
        }
    };

    // --- 3. Build the Shared AppState ---
    let executor = Arc::new(SimulatedStageExecutor::new(config.stage_duration_scale));
    let app_state = Arc::new(AppState::new(store, executor, config.clone()));

    // --- 4. Create the Web Router ---
    spawn_session_sweeper(app_state.clone());
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
