//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{
    protocol::ServerMessage,
    report_task::report_process,
    state::{AppState, SessionEntry},
    views::{
        CitationView, DashboardStatsView, QueryView, ResultView, StagedFileView, UsageView,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use research_assistant_core::{
    generate_session_id, load_dashboard, report, FileDescriptor, PipelineError, ReportDepth,
    ReportPipeline, ResearchRequest, ResearchSession,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        get_usage_handler,
        stage_uploads_handler,
        remove_upload_handler,
        submit_report_handler,
        dashboard_handler,
        reset_handler,
        citations_handler,
    ),
    components(
        schemas(
            CreateSessionResponse,
            UsageView,
            StagedFileView,
            FilePayload,
            StageUploadsRequest,
            RejectedFile,
            StageUploadsResponse,
            SubmitReportRequest,
            SubmitReportResponse,
            DashboardResponse,
            DashboardStatsView,
            QueryView,
            ResultView,
            CitationView,
            ServerMessage,
        )
    ),
    tags(
        (name = "Research Assistant API", description = "API endpoints for the simulated research report generator.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after opening a session.
#[derive(Serialize, ToSchema)]
pub struct CreateSessionResponse {
    session_id: String,
    usage: UsageView,
}

/// A file the browser wants to attach. Only its metadata is sent.
#[derive(Deserialize, ToSchema)]
pub struct FilePayload {
    name: String,
    size: u64,
    media_type: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StageUploadsRequest {
    files: Vec<FilePayload>,
}

#[derive(Serialize, ToSchema)]
pub struct RejectedFile {
    name: String,
    message: String,
}

#[derive(Serialize, ToSchema)]
pub struct StageUploadsResponse {
    accepted: Vec<String>,
    rejected: Vec<RejectedFile>,
    /// Every file staged for the session after this batch.
    staged: Vec<StagedFileView>,
}

fn default_depth() -> String {
    ReportDepth::Detailed.as_str().to_string()
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitReportRequest {
    question: String,
    /// One of `brief`, `detailed` or `comprehensive`.
    #[serde(default = "default_depth")]
    depth: String,
    #[serde(default)]
    include_news: bool,
    #[serde(default)]
    include_blogs: bool,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitReportResponse {
    query_id: String,
    estimated_time: u32,
    /// The estimate rendered as `"{m}m {s}s"`.
    estimated_time_display: String,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    stats: DashboardStatsView,
    recent_queries: Vec<QueryView>,
    recent_results: Vec<ResultView>,
}

type HandlerError = (StatusCode, String);

async fn find_session(
    app_state: &AppState,
    session_id: &str,
) -> Result<Arc<SessionEntry>, HandlerError> {
    app_state.sessions.get(session_id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    })
}

fn staged_files(session: &ResearchSession) -> Vec<StagedFileView> {
    session.uploads.files().iter().map(StagedFileView::from).collect()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Open a new research session.
///
/// Creates the session's usage ledger in the store, or falls back to an unsaved
/// default ledger if the store cannot be reached.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session opened", body = CreateSessionResponse)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let session_id = generate_session_id();
    let session = ResearchSession::open(
        app_state.store.as_ref(),
        &session_id,
        app_state.config.starting_credits,
    )
    .await;
    let usage = UsageView::from(&session.usage);
    app_state.sessions.insert(session).await;
    info!("Session {} opened.", session_id);

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, usage }),
    ))
}

/// Refresh and return the session's usage ledger.
#[utoipa::path(
    get,
    path = "/sessions/{id}/usage",
    params(("id" = String, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Current usage", body = UsageView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_usage_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = find_session(&app_state, &session_id).await?;
    let mut session = entry.session.lock().await;
    session.refresh_usage(app_state.store.as_ref()).await;
    Ok(Json(UsageView::from(&session.usage)))
}

/// Stage a batch of files for the next report.
///
/// Each file is checked on its own; a rejected file does not affect the others.
#[utoipa::path(
    post,
    path = "/sessions/{id}/uploads",
    params(("id" = String, Path, description = "The session id.")),
    request_body = StageUploadsRequest,
    responses(
        (status = 200, description = "Per-file outcome", body = StageUploadsResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn stage_uploads_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<StageUploadsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = find_session(&app_state, &session_id).await?;
    let batch: Vec<FileDescriptor> = payload
        .files
        .into_iter()
        .map(|f| FileDescriptor {
            name: f.name,
            size_bytes: f.size,
            media_type: f.media_type,
        })
        .collect();
    let names: Vec<String> = batch.iter().map(|f| f.name.clone()).collect();

    let mut session = entry.session.lock().await;
    let outcomes = session.uploads.stage_batch(batch);

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            Ok(()) => accepted.push(name),
            Err(rejection) => {
                warn!("Session {}: upload rejected: {}", session_id, rejection);
                rejected.push(RejectedFile {
                    name: rejection.file_name().to_string(),
                    message: rejection.user_message().to_string(),
                });
            }
        }
    }

    Ok(Json(StageUploadsResponse {
        accepted,
        rejected,
        staged: staged_files(&session),
    }))
}

/// Remove a staged file by name.
#[utoipa::path(
    delete,
    path = "/sessions/{id}/uploads/{name}",
    params(
        ("id" = String, Path, description = "The session id."),
        ("name" = String, Path, description = "The staged file's name.")
    ),
    responses(
        (status = 200, description = "The remaining staged files", body = [StagedFileView]),
        (status = 404, description = "Unknown session or file")
    )
)]
pub async fn remove_upload_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = find_session(&app_state, &session_id).await?;
    let mut session = entry.session.lock().await;
    if session.uploads.remove(&name) == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No staged file named {}", name),
        ));
    }
    Ok(Json(staged_files(&session)))
}

/// Submit a research question.
///
/// Validation happens before anything is written. The pipeline then runs in the
/// background and reports progress on the session's WebSocket.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reports",
    params(("id" = String, Path, description = "The session id.")),
    request_body = SubmitReportRequest,
    responses(
        (status = 202, description = "Run started", body = SubmitReportResponse),
        (status = 400, description = "Empty question or unknown depth"),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "A run is already in progress for this session")
    )
)]
pub async fn submit_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<SubmitReportRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = find_session(&app_state, &session_id).await?;
    let depth = payload
        .depth
        .parse::<ReportDepth>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let request = ResearchRequest {
        question: payload.question,
        depth,
        include_news: payload.include_news,
        include_blogs: payload.include_blogs,
    };

    if !entry.try_start_run() {
        return Err((
            StatusCode::CONFLICT,
            "A report is already being generated for this session".to_string(),
        ));
    }

    let (snapshot, query) = {
        let mut session = entry.session.lock().await;
        session.refresh_usage(app_state.store.as_ref()).await;
        if let Err(e) = ReportPipeline::validate(&session, &request) {
            entry.finish_run();
            let status = match e {
                PipelineError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
                _ => StatusCode::BAD_REQUEST,
            };
            return Err((status, e.user_message()));
        }
        let query = ReportPipeline::new_query(&session, &request);
        (session.clone(), query)
    };

    let response = SubmitReportResponse {
        query_id: query.id.clone(),
        estimated_time: query.estimated_time,
        estimated_time_display: report::format_estimate(query.estimated_time),
    };
    info!(
        "Session {}: starting report for query {}.",
        session_id, response.query_id
    );
    tokio::spawn(report_process(app_state.clone(), entry, snapshot, query));

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Recent activity and the session's counters.
#[utoipa::path(
    get,
    path = "/sessions/{id}/dashboard",
    params(("id" = String, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Dashboard aggregate", body = DashboardResponse),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    find_session(&app_state, &session_id).await?;
    let dashboard = load_dashboard(app_state.store.as_ref(), &session_id).await;

    Ok(Json(DashboardResponse {
        stats: DashboardStatsView::from(&dashboard.stats),
        recent_queries: dashboard.recent_queries.iter().map(QueryView::from).collect(),
        recent_results: dashboard.recent_results.iter().map(ResultView::from).collect(),
    }))
}

/// Start a new research: clears the staged files and the last result.
///
/// A run already in flight carries on and still reports its outcome.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    params(("id" = String, Path, description = "The session id.")),
    responses(
        (status = 204, description = "Session reset"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn reset_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = find_session(&app_state, &session_id).await?;
    entry.session.lock().await.reset();
    info!("Session {} reset.", session_id);
    Ok(StatusCode::NO_CONTENT)
}

/// The citations attached to a result.
#[utoipa::path(
    get,
    path = "/results/{id}/citations",
    params(("id" = String, Path, description = "The result id.")),
    responses(
        (status = 200, description = "Citations", body = [CitationView]),
        (status = 502, description = "Store error")
    )
)]
pub async fn citations_handler(
    State(app_state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    match app_state.store.citations_for_result(&result_id).await {
        Ok(citations) => Ok(Json(
            citations.iter().map(CitationView::from).collect::<Vec<_>>(),
        )),
        Err(e) => {
            let e = ApiError::from(e);
            error!("Failed to load citations for {}: {}", result_id, e);
            Err((e.status_code(), "Failed to load citations".to_string()))
        }
    }
}
