pub mod dashboard;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod report;
pub mod session;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use dashboard::{load_dashboard, Dashboard, DashboardStats};
pub use domain::{
    CitationRecord, QueryPatch, QueryRecord, QueryStatus, ReportDepth, ResultRecord, SourceType,
    Stage, UsagePatch, UsageRecord, CREDITS_PER_REPORT,
};
pub use pipeline::{CompletedReport, PipelineError, ReportPipeline, ResearchRequest};
pub use ports::{
    NotificationLevel, PortError, PortResult, ProgressEvent, ProgressReporter, ResearchStore,
    StageExecutor,
};
pub use session::{generate_session_id, ResearchSession, DEFAULT_STARTING_CREDITS};
pub use upload::{FileDescriptor, UploadRejection, UploadStaging};
