//! Request/response contract for driving scans over any transport
//!
//! Requests and replies are plain `serde` types. Field names follow the
//! scan form: `start_ip`, `end_ip`, `ports`, `current`.

use crate::error::ScanError;
use crate::output::{self, CsvExport};
use crate::scanner::{ProbeResult, ScanEngine};
use serde::{Deserialize, Serialize};

/// Action marker of an export request
pub const EXPORT_ACTION: &str = "export_csv";

/// Scan one chunk starting at `current`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub start_ip: String,
    pub end_ip: String,
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    pub current: u64,
}

/// Progress-only query; nothing is scanned.
///
/// The `progress` field only has to be present. Its value (`true`, `1`,
/// `"1"`, even `false`) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRequest {
    pub start_ip: String,
    pub end_ip: String,
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    pub current: u64,
    pub progress: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub action: String,
    pub data: Vec<ProbeResult>,
}

/// Any request, told apart by which fields are present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiRequest {
    Export(ExportRequest),
    Progress(ProgressRequest),
    Chunk(ChunkRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReply {
    pub results: Vec<ProbeResult>,
    /// New cursor
    pub current: u64,
    /// Addresses in the range
    pub total: u64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReply {
    pub progress: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

impl From<&ScanError> for ErrorReply {
    fn from(err: &ScanError) -> Self {
        Self { error: err.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Chunk(ChunkReply),
    Progress(ProgressReply),
    Error(ErrorReply),
}

impl ApiResponse {
    fn error(err: ScanError) -> Self {
        log::warn!("Request rejected: {}", err);
        ApiResponse::Error(ErrorReply::from(&err))
    }
}

/// What a request produces: a JSON document or a CSV download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiReply {
    Json(ApiResponse),
    Csv(CsvExport),
}

/// Validate the definition, probe one chunk, report the new cursor
pub async fn handle_chunk(engine: &ScanEngine, request: &ChunkRequest) -> ApiResponse {
    let session = match engine.open_session(&request.start_ip, &request.end_ip, &request.ports) {
        Ok(session) => session.with_cursor(request.current),
        Err(e) => return ApiResponse::error(e),
    };

    let response = engine.next_chunk(&session).await;
    ApiResponse::Chunk(ChunkReply {
        results: response.results,
        current: response.new_cursor,
        total: session.total_address_count(),
        completed: response.complete,
    })
}

/// Echo `current` with the probe total of the definition
pub fn handle_progress(engine: &ScanEngine, request: &ProgressRequest) -> ApiResponse {
    match engine.open_session(&request.start_ip, &request.end_ip, &request.ports) {
        Ok(session) => ApiResponse::Progress(ProgressReply {
            progress: request.current,
            total: session.total_probe_count(),
        }),
        Err(e) => ApiResponse::error(e),
    }
}

pub fn handle_export(request: &ExportRequest) -> crate::Result<CsvExport> {
    if request.action != EXPORT_ACTION {
        return Err(ScanError::ParseError(format!("Unknown action: {}", request.action)));
    }
    output::export_csv(&request.data)
}

pub async fn handle_request(engine: &ScanEngine, request: &ApiRequest) -> ApiReply {
    match request {
        ApiRequest::Export(export) => match handle_export(export) {
            Ok(csv) => ApiReply::Csv(csv),
            Err(e) => ApiReply::Json(ApiResponse::error(e)),
        },
        ApiRequest::Progress(progress) => ApiReply::Json(handle_progress(engine, progress)),
        ApiRequest::Chunk(chunk) => ApiReply::Json(handle_chunk(engine, chunk).await),
    }
}

/// Parse a JSON request body and handle it. Malformed bodies get an error reply.
pub async fn handle_json(engine: &ScanEngine, body: &str) -> ApiReply {
    match serde_json::from_str::<ApiRequest>(body) {
        Ok(request) => handle_request(engine, &request).await,
        Err(e) => ApiReply::Json(ApiResponse::error(ScanError::ParseError(e.to_string()))),
    }
}
