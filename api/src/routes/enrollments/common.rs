//! Request and response shapes shared by the enrollment handlers.

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::error;

use db::models::{certificate, enrollment};

use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::services::EngineError;

#[derive(Debug, Deserialize)]
pub struct MarkLectureRequest {
    /// Seconds spent on the lecture. Missing or negative is treated as zero.
    pub watch_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<i32>,
}

/// Tolerant status shape: a 200 with `enrolled: false` rather than a 404 when
/// the caller has no enrollment for the course.
#[derive(Debug, Serialize, Default)]
pub struct EnrollmentStatusResponse {
    pub enrolled: bool,
    pub enrollment: Option<enrollment::Model>,
}

/// Quiz outcome plus the post-detector enrollment snapshot, so clients see
/// the effect on `progress` and `is_completed` without a second request.
#[derive(Debug, Serialize)]
pub struct QuizOutcomeResponse {
    pub score: i32,
    pub passed: bool,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub is_retake: bool,
    pub enrollment: enrollment::Model,
}

#[derive(Debug, Serialize)]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub certificate: certificate::Model,
    /// Time-limited signed URL, absent while the artifact is still pending.
    pub download_url: Option<String>,
}

/// Maps an engine error onto the standard response envelope. Internal detail
/// stays in the logs; clients get the category message only.
pub fn engine_error_response(err: EngineError) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let status = err.status();
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }

    let message = match &err {
        EngineError::Validation { .. } | EngineError::NotFound(_) => err.to_string(),
        EngineError::External(_) => "An upstream service is unavailable".to_string(),
        EngineError::Db(_) | EngineError::Invariant(_) => "Internal server error".to_string(),
    };

    (status, Json(ApiResponse::error(message)))
}
