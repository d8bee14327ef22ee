//! Write-side enrollment handlers. Each mutating handler runs the completion
//! detector after its write and answers with the post-detector snapshot.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::EntityTrait;
use uuid::Uuid;

use db::models::{certificate, course, enrollment};

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::routes::enrollments::common::{
    MarkLectureRequest, QuizOutcomeResponse, SubmitQuizRequest, engine_error_response,
};
use crate::services::completion::check_course_completion;
use crate::services::{EngineError, progress, quiz};
use crate::state::AppState;

/// POST /api/enrollments/{course_id}
///
/// Enrolls the caller in a course. 409 when already enrolled.
pub async fn enroll(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(course_id): Path<i64>,
) -> Response {
    let result: Result<Option<enrollment::Model>, EngineError> = async {
        course::Entity::find_by_id(course_id)
            .one(state.db())
            .await?
            .ok_or_else(|| EngineError::not_found("Course"))?;

        if enrollment::Model::find_by_student_and_course(state.db(), claims.sub, course_id)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let enrollment = enrollment::Model::create(state.db(), claims.sub, course_id).await?;
        Ok(Some(enrollment))
    }
    .await;

    match result {
        Ok(Some(enrollment)) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(enrollment, "Enrolled in course")),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<crate::auth::guards::Empty>::error(
                "Already enrolled in this course",
            )),
        )
            .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

/// POST /api/enrollments/{course_id}/lectures/{lecture_id}/complete
///
/// Marks a lecture as watched, runs the completion detector, and returns the
/// refreshed enrollment.
pub async fn mark_lecture_complete(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((course_id, lecture_id)): Path<(i64, Uuid)>,
    Json(payload): Json<MarkLectureRequest>,
) -> Response {
    let result: Result<enrollment::Model, EngineError> = async {
        let (enrollment, course) = load_enrollment(&state, claims.sub, course_id).await?;

        let updated = progress::mark_lecture_watched(
            state.db(),
            enrollment,
            &course.sections,
            lecture_id,
            payload.watch_time.unwrap_or(0),
        )
        .await?;

        check_course_completion(state.db(), state.issuer(), updated.id).await;
        refreshed(&state, updated.id).await
    }
    .await;

    match result {
        Ok(enrollment) => (
            StatusCode::OK,
            Json(ApiResponse::success(enrollment, "Lecture marked as completed")),
        )
            .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

/// POST /api/enrollments/{course_id}/sections/{section_id}/quiz
///
/// Grades a quiz submission, records the attempt, runs the completion
/// detector, and returns the outcome with the refreshed enrollment.
pub async fn submit_quiz(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((course_id, section_id)): Path<(i64, Uuid)>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Response {
    let result: Result<QuizOutcomeResponse, EngineError> = async {
        let (enrollment, course) = load_enrollment(&state, claims.sub, course_id).await?;

        let outcome =
            quiz::submit_quiz(state.db(), enrollment, &course, section_id, &payload.answers)
                .await?;

        check_course_completion(state.db(), state.issuer(), outcome.enrollment.id).await;
        let enrollment = refreshed(&state, outcome.enrollment.id).await?;

        Ok(QuizOutcomeResponse {
            score: outcome.score,
            passed: outcome.passed,
            correct_answers: outcome.correct_answers,
            total_questions: outcome.total_questions,
            is_retake: outcome.is_retake,
            enrollment,
        })
    }
    .await;

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(outcome, "Quiz submitted")),
        )
            .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

/// POST /api/enrollments/certificates/{certificate_token}/reissue
///
/// Regenerates the stored document for an issued certificate. Restricted to
/// the course instructor and admins.
pub async fn reissue_certificate(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(certificate_token): Path<String>,
) -> Response {
    let result: Result<Option<certificate::Model>, EngineError> = async {
        let cert = certificate::Model::find_by_token(state.db(), &certificate_token)
            .await?
            .ok_or_else(|| EngineError::not_found("Certificate"))?;
        let course = course::Entity::find_by_id(cert.course_id)
            .one(state.db())
            .await?
            .ok_or_else(|| EngineError::not_found("Course"))?;

        if course.instructor_id != claims.sub && !claims.admin {
            return Ok(None);
        }

        let reissued = state.issuer().reissue(state.db(), &cert).await?;
        Ok(Some(reissued))
    }
    .await;

    match result {
        Ok(Some(cert)) => (
            StatusCode::OK,
            Json(ApiResponse::success(cert, "Certificate regenerated")),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::<crate::auth::guards::Empty>::error(
                "Only the course instructor may regenerate a certificate",
            )),
        )
            .into_response(),
        Err(err) => engine_error_response(err).into_response(),
    }
}

async fn load_enrollment(
    state: &AppState,
    student_id: i64,
    course_id: i64,
) -> Result<(enrollment::Model, course::Model), EngineError> {
    let course = course::Entity::find_by_id(course_id)
        .one(state.db())
        .await?
        .ok_or_else(|| EngineError::not_found("Course"))?;
    let enrollment = enrollment::Model::find_by_student_and_course(state.db(), student_id, course_id)
        .await?
        .ok_or_else(|| EngineError::not_found("Enrollment"))?;
    Ok((enrollment, course))
}

/// Re-reads the enrollment after the detector has run, so the response shows
/// any completion or issuance effects.
async fn refreshed(state: &AppState, enrollment_id: i64) -> Result<enrollment::Model, EngineError> {
    enrollment::Entity::find_by_id(enrollment_id)
        .one(state.db())
        .await?
        .ok_or_else(|| EngineError::not_found("Enrollment"))
}
