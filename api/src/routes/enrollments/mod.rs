//! Enrollment route group: enrollment lifecycle, lecture progress, quiz
//! submission, and certificate access.

pub mod common;
pub mod get;
pub mod post;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Builds the `/enrollments` route group. The authentication guard is
/// layered on by the caller.
pub fn enrollment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get::get_enrollments))
        .route("/certificates", get(get::list_certificates))
        .route(
            "/certificates/{certificate_token}/download",
            get(get::download_certificate),
        )
        .route(
            "/certificates/{certificate_token}/reissue",
            post(post::reissue_certificate),
        )
        .route("/{course_id}", get(get::get_enrollment).post(post::enroll))
        .route(
            "/{course_id}/lectures/{lecture_id}/complete",
            post(post::mark_lecture_complete),
        )
        .route(
            "/{course_id}/sections/{section_id}/quiz",
            post(post::submit_quiz),
        )
}
