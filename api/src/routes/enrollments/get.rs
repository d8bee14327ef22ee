//! Read-side enrollment handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use db::models::{certificate, enrollment};

use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::routes::enrollments::common::{CertificateResponse, EnrollmentStatusResponse};
use crate::services::storage::ArtifactRef;
use crate::state::AppState;

/// GET /api/enrollments
///
/// Lists the caller's enrollments, most recent first.
pub async fn get_enrollments(State(state): State<AppState>, AuthUser(claims): AuthUser) -> Response {
    match enrollment::Model::list_for_student(state.db(), claims.sub).await {
        Ok(enrollments) => (
            StatusCode::OK,
            Json(ApiResponse::success(enrollments, "Enrollments retrieved")),
        )
            .into_response(),
        Err(err) => db_error(err),
    }
}

/// GET /api/enrollments/{course_id}
///
/// Enrollment status for one course. Answers 200 with `enrolled: false`
/// rather than 404 when the caller never enrolled.
pub async fn get_enrollment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(course_id): Path<i64>,
) -> Response {
    match enrollment::Model::find_by_student_and_course(state.db(), claims.sub, course_id).await {
        Ok(enrollment) => {
            let status = EnrollmentStatusResponse {
                enrolled: enrollment.is_some(),
                enrollment,
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(status, "Enrollment status retrieved")),
            )
                .into_response()
        }
        Err(err) => db_error(err),
    }
}

/// GET /api/enrollments/certificates
///
/// The caller's certificates, each with a time-limited download URL when the
/// artifact has been stored.
pub async fn list_certificates(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Response {
    match certificate::Model::list_for_student(state.db(), claims.sub).await {
        Ok(certificates) => {
            let items: Vec<CertificateResponse> = certificates
                .into_iter()
                .map(|cert| {
                    let download_url = artifact_of(&cert)
                        .map(|artifact| state.issuer().store().resolve(&artifact));
                    CertificateResponse {
                        certificate: cert,
                        download_url,
                    }
                })
                .collect();
            (
                StatusCode::OK,
                Json(ApiResponse::success(items, "Certificates retrieved")),
            )
                .into_response()
        }
        Err(err) => db_error(err),
    }
}

/// GET /api/enrollments/certificates/{certificate_token}/download
///
/// Redirects to a signed, time-limited URL for the stored document. 404 when
/// the certificate does not exist, belongs to someone else, or has no
/// artifact yet.
pub async fn download_certificate(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(certificate_token): Path<String>,
) -> Response {
    let cert = match certificate::Model::find_by_token(state.db(), &certificate_token).await {
        Ok(Some(cert)) => cert,
        Ok(None) => return not_found("Certificate not found"),
        Err(err) => return db_error(err),
    };

    if cert.student_id != claims.sub && !claims.admin {
        // Existence of someone else's certificate is not disclosed.
        return not_found("Certificate not found");
    }

    let Some(artifact) = artifact_of(&cert) else {
        return not_found("Certificate document is not available yet");
    };

    let url = state.issuer().store().resolve(&artifact);
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

fn artifact_of(cert: &certificate::Model) -> Option<ArtifactRef> {
    match (&cert.artifact_ref, &cert.resource_kind) {
        (Some(public_id), Some(resource_kind)) => Some(ArtifactRef {
            public_id: public_id.clone(),
            resource_kind: resource_kind.clone(),
        }),
        _ => None,
    }
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<crate::auth::guards::Empty>::error(message)),
    )
        .into_response()
}

fn db_error(err: sea_orm::DbErr) -> Response {
    tracing::error!(error = %err, "database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<crate::auth::guards::Empty>::error(
            "Internal server error",
        )),
    )
        .into_response()
}
