//! Certificate issuance orchestration: render, persist, deliver, then flip
//! the one-way guard. At most once per enrollment, even when completion
//! triggers race.
//!
//! Ordering matters: the certificate row and the stored artifact exist
//! before the enrollment guard flips. A crash mid-pipeline leaves an
//! orphaned-but-discoverable certificate that the next trigger (or an
//! explicit re-issue) repairs, never a guarded enrollment with no
//! certificate behind it.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{info, warn};
use uuid::Uuid;

use db::models::{certificate, course, enrollment, user};

use super::EngineError;
use super::email::{CertificateNotifier, SmtpCertificateNotifier};
use super::renderer::{DocumentRenderer, HttpDocumentRenderer, RenderRequest};
use super::storage::{HttpObjectStore, ObjectStore, UploadMetadata};

const CERTIFICATE_FOLDER: &str = "certificates";
const DEFAULT_TEMPLATE: &str = "classic";

/// Orchestrates certificate issuance against the three external
/// collaborators. Cheap to clone; the collaborators live behind `Arc`s.
#[derive(Clone)]
pub struct CertificateIssuer {
    renderer: Arc<dyn DocumentRenderer>,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn CertificateNotifier>,
}

impl CertificateIssuer {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn CertificateNotifier>,
    ) -> Self {
        Self {
            renderer,
            store,
            notifier,
        }
    }

    /// Production wiring: HTTP renderer, HTTP object store, SMTP delivery.
    pub fn from_config() -> Self {
        Self::new(
            Arc::new(HttpDocumentRenderer::from_config()),
            Arc::new(HttpObjectStore::from_config()),
            Arc::new(SmtpCertificateNotifier),
        )
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Issues a certificate for a completed enrollment.
    ///
    /// Re-checks the issuance guard first: callers racing past the
    /// detector's own check land here and return the existing certificate.
    /// Failure anywhere before the final guard flip leaves the guard clear,
    /// so the next completion-triggering event retries issuance; every step
    /// before the flip tolerates partial prior runs (render and upload redo
    /// cleanly, certificate creation is check-then-create).
    pub async fn issue(
        &self,
        db: &DatabaseConnection,
        enrollment: &enrollment::Model,
        course: &course::Model,
    ) -> Result<certificate::Model, EngineError> {
        if enrollment.certificate_generated {
            return certificate::Model::find_for_pair(db, enrollment.student_id, course.id)
                .await?
                .ok_or_else(|| {
                    EngineError::Invariant(format!(
                        "enrollment {} is flagged as certified but has no certificate",
                        enrollment.id
                    ))
                });
        }

        let student = user::Entity::find_by_id(enrollment.student_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::not_found("Student"))?;
        let instructor = user::Entity::find_by_id(course.instructor_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::not_found("Instructor"))?;

        let token = format!("CERT-{}", Uuid::new_v4());
        let request = RenderRequest {
            student_name: student.full_name.clone(),
            course_title: course.title.clone(),
            instructor_name: instructor.full_name,
            completed_at: enrollment.completed_at.unwrap_or_else(Utc::now),
            template: course
                .certificate_template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.into()),
        };

        let document = self
            .renderer
            .render(&request)
            .await
            .map_err(|err| EngineError::External(format!("certificate render failed: {err}")))?;

        let artifact = self
            .store
            .upload(
                &document,
                &UploadMetadata {
                    public_id: token.clone(),
                    folder: CERTIFICATE_FOLDER.into(),
                    format: "pdf".into(),
                },
            )
            .await?;

        let cert =
            certificate::Model::find_or_create(db, enrollment.student_id, course.id, &token).await?;
        let cert =
            certificate::Model::set_artifact(db, cert.id, &artifact.public_id, &artifact.resource_kind)
                .await?;

        self.notifier
            .send_certificate(
                &student.email,
                &student.full_name,
                &course.title,
                &cert.certificate_id,
                &document,
            )
            .await?;

        if enrollment::Model::claim_certificate_flag(db, enrollment.id).await? {
            enrollment::Model::link_certificate(db, enrollment.id, cert.id).await?;
            info!(
                enrollment_id = enrollment.id,
                certificate = %cert.certificate_id,
                "certificate issued"
            );
        } else {
            // Two completion triggers raced the whole pipeline; the pair
            // index already collapsed them onto one certificate row.
            warn!(
                enrollment_id = enrollment.id,
                "issuance guard already claimed by a concurrent attempt"
            );
        }

        Ok(cert)
    }

    /// Regenerates the artifact of an already-issued certificate and
    /// overwrites its reference. Operator-triggered recovery; never creates
    /// a second certificate for the pair.
    pub async fn reissue(
        &self,
        db: &DatabaseConnection,
        cert: &certificate::Model,
    ) -> Result<certificate::Model, EngineError> {
        let student = user::Entity::find_by_id(cert.student_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::not_found("Student"))?;
        let course = course::Entity::find_by_id(cert.course_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::not_found("Course"))?;
        let instructor = user::Entity::find_by_id(course.instructor_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::not_found("Instructor"))?;

        let enrollment =
            enrollment::Model::find_by_student_and_course(db, cert.student_id, cert.course_id)
                .await?;
        let completed_at = enrollment
            .and_then(|e| e.completed_at)
            .unwrap_or(cert.issued_at);

        let request = RenderRequest {
            student_name: student.full_name,
            course_title: course.title,
            instructor_name: instructor.full_name,
            completed_at,
            template: course
                .certificate_template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.into()),
        };

        let document = self
            .renderer
            .render(&request)
            .await
            .map_err(|err| EngineError::External(format!("certificate render failed: {err}")))?;

        let artifact = self
            .store
            .upload(
                &document,
                &UploadMetadata {
                    public_id: cert.certificate_id.clone(),
                    folder: CERTIFICATE_FOLDER.into(),
                    format: "pdf".into(),
                },
            )
            .await?;

        let updated =
            certificate::Model::set_artifact(db, cert.id, &artifact.public_id, &artifact.resource_kind)
                .await?;
        info!(certificate = %updated.certificate_id, "certificate artifact regenerated");

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::completion::check_course_completion;
    use crate::services::testkit;
    use db::test_utils::setup_test_db;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_issue_is_guarded_and_links_certificate() {
        let db = setup_test_db().await;
        let (sections, _ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections, true).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();

        let cert = issuer.issue(&db, &ctx.enrollment, &ctx.course).await.unwrap();
        assert!(cert.certificate_id.starts_with("CERT-"));
        assert_eq!(mocks.notifier.sent(), 1);
        assert_eq!(mocks.store.uploads(), 1);

        let fresh = db::models::Enrollment::find_by_id(ctx.enrollment.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(fresh.certificate_generated);
        assert_eq!(fresh.certificate_id, Some(cert.id));

        // Second call sees the guard and returns the same certificate
        // without touching the collaborators again.
        let again = issuer.issue(&db, &fresh, &ctx.course).await.unwrap();
        assert_eq!(again.id, cert.id);
        assert_eq!(mocks.notifier.sent(), 1);
        assert_eq!(mocks.store.uploads(), 1);
    }

    #[tokio::test]
    async fn test_renderer_failure_leaves_guard_clear_then_retry_succeeds() {
        // Scenario: renderer down on the first attempt. No certificate may
        // exist and the guard must stay clear so a replayed trigger can
        // issue later, exactly once.
        let db = setup_test_db().await;
        let (sections, ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections.clone(), true).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();
        mocks.renderer.set_fail(true);

        crate::services::progress::mark_lecture_watched(&db, ctx.enrollment, &sections, ids[0], 60)
            .await
            .unwrap();
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let after_failure = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(after_failure.is_completed);
        assert!(!after_failure.certificate_generated);
        assert!(db::models::Certificate::find().all(&db).await.unwrap().is_empty());
        assert_eq!(mocks.notifier.sent(), 0);

        // Renderer recovers; a replayed completion call issues exactly once.
        mocks.renderer.set_fail(false);
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let recovered = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(recovered.certificate_generated);
        assert_eq!(db::models::Certificate::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(mocks.notifier.sent(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_issuance_produces_one_certificate() {
        let db = setup_test_db().await;
        let (sections, _ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections, true).await;
        let (issuer, _mocks) = testkit::issuer_with_mocks();

        let (left, right) = tokio::join!(
            issuer.issue(&db, &ctx.enrollment, &ctx.course),
            issuer.issue(&db, &ctx.enrollment, &ctx.course),
        );
        let left = left.unwrap();
        let right = right.unwrap();
        assert_eq!(left.id, right.id);

        let certificates = db::models::Certificate::find().all(&db).await.unwrap();
        assert_eq!(certificates.len(), 1);

        let fresh = db::models::Enrollment::find_by_id(ctx.enrollment.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(fresh.certificate_generated);
    }

    #[tokio::test]
    async fn test_reissue_overwrites_artifact_without_duplicating() {
        let db = setup_test_db().await;
        let (sections, _ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections, true).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();

        let cert = issuer.issue(&db, &ctx.enrollment, &ctx.course).await.unwrap();
        let reissued = issuer.reissue(&db, &cert).await.unwrap();

        assert_eq!(reissued.id, cert.id);
        assert_eq!(reissued.certificate_id, cert.certificate_id);
        assert_eq!(mocks.store.uploads(), 2);
        assert_eq!(db::models::Certificate::find().all(&db).await.unwrap().len(), 1);
        // Delivery happens only on first issuance, not on re-issue.
        assert_eq!(mocks.notifier.sent(), 1);
    }
}
