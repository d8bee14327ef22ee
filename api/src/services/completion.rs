//! Course completion detection.
//!
//! Runs after every progress-affecting write. Completion is a one-way edge:
//! once an enrollment is marked complete it never reverts, even if the course
//! structure later changes underneath it.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait};
use tracing::{error, info};

use db::models::course::CourseSections;
use db::models::{course, enrollment};

use super::EngineError;
use super::certificate::CertificateIssuer;

/// Snapshot of where an enrollment stands against the course requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionStatus {
    pub total_lectures: usize,
    pub completed_lectures: usize,
    pub all_lectures_completed: bool,
    pub all_quizzes_passed: bool,
    pub is_completed: bool,
}

/// Evaluates an enrollment against the current course structure. Pure.
///
/// Every lecture in the structure must be completed and every section with a
/// non-empty quiz must hold a passing attempt. A course with no lectures and
/// no quizzes is vacuously complete. Lecture records and quiz attempts for
/// parts no longer in the structure are ignored.
pub fn evaluate(enrollment: &enrollment::Model, sections: &CourseSections) -> CompletionStatus {
    let total_lectures = sections.total_lectures();
    let completed_lectures = enrollment.lecture_progress.completed_lectures_in(sections);
    let all_lectures_completed = completed_lectures == total_lectures;

    let all_quizzes_passed = sections.sections_with_quiz().all(|section| {
        enrollment
            .quiz_attempts
            .attempt_for(section.id)
            .is_some_and(|attempt| attempt.passed)
    });

    CompletionStatus {
        total_lectures,
        completed_lectures,
        all_lectures_completed,
        all_quizzes_passed,
        is_completed: all_lectures_completed && all_quizzes_passed,
    }
}

/// Detector entry point, called after every progress-affecting write.
///
/// Never propagates failure to the triggering write: anything that goes wrong
/// here is logged and the next triggering event re-converges.
pub async fn check_course_completion(
    db: &DatabaseConnection,
    issuer: &CertificateIssuer,
    enrollment_id: i64,
) {
    if let Err(err) = run_detector(db, issuer, enrollment_id).await {
        error!(enrollment_id, error = %err, "completion detector failed");
    }
}

async fn run_detector(
    db: &DatabaseConnection,
    issuer: &CertificateIssuer,
    enrollment_id: i64,
) -> Result<(), EngineError> {
    let enrollment = enrollment::Entity::find_by_id(enrollment_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found("Enrollment"))?;
    let course = course::Entity::find_by_id(enrollment.course_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found("Course"))?;

    // Completed enrollments stay completed regardless of what evaluate()
    // would say against today's structure.
    let complete = enrollment.is_completed || evaluate(&enrollment, &course.sections).is_completed;
    if !complete {
        return Ok(());
    }

    let enrollment = if enrollment.is_completed {
        enrollment
    } else {
        let marked = enrollment::ActiveModel {
            id: Set(enrollment.id),
            is_completed: Set(true),
            completed_at: Set(Some(Utc::now())),
            progress: Set(100),
            ..Default::default()
        }
        .update(db)
        .await?;
        info!(
            enrollment_id,
            course_id = marked.course_id,
            "enrollment completed"
        );
        marked
    };

    if course.certificate_enabled && !enrollment.certificate_generated {
        issuer.issue(db, &enrollment, &course).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{progress, quiz, testkit};
    use db::test_utils::setup_test_db;
    use sea_orm::EntityTrait;

    #[test]
    fn test_evaluate_requires_all_lectures_and_quizzes() {
        let (sections, ids) = testkit::lecture_only_sections(2);
        let ctx_log = testkit::progress_log_for(&ids[..1]);

        let enrollment = testkit::bare_enrollment(ctx_log, Default::default());
        let status = evaluate(&enrollment, &sections);
        assert_eq!(status.completed_lectures, 1);
        assert!(!status.all_lectures_completed);
        assert!(status.all_quizzes_passed); // no quizzes to pass
        assert!(!status.is_completed);

        let enrollment = testkit::bare_enrollment(testkit::progress_log_for(&ids), Default::default());
        let status = evaluate(&enrollment, &sections);
        assert!(status.is_completed);
    }

    #[test]
    fn test_evaluate_empty_course_is_vacuously_complete() {
        let enrollment = testkit::bare_enrollment(Default::default(), Default::default());
        let status = evaluate(&enrollment, &CourseSections::default());
        assert_eq!(status.total_lectures, 0);
        assert!(status.is_completed);
    }

    #[test]
    fn test_evaluate_ignores_failed_quiz_attempts() {
        let (sections, lecture_id, section_id) = testkit::lecture_and_quiz_sections(None);
        let log = testkit::progress_log_for(&[lecture_id]);

        let failed = testkit::attempt_log_for(section_id, 50, false);
        let enrollment = testkit::bare_enrollment(log.clone(), failed);
        assert!(!evaluate(&enrollment, &sections).is_completed);

        let passed = testkit::attempt_log_for(section_id, 100, true);
        let enrollment = testkit::bare_enrollment(log, passed);
        assert!(evaluate(&enrollment, &sections).is_completed);
    }

    #[tokio::test]
    async fn test_last_lecture_completes_and_issues_certificate() {
        // End to end: watch both lectures, pass the quiz, and the detector
        // marks completion and issues exactly one certificate.
        let db = setup_test_db().await;
        let (sections, lecture_id, section_id) = testkit::lecture_and_quiz_sections(None);
        let ctx = testkit::seed_enrollment(&db, sections.clone(), true).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();

        let outcome = quiz::submit_quiz(&db, ctx.enrollment, &ctx.course, section_id, &[0, 1])
            .await
            .unwrap();
        assert!(outcome.passed);
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let mid = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!mid.is_completed);

        progress::mark_lecture_watched(&db, mid, &sections, lecture_id, 300)
            .await
            .unwrap();
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let done = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.progress, 100);
        assert!(done.certificate_generated);
        assert!(done.certificate_id.is_some());
        assert_eq!(mocks.notifier.sent(), 1);
    }

    #[tokio::test]
    async fn test_failing_then_passing_quiz_completes_with_latest_attempt() {
        let db = setup_test_db().await;
        let (sections, lecture_id, section_id) = testkit::lecture_and_quiz_sections(None);
        let ctx = testkit::seed_enrollment(&db, sections.clone(), true).await;
        let (issuer, _mocks) = testkit::issuer_with_mocks();

        let watched =
            progress::mark_lecture_watched(&db, ctx.enrollment, &sections, lecture_id, 300)
                .await
                .unwrap();

        let failed = quiz::submit_quiz(&db, watched, &ctx.course, section_id, &[1, 0])
            .await
            .unwrap();
        assert!(!failed.passed);
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let mid = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!mid.is_completed);

        let passed = quiz::submit_quiz(&db, mid, &ctx.course, section_id, &[0, 1])
            .await
            .unwrap();
        assert!(passed.passed);
        assert!(passed.is_retake);
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let done = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(done.is_completed);
        assert_eq!(done.quiz_attempts.0.len(), 1);
    }

    #[tokio::test]
    async fn test_detector_is_idempotent_after_completion() {
        let db = setup_test_db().await;
        let (sections, ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections.clone(), true).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();

        progress::mark_lecture_watched(&db, ctx.enrollment, &sections, ids[0], 60)
            .await
            .unwrap();
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;
        let first = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let completed_at = first.completed_at;

        check_course_completion(&db, &issuer, ctx.enrollment_id).await;
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let after = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.completed_at, completed_at);
        assert_eq!(mocks.notifier.sent(), 1);
        assert_eq!(db::models::Certificate::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_certificate_when_course_has_certification_disabled() {
        let db = setup_test_db().await;
        let (sections, ids) = testkit::lecture_only_sections(1);
        let ctx = testkit::seed_enrollment(&db, sections.clone(), false).await;
        let (issuer, mocks) = testkit::issuer_with_mocks();

        progress::mark_lecture_watched(&db, ctx.enrollment, &sections, ids[0], 60)
            .await
            .unwrap();
        check_course_completion(&db, &issuer, ctx.enrollment_id).await;

        let done = db::models::Enrollment::find_by_id(ctx.enrollment_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(done.is_completed);
        assert!(!done.certificate_generated);
        assert_eq!(mocks.notifier.sent(), 0);
        assert!(db::models::Certificate::find().all(&db).await.unwrap().is_empty());
    }
}
