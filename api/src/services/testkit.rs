//! Shared fixtures and mock collaborators for service tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use db::models::course::{
    self, CourseSection, CourseSections, QuizOption, QuizQuestion, SectionLecture, SectionQuiz,
};
use db::models::enrollment::{
    self, AttemptAnswer, LectureProgress, LectureProgressLog, QuizAttempt, QuizAttemptLog,
};
use db::models::user;

use super::EngineError;
use super::certificate::CertificateIssuer;
use super::email::CertificateNotifier;
use super::renderer::{DocumentRenderer, RenderRequest, RendererError, fallback_document};
use super::storage::{ArtifactRef, ObjectStore, UploadMetadata};

/// A course of `count` lectures spread over one section, no quizzes.
/// Returns the structure and the lecture ids in order.
pub fn lecture_only_sections(count: usize) -> (CourseSections, Vec<Uuid>) {
    let lectures: Vec<SectionLecture> = (0..count)
        .map(|index| SectionLecture {
            id: Uuid::new_v4(),
            title: format!("Lecture {}", index + 1),
        })
        .collect();
    let ids = lectures.iter().map(|lecture| lecture.id).collect();

    let sections = CourseSections(vec![CourseSection {
        id: Uuid::new_v4(),
        title: "Section 1".into(),
        lectures,
        quiz: None,
    }]);
    (sections, ids)
}

/// Two questions whose correct options are index 0 and index 1 respectively,
/// so `[0, 1]` scores 100 and `[1, 1]` scores 50.
pub fn two_question_quiz(passing_score: Option<i32>) -> SectionQuiz {
    let question = |text: &str, correct: usize| QuizQuestion {
        id: Uuid::new_v4(),
        text: text.into(),
        options: (0..3)
            .map(|index| QuizOption {
                text: format!("Option {}", index + 1),
                is_correct: index == correct,
            })
            .collect(),
    };

    SectionQuiz {
        questions: vec![question("First question", 0), question("Second question", 1)],
        passing_score,
    }
}

/// One section holding a single lecture plus the two-question quiz.
/// Returns the structure, the lecture id, and the section id.
pub fn lecture_and_quiz_sections(passing_score: Option<i32>) -> (CourseSections, Uuid, Uuid) {
    let lecture = SectionLecture {
        id: Uuid::new_v4(),
        title: "Lecture 1".into(),
    };
    let lecture_id = lecture.id;
    let section_id = Uuid::new_v4();

    let sections = CourseSections(vec![CourseSection {
        id: section_id,
        title: "Section 1".into(),
        lectures: vec![lecture],
        quiz: Some(two_question_quiz(passing_score)),
    }]);
    (sections, lecture_id, section_id)
}

pub fn progress_log_for(lecture_ids: &[Uuid]) -> LectureProgressLog {
    LectureProgressLog(
        lecture_ids
            .iter()
            .map(|&lecture_id| LectureProgress {
                lecture_id,
                completed: true,
                completed_at: Some(Utc::now()),
                watch_time: 60,
            })
            .collect(),
    )
}

pub fn attempt_log_for(section_id: Uuid, score: i32, passed: bool) -> QuizAttemptLog {
    QuizAttemptLog(vec![QuizAttempt {
        section_id,
        answers: vec![AttemptAnswer {
            question_id: Uuid::new_v4(),
            selected_option: 0,
        }],
        score,
        passed,
        attempted_at: Utc::now(),
    }])
}

/// An enrollment model that never touches the database, for pure functions.
pub fn bare_enrollment(
    lecture_progress: LectureProgressLog,
    quiz_attempts: QuizAttemptLog,
) -> enrollment::Model {
    enrollment::Model {
        id: 1,
        student_id: 1,
        course_id: 1,
        enrolled_at: Utc::now(),
        progress: 0,
        is_completed: false,
        completed_at: None,
        lecture_progress,
        quiz_attempts,
        certificate_generated: false,
        certificate_id: None,
    }
}

pub struct SeededEnrollment {
    pub student: user::Model,
    pub course: course::Model,
    pub enrollment: enrollment::Model,
    pub enrollment_id: i64,
}

/// Seeds a student, an instructor, a course with the given structure, and a
/// fresh enrollment.
pub async fn seed_enrollment(
    db: &DatabaseConnection,
    sections: CourseSections,
    certificate_enabled: bool,
) -> SeededEnrollment {
    let student = user::Model::create(db, "Thandi Mokoena", "thandi@example.com", "x", false)
        .await
        .unwrap();
    let instructor = user::Model::create(db, "Pieter Venter", "pieter@example.com", "x", false)
        .await
        .unwrap();
    let course = course::Model::create(
        db,
        "Intro to Rust",
        instructor.id,
        sections,
        certificate_enabled,
        None,
    )
    .await
    .unwrap();
    let enrollment = enrollment::Model::create(db, student.id, course.id)
        .await
        .unwrap();
    let enrollment_id = enrollment.id;

    SeededEnrollment {
        student,
        course,
        enrollment,
        enrollment_id,
    }
}

/// Renderer mock: deterministic bytes, or failure when told to fail.
pub struct MockRenderer {
    fail: AtomicBool,
}

impl MockRenderer {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentRenderer for MockRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RendererError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RendererError::NotConfigured);
        }
        Ok(fallback_document(request))
    }
}

/// Object store mock that counts uploads and resolves to a fixed base URL.
pub struct MemoryStore {
    upload_count: AtomicUsize,
}

impl MemoryStore {
    pub fn uploads(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, _bytes: &[u8], meta: &UploadMetadata) -> Result<ArtifactRef, EngineError> {
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        Ok(ArtifactRef {
            public_id: format!("{}/{}", meta.folder, meta.public_id),
            resource_kind: "raw".into(),
        })
    }

    fn resolve(&self, artifact: &ArtifactRef) -> String {
        format!("memory://{}/{}", artifact.resource_kind, artifact.public_id)
    }
}

/// Notifier mock that only counts deliveries.
pub struct RecordingNotifier {
    sent_count: AtomicUsize,
}

impl RecordingNotifier {
    pub fn sent(&self) -> usize {
        self.sent_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateNotifier for RecordingNotifier {
    async fn send_certificate(
        &self,
        _to_email: &str,
        _student_name: &str,
        _course_title: &str,
        _certificate_id: &str,
        _document: &[u8],
    ) -> Result<(), EngineError> {
        self.sent_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handles onto the mock collaborators, kept alongside the issuer so tests
/// can steer and inspect them.
pub struct Mocks {
    pub renderer: Arc<MockRenderer>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn issuer_with_mocks() -> (CertificateIssuer, Mocks) {
    let renderer = Arc::new(MockRenderer {
        fail: AtomicBool::new(false),
    });
    let store = Arc::new(MemoryStore {
        upload_count: AtomicUsize::new(0),
    });
    let notifier = Arc::new(RecordingNotifier {
        sent_count: AtomicUsize::new(0),
    });

    let issuer = CertificateIssuer::new(renderer.clone(), store.clone(), notifier.clone());
    (
        issuer,
        Mocks {
            renderer,
            store,
            notifier,
        },
    )
}
