use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, UpdateResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::course::CourseSections;

/// Per-lecture consumption record inside an enrollment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LectureProgress {
    pub lecture_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub watch_time: i64,
}

/// All lecture progress for one enrollment, stored as a JSON document column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LectureProgressLog(pub Vec<LectureProgress>);

impl LectureProgressLog {
    pub fn get(&self, lecture_id: Uuid) -> Option<&LectureProgress> {
        self.0.iter().find(|entry| entry.lecture_id == lecture_id)
    }

    /// Completed lectures that still exist in the course structure. Entries
    /// for lectures removed from (or never part of) the course are kept in
    /// the log but contribute nothing here.
    pub fn completed_lectures_in(&self, sections: &CourseSections) -> usize {
        self.0
            .iter()
            .filter(|entry| entry.completed && sections.contains_lecture(entry.lecture_id))
            .count()
    }
}

/// One selected option for one quiz question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub question_id: Uuid,
    pub selected_option: i32,
}

/// The latest quiz attempt for one section. Retakes overwrite; no attempt
/// history is retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub section_id: Uuid,
    pub answers: Vec<AttemptAnswer>,
    pub score: i32,
    pub passed: bool,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct QuizAttemptLog(pub Vec<QuizAttempt>);

impl QuizAttemptLog {
    pub fn attempt_for(&self, section_id: Uuid) -> Option<&QuizAttempt> {
        self.0.iter().find(|attempt| attempt.section_id == section_id)
    }

    /// Records an attempt, replacing any prior attempt for the same section.
    /// Returns `true` when this was a retake.
    pub fn record(&mut self, attempt: QuizAttempt) -> bool {
        match self
            .0
            .iter_mut()
            .find(|existing| existing.section_id == attempt.section_id)
        {
            Some(existing) => {
                *existing = attempt;
                true
            }
            None => {
                self.0.push(attempt);
                false
            }
        }
    }
}

/// The per-student-per-course progress and completion record. This is the
/// only mutable state the progress engine operates on.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub enrolled_at: DateTime<Utc>,
    /// Derived completion percentage, 0-100. Never set directly by clients.
    pub progress: i32,
    /// One-way false -> true; never reverts.
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Json")]
    pub lecture_progress: LectureProgressLog,
    #[sea_orm(column_type = "Json")]
    pub quiz_attempts: QuizAttemptLog,
    /// Issuance guard. Flipped exactly once, via `claim_certificate_flag`.
    pub certificate_generated: bool,
    /// FK to the issued certificate row, set once after successful issuance.
    pub certificate_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,

    #[sea_orm(
        belongs_to = "super::certificate::Entity",
        from = "Column::CertificateId",
        to = "super::certificate::Column::Id"
    )]
    Certificate,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(db: &DbConn, student_id: i64, course_id: i64) -> Result<Model, DbErr> {
        let enrollment = ActiveModel {
            student_id: Set(student_id),
            course_id: Set(course_id),
            enrolled_at: Set(Utc::now()),
            progress: Set(0),
            is_completed: Set(false),
            completed_at: Set(None),
            lecture_progress: Set(LectureProgressLog::default()),
            quiz_attempts: Set(QuizAttemptLog::default()),
            certificate_generated: Set(false),
            certificate_id: Set(None),
            ..Default::default()
        };

        enrollment.insert(db).await
    }

    pub async fn find_by_student_and_course(
        db: &DbConn,
        student_id: i64,
        course_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::CourseId.eq(course_id))
            .one(db)
            .await
    }

    pub async fn list_for_student(db: &DbConn, student_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::EnrolledAt)
            .all(db)
            .await
    }

    /// Atomically flips the issuance guard from false to true.
    ///
    /// Returns `true` only for the caller that won: the update is conditional
    /// on `certificate_generated = false`, so two issuance attempts racing
    /// past the detector's own check cannot both claim the flag.
    pub async fn claim_certificate_flag(db: &DbConn, id: i64) -> Result<bool, DbErr> {
        let result: UpdateResult = Entity::update_many()
            .col_expr(Column::CertificateGenerated, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::CertificateGenerated.eq(false))
            .exec(db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    pub async fn link_certificate(
        db: &DbConn,
        id: i64,
        certificate_id: i64,
    ) -> Result<Model, DbErr> {
        let enrollment = ActiveModel {
            id: Set(id),
            certificate_id: Set(Some(certificate_id)),
            ..Default::default()
        };

        enrollment.update(db).await
    }
}
