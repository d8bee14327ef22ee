use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Passing score applied when a quiz doesn't declare one.
pub const DEFAULT_PASSING_SCORE: i32 = 70;

/// One selectable answer in a quiz question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
}

impl QuizQuestion {
    /// Index of the option flagged as correct, if any.
    pub fn correct_option(&self) -> Option<i32> {
        self.options
            .iter()
            .position(|option| option.is_correct)
            .map(|index| index as i32)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionQuiz {
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    pub passing_score: Option<i32>,
}

impl SectionQuiz {
    pub fn passing_score(&self) -> i32 {
        self.passing_score.unwrap_or(DEFAULT_PASSING_SCORE)
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionLecture {
    pub id: Uuid,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseSection {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub lectures: Vec<SectionLecture>,
    pub quiz: Option<SectionQuiz>,
}

impl CourseSection {
    /// Whether this section carries a quiz with at least one question.
    pub fn has_quiz(&self) -> bool {
        self.quiz.as_ref().is_some_and(|quiz| !quiz.is_empty())
    }
}

/// The ordered section/lecture/quiz structure of a course, stored as a single
/// JSON document. The progress engine only ever reads it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CourseSections(pub Vec<CourseSection>);

impl CourseSections {
    pub fn total_lectures(&self) -> usize {
        self.0.iter().map(|section| section.lectures.len()).sum()
    }

    pub fn contains_lecture(&self, lecture_id: Uuid) -> bool {
        self.0
            .iter()
            .any(|section| section.lectures.iter().any(|l| l.id == lecture_id))
    }

    pub fn section(&self, section_id: Uuid) -> Option<&CourseSection> {
        self.0.iter().find(|section| section.id == section_id)
    }

    /// Sections whose quiz has at least one question. Sections with a missing
    /// or empty quiz place no demand on completion.
    pub fn sections_with_quiz(&self) -> impl Iterator<Item = &CourseSection> {
        self.0.iter().filter(|section| section.has_quiz())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub instructor_id: i64,
    #[sea_orm(column_type = "Json")]
    pub sections: CourseSections,
    pub certificate_enabled: bool,
    pub certificate_template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InstructorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Instructor,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create(
        db: &DbConn,
        title: &str,
        instructor_id: i64,
        sections: CourseSections,
        certificate_enabled: bool,
        certificate_template: Option<&str>,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let course = ActiveModel {
            title: Set(title.to_owned()),
            instructor_id: Set(instructor_id),
            sections: Set(sections),
            certificate_enabled: Set(certificate_enabled),
            certificate_template: Set(certificate_template.map(str::to_owned)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        course.insert(db).await
    }
}
