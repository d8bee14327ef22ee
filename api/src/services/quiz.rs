//! Quiz grader and attempt ledger: scores a submitted answer set against a
//! section's quiz and records the single latest attempt per section.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use uuid::Uuid;

use db::models::course::{self, SectionQuiz};
use db::models::enrollment::{self, AttemptAnswer, QuizAttempt};

use super::EngineError;

/// Result of grading one answer set.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedQuiz {
    pub score: i32,
    pub passed: bool,
    pub correct_answers: usize,
    pub total_questions: usize,
}

/// What a quiz submission returns to the caller, alongside the refreshed
/// enrollment so clients can observe progress without a second round trip.
#[derive(Debug)]
pub struct QuizSubmissionOutcome {
    pub score: i32,
    pub passed: bool,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub is_retake: bool,
    pub enrollment: enrollment::Model,
}

/// Grades an answer set against a quiz. Pure; writes nothing.
///
/// Answers are validated against the live question/option structure: the
/// array length must equal the question count and every answer must be an
/// in-range option index. Violations name the offending question and no
/// grading takes place.
pub fn grade(quiz: &SectionQuiz, answers: &[i32]) -> Result<GradedQuiz, EngineError> {
    let total_questions = quiz.questions.len();
    if total_questions == 0 {
        return Err(EngineError::validation("quiz", "quiz has no questions"));
    }
    if answers.len() != total_questions {
        return Err(EngineError::validation(
            "answers",
            format!(
                "answers must match the number of quiz questions ({}, got {})",
                total_questions,
                answers.len()
            ),
        ));
    }

    let mut correct_answers = 0;
    for (index, (question, &selected)) in quiz.questions.iter().zip(answers).enumerate() {
        let option_count = question.options.len() as i32;
        if selected < 0 || selected >= option_count {
            return Err(EngineError::validation(
                format!("answers[{index}]"),
                format!("invalid answer for question {}", index + 1),
            ));
        }
        if question.correct_option() == Some(selected) {
            correct_answers += 1;
        }
    }

    let score = ((correct_answers as f64 / total_questions as f64) * 100.0).round() as i32;
    Ok(GradedQuiz {
        score,
        passed: score >= quiz.passing_score(),
        correct_answers,
        total_questions,
    })
}

/// Grades and records a quiz submission for one section of the course.
///
/// The section must exist and carry a non-empty quiz. A prior attempt for
/// the section is replaced, not appended to. Validation failures leave the
/// enrollment untouched.
///
/// The caller is expected to run the completion detector after this returns.
pub async fn submit_quiz(
    db: &DatabaseConnection,
    enrollment: enrollment::Model,
    course: &course::Model,
    section_id: Uuid,
    answers: &[i32],
) -> Result<QuizSubmissionOutcome, EngineError> {
    let section = course
        .sections
        .section(section_id)
        .ok_or_else(|| EngineError::not_found("Section"))?;
    let quiz = section
        .quiz
        .as_ref()
        .filter(|quiz| !quiz.is_empty())
        .ok_or_else(|| EngineError::not_found("Quiz"))?;

    let graded = grade(quiz, answers)?;

    let attempt = QuizAttempt {
        section_id,
        answers: quiz
            .questions
            .iter()
            .zip(answers)
            .map(|(question, &selected)| AttemptAnswer {
                question_id: question.id,
                selected_option: selected,
            })
            .collect(),
        score: graded.score,
        passed: graded.passed,
        attempted_at: Utc::now(),
    };

    let mut attempts = enrollment.quiz_attempts.clone();
    let is_retake = attempts.record(attempt);

    let updated = enrollment::ActiveModel {
        id: Set(enrollment.id),
        quiz_attempts: Set(attempts),
        ..Default::default()
    }
    .update(db)
    .await?;

    Ok(QuizSubmissionOutcome {
        score: graded.score,
        passed: graded.passed,
        correct_answers: graded.correct_answers,
        total_questions: graded.total_questions,
        is_retake,
        enrollment: updated,
    })
}
