//! Lecture progress tracker: records per-lecture completion and watch time
//! inside an enrollment and keeps the derived `progress` percentage current.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use tracing::warn;
use uuid::Uuid;

use db::models::course::CourseSections;
use db::models::enrollment::{self, LectureProgress, LectureProgressLog};

use super::EngineError;

/// Derives the completion percentage from the stored lecture log and the
/// current course structure.
///
/// Only completed lectures that still exist in the structure count. When the
/// course has no lectures at all, the prior value is kept rather than
/// recomputed to zero.
pub fn recompute_progress(log: &LectureProgressLog, sections: &CourseSections, prior: i32) -> i32 {
    let total = sections.total_lectures();
    if total == 0 {
        return prior;
    }

    let completed = log.completed_lectures_in(sections);
    let raw = (completed as f64 / total as f64) * 100.0;
    (raw.round() as i32).clamp(0, 100)
}

/// Marks a lecture as watched on the enrollment and recomputes `progress`.
///
/// Re-watching refreshes `completed_at` and overwrites `watch_time` (last
/// write wins; time is not accumulated). Lecture ids not present in the
/// course structure are recorded anyway but contribute nothing to the
/// percentage; the mismatch is logged so stale clients stay visible.
///
/// The caller is expected to run the completion detector after this returns.
pub async fn mark_lecture_watched(
    db: &DatabaseConnection,
    enrollment: enrollment::Model,
    sections: &CourseSections,
    lecture_id: Uuid,
    watch_time: i64,
) -> Result<enrollment::Model, EngineError> {
    if !sections.contains_lecture(lecture_id) {
        warn!(
            %lecture_id,
            enrollment_id = enrollment.id,
            "lecture not in course structure; recording progress anyway"
        );
    }

    let now = Utc::now();
    let watch_time = watch_time.max(0);

    let mut log = enrollment.lecture_progress.clone();
    match log.0.iter_mut().find(|entry| entry.lecture_id == lecture_id) {
        Some(entry) => {
            entry.completed = true;
            entry.completed_at = Some(now);
            entry.watch_time = watch_time;
        }
        None => log.0.push(LectureProgress {
            lecture_id,
            completed: true,
            completed_at: Some(now),
            watch_time,
        }),
    }

    let progress = recompute_progress(&log, sections, enrollment.progress);

    let update = enrollment::ActiveModel {
        id: Set(enrollment.id),
        lecture_progress: Set(log),
        progress: Set(progress),
        ..Default::default()
    };

    Ok(update.update(db).await?)
}
