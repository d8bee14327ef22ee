use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};

/// A completion certificate. At most one exists per (student, course); the
/// table carries a unique index on that pair so a retried or concurrent
/// issuance can never create a duplicate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    /// Human-referenceable token, e.g. `CERT-3f2a...`. Immutable once issued.
    pub certificate_id: String,
    pub issued_at: DateTime<Utc>,
    /// Opaque locator of the rendered document in the durable object store.
    /// Used together with `resource_kind`; overwritten on an explicit re-issue.
    pub artifact_ref: Option<String>,
    pub resource_kind: Option<String>,
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
    pub async fn find_for_pair(
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

    /// Check-then-create for the (student, course) pair.
    ///
    /// A retried issuance finds and reuses the existing row; if two issuances
    /// race, the loser's insert hits the unique pair index and the winner's
    /// row is returned instead.
    pub async fn find_or_create(
        db: &DbConn,
        student_id: i64,
        course_id: i64,
        certificate_id: &str,
    ) -> Result<Model, DbErr> {
        if let Some(existing) = Self::find_for_pair(db, student_id, course_id).await? {
            return Ok(existing);
        }

        let certificate = ActiveModel {
            student_id: Set(student_id),
            course_id: Set(course_id),
            certificate_id: Set(certificate_id.to_owned()),
            issued_at: Set(Utc::now()),
            artifact_ref: Set(None),
            resource_kind: Set(None),
            ..Default::default()
        };

        match certificate.insert(db).await {
            Ok(created) => Ok(created),
            Err(err) => {
                // Lost a creation race; the pair index rejected the insert.
                match Self::find_for_pair(db, student_id, course_id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(err),
                }
            }
        }
    }

    /// Points the certificate at a (re)rendered artifact. Idempotent
    /// overwrite; this is the only mutation a certificate ever sees.
    pub async fn set_artifact(
        db: &DbConn,
        id: i64,
        artifact_ref: &str,
        resource_kind: &str,
    ) -> Result<Model, DbErr> {
        let certificate = ActiveModel {
            id: Set(id),
            artifact_ref: Set(Some(artifact_ref.to_owned())),
            resource_kind: Set(Some(resource_kind.to_owned())),
            ..Default::default()
        };

        certificate.update(db).await
    }

    pub async fn find_by_token(db: &DbConn, certificate_id: &str) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::CertificateId.eq(certificate_id))
            .one(db)
            .await
    }

    pub async fn list_for_student(db: &DbConn, student_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::IssuedAt)
            .all(db)
            .await
    }
}
