use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::models::{
    ActivityDetails, ActivityLog, ActivityType, Halaqa, HalaqaRequest, NewStudentRequest, NewTeacherRequest,
    Parent, ParentRequest, Student, Teacher, UpdateStudentRequest, UpdateTeacherRequest,
};
use crate::services::snapshot::DataService;
use crate::services::workflow::Workflow;
use crate::store::{
    Collection, Fields, Query, Record, RecordStore, Timestamp, WriteBatch, get_record, query_records,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HalaqaUpdate {
    pub halaqa_id: String,
    /// Students whose `teacherId` was rewritten alongside the circle.
    pub cascaded: usize,
}

/// Circle update plus `teacherId` on every enrolled student, in one batch.
pub fn reassignment_batch(halaqa_id: &str, fields: Fields, enrolled: &[Student], teacher_id: &str) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.update(Collection::Halaqat, halaqa_id, fields);
    for student in enrolled {
        let mut patch = Fields::new();
        patch.insert("teacherId".into(), teacher_id.into());
        batch.update(Collection::Students, &student.id, patch);
    }
    batch
}

/// Create/update/delete for students, circles, teachers and parents.
pub struct RosterService {
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    data: Arc<DataService>,
    students: Workflow,
    halaqat: Workflow,
    teachers: Workflow,
    parents: Workflow,
}

impl RosterService {
    pub fn new(data: Arc<DataService>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store: data.store(),
            identity,
            data,
            students: Workflow::new("student"),
            halaqat: Workflow::new("circle"),
            teachers: Workflow::new("teacher"),
            parents: Workflow::new("parent"),
        }
    }

    async fn refetch(&self) {
        if let Err(e) = self.data.refresh().await {
            warn!("Saved but refresh failed: {}", e);
        }
    }

    async fn circle(&self, halaqa_id: &str) -> Result<Halaqa, AppError> {
        get_record::<Halaqa>(self.store.as_ref(), halaqa_id)
            .await?
            .ok_or_else(|| AppError::validation("halaqaId", "The selected circle does not exist"))
    }

    pub async fn create_student(&self, req: NewStudentRequest) -> Result<Student, AppError> {
        let run = self.students.begin()?;
        let result = async {
            req.validate()?;
            let circle = self.circle(&req.halaqa_id).await?;

            run.submitting();
            let mut student = req.into_student(circle.teacher_id.clone());
            student.id = self.store.create(Collection::Students, student.to_fields()).await?;
            info!("Created student {} in {}", student.id, circle.id);

            // Commentary only; the student stays created if this fails.
            let activity = ActivityLog::new(
                ActivityType::NewStudent,
                Timestamp::now(),
                ActivityDetails {
                    student_name: Some(student.name.clone()),
                    halaqa_name: Some(circle.name.clone()),
                    ..Default::default()
                },
            );
            if let Err(e) = self.store.create(Collection::ActivityLogs, activity.to_fields()).await {
                warn!("Failed to log new student {}: {}", student.id, e);
            }

            self.refetch().await;
            Ok(student)
        }
        .await;
        run.finish(result)
    }

    pub async fn update_student(&self, id: &str, req: UpdateStudentRequest) -> Result<(), AppError> {
        let run = self.students.begin()?;
        let result = async {
            req.validate()?;
            let current = get_record::<Student>(self.store.as_ref(), id)
                .await?
                .ok_or(AppError::NotFound)?;

            // The teacher always follows the circle. An unchanged orphaned
            // circle leaves the reference as it is.
            let teacher_id = match &req.halaqa_id {
                Some(halaqa_id) => Some(self.circle(halaqa_id).await?.teacher_id),
                None => get_record::<Halaqa>(self.store.as_ref(), &current.halaqa_id)
                    .await?
                    .map(|h| h.teacher_id),
            };

            run.submitting();
            self.store
                .update(Collection::Students, id, req.to_fields(teacher_id.as_deref()))
                .await?;
            self.refetch().await;
            Ok(())
        }
        .await;
        run.finish(result)
    }

    pub async fn delete_student(&self, id: &str) -> Result<(), AppError> {
        let run = self.students.begin()?;
        run.submitting();
        let result = self.store.delete(Collection::Students, id).await;
        if result.is_ok() {
            self.refetch().await;
        }
        run.finish(result)
    }

    pub async fn create_halaqa(&self, req: HalaqaRequest) -> Result<String, AppError> {
        let run = self.halaqat.begin()?;
        let result = async {
            req.validate()?;
            run.submitting();
            let id = self.store.create(Collection::Halaqat, req.to_fields()).await?;
            info!("Created circle {}", id);
            self.refetch().await;
            Ok(id)
        }
        .await;
        run.finish(result)
    }

    /// Changing the teacher rewrites every enrolled student's `teacherId`
    /// in the same batch as the circle.
    pub async fn update_halaqa(&self, id: &str, req: HalaqaRequest) -> Result<HalaqaUpdate, AppError> {
        let run = self.halaqat.begin()?;
        let result = async {
            req.validate()?;
            let current = get_record::<Halaqa>(self.store.as_ref(), id)
                .await?
                .ok_or(AppError::NotFound)?;

            run.submitting();
            let cascaded = if current.teacher_id != req.teacher_id {
                let enrolled: Vec<Student> =
                    query_records(self.store.as_ref(), &Query::new().where_eq("halaqaId", id)).await?;
                let batch = reassignment_batch(id, req.to_fields(), &enrolled, &req.teacher_id);
                self.store.commit(batch).await?;
                info!(
                    "Reassigned circle {} from {} to {} ({} students)",
                    id,
                    current.teacher_id,
                    req.teacher_id,
                    enrolled.len()
                );
                enrolled.len()
            } else {
                self.store.update(Collection::Halaqat, id, req.to_fields()).await?;
                0
            };

            self.refetch().await;
            Ok(HalaqaUpdate {
                halaqa_id: id.to_string(),
                cascaded,
            })
        }
        .await;
        run.finish(result)
    }

    /// Students keep their `halaqaId`; reads fall back for the missing circle.
    pub async fn delete_halaqa(&self, id: &str) -> Result<(), AppError> {
        let run = self.halaqat.begin()?;
        run.submitting();
        let result = self.store.delete(Collection::Halaqat, id).await;
        if result.is_ok() {
            self.refetch().await;
        }
        run.finish(result)
    }

    /// Provisions the login first, then writes the profile under its uid.
    /// A failed profile write leaves the login behind.
    pub async fn create_teacher(&self, req: NewTeacherRequest) -> Result<Teacher, AppError> {
        let run = self.teachers.begin()?;
        let result = async {
            req.validate()?;
            run.submitting();

            let account = self
                .identity
                .provision_account(req.email.trim(), &req.password)
                .await?;
            let teacher = Teacher {
                id: account.uid.clone(),
                name: req.name.trim().to_string(),
                email: req.email.trim().to_string(),
            };

            if let Err(e) = self
                .store
                .set(Collection::Teachers, &teacher.id, teacher.to_fields())
                .await
            {
                error!(
                    "Teacher login {} ({}) was created but its profile was not: {}",
                    account.uid, account.email, e
                );
                return Err(e);
            }

            info!("Created teacher {}", teacher.id);
            self.refetch().await;
            Ok(teacher)
        }
        .await;
        run.finish(result)
    }

    pub async fn update_teacher(&self, id: &str, req: UpdateTeacherRequest) -> Result<(), AppError> {
        let run = self.teachers.begin()?;
        let result = async {
            req.validate()?;
            run.submitting();
            self.store.update(Collection::Teachers, id, req.to_fields()).await?;
            self.refetch().await;
            Ok(())
        }
        .await;
        run.finish(result)
    }

    /// Circles and students keep their reference to the deleted teacher.
    pub async fn delete_teacher(&self, id: &str) -> Result<(), AppError> {
        let run = self.teachers.begin()?;
        run.submitting();
        let result = self.store.delete(Collection::Teachers, id).await;
        if result.is_ok() {
            warn!("Deleted teacher profile {}; the login account must be removed separately", id);
            self.refetch().await;
        }
        run.finish(result)
    }

    pub async fn create_parent(&self, req: ParentRequest) -> Result<Parent, AppError> {
        let run = self.parents.begin()?;
        let result = async {
            req.validate()?;
            run.submitting();
            let id = self.store.create(Collection::Parents, req.to_fields()).await?;
            self.refetch().await;
            Ok(Parent {
                id,
                name: req.name.trim().to_string(),
                email: req.email.trim().to_string(),
            })
        }
        .await;
        run.finish(result)
    }

    pub async fn update_parent(&self, id: &str, req: ParentRequest) -> Result<(), AppError> {
        let run = self.parents.begin()?;
        let result = async {
            req.validate()?;
            run.submitting();
            self.store.update(Collection::Parents, id, req.to_fields()).await?;
            self.refetch().await;
            Ok(())
        }
        .await;
        run.finish(result)
    }

    pub async fn delete_parent(&self, id: &str) -> Result<(), AppError> {
        let run = self.parents.begin()?;
        run.submitting();
        let result = self.store.delete(Collection::Parents, id).await;
        if result.is_ok() {
            self.refetch().await;
        }
        run.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::student;
    use crate::store::Write;

    #[test]
    fn test_reassignment_batch_has_circle_and_each_student() {
        let enrolled = vec![student("s1", "h1", "t1", 0.0, 0.0), student("s2", "h1", "t1", 0.0, 0.0)];
        let mut fields = Fields::new();
        fields.insert("teacherId".into(), "t2".into());
        let batch = reassignment_batch("h1", fields, &enrolled, "t2");

        assert_eq!(batch.len(), 3);
        assert!(batch.writes().iter().all(|w| matches!(w, Write::Update { .. })));
        assert_eq!(batch.writes()[0].collection(), Collection::Halaqat);
        assert_eq!(batch.writes()[2].id(), "s2");
    }
}
