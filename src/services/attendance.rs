use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::derive::{AttendanceSummary, NOT_SPECIFIED, summarize};
use crate::error::{AppError, FieldErrors};
use crate::models::{
    ActivityDetails, ActivityLog, ActivityType, AttendanceLog, AttendanceStatus, Halaqa, Student,
    attendance_key,
};
use crate::services::snapshot::DataService;
use crate::services::workflow::{Submission, Workflow, WorkflowState};
use crate::store::{Collection, Record, RecordStore, Timestamp, WriteBatch, get_record};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSubmission {
    pub halaqa_id: String,
    /// Defaults to the circle's teacher.
    #[serde(default)]
    pub teacher_id: Option<String>,
    pub records: BTreeMap<String, AttendanceStatus>,
}

impl AttendanceSubmission {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.halaqa_id.trim().is_empty() {
            errors.add("halaqaId", "A circle must be selected");
        }
        if self.records.is_empty() {
            errors.add("records", "No students to record");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReceipt {
    pub document_id: String,
    pub summary: AttendanceSummary,
    pub absences_logged: usize,
}

/// One overwrite of the day's attendance document plus one absence entry per
/// absent student, all in one batch.
pub fn attendance_batch(
    submission: &AttendanceSubmission,
    teacher_id: &str,
    students: &[Student],
    halaqa: Option<&Halaqa>,
    now: DateTime<Utc>,
) -> (WriteBatch, AttendanceReceipt) {
    let timestamp = Timestamp::from_datetime(now);
    let document_id = attendance_key(&submission.halaqa_id, now.date_naive());
    let log = AttendanceLog {
        id: document_id.clone(),
        date: timestamp,
        halaqa_id: submission.halaqa_id.clone(),
        teacher_id: teacher_id.to_string(),
        records: submission.records.clone(),
    };

    let mut batch = WriteBatch::new();
    batch.set(Collection::DailyAttendance, &document_id, log.to_fields());

    let halaqa_name = halaqa.map(|h| h.name.clone()).unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let mut absences_logged = 0;
    for (student_id, status) in &submission.records {
        if *status != AttendanceStatus::Absent {
            continue;
        }
        let student_name = students
            .iter()
            .find(|s| &s.id == student_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let entry = ActivityLog::new(
            ActivityType::AbsenceLog,
            timestamp,
            ActivityDetails {
                student_name: Some(student_name),
                halaqa_name: Some(halaqa_name.clone()),
                ..Default::default()
            },
        );
        batch.create(Collection::ActivityLogs, entry.to_fields());
        absences_logged += 1;
    }

    let receipt = AttendanceReceipt {
        document_id,
        summary: summarize(submission.records.values()),
        absences_logged,
    };
    (batch, receipt)
}

pub struct AttendanceService {
    store: Arc<dyn RecordStore>,
    data: Arc<DataService>,
    workflow: Workflow,
}

impl AttendanceService {
    pub fn new(data: Arc<DataService>) -> Self {
        Self {
            store: data.store(),
            data,
            workflow: Workflow::new("attendance"),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state()
    }

    pub async fn submit(&self, submission: AttendanceSubmission) -> Result<AttendanceReceipt, AppError> {
        self.submit_at(submission, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        submission: AttendanceSubmission,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt, AppError> {
        let run = self.workflow.begin()?;
        let result = self.run(&run, submission, now).await;
        run.finish(result)
    }

    async fn run(
        &self,
        run: &Submission<'_>,
        submission: AttendanceSubmission,
        now: DateTime<Utc>,
    ) -> Result<AttendanceReceipt, AppError> {
        submission.validate()?;

        let snapshot = self.data.snapshot().await;
        let halaqa = match snapshot.halaqat.iter().find(|h| h.id == submission.halaqa_id) {
            Some(h) => Some(h.clone()),
            None => get_record::<Halaqa>(self.store.as_ref(), &submission.halaqa_id).await?,
        };
        let teacher_id = submission
            .teacher_id
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| halaqa.as_ref().map(|h| h.teacher_id.clone()))
            .ok_or_else(|| AppError::validation("teacherId", "The circle has no teacher"))?;

        let (batch, receipt) = attendance_batch(&submission, &teacher_id, &snapshot.students, halaqa.as_ref(), now);

        run.submitting();
        self.store.commit(batch).await?;
        info!(
            "Saved attendance {} ({} absent)",
            receipt.document_id, receipt.absences_logged
        );

        if let Err(e) = self.data.refresh_at(now).await {
            warn!("Attendance saved but refresh failed: {}", e);
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{halaqa, student};
    use crate::store::Write;
    use chrono::TimeZone;

    #[test]
    fn test_batch_logs_one_absence_per_absent_student() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 8, 0, 0).unwrap();
        let mut records = BTreeMap::new();
        records.insert("s1".to_string(), AttendanceStatus::Present);
        records.insert("s2".to_string(), AttendanceStatus::Absent);
        records.insert("s3".to_string(), AttendanceStatus::Late);
        let submission = AttendanceSubmission {
            halaqa_id: "h1".to_string(),
            teacher_id: None,
            records,
        };
        let students = vec![student("s2", "h1", "t1", 50.0, 90.0)];
        let circle = halaqa("h1", "Al-Fajr", "t1");

        let (batch, receipt) = attendance_batch(&submission, "t1", &students, Some(&circle), now);
        assert_eq!(batch.len(), 2);
        assert_eq!(receipt.document_id, "h1_2026-03-07");
        assert_eq!(receipt.absences_logged, 1);
        assert_eq!(
            receipt.summary,
            AttendanceSummary {
                present: 1,
                absent: 1,
                late: 1
            }
        );

        match &batch.writes()[0] {
            Write::Set { collection, id, .. } => {
                assert_eq!(*collection, Collection::DailyAttendance);
                assert_eq!(id, "h1_2026-03-07");
            }
            other => panic!("expected attendance overwrite, got {:?}", other),
        }
        match &batch.writes()[1] {
            Write::Create { collection, fields, .. } => {
                assert_eq!(*collection, Collection::ActivityLogs);
                let log = ActivityLog::from_document(&crate::store::Document::new("a", fields.clone())).unwrap();
                assert_eq!(log.details.student_name.as_deref(), Some("Student s2"));
                assert_eq!(log.details.halaqa_name.as_deref(), Some("Al-Fajr"));
            }
            other => panic!("expected activity entry, got {:?}", other),
        }
    }
}
