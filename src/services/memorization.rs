use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::derive::NOT_SPECIFIED;
use crate::error::AppError;
use crate::models::{
    ActivityDetails, ActivityLog, ActivityType, Halaqa, MemorizationEntry, MemorizationLog, Student,
};
use crate::services::snapshot::DataService;
use crate::services::workflow::{Submission, Workflow, WorkflowState};
use crate::store::{
    Collection, Direction, Query, Record, RecordStore, Timestamp, WriteBatch, get_record, query_records,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationSubmission {
    pub halaqa_id: String,
    #[serde(default)]
    pub teacher_id: Option<String>,
    /// Keyed by student id.
    pub entries: BTreeMap<String, MemorizationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationReceipt {
    pub saved: usize,
    pub skipped: usize,
}

/// One log plus one activity entry per complete row; incomplete rows are
/// skipped.
pub fn memorization_batch(
    submission: &MemorizationSubmission,
    teacher_id: &str,
    students: &[Student],
    halaqa: Option<&Halaqa>,
    now: DateTime<Utc>,
) -> (WriteBatch, MemorizationReceipt) {
    let timestamp = Timestamp::from_datetime(now);
    let halaqa_name = halaqa.map(|h| h.name.clone()).unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let mut batch = WriteBatch::new();
    let mut receipt = MemorizationReceipt { saved: 0, skipped: 0 };

    for (student_id, entry) in &submission.entries {
        let entry = entry.clone().normalized();
        let Some((surah, from_verse, to_verse)) = entry.verse_range() else {
            receipt.skipped += 1;
            continue;
        };

        let log = MemorizationLog {
            id: String::new(),
            student_id: student_id.clone(),
            teacher_id: teacher_id.to_string(),
            halaqa_id: submission.halaqa_id.clone(),
            date: timestamp,
            surah: surah.to_string(),
            from_verse,
            to_verse,
            quality: entry.quality,
            notes: entry.notes.clone(),
        };
        batch.create(Collection::MemorizationLogs, log.to_fields());

        let student_name = students
            .iter()
            .find(|s| &s.id == student_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let activity = ActivityLog::new(
            ActivityType::MemorizationLog,
            timestamp,
            ActivityDetails {
                student_name: Some(student_name),
                halaqa_name: Some(halaqa_name.clone()),
                surah: Some(surah.to_string()),
                ..Default::default()
            },
        );
        batch.create(Collection::ActivityLogs, activity.to_fields());
        receipt.saved += 1;
    }

    (batch, receipt)
}

pub struct MemorizationService {
    store: Arc<dyn RecordStore>,
    data: Arc<DataService>,
    workflow: Workflow,
}

impl MemorizationService {
    pub fn new(data: Arc<DataService>) -> Self {
        Self {
            store: data.store(),
            data,
            workflow: Workflow::new("memorization"),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state()
    }

    pub async fn submit(&self, submission: MemorizationSubmission) -> Result<MemorizationReceipt, AppError> {
        self.submit_at(submission, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        submission: MemorizationSubmission,
        now: DateTime<Utc>,
    ) -> Result<MemorizationReceipt, AppError> {
        let run = self.workflow.begin()?;
        let result = self.run(&run, submission, now).await;
        run.finish(result)
    }

    async fn run(
        &self,
        run: &Submission<'_>,
        submission: MemorizationSubmission,
        now: DateTime<Utc>,
    ) -> Result<MemorizationReceipt, AppError> {
        if submission.halaqa_id.trim().is_empty() {
            return Err(AppError::validation("halaqaId", "A circle must be selected"));
        }

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

        let (batch, receipt) =
            memorization_batch(&submission, &teacher_id, &snapshot.students, halaqa.as_ref(), now);
        if batch.is_empty() {
            debug!("No complete memorization entries for {}", submission.halaqa_id);
            return Ok(receipt);
        }

        run.submitting();
        self.store.commit(batch).await?;
        info!(
            "Saved {} memorization logs for {} ({} skipped)",
            receipt.saved, submission.halaqa_id, receipt.skipped
        );

        if let Err(e) = self.data.refresh_at(now).await {
            warn!("Memorization saved but refresh failed: {}", e);
        }
        Ok(receipt)
    }

    /// The student's logs, newest first. Needs a composite index on the
    /// hosted store; a missing one surfaces as `FailedPrecondition`.
    pub async fn history(&self, student_id: &str) -> Result<Vec<MemorizationLog>, AppError> {
        let query = Query::new()
            .where_eq("studentId", student_id)
            .order_by("date", Direction::Descending);
        query_records(self.store.as_ref(), &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{halaqa, student};
    use crate::models::Quality;
    use crate::store::{Document, Write};
    use chrono::TimeZone;

    fn entry(surah: &str, from: Option<i64>, to: Option<i64>) -> MemorizationEntry {
        MemorizationEntry {
            surah: surah.to_string(),
            from,
            to,
            quality: Quality::Average,
            notes: "steady".to_string(),
        }
    }

    #[test]
    fn test_incomplete_entries_produce_no_writes() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 8, 0, 0).unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("s1".to_string(), entry("Al-Kahf", Some(1), Some(10)));
        entries.insert("s2".to_string(), entry("", Some(1), Some(10)));
        entries.insert("s3".to_string(), entry("Yasin", Some(5), None));
        entries.insert("s4".to_string(), entry("Yasin", Some(9), Some(3)));
        let submission = MemorizationSubmission {
            halaqa_id: "h1".to_string(),
            teacher_id: Some("t1".to_string()),
            entries,
        };
        let students = vec![student("s1", "h1", "t1", 50.0, 90.0)];

        let (batch, receipt) =
            memorization_batch(&submission, "t1", &students, Some(&halaqa("h1", "Al-Fajr", "t1")), now);
        assert_eq!(receipt, MemorizationReceipt { saved: 2, skipped: 2 });
        assert_eq!(batch.len(), 4);

        let logs: Vec<MemorizationLog> = batch
            .writes()
            .iter()
            .filter_map(|w| match w {
                Write::Create { collection: Collection::MemorizationLogs, id, fields } => {
                    MemorizationLog::from_document(&Document::new(id.clone(), fields.clone())).ok()
                }
                _ => None,
            })
            .collect();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].student_id, "s1");
        assert_eq!(logs[1].student_id, "s4");
        assert_eq!((logs[1].from_verse, logs[1].to_verse), (9, 9));
        assert_eq!(logs[0].quality, Quality::Average);
    }
}
