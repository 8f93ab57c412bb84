use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{Collection, Document, Fields, Record, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    NewStudent,
    MemorizationLog,
    AbsenceLog,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::NewStudent => "new_student",
            ActivityType::MemorizationLog => "memorization_log",
            ActivityType::AbsenceLog => "absence_log",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new_student" => Some(ActivityType::NewStudent),
            "memorization_log" => Some(ActivityType::MemorizationLog),
            "absence_log" => Some(ActivityType::AbsenceLog),
            _ => None,
        }
    }
}

/// Display strings copied in at write time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halaqa_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surah: Option<String>,
}

/// Feed entry. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub timestamp: Timestamp,
    pub details: ActivityDetails,
}

impl ActivityLog {
    pub fn new(kind: ActivityType, timestamp: Timestamp, details: ActivityDetails) -> Self {
        Self {
            id: String::new(),
            kind,
            timestamp,
            details,
        }
    }
}

impl Record for ActivityLog {
    const COLLECTION: Collection = Collection::ActivityLogs;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        let raw_kind = doc.string("type")?;
        let kind = ActivityType::parse(&raw_kind)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown activity type {}", raw_kind)))?;

        let details = doc
            .map("details")
            .map(|d| {
                let text = |key: &str| d.get(key).and_then(|v| v.as_str()).map(str::to_string);
                ActivityDetails {
                    student_name: text("studentName"),
                    halaqa_name: text("halaqaName"),
                    teacher_name: text("teacherName"),
                    surah: text("surah"),
                }
            })
            .unwrap_or_default();

        Ok(Self {
            id: doc.id.clone(),
            kind,
            timestamp: doc.timestamp("timestamp")?,
            details,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut details = Fields::new();
        let entries = [
            ("studentName", &self.details.student_name),
            ("halaqaName", &self.details.halaqa_name),
            ("teacherName", &self.details.teacher_name),
            ("surah", &self.details.surah),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                details.insert(key.into(), value.as_str().into());
            }
        }

        let mut fields = Fields::new();
        fields.insert("type".into(), self.kind.as_str().into());
        fields.insert("timestamp".into(), self.timestamp.into());
        fields.insert("details".into(), details.into());
        fields
    }
}
