use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::store::{Collection, Document, Fields, Record, Timestamp, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    /// Late arrivals count as attended.
    pub fn attended(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// One circle's attendance for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLog {
    pub id: String,
    pub date: Timestamp,
    pub halaqa_id: String,
    pub teacher_id: String,
    pub records: BTreeMap<String, AttendanceStatus>,
}

/// `{halaqaId}_{YYYY-MM-DD}`; same circle and day always map to the same key.
pub fn attendance_key(halaqa_id: &str, day: NaiveDate) -> String {
    format!("{}_{}", halaqa_id, day.format("%Y-%m-%d"))
}

impl AttendanceLog {
    pub fn day(&self) -> Option<NaiveDate> {
        self.date.date()
    }
}

impl Record for AttendanceLog {
    const COLLECTION: Collection = Collection::DailyAttendance;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        let mut records = BTreeMap::new();
        if let Some(raw) = doc.map("records") {
            for (student_id, value) in raw {
                match value.as_str().and_then(AttendanceStatus::parse) {
                    Some(status) => {
                        records.insert(student_id.clone(), status);
                    }
                    None => warn!("Ignoring unknown status for {} in {}", student_id, doc.id),
                }
            }
        }

        Ok(Self {
            id: doc.id.clone(),
            date: doc.timestamp("date")?,
            halaqa_id: doc.string("halaqaId")?,
            teacher_id: doc.opt_string("teacherId").unwrap_or_default(),
            records,
        })
    }

    fn to_fields(&self) -> Fields {
        let records: Fields = self
            .records
            .iter()
            .map(|(id, status)| (id.clone(), Value::from(status.as_str())))
            .collect();

        let mut fields = Fields::new();
        fields.insert("date".into(), self.date.into());
        fields.insert("halaqaId".into(), self.halaqa_id.as_str().into());
        fields.insert("teacherId".into(), self.teacher_id.as_str().into());
        fields.insert("records".into(), records.into());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_circle_and_day() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        assert_eq!(attendance_key("h1", day), "h1_2026-02-05");
    }

    #[test]
    fn test_unknown_status_is_dropped() {
        let mut records = Fields::new();
        records.insert("s1".into(), "present".into());
        records.insert("s2".into(), "excused".into());
        let mut fields = Fields::new();
        fields.insert("date".into(), Timestamp { seconds: 0, nanoseconds: 0 }.into());
        fields.insert("halaqaId".into(), "h1".into());
        fields.insert("records".into(), records.into());

        let log = AttendanceLog::from_document(&Document::new("h1_1970-01-01", fields)).unwrap();
        assert_eq!(log.records.len(), 1);
        assert_eq!(log.records.get("s1"), Some(&AttendanceStatus::Present));
    }
}
