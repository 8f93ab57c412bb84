use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{Collection, Document, Fields, Record, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Good,
    Average,
    Repeat,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Average => "average",
            Quality::Repeat => "repeat",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "good" => Some(Quality::Good),
            "average" => Some(Quality::Average),
            "repeat" => Some(Quality::Repeat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationLog {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub halaqa_id: String,
    pub date: Timestamp,
    pub surah: String,
    pub from_verse: u32,
    pub to_verse: u32,
    pub quality: Quality,
    pub notes: String,
}

/// One student's row on the memorization form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationEntry {
    #[serde(default)]
    pub surah: String,
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub notes: String,
}

impl MemorizationEntry {
    /// Clamps verses to non-negative and raises `to` up to `from`.
    pub fn normalized(mut self) -> Self {
        self.from = self.from.map(|v| v.max(0));
        self.to = self.to.map(|v| v.max(0));
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                self.to = Some(from);
            }
        }
        self
    }

    /// Surah and both verse numbers present. Verse 0 counts as missing.
    pub fn verse_range(&self) -> Option<(&str, u32, u32)> {
        let surah = self.surah.trim();
        if surah.is_empty() {
            return None;
        }
        let from = u32::try_from(self.from?.max(0)).ok().filter(|v| *v > 0)?;
        let to = u32::try_from(self.to?.max(0)).ok().filter(|v| *v > 0)?;
        Some((surah, from, to))
    }
}

impl Record for MemorizationLog {
    const COLLECTION: Collection = Collection::MemorizationLogs;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        Ok(Self {
            id: doc.id.clone(),
            student_id: doc.string("studentId")?,
            teacher_id: doc.opt_string("teacherId").unwrap_or_default(),
            halaqa_id: doc.opt_string("halaqaId").unwrap_or_default(),
            date: doc.timestamp("date")?,
            surah: doc.opt_string("surah").unwrap_or_default(),
            from_verse: doc.number("fromVerse").unwrap_or(0.0).max(0.0) as u32,
            to_verse: doc.number("toVerse").unwrap_or(0.0).max(0.0) as u32,
            quality: doc
                .opt_string("quality")
                .as_deref()
                .and_then(Quality::parse)
                .unwrap_or_default(),
            notes: doc.opt_string("notes").unwrap_or_default(),
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("studentId".into(), self.student_id.as_str().into());
        fields.insert("halaqaId".into(), self.halaqa_id.as_str().into());
        fields.insert("teacherId".into(), self.teacher_id.as_str().into());
        fields.insert("date".into(), self.date.into());
        fields.insert("surah".into(), self.surah.as_str().into());
        fields.insert("fromVerse".into(), self.from_verse.into());
        fields.insert("toVerse".into(), self.to_verse.into());
        fields.insert("quality".into(), self.quality.as_str().into());
        fields.insert("notes".into(), self.notes.as_str().into());
        fields
    }
}
