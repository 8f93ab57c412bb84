use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};
use crate::store::{Collection, Document, Fields, Record};

/// A study circle. `student_count` is recomputed on every fetch and is
/// never read from or written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Halaqa {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
    #[serde(default)]
    pub student_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HalaqaRequest {
    pub name: String,
    pub teacher_id: String,
}

impl HalaqaRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Circle name is required");
        }
        if self.teacher_id.trim().is_empty() {
            errors.add("teacherId", "A teacher must be selected for the circle");
        }
        errors.into_result()
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), self.name.trim().into());
        fields.insert("teacherId".into(), self.teacher_id.as_str().into());
        fields
    }
}

impl Record for Halaqa {
    const COLLECTION: Collection = Collection::Halaqat;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        Ok(Self {
            id: doc.id.clone(),
            name: doc.string("name")?,
            teacher_id: doc.opt_string("teacherId").unwrap_or_default(),
            student_count: 0,
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), self.name.as_str().into());
        fields.insert("teacherId".into(), self.teacher_id.as_str().into());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    #[test]
    fn test_stored_count_is_ignored() {
        let mut fields = Fields::new();
        fields.insert("name".into(), "Al-Fajr".into());
        fields.insert("teacherId".into(), "t1".into());
        fields.insert("studentCount".into(), Value::Integer(42));
        let halaqa = Halaqa::from_document(&Document::new("h1", fields)).unwrap();
        assert_eq!(halaqa.student_count, 0);
        assert!(!halaqa.to_fields().contains_key("studentCount"));
    }

    #[test]
    fn test_request_requires_name_and_teacher() {
        let req = HalaqaRequest {
            name: String::new(),
            teacher_id: String::new(),
        };
        match req.validate() {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
