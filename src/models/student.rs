use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};
use crate::models::is_phone_number;
use crate::store::{Collection, Document, Fields, Record, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_phone_number: Option<String>,
    pub halaqa_id: String,
    /// Always the owning circle's teacher; never set independently.
    pub teacher_id: String,
    pub memorization_progress: f64,
    pub attendance_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudentRequest {
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub father_phone_number: Option<String>,
    pub halaqa_id: String,
    #[serde(default)]
    pub memorization_progress: f64,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub father_phone_number: Option<String>,
    pub halaqa_id: Option<String>,
    pub memorization_progress: Option<f64>,
    pub parent_id: Option<String>,
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "Student name is required");
    }
}

fn check_age(errors: &mut FieldErrors, age: u32) {
    if age == 0 {
        errors.add("age", "Age must be a positive number");
    }
}

fn check_phone(errors: &mut FieldErrors, phone: Option<&str>) {
    if let Some(phone) = phone {
        if !phone.trim().is_empty() && !is_phone_number(phone.trim()) {
            errors.add("fatherPhoneNumber", "Phone number may only contain digits");
        }
    }
}

fn check_progress(errors: &mut FieldErrors, progress: f64) {
    if !(0.0..=100.0).contains(&progress) {
        errors.add("memorizationProgress", "Memorization progress must be between 0 and 100");
    }
}

/// Empty phone input means "no phone".
fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

impl NewStudentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &self.name);
        check_age(&mut errors, self.age);
        check_phone(&mut errors, self.father_phone_number.as_deref());
        check_progress(&mut errors, self.memorization_progress);
        if self.halaqa_id.trim().is_empty() {
            errors.add("halaqaId", "A circle must be selected");
        }
        errors.into_result()
    }

    /// Student as it will be stored, before an id is assigned.
    pub fn into_student(self, teacher_id: String) -> Student {
        Student {
            id: String::new(),
            name: self.name.trim().to_string(),
            age: self.age,
            father_phone_number: normalize_phone(self.father_phone_number.as_deref()),
            halaqa_id: self.halaqa_id,
            teacher_id,
            memorization_progress: self.memorization_progress,
            attendance_rate: 100.0,
            parent_id: self.parent_id.filter(|p| !p.is_empty()),
        }
    }
}

impl UpdateStudentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(age) = self.age {
            check_age(&mut errors, age);
        }
        check_phone(&mut errors, self.father_phone_number.as_deref());
        if let Some(progress) = self.memorization_progress {
            check_progress(&mut errors, progress);
        }
        if let Some(halaqa_id) = &self.halaqa_id {
            if halaqa_id.trim().is_empty() {
                errors.add("halaqaId", "A circle must be selected");
            }
        }
        errors.into_result()
    }

    /// Partial fields to write. `teacher_id` is the circle's teacher when the
    /// circle is being changed.
    pub fn to_fields(&self, teacher_id: Option<&str>) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), name.trim().into());
        }
        if let Some(age) = self.age {
            fields.insert("age".into(), age.into());
        }
        if let Some(phone) = &self.father_phone_number {
            let value = normalize_phone(Some(phone.as_str())).map(Value::from).unwrap_or(Value::Null);
            fields.insert("fatherPhoneNumber".into(), value);
        }
        if let Some(halaqa_id) = &self.halaqa_id {
            fields.insert("halaqaId".into(), halaqa_id.as_str().into());
        }
        if let Some(teacher_id) = teacher_id {
            fields.insert("teacherId".into(), teacher_id.into());
        }
        if let Some(progress) = self.memorization_progress {
            fields.insert("memorizationProgress".into(), progress.into());
        }
        if let Some(parent_id) = &self.parent_id {
            let value = if parent_id.is_empty() { Value::Null } else { parent_id.as_str().into() };
            fields.insert("parentId".into(), value);
        }
        fields
    }
}

impl Record for Student {
    const COLLECTION: Collection = Collection::Students;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        Ok(Self {
            id: doc.id.clone(),
            name: doc.string("name")?,
            age: doc.number("age").unwrap_or(0.0).max(0.0) as u32,
            father_phone_number: doc.opt_string("fatherPhoneNumber"),
            halaqa_id: doc.string("halaqaId")?,
            teacher_id: doc.opt_string("teacherId").unwrap_or_default(),
            memorization_progress: doc.number("memorizationProgress").unwrap_or(0.0),
            attendance_rate: doc.number("attendanceRate").unwrap_or(0.0),
            parent_id: doc.opt_string("parentId"),
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), self.name.as_str().into());
        fields.insert("age".into(), self.age.into());
        if let Some(phone) = &self.father_phone_number {
            fields.insert("fatherPhoneNumber".into(), phone.as_str().into());
        }
        fields.insert("halaqaId".into(), self.halaqa_id.as_str().into());
        fields.insert("teacherId".into(), self.teacher_id.as_str().into());
        fields.insert("memorizationProgress".into(), self.memorization_progress.into());
        fields.insert("attendanceRate".into(), self.attendance_rate.into());
        if let Some(parent_id) = &self.parent_id {
            fields.insert("parentId".into(), parent_id.as_str().into());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewStudentRequest {
        NewStudentRequest {
            name: "Yusuf".to_string(),
            age: 11,
            father_phone_number: Some("+966 50 123 4567".to_string()),
            halaqa_id: "h1".to_string(),
            memorization_progress: 40.0,
            parent_id: None,
        }
    }

    #[test]
    fn test_new_student_validation() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.name = "  ".to_string();
        bad.age = 0;
        bad.father_phone_number = Some("05-abc".to_string());
        match bad.validate() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("name").is_some());
                assert!(errors.get("age").is_some());
                assert!(errors.get("fatherPhoneNumber").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_student_defaults_attendance_to_full() {
        let student = request().into_student("t1".to_string());
        assert_eq!(student.attendance_rate, 100.0);
        assert_eq!(student.teacher_id, "t1");
    }

    #[test]
    fn test_document_roundtrip_keeps_optional_fields_out() {
        let mut student = request().into_student("t1".to_string());
        student.father_phone_number = None;
        let fields = student.to_fields();
        assert!(!fields.contains_key("fatherPhoneNumber"));
        assert!(!fields.contains_key("parentId"));

        let parsed = Student::from_document(&Document::new("s1", fields)).unwrap();
        assert_eq!(parsed.id, "s1");
        assert_eq!(parsed.age, 11);
        assert_eq!(parsed.memorization_progress, 40.0);
    }
}
