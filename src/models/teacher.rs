use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};
use crate::models::{MIN_PASSWORD_LEN, is_email_shaped};
use crate::store::{Collection, Document, Fields, Record};

/// Teacher profile. The document id is the teacher's identity uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeacherRequest {
    pub name: String,
    pub email: String,
    /// Used once to provision the account; never stored.
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeacherRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "Teacher name is required");
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "Email is required");
    } else if !is_email_shaped(email.trim()) {
        errors.add("email", "Email format is invalid");
    }
}

impl NewTeacherRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &self.name);
        check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add("password", "Password must be at least 6 characters");
        }
        errors.into_result()
    }
}

impl UpdateTeacherRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        errors.into_result()
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), name.trim().into());
        }
        if let Some(email) = &self.email {
            fields.insert("email".into(), email.trim().into());
        }
        fields
    }
}

impl Record for Teacher {
    const COLLECTION: Collection = Collection::Teachers;

    fn from_document(doc: &Document) -> Result<Self, AppError> {
        Ok(Self {
            id: doc.id.clone(),
            name: doc.string("name")?,
            email: doc.opt_string("email").unwrap_or_default(),
        })
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), self.name.as_str().into());
        fields.insert("email".into(), self.email.as_str().into());
        fields
    }
}
