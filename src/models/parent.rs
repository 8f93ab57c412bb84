use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};
use crate::models::is_email_shaped;
use crate::store::{Collection, Document, Fields, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRequest {
    pub name: String,
    pub email: String,
    /// Accepted from the form but never stored.
    #[serde(default)]
    pub password: Option<String>,
}

impl ParentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Parent name is required");
        }
        if !is_email_shaped(self.email.trim()) {
            errors.add("email", "Email format is invalid");
        }
        errors.into_result()
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), self.name.trim().into());
        fields.insert("email".into(), self.email.trim().into());
        fields
    }
}

impl Record for Parent {
    const COLLECTION: Collection = Collection::Parents;

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
