//! Copyable configuration text handed to the permission-error screen.

/// Access rules the hosted store needs for the dashboard to work.
/// Activity and memorization logs are create-only for clients.
pub const ACCESS_RULES: &str = r#"rules_version = '2';
service cloud.firestore {
  match /databases/{database}/documents {
    match /students/{studentId} {
      allow read, write: if request.auth != null;
    }
    match /teachers/{teacherId} {
      allow read, write: if request.auth != null;
    }
    match /halaqat/{halaqaId} {
      allow read, write: if request.auth != null;
    }
    match /parents/{parentId} {
      allow read, write: if request.auth != null;
    }
    match /memorization_logs/{logId} {
      allow read, create: if request.auth != null;
    }
    match /daily_attendance/{docId} {
      allow read, write: if request.auth != null;
    }
    match /activity_logs/{logId} {
      allow read, create: if request.auth != null;
    }
  }
}"#;

pub fn rules_console_url(project_id: &str) -> String {
    format!(
        "https://console.firebase.google.com/project/{}/firestore/rules",
        project_id
    )
}

/// Pulls the index-creation link out of a failed-precondition message.
pub fn extract_link(message: &str) -> Option<String> {
    message
        .split_whitespace()
        .find(|word| word.starts_with("https://"))
        .map(|word| word.trim_end_matches(['.', ',', ')']).to_string())
}
