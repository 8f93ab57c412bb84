use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::repository::{self, AdminProfileOverride};
use crate::error::{AppError, FieldErrors};
use crate::identity::{Identity, IdentityProvider};
use crate::models::{Halaqa, MIN_PASSWORD_LEN, Student, Teacher, is_email_shaped};
use crate::services::snapshot::DataService;
use crate::store::{Collection, Fields, RecordStore, get_record};

pub const DEFAULT_ADMIN_EMAIL: &str = "admin123@quran.system";
pub const ADMIN_ID: &str = "admin01";
pub const ADMIN_NAME: &str = "عبدالله الأحمد";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl AdminProfile {
    pub fn with_override(admin_email: &str, local: Option<AdminProfileOverride>) -> Self {
        let mut profile = AdminProfile {
            id: ADMIN_ID.to_string(),
            name: ADMIN_NAME.to_string(),
            email: admin_email.to_string(),
        };
        if let Some(local) = local {
            profile.name = local.name;
            profile.email = local.email;
        }
        profile
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Session {
    Admin(AdminProfile),
    Teacher(Teacher),
}

impl Session {
    pub fn role(&self) -> Role {
        match self {
            Session::Admin(_) => Role::Admin,
            Session::Teacher(_) => Role::Teacher,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Session::Admin(profile) => &profile.id,
            Session::Teacher(teacher) => &teacher.id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Session::Admin(profile) => &profile.name,
            Session::Teacher(teacher) => &teacher.name,
        }
    }

    /// The teacher id rows are scoped to; `None` for the admin.
    pub fn teacher_scope(&self) -> Option<&str> {
        match self {
            Session::Admin(_) => None,
            Session::Teacher(teacher) => Some(&teacher.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Dashboard,
    Students,
    Teachers,
    Halaqat,
    Attendance,
    Memorization,
    Reports,
    Settings,
    Parents,
}

const ALL_PAGES: [Page; 9] = [
    Page::Dashboard,
    Page::Students,
    Page::Teachers,
    Page::Halaqat,
    Page::Attendance,
    Page::Memorization,
    Page::Reports,
    Page::Settings,
    Page::Parents,
];

const TEACHER_PAGES: [Page; 6] = [
    Page::Dashboard,
    Page::Students,
    Page::Halaqat,
    Page::Attendance,
    Page::Memorization,
    Page::Settings,
];

impl Page {
    pub fn parse(name: &str) -> Option<Page> {
        ALL_PAGES.iter().copied().find(|p| p.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::Dashboard => "dashboard",
            Page::Students => "students",
            Page::Teachers => "teachers",
            Page::Halaqat => "halaqat",
            Page::Attendance => "attendance",
            Page::Memorization => "memorization",
            Page::Reports => "reports",
            Page::Settings => "settings",
            Page::Parents => "parents",
        }
    }
}

pub fn allowed_pages(role: Role) -> &'static [Page] {
    match role {
        Role::Admin => &ALL_PAGES,
        Role::Teacher => &TEACHER_PAGES,
    }
}

/// Unknown or forbidden pages land on the dashboard.
pub fn resolve_page(role: Role, requested: &str) -> Page {
    Page::parse(requested)
        .filter(|page| allowed_pages(role).contains(page))
        .unwrap_or(Page::Dashboard)
}

pub fn visible_students(session: &Session, students: &[Student]) -> Vec<Student> {
    match session.teacher_scope() {
        None => students.to_vec(),
        Some(teacher_id) => students.iter().filter(|s| s.teacher_id == teacher_id).cloned().collect(),
    }
}

pub fn visible_halaqat(session: &Session, halaqat: &[Halaqa]) -> Vec<Halaqa> {
    match session.teacher_scope() {
        None => halaqat.to_vec(),
        Some(teacher_id) => halaqat.iter().filter(|h| h.teacher_id == teacher_id).cloned().collect(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    /// Only the admin's email is editable.
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.current_password.is_empty() || self.new_password.is_empty() || self.confirm_password.is_empty() {
            errors.add("form", "Please fill in all fields");
            return errors.into_result();
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            errors.add("newPassword", "Password must be at least 6 characters");
        }
        if self.new_password != self.confirm_password {
            errors.add("confirmPassword", "Passwords do not match");
        }
        errors.into_result()
    }
}

/// Resolves identities into admin/teacher sessions and owns the
/// per-user settings.
///
/// Holds a single session for the whole process: every request acts as
/// whoever signed in last. Only suitable for one local operator with the
/// server bound to a loopback address.
pub struct SessionService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RecordStore>,
    data: Arc<DataService>,
    settings: SqlitePool,
    admin_email: String,
    current: RwLock<Option<Session>>,
}

impl SessionService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        data: Arc<DataService>,
        settings: SqlitePool,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            store: data.store(),
            data,
            settings,
            admin_email: admin_email.into(),
            current: RwLock::new(None),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let identity = self.identity.sign_in(email.trim(), password).await?;
        let session = self.resolve(&identity).await?;
        if let Err(e) = self.data.refresh().await {
            warn!("Signed in but the first fetch failed: {}", e);
        }
        Ok(session)
    }

    /// Admin marker first, then a teacher profile under the uid. Anything
    /// else signs the identity out and fails with `NotProvisioned`.
    pub async fn resolve(&self, identity: &Identity) -> Result<Session, AppError> {
        let session = if identity.email.eq_ignore_ascii_case(&self.admin_email) {
            let local = repository::fetch_admin_profile(&self.settings).await?;
            Session::Admin(AdminProfile::with_override(&self.admin_email, local))
        } else {
            match get_record::<Teacher>(self.store.as_ref(), &identity.uid).await? {
                Some(teacher) => Session::Teacher(teacher),
                None => {
                    warn!("No profile for {}; signing out", identity.email);
                    self.sign_out().await?;
                    return Err(AppError::NotProvisioned {
                        email: identity.email.clone(),
                    });
                }
            }
        };

        info!(
            "Session resolved for {} as {:?} ({}, {})",
            identity.email,
            session.role(),
            session.display_name(),
            session.owner_id()
        );
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.forget().await;
        self.identity.sign_out().await
    }

    async fn forget(&self) {
        *self.current.write().await = None;
        self.data.clear().await;
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn require(&self) -> Result<Session, AppError> {
        self.current().await.ok_or(AppError::Unauthenticated)
    }

    pub async fn require_admin(&self) -> Result<AdminProfile, AppError> {
        match self.require().await? {
            Session::Admin(profile) => Ok(profile),
            Session::Teacher(_) => Err(AppError::Forbidden),
        }
    }

    /// Clears local state whenever the provider reports a sign-out.
    pub fn spawn_sign_out_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut changes = self.identity.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let signed_out = changes.borrow_and_update().is_none();
                if signed_out && service.current().await.is_some() {
                    info!("Identity signed out; clearing session");
                    service.forget().await;
                }
            }
        })
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Session, AppError> {
        let session = self.require().await?;
        let mut errors = FieldErrors::new();
        let name = update.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }

        let updated = match session {
            Session::Admin(profile) => {
                let email = update
                    .email
                    .map(|e| e.trim().to_string())
                    .unwrap_or_else(|| profile.email.clone());
                if !is_email_shaped(&email) {
                    errors.add("email", "Email format is invalid");
                }
                errors.into_result()?;

                let local = AdminProfileOverride { name, email };
                repository::save_admin_profile(&self.settings, &local).await?;
                Session::Admin(AdminProfile::with_override(&self.admin_email, Some(local)))
            }
            Session::Teacher(mut teacher) => {
                errors.into_result()?;
                let mut fields = Fields::new();
                fields.insert("name".into(), name.as_str().into());
                self.store.update(Collection::Teachers, &teacher.id, fields).await?;
                teacher.name = name;
                if let Err(e) = self.data.refresh().await {
                    warn!("Profile saved but refresh failed: {}", e);
                }
                Session::Teacher(teacher)
            }
        };

        *self.current.write().await = Some(updated.clone());
        Ok(updated)
    }

    pub async fn change_password(&self, change: PasswordChange) -> Result<(), AppError> {
        self.require().await?;
        change.validate()?;
        self.identity
            .change_password(&change.current_password, &change.new_password)
            .await?;
        info!("Password changed");
        Ok(())
    }

    pub async fn dark_mode(&self) -> Result<bool, AppError> {
        Ok(repository::fetch_dark_mode(&self.settings).await?)
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> Result<(), AppError> {
        repository::save_dark_mode(&self.settings, enabled).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{halaqa, student};

    fn teacher_session(id: &str) -> Session {
        Session::Teacher(Teacher {
            id: id.to_string(),
            name: "Teacher".to_string(),
            email: format!("{}@quran.system", id),
        })
    }

    #[test]
    fn test_teacher_pages_redirect_to_dashboard() {
        assert_eq!(resolve_page(Role::Teacher, "attendance"), Page::Attendance);
        assert_eq!(resolve_page(Role::Teacher, "reports"), Page::Dashboard);
        assert_eq!(resolve_page(Role::Teacher, "teachers"), Page::Dashboard);
        assert_eq!(resolve_page(Role::Admin, "parents"), Page::Parents);
        assert_eq!(resolve_page(Role::Admin, "nowhere"), Page::Dashboard);
        assert_eq!(allowed_pages(Role::Admin).len(), 9);
    }

    #[test]
    fn test_rows_scoped_to_teacher() {
        let students = vec![
            student("s1", "h1", "t1", 80.0, 90.0),
            student("s2", "h2", "t2", 70.0, 95.0),
        ];
        let circles = vec![halaqa("h1", "Al-Fajr", "t1"), halaqa("h2", "An-Nur", "t2")];

        let mine = visible_students(&teacher_session("t1"), &students);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "s1");
        assert_eq!(visible_halaqat(&teacher_session("t2"), &circles)[0].id, "h2");

        let admin = Session::Admin(AdminProfile::with_override(DEFAULT_ADMIN_EMAIL, None));
        assert_eq!(visible_students(&admin, &students).len(), 2);
        assert_eq!(admin.owner_id(), ADMIN_ID);
    }

    #[test]
    fn test_admin_profile_override_wins() {
        let local = AdminProfileOverride {
            name: "Director".to_string(),
            email: "director@quran.system".to_string(),
        };
        let profile = AdminProfile::with_override(DEFAULT_ADMIN_EMAIL, Some(local));
        assert_eq!(profile.id, ADMIN_ID);
        assert_eq!(profile.name, "Director");
        assert_eq!(profile.email, "director@quran.system");
    }

    #[test]
    fn test_password_change_validation() {
        let change = |current: &str, new: &str, confirm: &str| PasswordChange {
            current_password: current.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        };
        let Err(AppError::Validation(errors)) = change("", "abcdef", "abcdef").validate() else {
            panic!("expected validation error");
        };
        assert!(errors.get("form").is_some());

        let Err(AppError::Validation(errors)) = change("old", "abc", "abd").validate() else {
            panic!("expected validation error");
        };
        assert!(errors.get("newPassword").is_some());
        assert!(errors.get("confirmPassword").is_some());

        assert!(change("old", "abcdef", "abcdef").validate().is_ok());
    }
}
