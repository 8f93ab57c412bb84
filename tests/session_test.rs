mod common;

use std::sync::Arc;
use std::time::Duration;

use halaqat::db::repository;
use halaqat::error::{AppError, ErrorKind};
use halaqat::identity::IdentityProvider;
use halaqat::services::session::{ADMIN_ID, ADMIN_NAME};
use halaqat::services::{PasswordChange, ProfileUpdate, Role, Session, SessionService};
use halaqat::store::get_record;
use halaqat::models::Teacher;

use common::{ADMIN_EMAIL, data_service, identity, seeded_store, settings_pool};

fn password_change(current: &str, new: &str, confirm: &str) -> PasswordChange {
    PasswordChange {
        current_password: current.to_string(),
        new_password: new.to_string(),
        confirm_password: confirm.to_string(),
    }
}

#[tokio::test]
async fn test_admin_marker_grants_admin() {
    let store = seeded_store();
    let service = SessionService::new(identity(), data_service(&store), settings_pool().await, ADMIN_EMAIL);

    let session = service.sign_in(ADMIN_EMAIL, "admin-pass").await.unwrap();
    match &session {
        Session::Admin(profile) => {
            assert_eq!(profile.id, ADMIN_ID);
            assert_eq!(profile.name, ADMIN_NAME);
            assert_eq!(profile.email, ADMIN_EMAIL);
        }
        other => panic!("expected admin, got {:?}", other),
    }
    assert_eq!(service.current().await, Some(session));
}

#[tokio::test]
async fn test_admin_profile_override_is_merged() {
    let store = seeded_store();
    let db = settings_pool().await;
    repository::save_admin_profile(
        &db,
        &repository::AdminProfileOverride {
            name: "Director".to_string(),
            email: "director@quran.system".to_string(),
        },
    )
    .await
    .unwrap();
    let service = SessionService::new(identity(), data_service(&store), db, ADMIN_EMAIL);

    let Session::Admin(profile) = service.sign_in(ADMIN_EMAIL, "admin-pass").await.unwrap() else {
        panic!("expected admin");
    };
    assert_eq!(profile.name, "Director");
    assert_eq!(profile.email, "director@quran.system");
}

#[tokio::test]
async fn test_teacher_profile_grants_teacher() {
    let store = seeded_store();
    let data = data_service(&store);
    let service = SessionService::new(identity(), data.clone(), settings_pool().await, ADMIN_EMAIL);

    let session = service.sign_in("t1@quran.system", "teacher-pass").await.unwrap();
    assert_eq!(session.role(), Role::Teacher);
    assert_eq!(session.owner_id(), "t1");
    assert_eq!(session.display_name(), "Teacher One");
    assert_eq!(data.snapshot().await.students.len(), 3);
}

#[tokio::test]
async fn test_unprovisioned_identity_is_signed_out() {
    let store = seeded_store();
    let identity = identity();
    let service = SessionService::new(identity.clone(), data_service(&store), settings_pool().await, ADMIN_EMAIL);

    let err = service.sign_in("ghost@quran.system", "ghost-pass").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotProvisioned);
    assert!(identity.current().is_none());
    assert!(service.current().await.is_none());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let store = seeded_store();
    let service = SessionService::new(identity(), data_service(&store), settings_pool().await, ADMIN_EMAIL);

    let err = service.sign_in("t1@quran.system", "nope").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));
}

#[tokio::test]
async fn test_sign_out_clears_local_state() {
    let store = seeded_store();
    let data = data_service(&store);
    let service = SessionService::new(identity(), data.clone(), settings_pool().await, ADMIN_EMAIL);

    service.sign_in(ADMIN_EMAIL, "admin-pass").await.unwrap();
    assert!(!data.snapshot().await.students.is_empty());

    service.sign_out().await.unwrap();
    assert!(service.current().await.is_none());
    assert!(data.snapshot().await.students.is_empty());
    assert!(matches!(service.require().await, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_provider_sign_out_reaches_the_session() {
    let store = seeded_store();
    let identity = identity();
    let service = Arc::new(SessionService::new(
        identity.clone(),
        data_service(&store),
        settings_pool().await,
        ADMIN_EMAIL,
    ));
    let listener = service.spawn_sign_out_listener();

    service.sign_in(ADMIN_EMAIL, "admin-pass").await.unwrap();
    identity.sign_out().await.unwrap();

    let cleared = tokio::time::timeout(Duration::from_secs(2), async {
        while service.current().await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(cleared.is_ok());
    listener.abort();
}

#[tokio::test]
async fn test_profile_update_per_role() {
    let store = seeded_store();
    let db = settings_pool().await;
    let service = SessionService::new(identity(), data_service(&store), db.clone(), ADMIN_EMAIL);

    service.sign_in(ADMIN_EMAIL, "admin-pass").await.unwrap();
    service
        .update_profile(ProfileUpdate {
            name: "Director".to_string(),
            email: None,
        })
        .await
        .unwrap();
    let saved = repository::fetch_admin_profile(&db).await.unwrap().unwrap();
    assert_eq!(saved.name, "Director");
    assert_eq!(saved.email, ADMIN_EMAIL);

    service.sign_out().await.unwrap();
    service.sign_in("t1@quran.system", "teacher-pass").await.unwrap();
    let session = service
        .update_profile(ProfileUpdate {
            name: "Sheikh Ahmad".to_string(),
            email: Some("ignored@quran.system".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(session.display_name(), "Sheikh Ahmad");
    let teacher = get_record::<Teacher>(store.as_ref(), "t1").await.unwrap().unwrap();
    assert_eq!(teacher.name, "Sheikh Ahmad");
    assert_eq!(teacher.email, "t1@quran.system");
}

#[tokio::test]
async fn test_password_change() {
    let store = seeded_store();
    let identity = identity();
    let service = SessionService::new(identity.clone(), data_service(&store), settings_pool().await, ADMIN_EMAIL);
    service.sign_in("t1@quran.system", "teacher-pass").await.unwrap();

    let err = service
        .change_password(password_change("teacher-pass", "fresh-pass", "other-pass"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .change_password(password_change("wrong", "fresh-pass", "fresh-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    service
        .change_password(password_change("teacher-pass", "fresh-pass", "fresh-pass"))
        .await
        .unwrap();
    assert_eq!(identity.password_of("t1@quran.system").as_deref(), Some("fresh-pass"));
}

#[tokio::test]
async fn test_dark_mode_round_trip() {
    let store = seeded_store();
    let service = SessionService::new(identity(), data_service(&store), settings_pool().await, ADMIN_EMAIL);

    assert!(!service.dark_mode().await.unwrap());
    service.set_dark_mode(true).await.unwrap();
    assert!(service.dark_mode().await.unwrap());
}
