mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use halaqat::api::router;
use halaqat::state::AppState;
use halaqat::store::InMemoryStore;
use halaqat::store::memory::LOCAL_PROJECT_ID;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{ADMIN_EMAIL, identity, seeded_store, settings_pool};

async fn app() -> (Router, AppState) {
    let (app, state, _) = app_with_store().await;
    (app, state)
}

async fn app_with_store() -> (Router, AppState, Arc<InMemoryStore>) {
    let store = seeded_store();
    let state = AppState::new(store.clone(), identity(), settings_pool().await, ADMIN_EMAIL);
    (router(state.clone()), state, store)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn sign_in(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/session",
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, _) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_requires_session() {
    let (app, _) = app().await;
    let (status, body) = call(&app, Method::GET, "/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "generic");
}

#[tokio::test]
async fn test_admin_dashboard_and_report() {
    let (app, _) = app().await;
    let session = sign_in(&app, ADMIN_EMAIL, "admin-pass").await;
    assert_eq!(session["kind"], "admin");

    let (status, body) = call(&app, Method::GET, "/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "admin");
    assert_eq!(body["totalStudents"], 3);
    assert_eq!(body["weeklyTrend"].as_array().unwrap().len(), 7);

    let (status, body) = call(&app, Method::GET, "/reports?halaqaId=h1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["studentCount"], 2);
    assert!(body["fileName"].as_str().unwrap().starts_with("quran_school_report_"));
}

#[tokio::test]
async fn test_teacher_is_scoped() {
    let (app, _) = app().await;
    let session = sign_in(&app, "t1@quran.system", "teacher-pass").await;
    assert_eq!(session["kind"], "teacher");

    let (_, body) = call(&app, Method::GET, "/students", None).await;
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);

    let (status, _) = call(&app, Method::GET, "/students/s3", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, "/reports", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(&app, Method::GET, "/pages/reports", None).await;
    assert_eq!(body["page"], "dashboard");

    let (_, body) = call(&app, Method::GET, "/dashboard", None).await;
    assert_eq!(body["kind"], "teacher");
    assert_eq!(body["halaqaCount"], 1);
}

#[tokio::test]
async fn test_teacher_attendance_round_trip() {
    let (app, state) = app().await;
    sign_in(&app, "t1@quran.system", "teacher-pass").await;

    let (status, form) = call(&app, Method::GET, "/attendance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["halaqaId"], "h1");
    assert_eq!(form["records"]["s1"], "present");
    assert_eq!(form["summary"]["present"], 2);

    let (status, receipt) = call(
        &app,
        Method::POST,
        "/attendance",
        Some(json!({ "halaqaId": "h1", "records": { "s1": "present", "s2": "absent" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", receipt);
    assert_eq!(receipt["absencesLogged"], 1);

    let (_, form) = call(&app, Method::GET, "/attendance?halaqaId=h1", None).await;
    assert_eq!(form["records"]["s2"], "absent");
    assert_eq!(form["history"].as_array().unwrap().len(), 1);

    let (status, _) = call(
        &app,
        Method::POST,
        "/attendance",
        Some(json!({ "halaqaId": "h2", "records": { "s3": "present" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(state.data.snapshot().await.attendance_logs.len(), 1);
}

#[tokio::test]
async fn test_validation_errors_are_per_field() {
    let (app, _) = app().await;
    sign_in(&app, ADMIN_EMAIL, "admin-pass").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/students",
        Some(json!({ "name": "", "age": 0, "halaqaId": "h1", "memorizationProgress": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation");
    assert!(body["details"]["name"].is_string());
    assert!(body["details"]["age"].is_string());
    assert!(body["details"]["memorizationProgress"].is_string());
}

#[tokio::test]
async fn test_circle_reassignment_over_http() {
    let (app, _) = app().await;
    sign_in(&app, ADMIN_EMAIL, "admin-pass").await;

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/halaqat/h1",
        Some(json!({ "name": "Al-Fajr", "teacherId": "t2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cascaded"], 2);

    let (_, body) = call(&app, Method::GET, "/repairs", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_settings_persist() {
    let (app, _) = app().await;
    let (_, body) = call(&app, Method::GET, "/settings", None).await;
    assert_eq!(body["darkMode"], false);

    call(&app, Method::PUT, "/settings", Some(json!({ "darkMode": true }))).await;
    let (_, body) = call(&app, Method::GET, "/settings", None).await;
    assert_eq!(body["darkMode"], true);
}

#[tokio::test]
async fn test_permission_error_carries_rules_and_console() {
    let (app, _, store) = app_with_store().await;
    sign_in(&app, ADMIN_EMAIL, "admin-pass").await;
    store.deny_permissions(true);

    let (status, body) = call(&app, Method::POST, "/refresh", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission-denied");
    assert!(body["details"]["rules"].as_str().unwrap().contains("memorization_logs"));
    assert_eq!(
        body["details"]["console"].as_str().unwrap(),
        format!("https://console.firebase.google.com/project/{}/firestore/rules", LOCAL_PROJECT_ID)
    );

    let (_, body) = call(&app, Method::GET, "/snapshot", None).await;
    assert_eq!(body["permissionError"], true);
}
