use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::derive::{
    self, AdminDashboard, AttendanceSummary, HistoryEntry, ParentSummary, Report, StudentFilter, StudentProfile,
    TeacherOverview, TeacherProfile, TeacherRefRepair,
};
use crate::error::AppError;
use crate::models::*;
use crate::services::{
    AttendanceReceipt, AttendanceSubmission, HalaqaUpdate, MemorizationReceipt, MemorizationSubmission, Page,
    PasswordChange, ProfileUpdate, Session, Snapshot, allowed_pages, resolve_page, visible_halaqat,
    visible_students,
};
use crate::state::AppState;
use crate::store::get_record;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(current_session).post(sign_in).delete(sign_out))
        .route("/pages", get(list_pages))
        .route("/pages/{name}", get(open_page))
        .route("/snapshot", get(snapshot))
        .route("/refresh", post(refresh))
        .route("/dashboard", get(dashboard))
        .route("/students", get(list_students).post(create_student))
        .route("/students/{id}", get(student).patch(update_student).delete(delete_student))
        .route("/students/{id}/memorization", get(memorization_history))
        .route("/teachers", get(list_teachers).post(create_teacher))
        .route("/teachers/{id}", get(teacher).patch(update_teacher).delete(delete_teacher))
        .route("/halaqat", get(list_halaqat).post(create_halaqa))
        .route("/halaqat/{id}", patch(update_halaqa).delete(delete_halaqa))
        .route("/parents", get(list_parents).post(create_parent))
        .route("/parents/{id}", patch(update_parent).delete(delete_parent))
        .route("/attendance", get(attendance_form).post(submit_attendance))
        .route("/memorization", post(submit_memorization))
        .route("/reports", get(report))
        .route("/repairs", get(repairs))
        .route("/settings", get(settings).put(save_settings))
        .route("/profile", put(update_profile))
        .route("/password", post(change_password))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

/// Teachers may only touch circles they lead.
async fn ensure_circle(state: &AppState, session: &Session, halaqa_id: &str) -> Result<(), AppError> {
    let Some(teacher_id) = session.teacher_scope() else {
        return Ok(());
    };
    let store = state.data.store();
    match get_record::<Halaqa>(store.as_ref(), halaqa_id).await? {
        Some(h) if h.teacher_id == teacher_id => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

async fn ensure_student(state: &AppState, session: &Session, student_id: &str) -> Result<Student, AppError> {
    let store = state.data.store();
    let student = get_record::<Student>(store.as_ref(), student_id)
        .await?
        .ok_or(AppError::NotFound)?;
    match session.teacher_scope() {
        Some(teacher_id) if student.teacher_id != teacher_id => Err(AppError::Forbidden),
        _ => Ok(student),
    }
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

async fn sign_in(State(state): State<AppState>, Json(req): Json<SignInRequest>) -> Result<Json<Session>, AppError> {
    let session = state.session.sign_in(&req.email, &req.password).await?;
    Ok(Json(session))
}

async fn current_session(State(state): State<AppState>) -> Result<Json<Session>, AppError> {
    Ok(Json(state.session.require().await?))
}

async fn sign_out(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.session.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct PageView {
    page: Page,
    allowed: &'static [Page],
}

async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<Page>>, AppError> {
    let session = state.session.require().await?;
    Ok(Json(allowed_pages(session.role()).to_vec()))
}

async fn open_page(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<PageView>, AppError> {
    let session = state.session.require().await?;
    Ok(Json(PageView {
        page: resolve_page(session.role(), &name),
        allowed: allowed_pages(session.role()),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotView {
    #[serde(flatten)]
    snapshot: Snapshot,
    permission_error: bool,
}

fn scoped(session: &Session, snapshot: &Snapshot) -> Snapshot {
    let mut view = snapshot.clone();
    view.students = visible_students(session, &snapshot.students);
    view.halaqat = visible_halaqat(session, &snapshot.halaqat);
    if session.teacher_scope().is_some() {
        view.parents.clear();
    }
    view
}

async fn snapshot(State(state): State<AppState>) -> Result<Json<SnapshotView>, AppError> {
    let session = state.session.require().await?;
    let snapshot = state.data.snapshot().await;
    Ok(Json(SnapshotView {
        snapshot: scoped(&session, &snapshot),
        permission_error: state.data.permission_error(),
    }))
}

async fn refresh(State(state): State<AppState>) -> Result<Json<SnapshotView>, AppError> {
    let session = state.session.require().await?;
    let snapshot = state.data.refresh().await?;
    Ok(Json(SnapshotView {
        snapshot: scoped(&session, &snapshot),
        permission_error: false,
    }))
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum DashboardView {
    Admin(AdminDashboard),
    Teacher(TeacherOverview),
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardView>, AppError> {
    let session = state.session.require().await?;
    let s = state.data.snapshot().await;
    let view = match session.teacher_scope() {
        None => DashboardView::Admin(derive::admin_dashboard(
            &s.students,
            &s.teachers,
            &s.halaqat,
            &s.attendance_logs,
            &s.activity_logs,
            Utc::now(),
        )),
        Some(teacher_id) => DashboardView::Teacher(derive::teacher_overview(teacher_id, &s.students, &s.halaqat)),
    };
    Ok(Json(view))
}

async fn list_students(
    State(state): State<AppState>,
    Query(mut filter): Query<StudentFilter>,
) -> Result<Json<Vec<Student>>, AppError> {
    let session = state.session.require().await?;
    if let Some(teacher_id) = session.teacher_scope() {
        filter.teacher_id = Some(teacher_id.to_string());
    }
    let s = state.data.snapshot().await;
    Ok(Json(derive::filter_students(&s.students, &filter)))
}

async fn student(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StudentProfile>, AppError> {
    let session = state.session.require().await?;
    let student = ensure_student(&state, &session, &id).await?;
    let s = state.data.snapshot().await;
    Ok(Json(derive::student_profile(
        &student,
        &s.halaqat,
        &s.teachers,
        &s.attendance_logs,
    )))
}

async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<NewStudentRequest>,
) -> Result<Json<Student>, AppError> {
    state.session.require_admin().await?;
    Ok(Json(state.roster.create_student(req).await?))
}

async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.update_student(&id, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_student(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.delete_student(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn memorization_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MemorizationLog>>, AppError> {
    let session = state.session.require().await?;
    ensure_student(&state, &session, &id).await?;
    Ok(Json(state.memorization.history(&id).await?))
}

async fn list_teachers(State(state): State<AppState>) -> Result<Json<Vec<Teacher>>, AppError> {
    state.session.require_admin().await?;
    Ok(Json(state.data.snapshot().await.teachers.clone()))
}

async fn teacher(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TeacherProfile>, AppError> {
    state.session.require_admin().await?;
    let s = state.data.snapshot().await;
    let teacher = s.teachers.iter().find(|t| t.id == id).ok_or(AppError::NotFound)?;
    Ok(Json(derive::teacher_profile(teacher, &s.students, &s.halaqat)))
}

async fn create_teacher(
    State(state): State<AppState>,
    Json(req): Json<NewTeacherRequest>,
) -> Result<Json<Teacher>, AppError> {
    state.session.require_admin().await?;
    Ok(Json(state.roster.create_teacher(req).await?))
}

async fn update_teacher(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTeacherRequest>,
) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.update_teacher(&id, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_teacher(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.delete_teacher(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_halaqat(State(state): State<AppState>) -> Result<Json<Vec<Halaqa>>, AppError> {
    let session = state.session.require().await?;
    let s = state.data.snapshot().await;
    Ok(Json(visible_halaqat(&session, &s.halaqat)))
}

#[derive(Serialize)]
struct Created {
    id: String,
}

async fn create_halaqa(
    State(state): State<AppState>,
    Json(req): Json<HalaqaRequest>,
) -> Result<Json<Created>, AppError> {
    state.session.require_admin().await?;
    let id = state.roster.create_halaqa(req).await?;
    Ok(Json(Created { id }))
}

async fn update_halaqa(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<HalaqaRequest>,
) -> Result<Json<HalaqaUpdate>, AppError> {
    state.session.require_admin().await?;
    Ok(Json(state.roster.update_halaqa(&id, req).await?))
}

async fn delete_halaqa(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.delete_halaqa(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_parents(State(state): State<AppState>) -> Result<Json<Vec<ParentSummary>>, AppError> {
    state.session.require_admin().await?;
    let s = state.data.snapshot().await;
    Ok(Json(derive::parent_summaries(&s.parents, &s.students)))
}

async fn create_parent(
    State(state): State<AppState>,
    Json(req): Json<ParentRequest>,
) -> Result<Json<Parent>, AppError> {
    state.session.require_admin().await?;
    Ok(Json(state.roster.create_parent(req).await?))
}

async fn update_parent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ParentRequest>,
) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.update_parent(&id, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_parent(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.session.require_admin().await?;
    state.roster.delete_parent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceFormParams {
    halaqa_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceForm {
    halaqat: Vec<Halaqa>,
    halaqa_id: Option<String>,
    students: Vec<Student>,
    records: BTreeMap<String, AttendanceStatus>,
    summary: AttendanceSummary,
    history: Vec<HistoryEntry>,
}

async fn attendance_form(
    State(state): State<AppState>,
    Query(params): Query<AttendanceFormParams>,
) -> Result<Json<AttendanceForm>, AppError> {
    let session = state.session.require().await?;
    let s = state.data.snapshot().await;
    let halaqat = visible_halaqat(&session, &s.halaqat);

    let halaqa_id = params
        .halaqa_id
        .filter(|id| !id.is_empty())
        .or_else(|| halaqat.first().map(|h| h.id.clone()));
    if let Some(id) = &halaqa_id {
        if !halaqat.iter().any(|h| &h.id == id) {
            return Err(AppError::Forbidden);
        }
    }

    let selected = halaqa_id.as_deref().unwrap_or_default();
    let enrolled: Vec<&Student> = s.students.iter().filter(|st| st.halaqa_id == selected).collect();
    let existing = derive::log_for_day(&s.attendance_logs, selected, Utc::now().date_naive());
    let records = derive::preload_records(&enrolled, existing);

    Ok(Json(AttendanceForm {
        summary: derive::summarize(records.values()),
        history: derive::circle_history(&s.attendance_logs, selected),
        students: enrolled.into_iter().cloned().collect(),
        records,
        halaqa_id,
        halaqat,
    }))
}

async fn submit_attendance(
    State(state): State<AppState>,
    Json(mut submission): Json<AttendanceSubmission>,
) -> Result<Json<AttendanceReceipt>, AppError> {
    let session = state.session.require().await?;
    ensure_circle(&state, &session, &submission.halaqa_id).await?;
    if let Some(teacher_id) = session.teacher_scope() {
        submission.teacher_id = Some(teacher_id.to_string());
    }
    Ok(Json(state.attendance.submit(submission).await?))
}

async fn submit_memorization(
    State(state): State<AppState>,
    Json(mut submission): Json<MemorizationSubmission>,
) -> Result<Json<MemorizationReceipt>, AppError> {
    let session = state.session.require().await?;
    ensure_circle(&state, &session, &submission.halaqa_id).await?;
    if let Some(teacher_id) = session.teacher_scope() {
        submission.teacher_id = Some(teacher_id.to_string());
    }
    Ok(Json(state.memorization.submit(submission).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportParams {
    halaqa_id: Option<String>,
}

async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Report>, AppError> {
    state.session.require_admin().await?;
    let s = state.data.snapshot().await;
    let filter = params.halaqa_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(derive::build_report(
        &s.students,
        &s.halaqat,
        filter,
        Utc::now().date_naive(),
    )))
}

async fn repairs(State(state): State<AppState>) -> Result<Json<Vec<TeacherRefRepair>>, AppError> {
    state.session.require_admin().await?;
    let s = state.data.snapshot().await;
    Ok(Json(derive::teacher_ref_repairs(&s.students, &s.halaqat)))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    dark_mode: bool,
}

async fn settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    let dark_mode = state.session.dark_mode().await?;
    Ok(Json(Settings { dark_mode }))
}

async fn save_settings(
    State(state): State<AppState>,
    Json(req): Json<Settings>,
) -> Result<Json<Settings>, AppError> {
    state.session.set_dark_mode(req.dark_mode).await?;
    Ok(Json(req))
}

async fn update_profile(
    State(state): State<AppState>,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.session.update_profile(req).await?))
}

async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    state.session.change_password(req).await?;
    Ok(StatusCode::NO_CONTENT)
}
