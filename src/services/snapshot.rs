use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::derive::enrich_circles;
use crate::error::AppError;
use crate::models::{ActivityLog, AttendanceLog, Halaqa, Parent, Student, Teacher};
use crate::store::{Direction, Query, RecordStore, Timestamp, list_records, query_records};

pub const RECENT_ACTIVITY: usize = 5;
const ATTENDANCE_WINDOW_DAYS: i64 = 7;

/// Everything the dashboard views read, fetched in one pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub teachers: Vec<Teacher>,
    pub students: Vec<Student>,
    pub halaqat: Vec<Halaqa>,
    pub parents: Vec<Parent>,
    pub attendance_logs: Vec<AttendanceLog>,
    pub activity_logs: Vec<ActivityLog>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// `[today - 7 days at 00:00, today at 23:59:59.999]`.
pub fn attendance_window(now: DateTime<Utc>) -> (Timestamp, Timestamp) {
    let today = now.date_naive();
    let start = (today - Duration::days(ATTENDANCE_WINDOW_DAYS)).and_time(NaiveTime::MIN);
    let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    let end = today.and_time(end_time);
    (
        Timestamp::from_datetime(start.and_utc()),
        Timestamp::from_datetime(end.and_utc()),
    )
}

pub async fn fetch_snapshot(store: &dyn RecordStore, now: DateTime<Utc>) -> Result<Snapshot, AppError> {
    let teachers: Vec<Teacher> = list_records(store).await?;
    let students: Vec<Student> = list_records(store).await?;
    let halaqat: Vec<Halaqa> = list_records(store).await?;
    let halaqat = enrich_circles(halaqat, &students);
    let parents: Vec<Parent> = list_records(store).await?;

    let (from, to) = attendance_window(now);
    let attendance_logs: Vec<AttendanceLog> = query_records(
        store,
        &Query::new().where_gte("date", from).where_lte("date", to),
    )
    .await?;

    let activity_logs: Vec<ActivityLog> = query_records(
        store,
        &Query::new()
            .order_by("timestamp", Direction::Descending)
            .limit(RECENT_ACTIVITY),
    )
    .await?;

    debug!(
        "Fetched {} teachers, {} students, {} circles, {} attendance logs, {} activity logs",
        teachers.len(),
        students.len(),
        halaqat.len(),
        attendance_logs.len(),
        activity_logs.len()
    );

    Ok(Snapshot {
        teachers,
        students,
        halaqat,
        parents,
        attendance_logs,
        activity_logs,
        fetched_at: Some(now),
    })
}

/// Holds the latest snapshot. Every successful mutation calls `refresh`.
pub struct DataService {
    store: Arc<dyn RecordStore>,
    snapshot: RwLock<Arc<Snapshot>>,
    permission_error: AtomicBool,
}

impl DataService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            permission_error: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Set when the last fetch was rejected by the store's access rules.
    pub fn permission_error(&self) -> bool {
        self.permission_error.load(Ordering::SeqCst)
    }

    /// Re-fetches everything. The previous snapshot stays in place on failure.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, AppError> {
        self.refresh_at(Utc::now()).await
    }

    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Result<Arc<Snapshot>, AppError> {
        self.permission_error.store(false, Ordering::SeqCst);
        match fetch_snapshot(self.store.as_ref(), now).await {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                *self.snapshot.write().await = fresh.clone();
                info!("Snapshot refreshed");
                Ok(fresh)
            }
            Err(e) => {
                if e.is_permission_denied() {
                    self.permission_error.store(true, Ordering::SeqCst);
                }
                error!("Failed to fetch data: {}", e);
                Err(e)
            }
        }
    }

    /// Drops local state on logout. In-flight requests are not cancelled.
    pub async fn clear(&self) {
        *self.snapshot.write().await = Arc::new(Snapshot::default());
        self.permission_error.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_spans_eight_calendar_days() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 30, 0).unwrap();
        let (from, to) = attendance_window(now);
        assert_eq!(
            from.to_datetime(),
            Some(Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap())
        );
        let end = to.to_datetime().unwrap();
        assert_eq!(end.date_naive(), now.date_naive());
        assert_eq!(to.nanoseconds, 999_000_000);
    }
}
