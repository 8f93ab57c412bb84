//! Pure derivations over already-fetched records. Nothing here touches the
//! store; identical inputs always give identical outputs.

pub mod attendance;
pub mod circles;
pub mod dashboard;
pub mod ranking;
pub mod reports;
pub mod roster;
pub mod time_ago;

pub use attendance::{
    AttendanceSummary, ChangeDirection, HistoryEntry, RateChange, StudentAttendance, TrendPoint,
    circle_history, daily_rates, day_name, day_over_day, log_for_day, preload_records, student_attendance,
    summarize, weekly_trend,
};
pub use circles::{CircleAverage, circle_averages, circle_memorization_average, circles_of_teacher, enrich_circles};
pub use dashboard::{
    ActivityItem, AdminDashboard, TeacherOverview, TeacherProfile, admin_dashboard, teacher_overview,
    teacher_profile,
};
pub use ranking::{
    PerformanceDistribution, PerformanceTier, RankedStudent, composite_score, performance_distribution,
    top_by_memorization, top_students,
};
pub use reports::{CirclePerformance, Report, build_report, export_file_name};
pub use roster::{
    NOT_SPECIFIED, ParentSummary, StudentFilter, StudentProfile, TeacherRefRepair, filter_students,
    halaqa_name, parent_summaries, student_profile, teacher_name, teacher_ref_repairs,
};
pub use time_ago::time_ago;

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::models::{AttendanceLog, AttendanceStatus, Halaqa, Student};
    use crate::models::attendance_key;
    use crate::store::Timestamp;

    pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn student(id: &str, halaqa_id: &str, teacher_id: &str, memorization: f64, attendance: f64) -> Student {
        Student {
            id: id.to_string(),
            name: format!("Student {}", id),
            age: 10,
            father_phone_number: None,
            halaqa_id: halaqa_id.to_string(),
            teacher_id: teacher_id.to_string(),
            memorization_progress: memorization,
            attendance_rate: attendance,
            parent_id: None,
        }
    }

    pub fn halaqa(id: &str, name: &str, teacher_id: &str) -> Halaqa {
        Halaqa {
            id: id.to_string(),
            name: name.to_string(),
            teacher_id: teacher_id.to_string(),
            student_count: 0,
        }
    }

    pub fn attendance_log(halaqa_id: &str, on: NaiveDate, records: &[(&str, AttendanceStatus)]) -> AttendanceLog {
        let at = Utc
            .from_utc_datetime(&on.and_hms_opt(9, 0, 0).unwrap());
        AttendanceLog {
            id: attendance_key(halaqa_id, on),
            date: Timestamp::from_datetime(at),
            halaqa_id: halaqa_id.to_string(),
            teacher_id: "t1".to_string(),
            records: records
                .iter()
                .map(|(id, status)| (id.to_string(), *status))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}
