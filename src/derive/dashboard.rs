use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::derive::attendance::{RateChange, TrendPoint, daily_rates, day_over_day, weekly_trend};
use crate::derive::circles::{CircleAverage, circle_averages, circles_of_teacher, mean, round_percent};
use crate::derive::ranking::{RankedStudent, TOP_N, top_by_memorization, top_students};
use crate::derive::time_ago::time_ago;
use crate::models::{ActivityLog, AttendanceLog, Halaqa, Student, Teacher};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    #[serde(flatten)]
    pub log: ActivityLog,
    pub time_ago: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_students: usize,
    pub total_teachers: usize,
    pub total_halaqat: usize,
    /// `None` until attendance has been recorded today.
    pub today_rate: Option<u32>,
    pub change: Option<RateChange>,
    pub weekly_trend: Vec<TrendPoint>,
    pub circle_averages: Vec<CircleAverage>,
    pub top_students: Vec<RankedStudent>,
    pub recent_activity: Vec<ActivityItem>,
}

pub fn admin_dashboard(
    students: &[Student],
    teachers: &[Teacher],
    halaqat: &[Halaqa],
    attendance: &[AttendanceLog],
    activity: &[ActivityLog],
    now: DateTime<Utc>,
) -> AdminDashboard {
    let today = now.date_naive();
    let rates = daily_rates(attendance);

    AdminDashboard {
        total_students: students.len(),
        total_teachers: teachers.len(),
        total_halaqat: halaqat.len(),
        today_rate: rates.get(&today).copied(),
        change: day_over_day(&rates, today),
        weekly_trend: weekly_trend(&rates, today),
        circle_averages: circle_averages(halaqat, students),
        top_students: top_students(students, TOP_N),
        recent_activity: activity
            .iter()
            .map(|log| ActivityItem {
                log: log.clone(),
                time_ago: time_ago(log.timestamp, now),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherOverview {
    pub halaqa_count: usize,
    pub student_count: usize,
    pub average_memorization: u32,
    pub average_attendance: u32,
    pub circle_averages: Vec<CircleAverage>,
    pub top_students: Vec<Student>,
    pub needing_attention: Vec<Student>,
}

fn needs_attention(student: &Student) -> bool {
    student.memorization_progress < 70.0 || student.attendance_rate < 90.0
}

/// Rollup over the teacher's own circles and students.
pub fn teacher_overview(teacher_id: &str, students: &[Student], halaqat: &[Halaqa]) -> TeacherOverview {
    let circles = circles_of_teacher(halaqat, teacher_id);
    let own: Vec<Student> = students
        .iter()
        .filter(|s| s.teacher_id == teacher_id)
        .cloned()
        .collect();

    if own.is_empty() {
        return TeacherOverview {
            halaqa_count: circles.len(),
            student_count: 0,
            average_memorization: 0,
            average_attendance: 0,
            circle_averages: Vec::new(),
            top_students: Vec::new(),
            needing_attention: Vec::new(),
        };
    }

    let owned_circles: Vec<Halaqa> = circles.into_iter().cloned().collect();
    let mut needing_attention: Vec<Student> = own.iter().filter(|s| needs_attention(s)).cloned().collect();
    needing_attention.sort_by(|a, b| a.memorization_progress.total_cmp(&b.memorization_progress));
    needing_attention.truncate(TOP_N);

    TeacherOverview {
        halaqa_count: owned_circles.len(),
        student_count: own.len(),
        average_memorization: round_percent(mean(own.iter().map(|s| s.memorization_progress))),
        average_attendance: round_percent(mean(own.iter().map(|s| s.attendance_rate))),
        circle_averages: circle_averages(&owned_circles, &own),
        top_students: top_by_memorization(&own, TOP_N),
        needing_attention,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub teacher: Teacher,
    pub halaqat: Vec<Halaqa>,
    pub student_count: usize,
    pub average_memorization: u32,
}

/// What the admin sees when opening a teacher.
pub fn teacher_profile(teacher: &Teacher, students: &[Student], halaqat: &[Halaqa]) -> TeacherProfile {
    let own: Vec<&Student> = students.iter().filter(|s| s.teacher_id == teacher.id).collect();
    TeacherProfile {
        teacher: teacher.clone(),
        halaqat: circles_of_teacher(halaqat, &teacher.id).into_iter().cloned().collect(),
        student_count: own.len(),
        average_memorization: round_percent(mean(own.iter().map(|s| s.memorization_progress))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{attendance_log, halaqa, student};
    use crate::models::{ActivityDetails, ActivityType, AttendanceStatus};
    use crate::store::Timestamp;
    use chrono::TimeZone;

    #[test]
    fn test_admin_dashboard_today_rate_and_feed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        let today = now.date_naive();
        let students = vec![student("s1", "h1", "t1", 95.0, 98.0), student("s2", "h1", "t1", 92.0, 99.0)];
        let halaqat = vec![halaqa("h1", "Al-Fajr", "t1"), halaqa("h2", "An-Nur", "t2")];
        let attendance = vec![attendance_log(
            "h1",
            today,
            &[("s1", AttendanceStatus::Present), ("s2", AttendanceStatus::Absent)],
        )];
        let activity = vec![ActivityLog::new(
            ActivityType::AbsenceLog,
            Timestamp::from_datetime(now - chrono::Duration::hours(2)),
            ActivityDetails::default(),
        )];

        let dash = admin_dashboard(&students, &[], &halaqat, &attendance, &activity, now);
        assert_eq!(dash.today_rate, Some(50));
        assert_eq!(dash.change, None);
        assert_eq!(dash.weekly_trend.len(), 7);
        assert_eq!(dash.circle_averages[1].average, 0);
        assert_eq!(dash.top_students[0].student.id, "s1");
        assert_eq!(dash.recent_activity[0].time_ago, "قبل 2 ساعات");
    }

    #[test]
    fn test_teacher_overview_attention_list() {
        let students = vec![
            student("a", "h1", "t1", 95.0, 99.0),
            student("b", "h1", "t1", 65.0, 95.0),
            student("c", "h2", "t1", 85.0, 80.0),
            student("d", "h2", "t1", 50.0, 99.0),
            student("e", "h3", "t2", 10.0, 10.0),
        ];
        let halaqat = vec![halaqa("h1", "A", "t1"), halaqa("h2", "B", "t1"), halaqa("h4", "D", "t1")];

        let overview = teacher_overview("t1", &students, &halaqat);
        assert_eq!(overview.halaqa_count, 3);
        assert_eq!(overview.student_count, 4);
        assert_eq!(overview.average_memorization, 74);
        let attention: Vec<_> = overview.needing_attention.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(attention, vec!["d", "b", "c"]);
        assert_eq!(overview.top_students[0].id, "a");
        assert_eq!(overview.circle_averages[2].average, 0);
    }

    #[test]
    fn test_teacher_without_students() {
        let overview = teacher_overview("t9", &[], &[halaqa("h1", "A", "t9")]);
        assert_eq!(overview.halaqa_count, 1);
        assert_eq!(overview.average_memorization, 0);
        assert!(overview.circle_averages.is_empty());
    }
}
