use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{AttendanceLog, AttendanceStatus, Student};
use crate::store::Timestamp;

pub const TREND_DAYS: i64 = 7;

/// Day labels indexed by days since Sunday.
const DAY_NAMES: [&str; 7] = [
    "الأحد",
    "الاثنين",
    "الثلاثاء",
    "الأربعاء",
    "الخميس",
    "الجمعة",
    "السبت",
];

pub fn day_name(day: NaiveDate) -> &'static str {
    DAY_NAMES[day.weekday().num_days_from_sunday() as usize]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

pub fn summarize<'a>(statuses: impl IntoIterator<Item = &'a AttendanceStatus>) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    for status in statuses {
        match status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Late => summary.late += 1,
        }
    }
    summary
}

/// Attendance rate per calendar day across all circles, rounded.
/// Days whose logs hold no records are absent from the map.
pub fn daily_rates(logs: &[AttendanceLog]) -> BTreeMap<NaiveDate, u32> {
    let mut totals: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for log in logs {
        let Some(day) = log.day() else {
            continue;
        };
        let entry = totals.entry(day).or_default();
        entry.0 += log.records.values().filter(|s| s.attended()).count();
        entry.1 += log.records.len();
    }

    totals
        .into_iter()
        .filter(|(_, (_, total))| *total > 0)
        .map(|(day, (attended, total))| {
            let rate = (attended as f64 / total as f64 * 100.0).round() as u32;
            (day, rate)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub label: &'static str,
    /// `None` when nothing was recorded that day.
    pub rate: Option<u32>,
}

impl TrendPoint {
    /// Value plotted on the chart; unrecorded days draw as 0.
    pub fn chart_value(&self) -> u32 {
        self.rate.unwrap_or(0)
    }
}

/// Exactly seven buckets, oldest first, ending on `today`.
pub fn weekly_trend(rates: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> Vec<TrendPoint> {
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            TrendPoint {
                date,
                label: day_name(date),
                rate: rates.get(&date).copied(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateChange {
    /// Absolute difference in percentage points.
    pub points: u32,
    pub direction: ChangeDirection,
}

/// Today's rate against yesterday's. `None` unless both days have a rate
/// and they differ.
pub fn day_over_day(rates: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> Option<RateChange> {
    let today_rate = i64::from(*rates.get(&today)?);
    let yesterday_rate = i64::from(*rates.get(&(today - Duration::days(1)))?);
    let diff = today_rate - yesterday_rate;
    if diff == 0 {
        return None;
    }
    Some(RateChange {
        points: diff.unsigned_abs() as u32,
        direction: if diff > 0 {
            ChangeDirection::Increase
        } else {
            ChangeDirection::Decrease
        },
    })
}

/// The circle's log for `day`, if one was submitted.
pub fn log_for_day<'a>(logs: &'a [AttendanceLog], halaqa_id: &str, day: NaiveDate) -> Option<&'a AttendanceLog> {
    logs.iter()
        .find(|log| log.halaqa_id == halaqa_id && log.day() == Some(day))
}

/// Form state for the circle's students: the saved status where one exists,
/// `present` otherwise.
pub fn preload_records(
    students: &[&Student],
    existing: Option<&AttendanceLog>,
) -> BTreeMap<String, AttendanceStatus> {
    students
        .iter()
        .map(|s| {
            let status = existing
                .and_then(|log| log.records.get(&s.id).copied())
                .unwrap_or(AttendanceStatus::Present);
            (s.id.clone(), status)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub date: Timestamp,
    pub summary: AttendanceSummary,
}

/// The circle's submitted days, newest first.
pub fn circle_history(logs: &[AttendanceLog], halaqa_id: &str) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = logs
        .iter()
        .filter(|log| log.halaqa_id == halaqa_id)
        .map(|log| HistoryEntry {
            date: log.date,
            summary: summarize(log.records.values()),
        })
        .collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub date: Timestamp,
    pub status: AttendanceStatus,
}

/// The student's most recent `limit` recorded statuses, newest first.
pub fn student_attendance(logs: &[AttendanceLog], student_id: &str, limit: usize) -> Vec<StudentAttendance> {
    let mut entries: Vec<StudentAttendance> = logs
        .iter()
        .filter_map(|log| {
            log.records.get(student_id).map(|status| StudentAttendance {
                date: log.date,
                status: *status,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{attendance_log, day};

    #[test]
    fn test_summary_scenario() {
        let log = attendance_log(
            "h1",
            day(2026, 3, 1),
            &[
                ("s1", AttendanceStatus::Present),
                ("s2", AttendanceStatus::Absent),
                ("s3", AttendanceStatus::Late),
            ],
        );
        assert_eq!(
            summarize(log.records.values()),
            AttendanceSummary {
                present: 1,
                absent: 1,
                late: 1
            }
        );
    }

    #[test]
    fn test_daily_rates_merge_circles_and_skip_empty_days() {
        let logs = vec![
            attendance_log(
                "h1",
                day(2026, 3, 1),
                &[("s1", AttendanceStatus::Present), ("s2", AttendanceStatus::Absent)],
            ),
            attendance_log("h2", day(2026, 3, 1), &[("s3", AttendanceStatus::Late)]),
            attendance_log("h1", day(2026, 3, 2), &[]),
            attendance_log("h1", day(2026, 3, 3), &[("s1", AttendanceStatus::Absent)]),
        ];
        let rates = daily_rates(&logs);
        assert_eq!(rates.get(&day(2026, 3, 1)), Some(&67));
        assert_eq!(rates.get(&day(2026, 3, 2)), None);
        assert_eq!(rates.get(&day(2026, 3, 3)), Some(&0));
    }

    #[test]
    fn test_trend_has_seven_buckets_and_keeps_gaps() {
        let mut rates = BTreeMap::new();
        rates.insert(day(2026, 3, 7), 0);
        rates.insert(day(2026, 3, 5), 80);
        let trend = weekly_trend(&rates, day(2026, 3, 7));

        assert_eq!(trend.len(), 7);
        assert_eq!(trend[0].date, day(2026, 3, 1));
        assert_eq!(trend[0].label, "الأحد");
        assert_eq!(trend[6].date, day(2026, 3, 7));
        assert_eq!(trend[6].rate, Some(0));
        assert_eq!(trend[5].rate, None);
        assert_eq!(trend[5].chart_value(), 0);
        assert_eq!(trend[4].rate, Some(80));
    }

    #[test]
    fn test_day_over_day_change() {
        let today = day(2026, 3, 7);
        let mut rates = BTreeMap::new();
        rates.insert(today, 90);
        assert_eq!(day_over_day(&rates, today), None);

        rates.insert(day(2026, 3, 6), 90);
        assert_eq!(day_over_day(&rates, today), None);

        rates.insert(day(2026, 3, 6), 95);
        assert_eq!(
            day_over_day(&rates, today),
            Some(RateChange {
                points: 5,
                direction: ChangeDirection::Decrease
            })
        );
    }

    #[test]
    fn test_student_history_newest_first_and_capped() {
        let logs: Vec<_> = (1..=7)
            .map(|d| attendance_log("h1", day(2026, 3, d), &[("s1", AttendanceStatus::Present)]))
            .collect();
        let history = student_attendance(&logs, "s1", 5);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].date.date(), Some(day(2026, 3, 7)));
        assert!(student_attendance(&logs, "s9", 5).is_empty());
    }
}
