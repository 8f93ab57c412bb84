use chrono::NaiveDate;
use serde::Serialize;

use crate::derive::circles::mean;
use crate::derive::ranking::{PerformanceDistribution, performance_distribution};
use crate::models::{Halaqa, Student};

pub const NO_CIRCLE: &str = "N/A";

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CirclePerformance {
    pub halaqa_id: String,
    pub name: String,
    /// Unrounded.
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub halaqa_filter: Option<String>,
    pub student_count: usize,
    pub average_memorization: f64,
    pub average_attendance: f64,
    pub distribution: PerformanceDistribution,
    pub circle_performance: Vec<CirclePerformance>,
    pub top_circle: CirclePerformance,
    pub file_name: String,
}

pub fn export_file_name(day: NaiveDate) -> String {
    format!("quran_school_report_{}.pdf", day.format("%Y-%m-%d"))
}

/// Aggregates handed to the external renderer. Averages and distribution
/// honour `halaqa_filter`; circle performance always covers every circle.
pub fn build_report(
    students: &[Student],
    halaqat: &[Halaqa],
    halaqa_filter: Option<&str>,
    today: NaiveDate,
) -> Report {
    let selected: Vec<Student> = students
        .iter()
        .filter(|s| halaqa_filter.is_none_or(|id| s.halaqa_id == id))
        .cloned()
        .collect();

    let circle_performance: Vec<CirclePerformance> = halaqat
        .iter()
        .map(|h| CirclePerformance {
            halaqa_id: h.id.clone(),
            name: h.name.clone(),
            average: mean(
                students
                    .iter()
                    .filter(|s| s.halaqa_id == h.id)
                    .map(|s| s.memorization_progress),
            ),
        })
        .collect();

    // First maximum wins.
    let top_circle = circle_performance
        .iter()
        .fold(None::<&CirclePerformance>, |best, current| match best {
            Some(b) if current.average > b.average => Some(current),
            Some(b) => Some(b),
            None => Some(current),
        })
        .cloned()
        .unwrap_or_else(|| CirclePerformance {
            halaqa_id: String::new(),
            name: NO_CIRCLE.to_string(),
            average: 0.0,
        });

    Report {
        halaqa_filter: halaqa_filter.map(str::to_string),
        student_count: selected.len(),
        average_memorization: one_decimal(mean(selected.iter().map(|s| s.memorization_progress))),
        average_attendance: one_decimal(mean(selected.iter().map(|s| s.attendance_rate))),
        distribution: performance_distribution(&selected),
        circle_performance,
        top_circle,
        file_name: export_file_name(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::test_support::{day, halaqa, student};

    #[test]
    fn test_report_averages_and_top_circle() {
        let students = vec![
            student("s1", "h1", "t1", 90.0, 100.0),
            student("s2", "h1", "t1", 71.0, 95.0),
            student("s3", "h2", "t2", 80.5, 90.0),
        ];
        let halaqat = vec![halaqa("h1", "A", "t1"), halaqa("h2", "B", "t2"), halaqa("h3", "C", "t2")];

        let report = build_report(&students, &halaqat, None, day(2026, 4, 2));
        assert_eq!(report.average_memorization, 80.5);
        assert_eq!(report.average_attendance, 95.0);
        assert_eq!(report.circle_performance[0].average, 80.5);
        assert_eq!(report.top_circle.name, "A");
        assert_eq!(report.file_name, "quran_school_report_2026-04-02.pdf");

        let filtered = build_report(&students, &halaqat, Some("h2"), day(2026, 4, 2));
        assert_eq!(filtered.student_count, 1);
        assert_eq!(filtered.distribution.good, 1);
        assert_eq!(filtered.circle_performance.len(), 3);
    }

    #[test]
    fn test_report_without_data() {
        let report = build_report(&[], &[], None, day(2026, 4, 2));
        assert_eq!(report.average_memorization, 0.0);
        assert_eq!(report.top_circle.name, NO_CIRCLE);
    }
}
