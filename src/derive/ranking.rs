use serde::Serialize;

use crate::models::Student;

pub const TOP_N: usize = 3;

const MEMORIZATION_WEIGHT: f64 = 0.6;
const ATTENDANCE_WEIGHT: f64 = 0.4;

pub fn composite_score(student: &Student) -> f64 {
    MEMORIZATION_WEIGHT * student.memorization_progress + ATTENDANCE_WEIGHT * student.attendance_rate
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    #[serde(flatten)]
    pub student: Student,
    pub score: f64,
}

/// Highest composite scores first. `sort_by` is stable, so equal scores
/// keep their input order.
pub fn top_students(students: &[Student], n: usize) -> Vec<RankedStudent> {
    let mut ranked: Vec<RankedStudent> = students
        .iter()
        .map(|s| RankedStudent {
            student: s.clone(),
            score: composite_score(s),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(n);
    ranked
}

/// Highest memorization first, stable on ties.
pub fn top_by_memorization(students: &[Student], n: usize) -> Vec<Student> {
    let mut sorted = students.to_vec();
    sorted.sort_by(|a, b| b.memorization_progress.total_cmp(&a.memorization_progress));
    sorted.truncate(n);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    NeedsAttention,
}

impl PerformanceTier {
    pub fn of(memorization: f64) -> Self {
        if memorization >= 90.0 {
            PerformanceTier::Excellent
        } else if memorization >= 70.0 {
            PerformanceTier::Good
        } else {
            PerformanceTier::NeedsAttention
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDistribution {
    pub excellent: usize,
    pub good: usize,
    pub needs_attention: usize,
}

pub fn performance_distribution(students: &[Student]) -> PerformanceDistribution {
    let mut dist = PerformanceDistribution::default();
    for student in students {
        match PerformanceTier::of(student.memorization_progress) {
            PerformanceTier::Excellent => dist.excellent += 1,
            PerformanceTier::Good => dist.good += 1,
            PerformanceTier::NeedsAttention => dist.needs_attention += 1,
        }
    }
    dist
}
