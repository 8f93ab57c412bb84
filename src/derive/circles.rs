use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Halaqa, Student};

/// Attaches `student_count` from the student set, whatever the stored value.
pub fn enrich_circles(halaqat: Vec<Halaqa>, students: &[Student]) -> Vec<Halaqa> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for student in students {
        *counts.entry(student.halaqa_id.as_str()).or_default() += 1;
    }

    halaqat
        .into_iter()
        .map(|mut h| {
            h.student_count = counts.get(h.id.as_str()).copied().unwrap_or(0);
            h
        })
        .collect()
}

/// Mean of `values`, 0 for an empty input.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub(crate) fn round_percent(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Rounded memorization average of the circle's students; 0 when empty.
pub fn circle_memorization_average(halaqa_id: &str, students: &[Student]) -> u32 {
    round_percent(mean(
        students
            .iter()
            .filter(|s| s.halaqa_id == halaqa_id)
            .map(|s| s.memorization_progress),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleAverage {
    pub halaqa_id: String,
    pub name: String,
    pub average: u32,
}

/// One entry per circle, in circle order.
pub fn circle_averages(halaqat: &[Halaqa], students: &[Student]) -> Vec<CircleAverage> {
    halaqat
        .iter()
        .map(|h| CircleAverage {
            halaqa_id: h.id.clone(),
            name: h.name.clone(),
            average: circle_memorization_average(&h.id, students),
        })
        .collect()
}

pub fn circles_of_teacher<'a>(halaqat: &'a [Halaqa], teacher_id: &str) -> Vec<&'a Halaqa> {
    halaqat.iter().filter(|h| h.teacher_id == teacher_id).collect()
}
