use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::derive::attendance::{StudentAttendance, student_attendance};
use crate::models::{AttendanceLog, Halaqa, Parent, Student, Teacher};

/// Label shown when a referenced circle or teacher no longer exists.
pub const NOT_SPECIFIED: &str = "غير محدد";

const PROFILE_HISTORY: usize = 5;

pub fn halaqa_name<'a>(halaqat: &'a [Halaqa], id: &str) -> &'a str {
    halaqat
        .iter()
        .find(|h| h.id == id)
        .map(|h| h.name.as_str())
        .unwrap_or(NOT_SPECIFIED)
}

pub fn teacher_name<'a>(teachers: &'a [Teacher], id: &str) -> &'a str {
    teachers
        .iter()
        .find(|t| t.id == id)
        .map(|t| t.name.as_str())
        .unwrap_or(NOT_SPECIFIED)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    /// Restricts to one teacher's students.
    #[serde(default)]
    pub teacher_id: Option<String>,
    /// Case-insensitive substring of the name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub halaqa_id: Option<String>,
    #[serde(default)]
    pub min_memorization: Option<f64>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        let teacher = self.teacher_id.as_deref().is_none_or(|t| student.teacher_id == t);
        let name = self
            .search
            .as_deref()
            .is_none_or(|q| student.name.to_lowercase().contains(&q.to_lowercase()));
        let circle = self
            .halaqa_id
            .as_deref()
            .filter(|h| !h.is_empty())
            .is_none_or(|h| student.halaqa_id == h);
        let memorization = self
            .min_memorization
            .is_none_or(|min| student.memorization_progress >= min);
        teacher && name && circle && memorization
    }
}

pub fn filter_students(students: &[Student], filter: &StudentFilter) -> Vec<Student> {
    students.iter().filter(|s| filter.matches(s)).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student: Student,
    pub halaqa_name: String,
    pub teacher_name: String,
    pub recent_attendance: Vec<StudentAttendance>,
}

pub fn student_profile(
    student: &Student,
    halaqat: &[Halaqa],
    teachers: &[Teacher],
    attendance: &[AttendanceLog],
) -> StudentProfile {
    StudentProfile {
        student: student.clone(),
        halaqa_name: halaqa_name(halaqat, &student.halaqa_id).to_string(),
        teacher_name: teacher_name(teachers, &student.teacher_id).to_string(),
        recent_attendance: student_attendance(attendance, &student.id, PROFILE_HISTORY),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentSummary {
    #[serde(flatten)]
    pub parent: Parent,
    pub child_count: usize,
}

pub fn parent_summaries(parents: &[Parent], students: &[Student]) -> Vec<ParentSummary> {
    parents
        .iter()
        .map(|p| ParentSummary {
            parent: p.clone(),
            child_count: students
                .iter()
                .filter(|s| s.parent_id.as_deref() == Some(p.id.as_str()))
                .count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRefRepair {
    pub student_id: String,
    pub halaqa_id: String,
    pub current: String,
    pub expected: String,
}

/// Students whose `teacher_id` drifted from their circle's teacher.
/// Students of deleted circles are left alone.
pub fn teacher_ref_repairs(students: &[Student], halaqat: &[Halaqa]) -> Vec<TeacherRefRepair> {
    let owners: HashMap<&str, &str> = halaqat
        .iter()
        .map(|h| (h.id.as_str(), h.teacher_id.as_str()))
        .collect();

    students
        .iter()
        .filter_map(|s| {
            let expected = owners.get(s.halaqa_id.as_str())?;
            (s.teacher_id != *expected).then(|| TeacherRefRepair {
                student_id: s.id.clone(),
                halaqa_id: s.halaqa_id.clone(),
                current: s.teacher_id.clone(),
                expected: expected.to_string(),
            })
        })
        .collect()
}
