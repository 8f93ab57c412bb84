pub mod activity;
pub mod attendance;
pub mod halaqa;
pub mod memorization;
pub mod parent;
pub mod student;
pub mod teacher;

pub use activity::{ActivityDetails, ActivityLog, ActivityType};
pub use attendance::{AttendanceLog, AttendanceStatus, attendance_key};
pub use halaqa::{Halaqa, HalaqaRequest};
pub use memorization::{MemorizationEntry, MemorizationLog, Quality};
pub use parent::{Parent, ParentRequest};
pub use student::{NewStudentRequest, Student, UpdateStudentRequest};
pub use teacher::{NewTeacherRequest, Teacher, UpdateTeacherRequest};

pub const MIN_PASSWORD_LEN: usize = 6;

/// `something@something.something`, without whitespace.
pub fn is_email_shaped(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Digits and spaces, optionally led by `+`.
pub fn is_phone_number(phone: &str) -> bool {
    let rest = phone.strip_prefix('+').unwrap_or(phone);
    !rest.is_empty()
        && rest.chars().any(|c| c.is_ascii_digit())
        && rest.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_email_shaped("admin123@quran.system"));
        assert!(!is_email_shaped("admin123@quran"));
        assert!(!is_email_shaped("@quran.system"));
        assert!(!is_email_shaped("a b@quran.system"));
        assert!(!is_email_shaped("a@b."));
    }

    #[test]
    fn test_phone_shape() {
        assert!(is_phone_number("0501234567"));
        assert!(is_phone_number("+966 50 123 4567"));
        assert!(!is_phone_number("050-123"));
        assert!(!is_phone_number("+"));
    }
}
