pub mod attendance;
pub mod memorization;
pub mod roster;
pub mod session;
pub mod snapshot;
pub mod workflow;

pub use attendance::{AttendanceReceipt, AttendanceService, AttendanceSubmission, attendance_batch};
pub use memorization::{MemorizationReceipt, MemorizationService, MemorizationSubmission, memorization_batch};
pub use roster::{HalaqaUpdate, RosterService, reassignment_batch};
pub use session::{
    AdminProfile, Page, PasswordChange, ProfileUpdate, Role, Session, SessionService, allowed_pages, resolve_page,
    visible_halaqat, visible_students,
};
pub use snapshot::{DataService, Snapshot, fetch_snapshot};
pub use workflow::{Workflow, WorkflowState};
