pub mod api;
pub mod models;

pub use models::{Class, Profile, Report, ReportStatus, Role, TransitionError, User};
