use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account roles. A single users table holds every account; the role is the
/// discriminant that decides which profile payload (if any) it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lecturer,
    Student,
    Admin,
    /// Principal lecturer: reviews reports and attaches feedback.
    Prl,
    /// Program leader: approves reports.
    Pl,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Lecturer, Role::Student, Role::Admin, Role::Prl, Role::Pl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Lecturer => "lecturer",
            Role::Student => "student",
            Role::Admin => "admin",
            Role::Prl => "prl",
            Role::Pl => "pl",
        }
    }

    /// Lecturers, students and PRLs get a profile row; admins and PLs don't.
    pub fn has_profile(&self) -> bool {
        matches!(self, Role::Lecturer | Role::Student | Role::Prl)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Lifecycle of a lecture report: `submitted` → `under_review` → `approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    UnderReview,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Report is already approved")]
    AlreadyApproved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Submitted,
        ReportStatus::UnderReview,
        ReportStatus::Approved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::UnderReview => "under_review",
            ReportStatus::Approved => "approved",
        }
    }

    /// Status after a PRL attaches feedback. Repeating feedback on a report
    /// already under review keeps it there.
    pub fn after_feedback(self) -> Result<ReportStatus, TransitionError> {
        match self {
            ReportStatus::Submitted | ReportStatus::UnderReview => Ok(ReportStatus::UnderReview),
            ReportStatus::Approved => Err(TransitionError::AlreadyApproved),
        }
    }

    /// Status after a PL approves. Approval does not require a prior review,
    /// so a submitted report can be approved directly.
    pub fn after_approval(self) -> ReportStatus {
        ReportStatus::Approved
    }

    /// Statuses that show up in the PRL review queue.
    pub fn awaits_review(&self) -> bool {
        matches!(self, ReportStatus::Submitted | ReportStatus::UnderReview)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown report status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ReportStatus::Submitted),
            "under_review" => Ok(ReportStatus::UnderReview),
            "approved" => Ok(ReportStatus::Approved),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Role-specific profile payload (lecturer, student and PRL accounts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: String,
    pub email: Option<String>,
}

/// Account as exposed over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub lecturer_id: i64,
    pub class_name: String,
    pub course_name: String,
    pub course_code: String,
}

/// A lecture report joined with the class and lecturer it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub class_id: i64,
    pub lecturer_id: i64,
    pub lecturer_name: String,
    pub class_name: String,
    pub course_name: String,
    pub course_code: String,
    pub faculty_name: String,
    pub week_of_reporting: i64,
    pub date_of_lecture: NaiveDate,
    pub actual_students_present: i64,
    pub scheduled_lecture_time: String,
    pub topic_taught: String,
    pub learning_outcomes: String,
    pub lecturer_recommendations: Option<String>,
    pub prl_feedback: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}
