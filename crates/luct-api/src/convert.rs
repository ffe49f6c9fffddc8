//! Row → API model conversion.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use luct_db::models::{ClassRow, ProfileRow, ReportRow, UserRow};
use luct_types::{Class, Profile, Report, ReportStatus, Role, User};

pub fn user(row: UserRow, profile: Option<ProfileRow>) -> Result<User> {
    let role: Role = row.role.parse().map_err(|e| anyhow!("user {}: {}", row.id, e))?;
    let profile = profile
        .filter(|_| role.has_profile())
        .map(|p| Profile { full_name: p.full_name, email: p.email });

    Ok(User {
        created_at: timestamp(&row.created_at, "user", row.id),
        id: row.id,
        username: row.username,
        role,
        name: row.name,
        email: row.email,
        profile,
    })
}

pub fn class(row: ClassRow) -> Class {
    Class {
        id: row.id,
        lecturer_id: row.lecturer_id,
        class_name: row.class_name,
        course_name: row.course_name,
        course_code: row.course_code,
    }
}

pub fn report(row: ReportRow) -> Result<Report> {
    let status: ReportStatus = row
        .status
        .parse()
        .map_err(|e| anyhow!("report {}: {}", row.id, e))?;
    let date_of_lecture = NaiveDate::parse_from_str(&row.date_of_lecture, "%Y-%m-%d")
        .with_context(|| format!("report {}: bad date '{}'", row.id, row.date_of_lecture))?;

    Ok(Report {
        created_at: timestamp(&row.created_at, "report", row.id),
        id: row.id,
        class_id: row.class_id,
        lecturer_id: row.lecturer_id,
        lecturer_name: row.lecturer_name,
        class_name: row.class_name,
        course_name: row.course_name,
        course_code: row.course_code,
        faculty_name: row.faculty_name,
        week_of_reporting: row.week_of_reporting,
        date_of_lecture,
        actual_students_present: row.actual_students_present,
        scheduled_lecture_time: row.scheduled_lecture_time,
        topic_taught: row.topic_taught,
        learning_outcomes: row.learning_outcomes,
        lecturer_recommendations: row.lecturer_recommendations,
        prl_feedback: row.prl_feedback,
        status,
    })
}

pub fn reports(rows: Vec<ReportRow>) -> Result<Vec<Report>> {
    rows.into_iter().map(report).collect()
}

fn timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}
