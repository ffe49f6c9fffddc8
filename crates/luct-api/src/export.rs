use axum::{
    Extension,
    extract::State,
    http::header,
    response::IntoResponse,
};
use tracing::info;

use luct_db::ReportScope;
use luct_types::Report;
use luct_types::api::Claims;

use crate::auth::{AppState, run_blocking};
use crate::convert;
use crate::error::ApiError;

const HEADERS: [&str; 16] = [
    "ID",
    "Lecturer",
    "Class",
    "Course",
    "Course Code",
    "Faculty",
    "Week",
    "Date of Lecture",
    "Students Present",
    "Scheduled Time",
    "Topic Taught",
    "Learning Outcomes",
    "Recommendations",
    "PRL Feedback",
    "Status",
    "Submitted At",
];

/// GET /reports/export — every report as a CSV sheet.
pub async fn export_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, |db| Ok(db.list_reports(ReportScope::All, None)?)).await?;
    let reports = convert::reports(rows)?;

    info!("{} exported {} reports", claims.username, reports.len());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"reports.csv\""),
        ],
        render_csv(&reports),
    ))
}

pub fn render_csv(reports: &[Report]) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADERS.iter().map(|h| h.to_string()));

    for r in reports {
        push_record(
            &mut out,
            [
                r.id.to_string(),
                r.lecturer_name.clone(),
                r.class_name.clone(),
                r.course_name.clone(),
                r.course_code.clone(),
                r.faculty_name.clone(),
                r.week_of_reporting.to_string(),
                r.date_of_lecture.format("%Y-%m-%d").to_string(),
                r.actual_students_present.to_string(),
                r.scheduled_lecture_time.clone(),
                r.topic_taught.clone(),
                r.learning_outcomes.clone(),
                r.lecturer_recommendations.clone().unwrap_or_default(),
                r.prl_feedback.clone().unwrap_or_default(),
                r.status.to_string(),
                r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
            .into_iter(),
        );
    }
    out
}

fn push_record(out: &mut String, fields: impl Iterator<Item = String>) {
    let line = fields.map(|f| escape(&f)).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// RFC 4180 quoting: wrap in quotes when needed, double embedded quotes.
/// Cells a spreadsheet would evaluate as a formula get a leading `'`.
fn escape(field: &str) -> String {
    let field = if field.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{field}")
    } else {
        field.to_string()
    };

    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}
