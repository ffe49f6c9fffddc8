use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use luct_db::{NewReport, ReportScope, TransitionOutcome};
use luct_types::api::{Claims, CreateReportRequest, FeedbackRequest, ReportQuery};

use crate::auth::{AppState, run_blocking};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, parse_id};

/// GET /lecturer/classes
pub async fn list_classes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let lecturer_id = claims.sub;
    let rows = run_blocking(&state, move |db| Ok(db.list_classes_for_lecturer(lecturer_id)?)).await?;

    Ok(Json(rows.into_iter().map(convert::class).collect::<Vec<_>>()))
}

/// Report fields after validation, owned so they can cross into the blocking pool.
#[derive(Debug)]
struct ValidReport {
    class_id: i64,
    faculty_name: String,
    week_of_reporting: i64,
    date_of_lecture: NaiveDate,
    actual_students_present: i64,
    scheduled_lecture_time: String,
    topic_taught: String,
    learning_outcomes: String,
    lecturer_recommendations: Option<String>,
}

fn required_text(value: String, field: &str) -> Result<String, ApiError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(value)
}

fn required_int(value: Option<i64>, field: &str) -> Result<i64, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

fn validate(req: CreateReportRequest) -> Result<ValidReport, ApiError> {
    let class_id = required_int(req.class_id, "class_id")?;
    let faculty_name = required_text(req.faculty_name, "faculty_name")?;

    let week_of_reporting = required_int(req.week_of_reporting, "week_of_reporting")?;
    if week_of_reporting < 1 {
        return Err(ApiError::Validation("week_of_reporting must be at least 1".into()));
    }

    let date_text = required_text(req.date_of_lecture, "date_of_lecture")?;
    let date_of_lecture = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("date_of_lecture must be YYYY-MM-DD".into()))?;

    let actual_students_present =
        required_int(req.actual_students_present, "actual_students_present")?;
    if actual_students_present < 0 {
        return Err(ApiError::Validation(
            "actual_students_present cannot be negative".into(),
        ));
    }

    Ok(ValidReport {
        class_id,
        faculty_name,
        week_of_reporting,
        date_of_lecture,
        actual_students_present,
        scheduled_lecture_time: required_text(req.scheduled_lecture_time, "scheduled_lecture_time")?,
        topic_taught: required_text(req.topic_taught, "topic_taught")?,
        learning_outcomes: required_text(req.learning_outcomes, "learning_outcomes")?,
        lecturer_recommendations: req
            .lecturer_recommendations
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    })
}

/// POST /lecturer/reports — new reports always start out `submitted`.
pub async fn submit_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = validate(req)?;
    let lecturer_id = claims.sub;

    let created = run_blocking(&state, move |db| {
        // The class must exist and belong to the submitting lecturer.
        match db.get_class(report.class_id)? {
            Some(class) if class.lecturer_id == lecturer_id => {}
            _ => return Err(ApiError::Validation("Unknown class".into())),
        }

        let date = report.date_of_lecture.format("%Y-%m-%d").to_string();
        let id = db.insert_report(&NewReport {
            class_id: report.class_id,
            lecturer_id,
            faculty_name: &report.faculty_name,
            week_of_reporting: report.week_of_reporting,
            date_of_lecture: &date,
            actual_students_present: report.actual_students_present,
            scheduled_lecture_time: &report.scheduled_lecture_time,
            topic_taught: &report.topic_taught,
            learning_outcomes: &report.learning_outcomes,
            lecturer_recommendations: report.lecturer_recommendations.as_deref(),
        })?;

        let row = db
            .get_report(id)?
            .ok_or_else(|| anyhow::anyhow!("report {} vanished after insert", id))?;
        Ok(convert::report(row)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_scoped(
    state: &AppState,
    scope: ReportScope,
    query: ReportQuery,
) -> Result<Json<Vec<luct_types::Report>>, ApiError> {
    let rows = run_blocking(state, move |db| {
        Ok(db.list_reports(scope, query.search.as_deref())?)
    })
    .await?;

    Ok(Json(convert::reports(rows)?))
}

/// GET /lecturer/reports — the caller's own reports only.
pub async fn list_lecturer_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    list_scoped(&state, ReportScope::Lecturer(claims.sub), query).await
}

/// GET /prl/reports — the review queue.
pub async fn list_prl_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    list_scoped(&state, ReportScope::AwaitingReview, query).await
}

/// GET /pl/reports — everything.
pub async fn list_pl_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    list_scoped(&state, ReportScope::All, query).await
}

/// POST /prl/reports/{id}/feedback
pub async fn add_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let feedback = req.feedback.trim().to_string();
    if feedback.is_empty() {
        return Err(ApiError::Validation("Feedback is required".into()));
    }

    let report = run_blocking(&state, move |db| {
        let outcome = db.apply_feedback(id, &feedback)?;
        finish_transition(db, id, outcome)
    })
    .await?;

    info!("{} left feedback on report {}", claims.username, id);
    Ok(Json(report))
}

/// POST /pl/reports/{id}/approve
pub async fn approve_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let report = run_blocking(&state, move |db| {
        let outcome = db.approve_report(id)?;
        finish_transition(db, id, outcome)
    })
    .await?;

    info!("{} approved report {}", claims.username, id);
    Ok(Json(report))
}

fn finish_transition(
    db: &luct_db::Database,
    id: i64,
    outcome: TransitionOutcome,
) -> Result<luct_types::Report, ApiError> {
    match outcome {
        TransitionOutcome::Applied(_) => {
            let row = db.get_report(id)?.ok_or(ApiError::NotFound("Report not found"))?;
            Ok(convert::report(row)?)
        }
        TransitionOutcome::NotFound => Err(ApiError::NotFound("Report not found")),
        TransitionOutcome::Rejected(e) => {
            warn!("Report {}: {}", id, e);
            Err(ApiError::Validation(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> CreateReportRequest {
        CreateReportRequest {
            class_id: Some(1),
            faculty_name: "Faculty of ICT".into(),
            week_of_reporting: Some(6),
            date_of_lecture: "2024-03-14".into(),
            actual_students_present: Some(31),
            scheduled_lecture_time: "08:30".into(),
            topic_taught: "Normalisation".into(),
            learning_outcomes: "3NF".into(),
            lecturer_recommendations: Some("   ".into()),
        }
    }

    #[test]
    fn recommendations_are_optional() {
        let report = validate(complete()).unwrap();
        assert!(report.lecturer_recommendations.is_none());
        assert_eq!(report.date_of_lecture, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
    }

    #[test]
    fn every_other_field_is_required() {
        let cases: Vec<(&str, fn(&mut CreateReportRequest))> = vec![
            ("class_id", |r| r.class_id = None),
            ("faculty_name", |r| r.faculty_name.clear()),
            ("week_of_reporting", |r| r.week_of_reporting = None),
            ("date_of_lecture", |r| r.date_of_lecture = " ".into()),
            ("actual_students_present", |r| r.actual_students_present = None),
            ("scheduled_lecture_time", |r| r.scheduled_lecture_time.clear()),
            ("topic_taught", |r| r.topic_taught.clear()),
            ("learning_outcomes", |r| r.learning_outcomes.clear()),
        ];

        for (field, blank) in cases {
            let mut req = complete();
            blank(&mut req);
            match validate(req) {
                Err(ApiError::Validation(msg)) => assert_eq!(msg, format!("{field} is required")),
                other => panic!("{field}: expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut req = complete();
        req.week_of_reporting = Some(0);
        assert!(matches!(validate(req), Err(ApiError::Validation(_))));

        let mut req = complete();
        req.actual_students_present = Some(-1);
        assert!(matches!(validate(req), Err(ApiError::Validation(_))));

        let mut req = complete();
        req.date_of_lecture = "14/03/2024".into();
        assert!(matches!(validate(req), Err(ApiError::Validation(_))));
    }
}
