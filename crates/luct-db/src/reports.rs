use crate::Database;
use crate::models::ReportRow;
use crate::queries::OptionalExt;
use anyhow::{Result, anyhow};
use luct_types::{ReportStatus, TransitionError};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::info;

const REPORT_SELECT: &str = "
    SELECT r.id, r.class_id, r.lecturer_id, u.name, c.class_name, c.course_name, c.course_code,
           r.faculty_name, r.week_of_reporting, r.date_of_lecture, r.actual_students_present,
           r.scheduled_lecture_time, r.topic_taught, r.learning_outcomes,
           r.lecturer_recommendations, r.prl_feedback, r.status, r.created_at
    FROM reports r
    JOIN classes c ON r.class_id = c.id
    JOIN users u ON r.lecturer_id = u.id";

/// Which reports a listing may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    /// Only reports written by this lecturer.
    Lecturer(i64),
    /// The PRL review queue: submitted and under review.
    AwaitingReview,
    All,
}

/// Validated report fields, ready to insert.
#[derive(Debug)]
pub struct NewReport<'a> {
    pub class_id: i64,
    pub lecturer_id: i64,
    pub faculty_name: &'a str,
    pub week_of_reporting: i64,
    pub date_of_lecture: &'a str,
    pub actual_students_present: i64,
    pub scheduled_lecture_time: &'a str,
    pub topic_taught: &'a str,
    pub learning_outcomes: &'a str,
    pub lecturer_recommendations: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(ReportStatus),
    NotFound,
    Rejected(TransitionError),
}

impl Database {
    pub fn insert_report(&self, report: &NewReport<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (class_id, lecturer_id, faculty_name, week_of_reporting,
                     date_of_lecture, actual_students_present, scheduled_lecture_time,
                     topic_taught, learning_outcomes, lecturer_recommendations, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    report.class_id,
                    report.lecturer_id,
                    report.faculty_name,
                    report.week_of_reporting,
                    report.date_of_lecture,
                    report.actual_students_present,
                    report.scheduled_lecture_time,
                    report.topic_taught,
                    report.learning_outcomes,
                    report.lecturer_recommendations,
                    ReportStatus::Submitted.as_str(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            info!("Lecturer {} submitted report {} for class {}", report.lecturer_id, id, report.class_id);
            Ok(id)
        })
    }

    pub fn get_report(&self, id: i64) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| query_report(conn, id))
    }

    /// List reports visible under `scope`, newest first. `search` is a
    /// case-insensitive substring matched against class name, course name and
    /// topic, plus the lecturer's name outside the lecturer's own scope.
    pub fn list_reports(&self, scope: ReportScope, search: Option<&str>) -> Result<Vec<ReportRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match scope {
            ReportScope::Lecturer(lecturer_id) => {
                clauses.push("r.lecturer_id = ?".to_string());
                values.push(lecturer_id.into());
            }
            ReportScope::AwaitingReview => {
                let queued: Vec<ReportStatus> =
                    ReportStatus::ALL.into_iter().filter(ReportStatus::awaits_review).collect();
                let slots = vec!["?"; queued.len()].join(", ");
                clauses.push(format!("r.status IN ({slots})"));
                values.extend(queued.iter().map(|s| Value::from(s.as_str().to_string())));
            }
            ReportScope::All => {}
        }

        let matcher = search.map(str::trim).filter(|t| !t.is_empty()).map(|term| {
            let mut columns = vec!["c.class_name", "c.course_name", "r.topic_taught"];
            if !matches!(scope, ReportScope::Lecturer(_)) {
                columns.push("u.name");
            }
            let needle = term.to_lowercase();
            for _ in &columns {
                values.push(needle.clone().into());
            }
            columns
                .iter()
                .map(|col| format!("instr(fold_case({col}), ?) > 0"))
                .collect::<Vec<_>>()
                .join(" OR ")
        });

        let sql = build_list_sql(clauses, matcher.as_deref());
        self.with_conn(|conn| collect_reports(conn, &sql, &values))
    }

    /// Attach PRL feedback and move the report under review. Repeating the
    /// call overwrites the text; an approved report is left untouched.
    pub fn apply_feedback(&self, id: i64, feedback: &str) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(current) = query_status(&tx, id)? else {
                return Ok(TransitionOutcome::NotFound);
            };
            let next = match current.after_feedback() {
                Ok(next) => next,
                Err(e) => return Ok(TransitionOutcome::Rejected(e)),
            };

            tx.execute(
                "UPDATE reports SET prl_feedback = ?1, status = ?2 WHERE id = ?3",
                params![feedback, next.as_str(), id],
            )?;
            tx.commit()?;

            info!("Report {} moved {} -> {} with feedback", id, current, next);
            Ok(TransitionOutcome::Applied(next))
        })
    }

    /// Mark a report approved, from whichever status it is in.
    pub fn approve_report(&self, id: i64) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(current) = query_status(&tx, id)? else {
                return Ok(TransitionOutcome::NotFound);
            };
            let next = current.after_approval();

            tx.execute(
                "UPDATE reports SET status = ?1 WHERE id = ?2",
                params![next.as_str(), id],
            )?;
            tx.commit()?;

            info!("Report {} moved {} -> {}", id, current, next);
            Ok(TransitionOutcome::Applied(next))
        })
    }
}

fn build_list_sql(mut conditions: Vec<String>, matcher: Option<&str>) -> String {
    if let Some(matcher) = matcher {
        conditions.push(format!("({matcher})"));
    }

    let mut sql = REPORT_SELECT.to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY r.created_at DESC, r.id DESC");
    sql
}

fn collect_reports(conn: &Connection, sql: &str, values: &[Value]) -> Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), report_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_report(conn: &Connection, id: i64) -> Result<Option<ReportRow>> {
    conn.query_row(&format!("{REPORT_SELECT} WHERE r.id = ?1"), [id], report_from_row)
        .optional()
}

fn query_status(conn: &Connection, id: i64) -> Result<Option<ReportStatus>> {
    let raw: Option<String> = conn
        .query_row("SELECT status FROM reports WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;

    raw.map(|s| s.parse::<ReportStatus>().map_err(|e| anyhow!("Report {}: {}", id, e)))
        .transpose()
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        class_id: row.get(1)?,
        lecturer_id: row.get(2)?,
        lecturer_name: row.get(3)?,
        class_name: row.get(4)?,
        course_name: row.get(5)?,
        course_code: row.get(6)?,
        faculty_name: row.get(7)?,
        week_of_reporting: row.get(8)?,
        date_of_lecture: row.get(9)?,
        actual_students_present: row.get(10)?,
        scheduled_lecture_time: row.get(11)?,
        topic_taught: row.get(12)?,
        learning_outcomes: row.get(13)?,
        lecturer_recommendations: row.get(14)?,
        prl_feedback: row.get(15)?,
        status: row.get(16)?,
        created_at: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CreateUserOutcome;
    use crate::test_support::scratch_db;
    use luct_types::Role;

    fn user(db: &Database, username: &str, name: &str, role: Role) -> i64 {
        match db.create_user(username, "hash", role, name, None).unwrap() {
            CreateUserOutcome::Created(id) => id,
            CreateUserOutcome::UsernameTaken => unreachable!(),
        }
    }

    fn submit(db: &Database, lecturer_id: i64, class_id: i64, topic: &str) -> i64 {
        db.insert_report(&NewReport {
            class_id,
            lecturer_id,
            faculty_name: "FICT",
            week_of_reporting: 3,
            date_of_lecture: "2024-03-01",
            actual_students_present: 40,
            scheduled_lecture_time: "10:30",
            topic_taught: topic,
            learning_outcomes: "Students can write joins",
            lecturer_recommendations: None,
        })
        .unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        alice: i64,
        bob: i64,
        alice_report: i64,
        bob_report: i64,
    }

    fn fixture() -> Fixture {
        let (dir, db) = scratch_db();
        let alice = user(&db, "alice", "Alice Mokoena", Role::Lecturer);
        let bob = user(&db, "bob", "Bob Thabo", Role::Lecturer);
        let alice_class = db.create_class(alice, "BSCSM Y2", "Databases", "DB201").unwrap();
        let bob_class = db.create_class(bob, "BSCIT Y1", "Networking", "NW101").unwrap();
        let alice_report = submit(&db, alice, alice_class, "SQL joins");
        let bob_report = submit(&db, bob, bob_class, "Subnetting and SQL basics");
        Fixture { _dir: dir, db, alice, bob, alice_report, bob_report }
    }

    #[test]
    fn new_report_is_submitted_and_joined() {
        let f = fixture();
        let row = f.db.get_report(f.alice_report).unwrap().unwrap();
        assert_eq!(row.status, "submitted");
        assert_eq!(row.lecturer_name, "Alice Mokoena");
        assert_eq!(row.course_code, "DB201");
        assert!(row.prl_feedback.is_none());
    }

    #[test]
    fn lecturer_scope_never_leaks_other_lecturers() {
        let f = fixture();
        // "sql" matches both topics, but only alice's report is in scope.
        let rows = f.db.list_reports(ReportScope::Lecturer(f.alice), Some("SQL")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, f.alice_report);

        let rows = f.db.list_reports(ReportScope::Lecturer(f.bob), None).unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![f.bob_report]);
    }

    #[test]
    fn search_is_case_insensitive_and_covers_lecturer_name() {
        let f = fixture();
        let rows = f.db.list_reports(ReportScope::All, Some("networking")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, f.bob_report);

        let rows = f.db.list_reports(ReportScope::All, Some("mokoena")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, f.alice_report);

        // Lecturer name is not a search column in the lecturer's own scope.
        let rows = f.db.list_reports(ReportScope::Lecturer(f.alice), Some("mokoena")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let f = fixture();
        assert!(f.db.list_reports(ReportScope::All, Some("%")).unwrap().is_empty());
        assert_eq!(f.db.list_reports(ReportScope::All, Some("   ")).unwrap().len(), 2);
    }

    #[test]
    fn search_folds_case_beyond_ascii() {
        let f = fixture();
        let emile = user(&f.db, "emile", "Émile Ñoño", Role::Lecturer);
        let class = f.db.create_class(emile, "BAECO Y1", "Économie", "EC101").unwrap();
        let report = submit(&f.db, emile, class, "Ökonomie");

        for term in ["économie", "ÉCONOMIE", "émile", "ÑOÑO", "öKONOMIE"] {
            let rows = f.db.list_reports(ReportScope::All, Some(term)).unwrap();
            assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![report], "{term}");
        }
    }

    #[test]
    fn feedback_is_idempotent() {
        let f = fixture();
        assert_eq!(
            f.db.apply_feedback(f.alice_report, "first").unwrap(),
            TransitionOutcome::Applied(ReportStatus::UnderReview)
        );
        assert_eq!(
            f.db.apply_feedback(f.alice_report, "second").unwrap(),
            TransitionOutcome::Applied(ReportStatus::UnderReview)
        );

        let row = f.db.get_report(f.alice_report).unwrap().unwrap();
        assert_eq!(row.prl_feedback.as_deref(), Some("second"));
        assert_eq!(row.status, "under_review");
    }

    #[test]
    fn review_queue_drops_approved_reports() {
        let f = fixture();
        f.db.apply_feedback(f.alice_report, "looks fine").unwrap();
        f.db.approve_report(f.bob_report).unwrap();

        let queue = f.db.list_reports(ReportScope::AwaitingReview, None).unwrap();
        assert_eq!(queue.iter().map(|r| r.id).collect::<Vec<_>>(), vec![f.alice_report]);
        assert_eq!(f.db.list_reports(ReportScope::All, None).unwrap().len(), 2);
    }

    #[test]
    fn approved_report_rejects_feedback() {
        let f = fixture();
        assert_eq!(
            f.db.approve_report(f.alice_report).unwrap(),
            TransitionOutcome::Applied(ReportStatus::Approved)
        );
        assert_eq!(
            f.db.apply_feedback(f.alice_report, "too late").unwrap(),
            TransitionOutcome::Rejected(TransitionError::AlreadyApproved)
        );
        let row = f.db.get_report(f.alice_report).unwrap().unwrap();
        assert!(row.prl_feedback.is_none());
        assert_eq!(row.status, "approved");
    }

    #[test]
    fn approving_twice_is_a_no_op() {
        let f = fixture();
        f.db.apply_feedback(f.bob_report, "fine").unwrap();
        for _ in 0..2 {
            assert_eq!(
                f.db.approve_report(f.bob_report).unwrap(),
                TransitionOutcome::Applied(ReportStatus::Approved)
            );
        }
        let row = f.db.get_report(f.bob_report).unwrap().unwrap();
        assert_eq!(row.status, "approved");
        assert_eq!(row.prl_feedback.as_deref(), Some("fine"));
    }

    #[test]
    fn transitions_on_missing_report() {
        let f = fixture();
        assert_eq!(f.db.apply_feedback(999, "x").unwrap(), TransitionOutcome::NotFound);
        assert_eq!(f.db.approve_report(999).unwrap(), TransitionOutcome::NotFound);
    }
}
