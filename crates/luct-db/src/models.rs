/// Database row types — these map directly to SQLite rows.
/// Distinct from luct-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: i64,
    pub full_name: String,
    pub email: Option<String>,
}

pub struct ClassRow {
    pub id: i64,
    pub lecturer_id: i64,
    pub class_name: String,
    pub course_name: String,
    pub course_code: String,
}

/// A report joined with its class and the lecturer's display name.
pub struct ReportRow {
    pub id: i64,
    pub class_id: i64,
    pub lecturer_id: i64,
    pub lecturer_name: String,
    pub class_name: String,
    pub course_name: String,
    pub course_code: String,
    pub faculty_name: String,
    pub week_of_reporting: i64,
    pub date_of_lecture: String,
    pub actual_students_present: i64,
    pub scheduled_lecture_time: String,
    pub topic_taught: String,
    pub learning_outcomes: String,
    pub lecturer_recommendations: Option<String>,
    pub prl_feedback: Option<String>,
    pub status: String,
    pub created_at: String,
}
