use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts and profiles)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL
                            CHECK (role IN ('lecturer', 'student', 'admin', 'prl', 'pl')),
                name        TEXT NOT NULL,
                email       TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_users_role ON users(role);

            CREATE TABLE lecturer_profiles (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                full_name   TEXT NOT NULL,
                email       TEXT
            );

            CREATE TABLE student_profiles (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                full_name   TEXT NOT NULL,
                email       TEXT
            );

            CREATE TABLE prl_profiles (
                user_id     INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                full_name   TEXT NOT NULL,
                email       TEXT
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Running migration v2 (classes and reports)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE classes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                lecturer_id INTEGER NOT NULL REFERENCES users(id),
                class_name  TEXT NOT NULL,
                course_name TEXT NOT NULL,
                course_code TEXT NOT NULL
            );

            CREATE INDEX idx_classes_lecturer ON classes(lecturer_id);

            CREATE TABLE reports (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                class_id                 INTEGER NOT NULL REFERENCES classes(id),
                lecturer_id              INTEGER NOT NULL REFERENCES users(id),
                faculty_name             TEXT NOT NULL,
                week_of_reporting        INTEGER NOT NULL,
                date_of_lecture          TEXT NOT NULL,
                actual_students_present  INTEGER NOT NULL,
                scheduled_lecture_time   TEXT NOT NULL,
                topic_taught             TEXT NOT NULL,
                learning_outcomes        TEXT NOT NULL,
                lecturer_recommendations TEXT,
                prl_feedback             TEXT,
                status                   TEXT NOT NULL DEFAULT 'submitted'
                                         CHECK (status IN ('submitted', 'under_review', 'approved')),
                created_at               TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_reports_lecturer ON reports(lecturer_id, created_at);
            CREATE INDEX idx_reports_status ON reports(status);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
