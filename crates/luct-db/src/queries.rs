use crate::Database;
use crate::models::{ClassRow, ProfileRow, UserRow};
use anyhow::Result;
use luct_types::Role;
use rusqlite::{Connection, ErrorCode, Row, params};
use tracing::info;

const USER_COLUMNS: &str = "id, username, password, role, name, email, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(i64),
    UsernameTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The account still owns classes or reports and can't be removed.
    StillReferenced,
}

/// Partial update of an account. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
}

/// Profile table backing a role, if the role carries one.
fn profile_table(role: Role) -> Option<&'static str> {
    match role {
        Role::Lecturer => Some("lecturer_profiles"),
        Role::Student => Some("student_profiles"),
        Role::Prl => Some("prl_profiles"),
        Role::Admin | Role::Pl => None,
    }
}

const PROFILE_TABLES: [&str; 3] = ["lecturer_profiles", "student_profiles", "prl_profiles"];

impl Database {
    // -- Users --

    /// Insert an account and, for roles that have one, its profile row. Both
    /// rows are written in one transaction.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        name: &str,
        email: Option<&str>,
    ) -> Result<CreateUserOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if query_user_by_username(&tx, username)?.is_some() {
                return Ok(CreateUserOutcome::UsernameTaken);
            }

            let inserted = tx.execute(
                "INSERT INTO users (username, password, role, name, email) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, password_hash, role.as_str(), name, email],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => return Ok(CreateUserOutcome::UsernameTaken),
                Err(e) => return Err(e.into()),
            }
            let user_id = tx.last_insert_rowid();

            if let Some(table) = profile_table(role) {
                tx.execute(
                    &format!("INSERT INTO {table} (user_id, full_name, email) VALUES (?1, ?2, ?3)"),
                    params![user_id, name, email],
                )?;
            }

            tx.commit()?;
            info!("Created {} account '{}' (id {})", role, username, user_id);
            Ok(CreateUserOutcome::Created(user_id))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users_by_role(&self, role: Role) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([role.as_str()], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_profile(&self, user_id: i64, role: Role) -> Result<Option<ProfileRow>> {
        let Some(table) = profile_table(role) else {
            return Ok(None);
        };
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT user_id, full_name, email FROM {table} WHERE user_id = ?1"),
                [user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        full_name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Apply `changes` to the account and mirror name/email onto its profile
    /// row. Returns false when no such user exists.
    pub fn update_user(&self, id: i64, changes: &UserChanges<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(user) = query_user_by_id(&tx, id)? else {
                return Ok(false);
            };

            tx.execute(
                "UPDATE users SET name = COALESCE(?1, name), email = COALESCE(?2, email),
                     password = COALESCE(?3, password)
                 WHERE id = ?4",
                params![changes.name, changes.email, changes.password_hash, id],
            )?;

            let role: Option<Role> = user.role.parse().ok();
            if let Some(table) = role.and_then(profile_table) {
                tx.execute(
                    &format!(
                        "UPDATE {table} SET full_name = COALESCE(?1, full_name), email = COALESCE(?2, email)
                         WHERE user_id = ?3"
                    ),
                    params![changes.name, changes.email, id],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Remove an account together with every profile row it owns, atomically.
    pub fn delete_user(&self, id: i64) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for table in PROFILE_TABLES {
                tx.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), [id])?;
            }

            let deleted = match tx.execute("DELETE FROM users WHERE id = ?1", [id]) {
                Ok(n) => n,
                Err(e) if is_constraint_violation(&e) => {
                    // Dropping the transaction rolls back the profile deletes too.
                    return Ok(DeleteOutcome::StillReferenced);
                }
                Err(e) => return Err(e.into()),
            };

            if deleted == 0 {
                return Ok(DeleteOutcome::NotFound);
            }

            tx.commit()?;
            info!("Deleted user {}", id);
            Ok(DeleteOutcome::Deleted)
        })
    }

    // -- Classes --

    /// Classes are managed outside the API; this exists for seeding.
    pub fn create_class(
        &self,
        lecturer_id: i64,
        class_name: &str,
        course_name: &str,
        course_code: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO classes (lecturer_id, class_name, course_name, course_code) VALUES (?1, ?2, ?3, ?4)",
                params![lecturer_id, class_name, course_name, course_code],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_class(&self, id: i64) -> Result<Option<ClassRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, lecturer_id, class_name, course_name, course_code FROM classes WHERE id = ?1",
                [id],
                class_from_row,
            )
            .optional()
        })
    }

    pub fn list_classes_for_lecturer(&self, lecturer_id: i64) -> Result<Vec<ClassRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, lecturer_id, class_name, course_name, course_code
                 FROM classes WHERE lecturer_id = ?1 ORDER BY class_name, id",
            )?;
            let rows = stmt
                .query_map([lecturer_id], class_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        user_from_row,
    )
    .optional()
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        user_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        name: row.get(4)?,
        email: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<ClassRow> {
    Ok(ClassRow {
        id: row.get(0)?,
        lecturer_id: row.get(1)?,
        class_name: row.get(2)?,
        course_name: row.get(3)?,
        course_code: row.get(4)?,
    })
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_db;

    fn register(db: &Database, username: &str, role: Role) -> i64 {
        match db.create_user(username, "hash", role, "Someone", Some("a@b.c")).unwrap() {
            CreateUserOutcome::Created(id) => id,
            CreateUserOutcome::UsernameTaken => panic!("username {username} taken"),
        }
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?)).unwrap()
    }

    #[test]
    fn duplicate_username_inserts_nothing() {
        let (_dir, db) = scratch_db();
        register(&db, "l1", Role::Lecturer);

        let again = db.create_user("l1", "hash", Role::Student, "Other", None).unwrap();
        assert_eq!(again, CreateUserOutcome::UsernameTaken);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM student_profiles"), 0);
    }

    #[test]
    fn profile_rows_follow_role() {
        let (_dir, db) = scratch_db();
        let lecturer = register(&db, "lec", Role::Lecturer);
        let admin = register(&db, "adm", Role::Admin);
        let pl = register(&db, "lead", Role::Pl);

        let profile = db.get_profile(lecturer, Role::Lecturer).unwrap().unwrap();
        assert_eq!(profile.full_name, "Someone");
        assert_eq!(profile.email.as_deref(), Some("a@b.c"));

        assert!(db.get_profile(admin, Role::Admin).unwrap().is_none());
        assert!(db.get_profile(pl, Role::Pl).unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM lecturer_profiles"), 1);
    }

    #[test]
    fn update_changes_only_given_columns_and_syncs_profile() {
        let (_dir, db) = scratch_db();
        let id = register(&db, "prl1", Role::Prl);

        let changes = UserChanges { name: Some("Dr. Renamed"), ..Default::default() };
        assert!(db.update_user(id, &changes).unwrap());

        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.name, "Dr. Renamed");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert_eq!(user.password, "hash");

        let profile = db.get_profile(id, Role::Prl).unwrap().unwrap();
        assert_eq!(profile.full_name, "Dr. Renamed");
        assert_eq!(profile.email.as_deref(), Some("a@b.c"));

        let changes = UserChanges { password_hash: Some("rehashed"), ..Default::default() };
        assert!(db.update_user(id, &changes).unwrap());
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.password, "rehashed");
        assert_eq!(user.name, "Dr. Renamed");
    }

    #[test]
    fn update_missing_user_reports_false() {
        let (_dir, db) = scratch_db();
        let changes = UserChanges { email: Some("x@y.z"), ..Default::default() };
        assert!(!db.update_user(404, &changes).unwrap());
    }

    #[test]
    fn delete_removes_user_and_profile_together() {
        let (_dir, db) = scratch_db();
        let id = register(&db, "stu", Role::Student);

        assert_eq!(db.delete_user(id).unwrap(), DeleteOutcome::Deleted);
        assert!(db.get_user_by_id(id).unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM student_profiles"), 0);
        assert_eq!(db.delete_user(id).unwrap(), DeleteOutcome::NotFound);
    }

    #[test]
    fn delete_of_referenced_lecturer_rolls_back() {
        let (_dir, db) = scratch_db();
        let id = register(&db, "lec", Role::Lecturer);
        db.create_class(id, "BSCIT Y1", "Web Development", "DIWA2110").unwrap();

        assert_eq!(db.delete_user(id).unwrap(), DeleteOutcome::StillReferenced);
        assert!(db.get_user_by_id(id).unwrap().is_some());
        assert!(db.get_profile(id, Role::Lecturer).unwrap().is_some());
    }

    #[test]
    fn lists_users_and_classes() {
        let (_dir, db) = scratch_db();
        let a = register(&db, "a", Role::Lecturer);
        let b = register(&db, "b", Role::Lecturer);
        register(&db, "c", Role::Student);

        let lecturers = db.list_users_by_role(Role::Lecturer).unwrap();
        assert_eq!(lecturers.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a, b]);

        db.create_class(a, "Y2", "Databases", "DB201").unwrap();
        db.create_class(b, "Y1", "Networks", "NW101").unwrap();
        let classes = db.list_classes_for_lecturer(a).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].course_code, "DB201");
    }
}
