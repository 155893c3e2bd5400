use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("coursework.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_schema(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema. Used by unit tests.
#[allow(dead_code)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            short_name TEXT NOT NULL,
            long_name TEXT NOT NULL,
            first_deadline TEXT,
            anonymizationmode TEXT NOT NULL DEFAULT 'off',
            max_points INTEGER NOT NULL DEFAULT 1,
            passing_grade_min_points INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignment_groups(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            last_feedbackset_id TEXT,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groups_assignment ON assignment_groups(assignment_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS candidates(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            short_name TEXT NOT NULL,
            candidate_id TEXT,
            automatic_anonymous_id TEXT,
            FOREIGN KEY(group_id) REFERENCES assignment_groups(id),
            UNIQUE(group_id, user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_candidates_group ON candidates(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS examiners(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            short_name TEXT NOT NULL,
            automatic_anonymous_id TEXT,
            FOREIGN KEY(group_id) REFERENCES assignment_groups(id),
            UNIQUE(group_id, user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_examiners_group ON examiners(group_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_examiners_user ON examiners(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS feedback_sets(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            feedbackset_type TEXT NOT NULL,
            deadline_datetime TEXT,
            created_by TEXT,
            created_datetime TEXT NOT NULL,
            grading_published_datetime TEXT,
            grading_published_by TEXT,
            grading_points INTEGER,
            ignored INTEGER NOT NULL DEFAULT 0,
            ignored_reason TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(group_id) REFERENCES assignment_groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_sets_group ON feedback_sets(group_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_sets_group_created
         ON feedback_sets(group_id, created_datetime)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_comments(
            id TEXT PRIMARY KEY,
            feedback_set_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_role TEXT NOT NULL,
            text TEXT NOT NULL,
            visibility TEXT NOT NULL,
            part_of_grading INTEGER NOT NULL DEFAULT 0,
            created_datetime TEXT NOT NULL,
            published_datetime TEXT,
            FOREIGN KEY(feedback_set_id) REFERENCES feedback_sets(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_group_comments_set ON group_comments(feedback_set_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_group_comments_set_published
         ON group_comments(feedback_set_id, published_datetime, created_datetime)",
        [],
    )?;

    Ok(())
}
