//! Shared fixtures for unit tests.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::attempts::{CandidateSpec, ExaminerSpec, GroupSpec};
use crate::clock::format_datetime;

pub fn make_assignment(
    conn: &Connection,
    first_deadline: Option<DateTime<Utc>>,
    anonymizationmode: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assignments(
            id, short_name, long_name, first_deadline, anonymizationmode,
            max_points, passing_grade_min_points)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            "assignment1",
            "Assignment One",
            first_deadline.map(format_datetime),
            anonymizationmode,
            100i64,
            40i64,
        ),
    )
    .expect("insert assignment");
    id
}

/// One candidate (dewey) and one examiner (examiner1).
pub fn group_spec(assignment_id: &str) -> GroupSpec {
    GroupSpec {
        assignment_id: assignment_id.to_string(),
        name: String::new(),
        candidates: vec![CandidateSpec {
            user_id: "dewey".to_string(),
            full_name: "Dewey Duck".to_string(),
            short_name: "dewey".to_string(),
            candidate_id: None,
            automatic_anonymous_id: Some("anon-1".to_string()),
        }],
        examiners: vec![ExaminerSpec {
            user_id: "examiner1".to_string(),
            full_name: "Donald Duck".to_string(),
            short_name: "donald".to_string(),
            automatic_anonymous_id: Some("examiner-1".to_string()),
        }],
    }
}
