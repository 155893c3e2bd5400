use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::clock::format_datetime;
use crate::errors::{LifecycleError, Result};
use crate::models::{Assignment, AssignmentGroup, FeedbackSet, FeedbacksetType};

/// Membership and metadata for a new group. The automatic first attempt is
/// created in the same transaction; a group never exists without one.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub assignment_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
    #[serde(default)]
    pub examiners: Vec<ExaminerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub user_id: String,
    pub full_name: String,
    pub short_name: String,
    #[serde(default)]
    pub candidate_id: Option<String>,
    #[serde(default)]
    pub automatic_anonymous_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaminerSpec {
    pub user_id: String,
    pub full_name: String,
    pub short_name: String,
    #[serde(default)]
    pub automatic_anonymous_id: Option<String>,
}

/// Deadline governing the group's current attempt. The assignment-level
/// first deadline applies while the current attempt is the first one; after
/// that each attempt carries its own deadline.
pub fn current_deadline_for(
    feedback_set: &FeedbackSet,
    assignment: &Assignment,
) -> Option<DateTime<Utc>> {
    if feedback_set.feedbackset_type == FeedbacksetType::FirstAttempt {
        if let Some(first_deadline) = assignment.first_deadline {
            return Some(first_deadline);
        }
    }
    feedback_set.deadline_datetime
}

pub fn current_deadline(conn: &Connection, group_id: &str) -> Result<Option<DateTime<Utc>>> {
    let feedback_set = last_feedbackset(conn, group_id)?;
    let group = AssignmentGroup::get(conn, group_id)?;
    let assignment = Assignment::get(conn, &group.assignment_id)?;
    Ok(current_deadline_for(&feedback_set, &assignment))
}

/// The group's current attempt, via the cached pointer.
pub fn last_feedbackset(conn: &Connection, group_id: &str) -> Result<FeedbackSet> {
    let group = AssignmentGroup::get(conn, group_id)?;
    let id = group
        .last_feedbackset_id
        .ok_or_else(|| LifecycleError::NotFound(format!("feedback set for group {group_id}")))?;
    FeedbackSet::get(conn, &id)
}

fn insert_feedbackset(conn: &Connection, feedback_set: &FeedbackSet) -> Result<()> {
    feedback_set.clean()?;
    conn.execute(
        "INSERT INTO feedback_sets(
            id, group_id, feedbackset_type, deadline_datetime, created_by,
            created_datetime, grading_published_datetime, grading_published_by,
            grading_points, ignored, ignored_reason)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &feedback_set.id,
            &feedback_set.group_id,
            feedback_set.feedbackset_type.as_str(),
            feedback_set.deadline_datetime.map(format_datetime),
            &feedback_set.created_by,
            format_datetime(feedback_set.created_datetime),
            feedback_set.grading_published_datetime.map(format_datetime),
            &feedback_set.grading_published_by,
            feedback_set.grading_points,
            feedback_set.ignored as i64,
            &feedback_set.ignored_reason,
        ),
    )?;
    // The cached pointer is only ever written here and must always track the
    // latest attempt by creation order.
    conn.execute(
        "UPDATE assignment_groups SET last_feedbackset_id = ? WHERE id = ?",
        (&feedback_set.id, &feedback_set.group_id),
    )?;
    Ok(())
}

/// Create a group together with its automatic first attempt, atomically.
/// Returns the group id and the first feedback set id.
pub fn create_group_with_first_attempt(
    conn: &Connection,
    now: DateTime<Utc>,
    spec: &GroupSpec,
) -> Result<(String, String)> {
    // Fails early with NotFound when the assignment id is unknown.
    let _ = Assignment::get(conn, &spec.assignment_id)?;

    let tx = conn.unchecked_transaction()?;
    let group_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO assignment_groups(id, assignment_id, name) VALUES(?, ?, ?)",
        (&group_id, &spec.assignment_id, &spec.name),
    )?;

    for candidate in &spec.candidates {
        tx.execute(
            "INSERT INTO candidates(
                id, group_id, user_id, full_name, short_name,
                candidate_id, automatic_anonymous_id)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &group_id,
                &candidate.user_id,
                &candidate.full_name,
                &candidate.short_name,
                &candidate.candidate_id,
                &candidate.automatic_anonymous_id,
            ),
        )?;
    }
    for examiner in &spec.examiners {
        tx.execute(
            "INSERT INTO examiners(
                id, group_id, user_id, full_name, short_name, automatic_anonymous_id)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &group_id,
                &examiner.user_id,
                &examiner.full_name,
                &examiner.short_name,
                &examiner.automatic_anonymous_id,
            ),
        )?;
    }

    let feedback_set = FeedbackSet {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.clone(),
        feedbackset_type: FeedbacksetType::FirstAttempt,
        // No per-attempt deadline; the assignment-level first deadline
        // governs the first attempt.
        deadline_datetime: None,
        created_by: None,
        created_datetime: now,
        grading_published_datetime: None,
        grading_published_by: None,
        grading_points: None,
        ignored: false,
        ignored_reason: String::new(),
    };
    let feedback_set_id = feedback_set.id.clone();
    insert_feedbackset(&tx, &feedback_set)?;
    tx.commit()?;

    Ok((group_id, feedback_set_id))
}

/// Append a `new_attempt` feedback set; it becomes the group's current
/// attempt. Callers that create attempts for many groups must wrap the calls
/// in their own transaction.
pub fn append_new_attempt(
    conn: &Connection,
    group_id: &str,
    deadline: DateTime<Utc>,
    created_by: &str,
    created_datetime: DateTime<Utc>,
) -> Result<FeedbackSet> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM assignment_groups WHERE id = ?",
            [group_id],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !exists {
        return Err(LifecycleError::GroupRequired);
    }

    let feedback_set = FeedbackSet {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.to_string(),
        feedbackset_type: FeedbacksetType::NewAttempt,
        deadline_datetime: Some(deadline),
        created_by: Some(created_by.to_string()),
        created_datetime,
        grading_published_datetime: None,
        grading_published_by: None,
        grading_points: None,
        ignored: false,
        ignored_reason: String::new(),
    };
    insert_feedbackset(conn, &feedback_set)?;
    Ok(feedback_set)
}

/// Correct the outstanding deadline: mutate the last attempt in place. This
/// never creates a new attempt.
pub fn move_deadline(
    conn: &Connection,
    group_id: &str,
    new_deadline: DateTime<Utc>,
) -> Result<()> {
    let feedback_set = last_feedbackset(conn, group_id)?;
    conn.execute(
        "UPDATE feedback_sets SET deadline_datetime = ? WHERE id = ?",
        (format_datetime(new_deadline), &feedback_set.id),
    )?;
    Ok(())
}

/// Mark an attempt as ignored (grading bypassed). Terminal; validated through
/// the model invariants so a published attempt can never become ignored.
pub fn ignore_feedbackset(conn: &Connection, feedback_set_id: &str, reason: &str) -> Result<()> {
    let mut feedback_set = FeedbackSet::get(conn, feedback_set_id)?;
    feedback_set.ignored = true;
    feedback_set.ignored_reason = reason.to_string();
    feedback_set.clean()?;
    conn.execute(
        "UPDATE feedback_sets SET ignored = 1, ignored_reason = ? WHERE id = ?",
        (reason, feedback_set_id),
    )?;
    Ok(())
}

/// All attempts for a group, oldest first.
pub fn list_feedbacksets(conn: &Connection, group_id: &str) -> Result<Vec<FeedbackSet>> {
    let sql = format!(
        "SELECT {} FROM feedback_sets WHERE group_id = ? ORDER BY created_datetime",
        FeedbackSet::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([group_id], FeedbackSet::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
