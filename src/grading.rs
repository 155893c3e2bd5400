use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::attempts;
use crate::clock::format_datetime;
use crate::errors::{LifecycleError, Result};
use crate::identity::ViewerRole;
use crate::models::{
    Assignment, AssignmentGroup, CommentUserRole, CommentVisibility, FeedbackSet, GroupComment,
};

/// Publish preconditions that did not hold. These are expected, commonly
/// retried outcomes and deliberately not part of the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishBlocked {
    #[error("An assignment can not be published without being published by someone.")]
    MissingPublisher,
    #[error("An assignment can not be published without providing \"points\".")]
    MissingPoints,
    #[error("Cannot publish feedback without a deadline.")]
    NoDeadline,
    #[error("The deadline has not expired. Feedback was saved, but not published.")]
    DeadlineNotExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { passed: bool },
    Blocked(PublishBlocked),
}

impl PublishOutcome {
    /// The `(success, reason)` pair of the exposed contract.
    pub fn as_pair(&self) -> (bool, String) {
        match self {
            PublishOutcome::Published { .. } => (true, String::new()),
            PublishOutcome::Blocked(blocked) => (false, blocked.to_string()),
        }
    }
}

/// Finalize the grade on an attempt. Preconditions are checked in order and
/// the first failure wins: publisher, points, deadline presence, deadline
/// expiry. On success the grading triple is stamped and every unpublished
/// grading-relevant comment becomes visible, preserving creation order.
pub fn publish(
    conn: &Connection,
    now: DateTime<Utc>,
    feedback_set_id: &str,
    published_by: Option<&str>,
    points: Option<i64>,
) -> Result<PublishOutcome> {
    let mut feedback_set = FeedbackSet::get(conn, feedback_set_id)?;
    if feedback_set.is_published() {
        return Err(LifecycleError::Validation(
            "FeedbackSet has already been published.".to_string(),
        ));
    }

    let Some(published_by) = published_by else {
        return Ok(PublishOutcome::Blocked(PublishBlocked::MissingPublisher));
    };
    let Some(points) = points else {
        return Ok(PublishOutcome::Blocked(PublishBlocked::MissingPoints));
    };

    let group = AssignmentGroup::get(conn, &feedback_set.group_id)?;
    let assignment = Assignment::get(conn, &group.assignment_id)?;
    let Some(deadline) = attempts::current_deadline_for(&feedback_set, &assignment) else {
        return Ok(PublishOutcome::Blocked(PublishBlocked::NoDeadline));
    };
    if deadline > now {
        return Ok(PublishOutcome::Blocked(PublishBlocked::DeadlineNotExpired));
    }

    feedback_set.grading_published_datetime = Some(now);
    feedback_set.grading_published_by = Some(published_by.to_string());
    feedback_set.grading_points = Some(points);
    feedback_set.clean()?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE feedback_sets
         SET grading_published_datetime = ?, grading_published_by = ?, grading_points = ?
         WHERE id = ?",
        (
            format_datetime(now),
            published_by,
            points,
            feedback_set_id,
        ),
    )?;

    // Drafted grading comments become part of the permanent record. Each one
    // gets a publication timestamp one tick after the previous so their
    // relative creation order survives any sort on published_datetime.
    let draft_ids: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT id FROM group_comments
             WHERE feedback_set_id = ? AND part_of_grading = 1
               AND published_datetime IS NULL
             ORDER BY created_datetime",
        )?;
        let rows = stmt.query_map([feedback_set_id], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    for (i, comment_id) in draft_ids.iter().enumerate() {
        let published = now + Duration::microseconds(i as i64);
        tx.execute(
            "UPDATE group_comments SET published_datetime = ? WHERE id = ?",
            (format_datetime(published), comment_id),
        )?;
    }
    tx.commit()?;

    Ok(PublishOutcome::Published {
        passed: assignment.points_is_passing_grade(points),
    })
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub feedback_set_id: String,
    pub user_id: String,
    pub user_role: CommentUserRole,
    pub text: String,
    pub visibility: CommentVisibility,
    pub part_of_grading: bool,
}

/// Append one entry to an attempt's comment trail. Grading drafts stay
/// unpublished until the attempt itself publishes; everything else is
/// visible immediately.
pub fn add_comment(conn: &Connection, now: DateTime<Utc>, comment: &NewComment) -> Result<String> {
    // The owning attempt must exist.
    let _ = FeedbackSet::get(conn, &comment.feedback_set_id)?;

    let id = Uuid::new_v4().to_string();
    let published_datetime = if comment.part_of_grading {
        None
    } else {
        Some(format_datetime(now))
    };
    conn.execute(
        "INSERT INTO group_comments(
            id, feedback_set_id, user_id, user_role, text, visibility,
            part_of_grading, created_datetime, published_datetime)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &comment.feedback_set_id,
            &comment.user_id,
            comment.user_role.as_str(),
            &comment.text,
            comment.visibility.as_str(),
            comment.part_of_grading as i64,
            format_datetime(now),
            published_datetime,
        ),
    )?;
    Ok(id)
}

fn comment_visible_to(comment: &GroupComment, role: ViewerRole, viewer_user_id: &str) -> bool {
    // Authors always see their own entries, drafts included.
    if comment.user_id == viewer_user_id {
        return true;
    }
    if comment.published_datetime.is_none() {
        return false;
    }
    match comment.visibility {
        CommentVisibility::Private => false,
        CommentVisibility::VisibleToExaminerAndAdmins => role != ViewerRole::Student,
        CommentVisibility::VisibleToEveryone => true,
    }
}

/// The comment trail of one attempt as seen by a viewer, ordered by
/// publication time then creation order; the viewer's own drafts come last.
pub fn list_comments(
    conn: &Connection,
    feedback_set_id: &str,
    role: ViewerRole,
    viewer_user_id: &str,
) -> Result<Vec<GroupComment>> {
    let sql = format!(
        "SELECT {} FROM group_comments
         WHERE feedback_set_id = ?
         ORDER BY published_datetime IS NULL, published_datetime, created_datetime",
        GroupComment::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([feedback_set_id], GroupComment::from_row)?;
    let all = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(all
        .into_iter()
        .filter(|c| comment_visible_to(c, role, viewer_user_id))
        .collect())
}
