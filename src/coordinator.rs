use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;
use uuid::Uuid;

use crate::attempts;
use crate::clock::{format_datetime, truncate_to_second};
use crate::errors::{LifecycleError, Result};
use crate::identity::{self, ViewerRole};
use crate::models::{Assignment, AssignmentGroup, Candidate};
use crate::notify::Notifier;

/// Result summary of a bulk operation, after commit.
#[derive(Debug)]
pub struct BulkOutcome {
    pub group_ids: Vec<String>,
    /// Per-group display names as seen by the acting examiner; anonymized
    /// when the assignment requires it.
    pub display_names: Vec<String>,
    pub feedback_set_ids: Vec<String>,
    pub batch_datetime: DateTime<Utc>,
}

/// Groups the acting user may manage: those they are examiner on.
fn accessible_group_ids(conn: &Connection, acting_user: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT group_id FROM examiners WHERE user_id = ?")?;
    let rows = stmt.query_map([acting_user], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
}

/// Reject the whole selection before any write when it does not exactly
/// match what the caller may act on. Defends against a tampered selection
/// list from a previously rendered view.
fn validate_selection(
    conn: &Connection,
    acting_user: &str,
    group_ids: &[String],
    expected_count: usize,
) -> Result<()> {
    if group_ids.is_empty() {
        return Err(LifecycleError::UnauthorizedSelection(
            "no groups selected".to_string(),
        ));
    }
    if group_ids.len() != expected_count {
        return Err(LifecycleError::UnauthorizedSelection(format!(
            "expected {expected_count} groups, got {}",
            group_ids.len()
        )));
    }
    let unique: HashSet<&String> = group_ids.iter().collect();
    if unique.len() != group_ids.len() {
        return Err(LifecycleError::UnauthorizedSelection(
            "duplicate group ids in selection".to_string(),
        ));
    }
    let accessible = accessible_group_ids(conn, acting_user)?;
    for group_id in group_ids {
        if !accessible.contains(group_id) {
            return Err(LifecycleError::UnauthorizedSelection(format!(
                "group {group_id} is not manageable by {acting_user}"
            )));
        }
    }
    Ok(())
}

/// One lookup for the whole batch: current feedback set id per group, in
/// selection order.
fn last_feedbackset_ids(conn: &Connection, group_ids: &[String]) -> Result<Vec<String>> {
    let placeholders = vec!["?"; group_ids.len()].join(", ");
    let sql = format!(
        "SELECT id, last_feedbackset_id FROM assignment_groups WHERE id IN ({placeholders})"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(group_ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;
    let by_group: std::collections::HashMap<String, Option<String>> =
        rows.collect::<rusqlite::Result<_>>()?;

    let mut out = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let feedback_set_id = by_group
            .get(group_id)
            .cloned()
            .flatten()
            .ok_or_else(|| LifecycleError::NotFound(format!("feedback set for group {group_id}")))?;
        out.push(feedback_set_id);
    }
    Ok(out)
}

/// One timestamp for the whole batch, truncated to the second so rows
/// written by the same call compare equal across groups. Clamped above every
/// existing attempt in the selected groups so creation order never runs
/// backwards within a chain, even when the batch lands in the same second as
/// an earlier write.
fn batch_timestamp(
    conn: &Connection,
    now: DateTime<Utc>,
    group_ids: &[String],
) -> Result<DateTime<Utc>> {
    let base = truncate_to_second(now);
    let placeholders = vec!["?"; group_ids.len()].join(", ");
    let sql = format!(
        "SELECT MAX(created_datetime) FROM feedback_sets WHERE group_id IN ({placeholders})"
    );
    let latest: Option<String> = conn.query_row(
        &sql,
        params_from_iter(group_ids.iter()),
        |row| row.get(0),
    )?;
    let latest = latest.as_deref().and_then(crate::clock::parse_datetime);
    Ok(match latest {
        Some(latest) if latest >= base => latest + Duration::microseconds(1),
        _ => base,
    })
}

/// The explanatory comment attached to every group touched by a bulk
/// operation: examiner-authored, visible to everyone, not part of grading.
fn insert_bulk_comment(
    conn: &Connection,
    feedback_set_id: &str,
    acting_user: &str,
    text: &str,
    created: DateTime<Utc>,
    published: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO group_comments(
            id, feedback_set_id, user_id, user_role, text, visibility,
            part_of_grading, created_datetime, published_datetime)
         VALUES(?, ?, ?, 'examiner', ?, 'visible_to_everyone', 0, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            feedback_set_id,
            acting_user,
            text,
            format_datetime(created),
            format_datetime(published),
        ),
    )?;
    Ok(())
}

fn resolve_display_names(
    conn: &Connection,
    acting_user_role: ViewerRole,
    group_ids: &[String],
) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let group = AssignmentGroup::get(conn, group_id)?;
        let assignment = Assignment::get(conn, &group.assignment_id)?;
        let candidates = Candidate::list_for_group(conn, group_id)?;
        names.push(identity::group_displayname(
            &candidates,
            assignment.anonymizationmode,
            acting_user_role,
        ));
    }
    Ok(names)
}

/// Move the outstanding deadline of every selected group's current attempt,
/// attaching one explanatory comment per group, all inside one transaction.
///
/// The whole batch shares a single timestamp truncated to the second so the
/// comments compare equal across groups; the comment's publication time is
/// one tick later so the deadline change always precedes it in any total
/// order.
pub fn bulk_move_deadline(
    conn: &Connection,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
    acting_user: &str,
    group_ids: &[String],
    expected_count: usize,
    new_deadline: DateTime<Utc>,
    comment_text: &str,
) -> Result<BulkOutcome> {
    validate_selection(conn, acting_user, group_ids, expected_count)?;
    let feedback_set_ids = last_feedbackset_ids(conn, group_ids)?;
    let batch_datetime = batch_timestamp(conn, now, group_ids)?;
    let comment_published = batch_datetime + Duration::microseconds(1);

    let tx = conn.unchecked_transaction()?;
    let placeholders = vec!["?"; feedback_set_ids.len()].join(", ");
    let sql =
        format!("UPDATE feedback_sets SET deadline_datetime = ? WHERE id IN ({placeholders})");
    let mut params: Vec<String> = vec![format_datetime(new_deadline)];
    params.extend(feedback_set_ids.iter().cloned());
    let updated = tx.execute(&sql, params_from_iter(params.iter()))?;
    if updated != feedback_set_ids.len() {
        return Err(LifecycleError::NotFound(
            "feedback set for selected group".to_string(),
        ));
    }
    for feedback_set_id in &feedback_set_ids {
        insert_bulk_comment(
            &tx,
            feedback_set_id,
            acting_user,
            comment_text,
            batch_datetime,
            comment_published,
        )?;
    }
    tx.commit()?;

    debug!(groups = group_ids.len(), "deadline moved");
    notifier.bulk_operation_applied("move_deadline", group_ids);

    Ok(BulkOutcome {
        group_ids: group_ids.to_vec(),
        display_names: resolve_display_names(conn, ViewerRole::Examiner, group_ids)?,
        feedback_set_ids,
        batch_datetime,
    })
}

/// Give every selected group a new attempt with the supplied deadline,
/// attaching one explanatory comment per group, all inside one transaction.
/// Uses the same timestamp strategy as [`bulk_move_deadline`].
pub fn bulk_give_new_attempt(
    conn: &Connection,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
    acting_user: &str,
    group_ids: &[String],
    expected_count: usize,
    new_deadline: DateTime<Utc>,
    comment_text: &str,
) -> Result<BulkOutcome> {
    validate_selection(conn, acting_user, group_ids, expected_count)?;
    let batch_datetime = batch_timestamp(conn, now, group_ids)?;
    let comment_published = batch_datetime + Duration::microseconds(1);

    let tx = conn.unchecked_transaction()?;
    let mut feedback_set_ids = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let feedback_set =
            attempts::append_new_attempt(&tx, group_id, new_deadline, acting_user, batch_datetime)?;
        insert_bulk_comment(
            &tx,
            &feedback_set.id,
            acting_user,
            comment_text,
            batch_datetime,
            comment_published,
        )?;
        feedback_set_ids.push(feedback_set.id);
    }
    tx.commit()?;

    debug!(groups = group_ids.len(), "new attempt given");
    notifier.bulk_operation_applied("give_new_attempt", group_ids);

    Ok(BulkOutcome {
        group_ids: group_ids.to_vec(),
        display_names: resolve_display_names(conn, ViewerRole::Examiner, group_ids)?,
        feedback_set_ids,
        batch_datetime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempts::{create_group_with_first_attempt, list_feedbacksets};
    use crate::clock::utc;
    use crate::models::{FeedbackSet, FeedbacksetType};
    use crate::notify::NullNotifier;
    use crate::testutil;

    fn setup_two_groups(conn: &Connection) -> (String, String, String) {
        let assignment_id = testutil::make_assignment(conn, Some(utc(2025, 3, 1, 0, 0, 0)), "off");
        let (g1, _) = create_group_with_first_attempt(
            conn,
            utc(2025, 2, 1, 10, 0, 0),
            &testutil::group_spec(&assignment_id),
        )
        .expect("group 1");
        let mut spec = testutil::group_spec(&assignment_id);
        spec.candidates[0].user_id = "louie".to_string();
        spec.candidates[0].short_name = "louie".to_string();
        let (g2, _) = create_group_with_first_attempt(conn, utc(2025, 2, 1, 10, 0, 1), &spec)
            .expect("group 2");
        (assignment_id, g1, g2)
    }

    fn comment_count(conn: &Connection, feedback_set_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM group_comments WHERE feedback_set_id = ?",
            [feedback_set_id],
            |r| r.get(0),
        )
        .expect("count")
    }

    #[test]
    fn move_deadline_updates_every_group_and_attaches_one_comment_each() {
        let conn = crate::db::open_in_memory().expect("open db");
        let (_, g1, g2) = setup_two_groups(&conn);
        let groups = vec![g1.clone(), g2.clone()];
        let now = utc(2025, 3, 5, 14, 30, 27) + Duration::microseconds(654321);
        let new_deadline = utc(2025, 3, 10, 23, 59, 0);

        let outcome = bulk_move_deadline(
            &conn,
            &NullNotifier,
            now,
            "examiner1",
            &groups,
            2,
            new_deadline,
            "Deadline moved",
        )
        .expect("bulk move");

        for group_id in [&g1, &g2] {
            let last = attempts::last_feedbackset(&conn, group_id).expect("last");
            assert_eq!(last.deadline_datetime, Some(new_deadline));
            assert_eq!(last.feedbackset_type, FeedbacksetType::FirstAttempt);
            assert_eq!(comment_count(&conn, &last.id), 1);
        }

        // Batch timestamp is truncated to the second; comments across groups
        // share the same publication instant.
        assert_eq!(outcome.batch_datetime, utc(2025, 3, 5, 14, 30, 27));
        let published: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT DISTINCT published_datetime FROM group_comments")
                .expect("prepare");
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))
                .expect("query");
            rows.collect::<rusqlite::Result<Vec<_>>>().expect("collect")
        };
        assert_eq!(published.len(), 1);
    }

    #[test]
    fn give_new_attempt_orders_attempt_before_comment() {
        let conn = crate::db::open_in_memory().expect("open db");
        let (_, g1, g2) = setup_two_groups(&conn);
        let groups = vec![g1.clone(), g2.clone()];
        let now = utc(2025, 3, 5, 14, 30, 27) + Duration::microseconds(1234);
        let new_deadline = utc(2025, 3, 20, 23, 59, 0);

        let outcome = bulk_give_new_attempt(
            &conn,
            &NullNotifier,
            now,
            "examiner1",
            &groups,
            2,
            new_deadline,
            "You have been given a new attempt.",
        )
        .expect("bulk new attempt");

        for (group_id, feedback_set_id) in groups.iter().zip(&outcome.feedback_set_ids) {
            let sets = list_feedbacksets(&conn, group_id).expect("list");
            assert_eq!(sets.len(), 2);
            let attempt = FeedbackSet::get(&conn, feedback_set_id).expect("attempt");
            assert_eq!(attempt.feedbackset_type, FeedbacksetType::NewAttempt);
            assert_eq!(attempt.deadline_datetime, Some(new_deadline));
            assert_eq!(attempt.created_datetime, utc(2025, 3, 5, 14, 30, 27));

            let published: String = conn
                .query_row(
                    "SELECT published_datetime FROM group_comments WHERE feedback_set_id = ?",
                    [feedback_set_id],
                    |r| r.get(0),
                )
                .expect("published");
            let published = crate::clock::parse_datetime(&published).expect("parse");
            assert!(published > attempt.created_datetime);
        }
    }

    #[test]
    fn batch_in_the_same_second_still_orders_after_existing_attempts() {
        let conn = crate::db::open_in_memory().expect("open db");
        let assignment_id = testutil::make_assignment(&conn, Some(utc(2025, 3, 1, 0, 0, 0)), "off");
        let created = utc(2025, 3, 5, 14, 30, 27) + Duration::microseconds(500_000);
        let (group_id, _) =
            create_group_with_first_attempt(&conn, created, &testutil::group_spec(&assignment_id))
                .expect("group");

        let outcome = bulk_give_new_attempt(
            &conn,
            &NullNotifier,
            created + Duration::microseconds(400_000),
            "examiner1",
            &[group_id.clone()],
            1,
            utc(2025, 3, 20, 23, 59, 0),
            "You have been given a new attempt.",
        )
        .expect("bulk new attempt");

        // Truncating to the second would have placed the new attempt before
        // the first one; the batch timestamp is clamped instead.
        assert_eq!(outcome.batch_datetime, created + Duration::microseconds(1));
        let sets = list_feedbacksets(&conn, &group_id).expect("list");
        assert_eq!(sets.len(), 2);
        assert!(sets[1].created_datetime > sets[0].created_datetime);
        assert_eq!(sets[1].feedbackset_type, FeedbacksetType::NewAttempt);
    }

    #[test]
    fn selection_count_mismatch_rejects_the_whole_batch() {
        let conn = crate::db::open_in_memory().expect("open db");
        let (_, g1, g2) = setup_two_groups(&conn);

        let err = bulk_move_deadline(
            &conn,
            &NullNotifier,
            utc(2025, 3, 5, 14, 0, 0),
            "examiner1",
            &[g1.clone(), g2],
            3,
            utc(2025, 3, 10, 0, 0, 0),
            "Deadline moved",
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::UnauthorizedSelection(_)));

        let last = attempts::last_feedbackset(&conn, &g1).expect("last");
        assert_eq!(last.deadline_datetime, None);
        assert_eq!(comment_count(&conn, &last.id), 0);
    }

    #[test]
    fn unmanageable_group_rejects_the_whole_batch() {
        let conn = crate::db::open_in_memory().expect("open db");
        let (_, g1, g2) = setup_two_groups(&conn);

        let err = bulk_give_new_attempt(
            &conn,
            &NullNotifier,
            utc(2025, 3, 5, 14, 0, 0),
            "somebody_else",
            &[g1.clone(), g2],
            2,
            utc(2025, 3, 10, 0, 0, 0),
            "You have been given a new attempt.",
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::UnauthorizedSelection(_)));

        for group_id in [&g1] {
            let sets = list_feedbacksets(&conn, group_id).expect("list");
            assert_eq!(sets.len(), 1);
        }
    }

    #[test]
    fn failure_mid_batch_rolls_back_every_group() {
        let conn = crate::db::open_in_memory().expect("open db");
        let (_, g1, g2) = setup_two_groups(&conn);

        // Break the second group's current attempt underneath the batch: the
        // bulk update then touches fewer rows than expected and the batch
        // must abort after the first group has already been written.
        let g2_last = attempts::last_feedbackset(&conn, &g2).expect("last");
        conn.execute(
            "DELETE FROM feedback_sets WHERE id = ?",
            [&g2_last.id],
        )
        .expect("delete");

        let err = bulk_move_deadline(
            &conn,
            &NullNotifier,
            utc(2025, 3, 5, 14, 0, 0),
            "examiner1",
            &[g1.clone(), g2],
            2,
            utc(2025, 3, 10, 0, 0, 0),
            "Deadline moved",
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));

        let last = attempts::last_feedbackset(&conn, &g1).expect("last");
        assert_eq!(last.deadline_datetime, None, "rolled back deadline");
        assert_eq!(comment_count(&conn, &last.id), 0, "rolled back comment");
    }
}
