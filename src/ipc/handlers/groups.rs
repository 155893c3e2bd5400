use serde_json::json;

use crate::attempts::{self, GroupSpec};
use crate::clock::format_datetime;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, feedbackset_json, required_str};
use crate::ipc::types::{AppState, Request};
use crate::models::{AssignmentGroup, Candidate, Examiner};

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = state.clock.now();
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let spec: GroupSpec = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    match attempts::create_group_with_first_attempt(conn, now, &spec) {
        Ok((group_id, feedback_set_id)) => ok(
            &req.id,
            json!({ "groupId": group_id, "feedbackSetId": feedback_set_id }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let group_id = match required_str(req, "groupId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let group = match AssignmentGroup::get(conn, &group_id) {
        Ok(g) => g,
        Err(e) => return domain_err(&req.id, &e),
    };
    let candidates = match Candidate::list_for_group(conn, &group_id) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    let examiners = match list_examiners(conn, &group_id) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    let current_deadline = match attempts::current_deadline(conn, &group_id) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    ok(
        &req.id,
        json!({
            "id": group.id,
            "assignmentId": group.assignment_id,
            "name": group.name,
            "lastFeedbackSetId": group.last_feedbackset_id,
            "currentDeadline": current_deadline.map(format_datetime),
            "candidates": candidates.iter().map(|c| json!({
                "userId": c.user_id,
                "fullName": c.full_name,
                "shortName": c.short_name,
                "candidateId": c.candidate_id,
            })).collect::<Vec<_>>(),
            "examiners": examiners.iter().map(|e| json!({
                "userId": e.user_id,
                "fullName": e.full_name,
                "shortName": e.short_name,
            })).collect::<Vec<_>>(),
        }),
    )
}

fn list_examiners(
    conn: &rusqlite::Connection,
    group_id: &str,
) -> crate::errors::Result<Vec<Examiner>> {
    let sql = format!(
        "SELECT {} FROM examiners WHERE group_id = ? ORDER BY short_name",
        Examiner::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([group_id], Examiner::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn handle_attempts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let group_id = match required_str(req, "groupId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // NotFound for an unknown group rather than an empty list.
    if let Err(e) = AssignmentGroup::get(conn, &group_id) {
        return domain_err(&req.id, &e);
    }
    match attempts::list_feedbacksets(conn, &group_id) {
        Ok(sets) => ok(
            &req.id,
            json!({ "attempts": sets.iter().map(feedbackset_json).collect::<Vec<_>>() }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "groups.create" => Some(handle_create(state, req)),
        "groups.get" => Some(handle_get(state, req)),
        "groups.attempts.list" => Some(handle_attempts_list(state, req)),
        _ => None,
    }
}
