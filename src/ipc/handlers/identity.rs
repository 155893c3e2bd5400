use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use crate::errors::{LifecycleError, Result};
use crate::identity::{self, ViewerRole};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::models::{AnonymizationMode, Assignment, AssignmentGroup, Candidate, Examiner};

fn candidate_in_group(conn: &Connection, group_id: &str, user_id: &str) -> Result<Candidate> {
    let sql = format!(
        "SELECT {} FROM candidates WHERE group_id = ? AND user_id = ?",
        Candidate::COLUMNS
    );
    conn.query_row(&sql, [group_id, user_id], Candidate::from_row)
        .optional()?
        .ok_or_else(|| LifecycleError::NotFound(format!("candidate {user_id} in group {group_id}")))
}

fn examiner_in_group(conn: &Connection, group_id: &str, user_id: &str) -> Result<Examiner> {
    let sql = format!(
        "SELECT {} FROM examiners WHERE group_id = ? AND user_id = ?",
        Examiner::COLUMNS
    );
    conn.query_row(&sql, [group_id, user_id], Examiner::from_row)
        .optional()?
        .ok_or_else(|| LifecycleError::NotFound(format!("examiner {user_id} in group {group_id}")))
}

fn anonymization_mode(conn: &Connection, group_id: &str) -> Result<AnonymizationMode> {
    let group = AssignmentGroup::get(conn, group_id)?;
    let assignment = Assignment::get(conn, &group.assignment_id)?;
    Ok(assignment.anonymizationmode)
}

fn handle_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let group_id = match required_str(req, "groupId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_kind = match required_str(req, "subjectKind") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_user_id = match required_str(req, "subjectUserId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role_raw = match required_str(req, "viewerRole") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(viewer_role) = ViewerRole::parse(&role_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown viewerRole: {role_raw}"),
            None,
        );
    };

    let mode = match anonymization_mode(conn, &group_id) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    let view = match subject_kind.as_str() {
        "candidate" => match candidate_in_group(conn, &group_id, &subject_user_id) {
            Ok(c) => identity::resolve_candidate_identity(&c, mode, viewer_role),
            Err(e) => return domain_err(&req.id, &e),
        },
        "examiner" => match examiner_in_group(conn, &group_id, &subject_user_id) {
            Ok(e) => identity::resolve_examiner_identity(&e, mode, viewer_role),
            Err(e) => return domain_err(&req.id, &e),
        },
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown subjectKind: {other}"),
                None,
            )
        }
    };

    ok(
        &req.id,
        json!({ "fullName": view.full_name, "shortName": view.short_name }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "identity.resolve" => Some(handle_resolve(state, req)),
        _ => None,
    }
}
