use serde_json::json;

use crate::attempts;
use crate::grading::{self, NewComment, PublishOutcome};
use crate::identity::ViewerRole;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{comment_json, db_conn, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::models::{CommentUserRole, CommentVisibility};

fn handle_publish(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = state.clock.now();
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let feedback_set_id = match required_str(req, "feedbackSetId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let published_by = optional_str(req, "publishedBy");
    let points = optional_i64(req, "points");

    match grading::publish(conn, now, &feedback_set_id, published_by.as_deref(), points) {
        Ok(PublishOutcome::Published { passed }) => ok(
            &req.id,
            json!({ "published": true, "reason": "", "passed": passed }),
        ),
        Ok(outcome) => {
            let (published, reason) = outcome.as_pair();
            ok(&req.id, json!({ "published": published, "reason": reason }))
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_ignore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let feedback_set_id = match required_str(req, "feedbackSetId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // An empty reason is passed through so the model invariant rejects it.
    let reason = optional_str(req, "reason").unwrap_or_default();
    match attempts::ignore_feedbackset(conn, &feedback_set_id, &reason) {
        Ok(()) => ok(&req.id, json!({ "ignored": true })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_comments_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = state.clock.now();
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let feedback_set_id = match required_str(req, "feedbackSetId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role_raw = match required_str(req, "userRole") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(user_role) = CommentUserRole::parse(&role_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown userRole: {role_raw}"),
            None,
        );
    };
    let text = match required_str(req, "text") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let visibility_raw =
        optional_str(req, "visibility").unwrap_or_else(|| "visible_to_everyone".to_string());
    let Some(visibility) = CommentVisibility::parse(&visibility_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown visibility: {visibility_raw}"),
            None,
        );
    };
    let part_of_grading = req
        .params
        .get("partOfGrading")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let comment = NewComment {
        feedback_set_id,
        user_id,
        user_role,
        text,
        visibility,
        part_of_grading,
    };
    match grading::add_comment(conn, now, &comment) {
        Ok(comment_id) => ok(&req.id, json!({ "commentId": comment_id })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_comments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let feedback_set_id = match required_str(req, "feedbackSetId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let viewer_user_id = match required_str(req, "viewerUserId") {
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

    match grading::list_comments(conn, &feedback_set_id, viewer_role, &viewer_user_id) {
        Ok(comments) => ok(
            &req.id,
            json!({ "comments": comments.iter().map(comment_json).collect::<Vec<_>>() }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedbackset.publish" => Some(handle_publish(state, req)),
        "feedbackset.ignore" => Some(handle_ignore(state, req)),
        "comments.add" => Some(handle_comments_add(state, req)),
        "comments.list" => Some(handle_comments_list(state, req)),
        _ => None,
    }
}
