use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;

use crate::clock::format_datetime;
use crate::coordinator::{self, BulkOutcome};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{
    db_conn, required_datetime, required_str, required_str_array, required_usize,
};
use crate::ipc::types::{AppState, Request};
use crate::notify::Notifier;

struct BulkParams {
    acting_user: String,
    group_ids: Vec<String>,
    expected_count: usize,
    new_deadline: DateTime<Utc>,
    comment_text: String,
}

fn parse_bulk_params(req: &Request, now: DateTime<Utc>) -> Result<BulkParams, serde_json::Value> {
    let acting_user = required_str(req, "actingUserId")?;
    let group_ids = required_str_array(req, "groupIds")?;
    let expected_count = required_usize(req, "expectedGroupCount")?;
    let new_deadline = required_datetime(req, "newDeadline")?;
    let comment_text = required_str(req, "commentText")?;
    if new_deadline <= now {
        return Err(err(
            &req.id,
            "validation_failed",
            "The deadline has to be in the future.",
            None,
        ));
    }
    Ok(BulkParams {
        acting_user,
        group_ids,
        expected_count,
        new_deadline,
        comment_text,
    })
}

fn outcome_json(req: &Request, outcome: &BulkOutcome) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "groupIds": outcome.group_ids,
            "displayNames": outcome.display_names,
            "feedbackSetIds": outcome.feedback_set_ids,
            "batchDatetime": format_datetime(outcome.batch_datetime),
        }),
    )
}

fn run_bulk(
    state: &mut AppState,
    req: &Request,
    op: fn(
        &Connection,
        &dyn Notifier,
        DateTime<Utc>,
        &str,
        &[String],
        usize,
        DateTime<Utc>,
        &str,
    ) -> crate::errors::Result<BulkOutcome>,
) -> serde_json::Value {
    let now = state.clock.now();
    let params = match parse_bulk_params(req, now) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let notifier = state.notifier.as_ref();
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match op(
        conn,
        notifier,
        now,
        &params.acting_user,
        &params.group_ids,
        params.expected_count,
        params.new_deadline,
        &params.comment_text,
    ) {
        Ok(outcome) => outcome_json(req, &outcome),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "deadlines.moveDeadline" => Some(run_bulk(state, req, coordinator::bulk_move_deadline)),
        "deadlines.giveNewAttempt" => {
            Some(run_bulk(state, req, coordinator::bulk_give_new_attempt))
        }
        _ => None,
    }
}
