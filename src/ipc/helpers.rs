use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::clock::{format_datetime, parse_datetime};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::models::{FeedbackSet, GroupComment};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn optional_i64(req: &Request, key: &str) -> Option<i64> {
    req.params.get(key).and_then(|v| v.as_i64())
}

pub fn required_datetime(req: &Request, key: &str) -> Result<DateTime<Utc>, Value> {
    let raw = required_str(req, key)?;
    parse_datetime(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("{} must be an RFC 3339 datetime", key),
            None,
        )
    })
}

pub fn optional_datetime(req: &Request, key: &str) -> Result<Option<DateTime<Utc>>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_datetime(req, key).map(Some),
    }
}

pub fn required_str_array(req: &Request, key: &str) -> Result<Vec<String>, Value> {
    let bad = || {
        err(
            &req.id,
            "bad_params",
            format!("missing {} (array of strings)", key),
            None,
        )
    };
    let arr = req
        .params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(bad)?;
    arr.iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(bad))
        .collect()
}

pub fn required_usize(req: &Request, key: &str) -> Result<usize, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("missing {} (non-negative integer)", key),
                None,
            )
        })
}

pub fn feedbackset_json(fs: &FeedbackSet) -> Value {
    json!({
        "id": fs.id,
        "groupId": fs.group_id,
        "feedbacksetType": fs.feedbackset_type.as_str(),
        "deadlineDatetime": fs.deadline_datetime.map(format_datetime),
        "createdBy": fs.created_by,
        "createdDatetime": format_datetime(fs.created_datetime),
        "gradingPublishedDatetime": fs.grading_published_datetime.map(format_datetime),
        "gradingPublishedBy": fs.grading_published_by,
        "gradingPoints": fs.grading_points,
        "ignored": fs.ignored,
        "ignoredReason": fs.ignored_reason,
    })
}

pub fn comment_json(comment: &GroupComment) -> Value {
    json!({
        "id": comment.id,
        "feedbackSetId": comment.feedback_set_id,
        "userId": comment.user_id,
        "userRole": comment.user_role.as_str(),
        "text": comment.text,
        "visibility": comment.visibility.as_str(),
        "partOfGrading": comment.part_of_grading,
        "createdDatetime": format_datetime(comment.created_datetime),
        "publishedDatetime": comment.published_datetime.map(format_datetime),
    })
}
