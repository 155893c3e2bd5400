use serde_json::json;
use uuid::Uuid;

use crate::clock::format_datetime;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_datetime, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::models::{AnonymizationMode, Assignment};

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let short_name = match required_str(req, "shortName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let long_name = optional_str(req, "longName").unwrap_or_else(|| short_name.clone());
    let first_deadline = match optional_datetime(req, "firstDeadline") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mode_raw = optional_str(req, "anonymizationMode").unwrap_or_else(|| "off".to_string());
    let Some(mode) = AnonymizationMode::parse(&mode_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown anonymizationMode: {mode_raw}"),
            None,
        );
    };
    let max_points = optional_i64(req, "maxPoints").unwrap_or(1);
    let passing_grade_min_points = optional_i64(req, "passingGradeMinPoints").unwrap_or(1);

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO assignments(
            id, short_name, long_name, first_deadline, anonymizationmode,
            max_points, passing_grade_min_points)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &short_name,
            &long_name,
            first_deadline.map(format_datetime),
            mode.as_str(),
            max_points,
            passing_grade_min_points,
        ),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "assignmentId": id })),
        Err(e) => err(&req.id, "db_operation_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let assignment_id = match required_str(req, "assignmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match Assignment::get(conn, &assignment_id) {
        Ok(a) => ok(
            &req.id,
            json!({
                "id": a.id,
                "shortName": a.short_name,
                "longName": a.long_name,
                "firstDeadline": a.first_deadline.map(format_datetime),
                "anonymizationMode": a.anonymizationmode.as_str(),
                "maxPoints": a.max_points,
                "passingGradeMinPoints": a.passing_grade_min_points,
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(handle_create(state, req)),
        "assignments.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
