use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::errors::{LifecycleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymizationMode {
    Off,
    SemiAnonymous,
    FullyAnonymous,
}

impl AnonymizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnonymizationMode::Off => "off",
            AnonymizationMode::SemiAnonymous => "semi_anonymous",
            AnonymizationMode::FullyAnonymous => "fully_anonymous",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(AnonymizationMode::Off),
            "semi_anonymous" => Some(AnonymizationMode::SemiAnonymous),
            "fully_anonymous" => Some(AnonymizationMode::FullyAnonymous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbacksetType {
    FirstAttempt,
    NewAttempt,
}

impl FeedbacksetType {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbacksetType::FirstAttempt => "first_attempt",
            FeedbacksetType::NewAttempt => "new_attempt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first_attempt" => Some(FeedbacksetType::FirstAttempt),
            "new_attempt" => Some(FeedbacksetType::NewAttempt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentVisibility {
    Private,
    VisibleToExaminerAndAdmins,
    VisibleToEveryone,
}

impl CommentVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentVisibility::Private => "private",
            CommentVisibility::VisibleToExaminerAndAdmins => "visible_to_examiner_and_admins",
            CommentVisibility::VisibleToEveryone => "visible_to_everyone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(CommentVisibility::Private),
            "visible_to_examiner_and_admins" => Some(CommentVisibility::VisibleToExaminerAndAdmins),
            "visible_to_everyone" => Some(CommentVisibility::VisibleToEveryone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentUserRole {
    Examiner,
    Student,
}

impl CommentUserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentUserRole::Examiner => "examiner",
            CommentUserRole::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "examiner" => Some(CommentUserRole::Examiner),
            "student" => Some(CommentUserRole::Student),
            _ => None,
        }
    }
}

fn parse_dt(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    clock::parse_datetime(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("bad datetime: {s}").into(),
        )
    })
}

fn parse_dt_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) => parse_dt(idx, s).map(Some),
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    pub first_deadline: Option<DateTime<Utc>>,
    pub anonymizationmode: AnonymizationMode,
    pub max_points: i64,
    pub passing_grade_min_points: i64,
}

impl Assignment {
    pub const COLUMNS: &'static str = "id, short_name, long_name, first_deadline, \
         anonymizationmode, max_points, passing_grade_min_points";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let mode: String = row.get(4)?;
        Ok(Assignment {
            id: row.get(0)?,
            short_name: row.get(1)?,
            long_name: row.get(2)?,
            first_deadline: parse_dt_opt(3, row.get(3)?)?,
            anonymizationmode: AnonymizationMode::parse(&mode).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("bad anonymizationmode: {mode}").into(),
                )
            })?,
            max_points: row.get(5)?,
            passing_grade_min_points: row.get(6)?,
        })
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Assignment> {
        let sql = format!("SELECT {} FROM assignments WHERE id = ?", Self::COLUMNS);
        conn.query_row(&sql, [id], Assignment::from_row)
            .optional()?
            .ok_or_else(|| LifecycleError::NotFound(format!("assignment {id}")))
    }

    pub fn points_is_passing_grade(&self, points: i64) -> bool {
        points >= self.passing_grade_min_points
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentGroup {
    pub id: String,
    pub assignment_id: String,
    pub name: String,
    pub last_feedbackset_id: Option<String>,
}

impl AssignmentGroup {
    pub const COLUMNS: &'static str = "id, assignment_id, name, last_feedbackset_id";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AssignmentGroup {
            id: row.get(0)?,
            assignment_id: row.get(1)?,
            name: row.get(2)?,
            last_feedbackset_id: row.get(3)?,
        })
    }

    pub fn get(conn: &Connection, id: &str) -> Result<AssignmentGroup> {
        let sql = format!(
            "SELECT {} FROM assignment_groups WHERE id = ?",
            Self::COLUMNS
        );
        conn.query_row(&sql, [id], AssignmentGroup::from_row)
            .optional()?
            .ok_or_else(|| LifecycleError::NotFound(format!("group {id}")))
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub full_name: String,
    pub short_name: String,
    pub candidate_id: Option<String>,
    pub automatic_anonymous_id: Option<String>,
}

impl Candidate {
    pub const COLUMNS: &'static str =
        "id, group_id, user_id, full_name, short_name, candidate_id, automatic_anonymous_id";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Candidate {
            id: row.get(0)?,
            group_id: row.get(1)?,
            user_id: row.get(2)?,
            full_name: row.get(3)?,
            short_name: row.get(4)?,
            candidate_id: row.get(5)?,
            automatic_anonymous_id: row.get(6)?,
        })
    }

    pub fn list_for_group(conn: &Connection, group_id: &str) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE group_id = ? ORDER BY short_name",
            Self::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([group_id], Candidate::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[derive(Debug, Clone)]
pub struct Examiner {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub full_name: String,
    pub short_name: String,
    pub automatic_anonymous_id: Option<String>,
}

impl Examiner {
    pub const COLUMNS: &'static str =
        "id, group_id, user_id, full_name, short_name, automatic_anonymous_id";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Examiner {
            id: row.get(0)?,
            group_id: row.get(1)?,
            user_id: row.get(2)?,
            full_name: row.get(3)?,
            short_name: row.get(4)?,
            automatic_anonymous_id: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackSet {
    pub id: String,
    pub group_id: String,
    pub feedbackset_type: FeedbacksetType,
    pub deadline_datetime: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_datetime: DateTime<Utc>,
    pub grading_published_datetime: Option<DateTime<Utc>>,
    pub grading_published_by: Option<String>,
    pub grading_points: Option<i64>,
    pub ignored: bool,
    pub ignored_reason: String,
}

impl FeedbackSet {
    pub const COLUMNS: &'static str = "id, group_id, feedbackset_type, deadline_datetime, \
         created_by, created_datetime, grading_published_datetime, grading_published_by, \
         grading_points, ignored, ignored_reason";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let fs_type: String = row.get(2)?;
        Ok(FeedbackSet {
            id: row.get(0)?,
            group_id: row.get(1)?,
            feedbackset_type: FeedbacksetType::parse(&fs_type).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("bad feedbackset_type: {fs_type}").into(),
                )
            })?,
            deadline_datetime: parse_dt_opt(3, row.get(3)?)?,
            created_by: row.get(4)?,
            created_datetime: parse_dt(5, row.get(5)?)?,
            grading_published_datetime: parse_dt_opt(6, row.get(6)?)?,
            grading_published_by: row.get(7)?,
            grading_points: row.get(8)?,
            ignored: row.get::<_, i64>(9)? != 0,
            ignored_reason: row.get(10)?,
        })
    }

    pub fn get(conn: &Connection, id: &str) -> Result<FeedbackSet> {
        let sql = format!("SELECT {} FROM feedback_sets WHERE id = ?", Self::COLUMNS);
        conn.query_row(&sql, [id], FeedbackSet::from_row)
            .optional()?
            .ok_or_else(|| LifecycleError::NotFound(format!("feedback set {id}")))
    }

    /// Model invariants, checked before any feedback set row is persisted,
    /// on every write path.
    pub fn clean(&self) -> Result<()> {
        if self.ignored {
            if self.ignored_reason.trim().is_empty() {
                return Err(LifecycleError::Validation(
                    "FeedbackSet can not be ignored without a reason".to_string(),
                ));
            }
            if self.grading_published_datetime.is_some()
                || self.grading_points.is_some()
                || self.grading_published_by.is_some()
            {
                return Err(LifecycleError::Validation(
                    "Ignored FeedbackSet can not have grading_published_datetime, \
                     grading_points or grading_published_by set."
                        .to_string(),
                ));
            }
        } else if !self.ignored_reason.is_empty() {
            return Err(LifecycleError::Validation(
                "FeedbackSet can not have a ignored reason without being set to ignored."
                    .to_string(),
            ));
        }

        if self.grading_published_datetime.is_some() {
            if self.grading_published_by.is_none() {
                return Err(LifecycleError::Validation(
                    "An assignment can not be published without being published by someone."
                        .to_string(),
                ));
            }
            if self.grading_points.is_none() {
                return Err(LifecycleError::Validation(
                    "An assignment can not be published without providing \"points\"."
                        .to_string(),
                ));
            }
        } else if self.grading_published_by.is_some() || self.grading_points.is_some() {
            return Err(LifecycleError::Validation(
                "A FeedbackSet can not have grading_points or grading_published_by \
                 without grading_published_datetime."
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.grading_published_datetime.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GroupComment {
    pub id: String,
    pub feedback_set_id: String,
    pub user_id: String,
    pub user_role: CommentUserRole,
    pub text: String,
    pub visibility: CommentVisibility,
    pub part_of_grading: bool,
    pub created_datetime: DateTime<Utc>,
    pub published_datetime: Option<DateTime<Utc>>,
}

impl GroupComment {
    pub const COLUMNS: &'static str = "id, feedback_set_id, user_id, user_role, text, \
         visibility, part_of_grading, created_datetime, published_datetime";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let role: String = row.get(3)?;
        let visibility: String = row.get(5)?;
        Ok(GroupComment {
            id: row.get(0)?,
            feedback_set_id: row.get(1)?,
            user_id: row.get(2)?,
            user_role: CommentUserRole::parse(&role).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("bad user_role: {role}").into(),
                )
            })?,
            text: row.get(4)?,
            visibility: CommentVisibility::parse(&visibility).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("bad visibility: {visibility}").into(),
                )
            })?,
            part_of_grading: row.get::<_, i64>(6)? != 0,
            created_datetime: parse_dt(7, row.get(7)?)?,
            published_datetime: parse_dt_opt(8, row.get(8)?)?,
        })
    }
}
