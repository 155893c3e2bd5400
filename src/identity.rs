use serde::{Deserialize, Serialize};

use crate::models::{AnonymizationMode, Candidate, Examiner};

/// Shown when a role requires an anonymous code and the subject has none
/// assigned. A detectable state, never an error.
pub const ANONYMOUS_ID_MISSING: &str = "Automatic anonymous ID missing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Student,
    Examiner,
    PeriodAdmin,
    SubjectAdmin,
    DepartmentAdmin,
}

impl ViewerRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(ViewerRole::Student),
            "examiner" => Some(ViewerRole::Examiner),
            "periodadmin" => Some(ViewerRole::PeriodAdmin),
            "subjectadmin" => Some(ViewerRole::SubjectAdmin),
            "departmentadmin" => Some(ViewerRole::DepartmentAdmin),
            _ => None,
        }
    }
}

/// The computed projection of a subject's name as seen by a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityView {
    pub full_name: String,
    pub short_name: String,
}

/// Whether student identities must be hidden from the given viewer role.
///
/// Semi-anonymous assignments reveal students to subject and department
/// admins; fully anonymous assignments only to department admins (and only
/// through privileged tooling outside this resolver's non-privileged path).
pub fn students_must_be_anonymized_for_role(mode: AnonymizationMode, role: ViewerRole) -> bool {
    match mode {
        AnonymizationMode::Off => false,
        AnonymizationMode::SemiAnonymous => !matches!(
            role,
            ViewerRole::SubjectAdmin | ViewerRole::DepartmentAdmin
        ),
        AnonymizationMode::FullyAnonymous => !matches!(role, ViewerRole::DepartmentAdmin),
    }
}

/// Whether examiner identities must be hidden from the given viewer role.
/// Examiner anonymization protects examiners from students only.
pub fn examiners_must_be_anonymized_for_role(mode: AnonymizationMode, role: ViewerRole) -> bool {
    mode != AnonymizationMode::Off && role == ViewerRole::Student
}

/// A candidate's anonymous display name. The admin-assigned candidate id
/// takes precedence over the precomputed automatic code.
pub fn candidate_anonymous_name(candidate: &Candidate) -> String {
    candidate
        .candidate_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(candidate
            .automatic_anonymous_id
            .as_deref()
            .filter(|s| !s.is_empty()))
        .unwrap_or(ANONYMOUS_ID_MISSING)
        .to_string()
}

pub fn examiner_anonymous_name(examiner: &Examiner) -> String {
    examiner
        .automatic_anonymous_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_ID_MISSING)
        .to_string()
}

pub fn resolve_candidate_identity(
    candidate: &Candidate,
    mode: AnonymizationMode,
    role: ViewerRole,
) -> IdentityView {
    if students_must_be_anonymized_for_role(mode, role) {
        let anonymous = candidate_anonymous_name(candidate);
        IdentityView {
            full_name: anonymous.clone(),
            short_name: anonymous,
        }
    } else {
        IdentityView {
            full_name: candidate.full_name.clone(),
            short_name: candidate.short_name.clone(),
        }
    }
}

pub fn resolve_examiner_identity(
    examiner: &Examiner,
    mode: AnonymizationMode,
    role: ViewerRole,
) -> IdentityView {
    if examiners_must_be_anonymized_for_role(mode, role) {
        let anonymous = examiner_anonymous_name(examiner);
        IdentityView {
            full_name: anonymous.clone(),
            short_name: anonymous,
        }
    } else {
        IdentityView {
            full_name: examiner.full_name.clone(),
            short_name: examiner.short_name.clone(),
        }
    }
}

/// Display name for a whole group as seen by the acting examiner. Used in
/// bulk-operation summaries, where the real names may not be revealed.
pub fn group_displayname(
    candidates: &[Candidate],
    mode: AnonymizationMode,
    role: ViewerRole,
) -> String {
    if candidates.is_empty() {
        return "(no students)".to_string();
    }
    candidates
        .iter()
        .map(|c| resolve_candidate_identity(c, mode, role).short_name)
        .collect::<Vec<_>>()
        .join(", ")
}
