//! Status workflow for job applications.
//!
//! Eight states, initial `pending`. `selected`, `rejected` and `withdrawn` are
//! terminal by convention only: HR may move an application from any status to
//! any other, so [`TransitionPolicy`] accepts every pair. Tightening the graph
//! means changing `permits` and nothing else.

use chrono::{DateTime, Utc};

use crate::models::application::{AdminNote, ApplicationStatus};

pub const INITIAL_STATUS: ApplicationStatus = ApplicationStatus::Pending;

/// Decides which status changes are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionPolicy;

impl TransitionPolicy {
    /// Every transition is permitted, including a status to itself.
    pub fn permits(&self, _from: ApplicationStatus, _to: ApplicationStatus) -> bool {
        true
    }
}

pub fn is_terminal(status: ApplicationStatus) -> bool {
    matches!(
        status,
        ApplicationStatus::Selected | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
    )
}

/// A planned status change, computed before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    /// Present only when the caller supplied a reason.
    pub note: Option<AdminNote>,
}

impl StatusChange {
    pub fn plan(
        from: ApplicationStatus,
        to: ApplicationStatus,
        reason: Option<&str>,
        updated_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let note = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|reason| AdminNote {
                text: transition_note_text(from, to, reason),
                added_by: updated_by.to_string(),
                added_at: now,
            });
        StatusChange { from, to, note }
    }

    /// Whether the applicant should hear about this change.
    pub fn notifies_applicant(&self) -> bool {
        self.from != self.to
    }
}

fn transition_note_text(from: ApplicationStatus, to: ApplicationStatus, reason: &str) -> String {
    if from == to {
        format!("Status remains {}: {reason}", to.label())
    } else {
        format!(
            "Status changed from {} to {}: {reason}",
            from.label(),
            to.label()
        )
    }
}
