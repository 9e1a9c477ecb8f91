//! Calls and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::employee::EmployeeId;

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// A call submitted to the dispatcher.
///
/// Created by the caller with `Outcome::Pending`. Once the outcome leaves
/// `Pending` the call is settled and cannot be resolved again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Caller-assigned identifier, unique within a dispatch session.
    pub id: CallId,

    pub outcome: Outcome,

    /// Why the call was rejected. `None` unless `outcome` is `Rejected`.
    pub reason: Option<Reason>,

    /// Employee that answered the call, if one did.
    pub handled_by: Option<EmployeeId>,

    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Call {
    pub fn new(id: u64) -> Self {
        Self {
            id: CallId(id),
            outcome: Outcome::Pending,
            reason: None,
            handled_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }

    /// Mark the call as answered by `employee`.
    pub fn complete(&mut self, employee: EmployeeId) -> Result<()> {
        self.settle(Outcome::Completed)?;
        self.handled_by = Some(employee);
        Ok(())
    }

    /// Mark the call as rejected.
    pub fn reject(&mut self, reason: Reason) -> Result<()> {
        self.settle(Outcome::Rejected)?;
        self.reason = Some(reason);
        Ok(())
    }

    fn settle(&mut self, to: Outcome) -> Result<()> {
        if !self.outcome.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.outcome,
                to,
            });
        }
        self.outcome = to;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

/// Newtype for call identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Where a call stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Not yet resolved.
    Pending,
    /// Answered by an employee.
    Completed,
    /// Turned away; see [`Reason`].
    Rejected,
}

impl Outcome {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Outcome) -> bool {
        matches!(
            (self, to),
            (Outcome::Pending, Outcome::Completed) | (Outcome::Pending, Outcome::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Pending => "pending",
            Outcome::Completed => "completed",
            Outcome::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Reason
// ---------------------------------------------------------------------------

/// Why a call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// The dispatcher was already at its in-flight limit.
    NoCapacity,
    /// Held, but no employee was free before the hold ended.
    NoEmployeeAvailable,
    /// The handling step failed or was interrupted.
    ProcessingError,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Reason::NoCapacity => "no_capacity",
            Reason::NoEmployeeAvailable => "no_employee_available",
            Reason::ProcessingError => "processing_error",
        };
        write!(f, "{s}")
    }
}
