//! Employees: the staffed resources that answer calls.

use serde::{Deserialize, Serialize};

use crate::model::call::CallId;

/// A staffed resource that answers one call at a time.
///
/// Availability flips to `Busy` when the dispatcher assigns a call and back
/// to `Free` when handling ends, whatever the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub tier: Tier,
    #[serde(default)]
    pub availability: Availability,
    /// Call currently being answered. `None` while free.
    #[serde(default)]
    pub current_call: Option<CallId>,
}

impl Employee {
    pub fn new(id: u32, tier: Tier) -> Self {
        Self {
            id: EmployeeId(id),
            tier,
            availability: Availability::Free,
            current_call: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.availability == Availability::Free
    }

    /// Take `call`. Returns false if already busy.
    pub fn occupy(&mut self, call: CallId) -> bool {
        if !self.is_free() {
            return false;
        }
        self.availability = Availability::Busy;
        self.current_call = Some(call);
        true
    }

    /// Free the employee if it is still answering `call`.
    ///
    /// A mismatch means this record was replaced or reassigned since the
    /// call was handed out, so it is left alone.
    pub fn release(&mut self, call: CallId) -> bool {
        if self.current_call != Some(call) {
            return false;
        }
        self.availability = Availability::Free;
        self.current_call = None;
        true
    }
}

/// Newtype for employee identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub u32);

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "emp-{}", self.0)
    }
}

/// Priority class. Lower tiers are offered calls first:
/// `Operator < Supervisor < Director`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Operator,
    Supervisor,
    Director,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Operator, Tier::Supervisor, Tier::Director];
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::Operator => "operator",
            Tier::Supervisor => "supervisor",
            Tier::Director => "director",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(Tier::Operator),
            "supervisor" => Ok(Tier::Supervisor),
            "director" => Ok(Tier::Director),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Free,
    Busy,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Availability::Free => "free",
            Availability::Busy => "busy",
        };
        write!(f, "{s}")
    }
}
