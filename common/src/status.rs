//! Request status state machine shared by deposits and withdrawals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a deposit or withdrawal request.
///
/// `Pending` is the only initial state; `Approved` and `Rejected` are
/// terminal. The only legal transitions are out of `Pending`, and each
/// request makes exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting an admin decision.
    Pending,
    /// Approved; the balance side effect has been applied.
    Approved,
    /// Rejected; no balance change.
    Rejected,
}

impl RequestStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[RequestStatus] {
        match self {
            RequestStatus::Pending => &[RequestStatus::Approved, RequestStatus::Rejected],
            RequestStatus::Approved => &[],
            RequestStatus::Rejected => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Apply an admin decision. Returns `None` if the request has already
    /// left `Pending`.
    pub fn resolve(&self, decision: Decision) -> Option<RequestStatus> {
        let next = decision.target_status();
        self.can_transition_to(next).then_some(next)
    }

    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            other => Err(UnknownVariant::new("request status", other)),
        }
    }
}

/// An admin's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Accept the request and apply its balance effect.
    Approved,
    /// Decline the request; balance is untouched.
    Rejected,
}

impl Decision {
    /// The terminal status this decision leads to.
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
        }
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target_status(), f)
    }
}

/// A stored value did not match any known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
