//! Trigger kinds for workflow initiation.
//!
//! A workflow enables a set of trigger kinds. How each trigger is scheduled
//! or received is up to the execution runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of event that can start a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Started by a user.
    Manual,
    /// Started by a form submission.
    Form,
    /// Time-based start.
    Schedule,
    /// HTTP webhook call.
    Webhook,
}

impl TriggerKind {
    /// Every trigger kind.
    pub const ALL: [Self; 4] = [Self::Manual, Self::Form, Self::Schedule, Self::Webhook];

    /// Returns the wire token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Form => "form",
            Self::Schedule => "schedule",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
