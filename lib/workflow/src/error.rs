//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: A structural edit to the stage graph was rejected
//! - `RoutingError`: A routing request could not be answered
//! - `WorkflowError`: Loading or saving a workflow definition document
//!
//! Design-time validation produces a [`ValidationReport`](crate::validation::ValidationReport)
//! listing every violation instead of a single error.

use crate::validation::ValidationReport;
use std::fmt;
use waypoint_core::{RouteId, StageId, WorkflowId};

/// Errors from stage graph edits.
///
/// These errors contain only information available at the graph layer.
/// Workflow-level context should be added by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Stage with the given ID was not found.
    StageNotFound { stage_id: StageId },
    /// Route with the given ID was not found on the stage.
    RouteNotFound { stage_id: StageId, route_id: RouteId },
    /// Condition index is out of range for the route.
    ConditionNotFound { route_id: RouteId, index: usize },
    /// The route target is not strictly after the source stage.
    BackwardRoute {
        from: StageId,
        from_order: u32,
        to: StageId,
        to_order: u32,
    },
    /// A workflow must keep at least one stage.
    LastStage { stage_id: StageId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageNotFound { stage_id } => write!(f, "stage not found: {stage_id}"),
            Self::RouteNotFound { stage_id, route_id } => {
                write!(f, "route {route_id} not found on stage {stage_id}")
            }
            Self::ConditionNotFound { route_id, index } => {
                write!(f, "condition #{index} not found on route {route_id}")
            }
            Self::BackwardRoute {
                from,
                from_order,
                to,
                to_order,
            } => write!(
                f,
                "route from {from} (order {from_order}) to {to} (order {to_order}) does not point forward"
            ),
            Self::LastStage { stage_id } => {
                write!(f, "cannot delete {stage_id}: a workflow needs at least one stage")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors answering a routing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// The request names a stage that is not in the workflow.
    UnknownStage { stage_id: StageId },
    /// The workflow failed validation and cannot be executed.
    InvalidWorkflow {
        workflow_id: WorkflowId,
        violations: usize,
    },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStage { stage_id } => write!(f, "unknown stage: {stage_id}"),
            Self::InvalidWorkflow {
                workflow_id,
                violations,
            } => write!(
                f,
                "workflow {workflow_id} has {violations} validation violation(s) and cannot be executed"
            ),
        }
    }
}

impl std::error::Error for RoutingError {}

/// High-level workflow document errors.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// The document is not a valid workflow definition.
    Parse { reason: String },
    /// The workflow could not be serialized.
    Serialize { reason: String },
    /// The workflow failed validation and cannot be persisted.
    Invalid { report: ValidationReport },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "invalid workflow document: {reason}"),
            Self::Serialize { reason } => write!(f, "failed to serialize workflow: {reason}"),
            Self::Invalid { report } => write!(f, "workflow is not valid: {report}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let stage_id = StageId::new();
        let err = GraphError::StageNotFound { stage_id };
        assert!(err.to_string().contains("stage not found"));
    }

    #[test]
    fn backward_route_display() {
        let err = GraphError::BackwardRoute {
            from: "review".parse().expect("id"),
            from_order: 2,
            to: "intake".parse().expect("id"),
            to_order: 0,
        };
        let message = err.to_string();
        assert!(message.contains("review (order 2)"));
        assert!(message.contains("does not point forward"));
    }

    #[test]
    fn routing_error_display() {
        let err = RoutingError::InvalidWorkflow {
            workflow_id: WorkflowId::new(),
            violations: 3,
        };
        assert!(err.to_string().contains("3 validation violation(s)"));
    }

    #[test]
    fn workflow_error_display() {
        let err = WorkflowError::Parse {
            reason: "missing field `stages`".to_string(),
        };
        assert!(err.to_string().contains("missing field `stages`"));
    }
}
