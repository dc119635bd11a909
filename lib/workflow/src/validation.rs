//! Design-time validation of workflow definitions.
//!
//! Validation collects every structural problem in one pass so editors can
//! show them all at once. A workflow with any violation must not be
//! persisted or executed.

use crate::condition::Operator;
use crate::graph::StageGraph;
use crate::stage::AssignmentType;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use waypoint_core::{RouteId, StageId};

/// A single structural problem in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The workflow name is blank.
    EmptyWorkflowName,
    /// The workflow has no stages.
    NoStages,
    /// A stage name is blank.
    UnnamedStage { stage_id: StageId },
    /// Two stages share an ID.
    DuplicateStageId { stage_id: StageId },
    /// Two stages share an order.
    DuplicateStageOrder { stage_id: StageId, order: u32 },
    /// A user or queue assignment has no assignee.
    MissingAssignee {
        stage_id: StageId,
        assignment_type: AssignmentType,
    },
    /// A route targets a stage that does not exist.
    DanglingRoute {
        stage_id: StageId,
        route_id: RouteId,
        next_stage_id: StageId,
    },
    /// A route targets a stage that is not strictly after its owner.
    BackwardRoute {
        stage_id: StageId,
        route_id: RouteId,
        next_stage_id: StageId,
    },
    /// The routes between stages form a cycle.
    CyclicStageGraph,
    /// A condition has a blank field name.
    EmptyConditionField {
        stage_id: StageId,
        route_id: RouteId,
        index: usize,
    },
    /// A condition's operator needs a comparison value but has none.
    MissingConditionValue {
        stage_id: StageId,
        route_id: RouteId,
        index: usize,
        operator: Operator,
    },
}

impl Violation {
    /// Returns the stage this violation belongs to, if any.
    #[must_use]
    pub fn stage_id(&self) -> Option<&StageId> {
        match self {
            Self::EmptyWorkflowName | Self::NoStages | Self::CyclicStageGraph => None,
            Self::UnnamedStage { stage_id }
            | Self::DuplicateStageId { stage_id }
            | Self::DuplicateStageOrder { stage_id, .. }
            | Self::MissingAssignee { stage_id, .. }
            | Self::DanglingRoute { stage_id, .. }
            | Self::BackwardRoute { stage_id, .. }
            | Self::EmptyConditionField { stage_id, .. }
            | Self::MissingConditionValue { stage_id, .. } => Some(stage_id),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWorkflowName => write!(f, "workflow name is empty"),
            Self::NoStages => write!(f, "workflow has no stages"),
            Self::UnnamedStage { stage_id } => write!(f, "stage {stage_id} has no name"),
            Self::DuplicateStageId { stage_id } => {
                write!(f, "stage id {stage_id} is used more than once")
            }
            Self::DuplicateStageOrder { stage_id, order } => {
                write!(f, "stage {stage_id} reuses order {order}")
            }
            Self::MissingAssignee {
                stage_id,
                assignment_type,
            } => write!(
                f,
                "stage {stage_id} uses {assignment_type:?} assignment without an assignee"
            ),
            Self::DanglingRoute {
                stage_id,
                route_id,
                next_stage_id,
            } => write!(
                f,
                "route {route_id} on stage {stage_id} targets missing stage {next_stage_id}"
            ),
            Self::BackwardRoute {
                stage_id,
                route_id,
                next_stage_id,
            } => write!(
                f,
                "route {route_id} on stage {stage_id} points backward to {next_stage_id}"
            ),
            Self::CyclicStageGraph => write!(f, "stage routes form a cycle"),
            Self::EmptyConditionField {
                stage_id,
                route_id,
                index,
            } => write!(
                f,
                "condition #{index} of route {route_id} on stage {stage_id} has no field"
            ),
            Self::MissingConditionValue {
                stage_id,
                route_id,
                index,
                operator,
            } => write!(
                f,
                "condition #{index} of route {route_id} on stage {stage_id} uses {operator} without a value"
            ),
        }
    }
}

/// Every violation found in a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// The violations, in discovery order.
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns true if there are no violations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns the number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns the violations for one stage.
    pub fn for_stage<'a>(&'a self, stage_id: &'a StageId) -> impl Iterator<Item = &'a Violation> {
        self.violations
            .iter()
            .filter(move |v| v.stage_id() == Some(stage_id))
    }

    /// Converts into a `Result`, erring when there are violations.
    ///
    /// # Errors
    ///
    /// Returns `self` if any violation was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for (i, violation) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Checks a workflow's name and stage graph.
#[must_use]
pub fn validate(name: &str, graph: &StageGraph) -> ValidationReport {
    let mut violations = Vec::new();

    if name.trim().is_empty() {
        violations.push(Violation::EmptyWorkflowName);
    }
    if graph.is_empty() {
        violations.push(Violation::NoStages);
    }

    let mut seen_ids = HashSet::new();
    let mut seen_orders = HashMap::new();
    for stage in graph.stages() {
        if !seen_ids.insert(&stage.id) {
            violations.push(Violation::DuplicateStageId {
                stage_id: stage.id.clone(),
            });
        }
        if seen_orders.insert(stage.order, &stage.id).is_some() {
            violations.push(Violation::DuplicateStageOrder {
                stage_id: stage.id.clone(),
                order: stage.order,
            });
        }
        if !stage.is_named() {
            violations.push(Violation::UnnamedStage {
                stage_id: stage.id.clone(),
            });
        }
        let has_assignee = stage
            .assignee_id
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if stage.assignment_type.requires_assignee() && !has_assignee {
            violations.push(Violation::MissingAssignee {
                stage_id: stage.id.clone(),
                assignment_type: stage.assignment_type,
            });
        }

        for route in &stage.conditional_routes {
            for (index, condition) in route.conditions.iter().enumerate() {
                if condition.field.trim().is_empty() {
                    violations.push(Violation::EmptyConditionField {
                        stage_id: stage.id.clone(),
                        route_id: route.id.clone(),
                        index,
                    });
                }
                if condition.operator.requires_value() && condition.value.is_none() {
                    violations.push(Violation::MissingConditionValue {
                        stage_id: stage.id.clone(),
                        route_id: route.id.clone(),
                        index,
                        operator: condition.operator,
                    });
                }
            }
        }
    }

    violations.extend(
        graph
            .dangling_routes()
            .into_iter()
            .map(|r| Violation::DanglingRoute {
                stage_id: r.stage_id,
                route_id: r.route_id,
                next_stage_id: r.next_stage_id,
            }),
    );
    violations.extend(
        graph
            .backward_routes()
            .into_iter()
            .map(|r| Violation::BackwardRoute {
                stage_id: r.stage_id,
                route_id: r.route_id,
                next_stage_id: r.next_stage_id,
            }),
    );
    if graph.has_cycle() {
        violations.push(Violation::CyclicStageGraph);
    }

    ValidationReport { violations }
}
