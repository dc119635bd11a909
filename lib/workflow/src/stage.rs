//! Workflow stage types.
//!
//! A stage is one step of a workflow. Each stage has:
//! - An `order` giving its topological rank within the workflow
//! - A stage type describing who or what performs the work
//! - An assignment strategy and optional assignee
//! - An ordered list of outgoing conditional routes

use crate::condition::SubmittedData;
use crate::route::{ConditionalRoute, Transition, select_transition};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use waypoint_core::{RouteId, StageId};

/// Who or what performs a stage's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Work done by a person.
    #[default]
    Human,
    /// Work done by an automation.
    Automation,
    /// Work done by an AI assistant.
    Ai,
    /// AI-assisted work reviewed by a person.
    Hybrid,
    /// An approve/reject decision.
    Approval,
}

/// How a stage's work item is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// Anyone holding a role. Without an assignee the workflow's default
    /// role applies.
    #[default]
    Role,
    /// A specific user.
    User,
    /// A shared work queue.
    Queue,
    /// Handled by the automation runtime.
    Automation,
    /// Rotated among eligible assignees.
    RoundRobin,
}

impl AssignmentType {
    /// Returns whether this assignment needs an assignee reference.
    #[must_use]
    pub fn requires_assignee(&self) -> bool {
        matches!(self, Self::User | Self::Queue)
    }
}

/// Structural status of a stage during design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Unnamed, or not reachable from the entry stage.
    Draft,
    /// Named, reachable, and every route points forward to an existing stage.
    Valid,
    /// Has a route to a missing stage or a route that points backward.
    Invalid,
}

/// A workflow stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique identifier for this stage.
    pub id: StageId,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Description of the stage's work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Topological position within the workflow.
    pub order: u32,
    /// Who or what performs the work.
    #[serde(default)]
    pub stage_type: StageType,
    /// Assignment strategy.
    #[serde(default)]
    pub assignment_type: AssignmentType,
    /// Role, user or queue reference for the assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// Service level target in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
    /// Form schema rendered for the stage. Not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_schema: Option<JsonValue>,
    /// Outgoing routes, evaluated in order.
    #[serde(default)]
    pub conditional_routes: Vec<ConditionalRoute>,
}

impl Stage {
    /// Creates a stage at the given order with no routes.
    #[must_use]
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            id: StageId::new(),
            name: name.into(),
            description: None,
            order,
            stage_type: StageType::default(),
            assignment_type: AssignmentType::default(),
            assignee_id: None,
            sla_hours: None,
            form_schema: None,
            conditional_routes: Vec::new(),
        }
    }

    /// Sets the stage type.
    #[must_use]
    pub fn with_type(mut self, stage_type: StageType) -> Self {
        self.stage_type = stage_type;
        self
    }

    /// Sets the assignment strategy and assignee.
    #[must_use]
    pub fn with_assignment(
        mut self,
        assignment_type: AssignmentType,
        assignee_id: Option<String>,
    ) -> Self {
        self.assignment_type = assignment_type;
        self.assignee_id = assignee_id;
        self
    }

    /// Returns the SLA as a duration.
    #[must_use]
    pub fn sla(&self) -> Option<Duration> {
        self.sla_hours.map(|hours| Duration::hours(i64::from(hours)))
    }

    /// Returns whether the stage has a non-blank name.
    #[must_use]
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Routes submitted data to the next stage.
    #[must_use]
    pub fn next_transition(&self, data: &SubmittedData) -> Transition {
        select_transition(&self.conditional_routes, data)
    }

    /// Returns a route by ID.
    #[must_use]
    pub fn route(&self, route_id: &RouteId) -> Option<&ConditionalRoute> {
        self.conditional_routes.iter().find(|r| &r.id == route_id)
    }

    pub(crate) fn route_mut(
        &mut self,
        route_id: &RouteId,
    ) -> Option<&mut ConditionalRoute> {
        self.conditional_routes.iter_mut().find(|r| &r.id == route_id)
    }
}

/// An optional stage field that a [`StageUpdate`] can reset to unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearableField {
    Description,
    AssigneeId,
    SlaHours,
    FormSchema,
}

/// A partial update to a stage's descriptive fields.
///
/// `None` leaves a field unchanged. To unset an optional field, list it in
/// `clear`; clearing runs before the new values are written. Structural
/// fields (`order`, routes) are edited through the stage graph instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New kind of work.
    #[serde(default)]
    pub stage_type: Option<StageType>,
    /// New assignment strategy.
    #[serde(default)]
    pub assignment_type: Option<AssignmentType>,
    /// New assignee for the assignment strategy.
    #[serde(default)]
    pub assignee_id: Option<String>,
    /// New SLA in hours.
    #[serde(default)]
    pub sla_hours: Option<u32>,
    /// New form schema.
    #[serde(default)]
    pub form_schema: Option<JsonValue>,
    /// Optional fields to unset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear: Vec<ClearableField>,
}

impl StageUpdate {
    pub(crate) fn apply_to(self, stage: &mut Stage) {
        for field in self.clear {
            match field {
                ClearableField::Description => stage.description = None,
                ClearableField::AssigneeId => stage.assignee_id = None,
                ClearableField::SlaHours => stage.sla_hours = None,
                ClearableField::FormSchema => stage.form_schema = None,
            }
        }
        if let Some(name) = self.name {
            stage.name = name;
        }
        if let Some(description) = self.description {
            stage.description = Some(description);
        }
        if let Some(stage_type) = self.stage_type {
            stage.stage_type = stage_type;
        }
        if let Some(assignment_type) = self.assignment_type {
            stage.assignment_type = assignment_type;
        }
        if let Some(assignee_id) = self.assignee_id {
            stage.assignee_id = Some(assignee_id);
        }
        if let Some(sla_hours) = self.sla_hours {
            stage.sla_hours = Some(sla_hours);
        }
        if let Some(form_schema) = self.form_schema {
            stage.form_schema = Some(form_schema);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_defaults() {
        let stage = Stage::new("Review", 2);
        assert_eq!(stage.order, 2);
        assert_eq!(stage.stage_type, StageType::Human);
        assert_eq!(stage.assignment_type, AssignmentType::Role);
        assert!(stage.conditional_routes.is_empty());
        assert!(stage.sla().is_none());
    }

    #[test]
    fn sla_hours_to_duration() {
        let mut stage = Stage::new("Triage", 0);
        stage.sla_hours = Some(4);
        assert_eq!(stage.sla(), Some(Duration::hours(4)));
    }

    #[test]
    fn blank_name_is_unnamed() {
        assert!(!Stage::new("   ", 0).is_named());
        assert!(Stage::new("Intake", 0).is_named());
    }

    #[test]
    fn enum_wire_tokens() {
        assert_eq!(serde_json::to_value(StageType::Ai).expect("serialize"), json!("ai"));
        assert_eq!(
            serde_json::to_value(AssignmentType::RoundRobin).expect("serialize"),
            json!("round_robin")
        );
    }

    #[test]
    fn assignment_requirements() {
        assert!(AssignmentType::User.requires_assignee());
        assert!(AssignmentType::Queue.requires_assignee());
        assert!(!AssignmentType::Role.requires_assignee());
        assert!(!AssignmentType::RoundRobin.requires_assignee());
        assert!(!AssignmentType::Automation.requires_assignee());
    }

    #[test]
    fn stage_deserializes_minimal_document() {
        let stage: Stage = serde_json::from_value(json!({
            "id": "intake",
            "name": "Intake",
            "order": 0,
            "stage_type": "approval",
            "assignment_type": "queue",
            "assignee_id": "support",
            "conditional_routes": [
                {"id": "r1", "next_stage_id": "done", "conditions": []}
            ]
        }))
        .expect("deserialize");

        assert_eq!(stage.stage_type, StageType::Approval);
        assert_eq!(stage.assignee_id.as_deref(), Some("support"));
        assert_eq!(stage.conditional_routes.len(), 1);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let mut stage = Stage::new("Draft", 0);
        StageUpdate {
            name: Some("Review".to_string()),
            stage_type: Some(StageType::Hybrid),
            ..StageUpdate::default()
        }
        .apply_to(&mut stage);

        assert_eq!(stage.name, "Review");
        assert_eq!(stage.stage_type, StageType::Hybrid);
        assert_eq!(stage.assignment_type, AssignmentType::Role);
    }

    #[test]
    fn update_clears_listed_fields() {
        let mut stage =
            Stage::new("Review", 0).with_assignment(AssignmentType::User, Some("ana".into()));
        stage.sla_hours = Some(24);

        let update: StageUpdate = serde_json::from_value(json!({
            "assignment_type": "role",
            "clear": ["assignee_id", "sla_hours"]
        }))
        .expect("deserialize");
        update.apply_to(&mut stage);

        assert_eq!(stage.assignment_type, AssignmentType::Role);
        assert_eq!(stage.assignee_id, None);
        assert_eq!(stage.sla_hours, None);
    }
}
