//! Workflow definition types.
//!
//! A workflow is the unit loaded from and persisted to storage. It consists of:
//! - Metadata (name, description, icon, category, timestamps)
//! - An ordered graph of stages and the routes between them
//! - The set of enabled trigger kinds
//!
//! Edits go through [`Workflow::apply`], which returns a new snapshot and
//! leaves the original untouched, so readers never see a half-applied edit.

use crate::condition::SubmittedData;
use crate::error::{GraphError, RoutingError, WorkflowError};
use crate::graph::{GraphMutation, StageGraph};
use crate::route::Transition;
use crate::stage::{Stage, StageStatus};
use crate::trigger::TriggerKind;
use crate::validation::{self, ValidationReport};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;
use waypoint_core::{StageId, WorkflowId};

/// Name given to the stage every new workflow starts with.
pub const INITIAL_STAGE_NAME: &str = "Start";

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    #[serde(default)]
    pub name: String,
    /// Description of what this workflow does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Icon shown in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Category for organization/filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Who created this workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// When this workflow was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            icon: None,
            category: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the creator.
    #[must_use]
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// Workflow metadata.
    #[serde(flatten)]
    pub metadata: WorkflowMetadata,
    /// The stages, ordered by `order`.
    pub stages: StageGraph,
    /// Enabled trigger kinds.
    #[serde(default)]
    pub triggers: BTreeSet<TriggerKind>,
}

impl Workflow {
    /// Creates a new workflow with the given name and a single initial stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(WorkflowId::new(), name)
    }

    /// Creates a workflow with a specific ID.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>) -> Self {
        let mut stages = StageGraph::new();
        stages.add_stage(INITIAL_STAGE_NAME);
        Self {
            id,
            metadata: WorkflowMetadata::new(name),
            stages,
            triggers: BTreeSet::from([TriggerKind::Manual]),
        }
    }

    /// Returns the workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns a stage by ID.
    #[must_use]
    pub fn stage(&self, stage_id: &StageId) -> Option<&Stage> {
        self.stages.get(stage_id)
    }

    /// Enables a trigger kind.
    pub fn enable_trigger(&mut self, kind: TriggerKind) {
        if self.triggers.insert(kind) {
            self.touch();
        }
    }

    /// Disables a trigger kind.
    pub fn disable_trigger(&mut self, kind: TriggerKind) {
        if self.triggers.remove(&kind) {
            self.touch();
        }
    }

    /// Applies a structural edit, returning the edited copy.
    ///
    /// `self` is never modified, so a snapshot shared with readers stays
    /// consistent. The copy's `updated_at` is bumped.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit is rejected by the stage graph.
    pub fn apply(&self, mutation: GraphMutation) -> Result<Self, Report<GraphError>> {
        let mut next = self.clone();
        next.stages.apply(mutation)?;
        next.touch();
        debug!(workflow_id = %self.id, stages = next.stages.len(), "applied graph mutation");
        Ok(next)
    }

    /// Applies several edits in order, stopping at the first rejected one.
    ///
    /// # Errors
    ///
    /// Returns the first rejected edit. No partial result is returned.
    pub fn apply_all(
        &self,
        mutations: impl IntoIterator<Item = GraphMutation>,
    ) -> Result<Self, Report<GraphError>> {
        let mut next = self.clone();
        for mutation in mutations {
            next.stages.apply(mutation)?;
        }
        next.touch();
        Ok(next)
    }

    /// Validates the workflow, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the full report if any violation was found.
    pub fn validate(&self) -> Result<(), ValidationReport> {
        validation::validate(&self.metadata.name, &self.stages).into_result()
    }

    /// Returns the structural status of a stage.
    #[must_use]
    pub fn stage_status(&self, stage_id: &StageId) -> Option<StageStatus> {
        self.stages.stage_status(stage_id)
    }

    /// Routes a completed stage's submitted data to the next stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is not part of this workflow.
    pub fn next_transition(
        &self,
        stage_id: &StageId,
        data: &SubmittedData,
    ) -> Result<Transition, Report<RoutingError>> {
        let stage = self
            .stages
            .get(stage_id)
            .ok_or_else(|| RoutingError::UnknownStage {
                stage_id: stage_id.clone(),
            })?;
        Ok(stage.next_transition(data))
    }

    /// Parses a workflow definition document.
    ///
    /// Stored condition values that hold structured literals are expanded
    /// once here. The result is not validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a workflow definition.
    pub fn from_json(document: &str) -> Result<Self, Report<WorkflowError>> {
        let mut workflow: Self =
            serde_json::from_str(document).map_err(|e| WorkflowError::Parse {
                reason: e.to_string(),
            })?;
        workflow.normalize_condition_values();
        Ok(workflow)
    }

    /// Serializes a valid workflow for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow has validation violations or cannot
    /// be serialized.
    pub fn to_json(&self) -> Result<String, Report<WorkflowError>> {
        self.persistable()?;
        serde_json::to_string(self).map_err(|e| {
            WorkflowError::Serialize {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Like [`Workflow::to_json`], pretty-printed.
    ///
    /// # Errors
    ///
    /// Same as [`Workflow::to_json`].
    pub fn to_json_pretty(&self) -> Result<String, Report<WorkflowError>> {
        self.persistable()?;
        serde_json::to_string_pretty(self).map_err(|e| {
            WorkflowError::Serialize {
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn persistable(&self) -> Result<(), Report<WorkflowError>> {
        self.validate()
            .map_err(|report| WorkflowError::Invalid { report })?;
        Ok(())
    }

    fn normalize_condition_values(&mut self) {
        for condition in self.stages.conditions_mut() {
            condition.normalize_value();
        }
    }

    /// Marks the workflow as updated (bumps updated_at timestamp).
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

/// Summary information about a workflow (for listings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Workflow ID.
    pub id: WorkflowId,
    /// Workflow name.
    pub name: String,
    /// Category, if any.
    pub category: Option<String>,
    /// Number of stages.
    pub stage_count: usize,
    /// Number of routes across all stages.
    pub route_count: usize,
    /// Enabled trigger kinds.
    pub triggers: BTreeSet<TriggerKind>,
    /// Last updated timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id.clone(),
            name: workflow.metadata.name.clone(),
            category: workflow.metadata.category.clone(),
            stage_count: workflow.stages.len(),
            route_count: workflow.stages.route_count(),
            triggers: workflow.triggers.clone(),
            updated_at: workflow.metadata.updated_at,
        }
    }
}
