//! Run-time routing against an immutable workflow snapshot.
//!
//! The execution runtime submits an [`EvaluationRequest`] when a stage's
//! work item completes and receives an [`EvaluationResponse`]. Evaluation is
//! pure: the engine holds no mutable state and can be shared across threads.

use crate::condition::SubmittedData;
use crate::definition::Workflow;
use crate::error::RoutingError;
use crate::route::Transition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use waypoint_core::{Result, StageId};

/// The routing decision returned to the execution runtime.
pub type EvaluationResponse = Transition;

/// A completed stage and the data submitted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The stage whose work item completed.
    pub stage_id: StageId,
    /// Values submitted with the work item.
    #[serde(default)]
    pub submitted_data: SubmittedData,
}

impl EvaluationRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(stage_id: StageId, submitted_data: SubmittedData) -> Self {
        Self {
            stage_id,
            submitted_data,
        }
    }
}

/// Routes evaluation requests against a workflow snapshot.
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    workflow: Arc<Workflow>,
}

impl RoutingEngine {
    /// Creates an engine for a workflow that passes validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow has validation violations.
    pub fn new(workflow: impl Into<Arc<Workflow>>) -> Result<Self, RoutingError> {
        let workflow = workflow.into();
        if let Err(report) = workflow.validate() {
            warn!(workflow_id = %workflow.id, %report, "refusing to route invalid workflow");
            return Err(RoutingError::InvalidWorkflow {
                workflow_id: workflow.id.clone(),
                violations: report.len(),
            }
            .into());
        }
        Ok(Self { workflow })
    }

    /// Creates an engine without validating the workflow.
    ///
    /// Routing still never fails on bad data, but routes to missing or
    /// earlier stages are followed as written.
    #[must_use]
    pub fn unchecked(workflow: impl Into<Arc<Workflow>>) -> Self {
        Self {
            workflow: workflow.into(),
        }
    }

    /// Returns the workflow snapshot.
    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Decides where a completed stage's work item goes next.
    ///
    /// # Errors
    ///
    /// Returns an error if the request names a stage outside the workflow.
    #[instrument(skip(self, request), fields(workflow_id = %self.workflow.id, stage_id = %request.stage_id))]
    pub fn route(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, RoutingError> {
        let transition = self
            .workflow
            .next_transition(&request.stage_id, &request.submitted_data)?;
        match &transition {
            Transition::Next(next) => debug!(next_stage_id = %next, "routed to next stage"),
            Transition::Complete => debug!("no route matched, workflow complete"),
        }
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use crate::graph::{GraphMutation, MoveDirection};
    use serde_json::{Value as JsonValue, json};

    fn record(value: JsonValue) -> SubmittedData {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn approval_workflow() -> (Workflow, StageId, StageId) {
        let mut workflow = Workflow::new("Expenses");
        let submit = workflow.stages.entry().expect("entry").id.clone();
        let review = workflow.stages.add_stage("Manager review");
        let route = workflow.stages.add_route(&submit, &review).expect("route");
        workflow
            .stages
            .add_condition(&submit, &route, Condition::new("amount", Operator::Gt, 500_i64))
            .expect("condition");
        (workflow, submit, review)
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RoutingEngine>();
    }

    #[test]
    fn routes_request() {
        let (workflow, submit, review) = approval_workflow();
        let engine = RoutingEngine::new(workflow).expect("valid workflow");

        let over = EvaluationRequest::new(submit.clone(), record(json!({"amount": "900"})));
        let under = EvaluationRequest::new(submit, record(json!({"amount": 20})));

        assert_eq!(engine.route(&over).expect("route"), Transition::Next(review));
        assert_eq!(engine.route(&under).expect("route"), Transition::Complete);
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let (workflow, _, _) = approval_workflow();
        let engine = RoutingEngine::new(workflow).expect("valid workflow");
        let request = EvaluationRequest::new("ghost".parse().expect("id"), SubmittedData::new());

        let err = engine.route(&request).expect_err("unknown stage");
        assert!(err.to_string().contains("unknown stage: ghost"));
    }

    #[test]
    fn invalid_workflow_is_refused() {
        let (workflow, _, review) = approval_workflow();
        let moved = workflow
            .apply(GraphMutation::MoveStage {
                stage_id: review,
                direction: MoveDirection::Up,
            })
            .expect("move");

        let err = RoutingEngine::new(moved.clone()).expect_err("invalid");
        assert!(err.to_string().contains("cannot be executed"));

        let engine = RoutingEngine::unchecked(moved);
        assert_eq!(engine.workflow().stages.len(), 2);
    }

    #[test]
    fn request_wire_shape() {
        let request: EvaluationRequest = serde_json::from_value(json!({
            "stage_id": "stage_a",
            "submitted_data": {"urgency": "high"}
        }))
        .expect("deserialize");
        assert_eq!(request.stage_id.as_str(), "stage_a");
        assert_eq!(request.submitted_data["urgency"], json!("high"));

        let bare: EvaluationRequest =
            serde_json::from_value(json!({"stage_id": "stage_a"})).expect("deserialize");
        assert!(bare.submitted_data.is_empty());
    }

    #[test]
    fn shared_engine_routes_concurrently() {
        let (workflow, submit, review) = approval_workflow();
        let engine = Arc::new(RoutingEngine::new(workflow).expect("valid workflow"));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let request =
                    EvaluationRequest::new(submit.clone(), record(json!({"amount": 1000})));
                std::thread::spawn(move || engine.route(&request).expect("route"))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().expect("join"), Transition::Next(review.clone()));
        }
    }
}
