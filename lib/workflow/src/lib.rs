//! Stage routing model for waypoint workflows.
//!
//! This crate decides where a work item goes when a workflow stage completes,
//! and keeps the stage graph that drives that decision structurally sound:
//!
//! - **Values**: Typed condition values with total structured-literal parsing
//! - **Comparison**: Type-aware equality, ordering and membership checks
//! - **Conditions**: Field/operator/value tests against submitted data
//! - **Routes**: Ordered, first-match route selection with AND semantics
//! - **Stage Graph**: Editing operations that keep orders contiguous and routes forward-pointing
//! - **Validation**: Every design-time violation collected in one report
//! - **Routing Engine**: Validated, shareable evaluation of routing requests

pub mod compare;
pub mod condition;
pub mod definition;
pub mod error;
pub mod graph;
pub mod route;
pub mod routing;
pub mod stage;
pub mod trigger;
pub mod validation;
pub mod value;

pub use condition::{Condition, Operator, SubmittedData};
pub use definition::{Workflow, WorkflowMetadata, WorkflowSummary};
pub use error::{GraphError, RoutingError, WorkflowError};
pub use graph::{GraphMutation, MoveDirection, StageGraph};
pub use route::{ConditionalRoute, RouteRef, Transition};
pub use routing::{EvaluationRequest, EvaluationResponse, RoutingEngine};
pub use stage::{AssignmentType, ClearableField, Stage, StageStatus, StageType, StageUpdate};
pub use trigger::TriggerKind;
pub use validation::{ValidationReport, Violation};
pub use value::ConditionValue;
