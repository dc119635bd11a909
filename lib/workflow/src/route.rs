//! Conditional routes between stages and first-match route selection.
//!
//! A stage owns an ordered list of routes. When the stage completes, routes
//! are tried in their authored order and the first one whose conditions all
//! hold decides the next stage. Authors rely on that order to express
//! priority: a specific route first, an unconditional fallback last.

use crate::condition::{Condition, SubmittedData};
use serde::{Deserialize, Serialize};
use std::fmt;
use waypoint_core::{RouteId, StageId};

/// A conditional edge from one stage to a later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRoute {
    /// Unique identifier for this route.
    pub id: RouteId,
    /// The stage a matching work item moves to.
    pub next_stage_id: StageId,
    /// Conditions combined with AND. Empty means unconditional.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConditionalRoute {
    /// Creates an unconditional route to `next_stage_id`.
    #[must_use]
    pub fn new(next_stage_id: StageId) -> Self {
        Self {
            id: RouteId::new(),
            next_stage_id,
            conditions: Vec::new(),
            description: None,
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns whether the route has no conditions.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns whether every condition holds for `data`.
    #[must_use]
    pub fn matches(&self, data: &SubmittedData) -> bool {
        self.conditions.iter().all(|condition| condition.evaluate(data))
    }
}

impl fmt::Display for ConditionalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "always -> {}", self.next_stage_id);
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{condition}")?;
        }
        write!(f, " -> {}", self.next_stage_id)
    }
}

/// A route identified by its owning stage, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRef {
    /// The stage that owns the route.
    pub stage_id: StageId,
    /// The route.
    pub route_id: RouteId,
    /// The route's target stage.
    pub next_stage_id: StageId,
}

impl RouteRef {
    /// Creates a reference to `route` owned by `stage_id`.
    #[must_use]
    pub fn new(stage_id: &StageId, route: &ConditionalRoute) -> Self {
        Self {
            stage_id: stage_id.clone(),
            route_id: route.id.clone(),
            next_stage_id: route.next_stage_id.clone(),
        }
    }
}

impl fmt::Display for RouteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.stage_id, self.route_id, self.next_stage_id)
    }
}

/// The outcome of routing a completed stage.
///
/// Serialized as `{"next_stage_id": ...}` or `{"complete": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransitionWire", into = "TransitionWire")]
pub enum Transition {
    /// Move the work item to this stage.
    Next(StageId),
    /// No route matched; the workflow completes at this stage.
    Complete,
}

impl Transition {
    /// Returns the next stage, if any.
    #[must_use]
    pub fn next_stage(&self) -> Option<&StageId> {
        match self {
            Self::Next(id) => Some(id),
            Self::Complete => None,
        }
    }

    /// Returns true if the workflow completes.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[derive(Serialize, Deserialize)]
struct TransitionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_stage_id: Option<StageId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    complete: bool,
}

impl TryFrom<TransitionWire> for Transition {
    type Error = &'static str;

    fn try_from(wire: TransitionWire) -> Result<Self, Self::Error> {
        match (wire.next_stage_id, wire.complete) {
            (Some(next), false) => Ok(Self::Next(next)),
            (None, true) => Ok(Self::Complete),
            (Some(_), true) => Err("transition cannot have a next stage and be complete"),
            (None, false) => Err("transition needs `next_stage_id` or `complete: true`"),
        }
    }
}

impl From<Transition> for TransitionWire {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Next(next) => Self {
                next_stage_id: Some(next),
                complete: false,
            },
            Transition::Complete => Self {
                next_stage_id: None,
                complete: true,
            },
        }
    }
}

/// Returns the first route whose conditions all hold for `data`.
#[must_use]
pub fn select_route<'a>(
    routes: &'a [ConditionalRoute],
    data: &SubmittedData,
) -> Option<&'a ConditionalRoute> {
    routes.iter().find(|route| {
        let matched = route.matches(data);
        tracing::trace!(route_id = %route.id, matched, "evaluated route");
        matched
    })
}

/// Picks the transition for a set of routes and submitted data.
#[must_use]
pub fn select_transition(routes: &[ConditionalRoute], data: &SubmittedData) -> Transition {
    match select_route(routes, data) {
        Some(route) => Transition::Next(route.next_stage_id.clone()),
        None => Transition::Complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use serde_json::{Value as JsonValue, json};

    fn record(value: JsonValue) -> SubmittedData {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn stage(name: &str) -> StageId {
        name.parse().expect("valid id")
    }

    #[test]
    fn no_routes_completes() {
        for data in [json!({}), json!({"urgency": "high"}), json!({"n": 1})] {
            assert_eq!(select_transition(&[], &record(data)), Transition::Complete);
        }
    }

    #[test]
    fn unconditional_route_always_matches() {
        let route = ConditionalRoute::new(stage("b"));
        assert!(route.is_unconditional());
        assert!(route.matches(&record(json!({}))));
        assert!(route.matches(&record(json!({"anything": [1, 2]}))));
    }

    #[test]
    fn first_matching_route_wins() {
        let routes = vec![
            ConditionalRoute::new(stage("first")),
            ConditionalRoute::new(stage("second")),
        ];
        let transition = select_transition(&routes, &record(json!({})));
        assert_eq!(transition, Transition::Next(stage("first")));
    }

    #[test]
    fn conditions_combine_with_and() {
        let route = ConditionalRoute::new(stage("b"))
            .with_condition(Condition::new("urgency", Operator::Eq, "high"))
            .with_condition(Condition::new("score", Operator::Gt, 5_i64));

        assert!(route.matches(&record(json!({"urgency": "high", "score": 9}))));
        assert!(!route.matches(&record(json!({"urgency": "high", "score": 2}))));
        assert!(!route.matches(&record(json!({"urgency": "high"}))));
    }

    #[test]
    fn falls_back_past_failing_route() {
        let routes = vec![
            ConditionalRoute::new(stage("b"))
                .with_condition(Condition::new("urgency", Operator::Eq, "high")),
            ConditionalRoute::new(stage("c")),
        ];
        assert_eq!(
            select_transition(&routes, &record(json!({"urgency": "low"}))),
            Transition::Next(stage("c"))
        );
    }

    #[test]
    fn no_match_completes() {
        let routes = vec![ConditionalRoute::new(stage("b")).with_condition(Condition::is_true("ok"))];
        let transition = select_transition(&routes, &record(json!({"ok": false})));
        assert!(transition.is_complete());
        assert_eq!(transition.next_stage(), None);
    }

    #[test]
    fn selection_is_deterministic() {
        let routes = vec![
            ConditionalRoute::new(stage("b"))
                .with_condition(Condition::new("amount", Operator::Gt, 100_i64)),
            ConditionalRoute::new(stage("c")),
        ];
        let data = record(json!({"amount": "250"}));
        let first = select_transition(&routes, &data);
        for _ in 0..10 {
            assert_eq!(select_transition(&routes, &data), first);
        }
    }

    #[test]
    fn transition_wire_shape() {
        assert_eq!(
            serde_json::to_value(Transition::Next(stage("b"))).expect("serialize"),
            json!({"next_stage_id": "b"})
        );
        assert_eq!(
            serde_json::to_value(Transition::Complete).expect("serialize"),
            json!({"complete": true})
        );
        let parsed: Transition =
            serde_json::from_value(json!({"complete": true})).expect("deserialize");
        assert!(parsed.is_complete());
        assert!(serde_json::from_value::<Transition>(json!({})).is_err());
    }

    #[test]
    fn display_joins_conditions() {
        let route = ConditionalRoute::new(stage("b"))
            .with_condition(Condition::new("urgency", Operator::Eq, "high"))
            .with_condition(Condition::is_true("vip"));
        assert_eq!(route.to_string(), "urgency == \"high\" AND vip is_true -> b");
        assert_eq!(ConditionalRoute::new(stage("c")).to_string(), "always -> c");
    }
}
