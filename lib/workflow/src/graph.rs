//! The editable stage graph.
//!
//! Stages are kept in a vector sorted by `order`, and after every structural
//! edit the orders are renumbered to `0..N-1`. Routes live on their owning
//! stage and reference their target by ID, so edits here are responsible
//! for keeping those references valid:
//! - Deleting a stage removes every route that targets it
//! - Adding a route requires a target strictly after the source
//! - Moving a stage reports routes the swap turned backward
//!
//! Routing edges are projected onto a petgraph `DiGraph` for cycle
//! detection and reachability.

use crate::condition::Condition;
use crate::error::GraphError;
use crate::route::{ConditionalRoute, RouteRef};
use crate::stage::{Stage, StageStatus, StageUpdate};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use waypoint_core::{RouteId, StageId};

/// Direction for [`StageGraph::move_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    /// Towards order 0.
    Up,
    /// Towards the last stage.
    Down,
}

/// A single structural edit, applied with [`StageGraph::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GraphMutation {
    /// Append a new stage with no routes.
    AddStage { name: String },
    /// Swap a stage with its neighbour.
    MoveStage {
        stage_id: StageId,
        direction: MoveDirection,
    },
    /// Remove a stage and every route targeting it.
    DeleteStage { stage_id: StageId },
    /// Change a stage's descriptive fields.
    UpdateStage {
        stage_id: StageId,
        update: StageUpdate,
    },
    /// Add an unconditional route between two stages.
    AddRoute { from: StageId, to: StageId },
    /// Remove a route from a stage.
    RemoveRoute { stage_id: StageId, route_id: RouteId },
    /// Append a condition to a route.
    AddCondition {
        stage_id: StageId,
        route_id: RouteId,
        condition: Condition,
    },
    /// Replace the condition at `index` on a route.
    ReplaceCondition {
        stage_id: StageId,
        route_id: RouteId,
        index: usize,
        condition: Condition,
    },
    /// Remove the condition at `index` from a route.
    RemoveCondition {
        stage_id: StageId,
        route_id: RouteId,
        index: usize,
    },
    /// Remove every route that does not point forward.
    PruneBackwardRoutes,
}

/// The ordered stages of a workflow and the routes between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Stage>", into = "Vec<Stage>")]
pub struct StageGraph {
    stages: Vec<Stage>,
}

impl StageGraph {
    /// Creates an empty stage graph.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the total number of routes across all stages.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.stages.iter().map(|s| s.conditional_routes.len()).sum()
    }

    /// Returns the entry stage (lowest order).
    #[must_use]
    pub fn entry(&self) -> Option<&Stage> {
        self.stages.first()
    }

    /// Returns a stage by ID.
    #[must_use]
    pub fn get(&self, stage_id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| &s.id == stage_id)
    }

    /// Returns true if a stage with this ID exists.
    #[must_use]
    pub fn contains(&self, stage_id: &StageId) -> bool {
        self.get(stage_id).is_some()
    }

    fn position(&self, stage_id: &StageId) -> Result<usize, GraphError> {
        self.stages
            .iter()
            .position(|s| &s.id == stage_id)
            .ok_or_else(|| GraphError::StageNotFound {
                stage_id: stage_id.clone(),
            })
    }

    fn stage_mut(&mut self, stage_id: &StageId) -> Result<&mut Stage, GraphError> {
        let index = self.position(stage_id)?;
        Ok(&mut self.stages[index])
    }

    fn route_mut(
        &mut self,
        stage_id: &StageId,
        route_id: &RouteId,
    ) -> Result<&mut ConditionalRoute, GraphError> {
        let stage = self.stage_mut(stage_id)?;
        stage
            .route_mut(route_id)
            .ok_or_else(|| GraphError::RouteNotFound {
                stage_id: stage_id.clone(),
                route_id: route_id.clone(),
            })
    }

    /// Appends a new, unrouted stage and returns its ID.
    pub fn add_stage(&mut self, name: impl Into<String>) -> StageId {
        self.push(Stage::new(name, 0))
    }

    /// Appends an existing stage, assigning it the next order.
    ///
    /// Existing stages are renumbered to `0..N-1` first. Routes already on
    /// the stage are kept as-is and are subject to validation like any
    /// other route.
    pub fn push(&mut self, mut stage: Stage) -> StageId {
        self.renormalize();
        stage.order = order_at(self.stages.len());
        let stage_id = stage.id.clone();
        debug!(stage_id = %stage_id, order = stage.order, "stage added");
        self.stages.push(stage);
        stage_id
    }

    /// Swaps a stage with its neighbour in `direction`.
    ///
    /// Moving the first stage up or the last stage down does nothing. The
    /// returned routes touch one of the two swapped stages and no longer
    /// point forward; they are left in place so validation can flag them
    /// (see [`StageGraph::prune_backward_routes`] to repair).
    ///
    /// # Errors
    ///
    /// Returns an error if the stage does not exist.
    pub fn move_stage(
        &mut self,
        stage_id: &StageId,
        direction: MoveDirection,
    ) -> Result<Vec<RouteRef>, GraphError> {
        self.position(stage_id)?;
        self.renormalize();
        let index = self.position(stage_id)?;
        let neighbour = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.stages.len() => index + 1,
            _ => return Ok(Vec::new()),
        };

        let moved_order = self.stages[index].order;
        self.stages[index].order = self.stages[neighbour].order;
        self.stages[neighbour].order = moved_order;
        self.renormalize();

        let touched: HashSet<&StageId> =
            [&self.stages[index].id, &self.stages[neighbour].id].into_iter().collect();
        let invalidated: Vec<RouteRef> = self
            .backward_routes()
            .into_iter()
            .filter(|r| touched.contains(&r.stage_id) || touched.contains(&r.next_stage_id))
            .collect();

        debug!(stage_id = %stage_id, ?direction, "stage moved");
        if !invalidated.is_empty() {
            warn!(
                stage_id = %stage_id,
                count = invalidated.len(),
                "stage move left routes pointing backward"
            );
        }
        Ok(invalidated)
    }

    /// Deletes a stage and every route that targets it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage does not exist or is the only stage.
    pub fn delete_stage(&mut self, stage_id: &StageId) -> Result<Stage, GraphError> {
        let index = self.position(stage_id)?;
        if self.stages.len() == 1 {
            return Err(GraphError::LastStage {
                stage_id: stage_id.clone(),
            });
        }

        let removed = self.stages.remove(index);
        let mut cascaded = 0;
        for stage in &mut self.stages {
            let before = stage.conditional_routes.len();
            stage
                .conditional_routes
                .retain(|route| &route.next_stage_id != stage_id);
            cascaded += before - stage.conditional_routes.len();
        }
        self.renormalize();

        debug!(stage_id = %stage_id, cascaded, "stage deleted");
        Ok(removed)
    }

    /// Updates a stage's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage does not exist.
    pub fn update_stage(&mut self, stage_id: &StageId, update: StageUpdate) -> Result<(), GraphError> {
        update.apply_to(self.stage_mut(stage_id)?);
        Ok(())
    }

    /// Returns the stages a route from `from` may target.
    #[must_use]
    pub fn route_candidates(&self, from: &StageId) -> Vec<&Stage> {
        let Some(source) = self.get(from) else {
            return Vec::new();
        };
        self.stages.iter().filter(|s| s.order > source.order).collect()
    }

    /// Adds an unconditional route from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if either stage is missing or `to` is not strictly
    /// after `from`.
    pub fn add_route(&mut self, from: &StageId, to: &StageId) -> Result<RouteId, GraphError> {
        self.insert_route(from, ConditionalRoute::new(to.clone()))
    }

    /// Appends a prepared route to `from`, checking its target.
    ///
    /// # Errors
    ///
    /// Returns an error if either stage is missing or the route target is
    /// not strictly after `from`.
    pub fn insert_route(
        &mut self,
        from: &StageId,
        route: ConditionalRoute,
    ) -> Result<RouteId, GraphError> {
        let source = &self.stages[self.position(from)?];
        let target = &self.stages[self.position(&route.next_stage_id)?];
        if target.order <= source.order {
            return Err(GraphError::BackwardRoute {
                from: source.id.clone(),
                from_order: source.order,
                to: target.id.clone(),
                to_order: target.order,
            });
        }

        let route_id = route.id.clone();
        debug!(from = %from, to = %route.next_stage_id, route_id = %route_id, "route added");
        self.stage_mut(from)?.conditional_routes.push(route);
        Ok(route_id)
    }

    /// Removes a route from a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage or route does not exist.
    pub fn remove_route(
        &mut self,
        stage_id: &StageId,
        route_id: &RouteId,
    ) -> Result<ConditionalRoute, GraphError> {
        let stage = self.stage_mut(stage_id)?;
        let index = stage
            .conditional_routes
            .iter()
            .position(|r| &r.id == route_id)
            .ok_or_else(|| GraphError::RouteNotFound {
                stage_id: stage_id.clone(),
                route_id: route_id.clone(),
            })?;
        debug!(stage_id = %stage_id, route_id = %route_id, "route removed");
        Ok(stage.conditional_routes.remove(index))
    }

    /// Appends a condition to a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage or route does not exist.
    pub fn add_condition(
        &mut self,
        stage_id: &StageId,
        route_id: &RouteId,
        condition: Condition,
    ) -> Result<(), GraphError> {
        self.route_mut(stage_id, route_id)?.conditions.push(condition);
        Ok(())
    }

    /// Replaces the condition at `index` on a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage, route or condition does not exist.
    pub fn replace_condition(
        &mut self,
        stage_id: &StageId,
        route_id: &RouteId,
        index: usize,
        condition: Condition,
    ) -> Result<Condition, GraphError> {
        let route = self.route_mut(stage_id, route_id)?;
        let slot = route
            .conditions
            .get_mut(index)
            .ok_or_else(|| GraphError::ConditionNotFound {
                route_id: route_id.clone(),
                index,
            })?;
        Ok(std::mem::replace(slot, condition))
    }

    /// Removes the condition at `index` from a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage, route or condition does not exist.
    pub fn remove_condition(
        &mut self,
        stage_id: &StageId,
        route_id: &RouteId,
        index: usize,
    ) -> Result<Condition, GraphError> {
        let route = self.route_mut(stage_id, route_id)?;
        if index >= route.conditions.len() {
            return Err(GraphError::ConditionNotFound {
                route_id: route_id.clone(),
                index,
            });
        }
        Ok(route.conditions.remove(index))
    }

    /// Returns routes whose target exists but is not after their owner.
    #[must_use]
    pub fn backward_routes(&self) -> Vec<RouteRef> {
        let orders = self.order_index();
        self.all_routes()
            .filter(|(stage, route)| {
                orders
                    .get(&route.next_stage_id)
                    .is_some_and(|&target| target <= stage.order)
            })
            .map(|(stage, route)| RouteRef::new(&stage.id, route))
            .collect()
    }

    /// Returns routes whose target stage does not exist.
    #[must_use]
    pub fn dangling_routes(&self) -> Vec<RouteRef> {
        let orders = self.order_index();
        self.all_routes()
            .filter(|(_, route)| !orders.contains_key(&route.next_stage_id))
            .map(|(stage, route)| RouteRef::new(&stage.id, route))
            .collect()
    }

    /// Removes every backward route and returns what was removed.
    pub fn prune_backward_routes(&mut self) -> Vec<RouteRef> {
        let backward = self.backward_routes();
        let doomed: HashSet<&RouteId> = backward.iter().map(|r| &r.route_id).collect();
        for stage in &mut self.stages {
            stage
                .conditional_routes
                .retain(|route| !doomed.contains(&route.id));
        }
        if !backward.is_empty() {
            debug!(count = backward.len(), "pruned backward routes");
        }
        backward
    }

    /// Applies a single mutation in place.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying edit. A failed edit leaves the
    /// graph unchanged.
    pub fn apply(&mut self, mutation: GraphMutation) -> Result<(), GraphError> {
        match mutation {
            GraphMutation::AddStage { name } => {
                self.add_stage(name);
            }
            GraphMutation::MoveStage {
                stage_id,
                direction,
            } => {
                self.move_stage(&stage_id, direction)?;
            }
            GraphMutation::DeleteStage { stage_id } => {
                self.delete_stage(&stage_id)?;
            }
            GraphMutation::UpdateStage { stage_id, update } => {
                self.update_stage(&stage_id, update)?;
            }
            GraphMutation::AddRoute { from, to } => {
                self.add_route(&from, &to)?;
            }
            GraphMutation::RemoveRoute { stage_id, route_id } => {
                self.remove_route(&stage_id, &route_id)?;
            }
            GraphMutation::AddCondition {
                stage_id,
                route_id,
                condition,
            } => self.add_condition(&stage_id, &route_id, condition)?,
            GraphMutation::ReplaceCondition {
                stage_id,
                route_id,
                index,
                condition,
            } => {
                self.replace_condition(&stage_id, &route_id, index, condition)?;
            }
            GraphMutation::RemoveCondition {
                stage_id,
                route_id,
                index,
            } => {
                self.remove_condition(&stage_id, &route_id, index)?;
            }
            GraphMutation::PruneBackwardRoutes => {
                self.prune_backward_routes();
            }
        }
        Ok(())
    }

    /// Returns the structural status of a stage.
    #[must_use]
    pub fn stage_status(&self, stage_id: &StageId) -> Option<StageStatus> {
        let stage = self.get(stage_id)?;
        let orders = self.order_index();
        let broken = stage.conditional_routes.iter().any(|route| {
            orders
                .get(&route.next_stage_id)
                .is_none_or(|&target| target <= stage.order)
        });
        if broken {
            return Some(StageStatus::Invalid);
        }
        if !stage.is_named() || !self.reachable_from_entry().contains(stage_id) {
            return Some(StageStatus::Draft);
        }
        Some(StageStatus::Valid)
    }

    /// Returns the stages reachable from the entry stage over forward routes.
    #[must_use]
    pub fn reachable_from_entry(&self) -> HashSet<StageId> {
        let (graph, indices) = self.routing_graph(true);
        let Some(entry) = self.entry().and_then(|s| indices.get(&s.id)) else {
            return HashSet::new();
        };

        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, *entry);
        while let Some(index) = dfs.next(&graph) {
            reachable.insert(graph[index].clone());
        }
        reachable
    }

    /// Returns true if the routes between existing stages form a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let (graph, _) = self.routing_graph(false);
        petgraph::algo::is_cyclic_directed(&graph)
    }

    /// Projects routes between existing stages onto a directed graph.
    ///
    /// With `forward_only`, backward routes are left out.
    fn routing_graph(
        &self,
        forward_only: bool,
    ) -> (DiGraph<StageId, RouteId>, HashMap<StageId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for stage in &self.stages {
            indices.insert(stage.id.clone(), graph.add_node(stage.id.clone()));
        }

        let orders = self.order_index();
        for (stage, route) in self.all_routes() {
            let (Some(&source), Some(&target)) =
                (indices.get(&stage.id), indices.get(&route.next_stage_id))
            else {
                continue;
            };
            if forward_only && orders[&route.next_stage_id] <= stage.order {
                continue;
            }
            graph.add_edge(source, target, route.id.clone());
        }
        (graph, indices)
    }

    fn all_routes(&self) -> impl Iterator<Item = (&Stage, &ConditionalRoute)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.conditional_routes.iter().map(move |route| (stage, route)))
    }

    fn order_index(&self) -> HashMap<&StageId, u32> {
        self.stages.iter().map(|s| (&s.id, s.order)).collect()
    }

    /// Sorts stages by order and renumbers them `0..N-1`.
    pub fn renormalize(&mut self) {
        self.stages.sort_by_key(|s| s.order);
        for index in 0..self.stages.len() {
            self.stages[index].order = order_at(index);
        }
    }

    pub(crate) fn conditions_mut(&mut self) -> impl Iterator<Item = &mut Condition> {
        self.stages.iter_mut().flat_map(|stage| {
            stage
                .conditional_routes
                .iter_mut()
                .flat_map(|route| route.conditions.iter_mut())
        })
    }
}

fn order_at(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

impl From<Vec<Stage>> for StageGraph {
    /// Sorts stages by their stored order without renumbering, so that
    /// validation sees orders exactly as they were persisted.
    fn from(mut stages: Vec<Stage>) -> Self {
        stages.sort_by_key(|s| s.order);
        Self { stages }
    }
}

impl From<StageGraph> for Vec<Stage> {
    fn from(graph: StageGraph) -> Self {
        graph.stages
    }
}
