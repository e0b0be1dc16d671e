use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::eval::GeometryEngine;
use super::types::{ApplyOutcome, Constraint, ConstraintKind, SatisfactionStatus, ScopeStatus};
use super::ConstraintId;
use crate::entity::{Entity, EntityId, GeometryParams};
use crate::error::{ModelError, ModelResult};

/// Resolved entity snapshot the graph evaluates against: the workspace's
/// full lineage view, keyed by id.
pub type EntityView = HashMap<EntityId, Entity>;

/// Per-workspace constraint graph: nodes are entities, edges are
/// constraints. DOF accounting is done per connected component so the cost
/// of any check is proportional to the touched subgraph, never the whole
/// model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintGraph {
    // Vec keeps declaration order stable for reporting.
    constraints: Vec<Constraint>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn get(&self, id: &ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == *id)
    }

    /// The maximal set of entities reachable from `seeds` via shared
    /// constraints. Seeds are always part of their own component.
    pub fn component(&self, seeds: &[EntityId]) -> HashSet<EntityId> {
        let mut adjacency: HashMap<EntityId, Vec<usize>> = HashMap::new();
        for (i, c) in self.constraints.iter().enumerate() {
            for e in &c.entities {
                adjacency.entry(*e).or_default().push(i);
            }
        }

        let mut seen: HashSet<EntityId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<EntityId> = seeds.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            let Some(edges) = adjacency.get(&current) else {
                continue;
            };
            for idx in edges {
                for linked in &self.constraints[*idx].entities {
                    if seen.insert(*linked) {
                        queue.push_back(*linked);
                    }
                }
            }
        }
        seen
    }

    /// Remaining DOF of a component: entity budgets minus what the
    /// non-redundant constraints inside it remove.
    fn component_dof(&self, component: &HashSet<EntityId>, view: &EntityView) -> i32 {
        let total: i32 = component
            .iter()
            .filter_map(|id| view.get(id))
            .map(|e| e.params.dof_budget())
            .sum();
        let removed: i32 = self
            .constraints
            .iter()
            .filter(|c| c.status != SatisfactionStatus::Redundant)
            .filter(|c| c.entities.iter().any(|e| component.contains(e)))
            .map(|c| c.kind.dof_removed())
            .sum();
        total - removed
    }

    /// Add a constraint, atomically. On any rejection the graph is left
    /// byte-for-byte unchanged.
    pub fn apply(
        &mut self,
        kind: ConstraintKind,
        entities: Vec<EntityId>,
        tolerance: Option<f64>,
        view: &EntityView,
        engine: &dyn GeometryEngine,
    ) -> ModelResult<ApplyOutcome> {
        if entities.len() != kind.arity() {
            return Err(ModelError::InvalidConstraint(format!(
                "{} expects {} entities, got {}",
                kind.name(),
                kind.arity(),
                entities.len()
            )));
        }

        let mut params: Vec<&GeometryParams> = Vec::with_capacity(entities.len());
        for id in &entities {
            let entity = view.get(id).ok_or(ModelError::EntityNotFound(*id))?;
            params.push(&entity.params);
        }
        validate_kind(&kind, &params)?;

        let tolerance = tolerance.unwrap_or_else(|| kind.default_tolerance());

        // A near-duplicate of an already satisfied constraint removes no
        // additional freedom; store it as redundant rather than tripping a
        // false over-constraint.
        let duplicate = self.constraints.iter().any(|c| {
            same_entity_set(&c.entities, &entities)
                && c.status == SatisfactionStatus::Satisfied
                && c.kind.near_duplicate_of(&kind, tolerance)
        });
        if duplicate {
            let measurement = engine.evaluate(&kind, &params)?;
            let id = ConstraintId::new();
            let component = sorted(self.component(&entities));
            self.constraints.push(Constraint {
                id,
                kind,
                entities,
                tolerance,
                status: SatisfactionStatus::Redundant,
                expected: Some(measurement.expected),
                actual: Some(measurement.actual),
            });
            return Ok(ApplyOutcome {
                constraint_id: id,
                status: SatisfactionStatus::Redundant,
                dof_removed: 0,
                component,
            });
        }

        // Mutually exclusive targets on the same entity set are a conflict
        // no matter how much freedom the component still has.
        for existing in &self.constraints {
            if existing.status == SatisfactionStatus::Redundant {
                continue;
            }
            if !same_entity_set(&existing.entities, &entities) {
                continue;
            }
            if let Some(reason) = existing.kind.excludes(&kind, tolerance) {
                return Err(ModelError::ConstraintConflict {
                    reason,
                    dof_remaining: None,
                });
            }
        }

        let component = self.component(&entities);
        let remaining = self.component_dof(&component, view) - kind.dof_removed();
        if remaining < 0 {
            return Err(ModelError::ConstraintConflict {
                reason: format!(
                    "over-constrained: adding {} leaves a component of {} entities with {} DOF",
                    kind.name(),
                    component.len(),
                    remaining
                ),
                dof_remaining: Some(remaining),
            });
        }

        let measurement = engine.evaluate(&kind, &params)?;
        let status = if measurement.within(tolerance) {
            SatisfactionStatus::Satisfied
        } else {
            // violated-but-addable: the agent resolves it later
            SatisfactionStatus::Violated
        };

        let id = ConstraintId::new();
        let dof_removed = kind.dof_removed();
        self.constraints.push(Constraint {
            id,
            kind,
            entities,
            tolerance,
            status,
            expected: Some(measurement.expected),
            actual: Some(measurement.actual),
        });
        Ok(ApplyOutcome {
            constraint_id: id,
            status,
            dof_removed,
            component: sorted(component),
        })
    }

    /// Re-evaluate every constraint in the components containing `seeds`
    /// after entity parameters changed. Constraints outside those components
    /// are untouched: solving cost is proportional to component size.
    pub fn reevaluate_components(
        &mut self,
        seeds: &[EntityId],
        view: &EntityView,
        engine: &dyn GeometryEngine,
    ) -> ModelResult<usize> {
        let component = self.component(seeds);
        let mut touched = 0;
        for c in &mut self.constraints {
            if c.status == SatisfactionStatus::Redundant {
                continue;
            }
            if !c.entities.iter().any(|e| component.contains(e)) {
                continue;
            }
            let mut params: Vec<&GeometryParams> = Vec::with_capacity(c.entities.len());
            let mut missing = false;
            for id in &c.entities {
                match view.get(id) {
                    Some(e) => params.push(&e.params),
                    None => {
                        missing = true;
                        break;
                    }
                }
            }
            if missing {
                // referenced entity is gone; cascade removal happens at the
                // model layer, skip evaluation here
                continue;
            }
            // An edit can degenerate geometry a constraint depends on (a
            // zero-length line under a parallel constraint). The mutation is
            // already committed, so report the constraint violated instead of
            // failing the caller.
            let measurement = match engine.evaluate(&c.kind, &params) {
                Ok(m) => m,
                Err(ModelError::InvalidGeometry(_)) => {
                    c.actual = None;
                    c.status = SatisfactionStatus::Violated;
                    touched += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };
            c.expected = Some(measurement.expected);
            c.actual = Some(measurement.actual);
            c.status = if measurement.within(c.tolerance) {
                SatisfactionStatus::Satisfied
            } else {
                SatisfactionStatus::Violated
            };
            touched += 1;
        }
        Ok(touched)
    }

    /// Cascade: drop every constraint referencing the removed entity.
    pub fn remove_for_entity(&mut self, id: &EntityId) -> Vec<ConstraintId> {
        let mut removed = Vec::new();
        self.constraints.retain(|c| {
            if c.entities.contains(id) {
                removed.push(c.id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn remove(&mut self, id: &ConstraintId) -> bool {
        let before = self.constraints.len();
        self.constraints.retain(|c| c.id != *id);
        self.constraints.len() != before
    }

    /// Aggregate report. `scope` of None means the whole workspace;
    /// otherwise only constraints fully inside the scope set are counted,
    /// and remaining DOF is computed over the scope's entities.
    pub fn status(&self, scope: Option<&HashSet<EntityId>>, view: &EntityView) -> ScopeStatus {
        let in_scope = |c: &Constraint| match scope {
            Some(set) => c.entities.iter().all(|e| set.contains(e)),
            None => true,
        };

        let mut satisfied = 0;
        let mut violated = 0;
        let mut redundant = 0;
        let mut removed = 0;
        let mut constraints = Vec::new();
        for c in self.constraints.iter().filter(|c| in_scope(c)) {
            match c.status {
                SatisfactionStatus::Satisfied => satisfied += 1,
                SatisfactionStatus::Violated => violated += 1,
                SatisfactionStatus::Redundant => redundant += 1,
            }
            if c.status != SatisfactionStatus::Redundant {
                removed += c.kind.dof_removed();
            }
            constraints.push(c.clone());
        }

        let budget: i32 = match scope {
            Some(set) => set
                .iter()
                .filter_map(|id| view.get(id))
                .map(|e| e.params.dof_budget())
                .sum(),
            None => view.values().map(|e| e.params.dof_budget()).sum(),
        };

        ScopeStatus {
            satisfied,
            violated,
            redundant,
            dof_remaining: budget - removed,
            constraints,
        }
    }
}

fn same_entity_set(a: &[EntityId], b: &[EntityId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut sa: Vec<EntityId> = a.to_vec();
    let mut sb: Vec<EntityId> = b.to_vec();
    sa.sort();
    sb.sort();
    sa == sb
}

fn sorted(set: HashSet<EntityId>) -> Vec<EntityId> {
    let mut v: Vec<EntityId> = set.into_iter().collect();
    v.sort();
    v
}

fn validate_kind(kind: &ConstraintKind, params: &[&GeometryParams]) -> ModelResult<()> {
    for p in params {
        if !p.is_positional() {
            return Err(ModelError::InvalidConstraint(format!(
                "a {} cannot be referenced by a {} constraint",
                p.kind_name(),
                kind.name()
            )));
        }
    }
    match kind {
        ConstraintKind::Parallel | ConstraintKind::Perpendicular | ConstraintKind::Angle { .. } => {
            if params.iter().all(|p| p.is_line()) {
                Ok(())
            } else {
                Err(ModelError::InvalidConstraint(format!(
                    "{} requires two lines",
                    kind.name()
                )))
            }
        }
        ConstraintKind::Radius { .. } => {
            if params[0].is_curved() {
                Ok(())
            } else {
                Err(ModelError::InvalidConstraint(format!(
                    "radius requires a circle or arc, got a {}",
                    params[0].kind_name()
                )))
            }
        }
        ConstraintKind::Tangent => {
            let curved = params.iter().filter(|p| p.is_curved()).count();
            let lines = params.iter().filter(|p| p.is_line()).count();
            if curved == 2 || (curved == 1 && lines == 1) {
                Ok(())
            } else {
                Err(ModelError::InvalidConstraint(
                    "tangent requires a curved entity paired with a line or another curve"
                        .to_string(),
                ))
            }
        }
        ConstraintKind::Coincident | ConstraintKind::Distance { .. } => Ok(()),
    }
}
