use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::constraint::{
    AnalyticEngine, ApplyOutcome, ConstraintId, ConstraintKind, GeometryEngine, ScopeStatus,
};
use crate::entity::{Entity, EntityId, GeometryParams};
use crate::error::{ModelError, ModelResult};
use crate::lock::{LockTable, ResourceLock};
use crate::oplog::{rewind, OperationKind};
use crate::workspace::merge::{self, MergeAction, MergeOutcome, MergeStrategy};
use crate::workspace::{BranchStatus, Workspace, WorkspaceId, WorkspaceStatus};

/// Lease TTL for the exclusive target-workspace lock a merge holds.
pub const MERGE_LOCK_TTL_SECS: i64 = 30;

/// Scope selector for constraint status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusScope {
    Workspace,
    Sketch(EntityId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceCreated {
    pub workspace_id: WorkspaceId,
    pub divergence_point: u64,
}

/// The shared model all agents edit through.
///
/// Every call takes an explicit workspace id; there is no process-wide
/// "current workspace". The model itself is synchronous and deterministic;
/// concurrency lives at the datastore boundary (callers wrap it in a lock).
pub struct Model {
    workspaces: HashMap<WorkspaceId, Workspace>,
    names: HashMap<String, WorkspaceId>,
    root: WorkspaceId,
    locks: LockTable,
    engine: Box<dyn GeometryEngine>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self::with_engine(Box::new(AnalyticEngine))
    }

    pub fn with_engine(engine: Box<dyn GeometryEngine>) -> Self {
        let root_ws = Workspace::root("main");
        let root = root_ws.id;
        let mut workspaces = HashMap::new();
        let mut names = HashMap::new();
        names.insert(root_ws.name.clone(), root);
        workspaces.insert(root, root_ws);
        Self {
            workspaces,
            names,
            root,
            locks: LockTable::new(),
            engine,
        }
    }

    /// The root ("main") workspace every branch ultimately descends from.
    pub fn root(&self) -> WorkspaceId {
        self.root
    }

    pub fn workspace_by_name(&self, name: &str) -> Option<WorkspaceId> {
        self.names.get(name).copied()
    }

    fn ws(&self, id: &WorkspaceId) -> ModelResult<&Workspace> {
        self.workspaces
            .get(id)
            .ok_or_else(|| ModelError::BaseNotFound(id.to_string()))
    }

    fn ws_mut(&mut self, id: &WorkspaceId) -> ModelResult<&mut Workspace> {
        self.workspaces
            .get_mut(id)
            .ok_or_else(|| ModelError::BaseNotFound(id.to_string()))
    }

    /// Lineage from the root down to `id`, in overlay order.
    fn lineage(&self, id: &WorkspaceId) -> ModelResult<Vec<&Workspace>> {
        let mut chain = Vec::new();
        let mut cursor = Some(*id);
        while let Some(ws_id) = cursor {
            let ws = self.ws(&ws_id)?;
            cursor = ws.base;
            chain.push(ws);
        }
        chain.reverse();
        Ok(chain)
    }

    /// The full entity view a workspace sees: base lineage overlaid with
    /// local copy-on-write versions, minus tombstoned ids.
    pub fn resolved_entities(&self, id: &WorkspaceId) -> ModelResult<HashMap<EntityId, Entity>> {
        let mut view = HashMap::new();
        for ws in self.lineage(id)? {
            for entity in ws.entities.iter() {
                view.insert(entity.id, entity.clone());
            }
            for tombstone in ws.entities.tombstones() {
                view.remove(tombstone);
            }
        }
        Ok(view)
    }

    /// Lineage lookup for one entity: local workspace first, then base on
    /// miss; a tombstone at any level shadows everything above it.
    pub fn get_entity(&self, ws_id: &WorkspaceId, id: &EntityId) -> ModelResult<Entity> {
        let mut cursor = Some(*ws_id);
        while let Some(current) = cursor {
            let ws = self.ws(&current)?;
            if let Some(entity) = ws.entities.get(id) {
                return Ok(entity.clone());
            }
            if ws.entities.is_tombstoned(id) {
                return Err(ModelError::EntityNotFound(*id));
            }
            cursor = ws.base;
        }
        Err(ModelError::EntityNotFound(*id))
    }

    // === entities ===

    pub fn create_entity(
        &mut self,
        ws_id: &WorkspaceId,
        params: GeometryParams,
        parent: Option<EntityId>,
        agent: &str,
    ) -> ModelResult<EntityId> {
        if !params.all_finite() {
            return Err(ModelError::InvalidGeometry(format!(
                "{} parameters must be finite",
                params.kind_name()
            )));
        }
        if let Some(parent_id) = parent {
            self.get_entity(ws_id, &parent_id)?;
        }

        let entity = Entity::new(params, agent, parent);
        let id = entity.id;
        let ws = self.ws_mut(ws_id)?;
        ws.entities.insert(entity.clone());
        ws.log.append(
            OperationKind::CreateEntity,
            agent,
            vec![id],
            None,
            vec![],
            vec![entity],
        );
        ws.mark_modified();
        Ok(id)
    }

    /// Versioned mutation: produces a new version, never an in-place
    /// overwrite of history. Only the changed entity's connected component
    /// is re-evaluated afterwards.
    pub fn update_entity(
        &mut self,
        ws_id: &WorkspaceId,
        id: &EntityId,
        params: GeometryParams,
        agent: &str,
    ) -> ModelResult<Entity> {
        if !params.all_finite() {
            return Err(ModelError::InvalidGeometry(format!(
                "{} parameters must be finite",
                params.kind_name()
            )));
        }
        let before = self.get_entity(ws_id, id)?;
        let mut after = before.clone();
        after.params = params;
        after.version += 1;
        after.modified_at = Utc::now();

        {
            let ws = self.ws_mut(ws_id)?;
            ws.entities.insert(after.clone());
            ws.log.append(
                OperationKind::UpdateEntity,
                agent,
                vec![*id],
                None,
                vec![before],
                vec![after.clone()],
            );
            ws.mark_modified();
        }

        let view = self.resolved_entities(ws_id)?;
        let engine = self.engine.as_ref();
        let ws = self
            .workspaces
            .get_mut(ws_id)
            .ok_or_else(|| ModelError::BaseNotFound(ws_id.to_string()))?;
        ws.graph.reevaluate_components(&[*id], &view, engine)?;
        Ok(after)
    }

    /// Delete an entity (tombstoning it for the lineage) and cascade-remove
    /// every constraint that references it.
    pub fn delete_entity(
        &mut self,
        ws_id: &WorkspaceId,
        id: &EntityId,
        agent: &str,
    ) -> ModelResult<Vec<ConstraintId>> {
        let before = self.get_entity(ws_id, id)?;
        let ws = self.ws_mut(ws_id)?;
        ws.entities.remove(id);
        let removed = ws.graph.remove_for_entity(id);
        ws.log.append(
            OperationKind::DeleteEntity,
            agent,
            vec![*id],
            None,
            vec![before],
            vec![],
        );
        ws.mark_modified();
        Ok(removed)
    }

    // === constraints ===

    pub fn apply_constraint(
        &mut self,
        ws_id: &WorkspaceId,
        kind: ConstraintKind,
        entities: Vec<EntityId>,
        tolerance: Option<f64>,
        agent: &str,
    ) -> ModelResult<ApplyOutcome> {
        let view = self.resolved_entities(ws_id)?;
        let engine = self.engine.as_ref();
        let ws = self
            .workspaces
            .get_mut(ws_id)
            .ok_or_else(|| ModelError::BaseNotFound(ws_id.to_string()))?;
        let outcome = ws
            .graph
            .apply(kind, entities.clone(), tolerance, &view, engine)?;
        ws.log.append(
            OperationKind::AddConstraint,
            agent,
            entities,
            Some(outcome.constraint_id),
            vec![],
            vec![],
        );
        ws.mark_modified();
        Ok(outcome)
    }

    pub fn constraint_status(
        &self,
        ws_id: &WorkspaceId,
        scope: StatusScope,
    ) -> ModelResult<ScopeStatus> {
        let view = self.resolved_entities(ws_id)?;
        let ws = self.ws(ws_id)?;
        let scope_set: Option<HashSet<EntityId>> = match scope {
            StatusScope::Workspace => None,
            StatusScope::Sketch(sketch_id) => {
                if !view.contains_key(&sketch_id) {
                    return Err(ModelError::EntityNotFound(sketch_id));
                }
                Some(
                    view.values()
                        .filter(|e| e.parent == Some(sketch_id))
                        .map(|e| e.id)
                        .collect(),
                )
            }
        };
        Ok(ws.graph.status(scope_set.as_ref(), &view))
    }

    // === workspaces ===

    pub fn create_workspace(
        &mut self,
        name: &str,
        base: &WorkspaceId,
    ) -> ModelResult<WorkspaceCreated> {
        if self.names.contains_key(name) {
            return Err(ModelError::DuplicateWorkspace(name.to_string()));
        }
        let base_ws = self
            .workspaces
            .get(base)
            .ok_or_else(|| ModelError::BaseNotFound(base.to_string()))?;
        let ws = Workspace::fork(name, base_ws);
        let created = WorkspaceCreated {
            workspace_id: ws.id,
            divergence_point: ws.divergence_point,
        };
        self.names.insert(name.to_string(), ws.id);
        self.workspaces.insert(ws.id, ws);
        Ok(created)
    }

    pub fn workspace_status(&self, ws_id: &WorkspaceId) -> ModelResult<WorkspaceStatus> {
        let ws = self.ws(ws_id)?;
        let base_alive = ws
            .base
            .map(|b| self.workspaces.contains_key(&b))
            .unwrap_or(false);
        let entity_count = self.resolved_entities(ws_id)?.len();
        Ok(WorkspaceStatus {
            workspace_id: ws.id,
            name: ws.name.clone(),
            branch_status: ws.status,
            can_merge: base_alive && ws.status != BranchStatus::Merged,
            divergence_point: ws.divergence_point,
            entity_count,
            operation_count: ws.log.len(),
        })
    }

    /// Three-way merge of `source` into its base `target`.
    ///
    /// Atomic: either the conflict list is empty and the target reflects
    /// every add/modify/delete, or the target is left byte-for-byte
    /// unchanged and `WorkspaceConflict` carries the full conflict list.
    /// The target workspace is held under an exclusive lease for the whole
    /// transaction.
    pub fn merge(
        &mut self,
        source_id: &WorkspaceId,
        target_id: &WorkspaceId,
        strategy: &MergeStrategy,
        agent: &str,
    ) -> ModelResult<MergeOutcome> {
        let (divergence_point, target_name) = {
            let source = self.ws(source_id)?;
            let target = self
                .workspaces
                .get(target_id)
                .ok_or_else(|| ModelError::BaseNotFound(target_id.to_string()))?;
            if source.base != Some(*target_id) {
                return Err(ModelError::BaseNotFound(format!(
                    "{} is not the base of {}",
                    target.name, source.name
                )));
            }
            (source.divergence_point, target.name.clone())
        };

        self.locks.acquire(
            "workspace",
            &target_name,
            agent,
            &source_id.to_string(),
            Duration::seconds(MERGE_LOCK_TTL_SECS),
        )?;
        let result = self.merge_locked(source_id, target_id, strategy, agent, divergence_point);
        self.locks.release("workspace", &target_name, agent);
        result
    }

    fn merge_locked(
        &mut self,
        source_id: &WorkspaceId,
        target_id: &WorkspaceId,
        strategy: &MergeStrategy,
        agent: &str,
        divergence_point: u64,
    ) -> ModelResult<MergeOutcome> {
        let source_head = self.resolved_entities(source_id)?;
        let target_head = self.resolved_entities(target_id)?;

        let mut base = target_head.clone();
        rewind(&mut base, &self.ws(target_id)?.log, divergence_point);

        let source_changed: HashSet<EntityId> = self
            .ws(source_id)?
            .log
            .entries()
            .iter()
            .flat_map(|op| op.entities.iter().copied())
            .collect();
        let target_changed: HashSet<EntityId> = self
            .ws(target_id)?
            .log
            .entries_after(divergence_point)
            .flat_map(|op| op.entities.iter().copied())
            .collect();

        let plan = merge::plan(
            &base,
            &source_head,
            &target_head,
            &source_changed,
            &target_changed,
            strategy,
        );
        if !plan.conflicts.is_empty() {
            // abort entirely: a partial merge would leave the constraint
            // graph in an unverifiable state
            return Err(ModelError::WorkspaceConflict {
                conflicts: plan.conflicts,
            });
        }

        let now = Utc::now();
        let mut touched: Vec<EntityId> = Vec::with_capacity(plan.actions.len());
        {
            let target = self.ws_mut(target_id)?;
            let mut before = Vec::new();
            let mut after = Vec::new();
            for action in &plan.actions {
                let id = action.entity_id();
                touched.push(id);
                match action {
                    MergeAction::Add(entity) => {
                        after.push(entity.clone());
                        target.entities.insert(entity.clone());
                    }
                    MergeAction::Modify(entity) => {
                        if let Some(prev) = target_head.get(&id) {
                            before.push(prev.clone());
                        }
                        let mut merged = entity.clone();
                        merged.version += 1;
                        merged.modified_at = now;
                        after.push(merged.clone());
                        target.entities.insert(merged);
                    }
                    MergeAction::Delete(id) => {
                        if let Some(prev) = target_head.get(id) {
                            before.push(prev.clone());
                        }
                        target.entities.remove(id);
                        target.graph.remove_for_entity(id);
                    }
                }
            }
            if !plan.actions.is_empty() {
                target.log.append(
                    OperationKind::Merge,
                    agent,
                    touched.clone(),
                    None,
                    before,
                    after,
                );
                target.mark_modified();
            }
        }

        // a merge can flip previously satisfied constraints to violated:
        // two branches' edits compound, so re-check every affected component
        if !touched.is_empty() {
            let view = self.resolved_entities(target_id)?;
            let engine = self.engine.as_ref();
            let target = self
                .workspaces
                .get_mut(target_id)
                .ok_or_else(|| ModelError::BaseNotFound(target_id.to_string()))?;
            target.graph.reevaluate_components(&touched, &view, engine)?;
        }

        let head = self.ws(target_id)?.log.head_seq();
        let source = self.ws_mut(source_id)?;
        source.divergence_point = head;
        source.status = BranchStatus::Merged;
        Ok(MergeOutcome::from_plan(&plan))
    }

    // === operation log ===

    /// Best-effort undo of the newest local operation: restores the entry's
    /// before-snapshots. Not guaranteed to restore constraint satisfaction
    /// if later operations depended on the undone state; affected components
    /// are re-evaluated so the reported status stays honest.
    pub fn undo(&mut self, ws_id: &WorkspaceId) -> ModelResult<Option<u64>> {
        let op = {
            let ws = self.ws_mut(ws_id)?;
            let Some(op) = ws.log.pop_last() else {
                return Ok(None);
            };
            for entity in &op.after {
                ws.entities.remove(&entity.id);
            }
            for entity in &op.before {
                ws.entities.insert(entity.clone());
            }
            if op.kind == OperationKind::AddConstraint {
                if let Some(constraint_id) = op.constraint {
                    ws.graph.remove(&constraint_id);
                }
            }
            op
        };

        if !op.entities.is_empty() {
            let view = self.resolved_entities(ws_id)?;
            let engine = self.engine.as_ref();
            let ws = self
                .workspaces
                .get_mut(ws_id)
                .ok_or_else(|| ModelError::BaseNotFound(ws_id.to_string()))?;
            ws.graph.reevaluate_components(&op.entities, &view, engine)?;
        }
        Ok(Some(op.seq))
    }

    // === coordination ===

    pub fn acquire_lock(
        &mut self,
        resource_type: &str,
        resource_name: &str,
        holder: &str,
        session: &str,
        ttl_secs: i64,
    ) -> ModelResult<ResourceLock> {
        self.locks.acquire(
            resource_type,
            resource_name,
            holder,
            session,
            Duration::seconds(ttl_secs),
        )
    }

    pub fn release_lock(&mut self, resource_type: &str, resource_name: &str, holder: &str) {
        self.locks.release(resource_type, resource_name, holder)
    }
}
