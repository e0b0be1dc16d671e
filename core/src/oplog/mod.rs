use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constraint::ConstraintId;
use crate::entity::{Entity, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateEntity,
    UpdateEntity,
    DeleteEntity,
    AddConstraint,
    RemoveConstraint,
    Merge,
}

/// One appended mutation. Before/after snapshots are complete entity states,
/// sufficient to reconstruct either side of the operation without replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub seq: u64,
    pub kind: OperationKind,
    pub agent: String,
    pub at: DateTime<Utc>,
    pub entities: Vec<EntityId>,
    pub constraint: Option<ConstraintId>,
    pub before: Vec<Entity>,
    pub after: Vec<Entity>,
}

/// Append-only per-workspace history. Seq numbers start at 1 and are never
/// reused, even after an undo pops the newest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    entries: Vec<Operation>,
    next_seq: u64,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        kind: OperationKind,
        agent: &str,
        entities: Vec<EntityId>,
        constraint: Option<ConstraintId>,
        before: Vec<Entity>,
        after: Vec<Entity>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Operation {
            seq,
            kind,
            agent: agent.to_string(),
            at: Utc::now(),
            entities,
            constraint,
            before,
            after,
        });
        seq
    }

    /// Seq of the newest entry, or 0 for an empty log.
    pub fn head_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Operation] {
        &self.entries
    }

    pub fn entries_after(&self, seq: u64) -> impl Iterator<Item = &Operation> {
        self.entries.iter().filter(move |op| op.seq > seq)
    }

    pub fn last(&self) -> Option<&Operation> {
        self.entries.last()
    }

    /// Remove and return the newest entry. Seq numbering is unaffected.
    pub fn pop_last(&mut self) -> Option<Operation> {
        self.entries.pop()
    }
}

/// Rewind a head-state entity view to the moment just after `seq` by
/// unapplying every later operation's snapshots, newest first.
pub fn rewind(view: &mut HashMap<EntityId, Entity>, log: &OperationLog, seq: u64) {
    for op in log.entries().iter().rev() {
        if op.seq <= seq {
            break;
        }
        for e in &op.after {
            view.remove(&e.id);
        }
        for e in &op.before {
            view.insert(e.id, e.clone());
        }
    }
}
