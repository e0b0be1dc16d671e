use serde::{Deserialize, Serialize};

use super::WorkspaceId;
use crate::constraint::ConstraintGraph;
use crate::entity::EntityTable;
use crate::oplog::OperationLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Clean,
    Modified,
    Merged,
}

/// An isolated branch of the model. Forking copies a reference to the base,
/// never the entities themselves: lookups walk the lineage (local table
/// first, then base on miss), and local edits are copy-on-write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub base: Option<WorkspaceId>,
    /// Last operation seq (in the base's log) shared with the base. Only
    /// advances forward; a merge resets it to the target's new head.
    pub divergence_point: u64,
    pub status: BranchStatus,
    pub entities: EntityTable,
    pub graph: ConstraintGraph,
    pub log: OperationLog,
}

impl Workspace {
    pub fn root(name: &str) -> Self {
        Self {
            id: WorkspaceId::new(),
            name: name.to_string(),
            base: None,
            divergence_point: 0,
            status: BranchStatus::Clean,
            entities: EntityTable::new(),
            graph: ConstraintGraph::new(),
            log: OperationLog::new(),
        }
    }

    pub fn fork(name: &str, base: &Workspace) -> Self {
        Self {
            id: WorkspaceId::new(),
            name: name.to_string(),
            base: Some(base.id),
            divergence_point: base.log.head_seq(),
            status: BranchStatus::Clean,
            entities: EntityTable::new(),
            // the fork starts from the base's declared constraints; anything
            // declared afterwards stays private to the declaring workspace
            graph: base.graph.clone(),
            log: OperationLog::new(),
        }
    }

    /// Every local mutation makes the branch modified again, including after
    /// a merge (a merged branch that keeps editing becomes mergeable anew).
    pub fn mark_modified(&mut self) {
        self.status = BranchStatus::Modified;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub branch_status: BranchStatus,
    pub can_merge: bool,
    pub divergence_point: u64,
    pub entity_count: usize,
    pub operation_count: usize,
}
