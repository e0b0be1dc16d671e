use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod merge;
pub mod types;

pub use merge::{
    ConflictKind, ConflictResolution, MergeConflict, MergeOutcome, MergeStrategy, ResolutionOption,
};
pub use types::{BranchStatus, Workspace, WorkspaceStatus};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
