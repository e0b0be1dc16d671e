use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod eval;
pub mod graph;
pub mod types;

pub use eval::{AnalyticEngine, GeometryEngine, Measurement};
pub use graph::{ConstraintGraph, EntityView};
pub use types::{ApplyOutcome, Constraint, ConstraintKind, SatisfactionStatus, ScopeStatus};

#[cfg(test)]
mod tests_apply;
#[cfg(test)]
mod tests_dof;

/// Identifier for a declared constraint, unique within its workspace graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub Uuid);

impl ConstraintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConstraintId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
