use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::EntityId;
use crate::workspace::merge::MergeConflict;

/// Errors that can occur during model operations.
///
/// Validation errors are returned structured at the call boundary; nothing
/// is retried inside the core. Conflict-shaped variants carry enough detail
/// for an automated caller to self-correct without parsing free text.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Bad constraint/entity combination (e.g. tangent with no curve).
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// Degenerate or non-finite entity parameters.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Over-constrained or mutually exclusive. Not retryable without
    /// changing the request.
    #[error("constraint conflict: {reason}")]
    ConstraintConflict {
        reason: String,
        dof_remaining: Option<i32>,
    },

    /// Merge conflicts; recoverable by resubmitting with explicit
    /// resolutions. The target workspace was left untouched.
    #[error("merge produced {} conflict(s)", conflicts.len())]
    WorkspaceConflict { conflicts: Vec<MergeConflict> },

    #[error("base workspace not found: {0}")]
    BaseNotFound(String),

    /// Workspace names resolve to ids at the transport boundary and key the
    /// merge lease, so they must stay unique.
    #[error("workspace name already in use: {0}")]
    DuplicateWorkspace(String),

    /// Retryable once the lease expires.
    #[error("resource {resource_type}/{resource_name} already locked by {holder}")]
    AlreadyLocked {
        resource_type: String,
        resource_name: String,
        holder: String,
        expires_at: DateTime<Utc>,
    },

    /// Fatal: signals a bug, not a user-correctable condition.
    #[error("internal solver error: {0}")]
    InternalSolverError(String),
}

impl ModelError {
    /// Stable machine-readable code for transport payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::EntityNotFound(_) => "entity_not_found",
            ModelError::InvalidConstraint(_) => "invalid_constraint",
            ModelError::InvalidGeometry(_) => "invalid_geometry",
            ModelError::ConstraintConflict { .. } => "constraint_conflict",
            ModelError::WorkspaceConflict { .. } => "workspace_conflict",
            ModelError::BaseNotFound(_) => "base_not_found",
            ModelError::DuplicateWorkspace(_) => "duplicate_workspace",
            ModelError::AlreadyLocked { .. } => "already_locked",
            ModelError::InternalSolverError(_) => "internal_solver_error",
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
