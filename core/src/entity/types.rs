use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

/// Geometric parameters for every entity kind the model tracks.
///
/// Sketch members (points, lines, circles, arcs) carry 2D coordinates in
/// their sketch plane. Sketches and solids are containers: their exact
/// shape lives in the external geometry kernel, the model only keeps the
/// parameters needed for identity and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryParams {
    Point { pos: [f64; 2] },
    Line { start: [f64; 2], end: [f64; 2] },
    Circle { center: [f64; 2], radius: f64 },
    Arc { center: [f64; 2], radius: f64, start_angle: f64, end_angle: f64 },
    Sketch { origin: [f64; 3], normal: [f64; 3] },
    Solid { height: f64 },
}

impl GeometryParams {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GeometryParams::Point { .. } => "point",
            GeometryParams::Line { .. } => "line",
            GeometryParams::Circle { .. } => "circle",
            GeometryParams::Arc { .. } => "arc",
            GeometryParams::Sketch { .. } => "sketch",
            GeometryParams::Solid { .. } => "solid",
        }
    }

    /// DOF budget per entity kind. Containers contribute nothing: their
    /// members are constrained individually.
    pub fn dof_budget(&self) -> i32 {
        match self {
            GeometryParams::Point { .. } => 2,  // x, y
            GeometryParams::Line { .. } => 4,   // start_x, start_y, end_x, end_y
            GeometryParams::Circle { .. } => 3, // center_x, center_y, radius
            GeometryParams::Arc { .. } => 5,    // center_x, center_y, radius, start_angle, end_angle
            GeometryParams::Sketch { .. } | GeometryParams::Solid { .. } => 0,
        }
    }

    pub fn is_curved(&self) -> bool {
        matches!(self, GeometryParams::Circle { .. } | GeometryParams::Arc { .. })
    }

    pub fn is_line(&self) -> bool {
        matches!(self, GeometryParams::Line { .. })
    }

    /// Entities that occupy a position in sketch space and can be
    /// referenced by constraints.
    pub fn is_positional(&self) -> bool {
        !matches!(self, GeometryParams::Sketch { .. } | GeometryParams::Solid { .. })
    }

    fn numeric_values(&self) -> Vec<f64> {
        match self {
            GeometryParams::Point { pos } => pos.to_vec(),
            GeometryParams::Line { start, end } => vec![start[0], start[1], end[0], end[1]],
            GeometryParams::Circle { center, radius } => vec![center[0], center[1], *radius],
            GeometryParams::Arc { center, radius, start_angle, end_angle } => {
                vec![center[0], center[1], *radius, *start_angle, *end_angle]
            }
            GeometryParams::Sketch { origin, normal } => {
                let mut v = origin.to_vec();
                v.extend_from_slice(normal);
                v
            }
            GeometryParams::Solid { height } => vec![*height],
        }
    }

    pub fn all_finite(&self) -> bool {
        self.numeric_values().iter().all(|v| v.is_finite())
    }
}

/// A versioned geometric entity owned by exactly one workspace table.
///
/// Mutation never overwrites history in place: every change goes through
/// the model, which bumps `version` and records before/after snapshots in
/// the owning workspace's operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub params: GeometryParams,
    pub version: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Id-based back-reference: sketch members point at their sketch, a
    /// solid points at the sketch it was extruded from.
    pub parent: Option<EntityId>,
}

impl Entity {
    pub fn new(params: GeometryParams, created_by: &str, parent: Option<EntityId>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            params,
            version: 1,
            created_by: created_by.to_string(),
            created_at: now,
            modified_at: now,
            parent,
        }
    }

    /// Geometric equality, ignoring version and bookkeeping fields. This is
    /// what merge diffing compares.
    pub fn same_geometry(&self, other: &Entity) -> bool {
        self.params == other.params
    }
}
