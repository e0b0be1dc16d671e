use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

use super::eval::fold_angle;
use super::ConstraintId;
use crate::entity::EntityId;

/// Default tolerance for length-like comparisons (distances, radii).
pub const DEFAULT_LENGTH_TOLERANCE: f64 = 0.01;
/// Default tolerance for angular comparisons, in radians.
pub const DEFAULT_ANGLE_TOLERANCE: f64 = 0.01;

/// The closed set of constraint kinds. Angles are radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Coincident,
    Parallel,
    Perpendicular,
    Tangent,
    Distance { value: f64 },
    Angle { value: f64 },
    Radius { value: f64 },
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Coincident => "coincident",
            ConstraintKind::Parallel => "parallel",
            ConstraintKind::Perpendicular => "perpendicular",
            ConstraintKind::Tangent => "tangent",
            ConstraintKind::Distance { .. } => "distance",
            ConstraintKind::Angle { .. } => "angle",
            ConstraintKind::Radius { .. } => "radius",
        }
    }

    /// How many entities this kind references.
    pub fn arity(&self) -> usize {
        match self {
            ConstraintKind::Radius { .. } => 1,
            ConstraintKind::Coincident
            | ConstraintKind::Parallel
            | ConstraintKind::Perpendicular
            | ConstraintKind::Tangent
            | ConstraintKind::Distance { .. }
            | ConstraintKind::Angle { .. } => 2,
        }
    }

    /// Degrees of freedom removed from the touched component.
    pub fn dof_removed(&self) -> i32 {
        match self {
            ConstraintKind::Coincident => 2, // fixes x and y together
            ConstraintKind::Parallel
            | ConstraintKind::Perpendicular
            | ConstraintKind::Tangent
            | ConstraintKind::Distance { .. }
            | ConstraintKind::Angle { .. }
            | ConstraintKind::Radius { .. } => 1,
        }
    }

    pub fn default_tolerance(&self) -> f64 {
        match self {
            ConstraintKind::Parallel
            | ConstraintKind::Perpendicular
            | ConstraintKind::Angle { .. } => DEFAULT_ANGLE_TOLERANCE,
            ConstraintKind::Coincident
            | ConstraintKind::Tangent
            | ConstraintKind::Distance { .. }
            | ConstraintKind::Radius { .. } => DEFAULT_LENGTH_TOLERANCE,
        }
    }

    /// True when `other` is the same kind with parameters within `tol`.
    /// Near-duplicates of an already satisfied constraint are classified
    /// redundant; exact mismatches count as independent constraints.
    pub fn near_duplicate_of(&self, other: &ConstraintKind, tol: f64) -> bool {
        match (self, other) {
            (ConstraintKind::Coincident, ConstraintKind::Coincident)
            | (ConstraintKind::Parallel, ConstraintKind::Parallel)
            | (ConstraintKind::Perpendicular, ConstraintKind::Perpendicular)
            | (ConstraintKind::Tangent, ConstraintKind::Tangent) => true,
            (ConstraintKind::Distance { value: a }, ConstraintKind::Distance { value: b })
            | (ConstraintKind::Radius { value: a }, ConstraintKind::Radius { value: b }) => {
                (a - b).abs() <= tol
            }
            (ConstraintKind::Angle { value: a }, ConstraintKind::Angle { value: b }) => {
                (fold_angle(*a) - fold_angle(*b)).abs() <= tol
            }
            _ => false,
        }
    }

    /// Returns a reason when `self` and `other` cannot both hold on the same
    /// entity set, regardless of where the geometry currently sits.
    pub fn excludes(&self, other: &ConstraintKind, tol: f64) -> Option<String> {
        use ConstraintKind::*;
        match (self, other) {
            (Parallel, Perpendicular) | (Perpendicular, Parallel) => {
                Some("parallel and perpendicular cannot both hold on the same pair".to_string())
            }
            (Parallel, Angle { value }) | (Angle { value }, Parallel) => {
                let folded = fold_angle(*value);
                if folded.abs() > tol && (PI - folded).abs() > tol {
                    Some(format!(
                        "parallel conflicts with a fixed angle of {value:.4} rad"
                    ))
                } else {
                    None
                }
            }
            (Perpendicular, Angle { value }) | (Angle { value }, Perpendicular) => {
                if (fold_angle(*value) - FRAC_PI_2).abs() > tol {
                    Some(format!(
                        "perpendicular conflicts with a fixed angle of {value:.4} rad"
                    ))
                } else {
                    None
                }
            }
            (Distance { value: a }, Distance { value: b }) => {
                if (a - b).abs() > tol {
                    Some(format!("distance targets differ: {a} vs {b}"))
                } else {
                    None
                }
            }
            (Radius { value: a }, Radius { value: b }) => {
                if (a - b).abs() > tol {
                    Some(format!("radius targets differ: {a} vs {b}"))
                } else {
                    None
                }
            }
            (Angle { value: a }, Angle { value: b }) => {
                if (fold_angle(*a) - fold_angle(*b)).abs() > tol {
                    Some(format!("angle targets differ: {a} vs {b}"))
                } else {
                    None
                }
            }
            (Coincident, Distance { value }) | (Distance { value }, Coincident) => {
                if value.abs() > tol {
                    Some(format!(
                        "coincident conflicts with a non-zero distance of {value}"
                    ))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatisfactionStatus {
    Satisfied,
    Violated,
    Redundant,
}

/// A declared constraint plus its derived evaluation state. `expected` and
/// `actual` retain the last measurement so violated constraints can report
/// exactly how far off they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub entities: Vec<EntityId>,
    pub tolerance: f64,
    pub status: SatisfactionStatus,
    pub expected: Option<f64>,
    pub actual: Option<f64>,
}

/// Result of a successful `apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub constraint_id: ConstraintId,
    pub status: SatisfactionStatus,
    pub dof_removed: i32,
    /// Every entity in the connected component the constraint landed in.
    pub component: Vec<EntityId>,
}

/// Aggregate report for a workspace or sketch scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeStatus {
    pub satisfied: usize,
    pub violated: usize,
    pub redundant: usize,
    pub dof_remaining: i32,
    pub constraints: Vec<Constraint>,
}
