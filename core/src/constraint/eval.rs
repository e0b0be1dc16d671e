use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::types::ConstraintKind;
use crate::entity::GeometryParams;
use crate::error::{ModelError, ModelResult};

/// Normalize an angle to [0, PI). Line directions are unoriented, so 30deg
/// and 210deg describe the same relative angle.
pub fn fold_angle(a: f64) -> f64 {
    let mut x = a % PI;
    if x < 0.0 {
        x += PI;
    }
    x
}

/// One analytic measurement: what the constraint wants vs what the geometry
/// currently gives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub expected: f64,
    pub actual: f64,
}

impl Measurement {
    pub fn error(&self) -> f64 {
        (self.actual - self.expected).abs()
    }

    pub fn within(&self, tolerance: f64) -> bool {
        self.error() <= tolerance
    }
}

/// Boundary to the geometry collaborator.
///
/// The constraint graph never computes exact B-rep geometry itself; it only
/// needs the analytic quantities (distances, directions, radii) required for
/// tolerance checks. Swapping in a real kernel binding means implementing
/// this trait.
pub trait GeometryEngine: Send + Sync {
    fn evaluate(
        &self,
        kind: &ConstraintKind,
        params: &[&GeometryParams],
    ) -> ModelResult<Measurement>;
}

/// Closed-form implementation over the 2D entity parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEngine;

impl AnalyticEngine {
    /// Representative point for positional comparisons: a point's position,
    /// a circle's or arc's center, a line's midpoint.
    fn anchor(params: &GeometryParams) -> Option<Point2<f64>> {
        match params {
            GeometryParams::Point { pos } => Some(Point2::new(pos[0], pos[1])),
            GeometryParams::Circle { center, .. } | GeometryParams::Arc { center, .. } => {
                Some(Point2::new(center[0], center[1]))
            }
            GeometryParams::Line { start, end } => Some(Point2::new(
                (start[0] + end[0]) * 0.5,
                (start[1] + end[1]) * 0.5,
            )),
            GeometryParams::Sketch { .. } | GeometryParams::Solid { .. } => None,
        }
    }

    fn unit_direction(params: &GeometryParams) -> ModelResult<Vector2<f64>> {
        if let GeometryParams::Line { start, end } = params {
            let dir = Vector2::new(end[0] - start[0], end[1] - start[1]);
            let len = dir.norm();
            if len < 1e-12 {
                return Err(ModelError::InvalidGeometry(
                    "zero-length line has no direction".to_string(),
                ));
            }
            Ok(dir / len)
        } else {
            Err(ModelError::InternalSolverError(format!(
                "direction requested for a {}",
                params.kind_name()
            )))
        }
    }

    fn anchor_distance(a: &GeometryParams, b: &GeometryParams) -> ModelResult<f64> {
        match (Self::anchor(a), Self::anchor(b)) {
            (Some(pa), Some(pb)) => Ok((pb - pa).norm()),
            _ => Err(ModelError::InternalSolverError(
                "distance requested for a non-positional entity".to_string(),
            )),
        }
    }
}

fn point_to_line_distance(p: Point2<f64>, start: [f64; 2], end: [f64; 2]) -> ModelResult<f64> {
    let a = Point2::new(start[0], start[1]);
    let b = Point2::new(end[0], end[1]);
    let dir = b - a;
    let len = dir.norm();
    if len < 1e-12 {
        return Err(ModelError::InvalidGeometry(
            "zero-length line has no direction".to_string(),
        ));
    }
    let n = Vector2::new(-dir.y / len, dir.x / len);
    Ok((p - a).dot(&n).abs())
}

impl GeometryEngine for AnalyticEngine {
    fn evaluate(
        &self,
        kind: &ConstraintKind,
        params: &[&GeometryParams],
    ) -> ModelResult<Measurement> {
        match kind {
            ConstraintKind::Coincident => Ok(Measurement {
                expected: 0.0,
                actual: Self::anchor_distance(params[0], params[1])?,
            }),
            ConstraintKind::Distance { value } => Ok(Measurement {
                expected: *value,
                actual: Self::anchor_distance(params[0], params[1])?,
            }),
            ConstraintKind::Parallel => {
                let d1 = Self::unit_direction(params[0])?;
                let d2 = Self::unit_direction(params[1])?;
                // |cross| is sin(angle): linear angular sensitivity near 0
                Ok(Measurement {
                    expected: 0.0,
                    actual: (d1.x * d2.y - d1.y * d2.x).abs(),
                })
            }
            ConstraintKind::Perpendicular => {
                let d1 = Self::unit_direction(params[0])?;
                let d2 = Self::unit_direction(params[1])?;
                Ok(Measurement {
                    expected: 0.0,
                    actual: d1.dot(&d2).abs(),
                })
            }
            ConstraintKind::Angle { value } => {
                let d1 = Self::unit_direction(params[0])?;
                let d2 = Self::unit_direction(params[1])?;
                let actual = d1.dot(&d2).abs().clamp(0.0, 1.0).acos();
                let folded = fold_angle(*value);
                // fold the target into the same unoriented half-range
                let expected = folded.min(PI - folded);
                Ok(Measurement { expected, actual })
            }
            ConstraintKind::Radius { value } => match params[0] {
                GeometryParams::Circle { radius, .. } | GeometryParams::Arc { radius, .. } => {
                    Ok(Measurement {
                        expected: *value,
                        actual: *radius,
                    })
                }
                other => Err(ModelError::InternalSolverError(format!(
                    "radius evaluation on a {}",
                    other.kind_name()
                ))),
            },
            ConstraintKind::Tangent => match (params[0], params[1]) {
                (
                    GeometryParams::Line { start, end },
                    GeometryParams::Circle { center, radius },
                )
                | (
                    GeometryParams::Line { start, end },
                    GeometryParams::Arc { center, radius, .. },
                )
                | (
                    GeometryParams::Circle { center, radius },
                    GeometryParams::Line { start, end },
                )
                | (
                    GeometryParams::Arc { center, radius, .. },
                    GeometryParams::Line { start, end },
                ) => {
                    let c = Point2::new(center[0], center[1]);
                    Ok(Measurement {
                        expected: *radius,
                        actual: point_to_line_distance(c, *start, *end)?,
                    })
                }
                (a, b) if a.is_curved() && b.is_curved() => {
                    let (r1, r2) = (curve_radius(a), curve_radius(b));
                    let d = Self::anchor_distance(a, b)?;
                    // external or internal tangency, whichever is closer
                    let external = r1 + r2;
                    let internal = (r1 - r2).abs();
                    let expected = if (d - external).abs() <= (d - internal).abs() {
                        external
                    } else {
                        internal
                    };
                    Ok(Measurement { expected, actual: d })
                }
                (a, b) => Err(ModelError::InternalSolverError(format!(
                    "tangent evaluation on {} and {}",
                    a.kind_name(),
                    b.kind_name()
                ))),
            },
        }
    }
}

fn curve_radius(params: &GeometryParams) -> f64 {
    match params {
        GeometryParams::Circle { radius, .. } | GeometryParams::Arc { radius, .. } => *radius,
        _ => 0.0,
    }
}
