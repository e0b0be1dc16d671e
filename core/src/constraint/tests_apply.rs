use std::collections::HashMap;

use crate::constraint::{
    AnalyticEngine, ConstraintGraph, ConstraintKind, EntityView, SatisfactionStatus,
};
use crate::entity::{Entity, EntityId, GeometryParams};
use crate::error::ModelError;

fn point(x: f64, y: f64) -> Entity {
    Entity::new(GeometryParams::Point { pos: [x, y] }, "agent-1", None)
}

fn line(sx: f64, sy: f64, ex: f64, ey: f64) -> Entity {
    Entity::new(
        GeometryParams::Line {
            start: [sx, sy],
            end: [ex, ey],
        },
        "agent-1",
        None,
    )
}

fn circle(cx: f64, cy: f64, r: f64) -> Entity {
    Entity::new(
        GeometryParams::Circle {
            center: [cx, cy],
            radius: r,
        },
        "agent-1",
        None,
    )
}

fn view_of(entities: &[&Entity]) -> EntityView {
    let mut view = HashMap::new();
    for e in entities {
        view.insert(e.id, (*e).clone());
    }
    view
}

#[test]
fn test_distance_satisfied_within_default_tolerance() {
    // P1=(0,0), P2=(3,4): actual distance is exactly 5
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    let outcome = graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    assert_eq!(outcome.status, SatisfactionStatus::Satisfied);
    assert_eq!(outcome.dof_removed, 1);
    assert_eq!(outcome.component.len(), 2);
}

#[test]
fn test_distance_violated_is_not_an_error() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    let outcome = graph
        .apply(
            ConstraintKind::Distance { value: 7.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    assert_eq!(outcome.status, SatisfactionStatus::Violated);
    let constraint = graph.get(&outcome.constraint_id).unwrap();
    assert_eq!(constraint.expected, Some(7.0));
    assert!((constraint.actual.unwrap() - 5.0).abs() < 1e-9);
}

#[test]
fn test_perpendicular_then_parallel_conflicts() {
    let l1 = line(0.0, 0.0, 10.0, 0.0);
    let l2 = line(0.0, 0.0, 0.0, 10.0);
    let view = view_of(&[&l1, &l2]);
    let mut graph = ConstraintGraph::new();

    graph
        .apply(
            ConstraintKind::Perpendicular,
            vec![l1.id, l2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    let err = graph
        .apply(
            ConstraintKind::Parallel,
            vec![l1.id, l2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();

    assert!(matches!(err, ModelError::ConstraintConflict { .. }));
    // rejection is atomic: only the first constraint is in the graph
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_identical_constraint_is_redundant_and_removes_nothing() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    let first = graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(first.status, SatisfactionStatus::Satisfied);

    let second = graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p2.id, p1.id], // entity order must not matter
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(second.status, SatisfactionStatus::Redundant);
    assert_eq!(second.dof_removed, 0);

    let status = graph.status(None, &view);
    assert_eq!(status.satisfied, 1);
    assert_eq!(status.redundant, 1);
    // 4 point DOF minus the one distance
    assert_eq!(status.dof_remaining, 3);
}

#[test]
fn test_near_duplicate_within_tolerance_is_redundant() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    // 5.005 is within the default 0.01 tolerance of 5.0
    let near = graph
        .apply(
            ConstraintKind::Distance { value: 5.005 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(near.status, SatisfactionStatus::Redundant);
}

#[test]
fn test_exact_mismatch_is_independent_and_conflicts() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    // a genuinely different target on the same pair can never hold
    let err = graph
        .apply(
            ConstraintKind::Distance { value: 9.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::ConstraintConflict { .. }));
}

#[test]
fn test_radius_on_line_is_invalid() {
    let l1 = line(0.0, 0.0, 1.0, 0.0);
    let view = view_of(&[&l1]);
    let mut graph = ConstraintGraph::new();

    let err = graph
        .apply(
            ConstraintKind::Radius { value: 2.0 },
            vec![l1.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidConstraint(_)));
}

#[test]
fn test_tangent_requires_a_curve() {
    let l1 = line(0.0, 0.0, 1.0, 0.0);
    let l2 = line(0.0, 1.0, 1.0, 1.0);
    let view = view_of(&[&l1, &l2]);
    let mut graph = ConstraintGraph::new();

    let err = graph
        .apply(
            ConstraintKind::Tangent,
            vec![l1.id, l2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidConstraint(_)));
}

#[test]
fn test_tangent_line_circle_satisfied() {
    // horizontal line at y=0, circle centered (0,3) radius 3 touches it
    let l1 = line(-10.0, 0.0, 10.0, 0.0);
    let c1 = circle(0.0, 3.0, 3.0);
    let view = view_of(&[&l1, &c1]);
    let mut graph = ConstraintGraph::new();

    let outcome = graph
        .apply(
            ConstraintKind::Tangent,
            vec![l1.id, c1.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome.status, SatisfactionStatus::Satisfied);
}

#[test]
fn test_missing_entity_fails() {
    let p1 = point(0.0, 0.0);
    let view = view_of(&[&p1]);
    let mut graph = ConstraintGraph::new();
    let ghost = EntityId::new();

    let err = graph
        .apply(
            ConstraintKind::Distance { value: 1.0 },
            vec![p1.id, ghost],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::EntityNotFound(id) if id == ghost));
}

#[test]
fn test_wrong_arity_is_invalid() {
    let c1 = circle(0.0, 0.0, 5.0);
    let view = view_of(&[&c1]);
    let mut graph = ConstraintGraph::new();

    let err = graph
        .apply(
            ConstraintKind::Coincident,
            vec![c1.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidConstraint(_)));
}

#[test]
fn test_custom_tolerance_overrides_default() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    // off by 0.5 from the target: violated under the default tolerance,
    // satisfied when the caller loosens it
    let outcome = graph
        .apply(
            ConstraintKind::Distance { value: 5.5 },
            vec![p1.id, p2.id],
            Some(1.0),
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome.status, SatisfactionStatus::Satisfied);
}
