use std::collections::HashMap;

use crate::constraint::{
    AnalyticEngine, ConstraintGraph, ConstraintKind, EntityView, SatisfactionStatus,
};
use crate::entity::{Entity, GeometryParams};
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

fn view_of(entities: &[&Entity]) -> EntityView {
    let mut view = HashMap::new();
    for e in entities {
        view.insert(e.id, (*e).clone());
    }
    view
}

#[test]
fn test_component_dof_never_goes_negative() {
    // Three coincident points: 6 DOF budget, coincident removes 2 each.
    let p1 = point(0.0, 0.0);
    let p2 = point(0.0, 0.0);
    let p3 = point(0.0, 0.0);
    let view = view_of(&[&p1, &p2, &p3]);
    let mut graph = ConstraintGraph::new();

    for pair in [[p1.id, p2.id], [p2.id, p3.id], [p1.id, p3.id]] {
        graph
            .apply(
                ConstraintKind::Coincident,
                pair.to_vec(),
                None,
                &view,
                &AnalyticEngine,
            )
            .unwrap();
    }
    let status = graph.status(None, &view);
    assert_eq!(status.dof_remaining, 0);

    // one more edge would take the component below zero
    let err = graph
        .apply(
            ConstraintKind::Distance { value: 0.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap_err();
    match err {
        ModelError::ConstraintConflict { dof_remaining, .. } => {
            assert_eq!(dof_remaining, Some(-1));
        }
        other => panic!("expected ConstraintConflict, got {other:?}"),
    }
    // all-or-nothing: the rejected edge left the graph untouched
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.status(None, &view).dof_remaining, 0);
}

#[test]
fn test_components_are_scoped_not_global() {
    // Two disconnected pairs: constraining one must not pull in the other.
    let p1 = point(0.0, 0.0);
    let p2 = point(1.0, 0.0);
    let p3 = point(10.0, 0.0);
    let p4 = point(11.0, 0.0);
    let view = view_of(&[&p1, &p2, &p3, &p4]);
    let mut graph = ConstraintGraph::new();

    let outcome_a = graph
        .apply(
            ConstraintKind::Distance { value: 1.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome_a.component.len(), 2);
    assert!(outcome_a.component.contains(&p1.id));
    assert!(!outcome_a.component.contains(&p3.id));

    let outcome_b = graph
        .apply(
            ConstraintKind::Distance { value: 1.0 },
            vec![p3.id, p4.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome_b.component.len(), 2);

    // linking the pairs fuses them into one component of four
    let outcome_link = graph
        .apply(
            ConstraintKind::Distance { value: 9.0 },
            vec![p2.id, p3.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome_link.component.len(), 4);
}

#[test]
fn test_reevaluation_touches_only_the_changed_component() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let p3 = point(100.0, 0.0);
    let p4 = point(103.0, 4.0);
    let mut view = view_of(&[&p1, &p2, &p3, &p4]);
    let mut graph = ConstraintGraph::new();

    let a = graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    let b = graph
        .apply(
            ConstraintKind::Distance { value: 5.0 },
            vec![p3.id, p4.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(a.status, SatisfactionStatus::Satisfied);
    assert_eq!(b.status, SatisfactionStatus::Satisfied);

    // move p2 so the first distance breaks
    let mut moved = view.get(&p2.id).unwrap().clone();
    moved.params = GeometryParams::Point { pos: [30.0, 40.0] };
    view.insert(p2.id, moved);

    let touched = graph
        .reevaluate_components(&[p2.id], &view, &AnalyticEngine)
        .unwrap();
    assert_eq!(touched, 1);

    assert_eq!(
        graph.get(&a.constraint_id).unwrap().status,
        SatisfactionStatus::Violated
    );
    // the other component was never re-evaluated
    assert_eq!(
        graph.get(&b.constraint_id).unwrap().status,
        SatisfactionStatus::Satisfied
    );
}

#[test]
fn test_reevaluation_marks_degenerate_geometry_violated() {
    // A line collapsed to a point has no direction; re-evaluation must not
    // error after the edit is already committed, only report the violation.
    let l1 = line(0.0, 0.0, 10.0, 0.0);
    let l2 = line(0.0, 5.0, 10.0, 5.0);
    let mut view = view_of(&[&l1, &l2]);
    let mut graph = ConstraintGraph::new();

    let outcome = graph
        .apply(
            ConstraintKind::Parallel,
            vec![l1.id, l2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    assert_eq!(outcome.status, SatisfactionStatus::Satisfied);

    let mut collapsed = view.get(&l1.id).unwrap().clone();
    collapsed.params = GeometryParams::Line {
        start: [1.0, 1.0],
        end: [1.0, 1.0],
    };
    view.insert(l1.id, collapsed);

    let touched = graph
        .reevaluate_components(&[l1.id], &view, &AnalyticEngine)
        .unwrap();
    assert_eq!(touched, 1);

    let constraint = graph.get(&outcome.constraint_id).unwrap();
    assert_eq!(constraint.status, SatisfactionStatus::Violated);
    assert_eq!(constraint.actual, None);
}

#[test]
fn test_cascade_removal_for_entity() {
    let p1 = point(0.0, 0.0);
    let p2 = point(1.0, 0.0);
    let p3 = point(2.0, 0.0);
    let view = view_of(&[&p1, &p2, &p3]);
    let mut graph = ConstraintGraph::new();

    graph
        .apply(
            ConstraintKind::Distance { value: 1.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();
    graph
        .apply(
            ConstraintKind::Distance { value: 1.0 },
            vec![p2.id, p3.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    let removed = graph.remove_for_entity(&p2.id);
    assert_eq!(removed.len(), 2);
    assert!(graph.is_empty());
}

#[test]
fn test_status_reports_expected_vs_actual_for_violated() {
    let p1 = point(0.0, 0.0);
    let p2 = point(3.0, 4.0);
    let view = view_of(&[&p1, &p2]);
    let mut graph = ConstraintGraph::new();

    graph
        .apply(
            ConstraintKind::Distance { value: 8.0 },
            vec![p1.id, p2.id],
            None,
            &view,
            &AnalyticEngine,
        )
        .unwrap();

    let status = graph.status(None, &view);
    assert_eq!(status.violated, 1);
    let detail = &status.constraints[0];
    assert_eq!(detail.expected, Some(8.0));
    assert!((detail.actual.unwrap() - 5.0).abs() < 1e-9);
    assert_eq!(detail.tolerance, 0.01);
}
