use crate::entity::{Entity, EntityTable, GeometryParams};

fn point(x: f64, y: f64) -> Entity {
    Entity::new(GeometryParams::Point { pos: [x, y] }, "agent-1", None)
}

#[test]
fn test_insert_and_get() {
    let mut table = EntityTable::new();
    let e = point(1.0, 2.0);
    let id = e.id;
    table.insert(e);

    assert!(table.contains(&id));
    assert_eq!(table.len(), 1);
    let got = table.get(&id).unwrap();
    assert_eq!(got.params, GeometryParams::Point { pos: [1.0, 2.0] });
    assert_eq!(got.version, 1);
}

#[test]
fn test_remove_leaves_tombstone() {
    let mut table = EntityTable::new();
    let e = point(0.0, 0.0);
    let id = e.id;
    table.insert(e);

    let removed = table.remove(&id);
    assert!(removed.is_some());
    assert!(!table.contains(&id));
    assert!(table.is_tombstoned(&id));
}

#[test]
fn test_tombstone_for_inherited_entity() {
    // Deleting an entity that only exists in the base lineage still has to
    // leave a shadowing tombstone in the local table.
    let mut table = EntityTable::new();
    let inherited = point(5.0, 5.0);

    assert!(table.remove(&inherited.id).is_none());
    assert!(table.is_tombstoned(&inherited.id));
}

#[test]
fn test_reinsert_clears_tombstone() {
    let mut table = EntityTable::new();
    let e = point(3.0, 3.0);
    let id = e.id;
    table.insert(e.clone());
    table.remove(&id);
    table.insert(e);

    assert!(table.contains(&id));
    assert!(!table.is_tombstoned(&id));
}

#[test]
fn test_non_finite_params_detected() {
    let p = GeometryParams::Circle { center: [0.0, f64::NAN], radius: 1.0 };
    assert!(!p.all_finite());
    let q = GeometryParams::Line { start: [0.0, 0.0], end: [f64::INFINITY, 1.0] };
    assert!(!q.all_finite());
    assert!(GeometryParams::Point { pos: [1.0, 1.0] }.all_finite());
}
