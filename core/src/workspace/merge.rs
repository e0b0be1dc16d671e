use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::entity::{Entity, EntityId, GeometryParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    BothModified,
    DeleteModified,
}

/// The resolutions a caller may pick from when resubmitting a conflicted
/// merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOption {
    KeepSource,
    KeepTarget,
    ManualMerge,
}

/// An upfront per-entity resolution for a non-auto merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepSource,
    KeepTarget,
    ManualMerge(GeometryParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Abort the whole merge if any conflict remains.
    Auto,
    /// Apply the given resolutions; any unresolved conflict still aborts.
    Manual(HashMap<EntityId, ConflictResolution>),
}

/// One unresolved divergence, with enough structured detail for an
/// automated caller to self-correct without parsing free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub entity: EntityId,
    pub kind: ConflictKind,
    pub base: Option<Entity>,
    pub source: Option<Entity>,
    pub target: Option<Entity>,
    pub resolution_options: Vec<ResolutionOption>,
}

impl MergeConflict {
    fn new(
        entity: EntityId,
        kind: ConflictKind,
        base: Option<&Entity>,
        source: Option<&Entity>,
        target: Option<&Entity>,
    ) -> Self {
        Self {
            entity,
            kind,
            base: base.cloned(),
            source: source.cloned(),
            target: target.cloned(),
            resolution_options: vec![
                ResolutionOption::KeepSource,
                ResolutionOption::KeepTarget,
                ResolutionOption::ManualMerge,
            ],
        }
    }
}

/// A single mutation the merge will apply to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeAction {
    Add(Entity),
    Modify(Entity),
    Delete(EntityId),
}

impl MergeAction {
    pub fn entity_id(&self) -> EntityId {
        match self {
            MergeAction::Add(e) | MergeAction::Modify(e) => e.id,
            MergeAction::Delete(id) => *id,
        }
    }
}

/// The computed merge: either a conflict-free action list, or the conflict
/// list that aborts it. Planning never mutates anything.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub actions: Vec<MergeAction>,
    pub conflicts: Vec<MergeConflict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub entities_added: usize,
    pub entities_modified: usize,
    pub entities_deleted: usize,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    pub fn from_plan(plan: &MergePlan) -> Self {
        let mut outcome = Self {
            entities_added: 0,
            entities_modified: 0,
            entities_deleted: 0,
            conflicts: plan.conflicts.clone(),
        };
        for action in &plan.actions {
            match action {
                MergeAction::Add(_) => outcome.entities_added += 1,
                MergeAction::Modify(_) => outcome.entities_modified += 1,
                MergeAction::Delete(_) => outcome.entities_deleted += 1,
            }
        }
        outcome
    }
}

fn pick(b: f64, s: f64, t: f64) -> Option<f64> {
    if s == b {
        Some(t)
    } else if t == b || s == t {
        Some(s)
    } else {
        None
    }
}

fn pick2(b: [f64; 2], s: [f64; 2], t: [f64; 2]) -> Option<[f64; 2]> {
    Some([pick(b[0], s[0], t[0])?, pick(b[1], s[1], t[1])?])
}

fn pick3(b: [f64; 3], s: [f64; 3], t: [f64; 3]) -> Option<[f64; 3]> {
    Some([
        pick(b[0], s[0], t[0])?,
        pick(b[1], s[1], t[1])?,
        pick(b[2], s[2], t[2])?,
    ])
}

/// Field-wise three-way reconciliation of one entity's parameters.
///
/// When the two branches touched disjoint parameters of the same entity
/// (one moved a circle's center, the other grew its radius) both edits
/// compose. Returns None when the same scalar diverged on both sides, or
/// when a branch changed the entity's kind outright.
pub fn merge_params(
    base: &GeometryParams,
    source: &GeometryParams,
    target: &GeometryParams,
) -> Option<GeometryParams> {
    use GeometryParams::*;
    match (base, source, target) {
        (Point { pos: b }, Point { pos: s }, Point { pos: t }) => Some(Point {
            pos: pick2(*b, *s, *t)?,
        }),
        (
            Line { start: bs, end: be },
            Line { start: ss, end: se },
            Line { start: ts, end: te },
        ) => Some(Line {
            start: pick2(*bs, *ss, *ts)?,
            end: pick2(*be, *se, *te)?,
        }),
        (
            Circle { center: bc, radius: br },
            Circle { center: sc, radius: sr },
            Circle { center: tc, radius: tr },
        ) => Some(Circle {
            center: pick2(*bc, *sc, *tc)?,
            radius: pick(*br, *sr, *tr)?,
        }),
        (
            Arc { center: bc, radius: br, start_angle: bsa, end_angle: bea },
            Arc { center: sc, radius: sr, start_angle: ssa, end_angle: sea },
            Arc { center: tc, radius: tr, start_angle: tsa, end_angle: tea },
        ) => Some(Arc {
            center: pick2(*bc, *sc, *tc)?,
            radius: pick(*br, *sr, *tr)?,
            start_angle: pick(*bsa, *ssa, *tsa)?,
            end_angle: pick(*bea, *sea, *tea)?,
        }),
        (
            Sketch { origin: bo, normal: bn },
            Sketch { origin: so, normal: sn },
            Sketch { origin: to, normal: tn },
        ) => Some(Sketch {
            origin: pick3(*bo, *so, *to)?,
            normal: pick3(*bn, *sn, *tn)?,
        }),
        (Solid { height: b }, Solid { height: s }, Solid { height: t }) => Some(Solid {
            height: pick(*b, *s, *t)?,
        }),
        _ => None,
    }
}

/// Three-way merge keyed by entity id.
///
/// `base` is the target state rewound to the source's divergence point,
/// `source`/`target` are head states, and the changed sets are the entity
/// ids each side touched since base. Classification follows the usual
/// ancestor/ours/theirs rules, with field-wise reconciliation before a
/// both-modified verdict becomes a conflict.
pub fn plan(
    base: &HashMap<EntityId, Entity>,
    source: &HashMap<EntityId, Entity>,
    target: &HashMap<EntityId, Entity>,
    source_changed: &HashSet<EntityId>,
    target_changed: &HashSet<EntityId>,
    strategy: &MergeStrategy,
) -> MergePlan {
    let mut plan = MergePlan::default();

    let mut ids: Vec<EntityId> = source_changed.union(target_changed).copied().collect();
    ids.sort();

    for id in ids {
        let b = base.get(&id);
        let s = source.get(&id);
        let t = target.get(&id);

        let conflict = match (b, s, t) {
            // added only in source
            (None, Some(s), None) => {
                plan.actions.push(MergeAction::Add(s.clone()));
                None
            }
            // added independently in both branches
            (None, Some(s), Some(t)) => {
                if s.same_geometry(t) {
                    None
                } else {
                    Some(MergeConflict::new(
                        id,
                        ConflictKind::BothModified,
                        None,
                        Some(s),
                        Some(t),
                    ))
                }
            }
            // added only in target, or noise in the changed sets
            (None, None, _) => None,
            (Some(b), Some(s), Some(t)) => {
                if s.same_geometry(b) || s.same_geometry(t) {
                    // source unchanged, or both converged on the same value
                    None
                } else if t.same_geometry(b) {
                    let mut merged = t.clone();
                    merged.params = s.params.clone();
                    plan.actions.push(MergeAction::Modify(merged));
                    None
                } else if let Some(params) = merge_params(&b.params, &s.params, &t.params) {
                    let mut merged = t.clone();
                    merged.params = params;
                    plan.actions.push(MergeAction::Modify(merged));
                    None
                } else {
                    Some(MergeConflict::new(
                        id,
                        ConflictKind::BothModified,
                        Some(b),
                        Some(s),
                        Some(t),
                    ))
                }
            }
            // deleted in source
            (Some(b), None, Some(t)) => {
                if t.same_geometry(b) {
                    plan.actions.push(MergeAction::Delete(id));
                    None
                } else {
                    Some(MergeConflict::new(
                        id,
                        ConflictKind::DeleteModified,
                        Some(b),
                        None,
                        Some(t),
                    ))
                }
            }
            // deleted in target
            (Some(b), Some(s), None) => {
                if s.same_geometry(b) {
                    None
                } else {
                    Some(MergeConflict::new(
                        id,
                        ConflictKind::DeleteModified,
                        Some(b),
                        Some(s),
                        None,
                    ))
                }
            }
            // deleted on both sides
            (Some(_), None, None) => None,
        };

        let Some(conflict) = conflict else { continue };

        if let MergeStrategy::Manual(resolutions) = strategy {
            match resolutions.get(&id) {
                Some(ConflictResolution::KeepSource) => {
                    match (s, t) {
                        (Some(s), Some(t)) => {
                            let mut merged = t.clone();
                            merged.params = s.params.clone();
                            plan.actions.push(MergeAction::Modify(merged));
                        }
                        (Some(s), None) => plan.actions.push(MergeAction::Add(s.clone())),
                        (None, Some(_)) => plan.actions.push(MergeAction::Delete(id)),
                        (None, None) => {}
                    }
                    continue;
                }
                Some(ConflictResolution::KeepTarget) => continue,
                Some(ConflictResolution::ManualMerge(params)) => {
                    match t {
                        Some(t) => {
                            let mut merged = t.clone();
                            merged.params = params.clone();
                            plan.actions.push(MergeAction::Modify(merged));
                        }
                        None => {
                            // target side is gone; resurrect from whichever
                            // snapshot still exists, with the caller's params
                            if let Some(donor) = s.or(b) {
                                let mut merged = donor.clone();
                                merged.params = params.clone();
                                plan.actions.push(MergeAction::Add(merged));
                            }
                        }
                    }
                    continue;
                }
                None => {}
            }
        }

        plan.conflicts.push(conflict);
    }

    plan
}
