//! Relation-path features.
//!
//! A relation path is a sequence of steps, each following a relation
//! forwards or backwards. The path holds for `(s, o)` when `o` is reachable
//! from `s` by taking the steps in order. Paths are mined level by level
//! (length 1, 2, ...) and pruned by minimum support and a per-level cap.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::graph::sok::CellIndex;
use crate::graph::{EntityId, RelationId};

/// One hop along a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Step {
    pub relation: RelationId,
    /// Follow object → subject instead of subject → object.
    pub inverse: bool,
}

/// A sequence of steps.
pub type RelationPath = Vec<Step>;

/// Ranking used when a level has more paths than the cap allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSelection {
    /// `m1`: support among positives.
    Support,
    /// `m2`: support among positives minus support among negatives.
    Contrast,
}

impl PathSelection {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s {
            "m1" => Ok(PathSelection::Support),
            "m2" => Ok(PathSelection::Contrast),
            other => Err(ConfigError::InvalidValue {
                field: "path_selection_mode",
                value: other.into(),
                expected: "Use `m1` (positive support) or `m2` (support contrast with negatives).".into(),
            }),
        }
    }
}

/// Bounds for [`mine_paths`].
#[derive(Debug, Clone, Copy)]
pub struct MiningBounds {
    pub max_depth: usize,
    /// `None` keeps every path that meets `min_support`.
    pub max_paths_per_level: Option<usize>,
    pub min_support: f64,
    pub selection: PathSelection,
}

/// Whether `path` leads from `s` to `o`.
pub fn holds(index: &CellIndex, path: &[Step], s: EntityId, o: EntityId) -> bool {
    let Some((last, prefix)) = path.split_last() else {
        return false;
    };
    frontier(index, prefix, s)
        .iter()
        .any(|&x| index.contains(last.relation, last.inverse, x, o))
}

/// Entities reached from `s` after every step of `path`.
fn frontier(index: &CellIndex, path: &[Step], s: EntityId) -> BTreeSet<EntityId> {
    let mut frontier: BTreeSet<EntityId> = BTreeSet::from([s]);
    for step in path {
        frontier = frontier
            .iter()
            .flat_map(|&x| index.neighbors(step.relation, step.inverse, x).iter().copied())
            .collect();
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}

fn support(index: &CellIndex, path: &[Step], pairs: &[(EntityId, EntityId)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let hits = pairs.iter().filter(|&&(s, o)| holds(index, path, s, o)).count();
    hits as f64 / pairs.len() as f64
}

/// Share of positive subjects from which `path` leads anywhere.
fn reach(index: &CellIndex, path: &[Step], pairs: &[(EntityId, EntityId)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let hits = pairs
        .iter()
        .filter(|&&(s, _)| !frontier(index, path, s).is_empty())
        .count();
    hits as f64 / pairs.len() as f64
}

/// Mine paths predictive of `target` from its positive and negative pairs.
///
/// Each level extends the previous level's reachable prefixes by one step.
/// A path becomes a feature when its support among positives reaches
/// `min_support`. Both the features and the prefixes carried to the next
/// level are capped by `max_paths_per_level`. The trivial one-step path
/// along `target` itself is never a candidate.
pub fn mine_paths(
    index: &CellIndex,
    target: RelationId,
    positives: &[(EntityId, EntityId)],
    negatives: &[(EntityId, EntityId)],
    bounds: &MiningBounds,
) -> Vec<RelationPath> {
    let steps: Vec<Step> = (0..index.n_relations() as RelationId)
        .flat_map(|r| {
            [false, true].map(|inverse| Step {
                relation: r,
                inverse,
            })
        })
        .collect();

    let mut selected = Vec::new();
    let mut prefixes: Vec<RelationPath> = vec![Vec::new()];
    for depth in 1..=bounds.max_depth {
        let candidates: Vec<RelationPath> = prefixes
            .iter()
            .flat_map(|prefix| {
                steps.iter().map(move |&step| {
                    let mut path = prefix.clone();
                    path.push(step);
                    path
                })
            })
            .filter(|path| !(path.len() == 1 && path[0].relation == target && !path[0].inverse))
            .collect();

        let mut features: Vec<(&RelationPath, f64)> = candidates
            .iter()
            .filter_map(|path| {
                let pos = support(index, path, positives);
                if pos < bounds.min_support || pos == 0.0 {
                    return None;
                }
                let rank = match bounds.selection {
                    PathSelection::Support => pos,
                    PathSelection::Contrast => pos - support(index, path, negatives),
                };
                Some((path, rank))
            })
            .collect();
        // Stable sorts: ties keep enumeration order.
        features.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(cap) = bounds.max_paths_per_level {
            features.truncate(cap);
        }

        let mut viable: Vec<(&RelationPath, f64)> = candidates
            .iter()
            .map(|path| (path, reach(index, path, positives)))
            .filter(|&(_, r)| r > 0.0)
            .collect();
        viable.sort_by(|a, b| b.1.total_cmp(&a.1));
        if let Some(cap) = bounds.max_paths_per_level {
            viable.truncate(cap);
        }

        tracing::trace!(
            target_relation = target,
            depth,
            features = features.len(),
            prefixes = viable.len(),
            "path level mined"
        );
        selected.extend(features.into_iter().map(|(p, _)| p.clone()));
        prefixes = viable.into_iter().map(|(p, _)| p.clone()).collect();
        if prefixes.is_empty() {
            break;
        }
    }
    selected
}
