//! Cell access structures used by path features.
//!
//! [`CellIndex`] bundles forward and transposed adjacency for frontier
//! expansion, plus an optional set-of-keys view per relation for O(1)
//! cell membership when `--convert-to-sok` is requested.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{AdjacencyMatrix, EntityId, Graph, RelationId};

/// Set-of-keys matrix: constant-time cell membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SokMatrix {
    cells: HashSet<(EntityId, EntityId)>,
}

impl SokMatrix {
    /// Convert a CSR matrix.
    pub fn from_csr(m: &AdjacencyMatrix) -> Self {
        Self {
            cells: m.cells().collect(),
        }
    }

    /// Whether cell `(row, col)` is set.
    pub fn contains(&self, row: EntityId, col: EntityId) -> bool {
        self.cells.contains(&(row, col))
    }

    /// Number of set cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is set.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Read access to a graph in both edge directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellIndex {
    forward: Vec<AdjacencyMatrix>,
    inverse: Vec<AdjacencyMatrix>,
    sok: Option<Vec<SokMatrix>>,
    n_entities: usize,
}

impl CellIndex {
    /// Index `graph`, optionally building set-of-keys views.
    pub fn new(graph: &Graph, convert_to_sok: bool) -> Self {
        let forward = graph.relations().to_vec();
        let inverse = forward.iter().map(AdjacencyMatrix::transpose).collect();
        let sok = convert_to_sok.then(|| forward.iter().map(SokMatrix::from_csr).collect());
        Self {
            forward,
            inverse,
            sok,
            n_entities: graph.n_entities(),
        }
    }

    /// Number of entities.
    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    /// Number of relations.
    pub fn n_relations(&self) -> usize {
        self.forward.len()
    }

    /// Whether `(s, o)` is a fact of `relation`, or of its inverse when `inverse` is set.
    pub fn contains(&self, relation: RelationId, inverse: bool, s: EntityId, o: EntityId) -> bool {
        let (row, col) = if inverse { (o, s) } else { (s, o) };
        match &self.sok {
            Some(sok) => sok
                .get(relation as usize)
                .is_some_and(|m| m.contains(row, col)),
            None => self
                .forward
                .get(relation as usize)
                .is_some_and(|m| m.contains(row, col)),
        }
    }

    /// Entities reachable from `s` in one step along `relation` (or its inverse).
    pub fn neighbors(&self, relation: RelationId, inverse: bool, s: EntityId) -> &[EntityId] {
        let side = if inverse { &self.inverse } else { &self.forward };
        side.get(relation as usize).map(|m| m.row(s)).unwrap_or(&[])
    }

    /// Forward adjacency of `relation`.
    pub fn relation(&self, relation: RelationId) -> Option<&AdjacencyMatrix> {
        self.forward.get(relation as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        Graph::new(vec![
            AdjacencyMatrix::square(3, [(0, 1), (1, 2)]).unwrap(),
            AdjacencyMatrix::square(3, [(2, 0)]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn sok_and_csr_agree() {
        let g = graph();
        let csr = CellIndex::new(&g, false);
        let sok = CellIndex::new(&g, true);
        for r in 0..2 {
            for s in 0..3 {
                for o in 0..3 {
                    for inv in [false, true] {
                        assert_eq!(csr.contains(r, inv, s, o), sok.contains(r, inv, s, o));
                    }
                }
            }
        }
    }

    #[test]
    fn inverse_neighbors_follow_transpose() {
        let idx = CellIndex::new(&graph(), false);
        assert_eq!(idx.neighbors(0, false, 0), &[1]);
        assert_eq!(idx.neighbors(0, true, 2), &[1]);
        assert!(idx.contains(1, true, 0, 2));
    }
}
