//! Knowledge graph: per-relation adjacency matrices and the triples they hold.
//!
//! The graph is a read-only input for a ranking run:
//!
//! - **Adjacency** ([`AdjacencyMatrix`]): one compressed-sparse-row matrix per relation
//! - **Triples** ([`Triple`], [`extract_triples`]): the flat fact sequence whose order
//!   is the index space shared with the score sequence
//! - **Schema** ([`schema`]): type assertions, type hierarchy, domains and ranges
//! - **Dataset** ([`dataset`]): JSON loader bundling all of the above

pub mod dataset;
pub mod schema;
pub mod sok;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Zero-based entity identifier.
pub type EntityId = u32;

/// Zero-based relation (predicate) identifier.
pub type RelationId = u32;

/// A fact (subject, object, predicate) in the knowledge graph.
///
/// Field order follows the subject-object-predicate convention used for
/// enumeration; display order is the usual `(s, p, o)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// The subject entity.
    pub subject: EntityId,
    /// The object entity.
    pub object: EntityId,
    /// The predicate (relation).
    pub predicate: RelationId,
}

impl Triple {
    /// Create a new triple.
    pub fn new(subject: EntityId, object: EntityId, predicate: RelationId) -> Self {
        Self {
            subject,
            object,
            predicate,
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

// ---------------------------------------------------------------------------
// Adjacency matrix
// ---------------------------------------------------------------------------

/// Binary adjacency matrix of one relation in compressed sparse row layout.
///
/// Columns inside a row are sorted and unique, so iteration is row-major and
/// cell lookup is a binary search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    cols: Vec<EntityId>,
}

impl AdjacencyMatrix {
    /// An all-zero matrix.
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            row_ptr: vec![0; n_rows + 1],
            cols: Vec::new(),
        }
    }

    /// Build a matrix from `(row, col)` cells. Duplicates collapse into one cell.
    pub fn from_cells(
        n_rows: usize,
        n_cols: usize,
        cells: impl IntoIterator<Item = (EntityId, EntityId)>,
    ) -> GraphResult<Self> {
        let cells: Vec<(EntityId, EntityId)> = cells.into_iter().collect();
        if let Some(&(r, c)) = cells
            .iter()
            .find(|&&(r, c)| r as usize >= n_rows || c as usize >= n_cols)
        {
            return Err(GraphError::Malformed {
                message: format!("cell ({r}, {c}) lies outside a {n_rows}x{n_cols} matrix"),
            });
        }
        Ok(Self::build(n_rows, n_cols, cells))
    }

    /// CSR assembly from in-range cells.
    fn build(n_rows: usize, n_cols: usize, mut cells: Vec<(EntityId, EntityId)>) -> Self {
        cells.sort_unstable();
        cells.dedup();

        let mut row_ptr = vec![0usize; n_rows + 1];
        for &(r, _) in &cells {
            row_ptr[r as usize + 1] += 1;
        }
        for i in 0..n_rows {
            row_ptr[i + 1] += row_ptr[i];
        }
        let cols = cells.into_iter().map(|(_, c)| c).collect();

        Self {
            n_rows,
            n_cols,
            row_ptr,
            cols,
        }
    }

    /// Square matrix over `n` entities.
    pub fn square(n: usize, cells: impl IntoIterator<Item = (EntityId, EntityId)>) -> GraphResult<Self> {
        Self::from_cells(n, n, cells)
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of non-zero cells.
    pub fn nnz(&self) -> usize {
        self.cols.len()
    }

    /// Sorted column indices of the non-zero cells in `row`.
    pub fn row(&self, row: EntityId) -> &[EntityId] {
        let r = row as usize;
        if r >= self.n_rows {
            return &[];
        }
        &self.cols[self.row_ptr[r]..self.row_ptr[r + 1]]
    }

    /// Whether cell `(row, col)` is non-zero.
    pub fn contains(&self, row: EntityId, col: EntityId) -> bool {
        self.row(row).binary_search(&col).is_ok()
    }

    /// Non-zero cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        (0..self.n_rows).flat_map(move |r| {
            self.row(r as EntityId)
                .iter()
                .map(move |&c| (r as EntityId, c))
        })
    }

    /// The transposed matrix (inverse relation).
    pub fn transpose(&self) -> Self {
        let cells = self.cells().map(|(r, c)| (c, r)).collect();
        Self::build(self.n_cols, self.n_rows, cells)
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A multi-relational graph: one square adjacency matrix per relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    relations: Vec<AdjacencyMatrix>,
    n_entities: usize,
}

impl Graph {
    /// Validate and wrap per-relation matrices.
    pub fn new(relations: Vec<AdjacencyMatrix>) -> GraphResult<Self> {
        let n_entities = check_shapes(&relations)?;
        Ok(Self {
            relations,
            n_entities,
        })
    }

    /// Number of entities (matrix dimension).
    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    /// Number of relations.
    pub fn n_relations(&self) -> usize {
        self.relations.len()
    }

    /// Adjacency matrix of `relation`.
    pub fn relation(&self, relation: RelationId) -> Option<&AdjacencyMatrix> {
        self.relations.get(relation as usize)
    }

    /// All adjacency matrices, indexed by relation id.
    pub fn relations(&self) -> &[AdjacencyMatrix] {
        &self.relations
    }

    /// Total number of facts across all relations.
    pub fn n_triples(&self) -> usize {
        self.relations.iter().map(AdjacencyMatrix::nnz).sum()
    }
}

/// Check that every matrix is square and all share one dimension.
/// Returns that dimension (0 for an empty relation list).
fn check_shapes(relations: &[AdjacencyMatrix]) -> GraphResult<usize> {
    let Some(first) = relations.first() else {
        return Ok(0);
    };
    let n = first.shape().0;
    for (p, m) in relations.iter().enumerate() {
        let (rows, cols) = m.shape();
        if rows != cols {
            return Err(GraphError::Malformed {
                message: format!("relation {p} has a non-square {rows}x{cols} matrix"),
            });
        }
        if rows != n {
            return Err(GraphError::Malformed {
                message: format!("relation {p} covers {rows} entities, relation 0 covers {n}"),
            });
        }
    }
    Ok(n)
}

// ---------------------------------------------------------------------------
// Triple extraction
// ---------------------------------------------------------------------------

/// Flat triple sequence extracted from a graph, with its dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleSet {
    /// Triples in extraction order.
    pub triples: Vec<Triple>,
    /// Number of relations in the source graph.
    pub n_relations: usize,
    /// Number of entities in the source graph.
    pub n_entities: usize,
}

impl TripleSet {
    /// Total triple count.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Whether no triples were extracted.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

/// Flatten per-relation adjacency into a triple sequence.
///
/// Order is relation-major, then row-major within each matrix: relation 0's
/// cells by subject then object, then relation 1's, and so on.
pub fn extract_triples(relations: &[AdjacencyMatrix]) -> GraphResult<TripleSet> {
    let n_entities = check_shapes(relations)?;
    let capacity = relations.iter().map(AdjacencyMatrix::nnz).sum();
    let mut triples = Vec::with_capacity(capacity);
    for (p, m) in relations.iter().enumerate() {
        triples.extend(m.cells().map(|(s, o)| Triple::new(s, o, p as RelationId)));
    }
    Ok(TripleSet {
        triples,
        n_relations: relations.len(),
        n_entities,
    })
}
