//! JSON dataset loader.
//!
//! A dataset bundles the graph with its side information:
//!
//! ```json
//! {
//!   "n_entities": 3,
//!   "relations": { "http://example.org/knows": 0, "http://example.org/likes": 1 },
//!   "adjacency": [ [[0, 1]], [[1, 2], [2, 0]] ],
//!   "n_types": 2,
//!   "type_assertions": [[0, 0], [1, 1]],
//!   "type_hierarchy": [[1, 0]],
//!   "domains": [[0, 0]],
//!   "ranges": [[0, 1]]
//! }
//! ```
//!
//! `relations` is the relation-name dictionary (name → id). `adjacency[p]`
//! lists the `[subject, object]` cells of relation `p`. Type ids must be
//! below `n_types`; a document without `n_types` carries no type information.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

use super::schema::{RelationConstraints, TypeAssertions, TypeHierarchy, TypeId};
use super::{AdjacencyMatrix, EntityId, Graph, RelationId};

/// On-disk dataset document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    pub n_entities: usize,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationId>,
    pub adjacency: Vec<Vec<(EntityId, EntityId)>>,
    #[serde(default)]
    pub n_types: usize,
    #[serde(default)]
    pub type_assertions: Vec<(EntityId, TypeId)>,
    #[serde(default)]
    pub type_hierarchy: Vec<(TypeId, TypeId)>,
    #[serde(default)]
    pub domains: Vec<(RelationId, TypeId)>,
    #[serde(default)]
    pub ranges: Vec<(RelationId, TypeId)>,
}

/// A loaded, validated dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub graph: Graph,
    pub types: TypeAssertions,
    pub type_hierarchy: TypeHierarchy,
    pub domains: RelationConstraints,
    pub ranges: RelationConstraints,
    /// Relation-name dictionary as stored: name → id.
    pub relation_dict: BTreeMap<String, RelationId>,
}

impl Dataset {
    /// Read and validate a dataset from a JSON file.
    pub fn load(path: &Path) -> GraphResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GraphError::DatasetRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: DatasetFile =
            serde_json::from_str(&content).map_err(|e| GraphError::DatasetParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let dataset = Self::from_file(file)?;
        tracing::info!(
            path = %path.display(),
            entities = dataset.graph.n_entities(),
            relations = dataset.graph.n_relations(),
            triples = dataset.graph.n_triples(),
            types = dataset.types.n_types(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Validate an in-memory dataset document.
    pub fn from_file(file: DatasetFile) -> GraphResult<Self> {
        let n = file.n_entities;
        let relations = file
            .adjacency
            .into_iter()
            .map(|cells| AdjacencyMatrix::square(n, cells))
            .collect::<GraphResult<Vec<_>>>()?;
        let graph = Graph::new(relations)?;
        check_side_information(
            &file.type_assertions,
            &file.type_hierarchy,
            &file.domains,
            &file.ranges,
            n,
            graph.n_relations(),
            file.n_types,
        )?;

        Ok(Self {
            types: TypeAssertions::new(n, file.n_types, file.type_assertions),
            type_hierarchy: TypeHierarchy::new(file.type_hierarchy),
            domains: RelationConstraints::new(file.domains),
            ranges: RelationConstraints::new(file.ranges),
            relation_dict: file.relations,
            graph,
        })
    }

    /// Inverted relation dictionary: id → name. Ids without a name map to `rel<id>`.
    pub fn relation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..self.graph.n_relations())
            .map(|p| format!("rel{p}"))
            .collect();
        for (name, &id) in &self.relation_dict {
            if let Some(slot) = names.get_mut(id as usize) {
                *slot = name.clone();
            }
        }
        names
    }
}

fn out_of_range(what: &str, id: u32, bound: usize, limit: &str) -> GraphError {
    GraphError::Malformed {
        message: format!("{what} {id} is out of range ({limit} = {bound})"),
    }
}

/// Every entity, relation and type id in the side information must index
/// into the graph or the declared type space.
fn check_side_information(
    assertions: &[(EntityId, TypeId)],
    hierarchy: &[(TypeId, TypeId)],
    domains: &[(RelationId, TypeId)],
    ranges: &[(RelationId, TypeId)],
    n_entities: usize,
    n_relations: usize,
    n_types: usize,
) -> GraphResult<()> {
    if n_types > TypeId::MAX as usize {
        return Err(GraphError::Malformed {
            message: format!("n_types = {n_types} exceeds the type id space"),
        });
    }
    let check_type = |t: TypeId| {
        if (t as usize) < n_types {
            Ok(())
        } else {
            Err(out_of_range("type", t, n_types, "n_types"))
        }
    };
    for &(e, t) in assertions {
        if e as usize >= n_entities {
            return Err(out_of_range("type assertion entity", e, n_entities, "n_entities"));
        }
        check_type(t)?;
    }
    for &(child, parent) in hierarchy {
        check_type(child)?;
        check_type(parent)?;
    }
    for &(r, t) in domains.iter().chain(ranges) {
        if r as usize >= n_relations {
            return Err(out_of_range("constrained relation", r, n_relations, "relations"));
        }
        check_type(t)?;
    }
    Ok(())
}
