//! Scoring models: the uniform train/score capability and its implementations.
//!
//! Every model family implements [`ScoringModel`] and is constructed through
//! the [`registry::ModelRegistry`], keyed by [`Method`].
//!
//! ## Score convention
//!
//! A score is a finite `f64` per triple where **lower means more anomalous**.
//! Families that naturally produce a distance or anomaly value negate it
//! inside their own `score`, so the ranker never has to know which family
//! produced the numbers. Scores are only comparable within one run.

pub mod checkpoint;
pub mod embedding;
pub mod outlier;
pub mod patybred;
pub mod registry;
pub mod sdv;

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::graph::Graph;
use crate::graph::Triple;
use crate::graph::schema::{RelationConstraints, TypeAssertions, TypeHierarchy};

/// Identifier of a model family (the `--method` value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Statistical type-distribution validator.
    Sdv,
    /// Relational classifier with path features only.
    Pabred,
    /// Relational classifier with subject/object type features only.
    Tybred,
    /// Relational classifier with path and type features.
    Patybred,
    /// Translational distance embeddings.
    TransE,
    /// Bilinear tensor-factorization embeddings.
    Rescal,
    /// Holographic (circular correlation) embeddings.
    Hole,
    /// Projection embeddings.
    ProjE,
}

impl Method {
    /// All methods, in registry order.
    pub const ALL: [Method; 8] = [
        Method::Sdv,
        Method::Pabred,
        Method::Tybred,
        Method::Patybred,
        Method::TransE,
        Method::Rescal,
        Method::Hole,
        Method::ProjE,
    ];

    /// The identifier accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Sdv => "sdv",
            Method::Pabred => "pabred",
            Method::Tybred => "tybred",
            Method::Patybred => "patybred",
            Method::TransE => "transe",
            Method::Rescal => "rescal",
            Method::Hole => "hole",
            Method::ProjE => "proje",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModelError::UnknownMethod { name: s.into() })
    }
}

/// Everything a model may learn from. The pipeline does not look inside.
#[derive(Debug, Clone, Copy)]
pub struct TrainingData<'a> {
    pub graph: &'a Graph,
    pub types: &'a TypeAssertions,
    pub type_hierarchy: &'a TypeHierarchy,
    pub domains: &'a RelationConstraints,
    pub ranges: &'a RelationConstraints,
}

/// Graph-level facts some constructors need before training.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub n_entities: usize,
    pub n_relations: usize,
    /// Where periodic training checkpoints go, if anywhere.
    pub checkpoint_path: Option<PathBuf>,
}

/// Scores as returned by a model, possibly multi-dimensional.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl RawScores {
    /// One score per triple.
    pub fn column(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// Scores with an explicit row-major shape, e.g. `[n, 1]`.
    pub fn with_shape(shape: Vec<usize>, values: Vec<f64>) -> Self {
        Self { shape, values }
    }

    /// Flatten to one dimension. The element count must match the shape.
    pub fn flatten(self, method: Method) -> ModelResult<Vec<f64>> {
        let expected: usize = self.shape.iter().product();
        if expected != self.values.len() {
            return Err(ModelError::ScoringFailure {
                method: method.to_string(),
                message: format!(
                    "score shape {:?} holds {expected} values but {} were returned",
                    self.shape,
                    self.values.len()
                ),
            });
        }
        Ok(self.values)
    }
}

/// The uniform capability of every model family.
pub trait ScoringModel {
    /// Which family this is.
    fn method(&self) -> Method;

    /// Fit the model. After success, `score` is usable.
    fn train(&mut self, data: &TrainingData<'_>) -> ModelResult<()>;

    /// Score triples in order; lower means more anomalous.
    fn score(&self, triples: &[Triple]) -> ModelResult<RawScores>;

    /// Serialize the trained state for a checkpoint.
    fn snapshot(&self) -> ModelResult<Vec<u8>>;
}

/// Shorthand for a `TrainingFailure` of `method`.
pub(crate) fn training_failure(method: Method, message: impl Into<String>) -> ModelError {
    ModelError::TrainingFailure {
        method: method.to_string(),
        message: message.into(),
    }
}

/// Shorthand for a `ScoringFailure` of `method`.
pub(crate) fn scoring_failure(method: Method, message: impl Into<String>) -> ModelError {
    ModelError::ScoringFailure {
        method: method.to_string(),
        message: message.into(),
    }
}

/// Logistic function.
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small graphs shared by model tests.

    use crate::graph::schema::{RelationConstraints, TypeAssertions, TypeHierarchy};
    use crate::graph::{AdjacencyMatrix, Graph};

    use super::TrainingData;

    /// Owned training inputs.
    pub struct Fixture {
        pub graph: Graph,
        pub types: TypeAssertions,
        pub hierarchy: TypeHierarchy,
        pub domains: RelationConstraints,
        pub ranges: RelationConstraints,
    }

    impl Fixture {
        pub fn data(&self) -> TrainingData<'_> {
            TrainingData {
                graph: &self.graph,
                types: &self.types,
                type_hierarchy: &self.hierarchy,
                domains: &self.domains,
                ranges: &self.ranges,
            }
        }
    }

    /// 12 entities: people 0..6 (type 0), cities 6..12 (type 1).
    /// Relation 0 `lives_in`: person i → city 6 + i, plus one person → person outlier.
    /// Relation 1 `born_in`: mirrors `lives_in` for people 0..4.
    pub fn people_and_cities() -> Fixture {
        let n = 12;
        let mut lives: Vec<(u32, u32)> = (0..6).map(|i| (i, 6 + i)).collect();
        lives.push((5, 0));
        let born: Vec<(u32, u32)> = (0..4).map(|i| (i, 6 + i)).collect();
        let graph = Graph::new(vec![
            AdjacencyMatrix::square(n, lives).unwrap(),
            AdjacencyMatrix::square(n, born).unwrap(),
        ])
        .unwrap();
        let types = TypeAssertions::new(
            n,
            3,
            (0..12).map(|e| (e, if e < 6 { 0 } else { 1 })),
        );
        Fixture {
            graph,
            types,
            hierarchy: TypeHierarchy::new([(0, 2), (1, 2)]),
            domains: RelationConstraints::new([(0, 0), (1, 0)]),
            ranges: RelationConstraints::new([(0, 1), (1, 1)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_roundtrip() {
        for m in Method::ALL {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = "bogus".parse::<Method>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownMethod { ref name } if name == "bogus"));
    }

    #[test]
    fn flatten_accepts_column_shapes() {
        let raw = RawScores::with_shape(vec![3, 1], vec![0.1, 0.2, 0.3]);
        assert_eq!(raw.flatten(Method::Sdv).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn flatten_rejects_inconsistent_shape() {
        let raw = RawScores::with_shape(vec![2, 2], vec![0.1, 0.2, 0.3]);
        assert!(matches!(
            raw.flatten(Method::Hole),
            Err(ModelError::ScoringFailure { .. })
        ));
    }
}
