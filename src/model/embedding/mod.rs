//! Latent-embedding models.
//!
//! Entities and relations get dense vectors fitted by SGD against sampled
//! corruptions of the observed facts. Each interaction defines its own
//! plausibility function; all of them are normalized so that higher means
//! more plausible, which keeps the crate-wide "lower is more anomalous"
//! convention.
//!
//! | method | plausibility | loss |
//! |---|---|---|
//! | `transe` | `-‖h + r - t‖₂` | margin ranking |
//! | `rescal` | `σ(hᵀ R t)` | logistic |
//! | `hole` | `σ(r · (h ⋆ t))` | logistic |
//! | `proje` | `σ(t · tanh(dₑ∘h + dᵣ∘r + b) + b_p)` | weighted logistic |

pub mod hole;
pub mod proje;
pub mod rescal;
pub mod transe;

use std::fmt::Debug;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{ConfigError, ConfigResult, ModelResult};
use crate::graph::{EntityId, Graph, RelationId, Triple, extract_triples};

use super::{Method, RawScores, ScoringModel, TrainingData, checkpoint, scoring_failure, training_failure};

pub use hole::HolE;
pub use proje::{ProjE, ProjEConfig};
pub use rescal::Rescal;
pub use transe::TransE;

/// Fields of [`RunConfig`] consumed by TransE, RESCAL and HolE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub dimensions: usize,
    pub n_negatives: usize,
    pub n_epochs: usize,
    pub seed: u64,
}

impl EmbeddingConfig {
    pub fn from_run(cfg: &RunConfig) -> ConfigResult<Self> {
        Ok(Self {
            dimensions: positive("dimensions", cfg.dimensions)?,
            n_negatives: positive("n_negatives", cfg.n_negatives)?,
            n_epochs: cfg.n_epochs,
            seed: cfg.seed,
        })
    }
}

pub(crate) fn positive(field: &'static str, value: usize) -> ConfigResult<usize> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
            expected: format!("`{field}` must be at least 1."),
        });
    }
    Ok(value)
}

/// Row-major matrix of embedding rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    width: usize,
    data: Vec<f64>,
}

impl Table {
    /// Uniform initialization in `±6/√width`.
    pub fn random(rows: usize, width: usize, rng: &mut impl Rng) -> Self {
        let bound = 6.0 / (width.max(1) as f64).sqrt();
        let data = (0..rows * width).map(|_| rng.gen_range(-bound..bound)).collect();
        Self { width, data }
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 { 0 } else { self.data.len() / self.width }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.width..(i + 1) * self.width]
    }

    /// `row[i] += factor * v`.
    pub fn axpy(&mut self, i: usize, factor: f64, v: &[f64]) {
        for (x, g) in self.row_mut(i).iter_mut().zip(v) {
            *x += factor * g;
        }
    }

    /// Rescale row `i` to unit length.
    pub fn normalize(&mut self, i: usize) {
        let norm = dot(self.row(i), self.row(i)).sqrt();
        if norm > f64::EPSILON {
            self.row_mut(i).iter_mut().for_each(|x| *x /= norm);
        }
    }

    /// Shrink row `i` back into the unit ball.
    pub fn clip(&mut self, i: usize) {
        let norm = dot(self.row(i), self.row(i)).sqrt();
        if norm > 1.0 {
            self.row_mut(i).iter_mut().for_each(|x| *x /= norm);
        }
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `ln(1 + eˣ)` without overflow.
pub(crate) fn softplus(x: f64) -> f64 {
    if x > 30.0 { x } else { x.exp().ln_1p() }
}

/// Logistic loss of logit `f` for `label`.
pub(crate) fn logistic_loss(f: f64, label: bool) -> f64 {
    if label { softplus(-f) } else { softplus(f) }
}

/// Replace the subject or the object with a uniformly drawn entity.
pub(crate) fn corrupt(t: &Triple, n_entities: usize, rng: &mut impl Rng) -> Triple {
    let e = rng.gen_range(0..n_entities as EntityId);
    if rng.gen_bool(0.5) {
        Triple::new(e, t.object, t.predicate)
    } else {
        Triple::new(t.subject, e, t.predicate)
    }
}

/// All facts of `graph` in extraction order.
pub(crate) fn facts(method: Method, graph: &Graph) -> ModelResult<Vec<Triple>> {
    let facts = extract_triples(graph.relations())
        .map_err(|e| training_failure(method, e.to_string()))?
        .triples;
    if facts.is_empty() {
        return Err(training_failure(method, "the graph holds no facts"));
    }
    Ok(facts)
}

/// Fail when the graph does not have the shape the model was built for.
pub(crate) fn check_shape(method: Method, expected: (usize, usize), graph: &Graph) -> ModelResult<()> {
    let actual = (graph.n_entities(), graph.n_relations());
    if actual != expected {
        return Err(training_failure(
            method,
            format!(
                "model was built for {} entities and {} relations, the graph has {} and {}",
                expected.0, expected.1, actual.0, actual.1
            ),
        ));
    }
    Ok(())
}

/// Fail when a triple refers to ids outside the trained vocabulary.
pub(crate) fn check_ids(method: Method, triples: &[Triple], n_entities: usize, n_relations: usize) -> ModelResult<()> {
    match triples.iter().find(|t| {
        t.subject as usize >= n_entities || t.object as usize >= n_entities || t.predicate as usize >= n_relations
    }) {
        Some(t) => Err(scoring_failure(
            method,
            format!("triple {t} is outside the trained vocabulary"),
        )),
        None => Ok(()),
    }
}

/// One shuffled pass over `facts`. `step` gets each fact with its negatives
/// and returns the loss; the mean loss is returned.
pub(crate) fn epoch(
    facts: &mut [Triple],
    n_entities: usize,
    n_negatives: usize,
    rng: &mut StdRng,
    mut step: impl FnMut(&Triple, &[Triple]) -> f64,
) -> f64 {
    facts.shuffle(rng);
    let mut negatives = Vec::with_capacity(n_negatives);
    let mut total = 0.0;
    for fact in facts.iter() {
        negatives.clear();
        negatives.extend((0..n_negatives).map(|_| corrupt(fact, n_entities, rng)));
        total += step(fact, &negatives);
    }
    total / facts.len().max(1) as f64
}

/// An entity/relation interaction trained with per-fact SGD updates.
pub trait Interaction: Debug + Clone + Serialize + DeserializeOwned {
    const METHOD: Method;

    fn init(n_entities: usize, n_relations: usize, dim: usize, rng: &mut StdRng) -> Self;

    fn n_entities(&self) -> usize;

    fn n_relations(&self) -> usize;

    /// Plausibility of `t`; higher is more plausible.
    fn plausibility(&self, t: &Triple) -> f64;

    /// Update on one fact and its corruptions, returning the loss.
    fn update(&mut self, fact: &Triple, negatives: &[Triple]) -> f64;
}

/// A [`ScoringModel`] around any [`Interaction`].
#[derive(Debug, Clone)]
pub struct LatentModel<I> {
    config: EmbeddingConfig,
    shape: (usize, usize),
    state: Option<I>,
}

impl<I: Interaction> LatentModel<I> {
    /// `shape` is `(n_entities, n_relations)` of the graph to be trained on.
    pub fn new(config: EmbeddingConfig, shape: (usize, usize)) -> Self {
        Self {
            config,
            shape,
            state: None,
        }
    }

    pub fn restore(config: EmbeddingConfig, path: &Path, payload: &[u8]) -> ModelResult<Self> {
        let state: I = checkpoint::decode(path, payload)?;
        Ok(Self {
            config,
            shape: (state.n_entities(), state.n_relations()),
            state: Some(state),
        })
    }
}

impl<I: Interaction> ScoringModel for LatentModel<I> {
    fn method(&self) -> Method {
        I::METHOD
    }

    fn train(&mut self, data: &TrainingData<'_>) -> ModelResult<()> {
        check_shape(I::METHOD, self.shape, data.graph)?;
        let mut facts = facts(I::METHOD, data.graph)?;
        let (n_entities, n_relations) = self.shape;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut state = I::init(n_entities, n_relations, self.config.dimensions, &mut rng);
        for e in 0..self.config.n_epochs {
            let loss = epoch(&mut facts, n_entities, self.config.n_negatives, &mut rng, |f, neg| {
                state.update(f, neg)
            });
            if !loss.is_finite() {
                return Err(training_failure(I::METHOD, format!("loss diverged at epoch {e}")));
            }
            tracing::debug!(method = %I::METHOD, epoch = e, loss, "epoch finished");
        }
        self.state = Some(state);
        Ok(())
    }

    fn score(&self, triples: &[Triple]) -> ModelResult<RawScores> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| scoring_failure(I::METHOD, "model has not been trained"))?;
        check_ids(I::METHOD, triples, state.n_entities(), state.n_relations())?;
        Ok(RawScores::column(
            triples.iter().map(|t| state.plausibility(t)).collect(),
        ))
    }

    fn snapshot(&self) -> ModelResult<Vec<u8>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| training_failure(I::METHOD, "nothing to snapshot before training"))?;
        checkpoint::encode(I::METHOD, state)
    }
}

/// Relation id used by type facts appended after the graph's relations.
pub(crate) fn type_relation(n_relations: usize) -> RelationId {
    n_relations as RelationId
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared checks for every interaction.

    use super::*;
    use crate::model::fixtures::people_and_cities;

    pub fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: 16,
            n_negatives: 2,
            n_epochs: 200,
            seed: 7,
        }
    }

    /// Observed `lives_in` facts against reversed city → person pairs.
    pub fn observed_and_reversed() -> (Vec<Triple>, Vec<Triple>) {
        let observed = (0..6).map(|i| Triple::new(i, 6 + i, 0)).collect();
        let reversed = (0..6).map(|i| Triple::new(6 + i, i, 0)).collect();
        (observed, reversed)
    }

    fn mean(v: &[f64]) -> f64 {
        v.iter().sum::<f64>() / v.len() as f64
    }

    /// Train on the fixture and check ordering, determinism and restore.
    pub fn exercise<I: Interaction>() -> Vec<f64> {
        let fx = people_and_cities();
        let shape = (fx.graph.n_entities(), fx.graph.n_relations());
        let mut model = LatentModel::<I>::new(config(), shape);
        model.train(&fx.data()).unwrap();

        let (observed, reversed) = observed_and_reversed();
        let pos = model.score(&observed).unwrap().flatten(I::METHOD).unwrap();
        let neg = model.score(&reversed).unwrap().flatten(I::METHOD).unwrap();
        assert!(pos.iter().chain(&neg).all(|s| s.is_finite()));
        assert!(mean(&pos) > mean(&neg), "{pos:?} vs {neg:?}");

        let mut again = LatentModel::<I>::new(config(), shape);
        again.train(&fx.data()).unwrap();
        assert_eq!(model.score(&observed).unwrap(), again.score(&observed).unwrap());

        let bytes = model.snapshot().unwrap();
        let restored = LatentModel::<I>::restore(config(), Path::new("mem"), &bytes).unwrap();
        assert_eq!(model.score(&observed).unwrap(), restored.score(&observed).unwrap());
        pos
    }
}
