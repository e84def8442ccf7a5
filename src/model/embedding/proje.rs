//! ProjE: a shared projection of `(h, r)` compared against every tail.
//!
//! `f(h, r, t) = σ(t · tanh(dₑ∘h + dᵣ∘r + b) + b_p)`. Negatives are weighted by
//! `neg_weight` in the loss. With `use_types`, type assertions become extra
//! facts `(entity, has_type, type)` where each type is a pseudo-entity.
//! With a checkpoint path and `checkpoint_freq > 0` the state is written
//! every `checkpoint_freq` epochs.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{Table, check_ids, check_shape, dot, epoch, facts, logistic_loss, positive, type_relation};
use crate::config::RunConfig;
use crate::error::{ConfigResult, ModelResult};
use crate::graph::{EntityId, Triple};
use crate::model::{
    BuildContext, Method, RawScores, ScoringModel, TrainingData, checkpoint, scoring_failure, sigmoid,
    training_failure,
};

const LEARNING_RATE: f64 = 0.05;

/// Fields of [`RunConfig`] consumed by ProjE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjEConfig {
    pub dimensions: usize,
    pub n_epochs: usize,
    pub use_types: bool,
    /// Epochs between checkpoints; 0 disables them.
    pub checkpoint_freq: usize,
    pub neg_weight: f64,
    pub n_negatives: usize,
    pub save_path: Option<PathBuf>,
    pub seed: u64,
}

impl ProjEConfig {
    pub fn from_run(cfg: &RunConfig, ctx: &BuildContext) -> ConfigResult<Self> {
        Ok(Self {
            dimensions: positive("dimensions", cfg.dimensions)?,
            n_epochs: cfg.n_epochs,
            use_types: cfg.use_types,
            checkpoint_freq: cfg.checkpoint_freq,
            neg_weight: cfg.neg_weight,
            n_negatives: positive("n_negatives", cfg.n_negatives)?,
            save_path: ctx.checkpoint_path.clone(),
            seed: cfg.seed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProjEState {
    /// Graph entities first, then one pseudo-entity per type.
    entities: Table,
    /// Graph relations first, then `has_type` when types are used.
    relations: Table,
    entity_diag: Vec<f64>,
    relation_diag: Vec<f64>,
    bias: Vec<f64>,
    proj_bias: f64,
    /// Vocabulary of the graph itself; scoring is restricted to it.
    n_entities: usize,
    n_relations: usize,
}

impl ProjEState {
    fn new(n_entities: usize, n_relations: usize, n_types: usize, dim: usize, rng: &mut StdRng) -> Self {
        let extra_relation = usize::from(n_types > 0);
        Self {
            entities: Table::random(n_entities + n_types, dim, rng),
            relations: Table::random(n_relations + extra_relation, dim, rng),
            entity_diag: vec![1.0; dim],
            relation_diag: vec![1.0; dim],
            bias: vec![0.0; dim],
            proj_bias: 0.0,
            n_entities,
            n_relations,
        }
    }

    /// `tanh(dₑ∘h + dᵣ∘r + b)`.
    fn combine(&self, h: &[f64], r: &[f64]) -> Vec<f64> {
        (0..h.len())
            .map(|k| (self.entity_diag[k] * h[k] + self.relation_diag[k] * r[k] + self.bias[k]).tanh())
            .collect()
    }

    fn logit(&self, t: &Triple) -> f64 {
        let c = self.combine(
            self.entities.row(t.subject as usize),
            self.relations.row(t.predicate as usize),
        );
        dot(self.entities.row(t.object as usize), &c) + self.proj_bias
    }

    fn step(&mut self, t: &Triple, label: bool, weight: f64) -> f64 {
        let (s, o, p) = (t.subject as usize, t.object as usize, t.predicate as usize);
        let h = self.entities.row(s).to_vec();
        let r = self.relations.row(p).to_vec();
        let tail = self.entities.row(o).to_vec();
        let c = self.combine(&h, &r);
        let f = dot(&tail, &c) + self.proj_bias;
        let g = weight * (sigmoid(f) - if label { 1.0 } else { 0.0 });

        // dz = ∂f/∂c ∘ (1 - c²) with ∂f/∂c = t.
        let dz: Vec<f64> = tail.iter().zip(&c).map(|(t, c)| t * (1.0 - c * c)).collect();
        let grad_h: Vec<f64> = dz.iter().zip(&self.entity_diag).map(|(z, d)| z * d).collect();
        let grad_r: Vec<f64> = dz.iter().zip(&self.relation_diag).map(|(z, d)| z * d).collect();
        let step = LEARNING_RATE * g;

        for k in 0..dz.len() {
            self.entity_diag[k] -= step * dz[k] * h[k];
            self.relation_diag[k] -= step * dz[k] * r[k];
            self.bias[k] -= step * dz[k];
        }
        self.proj_bias -= step;
        self.entities.axpy(o, -step, &c);
        self.entities.axpy(s, -step, &grad_h);
        self.relations.axpy(p, -step, &grad_r);
        weight * logistic_loss(f, label)
    }
}

/// The ProjE model.
#[derive(Debug, Clone)]
pub struct ProjE {
    config: ProjEConfig,
    shape: (usize, usize),
    state: Option<ProjEState>,
}

impl ProjE {
    /// `shape` is `(n_entities, n_relations)` of the graph to be trained on.
    pub fn new(config: ProjEConfig, shape: (usize, usize)) -> Self {
        Self {
            config,
            shape,
            state: None,
        }
    }

    pub fn restore(config: ProjEConfig, path: &Path, payload: &[u8]) -> ModelResult<Self> {
        let state: ProjEState = checkpoint::decode(path, payload)?;
        Ok(Self {
            config,
            shape: (state.n_entities, state.n_relations),
            state: Some(state),
        })
    }

    fn write_checkpoint(&self, state: &ProjEState, epoch: usize) -> ModelResult<()> {
        let Some(path) = &self.config.save_path else {
            return Ok(());
        };
        checkpoint::write(path, Method::ProjE, checkpoint::encode(Method::ProjE, state)?)?;
        tracing::info!(epoch, path = %path.display(), "proje checkpoint written");
        Ok(())
    }
}

impl ScoringModel for ProjE {
    fn method(&self) -> Method {
        Method::ProjE
    }

    fn train(&mut self, data: &TrainingData<'_>) -> ModelResult<()> {
        check_shape(Method::ProjE, self.shape, data.graph)?;
        let (n_entities, n_relations) = self.shape;
        let mut facts = facts(Method::ProjE, data.graph)?;

        let n_types = if self.config.use_types { data.types.n_types() } else { 0 };
        if n_types > 0 {
            let has_type = type_relation(n_relations);
            facts.extend(
                data.types
                    .pairs()
                    .filter(|&(e, _)| (e as usize) < n_entities)
                    .map(|(e, t)| Triple::new(e, (n_entities as EntityId) + t, has_type)),
            );
        }
        if self.config.checkpoint_freq > 0 && self.config.save_path.is_none() {
            tracing::warn!(
                freq = self.config.checkpoint_freq,
                "checkpoint frequency set without a save path, checkpoints are skipped"
            );
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut state = ProjEState::new(n_entities, n_relations, n_types, self.config.dimensions, &mut rng);
        let vocabulary = n_entities + n_types;
        let neg_weight = self.config.neg_weight;
        let n_negatives = self.config.n_negatives;

        for e in 0..self.config.n_epochs {
            let loss = epoch(&mut facts, vocabulary, n_negatives, &mut rng, |fact, negatives| {
                let mut loss = state.step(fact, true, 1.0);
                for neg in negatives {
                    loss += state.step(neg, false, neg_weight / n_negatives as f64);
                }
                loss
            });
            if !loss.is_finite() {
                return Err(training_failure(Method::ProjE, format!("loss diverged at epoch {e}")));
            }
            tracing::debug!(method = %Method::ProjE, epoch = e, loss, "epoch finished");
            let freq = self.config.checkpoint_freq;
            if freq > 0 && (e + 1) % freq == 0 {
                self.write_checkpoint(&state, e + 1)?;
            }
        }
        self.state = Some(state);
        Ok(())
    }

    fn score(&self, triples: &[Triple]) -> ModelResult<RawScores> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| scoring_failure(Method::ProjE, "model has not been trained"))?;
        check_ids(Method::ProjE, triples, state.n_entities, state.n_relations)?;
        Ok(RawScores::column(
            triples.iter().map(|t| sigmoid(state.logit(t))).collect(),
        ))
    }

    fn snapshot(&self) -> ModelResult<Vec<u8>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| training_failure(Method::ProjE, "nothing to snapshot before training"))?;
        checkpoint::encode(Method::ProjE, state)
    }
}
