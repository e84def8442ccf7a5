//! Statistical type-distribution validator.
//!
//! For each relation the validator learns how often each (hierarchy-expanded)
//! type appears on the subject and on the object side. A fact whose
//! endpoints carry types that are rare for its relation gets a low
//! consistency statistic. Untyped entities count as one pseudo-type so they
//! are judged against the relation's untyped share instead of being skipped.
//!
//! Two modes turn the per-side statistics into a score:
//!
//! - `sd`: the mean of subject and object statistics
//! - `if`: a per-relation isolation forest over `[subject, object]` statistics,
//!   scored as the negated anomaly score

use std::collections::HashMap;

use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{ConfigError, ConfigResult, ModelResult};
use crate::graph::schema::TypeId;
use crate::graph::{EntityId, RelationId, Triple};

use super::outlier::IsolationForest;
use super::{Method, RawScores, ScoringModel, TrainingData, checkpoint, scoring_failure, training_failure};

/// How per-side statistics become a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Mean of the two statistics.
    Statistic,
    /// Isolation forest over the statistics.
    IsolationForest,
}

impl OutlierMethod {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s {
            "sd" => Ok(OutlierMethod::Statistic),
            "if" => Ok(OutlierMethod::IsolationForest),
            other => Err(ConfigError::InvalidValue {
                field: "outlier_detection_method",
                value: other.into(),
                expected: "Use `sd` (type-distribution statistic) or `if` (isolation forest).".into(),
            }),
        }
    }
}

/// Fields of [`RunConfig`] the validator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdvConfig {
    pub outlier: OutlierMethod,
    pub seed: u64,
}

impl SdvConfig {
    pub fn from_run(cfg: &RunConfig) -> ConfigResult<Self> {
        Ok(Self {
            outlier: OutlierMethod::parse(&cfg.outlier_detection_method)?,
            seed: cfg.seed,
        })
    }
}

/// Learned state; everything `score` needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SdvState {
    /// Expanded types per entity; `untyped` for entities without any.
    entity_types: Vec<Vec<TypeId>>,
    /// Per relation: subject-side type frequency.
    subject_dist: Vec<HashMap<TypeId, f64>>,
    /// Per relation: object-side type frequency.
    object_dist: Vec<HashMap<TypeId, f64>>,
    /// Per relation forest (isolation-forest mode only).
    forests: Vec<IsolationForest>,
}

/// The statistical validator.
#[derive(Debug, Clone)]
pub struct StatisticalValidator {
    config: SdvConfig,
    state: Option<SdvState>,
}

impl StatisticalValidator {
    pub fn new(config: SdvConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Rebuild from a snapshot payload.
    pub fn restore(config: SdvConfig, path: &std::path::Path, payload: &[u8]) -> ModelResult<Self> {
        let state: SdvState = checkpoint::decode(path, payload)?;
        Ok(Self {
            config,
            state: Some(state),
        })
    }
}

impl SdvState {
    /// Mean frequency of `entity`'s types in `dist`. Unknown entities score 0.
    fn side_statistic(&self, dist: &HashMap<TypeId, f64>, entity: EntityId) -> f64 {
        match self.entity_types.get(entity as usize) {
            Some(types) if !types.is_empty() => {
                types.iter().map(|t| dist.get(t).copied().unwrap_or(0.0)).sum::<f64>()
                    / types.len() as f64
            }
            _ => 0.0,
        }
    }

    fn features(&self, t: &Triple) -> Option<[f64; 2]> {
        let p = t.predicate as usize;
        let subj = self.subject_dist.get(p)?;
        let obj = self.object_dist.get(p)?;
        Some([
            self.side_statistic(subj, t.subject),
            self.side_statistic(obj, t.object),
        ])
    }
}

/// Relative frequency of each type over `entities`.
fn distribution(entities: &[EntityId], entity_types: &[Vec<TypeId>]) -> HashMap<TypeId, f64> {
    let mut counts: HashMap<TypeId, f64> = HashMap::new();
    for &e in entities {
        for &t in &entity_types[e as usize] {
            *counts.entry(t).or_default() += 1.0;
        }
    }
    let n = entities.len().max(1) as f64;
    counts.values_mut().for_each(|c| *c /= n);
    counts
}

impl ScoringModel for StatisticalValidator {
    fn method(&self) -> Method {
        Method::Sdv
    }

    fn train(&mut self, data: &TrainingData<'_>) -> ModelResult<()> {
        let graph = data.graph;
        if graph.n_triples() == 0 {
            return Err(training_failure(Method::Sdv, "the graph holds no facts"));
        }

        let untyped = TypeId::try_from(data.types.n_types()).map_err(|_| {
            training_failure(
                Method::Sdv,
                format!("{} types leave no id for untyped entities", data.types.n_types()),
            )
        })?;
        let mut entity_types = data.types.expanded(data.type_hierarchy);
        entity_types.resize(graph.n_entities(), Vec::new());
        for types in &mut entity_types {
            if types.is_empty() {
                types.push(untyped);
            }
        }

        let mut state = SdvState {
            entity_types,
            ..Default::default()
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.config.seed);

        for (p, m) in graph.relations().iter().enumerate() {
            let (subjects, objects): (Vec<EntityId>, Vec<EntityId>) = m.cells().unzip();
            state.subject_dist.push(distribution(&subjects, &state.entity_types));
            state.object_dist.push(distribution(&objects, &state.entity_types));

            if self.config.outlier == OutlierMethod::IsolationForest {
                let points: Vec<Vec<f64>> = m
                    .cells()
                    .filter_map(|(s, o)| state.features(&Triple::new(s, o, p as RelationId)))
                    .map(|f| f.to_vec())
                    .collect();
                state.forests.push(IsolationForest::fit(
                    &points,
                    IsolationForest::DEFAULT_TREES,
                    IsolationForest::DEFAULT_SAMPLE,
                    &mut rng,
                ));
            }
        }

        tracing::debug!(
            relations = graph.n_relations(),
            untyped_id = untyped,
            mode = ?self.config.outlier,
            "sdv distributions learned"
        );
        self.state = Some(state);
        Ok(())
    }

    fn score(&self, triples: &[Triple]) -> ModelResult<RawScores> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| scoring_failure(Method::Sdv, "model has not been trained"))?;

        let scores = triples
            .iter()
            .map(|t| {
                let [s, o] = state.features(t).ok_or_else(|| {
                    scoring_failure(Method::Sdv, format!("unknown relation in {t}"))
                })?;
                Ok(match self.config.outlier {
                    OutlierMethod::Statistic => (s + o) / 2.0,
                    OutlierMethod::IsolationForest => state
                        .forests
                        .get(t.predicate as usize)
                        .map(|f| -f.anomaly_score(&[s, o]))
                        .unwrap_or(-0.5),
                })
            })
            .collect::<ModelResult<Vec<f64>>>()?;
        Ok(RawScores::column(scores))
    }

    fn snapshot(&self) -> ModelResult<Vec<u8>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| training_failure(Method::Sdv, "nothing to snapshot before training"))?;
        checkpoint::encode(Method::Sdv, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::graph::extract_triples;
    use crate::graph::schema::TypeAssertions;
    use crate::model::fixtures::people_and_cities;

    fn trained(outlier: OutlierMethod) -> (StatisticalValidator, Vec<Triple>) {
        let fx = people_and_cities();
        let mut model = StatisticalValidator::new(SdvConfig { outlier, seed: 1 });
        model.train(&fx.data()).unwrap();
        let triples = extract_triples(fx.graph.relations()).unwrap().triples;
        (model, triples)
    }

    #[test]
    fn type_violation_scores_lowest() {
        let (model, triples) = trained(OutlierMethod::Statistic);
        let scores = model.score(&triples).unwrap().flatten(Method::Sdv).unwrap();
        let outlier = triples.iter().position(|t| *t == Triple::new(5, 0, 0)).unwrap();
        for (i, s) in scores.iter().enumerate() {
            if i != outlier && triples[i].predicate == 0 {
                assert!(scores[outlier] < *s, "outlier {} not below {s}", scores[outlier]);
            }
        }
    }

    #[test]
    fn isolation_mode_is_deterministic() {
        let (a, triples) = trained(OutlierMethod::IsolationForest);
        let (b, _) = trained(OutlierMethod::IsolationForest);
        assert_eq!(a.score(&triples).unwrap(), b.score(&triples).unwrap());
        assert_eq!(a.score(&triples).unwrap(), a.score(&triples).unwrap());
    }

    #[test]
    fn isolation_scores_are_negated_anomalies() {
        let (model, triples) = trained(OutlierMethod::IsolationForest);
        let scores = model.score(&triples).unwrap().flatten(Method::Sdv).unwrap();
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));
    }

    #[test]
    fn snapshot_restores_identical_scores() {
        let (model, triples) = trained(OutlierMethod::Statistic);
        let bytes = model.snapshot().unwrap();
        let restored = StatisticalValidator::restore(
            model.config.clone(),
            std::path::Path::new("mem"),
            &bytes,
        )
        .unwrap();
        assert_eq!(model.score(&triples).unwrap(), restored.score(&triples).unwrap());
    }

    #[test]
    fn scoring_before_training_fails() {
        let model = StatisticalValidator::new(SdvConfig {
            outlier: OutlierMethod::Statistic,
            seed: 0,
        });
        assert!(model.score(&[Triple::new(0, 1, 0)]).is_err());
    }

    #[test]
    fn exhausted_type_id_space_fails_training() {
        let mut fx = people_and_cities();
        fx.types = TypeAssertions::new(12, 0, [(0, TypeId::MAX)]);
        let mut model = StatisticalValidator::new(SdvConfig {
            outlier: OutlierMethod::Statistic,
            seed: 0,
        });
        let err = model.train(&fx.data()).unwrap_err();
        assert!(matches!(err, ModelError::TrainingFailure { .. }));
    }

    #[test]
    fn unknown_outlier_method_is_invalid() {
        assert!(OutlierMethod::parse("lof").is_err());
    }
}
