//! Path- and type-based relational classifier.
//!
//! One binary classifier per relation separates observed facts from sampled
//! corruptions. Features are relation paths between subject and object
//! (`pabred`), subject/object types and domain/range checks (`tybred`), or
//! both (`patybred`). The score of a fact is the classifier's P(true), so implausible facts rank low.
//!
//! Training per relation:
//!
//! 1. Positives are the relation's cells, capped at `max_pos_train`.
//! 2. `n_neg` negatives per positive corrupt the subject or object.
//! 3. Paths are mined on a sample of at most `max_fs_data_size` examples.
//! 4. Feature selection keeps `max_feats` candidates.
//! 5. The classifier is fit on all examples.

pub mod cache;
pub mod classifier;
pub mod paths;
pub mod select;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{ConfigResult, ModelResult};
use crate::graph::schema::TypeId;
use crate::graph::sok::CellIndex;
use crate::graph::{EntityId, RelationId, Triple};

use self::cache::SlotStore;
use self::classifier::{Classifier, ClassifierKind};
use self::paths::{MiningBounds, PathSelection, RelationPath};
use self::select::FeatureSelection;
use super::{Method, RawScores, ScoringModel, TrainingData, checkpoint, scoring_failure, training_failure};

/// Fields of [`RunConfig`] the relational classifier consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatybredConfig {
    pub max_depth: usize,
    pub classifier: ClassifierKind,
    /// Use subject and object types as features.
    pub so_type_feat: bool,
    pub n_neg: usize,
    pub feature_selection: FeatureSelection,
    pub max_feats: usize,
    pub min_sup: f64,
    /// `None` is unbounded.
    pub max_paths_per_level: Option<usize>,
    pub path_selection: PathSelection,
    pub reduce_mem_usage: bool,
    pub convert_to_sok: bool,
    pub max_pos_train: usize,
    pub max_fs_data_size: usize,
    pub seed: u64,
}

impl PatybredConfig {
    /// Extract the configuration of one of the three classifier methods.
    ///
    /// `tybred` pins path depth and paths per level to zero; `pabred` turns
    /// type features off. Other methods get the `patybred` configuration.
    pub fn for_method(method: Method, cfg: &RunConfig) -> ConfigResult<Self> {
        let base = Self {
            max_depth: cfg.max_path_length,
            classifier: ClassifierKind::parse(&cfg.classifier)?,
            so_type_feat: true,
            n_neg: cfg.n_negatives,
            feature_selection: FeatureSelection::parse(&cfg.feature_selection)?,
            max_feats: cfg.max_feats,
            min_sup: cfg.minimum_support,
            max_paths_per_level: cfg.max_paths_per_level,
            path_selection: PathSelection::parse(&cfg.path_selection_mode)?,
            reduce_mem_usage: cfg.mem_cache,
            convert_to_sok: cfg.convert_to_sok,
            max_pos_train: cfg.max_ts,
            max_fs_data_size: cfg.max_fs,
            seed: cfg.seed,
        };
        Ok(match method {
            Method::Pabred => Self {
                so_type_feat: false,
                ..base
            },
            Method::Tybred => Self {
                max_depth: 0,
                max_paths_per_level: Some(0),
                ..base
            },
            _ => base,
        })
    }
}

/// A single binary feature of a `(subject, object)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    SubjectType(TypeId),
    ObjectType(TypeId),
    /// The subject has one of the relation's domain types.
    InDomain(Vec<TypeId>),
    /// The object has one of the relation's range types.
    InRange(Vec<TypeId>),
    Path(RelationPath),
}

/// Trained classifier of one relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationModel {
    features: Vec<Feature>,
    classifier: Classifier,
}

/// Everything scoring needs besides the relation models.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Context {
    index: CellIndex,
    entity_types: Vec<Vec<TypeId>>,
}

impl Context {
    fn has_type(&self, e: EntityId, t: TypeId) -> bool {
        self.entity_types
            .get(e as usize)
            .is_some_and(|ts| ts.binary_search(&t).is_ok())
    }

    fn value(&self, feature: &Feature, s: EntityId, o: EntityId) -> f64 {
        let on = match feature {
            Feature::SubjectType(t) => self.has_type(s, *t),
            Feature::ObjectType(t) => self.has_type(o, *t),
            Feature::InDomain(ts) => ts.iter().any(|&t| self.has_type(s, t)),
            Feature::InRange(ts) => ts.iter().any(|&t| self.has_type(o, t)),
            Feature::Path(p) => paths::holds(&self.index, p, s, o),
        };
        if on { 1.0 } else { 0.0 }
    }

    fn row(&self, features: &[Feature], s: EntityId, o: EntityId) -> Vec<f64> {
        features.iter().map(|f| self.value(f, s, o)).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    context: Context,
    models: Vec<Option<RelationModel>>,
}

/// The relational classifier (`pabred`, `tybred`, `patybred`).
#[derive(Debug)]
pub struct RelationalClassifier {
    method: Method,
    config: PatybredConfig,
    context: Option<Context>,
    models: Option<SlotStore<RelationModel>>,
}

impl RelationalClassifier {
    pub fn new(method: Method, config: PatybredConfig) -> Self {
        Self {
            method,
            config,
            context: None,
            models: None,
        }
    }

    /// Rebuild from a snapshot payload, honoring the configured memory policy.
    pub fn restore(
        method: Method,
        config: PatybredConfig,
        path: &Path,
        payload: &[u8],
    ) -> ModelResult<Self> {
        let snapshot: Snapshot = checkpoint::decode(path, payload)?;
        let mut store = SlotStore::new(snapshot.models.len(), config.reduce_mem_usage, method)?;
        for (p, m) in snapshot.models.into_iter().enumerate() {
            if let Some(m) = m {
                store.put(p, m)?;
            }
        }
        Ok(Self {
            method,
            config,
            context: Some(snapshot.context),
            models: Some(store),
        })
    }

    /// Up to `n_neg` corruptions per positive that are not facts of the relation.
    fn sample_negatives(
        &self,
        ctx: &Context,
        relation: RelationId,
        positives: &[(EntityId, EntityId)],
        rng: &mut StdRng,
    ) -> Vec<(EntityId, EntityId)> {
        const ATTEMPTS: usize = 10;
        let n = ctx.index.n_entities() as EntityId;
        let mut negatives = Vec::with_capacity(positives.len() * self.config.n_neg);
        for &(s, o) in positives {
            for _ in 0..self.config.n_neg {
                for _ in 0..ATTEMPTS {
                    let e = rng.gen_range(0..n);
                    let candidate = if rng.gen_bool(0.5) { (e, o) } else { (s, e) };
                    if !ctx.index.contains(relation, false, candidate.0, candidate.1) {
                        negatives.push(candidate);
                        break;
                    }
                }
            }
        }
        negatives
    }

    fn type_candidates(&self, ctx: &Context, pairs: &[(EntityId, EntityId)]) -> Vec<Feature> {
        if !self.config.so_type_feat {
            return Vec::new();
        }
        let mut subject = BTreeSet::new();
        let mut object = BTreeSet::new();
        for &(s, o) in pairs {
            subject.extend(ctx.entity_types.get(s as usize).into_iter().flatten().copied());
            object.extend(ctx.entity_types.get(o as usize).into_iter().flatten().copied());
        }
        subject
            .into_iter()
            .map(Feature::SubjectType)
            .chain(object.into_iter().map(Feature::ObjectType))
            .collect()
    }

    /// Domain and range checks for relations the schema constrains.
    fn constraint_candidates(&self, data: &TrainingData<'_>, relation: RelationId) -> Vec<Feature> {
        if !self.config.so_type_feat {
            return Vec::new();
        }
        let domain = data.domains.types_for(relation);
        let range = data.ranges.types_for(relation);
        (!domain.is_empty())
            .then(|| Feature::InDomain(domain.to_vec()))
            .into_iter()
            .chain((!range.is_empty()).then(|| Feature::InRange(range.to_vec())))
            .collect()
    }

    fn train_relation(
        &self,
        ctx: &Context,
        relation: RelationId,
        constraints: Vec<Feature>,
        rng: &mut StdRng,
    ) -> Option<RelationModel> {
        let matrix = ctx.index.relation(relation)?;
        let mut positives: Vec<(EntityId, EntityId)> = matrix.cells().collect();
        if positives.is_empty() {
            return None;
        }
        if positives.len() > self.config.max_pos_train {
            let keep = sample(rng, positives.len(), self.config.max_pos_train);
            positives = keep.into_iter().map(|i| positives[i]).collect();
        }
        let negatives = self.sample_negatives(ctx, relation, &positives, rng);

        let mut examples: Vec<((EntityId, EntityId), bool)> = positives
            .iter()
            .map(|&p| (p, true))
            .chain(negatives.iter().map(|&n| (n, false)))
            .collect();
        examples.shuffle(rng);
        let fs_data = &examples[..examples.len().min(self.config.max_fs_data_size)];
        let fs_pos: Vec<_> = fs_data.iter().filter(|e| e.1).map(|e| e.0).collect();
        let fs_neg: Vec<_> = fs_data.iter().filter(|e| !e.1).map(|e| e.0).collect();

        let bounds = MiningBounds {
            max_depth: self.config.max_depth,
            max_paths_per_level: self.config.max_paths_per_level,
            min_support: self.config.min_sup,
            selection: self.config.path_selection,
        };
        let all_pairs: Vec<_> = fs_data.iter().map(|e| e.0).collect();
        let candidates: Vec<Feature> = self
            .type_candidates(ctx, &all_pairs)
            .into_iter()
            .chain(constraints)
            .chain(
                paths::mine_paths(&ctx.index, relation, &fs_pos, &fs_neg, &bounds)
                    .into_iter()
                    .map(Feature::Path),
            )
            .collect();

        let fs_x: Vec<Vec<f64>> = fs_data.iter().map(|((s, o), _)| ctx.row(&candidates, *s, *o)).collect();
        let fs_y: Vec<bool> = fs_data.iter().map(|e| e.1).collect();
        let keep = select::select(
            self.config.feature_selection,
            &fs_x,
            &fs_y,
            self.config.max_feats,
        );
        let features: Vec<Feature> = keep.into_iter().map(|i| candidates[i].clone()).collect();

        let x: Vec<Vec<f64>> = examples.iter().map(|((s, o), _)| ctx.row(&features, *s, *o)).collect();
        let y: Vec<bool> = examples.iter().map(|e| e.1).collect();
        let classifier = Classifier::fit(self.config.classifier, &x, &y, rng);

        tracing::debug!(
            relation,
            positives = positives.len(),
            negatives = negatives.len(),
            candidates = candidates.len(),
            features = features.len(),
            "relation classifier trained"
        );
        Some(RelationModel {
            features,
            classifier,
        })
    }
}

impl ScoringModel for RelationalClassifier {
    fn method(&self) -> Method {
        self.method
    }

    fn train(&mut self, data: &TrainingData<'_>) -> ModelResult<()> {
        let graph = data.graph;
        if graph.n_triples() == 0 {
            return Err(training_failure(self.method, "the graph holds no facts"));
        }
        if self.config.n_neg == 0 {
            return Err(training_failure(
                self.method,
                "at least one negative example per fact is needed",
            ));
        }

        let mut entity_types = data.types.expanded(data.type_hierarchy);
        entity_types.resize(graph.n_entities(), Vec::new());
        let ctx = Context {
            index: CellIndex::new(graph, self.config.convert_to_sok),
            entity_types,
        };

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut store = SlotStore::new(graph.n_relations(), self.config.reduce_mem_usage, self.method)?;
        for p in 0..graph.n_relations() {
            let relation = p as RelationId;
            let constraints = self.constraint_candidates(data, relation);
            if let Some(model) = self.train_relation(&ctx, relation, constraints, &mut rng) {
                store.put(p, model)?;
            }
        }

        self.context = Some(ctx);
        self.models = Some(store);
        Ok(())
    }

    fn score(&self, triples: &[Triple]) -> ModelResult<RawScores> {
        let (Some(ctx), Some(store)) = (&self.context, &self.models) else {
            return Err(scoring_failure(self.method, "model has not been trained"));
        };

        // Group by relation so each (possibly disk-backed) model loads once.
        let mut by_relation: BTreeMap<RelationId, Vec<usize>> = BTreeMap::new();
        for (i, t) in triples.iter().enumerate() {
            by_relation.entry(t.predicate).or_default().push(i);
        }

        let mut scores = vec![0.0; triples.len()];
        for (p, indices) in by_relation {
            if p as usize >= store.len() {
                return Err(scoring_failure(
                    self.method,
                    format!("relation {p} was not part of the training graph"),
                ));
            }
            let model = store.get(p as usize)?;
            for i in indices {
                let t = triples[i];
                scores[i] = match &model {
                    Some(m) => m
                        .classifier
                        .predict_proba(&ctx.row(&m.features, t.subject, t.object)),
                    None => 0.5,
                };
            }
        }
        Ok(RawScores::column(scores))
    }

    fn snapshot(&self) -> ModelResult<Vec<u8>> {
        let (Some(context), Some(store)) = (&self.context, &self.models) else {
            return Err(training_failure(self.method, "nothing to snapshot before training"));
        };
        let snapshot = Snapshot {
            context: context.clone(),
            models: store.to_vec()?,
        };
        checkpoint::encode(self.method, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::extract_triples;
    use crate::model::fixtures::people_and_cities;

    fn config(method: Method) -> PatybredConfig {
        let run = RunConfig {
            classifier: "lr".into(),
            n_negatives: 3,
            ..Default::default()
        };
        PatybredConfig::for_method(method, &run).unwrap()
    }

    #[test]
    fn method_configurations_differ_as_documented() {
        let run = RunConfig::default();
        let pa = PatybredConfig::for_method(Method::Pabred, &run).unwrap();
        let ty = PatybredConfig::for_method(Method::Tybred, &run).unwrap();
        let paty = PatybredConfig::for_method(Method::Patybred, &run).unwrap();
        assert!(!pa.so_type_feat);
        assert_eq!(pa.max_depth, 2);
        assert!(ty.so_type_feat);
        assert_eq!((ty.max_depth, ty.max_paths_per_level), (0, Some(0)));
        assert!(paty.so_type_feat);
        assert_eq!(paty.max_paths_per_level, None);
    }

    #[test]
    fn type_features_push_type_violations_down() {
        let fx = people_and_cities();
        let mut model = RelationalClassifier::new(Method::Tybred, config(Method::Tybred));
        model.train(&fx.data()).unwrap();

        let triples = extract_triples(fx.graph.relations()).unwrap().triples;
        let scores = model.score(&triples).unwrap().flatten(Method::Tybred).unwrap();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));

        let outlier = triples.iter().position(|t| *t == Triple::new(5, 0, 0)).unwrap();
        let typical = triples.iter().position(|t| *t == Triple::new(0, 6, 0)).unwrap();
        assert!(scores[outlier] < scores[typical]);
    }

    #[test]
    fn constrained_relations_get_domain_and_range_candidates() {
        let fx = people_and_cities();
        let data = fx.data();
        let typed = RelationalClassifier::new(Method::Tybred, config(Method::Tybred));
        assert_eq!(
            typed.constraint_candidates(&data, 0),
            vec![Feature::InDomain(vec![0]), Feature::InRange(vec![1])]
        );
        let untyped = RelationalClassifier::new(Method::Pabred, config(Method::Pabred));
        assert!(untyped.constraint_candidates(&data, 0).is_empty());
    }

    #[test]
    fn range_check_sees_through_the_hierarchy() {
        let fx = people_and_cities();
        let mut model = RelationalClassifier::new(Method::Tybred, config(Method::Tybred));
        model.train(&fx.data()).unwrap();
        let ctx = model.context.as_ref().unwrap();
        // Types are expanded with ancestors, so the shared parent type 2 matches both.
        let parent = Feature::InRange(vec![2]);
        assert_eq!(ctx.value(&parent, 0, 6), 1.0);
        assert_eq!(ctx.value(&parent, 5, 0), 1.0);
        let cities = Feature::InRange(vec![1]);
        assert_eq!(ctx.value(&cities, 0, 6), 1.0);
        assert_eq!(ctx.value(&cities, 5, 0), 0.0);
    }

    #[test]
    fn scoring_is_deterministic_and_training_is_reproducible() {
        let fx = people_and_cities();
        let triples = extract_triples(fx.graph.relations()).unwrap().triples;
        let mut a = RelationalClassifier::new(Method::Patybred, config(Method::Patybred));
        let mut b = RelationalClassifier::new(Method::Patybred, config(Method::Patybred));
        a.train(&fx.data()).unwrap();
        b.train(&fx.data()).unwrap();
        let first = a.score(&triples).unwrap();
        assert_eq!(first, a.score(&triples).unwrap());
        assert_eq!(first, b.score(&triples).unwrap());
    }

    #[test]
    fn disk_cache_and_sok_do_not_change_scores() {
        let fx = people_and_cities();
        let triples = extract_triples(fx.graph.relations()).unwrap().triples;
        let mut plain = RelationalClassifier::new(Method::Pabred, config(Method::Pabred));
        let mut cached = RelationalClassifier::new(
            Method::Pabred,
            PatybredConfig {
                reduce_mem_usage: true,
                convert_to_sok: true,
                ..config(Method::Pabred)
            },
        );
        plain.train(&fx.data()).unwrap();
        cached.train(&fx.data()).unwrap();
        assert_eq!(plain.score(&triples).unwrap(), cached.score(&triples).unwrap());
    }

    #[test]
    fn snapshot_restores_identical_scores() {
        let fx = people_and_cities();
        let triples = extract_triples(fx.graph.relations()).unwrap().triples;
        let mut model = RelationalClassifier::new(Method::Patybred, config(Method::Patybred));
        model.train(&fx.data()).unwrap();
        let bytes = model.snapshot().unwrap();
        let restored = RelationalClassifier::restore(
            Method::Patybred,
            config(Method::Patybred),
            Path::new("mem"),
            &bytes,
        )
        .unwrap();
        assert_eq!(model.score(&triples).unwrap(), restored.score(&triples).unwrap());
    }

    #[test]
    fn unseen_relation_fails_scoring() {
        let fx = people_and_cities();
        let mut model = RelationalClassifier::new(Method::Tybred, config(Method::Tybred));
        model.train(&fx.data()).unwrap();
        assert!(model.score(&[Triple::new(0, 1, 9)]).is_err());
    }
}
