//! Model registry: construction and restoration of every family by [`Method`].

use std::collections::HashMap;
use std::path::Path;

use crate::config::RunConfig;
use crate::error::ModelResult;

use super::checkpoint;
use super::embedding::{EmbeddingConfig, HolE, LatentModel, ProjE, ProjEConfig, Rescal, TransE};
use super::patybred::{PatybredConfig, RelationalClassifier};
use super::sdv::{SdvConfig, StatisticalValidator};
use super::{BuildContext, Method, ScoringModel};

/// Build an untrained model.
pub type BuildFn = fn(Method, &RunConfig, &BuildContext) -> ModelResult<Box<dyn ScoringModel>>;

/// Restore a trained model from a checkpoint payload read from `path`.
pub type RestoreFn = fn(Method, &RunConfig, &BuildContext, &Path, &[u8]) -> ModelResult<Box<dyn ScoringModel>>;

/// Constructors of one model family.
#[derive(Clone, Copy)]
pub struct Entry {
    pub build: BuildFn,
    pub restore: RestoreFn,
}

/// Maps each [`Method`] to its constructors.
pub struct ModelRegistry {
    entries: HashMap<Method, Entry>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A registry holding every built-in family.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Method::Sdv, Entry {
            build: build_sdv,
            restore: restore_sdv,
        });
        for m in [Method::Pabred, Method::Tybred, Method::Patybred] {
            registry.register(m, Entry {
                build: build_patybred,
                restore: restore_patybred,
            });
        }
        registry.register(Method::TransE, Entry {
            build: build_latent::<TransE>,
            restore: restore_latent::<TransE>,
        });
        registry.register(Method::Rescal, Entry {
            build: build_latent::<Rescal>,
            restore: restore_latent::<Rescal>,
        });
        registry.register(Method::Hole, Entry {
            build: build_latent::<HolE>,
            restore: restore_latent::<HolE>,
        });
        registry.register(Method::ProjE, Entry {
            build: build_proje,
            restore: restore_proje,
        });
        registry
    }

    /// Register a family. An existing entry for `method` is replaced.
    pub fn register(&mut self, method: Method, entry: Entry) {
        self.entries.insert(method, entry);
    }

    /// Whether `method` has constructors.
    pub fn contains(&self, method: Method) -> bool {
        self.entries.contains_key(&method)
    }

    fn entry(&self, method: Method) -> ModelResult<Entry> {
        self.entries
            .get(&method)
            .copied()
            .ok_or_else(|| crate::error::ModelError::UnknownMethod {
                name: method.to_string(),
            })
    }

    /// Build an untrained model of `method`.
    pub fn build(
        &self,
        method: Method,
        cfg: &RunConfig,
        ctx: &BuildContext,
    ) -> ModelResult<Box<dyn ScoringModel>> {
        let model = (self.entry(method)?.build)(method, cfg, ctx)?;
        tracing::debug!(%method, "model built");
        Ok(model)
    }

    /// Restore a trained model of `method` from the checkpoint at `path`.
    pub fn restore(
        &self,
        method: Method,
        cfg: &RunConfig,
        ctx: &BuildContext,
        path: &Path,
    ) -> ModelResult<Box<dyn ScoringModel>> {
        let entry = self.entry(method)?;
        let payload = checkpoint::read(path, method)?;
        let model = (entry.restore)(method, cfg, ctx, path, &payload)?;
        tracing::info!(%method, path = %path.display(), "model restored");
        Ok(model)
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no family is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.entries.keys().map(|m| m.as_str()).collect();
        methods.sort_unstable();
        f.debug_struct("ModelRegistry").field("methods", &methods).finish()
    }
}

fn shape(ctx: &BuildContext) -> (usize, usize) {
    (ctx.n_entities, ctx.n_relations)
}

fn build_sdv(_: Method, cfg: &RunConfig, _: &BuildContext) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(StatisticalValidator::new(SdvConfig::from_run(cfg)?)))
}

fn restore_sdv(
    _: Method,
    cfg: &RunConfig,
    _: &BuildContext,
    path: &Path,
    payload: &[u8],
) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(StatisticalValidator::restore(
        SdvConfig::from_run(cfg)?,
        path,
        payload,
    )?))
}

fn build_patybred(method: Method, cfg: &RunConfig, _: &BuildContext) -> ModelResult<Box<dyn ScoringModel>> {
    let config = PatybredConfig::for_method(method, cfg)?;
    Ok(Box::new(RelationalClassifier::new(method, config)))
}

fn restore_patybred(
    method: Method,
    cfg: &RunConfig,
    _: &BuildContext,
    path: &Path,
    payload: &[u8],
) -> ModelResult<Box<dyn ScoringModel>> {
    let config = PatybredConfig::for_method(method, cfg)?;
    Ok(Box::new(RelationalClassifier::restore(method, config, path, payload)?))
}

fn build_latent<I: super::embedding::Interaction + 'static>(
    _: Method,
    cfg: &RunConfig,
    ctx: &BuildContext,
) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(LatentModel::<I>::new(
        EmbeddingConfig::from_run(cfg)?,
        shape(ctx),
    )))
}

fn restore_latent<I: super::embedding::Interaction + 'static>(
    _: Method,
    cfg: &RunConfig,
    _: &BuildContext,
    path: &Path,
    payload: &[u8],
) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(LatentModel::<I>::restore(
        EmbeddingConfig::from_run(cfg)?,
        path,
        payload,
    )?))
}

fn build_proje(_: Method, cfg: &RunConfig, ctx: &BuildContext) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(ProjE::new(ProjEConfig::from_run(cfg, ctx)?, shape(ctx))))
}

fn restore_proje(
    _: Method,
    cfg: &RunConfig,
    ctx: &BuildContext,
    path: &Path,
    payload: &[u8],
) -> ModelResult<Box<dyn ScoringModel>> {
    Ok(Box::new(ProjE::restore(ProjEConfig::from_run(cfg, ctx)?, path, payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::fixtures::people_and_cities;

    fn ctx() -> BuildContext {
        BuildContext {
            n_entities: 12,
            n_relations: 2,
            checkpoint_path: None,
        }
    }

    #[test]
    fn defaults_cover_every_method() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(registry.len(), Method::ALL.len());
        for m in Method::ALL {
            assert!(registry.contains(m));
            let model = registry.build(m, &RunConfig::default(), &ctx()).unwrap();
            assert_eq!(model.method(), m);
        }
    }

    #[test]
    fn empty_registry_reports_unknown_method() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());
        let Err(err) = registry.build(Method::Sdv, &RunConfig::default(), &ctx()) else {
            panic!("empty registry built a model");
        };
        assert!(matches!(err, ModelError::UnknownMethod { .. }));
    }

    #[test]
    fn invalid_consumed_value_fails_build() {
        let cfg = RunConfig {
            classifier: "svm".into(),
            ..Default::default()
        };
        let registry = ModelRegistry::with_defaults();
        assert!(matches!(
            registry.build(Method::Patybred, &cfg, &ctx()),
            Err(ModelError::Config(_))
        ));
        // Fields a family does not consume are not validated.
        assert!(registry.build(Method::TransE, &cfg, &ctx()).is_ok());
    }

    #[test]
    fn restore_rejects_checkpoint_of_another_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdv.ckpt");
        let fx = people_and_cities();
        let registry = ModelRegistry::with_defaults();
        let cfg = RunConfig::default();
        let mut model = registry.build(Method::Sdv, &cfg, &ctx()).unwrap();
        model.train(&fx.data()).unwrap();
        checkpoint::write(&path, Method::Sdv, model.snapshot().unwrap()).unwrap();

        assert!(registry.restore(Method::Sdv, &cfg, &ctx(), &path).is_ok());
        assert!(matches!(
            registry.restore(Method::TransE, &cfg, &ctx(), &path),
            Err(ModelError::LoadFailure { .. })
        ));
    }

    #[test]
    fn replacing_an_entry_takes_effect() {
        fn failing(_: Method, _: &RunConfig, _: &BuildContext) -> ModelResult<Box<dyn ScoringModel>> {
            Err(ModelError::TrainingFailure {
                method: "sdv".into(),
                message: "disabled".into(),
            })
        }
        let mut registry = ModelRegistry::with_defaults();
        registry.register(Method::Sdv, Entry {
            build: failing,
            restore: restore_sdv,
        });
        assert!(registry.build(Method::Sdv, &RunConfig::default(), &ctx()).is_err());
    }
}
