//! The ranking run: load, train or restore, score, rank, write.
//!
//! Stages run strictly in sequence and the first failure aborts the run.
//! The method identifier is resolved before the dataset is touched, so an
//! unknown method costs nothing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::diagnostics;
use crate::error::{FactRankResult, ModelError, ModelResult};
use crate::graph::dataset::Dataset;
use crate::graph::{Triple, extract_triples};
use crate::model::registry::ModelRegistry;
use crate::model::{BuildContext, Method, ScoringModel, TrainingData, checkpoint};
use crate::rank::{RankedFact, rank_facts};
use crate::results;

/// Everything one run needs besides the hyperparameters' defaults.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Dataset file.
    pub input: PathBuf,
    /// Ranked-result file; derived from `input` when absent.
    pub output: Option<PathBuf>,
    /// Restore this checkpoint instead of training.
    pub load_path: Option<PathBuf>,
    /// Write the trained model here (and periodic checkpoints, if enabled).
    pub save_path: Option<PathBuf>,
    /// Method identifier as given by the user.
    pub method: String,
    /// Write score histograms.
    pub plot: bool,
    /// Histogram directory; defaults to the output file's directory.
    pub plot_dir: Option<PathBuf>,
    pub config: RunConfig,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, method: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: None,
            load_path: None,
            save_path: None,
            method: method.into(),
            plot: false,
            plot_dir: None,
            config: RunConfig::default(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub method: Method,
    pub output: PathBuf,
    /// `None` when the model was restored.
    pub training_time: Option<Duration>,
    pub ranked: Vec<RankedFact>,
    /// Relation names by id.
    pub relation_names: Vec<String>,
}

/// Train `model`, returning the wall-clock time spent.
pub fn train_model(model: &mut dyn ScoringModel, data: &TrainingData<'_>) -> ModelResult<Duration> {
    let start = Instant::now();
    model.train(data)?;
    let elapsed = start.elapsed();
    tracing::info!(
        method = %model.method(),
        seconds = elapsed.as_secs_f64(),
        "training time"
    );
    Ok(elapsed)
}

/// Score `triples` in order, flattening whatever shape the model returns.
pub fn score_triples(model: &dyn ScoringModel, triples: &[Triple]) -> ModelResult<Vec<f64>> {
    let method = model.method();
    let scores = model.score(triples)?.flatten(method)?;
    if scores.len() != triples.len() {
        return Err(ModelError::ScoringFailure {
            method: method.to_string(),
            message: format!("{} scores returned for {} triples", scores.len(), triples.len()),
        });
    }
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(ModelError::ScoringFailure {
            method: method.to_string(),
            message: format!("score of {} is NaN", triples[i]),
        });
    }
    Ok(scores)
}

/// Run with the built-in model families.
pub fn run(opts: &RunOptions) -> FactRankResult<RunReport> {
    run_with(&ModelRegistry::with_defaults(), opts)
}

/// Run with the families of `registry`.
pub fn run_with(registry: &ModelRegistry, opts: &RunOptions) -> FactRankResult<RunReport> {
    let method: Method = opts.method.parse()?;
    let dataset = Dataset::load(&opts.input)?;
    let triples = extract_triples(dataset.graph.relations())?;
    tracing::info!(%method, triples = triples.len(), "ranking run started");

    let ctx = BuildContext {
        n_entities: triples.n_entities,
        n_relations: triples.n_relations,
        checkpoint_path: opts.save_path.clone(),
    };
    let data = TrainingData {
        graph: &dataset.graph,
        types: &dataset.types,
        type_hierarchy: &dataset.type_hierarchy,
        domains: &dataset.domains,
        ranges: &dataset.ranges,
    };

    let (model, training_time) = match &opts.load_path {
        Some(path) => (registry.restore(method, &opts.config, &ctx, path)?, None),
        None => {
            let mut model = registry.build(method, &opts.config, &ctx)?;
            let elapsed = train_model(model.as_mut(), &data)?;
            if let Some(path) = &opts.save_path {
                checkpoint::write(path, method, model.snapshot()?)?;
                tracing::info!(path = %path.display(), "trained model saved");
            }
            (model, Some(elapsed))
        }
    };

    let scores = score_triples(model.as_ref(), &triples.triples)?;
    let ranked = rank_facts(&triples.triples, &scores)?;

    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| results::default_output_path(&opts.input, method));
    results::write_ranked(&output, &ranked)?;

    let relation_names = dataset.relation_names();
    if opts.plot {
        let dir = opts.plot_dir.clone().unwrap_or_else(|| parent_dir(&output));
        diagnostics::write_plots(&dir, &triples.triples, &scores, &relation_names, triples.n_relations)?;
    }

    Ok(RunReport {
        method,
        output,
        training_time,
        ranked,
        relation_names,
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawScores;

    struct Fixed(RawScores);

    impl ScoringModel for Fixed {
        fn method(&self) -> Method {
            Method::Sdv
        }
        fn train(&mut self, _: &TrainingData<'_>) -> ModelResult<()> {
            Ok(())
        }
        fn score(&self, _: &[Triple]) -> ModelResult<RawScores> {
            Ok(self.0.clone())
        }
        fn snapshot(&self) -> ModelResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn triples(n: u32) -> Vec<Triple> {
        (0..n).map(|i| Triple::new(i, i, 0)).collect()
    }

    #[test]
    fn column_shapes_are_flattened() {
        let model = Fixed(RawScores::with_shape(vec![2, 1], vec![0.3, 0.1]));
        assert_eq!(score_triples(&model, &triples(2)).unwrap(), vec![0.3, 0.1]);
    }

    #[test]
    fn wrong_count_is_a_scoring_failure() {
        let model = Fixed(RawScores::column(vec![0.3]));
        assert!(matches!(
            score_triples(&model, &triples(2)),
            Err(ModelError::ScoringFailure { .. })
        ));
    }

    #[test]
    fn nan_is_a_scoring_failure() {
        let model = Fixed(RawScores::column(vec![0.3, f64::NAN]));
        assert!(matches!(
            score_triples(&model, &triples(2)),
            Err(ModelError::ScoringFailure { .. })
        ));
    }

    #[test]
    fn plot_dir_defaults_to_output_parent() {
        assert_eq!(parent_dir(Path::new("out/r.bin")), PathBuf::from("out"));
        assert_eq!(parent_dir(Path::new("r.bin")), PathBuf::from("."));
    }
}
