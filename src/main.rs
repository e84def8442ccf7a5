//! factrank CLI: rank knowledge-graph facts by anomaly score.

use std::path::PathBuf;

use clap::Parser;
use miette::Result;

use factrank::config::RunConfig;
use factrank::pipeline::{RunOptions, run};

#[derive(Parser)]
#[command(
    name = "factrank",
    version,
    about = "Rank knowledge-graph facts from most to least anomalous"
)]
struct Cli {
    /// Dataset file (JSON).
    input: PathBuf,

    /// Ranked-result file [default: <input stem>-ranked-facts-<method>.bin].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Restore a trained model from this checkpoint instead of training.
    #[arg(long, visible_alias = "lp")]
    load_path: Option<PathBuf>,

    /// Save the trained model (and periodic checkpoints) to this path.
    #[arg(long, visible_alias = "sp")]
    save_path: Option<PathBuf>,

    /// Model family: sdv, pabred, tybred, patybred, transe, rescal, hole, proje.
    #[arg(short, long, default_value = "sdv")]
    method: String,

    /// Base configuration file (TOML); flags given here override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Feature selection method [default: chi2].
    #[arg(long, visible_alias = "fs")]
    feature_selection: Option<String>,

    /// Number of features to keep [default: 10].
    #[arg(long, visible_alias = "mf")]
    max_feats: Option<usize>,

    /// Loss weight of negative examples [default: 1].
    #[arg(long, visible_alias = "negw")]
    neg_weight: Option<f64>,

    /// Negative examples per positive [default: 1].
    #[arg(long, visible_alias = "nneg")]
    n_negatives: Option<usize>,

    /// Maximum relation-path length [default: 2].
    #[arg(long, visible_alias = "mpl")]
    max_path_length: Option<usize>,

    /// Maximum relation paths kept per length [default: unbounded].
    #[arg(long, visible_alias = "mppl")]
    max_paths_per_level: Option<usize>,

    /// Minimum relation-path support [default: 0.001].
    #[arg(long, visible_alias = "minsup")]
    minimum_support: Option<f64>,

    /// Embedding dimensions [default: 100].
    #[arg(short, long)]
    dimensions: Option<usize>,

    /// Epochs between checkpoints, 0 disables [default: 0].
    #[arg(long, visible_alias = "ckp")]
    checkpoint_freq: Option<usize>,

    /// Training epochs [default: 100].
    #[arg(long, visible_alias = "ne")]
    n_epochs: Option<usize>,

    /// Outlier detection method: if, sd [default: if].
    #[arg(long, visible_alias = "od")]
    outlier_detection_method: Option<String>,

    /// Classifier: rf, lr, nb [default: rf].
    #[arg(long, visible_alias = "clf")]
    classifier: Option<String>,

    /// Path selection mode: m1, m2 [default: m2].
    #[arg(long, visible_alias = "psm")]
    path_selection_mode: Option<String>,

    /// Maximum feature-selection data size [default: 500].
    #[arg(long, visible_alias = "mfs")]
    max_fs: Option<usize>,

    /// Maximum positives per relation for training [default: 2500].
    #[arg(long, visible_alias = "mts")]
    max_ts: Option<usize>,

    /// Random seed [default: 42].
    #[arg(long)]
    seed: Option<u64>,

    /// Use hash-based cell access.
    #[arg(long, visible_alias = "sok")]
    convert_to_sok: bool,

    /// Evict trained per-relation models to disk.
    #[arg(long, visible_alias = "mc")]
    mem_cache: bool,

    /// Write score histograms.
    #[arg(long, visible_alias = "pp")]
    plot: bool,

    /// Histogram directory [default: the output file's directory].
    #[arg(long)]
    plot_dir: Option<PathBuf>,

    /// Add type assertions as training facts (ProjE).
    #[arg(long, visible_alias = "ut")]
    use_types: bool,

    /// Print the N most anomalous facts.
    #[arg(long, default_value = "0")]
    show: usize,
}

impl Cli {
    /// The file configuration (or defaults) with every given flag applied.
    fn run_config(&self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = &self.feature_selection {
            cfg.feature_selection = v.clone();
        }
        if let Some(v) = self.max_feats {
            cfg.max_feats = v;
        }
        if let Some(v) = self.neg_weight {
            cfg.neg_weight = v;
        }
        if let Some(v) = self.n_negatives {
            cfg.n_negatives = v;
        }
        if let Some(v) = self.max_path_length {
            cfg.max_path_length = v;
        }
        if let Some(v) = self.minimum_support {
            cfg.minimum_support = v;
        }
        if let Some(v) = self.dimensions {
            cfg.dimensions = v;
        }
        if let Some(v) = self.checkpoint_freq {
            cfg.checkpoint_freq = v;
        }
        if let Some(v) = self.n_epochs {
            cfg.n_epochs = v;
        }
        if let Some(v) = &self.outlier_detection_method {
            cfg.outlier_detection_method = v.clone();
        }
        if let Some(v) = &self.classifier {
            cfg.classifier = v.clone();
        }
        if let Some(v) = &self.path_selection_mode {
            cfg.path_selection_mode = v.clone();
        }
        if let Some(v) = self.max_fs {
            cfg.max_fs = v;
        }
        if let Some(v) = self.max_ts {
            cfg.max_ts = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if self.max_paths_per_level.is_some() {
            cfg.max_paths_per_level = self.max_paths_per_level;
        }
        cfg.convert_to_sok |= self.convert_to_sok;
        cfg.mem_cache |= self.mem_cache;
        cfg.use_types |= self.use_types;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.run_config()?;
    tracing::debug!(?config, "effective configuration");

    let opts = RunOptions {
        input: cli.input.clone(),
        output: cli.output.clone(),
        load_path: cli.load_path.clone(),
        save_path: cli.save_path.clone(),
        method: cli.method.clone(),
        plot: cli.plot,
        plot_dir: cli.plot_dir.clone(),
        config,
    };
    let report = run(&opts)?;

    println!(
        "Ranked {} facts with {} -> {}",
        report.ranked.len(),
        report.method,
        report.output.display()
    );
    if let Some(t) = report.training_time {
        println!("Training time = {:.3} s", t.as_secs_f64());
    }
    for fact in report.ranked.iter().take(cli.show) {
        let t = fact.triple;
        let relation = report
            .relation_names
            .get(t.predicate as usize)
            .map(String::as_str)
            .unwrap_or("?");
        println!(
            "  {:>8} {:>12.6}  ({}, {}, {})",
            fact.rank, fact.score, t.subject, relation, t.object
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            "n_epochs = 50\ndimensions = 16\nclassifier = \"lr\"\nmem_cache = true\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "factrank",
            "kg.json",
            "--config",
            path.to_str().unwrap(),
            "--ne",
            "5",
            "--clf",
            "nb",
            "--mppl",
            "3",
            "--sok",
        ]);
        let cfg = cli.run_config().unwrap();
        assert_eq!(cfg.n_epochs, 5);
        assert_eq!(cfg.classifier, "nb");
        assert_eq!(cfg.max_paths_per_level, Some(3));
        assert!(cfg.convert_to_sok);
        // Values only the file sets survive.
        assert_eq!(cfg.dimensions, 16);
        assert!(cfg.mem_cache);
        assert_eq!(cfg.seed, RunConfig::default().seed);
    }

    #[test]
    fn without_a_file_flags_apply_over_defaults() {
        let cli = Cli::parse_from(["factrank", "kg.json", "-m", "transe", "-d", "32", "--seed", "9"]);
        let cfg = cli.run_config().unwrap();
        assert_eq!(cli.method, "transe");
        assert_eq!(cfg.dimensions, 32);
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.n_epochs, RunConfig::default().n_epochs);
    }
}
