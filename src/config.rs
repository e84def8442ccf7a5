//! Run configuration: the full hyperparameter bundle.
//!
//! [`RunConfig`] is what the CLI (and an optional TOML file) produce. It is
//! never handed to a model as-is: each registry entry extracts the fields its
//! model family consumes into a dedicated config struct.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Every hyperparameter a ranking run accepts, with CLI defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Feature selection method for the relational classifier (`chi2`, `none`).
    pub feature_selection: String,
    /// Number of features kept by feature selection.
    pub max_feats: usize,
    /// Loss weight of negative examples (ProjE).
    pub neg_weight: f64,
    /// Negative examples generated per positive.
    pub n_negatives: usize,
    /// Maximum relation-path length.
    pub max_path_length: usize,
    /// Paths kept per path length. `None` is unbounded.
    pub max_paths_per_level: Option<usize>,
    /// Minimum support of a relation path among positives.
    pub minimum_support: f64,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Write a checkpoint every N epochs (0 disables).
    pub checkpoint_freq: usize,
    /// Training epochs for embedding models.
    pub n_epochs: usize,
    /// Outlier detection method for the statistical validator (`if`, `sd`).
    pub outlier_detection_method: String,
    /// Classifier of the relational classifier (`rf`, `lr`, `nb`).
    pub classifier: String,
    /// Path selection mode (`m1`, `m2`).
    pub path_selection_mode: String,
    /// Maximum number of examples used for feature selection.
    pub max_fs: usize,
    /// Maximum number of positives per relation used for training.
    pub max_ts: usize,
    /// Use hash-based cell access instead of binary search.
    pub convert_to_sok: bool,
    /// Evict trained per-relation models to disk.
    pub mem_cache: bool,
    /// Add type assertions as training facts (ProjE).
    pub use_types: bool,
    /// Seed for every random choice in training.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            feature_selection: "chi2".into(),
            max_feats: 10,
            neg_weight: 1.0,
            n_negatives: 1,
            max_path_length: 2,
            max_paths_per_level: None,
            minimum_support: 0.001,
            dimensions: 100,
            checkpoint_freq: 0,
            n_epochs: 100,
            outlier_detection_method: "if".into(),
            classifier: "rf".into(),
            path_selection_mode: "m2".into(),
            max_fs: 500,
            max_ts: 2500,
            convert_to_sok: false,
            mem_cache: false,
            use_types: false,
            seed: 42,
        }
    }
}

impl RunConfig {
    /// Load from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "dimensions = 16\nclassifier = \"lr\"\nmax_paths_per_level = 5\n")
            .unwrap();

        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.dimensions, 16);
        assert_eq!(cfg.classifier, "lr");
        assert_eq!(cfg.max_paths_per_level, Some(5));
        assert_eq!(cfg.n_epochs, 100);
        assert_eq!(cfg.feature_selection, "chi2");
    }

    #[test]
    fn saved_config_loads_back() {
        let cfg = RunConfig {
            seed: 7,
            mem_cache: true,
            max_paths_per_level: Some(4),
            ..Default::default()
        };
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn bad_toml_reports_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "dimensions = \"many\"").unwrap();
        assert!(matches!(
            RunConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
