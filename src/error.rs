//! Rich diagnostic error types for the factrank pipeline.
//!
//! Each stage defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a ranking run.
///
/// Each variant wraps a stage-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum FactRankError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("malformed graph: {message}")]
    #[diagnostic(
        code(factrank::graph::malformed),
        help(
            "Every relation needs a square adjacency matrix and all relations \
             must share the same entity count. Check the dataset's `n_entities` \
             and that every cell index is below it."
        )
    )]
    Malformed { message: String },

    #[error("failed to read dataset: {path}")]
    #[diagnostic(
        code(factrank::graph::dataset_read),
        help("Ensure the dataset file exists and is readable.")
    )]
    DatasetRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset {path}: {message}")]
    #[diagnostic(
        code(factrank::graph::dataset_parse),
        help(
            "The dataset must be a JSON document with `n_entities`, `relations` \
             and `adjacency` fields. Type data is optional."
        )
    )]
    DatasetParse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("unknown method: \"{name}\"")]
    #[diagnostic(
        code(factrank::model::unknown_method),
        help("Valid methods are: sdv, pabred, tybred, patybred, transe, rescal, hole, proje.")
    )]
    UnknownMethod { name: String },

    #[error("failed to load model from {path}: {message}")]
    #[diagnostic(
        code(factrank::model::load_failure),
        help(
            "The checkpoint could not be restored. Make sure it was written by \
             the same --method and by a compatible factrank version."
        )
    )]
    LoadFailure { path: String, message: String },

    #[error("{method} training failed: {message}")]
    #[diagnostic(
        code(factrank::model::training_failure),
        help(
            "The model could not be trained on this graph. A partially trained \
             model cannot rank facts, so the run was aborted."
        )
    )]
    TrainingFailure { method: String, message: String },

    #[error("{method} scoring failed: {message}")]
    #[diagnostic(
        code(factrank::model::scoring_failure),
        help(
            "The model returned scores that cannot be aligned with the triple \
             sequence. Every triple must receive exactly one finite score."
        )
    )]
    ScoringFailure { method: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Ranking errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RankError {
    #[error("cannot rank {triples} triples with {scores} scores")]
    #[diagnostic(
        code(factrank::rank::length_mismatch),
        help("The score sequence must be positionally aligned with the triple sequence.")
    )]
    LengthMismatch { triples: usize, scores: usize },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}")]
    #[diagnostic(
        code(factrank::store::io),
        help(
            "A filesystem operation failed. Check that the directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(factrank::store::serde),
        help(
            "Failed to serialize or deserialize data. A result file written by \
             another factrank version cannot be read back."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(factrank::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(factrank::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid value for {field}: \"{value}\"")]
    #[diagnostic(code(factrank::config::invalid_value), help("{expected}"))]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: String,
    },
}

/// Convenience alias for functions returning factrank results.
pub type FactRankResult<T> = std::result::Result<T, FactRankError>;

pub type GraphResult<T> = std::result::Result<T, GraphError>;
pub type ModelResult<T> = std::result::Result<T, ModelError>;
pub type RankResult<T> = std::result::Result<T, RankError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_top_level() {
        let err = GraphError::Malformed {
            message: "relation 1 is 3x4".into(),
        };
        let top: FactRankError = err.into();
        assert!(matches!(top, FactRankError::Graph(GraphError::Malformed { .. })));
    }

    #[test]
    fn model_error_converts_to_top_level() {
        let err = ModelError::UnknownMethod {
            name: "bogus".into(),
        };
        let top: FactRankError = err.into();
        assert!(matches!(top, FactRankError::Model(ModelError::UnknownMethod { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = RankError::LengthMismatch {
            triples: 3,
            scores: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));

        let err = ModelError::UnknownMethod {
            name: "bogus".into(),
        };
        assert!(format!("{err}").contains("bogus"));
    }
}
