// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # factrank
//!
//! Ranks the facts of a knowledge graph by how anomalous they look. A
//! pluggable scoring model is trained on (or restored for) the graph, scores
//! every fact, and the facts are written most-anomalous first.
//!
//! ## Architecture
//!
//! - **Graph** (`graph`): per-relation sparse adjacency, triple extraction, type schema
//! - **Models** (`model`): statistical validator, path/type classifiers, embeddings
//! - **Pipeline** (`pipeline`): load → train or restore → score → rank → write
//! - **Ranking** (`rank`): average-tie ranks with a stable ascending order
//! - **Results** (`results`) and **diagnostics** (`diagnostics`): output blob and histograms
//!
//! ## Library usage
//!
//! ```no_run
//! use factrank::pipeline::{RunOptions, run};
//!
//! let report = run(&RunOptions::new("kg.json", "patybred")).unwrap();
//! for fact in report.ranked.iter().take(10) {
//!     println!("{} {:.4} {}", fact.rank, fact.score, fact.triple);
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod model;
pub mod pipeline;
pub mod rank;
pub mod results;
