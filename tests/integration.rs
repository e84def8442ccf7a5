//! End-to-end ranking runs over JSON datasets.

use std::path::{Path, PathBuf};

use factrank::config::RunConfig;
use factrank::error::{FactRankError, GraphError, ModelError};
use factrank::graph::Triple;
use factrank::model::Method;
use factrank::pipeline::{RunOptions, run};
use factrank::results::read_ranked;

/// People 0..6, cities 6..12. `livesIn` has one person → person outlier (5, 0).
fn write_people_and_cities(dir: &Path) -> PathBuf {
    let mut lives: Vec<[u32; 2]> = (0..6).map(|i| [i, 6 + i]).collect();
    lives.push([5, 0]);
    let born: Vec<[u32; 2]> = (0..4).map(|i| [i, 6 + i]).collect();
    let types: Vec<[u32; 2]> = (0..12).map(|e| [e, if e < 6 { 0 } else { 1 }]).collect();
    let doc = serde_json::json!({
        "n_entities": 12,
        "relations": { "http://ex.org/livesIn": 0, "http://ex.org/bornIn": 1 },
        "adjacency": [lives, born],
        "n_types": 3,
        "type_assertions": types,
        "type_hierarchy": [[0, 2], [1, 2]],
        "domains": [[0, 0], [1, 0]],
        "ranges": [[0, 1], [1, 1]],
    });
    let path = dir.join("kg.json");
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

fn fast_config() -> RunConfig {
    RunConfig {
        dimensions: 8,
        n_epochs: 20,
        classifier: "lr".into(),
        ..Default::default()
    }
}

#[test]
fn unknown_method_fails_before_the_dataset_is_read() {
    let opts = RunOptions::new("/nonexistent/kg.json", "bogus");
    let err = run(&opts).unwrap_err();
    assert!(matches!(
        err,
        FactRankError::Model(ModelError::UnknownMethod { ref name }) if name == "bogus"
    ));
}

#[test]
fn every_method_ranks_every_fact() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_people_and_cities(dir.path());

    for method in Method::ALL {
        let mut opts = RunOptions::new(&input, method.as_str());
        opts.config = fast_config();
        opts.output = Some(dir.path().join(format!("{method}.bin")));
        let report = run(&opts).unwrap();

        assert_eq!(report.method, method);
        assert_eq!(report.ranked.len(), 11, "{method}");
        assert!(report.training_time.is_some());
        for w in report.ranked.windows(2) {
            assert!(w[0].score <= w[1].score, "{method}");
            assert!(w[0].rank <= w[1].rank, "{method}");
        }
        assert_eq!(read_ranked(&report.output).unwrap(), report.ranked);
    }
}

#[test]
fn type_violation_ranks_first_under_the_statistic() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_people_and_cities(dir.path());
    let mut opts = RunOptions::new(&input, "sdv");
    opts.config.outlier_detection_method = "sd".into();

    let report = run(&opts).unwrap();
    assert_eq!(report.ranked[0].triple, Triple::new(5, 0, 0));
    assert_eq!(report.ranked[0].rank, 1.0);
}

#[test]
fn default_output_sits_next_to_the_input() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_people_and_cities(dir.path());
    let report = run(&RunOptions::new(&input, "sdv")).unwrap();
    assert_eq!(report.output, dir.path().join("kg-ranked-facts-sdv.bin"));
    assert!(report.output.exists());
}

#[test]
fn plots_are_written_per_relation() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_people_and_cities(dir.path());
    let plots = dir.path().join("plots");
    let mut opts = RunOptions::new(&input, "sdv");
    opts.plot = true;
    opts.plot_dir = Some(plots.clone());

    let report = run(&opts).unwrap();
    assert_eq!(report.relation_names, vec!["http://ex.org/livesIn", "http://ex.org/bornIn"]);
    for name in ["alltriples.svg", "livesIn.svg", "bornIn.svg"] {
        assert!(plots.join(name).exists(), "{name}");
    }
}

#[test]
fn out_of_range_cell_is_a_malformed_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("bad.json");
    std::fs::write(&input, r#"{"n_entities": 2, "adjacency": [[[0, 5]]]}"#).unwrap();
    let err = run(&RunOptions::new(&input, "sdv")).unwrap_err();
    assert!(matches!(err, FactRankError::Graph(GraphError::Malformed { .. })));
}

#[test]
fn invalid_hyperparameter_is_a_config_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = write_people_and_cities(dir.path());
    let mut opts = RunOptions::new(&input, "patybred");
    opts.config.path_selection_mode = "m9".into();
    let err = run(&opts).unwrap_err();
    assert!(matches!(err, FactRankError::Model(ModelError::Config(_))));
}
