//! Isolation forest outlier detector.
//!
//! Points are isolated by random axis-aligned splits; anomalies need fewer
//! splits. The anomaly score is `2^(-E[h(x)] / c(ψ))` in `(0, 1]`, where
//! values near 1 are anomalous and values well below 0.5 are normal.

use rand::Rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
fn c(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn grow(points: &[&[f64]], max_depth: usize, rng: &mut impl Rng) -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.build(points, 0, max_depth, rng);
        tree
    }

    fn build(&mut self, points: &[&[f64]], depth: usize, max_depth: usize, rng: &mut impl Rng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: points.len() });
        if depth >= max_depth || points.len() <= 1 {
            return id;
        }

        // Only features with spread can split.
        let dims = points[0].len();
        let spread: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|f| {
                let lo = points.iter().map(|p| p[f]).fold(f64::INFINITY, f64::min);
                let hi = points.iter().map(|p| p[f]).fold(f64::NEG_INFINITY, f64::max);
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();
        if spread.is_empty() {
            return id;
        }

        let (feature, lo, hi) = spread[rng.gen_range(0..spread.len())];
        let threshold = rng.gen_range(lo..hi);
        let (l, r): (Vec<&[f64]>, Vec<&[f64]>) =
            points.iter().copied().partition(|p| p[feature] < threshold);
        let left = self.build(&l, depth + 1, max_depth, rng);
        let right = self.build(&r, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + c(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x.get(*feature).copied().unwrap_or(0.0) < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// A fitted isolation forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Tree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Default number of trees.
    pub const DEFAULT_TREES: usize = 100;
    /// Default subsample size per tree.
    pub const DEFAULT_SAMPLE: usize = 256;

    /// Fit on `points` (all of equal dimension).
    pub fn fit(points: &[Vec<f64>], n_trees: usize, max_samples: usize, rng: &mut impl Rng) -> Self {
        let sample_size = points.len().min(max_samples);
        if sample_size == 0 {
            return Self {
                trees: Vec::new(),
                sample_size: 0,
            };
        }
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let trees = (0..n_trees)
            .map(|_| {
                let picked: Vec<&[f64]> = sample(rng, points.len(), sample_size)
                    .into_iter()
                    .map(|i| points[i].as_slice())
                    .collect();
                Tree::grow(&picked, max_depth, rng)
            })
            .collect();
        Self { trees, sample_size }
    }

    /// Anomaly score in `(0, 1]`; 0.5 when the forest is empty.
    pub fn anomaly_score(&self, x: &[f64]) -> f64 {
        let norm = c(self.sample_size);
        if self.trees.is_empty() || norm == 0.0 {
            return 0.5;
        }
        let mean = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean / norm)
    }
}
