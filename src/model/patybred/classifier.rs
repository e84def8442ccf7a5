//! Binary classifiers over dense 0/1 feature vectors.
//!
//! Each relation gets its own classifier predicting P(fact is true).

use rand::Rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::model::sigmoid;

/// Classifier family selected by `--classifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    /// Bagged decision trees (`rf`).
    RandomForest,
    /// L2-regularized logistic regression (`lr`).
    Logistic,
    /// Bernoulli naive Bayes (`nb`).
    NaiveBayes,
}

impl ClassifierKind {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s {
            "rf" => Ok(ClassifierKind::RandomForest),
            "lr" | "logreg" => Ok(ClassifierKind::Logistic),
            "nb" => Ok(ClassifierKind::NaiveBayes),
            other => Err(ConfigError::InvalidValue {
                field: "classifier",
                value: other.into(),
                expected: "Use `rf` (random forest), `lr` (logistic regression) or `nb` (naive Bayes).".into(),
            }),
        }
    }
}

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    /// Training data had a single class.
    Constant(f64),
    Logistic(LogisticRegression),
    NaiveBayes(BernoulliNb),
    Forest(RandomForest),
}

impl Classifier {
    /// Fit on rows `x` with labels `y`.
    pub fn fit(kind: ClassifierKind, x: &[Vec<f64>], y: &[bool], rng: &mut impl Rng) -> Self {
        let positives = y.iter().filter(|&&l| l).count();
        if positives == 0 || positives == y.len() {
            return Classifier::Constant(if positives == 0 { 0.0 } else { 1.0 });
        }
        match kind {
            ClassifierKind::Logistic => Classifier::Logistic(LogisticRegression::fit(x, y)),
            ClassifierKind::NaiveBayes => Classifier::NaiveBayes(BernoulliNb::fit(x, y)),
            ClassifierKind::RandomForest => Classifier::Forest(RandomForest::fit(x, y, rng)),
        }
    }

    /// Probability that `x` is a true fact.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        match self {
            Classifier::Constant(p) => *p,
            Classifier::Logistic(m) => m.predict_proba(x),
            Classifier::NaiveBayes(m) => m.predict_proba(x),
            Classifier::Forest(m) => m.predict_proba(x),
        }
    }
}

// ---------------------------------------------------------------------------
// Logistic regression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    const ITERATIONS: usize = 300;
    const LEARNING_RATE: f64 = 0.5;
    const L2: f64 = 1e-3;

    /// Full-batch gradient descent on the log loss.
    pub fn fit(x: &[Vec<f64>], y: &[bool]) -> Self {
        let dims = x.first().map_or(0, Vec::len);
        let n = x.len().max(1) as f64;
        let mut weights = vec![0.0; dims];
        let mut bias = 0.0;

        for _ in 0..Self::ITERATIONS {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;
            for (row, &label) in x.iter().zip(y) {
                let z = bias + row.iter().zip(&weights).map(|(a, w)| a * w).sum::<f64>();
                let err = sigmoid(z) - if label { 1.0 } else { 0.0 };
                for (g, a) in grad_w.iter_mut().zip(row) {
                    *g += err * a;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= Self::LEARNING_RATE * (g / n + Self::L2 * *w);
            }
            bias -= Self::LEARNING_RATE * grad_b / n;
        }
        Self { weights, bias }
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let z = self.bias + x.iter().zip(&self.weights).map(|(a, w)| a * w).sum::<f64>();
        sigmoid(z)
    }
}

// ---------------------------------------------------------------------------
// Bernoulli naive Bayes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BernoulliNb {
    log_prior: [f64; 2],
    /// P(feature = 1 | class), Laplace smoothed; index 0 = negative class.
    feature_prob: [Vec<f64>; 2],
}

impl BernoulliNb {
    pub fn fit(x: &[Vec<f64>], y: &[bool]) -> Self {
        let dims = x.first().map_or(0, Vec::len);
        let mut counts = [vec![0.0; dims], vec![0.0; dims]];
        let mut class_n = [0.0f64; 2];
        for (row, &label) in x.iter().zip(y) {
            let c = usize::from(label);
            class_n[c] += 1.0;
            for (acc, &v) in counts[c].iter_mut().zip(row) {
                if v > 0.5 {
                    *acc += 1.0;
                }
            }
        }
        let total = class_n[0] + class_n[1];
        let feature_prob = [0, 1].map(|c| {
            counts[c]
                .iter()
                .map(|&k| (k + 1.0) / (class_n[c] + 2.0))
                .collect::<Vec<f64>>()
        });
        Self {
            log_prior: [(class_n[0] / total).ln(), (class_n[1] / total).ln()],
            feature_prob,
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let joint = [0, 1].map(|c| {
            self.log_prior[c]
                + self.feature_prob[c]
                    .iter()
                    .zip(x)
                    .map(|(&p, &v)| if v > 0.5 { p.ln() } else { (1.0 - p).ln() })
                    .sum::<f64>()
        });
        sigmoid(joint[1] - joint[0])
    }
}

// ---------------------------------------------------------------------------
// Random forest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf(f64),
    Split {
        feature: usize,
        /// Child for feature value 0.
        off: usize,
        /// Child for feature value 1.
        on: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                TreeNode::Leaf(p) => return p,
                TreeNode::Split { feature, off, on } => {
                    i = if x.get(feature).copied().unwrap_or(0.0) > 0.5 {
                        on
                    } else {
                        off
                    };
                }
            }
        }
    }
}

/// Gini impurity of a node with `pos` positives out of `n`.
fn gini(pos: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let p = pos / n;
    2.0 * p * (1.0 - p)
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    max_depth: usize,
    max_features: usize,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: &[usize], depth: usize, rng: &mut impl Rng) -> usize {
        let id = self.nodes.len();
        let n = rows.len() as f64;
        let pos = rows.iter().filter(|&&r| self.y[r]).count() as f64;
        self.nodes.push(TreeNode::Leaf(pos / n.max(1.0)));
        if depth >= self.max_depth || rows.len() < 2 || pos == 0.0 || pos == n {
            return id;
        }

        let dims = self.x[0].len();
        let candidates = sample(rng, dims, self.max_features.min(dims));
        let parent = gini(pos, n);
        let mut best: Option<(usize, f64)> = None;
        for f in candidates.into_iter() {
            let (mut on_n, mut on_pos) = (0.0, 0.0);
            for &r in rows {
                if self.x[r][f] > 0.5 {
                    on_n += 1.0;
                    if self.y[r] {
                        on_pos += 1.0;
                    }
                }
            }
            if on_n == 0.0 || on_n == n {
                continue;
            }
            let off_n = n - on_n;
            let off_pos = pos - on_pos;
            let impurity = (on_n * gini(on_pos, on_n) + off_n * gini(off_pos, off_n)) / n;
            let gain = parent - impurity;
            if gain > 1e-12 && best.is_none_or(|(_, g)| gain > g) {
                best = Some((f, gain));
            }
        }

        let Some((feature, _)) = best else {
            return id;
        };
        let (on_rows, off_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().copied().partition(|&r| self.x[r][feature] > 0.5);
        let off = self.build(&off_rows, depth + 1, rng);
        let on = self.build(&on_rows, depth + 1, rng);
        self.nodes[id] = TreeNode::Split { feature, off, on };
        id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    const N_TREES: usize = 25;
    const MAX_DEPTH: usize = 8;

    /// Bootstrap-aggregated Gini trees with `sqrt(d)` features per split.
    pub fn fit(x: &[Vec<f64>], y: &[bool], rng: &mut impl Rng) -> Self {
        let dims = x.first().map_or(0, Vec::len);
        let max_features = ((dims as f64).sqrt().ceil() as usize).max(1);
        let trees = (0..Self::N_TREES)
            .map(|_| {
                let rows: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    max_depth: Self::MAX_DEPTH,
                    max_features,
                    nodes: Vec::new(),
                };
                if dims > 0 {
                    builder.build(&rows, 0, rng);
                } else {
                    let pos = rows.iter().filter(|&&r| y[r]).count() as f64;
                    builder.nodes.push(TreeNode::Leaf(pos / rows.len().max(1) as f64));
                }
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();
        Self { trees }
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Feature 0 decides the label, feature 1 is noise.
    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let label = i % 2 == 0;
            x.push(vec![if label { 1.0 } else { 0.0 }, (i % 3 == 0) as u8 as f64]);
            y.push(label);
        }
        (x, y)
    }

    #[test]
    fn every_kind_learns_a_separable_feature() {
        let (x, y) = separable();
        for kind in [
            ClassifierKind::Logistic,
            ClassifierKind::NaiveBayes,
            ClassifierKind::RandomForest,
        ] {
            let mut rng = rand::rngs::StdRng::seed_from_u64(9);
            let clf = Classifier::fit(kind, &x, &y, &mut rng);
            let p_true = clf.predict_proba(&[1.0, 0.0]);
            let p_false = clf.predict_proba(&[0.0, 0.0]);
            assert!(p_true > 0.5, "{kind:?}: {p_true}");
            assert!(p_false < 0.5, "{kind:?}: {p_false}");
        }
    }

    #[test]
    fn single_class_is_constant() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let clf = Classifier::fit(
            ClassifierKind::RandomForest,
            &[vec![1.0], vec![0.0]],
            &[true, true],
            &mut rng,
        );
        assert_eq!(clf, Classifier::Constant(1.0));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(ClassifierKind::parse("rf").unwrap(), ClassifierKind::RandomForest);
        assert!(ClassifierKind::parse("svm").is_err());
    }
}
