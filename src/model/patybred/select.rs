//! Feature selection over binary features.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Feature selection method selected by `--feature-selection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSelection {
    /// Keep the `max_feats` features with the highest chi-squared statistic.
    Chi2,
    /// Keep every candidate feature.
    None,
}

impl FeatureSelection {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s {
            "chi2" => Ok(FeatureSelection::Chi2),
            "none" => Ok(FeatureSelection::None),
            other => Err(ConfigError::InvalidValue {
                field: "feature_selection",
                value: other.into(),
                expected: "Use `chi2` or `none`.".into(),
            }),
        }
    }
}

/// Chi-squared statistic of each column of `x` against the labels.
///
/// Treats each feature as a count, comparing observed per-class feature sums
/// with those expected from class frequencies alone.
pub fn chi2(x: &[Vec<f64>], y: &[bool]) -> Vec<f64> {
    let dims = x.first().map_or(0, Vec::len);
    let n = x.len() as f64;
    if n == 0.0 {
        return vec![0.0; dims];
    }
    let n_pos = y.iter().filter(|&&l| l).count() as f64;
    let class_prob = [(n - n_pos) / n, n_pos / n];

    let mut observed = [vec![0.0; dims], vec![0.0; dims]];
    for (row, &label) in x.iter().zip(y) {
        for (acc, v) in observed[usize::from(label)].iter_mut().zip(row) {
            *acc += v;
        }
    }

    (0..dims)
        .map(|j| {
            let total = observed[0][j] + observed[1][j];
            (0..2)
                .map(|c| {
                    let expected = class_prob[c] * total;
                    if expected > 0.0 {
                        (observed[c][j] - expected).powi(2) / expected
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect()
}

/// Column indices to keep, in ascending order.
pub fn select(method: FeatureSelection, x: &[Vec<f64>], y: &[bool], max_feats: usize) -> Vec<usize> {
    let dims = x.first().map_or(0, Vec::len);
    match method {
        FeatureSelection::None => (0..dims).collect(),
        FeatureSelection::Chi2 => {
            let scores = chi2(x, y);
            let mut order: Vec<usize> = (0..dims).collect();
            // Stable: equal statistics keep candidate order.
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
            order.truncate(max_feats);
            order.sort_unstable();
            order
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informative_feature_has_highest_chi2() {
        let x = vec![
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let y = vec![true, true, false, false];
        let scores = chi2(&x, &y);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
        assert_eq!(select(FeatureSelection::Chi2, &x, &y, 1), vec![0]);
    }

    #[test]
    fn none_keeps_everything() {
        let x = vec![vec![0.0, 1.0]];
        assert_eq!(select(FeatureSelection::None, &x, &[true], 1), vec![0, 1]);
    }

    #[test]
    fn constant_zero_feature_scores_zero() {
        let x = vec![vec![0.0], vec![0.0]];
        assert_eq!(chi2(&x, &[true, false]), vec![0.0]);
    }
}
