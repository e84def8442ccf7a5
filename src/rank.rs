//! Ranking of facts by score.
//!
//! Ranks follow the average-tie convention: 1-based, and tied scores share
//! the mean of the positions they occupy. Facts are ordered ascending by
//! score with ties kept in original triple order, so the most anomalous fact
//! comes first.

use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};
use crate::graph::Triple;

/// One line of the ranked result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedFact {
    pub rank: f64,
    pub score: f64,
    pub triple: Triple,
}

/// Indices that sort `values` ascending; stable, so ties keep input order.
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// 1-based ranks of `values` in input order, ties averaged.
pub fn rankdata(values: &[f64]) -> Vec<f64> {
    let order = argsort(values);
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share the mean 1-based rank.
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Pair every triple with its score and rank, most anomalous first.
pub fn rank_facts(triples: &[Triple], scores: &[f64]) -> RankResult<Vec<RankedFact>> {
    if triples.len() != scores.len() {
        return Err(RankError::LengthMismatch {
            triples: triples.len(),
            scores: scores.len(),
        });
    }
    let mut ranks = rankdata(scores);
    ranks.sort_by(f64::total_cmp);
    let facts = argsort(scores)
        .into_iter()
        .zip(ranks)
        .map(|(i, rank)| RankedFact {
            rank,
            score: scores[i],
            triple: triples[i],
        })
        .collect();
    Ok(facts)
}
