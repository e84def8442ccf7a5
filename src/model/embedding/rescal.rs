//! RESCAL: a full bilinear form per relation, `f = hᵀ R t`.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{Interaction, Table, logistic_loss};
use crate::graph::Triple;
use crate::model::{Method, sigmoid};

const LEARNING_RATE: f64 = 0.05;
const L2: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rescal {
    dim: usize,
    entities: Table,
    /// One row-major `dim × dim` matrix per relation.
    relations: Table,
}

impl Rescal {
    fn logit(&self, t: &Triple) -> f64 {
        let h = self.entities.row(t.subject as usize);
        let o = self.entities.row(t.object as usize);
        let r = self.relations.row(t.predicate as usize);
        h.iter()
            .enumerate()
            .map(|(i, hi)| hi * r[i * self.dim..(i + 1) * self.dim].iter().zip(o).map(|(a, b)| a * b).sum::<f64>())
            .sum()
    }

    fn step(&mut self, t: &Triple, label: bool) -> f64 {
        let f = self.logit(t);
        let g = sigmoid(f) - if label { 1.0 } else { 0.0 };
        let d = self.dim;
        let (s, o, p) = (t.subject as usize, t.object as usize, t.predicate as usize);

        let h = self.entities.row(s).to_vec();
        let tail = self.entities.row(o).to_vec();
        let r = self.relations.row(p).to_vec();
        let grad_h: Vec<f64> = (0..d)
            .map(|i| (0..d).map(|j| r[i * d + j] * tail[j]).sum::<f64>() + L2 * h[i])
            .collect();
        let grad_t: Vec<f64> = (0..d)
            .map(|j| (0..d).map(|i| h[i] * r[i * d + j]).sum::<f64>() + L2 * tail[j])
            .collect();
        let grad_r: Vec<f64> = (0..d * d)
            .map(|k| h[k / d] * tail[k % d] + L2 * r[k])
            .collect();

        self.entities.axpy(s, -LEARNING_RATE * g, &grad_h);
        self.entities.axpy(o, -LEARNING_RATE * g, &grad_t);
        self.relations.axpy(p, -LEARNING_RATE * g, &grad_r);
        logistic_loss(f, label)
    }
}

impl Interaction for Rescal {
    const METHOD: Method = Method::Rescal;

    fn init(n_entities: usize, n_relations: usize, dim: usize, rng: &mut StdRng) -> Self {
        let mut entities = Table::random(n_entities, dim, rng);
        (0..n_entities).for_each(|e| entities.normalize(e));
        let mut relations = Table::random(n_relations, dim * dim, rng);
        (0..n_relations).for_each(|r| relations.normalize(r));
        Self {
            dim,
            entities,
            relations,
        }
    }

    fn n_entities(&self) -> usize {
        self.entities.rows()
    }

    fn n_relations(&self) -> usize {
        self.relations.rows()
    }

    fn plausibility(&self, t: &Triple) -> f64 {
        sigmoid(self.logit(t))
    }

    fn update(&mut self, fact: &Triple, negatives: &[Triple]) -> f64 {
        let mut loss = self.step(fact, true);
        for neg in negatives {
            loss += self.step(neg, false);
        }
        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::embedding::testing;

    #[test]
    fn trains_to_probabilities() {
        let scores = testing::exercise::<Rescal>();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
