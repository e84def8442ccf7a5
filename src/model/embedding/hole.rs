//! HolE: holographic embeddings, `f = r · (h ⋆ t)` with circular correlation.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{Interaction, Table, dot, logistic_loss};
use crate::graph::Triple;
use crate::model::{Method, sigmoid};

const LEARNING_RATE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolE {
    entities: Table,
    relations: Table,
}

/// `(a ⋆ b)[k] = Σᵢ a[i] b[(i + k) mod d]`.
pub fn correlate(a: &[f64], b: &[f64]) -> Vec<f64> {
    let d = a.len();
    (0..d)
        .map(|k| (0..d).map(|i| a[i] * b[(i + k) % d]).sum())
        .collect()
}

impl HolE {
    fn logit(&self, t: &Triple) -> f64 {
        let h = self.entities.row(t.subject as usize);
        let o = self.entities.row(t.object as usize);
        dot(self.relations.row(t.predicate as usize), &correlate(h, o))
    }

    fn step(&mut self, t: &Triple, label: bool) -> f64 {
        let (s, o, p) = (t.subject as usize, t.object as usize, t.predicate as usize);
        let h = self.entities.row(s).to_vec();
        let tail = self.entities.row(o).to_vec();
        let r = self.relations.row(p).to_vec();
        let d = h.len();

        let corr = correlate(&h, &tail);
        let f = dot(&r, &corr);
        let g = sigmoid(f) - if label { 1.0 } else { 0.0 };

        let grad_h: Vec<f64> = (0..d)
            .map(|i| (0..d).map(|k| r[k] * tail[(i + k) % d]).sum())
            .collect();
        let grad_t: Vec<f64> = (0..d)
            .map(|j| (0..d).map(|k| r[k] * h[(j + d - k) % d]).sum())
            .collect();

        self.relations.axpy(p, -LEARNING_RATE * g, &corr);
        self.entities.axpy(s, -LEARNING_RATE * g, &grad_h);
        self.entities.axpy(o, -LEARNING_RATE * g, &grad_t);
        self.entities.clip(s);
        self.entities.clip(o);
        logistic_loss(f, label)
    }
}

impl Interaction for HolE {
    const METHOD: Method = Method::Hole;

    fn init(n_entities: usize, n_relations: usize, dim: usize, rng: &mut StdRng) -> Self {
        let mut entities = Table::random(n_entities, dim, rng);
        (0..n_entities).for_each(|e| entities.normalize(e));
        Self {
            entities,
            relations: Table::random(n_relations, dim, rng),
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
