//! TransE: relations as translations, `h + r ≈ t`.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{Interaction, Table, dot};
use crate::graph::Triple;
use crate::model::Method;

const MARGIN: f64 = 1.0;
const LEARNING_RATE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransE {
    entities: Table,
    relations: Table,
}

impl TransE {
    /// `h + r - t`.
    fn residual(&self, t: &Triple) -> Vec<f64> {
        let h = self.entities.row(t.subject as usize);
        let r = self.relations.row(t.predicate as usize);
        let o = self.entities.row(t.object as usize);
        h.iter().zip(r).zip(o).map(|((h, r), o)| h + r - o).collect()
    }

    /// Move `t` along the distance gradient; negative `lr` pushes it apart.
    fn descend(&mut self, t: &Triple, residual: &[f64], distance: f64, lr: f64) {
        let scale = lr / distance.max(f64::EPSILON);
        self.entities.axpy(t.subject as usize, -scale, residual);
        self.relations.axpy(t.predicate as usize, -scale, residual);
        self.entities.axpy(t.object as usize, scale, residual);
    }
}

impl Interaction for TransE {
    const METHOD: Method = Method::TransE;

    fn init(n_entities: usize, n_relations: usize, dim: usize, rng: &mut StdRng) -> Self {
        let mut entities = Table::random(n_entities, dim, rng);
        let mut relations = Table::random(n_relations, dim, rng);
        (0..n_entities).for_each(|e| entities.normalize(e));
        (0..n_relations).for_each(|r| relations.normalize(r));
        Self {
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
        let d = self.residual(t);
        -dot(&d, &d).sqrt()
    }

    fn update(&mut self, fact: &Triple, negatives: &[Triple]) -> f64 {
        let mut loss = 0.0;
        for neg in negatives {
            let pos_res = self.residual(fact);
            let neg_res = self.residual(neg);
            let pos_d = dot(&pos_res, &pos_res).sqrt();
            let neg_d = dot(&neg_res, &neg_res).sqrt();
            let violation = MARGIN + pos_d - neg_d;
            if violation <= 0.0 {
                continue;
            }
            loss += violation;
            self.descend(fact, &pos_res, pos_d, LEARNING_RATE);
            self.descend(neg, &neg_res, neg_d, -LEARNING_RATE);
        }
        for t in std::iter::once(fact).chain(negatives) {
            self.entities.normalize(t.subject as usize);
            self.entities.normalize(t.object as usize);
        }
        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::embedding::testing;

    #[test]
    fn trains_and_scores_negative_distances() {
        let scores = testing::exercise::<TransE>();
        assert!(scores.iter().all(|&s| s <= 0.0));
    }
}
