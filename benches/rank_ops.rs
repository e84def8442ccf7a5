//! Benchmarks for ranking and triple extraction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};

use factrank::graph::{AdjacencyMatrix, Triple, extract_triples};
use factrank::rank::{rank_facts, rankdata};

const N_FACTS: usize = 100_000;

fn random_scores(rng: &mut impl Rng) -> Vec<f64> {
    // Coarse scores so ties are common.
    (0..N_FACTS).map(|_| f64::from(rng.gen_range(0..1000u32)) / 1000.0).collect()
}

fn bench_rankdata(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let scores = random_scores(&mut rng);

    c.bench_function("rankdata_100k", |bench| {
        bench.iter(|| black_box(rankdata(&scores)))
    });
}

fn bench_rank_facts(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let scores = random_scores(&mut rng);
    let triples: Vec<Triple> = (0..N_FACTS as u32)
        .map(|i| Triple::new(i % 5000, (i * 7) % 5000, i % 16))
        .collect();

    c.bench_function("rank_facts_100k", |bench| {
        bench.iter(|| black_box(rank_facts(&triples, &scores).unwrap()))
    });
}

fn bench_extract(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let n = 5000;
    let relations: Vec<AdjacencyMatrix> = (0..16)
        .map(|_| {
            let cells: Vec<(u32, u32)> = (0..N_FACTS / 16)
                .map(|_| (rng.gen_range(0..n as u32), rng.gen_range(0..n as u32)))
                .collect();
            AdjacencyMatrix::square(n, cells).unwrap()
        })
        .collect();

    c.bench_function("extract_triples_16x5k", |bench| {
        bench.iter(|| black_box(extract_triples(&relations).unwrap()))
    });
}

criterion_group!(benches, bench_rankdata, bench_rank_facts, bench_extract);
criterion_main!(benches);
