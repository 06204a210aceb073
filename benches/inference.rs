use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use sparsecode::iht::{Iht, IhtConfig};
use sparsecode::inference::InferenceMethod;
use sparsecode::ista::{Ista, IstaConfig};
use sparsecode::lca::{Lca, LcaConfig};
use sparsecode::lsm::{Lsm, LsmConfig};
use sparsecode::pursuit::{MatchingPursuit, OrthogonalMatchingPursuit, PursuitConfig};

fn make_problem(n: usize, d: usize, m: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut dictionary = Array2::<f64>::zeros((d, m));
    let mut data = Array2::<f64>::zeros((n, d));
    for i in 0..d {
        for k in 0..m {
            dictionary[[i, k]] = StandardNormal.sample(&mut rng);
        }
    }
    // Column scale kept modest so the fixed-step solvers stay stable.
    dictionary.mapv_inplace(|v| v / (d as f64).sqrt());
    for i in 0..n {
        for k in 0..d {
            data[[i, k]] = StandardNormal.sample(&mut rng);
        }
    }
    (dictionary, data)
}

fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.sample_size(30);

    let cases = [(16usize, 32usize, 8usize), (64usize, 128usize, 16usize)];

    for &(n, d, m) in &cases {
        let (dictionary, data) = make_problem(n, d, m, 123);
        let tag = format!("n{n}_d{d}_m{m}");

        let lca = Lca::new(LcaConfig {
            n_iter: 50,
            ..LcaConfig::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::new("lca", &tag), &(n, d), |b, _| {
            b.iter(|| lca.infer(&dictionary.view(), &data.view(), None, false).unwrap())
        });

        let ista = Ista::new(IstaConfig {
            n_iter: 50,
            ..IstaConfig::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::new("ista", &tag), &(n, d), |b, _| {
            b.iter(|| ista.infer(&dictionary.view(), &data.view(), None, false).unwrap())
        });

        let iht = Iht::new(IhtConfig::new(0.2)).unwrap();
        group.bench_with_input(BenchmarkId::new("iht", &tag), &(n, d), |b, _| {
            b.iter(|| iht.infer(&dictionary.view(), &data.view(), None, false).unwrap())
        });

        let mp = MatchingPursuit::new(PursuitConfig::new(0.2)).unwrap();
        group.bench_with_input(BenchmarkId::new("mp", &tag), &(n, d), |b, _| {
            b.iter(|| mp.infer(&dictionary.view(), &data.view(), None, false).unwrap())
        });

        let omp = OrthogonalMatchingPursuit::new(PursuitConfig::new(0.2)).unwrap();
        group.bench_with_input(BenchmarkId::new("omp", &tag), &(n, d), |b, _| {
            b.iter(|| omp.infer(&dictionary.view(), &data.view(), None, false).unwrap())
        });
    }

    // LSM multiplies its two loops, so keep it to the small case only.
    let (dictionary, data) = make_problem(16, 32, 8, 123);
    let lsm = Lsm::new(LsmConfig {
        n_iter: 30,
        n_iter_lsm: 3,
        ..LsmConfig::default()
    })
    .unwrap();
    group.bench_with_input(
        BenchmarkId::new("lsm", "n16_d32_m8"),
        &(16usize, 32usize),
        |b, _| b.iter(|| lsm.infer(&dictionary.view(), &data.view(), None, false).unwrap()),
    );

    group.finish();
}

criterion_group!(benches, bench_inference);
criterion_main!(benches);
