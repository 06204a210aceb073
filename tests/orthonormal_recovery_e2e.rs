use ndarray::{Array1, Array2, Axis};
use sparsecode::iht::{Iht, IhtConfig};
use sparsecode::inference::{soft_threshold, InferenceMethod, Trace};
use sparsecode::ista::{Ista, IstaConfig};
use sparsecode::lca::{Lca, LcaConfig};
use sparsecode::pursuit::{MatchingPursuit, OrthogonalMatchingPursuit, PursuitConfig};

/// Dense orthonormal basis from a Householder reflection `I - 2vvᵀ/‖v‖²`.
///
/// Unlike the identity, every atom touches every feature, so recovery here
/// actually exercises the inner products.
fn householder_basis(n: usize) -> Array2<f64> {
    let v = Array1::from_shape_fn(n, |i| 1.0 + ((i * 13 + 5) % 7) as f64);
    let scale = 2.0 / v.iter().map(|x| x * x).sum::<f64>();
    let mut h = Array2::<f64>::eye(n);
    for i in 0..n {
        for j in 0..n {
            h[[i, j]] -= scale * v[i] * v[j];
        }
    }
    h
}

/// Two nonzeros per row, well separated in magnitude and position.
fn two_sparse_truth() -> Array2<f64> {
    let mut c = Array2::<f64>::zeros((3, 8));
    c[[0, 2]] = 1.5;
    c[[0, 5]] = -0.75;
    c[[1, 0]] = 2.0;
    c[[1, 7]] = 0.5;
    c[[2, 4]] = -1.25;
    c[[2, 6]] = 1.0;
    c
}

fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn step_size_of_an_orthonormal_basis_is_one() {
    let h = householder_basis(8);
    let step = Ista::step_size(&h.view()).expect("orthonormal basis has positive curvature");
    assert!(
        (step - 1.0).abs() < 1e-9,
        "expected unit step size, got {step}"
    );
}

#[test]
fn greedy_pursuit_recovers_a_two_sparse_code() {
    let h = householder_basis(8);
    let c_true = two_sparse_truth();
    let data = c_true.dot(&h.t());

    // K = ceil(0.25 * 8) = 2, exactly the support size.
    let mp = MatchingPursuit::new(PursuitConfig::new(0.25)).expect("valid config");
    let omp = OrthogonalMatchingPursuit::new(PursuitConfig::new(0.25)).expect("valid config");

    for (name, out) in [
        ("mp", mp.infer(&h.view(), &data.view(), None, true)),
        ("omp", omp.infer(&h.view(), &data.view(), None, true)),
    ] {
        let out = out.unwrap_or_else(|e| panic!("{name} failed: {e}"));
        let gap = max_abs_diff(&out.coefficients, &c_true);
        assert!(gap < 1e-10, "{name} missed the true code by {gap:e}");
        assert_eq!(out.iterations, 2);
    }
}

#[test]
fn hard_thresholding_recovers_a_two_sparse_code() {
    let h = householder_basis(8);
    let c_true = two_sparse_truth();
    let data = c_true.dot(&h.t());

    let out = Iht::new(IhtConfig::new(0.25))
        .expect("valid config")
        .infer(&h.view(), &data.view(), None, true)
        .expect("iht should succeed");
    let gap = max_abs_diff(&out.coefficients, &c_true);
    assert!(gap < 1e-10, "iht missed the true code by {gap:e}");
}

#[test]
fn ista_lands_on_the_shrunk_code() {
    // With orthonormal atoms the lasso solution in coefficient space is the
    // soft-thresholded projection of the data, reached after one unit step.
    let h = householder_basis(8);
    let c_true = two_sparse_truth();
    let data = c_true.dot(&h.t());
    let penalty = 0.1;

    let out = Ista::new(IstaConfig {
        n_iter: 30,
        sparsity_penalty: penalty,
        ..IstaConfig::default()
    })
    .expect("valid config")
    .infer(&h.view(), &data.view(), None, true)
    .expect("ista should succeed");

    let want = soft_threshold(&c_true.view(), penalty);
    let gap = max_abs_diff(&out.coefficients, &want);
    assert!(gap < 1e-8, "ista missed the shrunk code by {gap:e}");
}

#[test]
fn lca_settles_on_the_shrunk_code() {
    // Orthonormal atoms turn the inhibition matrix into (numerical) zero,
    // so the membrane relaxes geometrically onto the driver.
    let h = householder_basis(8);
    let c_true = two_sparse_truth();
    let data = c_true.dot(&h.t());
    let threshold = 0.1;

    let out = Lca::new(LcaConfig {
        n_iter: 250,
        coeff_lr: 0.1,
        threshold,
        ..LcaConfig::default()
    })
    .expect("valid config")
    .infer(&h.view(), &data.view(), None, true)
    .expect("lca should succeed");

    let want = soft_threshold(&c_true.view(), threshold);
    let gap = max_abs_diff(&out.coefficients, &want);
    assert!(gap < 1e-8, "lca missed the shrunk code by {gap:e}");
    // Off-support activations must shrink to exact zero, not small noise.
    for (&got, &truth) in out.coefficients.iter().zip(c_true.iter()) {
        if truth == 0.0 {
            assert_eq!(got, 0.0);
        }
    }
}

#[test]
fn omp_residual_norm_never_increases() {
    // Non-orthonormal dictionary: the guarantee must come from the growing
    // least-squares refit, not from lucky geometry.
    let dictionary = Array2::from_shape_fn((6, 10), |(i, k)| {
        (((i * 37 + k * 11) % 97) as f64 / 97.0) * 2.0 - 1.0
    });
    let data = Array2::from_shape_fn((3, 6), |(i, k)| {
        (((i * 53 + k * 19 + 7) % 101) as f64 / 101.0) * 2.0 - 1.0
    });

    let out = OrthogonalMatchingPursuit::new(PursuitConfig {
        trace: Trace::Activation,
        ..PursuitConfig::new(0.5)
    })
    .expect("valid config")
    .infer(&dictionary.view(), &data.view(), None, true)
    .expect("omp should succeed");
    let history = out.history.expect("tracing was requested");
    assert_eq!(history.dim(), (3, 6, 10));

    for i in 0..3 {
        let sample = data.row(i);
        let frames = history.index_axis(Axis(0), i);
        let mut previous = f64::INFINITY;
        for t in 0..frames.nrows() {
            let frame = frames.row(t);
            let recon = dictionary.dot(&frame);
            let norm = sample
                .iter()
                .zip(recon.iter())
                .map(|(y, r)| (y - r) * (y - r))
                .sum::<f64>()
                .sqrt();
            assert!(
                norm <= previous + 1e-9,
                "sample {i}: residual grew from {previous} to {norm} at step {t}"
            );
            previous = norm;
        }
    }
}
