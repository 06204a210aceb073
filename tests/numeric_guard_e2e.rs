use ndarray::{array, Array2};
use sparsecode::iht::{Iht, IhtConfig};
use sparsecode::inference::InferenceMethod;
use sparsecode::lca::{Lca, LcaConfig};
use sparsecode::vanilla::{Vanilla, VanillaConfig};
use sparsecode::Error;

// A scaled identity dictionary with an oversized learning rate makes the
// update an expansive linear map, so the state provably overflows within
// the iteration budget. The guard has to turn that into an error instead
// of handing back inf/NaN coefficients.

fn hot_dictionary() -> Array2<f64> {
    Array2::<f64>::eye(4) * 10.0
}

fn small_batch() -> Array2<f64> {
    array![[1.0, -2.0, 0.5, 3.0], [0.25, 0.0, -1.0, 2.0]]
}

fn divergent_vanilla() -> Vanilla {
    Vanilla::new(VanillaConfig {
        n_iter: 200,
        coeff_lr: 100.0,
        ..VanillaConfig::default()
    })
    .expect("valid config")
}

#[test]
fn vanilla_guard_reports_divergence() {
    let err = divergent_vanilla()
        .infer(&hot_dictionary().view(), &small_batch().view(), None, true)
        .expect_err("divergence should be caught");
    assert!(matches!(err, Error::Numeric(_)), "got {err}");
    assert_eq!(err.to_string(), "numeric instability in coefficients");
}

#[test]
fn vanilla_guard_is_opt_in() {
    // With the guard off the same run completes and the caller sees the
    // raw non-finite values.
    let out = divergent_vanilla()
        .infer(&hot_dictionary().view(), &small_batch().view(), None, false)
        .expect("without the guard the loop runs to completion");
    assert!(out.coefficients.iter().any(|v| !v.is_finite()));
}

#[test]
fn lca_guard_names_the_membrane() {
    let err = Lca::new(LcaConfig {
        n_iter: 200,
        coeff_lr: 50.0,
        ..LcaConfig::default()
    })
    .expect("valid config")
    .infer(&hot_dictionary().view(), &small_batch().view(), None, true)
    .expect_err("divergence should be caught");
    assert_eq!(err.to_string(), "numeric instability in membrane potentials");
}

#[test]
fn iht_guard_reports_overflowing_projections() {
    // sparsity = 1 keeps every coefficient, so the projection cannot mask
    // the exponential growth of the gradient step.
    let dictionary = Array2::<f64>::eye(4) * 1e3;
    let solver = Iht::new(IhtConfig {
        n_iter: 60,
        ..IhtConfig::new(1.0)
    })
    .expect("valid config");

    let err = solver
        .infer(&dictionary.view(), &small_batch().view(), None, true)
        .expect_err("divergence should be caught");
    assert!(matches!(err, Error::Numeric(_)), "got {err}");

    let out = solver
        .infer(&dictionary.view(), &small_batch().view(), None, false)
        .expect("without the guard the loop runs to completion");
    assert!(out.coefficients.iter().any(|v| !v.is_finite()));
}
