//! Laplacian scale mixture (LSM) inference.
//!
//! Reweighted L1 after Garrigues & Olshausen, *Group Sparse Coding with a
//! Laplacian Scale Mixture Prior* (NIPS 2010). The outer loop recomputes
//! per-coefficient weights `λ = (α+1)/(β + |A|)` from the previous outer
//! solution, resets the coefficients, and reruns a fresh Adam on the fixed
//! loss
//!
//! ```text
//! (1/2σ²)·‖X − A·Dᵀ‖²  (per sample)  +  Σ λ ⊙ |A|
//! ```
//!
//! whose gradient is analytic: `(1/σ²)(A·Dᵀ − X)·D + λ ⊙ sign(A)`. After
//! the last outer pass, coefficients below `sparse_threshold` in magnitude
//! are zeroed.
//!
//! Warm starts are rejected: the outer loop resets coefficients by design,
//! so a caller state would be discarded anyway.

use crate::inference::{ensure_finite, problem_dims, sign, Inference, InferenceMethod};
use crate::optim::{Adam, AdamConfig, Optimizer};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

/// LSM hyperparameters.
#[derive(Debug, Clone)]
pub struct LsmConfig {
    /// Adam steps per outer pass.
    pub n_iter: usize,
    /// Outer reweighting passes.
    pub n_iter_lsm: usize,
    /// Weight-update offset `β` in `λ = (α+1)/(β + |A|)`.
    pub beta: f64,
    /// Weight-update scale `α`.
    pub alpha: f64,
    /// Noise scale `σ` of the reconstruction term.
    pub sigma: f64,
    /// Final hard-sparsification cutoff: `|a| < sparse_threshold` is zeroed.
    pub sparse_threshold: f64,
}

impl Default for LsmConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            n_iter_lsm: 6,
            beta: 0.01,
            alpha: 80.0,
            sigma: 0.005,
            sparse_threshold: 1e-2,
        }
    }
}

/// Laplacian-scale-mixture solver.
#[derive(Debug, Clone)]
pub struct Lsm {
    cfg: LsmConfig,
}

impl Lsm {
    /// Validate and freeze a configuration.
    pub fn new(cfg: LsmConfig) -> Result<Self> {
        if cfg.n_iter == 0 || cfg.n_iter_lsm == 0 {
            return Err(Error::Config("n_iter and n_iter_lsm must be >= 1"));
        }
        if !(cfg.beta > 0.0) || !cfg.beta.is_finite() {
            return Err(Error::Config("beta must be positive and finite"));
        }
        if !(cfg.alpha >= 0.0) || !cfg.alpha.is_finite() {
            return Err(Error::Config("alpha must be nonnegative and finite"));
        }
        if !(cfg.sigma > 0.0) || !cfg.sigma.is_finite() {
            return Err(Error::Config("sigma must be positive and finite"));
        }
        if !(cfg.sparse_threshold >= 0.0) || !cfg.sparse_threshold.is_finite() {
            return Err(Error::Config(
                "sparse_threshold must be nonnegative and finite",
            ));
        }
        Ok(Self { cfg })
    }
}

/// Per-sample LSM loss values, `(n_samples,)`.
///
/// Exposed so callers can monitor the objective the inner loop descends.
pub fn lsm_loss(
    data: &ArrayView2<f64>,
    dictionary: &ArrayView2<f64>,
    coefficients: &ArrayView2<f64>,
    lambdas: &ArrayView2<f64>,
    sigma: f64,
) -> Array1<f64> {
    let residual = coefficients.dot(&dictionary.t()) - data;
    let scale = 1.0 / (2.0 * sigma * sigma);
    let mse = residual.map_axis(Axis(1), |row| {
        row.iter().map(|v| v * v).sum::<f64>() * scale
    });
    let sparse = (lambdas * &coefficients.mapv(f64::abs)).sum_axis(Axis(1));
    mse + sparse
}

fn lsm_gradient(
    data: &ArrayView2<f64>,
    dictionary: &ArrayView2<f64>,
    coefficients: &Array2<f64>,
    lambdas: &Array2<f64>,
    sigma: f64,
) -> Array2<f64> {
    let residual = coefficients.dot(&dictionary.t()) - data;
    let mut grad = residual.dot(dictionary);
    let scale = 1.0 / (sigma * sigma);
    Zip::from(&mut grad)
        .and(lambdas)
        .and(coefficients)
        .for_each(|g, &l, &c| *g = *g * scale + l * sign(c));
    grad
}

impl InferenceMethod for Lsm {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        if warm_start.is_some() {
            return Err(Error::Config(
                "warm start is not supported: the reweighting loop resets coefficients",
            ));
        }
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, None)?;
        let cfg = &self.cfg;

        let mut coefficients = Array2::<f64>::zeros((n_samples, n_basis));

        for _ in 0..cfg.n_iter_lsm {
            // Weights come from the previous outer solution, then the inner
            // problem restarts from zero with a fresh optimizer.
            let lambdas = coefficients.mapv(|c| (cfg.alpha + 1.0) / (cfg.beta + c.abs()));
            coefficients.fill(0.0);
            let mut optimizer = Adam::new(AdamConfig::default())?;

            for _ in 0..cfg.n_iter {
                let gradient = lsm_gradient(data, dictionary, &coefficients, &lambdas, cfg.sigma);
                optimizer.step(&mut coefficients, &gradient.view());
                if check_finite {
                    ensure_finite(&coefficients, "coefficients")?;
                }
            }
        }

        coefficients.mapv_inplace(|c| {
            if c.abs() < cfg.sparse_threshold {
                0.0
            } else {
                c
            }
        });

        Ok(Inference {
            coefficients,
            history: None,
            iterations: cfg.n_iter_lsm * cfg.n_iter,
        })
    }
}
