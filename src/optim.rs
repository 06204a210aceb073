//! Gradient-descent inference driven by a pluggable optimizer.
//!
//! [`OptimizerSolver`] pairs a [`Loss`] (analytic value and gradient over a
//! whole coefficient batch) with a factory producing a fresh [`Optimizer`]
//! per call, then runs a fixed number of steps. There is no convergence
//! check: callers pick `n_iter` and get exactly that many updates.
//!
//! Public invariants (must not change):
//! - Every `infer` call builds a fresh optimizer from the factory, so
//!   moment state never leaks between batches.
//! - With a zero gradient, [`Adam`] and [`Sgd`] leave parameters bitwise
//!   untouched.
//! - `Inference::iterations` always equals the configured `n_iter`.

use crate::inference::{ensure_finite, problem_dims, sign, Inference, InferenceMethod};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};

/// Batch loss with an analytic gradient.
pub trait Loss {
    /// Per-sample loss values, `(n_samples,)`.
    fn value(
        &self,
        data: &ArrayView2<f64>,
        dictionary: &ArrayView2<f64>,
        coefficients: &ArrayView2<f64>,
    ) -> Array1<f64>;

    /// Gradient of the summed loss with respect to the coefficients,
    /// `(n_samples, n_basis)`.
    fn gradient(
        &self,
        data: &ArrayView2<f64>,
        dictionary: &ArrayView2<f64>,
        coefficients: &ArrayView2<f64>,
    ) -> Array2<f64>;
}

/// Squared reconstruction error plus an L1 penalty,
/// `0.5·‖x − a·Dᵀ‖² + λ·‖a‖₁` per sample.
#[derive(Debug, Clone)]
pub struct QuadraticL1 {
    sparsity_penalty: f64,
}

impl QuadraticL1 {
    /// L1 weight `λ >= 0`.
    pub fn new(sparsity_penalty: f64) -> Result<Self> {
        if !(sparsity_penalty >= 0.0) || !sparsity_penalty.is_finite() {
            return Err(Error::Config(
                "sparsity_penalty must be nonnegative and finite",
            ));
        }
        Ok(Self { sparsity_penalty })
    }
}

impl Loss for QuadraticL1 {
    fn value(
        &self,
        data: &ArrayView2<f64>,
        dictionary: &ArrayView2<f64>,
        coefficients: &ArrayView2<f64>,
    ) -> Array1<f64> {
        let residual = coefficients.dot(&dictionary.t()) - data;
        let mse = residual.map_axis(Axis(1), |row| {
            row.iter().map(|v| v * v).sum::<f64>() * 0.5
        });
        let l1 = coefficients.map_axis(Axis(1), |row| {
            row.iter().map(|v| v.abs()).sum::<f64>() * self.sparsity_penalty
        });
        mse + l1
    }

    fn gradient(
        &self,
        data: &ArrayView2<f64>,
        dictionary: &ArrayView2<f64>,
        coefficients: &ArrayView2<f64>,
    ) -> Array2<f64> {
        let residual = coefficients.dot(&dictionary.t()) - data;
        let mut grad = residual.dot(dictionary);
        grad.zip_mut_with(coefficients, |g, &c| *g += self.sparsity_penalty * sign(c));
        grad
    }
}

/// In-place parameter update from a gradient of the same shape.
pub trait Optimizer {
    fn step(&mut self, params: &mut Array2<f64>, gradient: &ArrayView2<f64>);
}

/// Adam hyperparameters, matching the common deep-learning defaults.
#[derive(Debug, Clone)]
pub struct AdamConfig {
    /// Step size.
    pub lr: f64,
    /// First-moment decay.
    pub beta1: f64,
    /// Second-moment decay.
    pub beta2: f64,
    /// Denominator offset.
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
struct AdamState {
    m: Array2<f64>,
    v: Array2<f64>,
}

/// Adam with bias-corrected moment estimates.
///
/// Moments are allocated lazily on the first step, once the parameter
/// shape is known.
#[derive(Debug, Clone)]
pub struct Adam {
    cfg: AdamConfig,
    state: Option<AdamState>,
    steps: i32,
}

impl Adam {
    /// Validate and freeze a configuration.
    pub fn new(cfg: AdamConfig) -> Result<Self> {
        if !(cfg.lr > 0.0) || !cfg.lr.is_finite() {
            return Err(Error::Config("lr must be positive and finite"));
        }
        if !(0.0..1.0).contains(&cfg.beta1) || !(0.0..1.0).contains(&cfg.beta2) {
            return Err(Error::Config("beta1 and beta2 must lie in [0, 1)"));
        }
        if !(cfg.eps > 0.0) || !cfg.eps.is_finite() {
            return Err(Error::Config("eps must be positive and finite"));
        }
        Ok(Self {
            cfg,
            state: None,
            steps: 0,
        })
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self {
            cfg: AdamConfig::default(),
            state: None,
            steps: 0,
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut Array2<f64>, gradient: &ArrayView2<f64>) {
        let state = self.state.get_or_insert_with(|| AdamState {
            m: Array2::zeros(params.raw_dim()),
            v: Array2::zeros(params.raw_dim()),
        });
        self.steps += 1;
        let lr = self.cfg.lr;
        let beta1 = self.cfg.beta1;
        let beta2 = self.cfg.beta2;
        let eps = self.cfg.eps;
        let bc1 = 1.0 - beta1.powi(self.steps);
        let bc2 = 1.0 - beta2.powi(self.steps);
        Zip::from(params)
            .and(gradient)
            .and(&mut state.m)
            .and(&mut state.v)
            .for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= lr * (*m / bc1) / ((*v / bc2).sqrt() + eps);
            });
    }
}

/// Plain gradient descent.
#[derive(Debug, Clone)]
pub struct Sgd {
    lr: f64,
}

impl Sgd {
    /// Step size `lr > 0`.
    pub fn new(lr: f64) -> Result<Self> {
        if !(lr > 0.0) || !lr.is_finite() {
            return Err(Error::Config("lr must be positive and finite"));
        }
        Ok(Self { lr })
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut Array2<f64>, gradient: &ArrayView2<f64>) {
        params.scaled_add(-self.lr, gradient);
    }
}

/// Fixed-step gradient descent on a [`Loss`], one fresh optimizer per call.
#[derive(Debug, Clone)]
pub struct OptimizerSolver<L, F> {
    loss: L,
    make_optimizer: F,
    n_iter: usize,
}

impl<L, O, F> OptimizerSolver<L, F>
where
    L: Loss,
    O: Optimizer,
    F: Fn() -> O,
{
    /// `loss` and an optimizer factory, run for `n_iter >= 1` steps.
    pub fn new(loss: L, make_optimizer: F, n_iter: usize) -> Result<Self> {
        if n_iter == 0 {
            return Err(Error::Config("n_iter must be >= 1"));
        }
        Ok(Self {
            loss,
            make_optimizer,
            n_iter,
        })
    }
}

impl<L, O, F> InferenceMethod for OptimizerSolver<L, F>
where
    L: Loss,
    O: Optimizer,
    F: Fn() -> O,
{
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, warm_start)?;

        let mut coefficients = match warm_start {
            Some(warm) => warm.to_owned(),
            None => Array2::zeros((n_samples, n_basis)),
        };
        let mut optimizer = (self.make_optimizer)();

        for _ in 0..self.n_iter {
            let gradient = self
                .loss
                .gradient(data, dictionary, &coefficients.view());
            optimizer.step(&mut coefficients, &gradient.view());
            if check_finite {
                ensure_finite(&coefficients, "coefficients")?;
            }
        }

        Ok(Inference {
            coefficients,
            history: None,
            iterations: self.n_iter,
        })
    }
}
