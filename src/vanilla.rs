//! Plain gradient descent on the L1-penalized reconstruction loss.
//!
//! Euler integration of the Olshausen & Field (1997) energy with a Laplace
//! prior over coefficients: each step follows the reconstruction gradient
//! `r·D` (with `r = X − A·Dᵀ`) minus the L1 subgradient `λ·sign(A)`.
//!
//! Coefficients start from a caller warm start or from i.i.d. `U[-0.5, 0.5)`
//! noise drawn from an explicit seed; there is no hidden RNG state.

use crate::inference::{
    ensure_finite, frobenius, problem_dims, sign, Inference, InferenceMethod, Trace, TraceLog,
};
use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Vanilla gradient-descent hyperparameters.
#[derive(Debug, Clone)]
pub struct VanillaConfig {
    /// Gradient steps.
    pub n_iter: usize,
    /// Update rate `η`.
    pub coeff_lr: f64,
    /// L1 penalty weight `λ`.
    pub sparsity_penalty: f64,
    /// Stop once the relative coefficient change falls below `epsilon`.
    pub stop_early: bool,
    /// Early-stop criterion `‖a_old − a‖ / ‖a_old‖ < epsilon`.
    pub epsilon: f64,
    /// [`Trace::None`] or [`Trace::Activation`]; there is no membrane state.
    pub trace: Trace,
    /// Seed for the random initialization. Ignored when a warm start is given.
    pub seed: u64,
}

impl Default for VanillaConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            coeff_lr: 1e-3,
            sparsity_penalty: 0.2,
            stop_early: false,
            epsilon: 1e-2,
            trace: Trace::None,
            seed: 0,
        }
    }
}

/// L1-penalized gradient-descent solver.
#[derive(Debug, Clone)]
pub struct Vanilla {
    cfg: VanillaConfig,
}

impl Vanilla {
    /// Validate and freeze a configuration.
    pub fn new(cfg: VanillaConfig) -> Result<Self> {
        if cfg.n_iter == 0 {
            return Err(Error::Config("n_iter must be >= 1"));
        }
        if !(cfg.coeff_lr > 0.0) || !cfg.coeff_lr.is_finite() {
            return Err(Error::Config("coeff_lr must be positive and finite"));
        }
        if !(cfg.sparsity_penalty >= 0.0) || !cfg.sparsity_penalty.is_finite() {
            return Err(Error::Config(
                "sparsity_penalty must be nonnegative and finite",
            ));
        }
        if !(cfg.epsilon > 0.0) || !cfg.epsilon.is_finite() {
            return Err(Error::Config("epsilon must be positive and finite"));
        }
        if cfg.trace == Trace::Membrane {
            return Err(Error::Config("membrane tracing is only defined for lca"));
        }
        Ok(Self { cfg })
    }
}

impl InferenceMethod for Vanilla {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, warm_start)?;
        let cfg = &self.cfg;

        let mut a = match warm_start {
            Some(w) => w.to_owned(),
            None => {
                let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
                Array2::from_shape_fn((n_samples, n_basis), |_| rng.random::<f64>() - 0.5)
            }
        };

        let mut residual = data - &a.dot(&dictionary.t());
        let mut trace = TraceLog::new(cfg.trace != Trace::None, cfg.n_iter);
        let mut iterations = 0;

        for _ in 0..cfg.n_iter {
            trace.record(|| a.clone());
            let a_old = cfg.stop_early.then(|| a.clone());

            let mut da = residual.dot(dictionary);
            da.zip_mut_with(&a, |g, &c| *g -= cfg.sparsity_penalty * sign(c));
            a.scaled_add(cfg.coeff_lr, &da);
            iterations += 1;

            if let Some(a_old) = a_old {
                let denom = frobenius(&a_old);
                let change = frobenius(&(&a_old - &a));
                if denom > 0.0 && change / denom < cfg.epsilon {
                    break;
                }
            }

            residual = data - &a.dot(&dictionary.t());

            if check_finite {
                ensure_finite(&a, "coefficients")?;
            }
        }

        trace.record(|| a.clone());

        Ok(Inference {
            coefficients: a,
            history: trace.into_history(),
            iterations,
        })
    }
}
