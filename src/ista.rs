//! ISTA, the iterative shrinkage-thresholding algorithm.
//!
//! Proximal gradient on the lasso objective (Beck & Teboulle 2009,
//! equations 1.4 and 1.5). The step size is not a tunable: it is the
//! reciprocal of the largest eigenvalue of `DᵀD` (the Lipschitz constant of
//! the reconstruction gradient), which is what guarantees monotonic
//! objective decrease. The effective soft threshold is
//! `step_size × sparsity_penalty`.

use crate::inference::{
    ensure_finite, problem_dims, soft_threshold, Inference, InferenceMethod, Trace, TraceLog,
};
use crate::{Error, Result};
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};

/// ISTA hyperparameters. There is no learning rate; the step is derived.
#[derive(Debug, Clone)]
pub struct IstaConfig {
    /// Proximal-gradient steps.
    pub n_iter: usize,
    /// L1 penalty weight `λ`; the applied threshold is `step_size × λ`.
    pub sparsity_penalty: f64,
    /// Stop once the mean pre-threshold change, scaled by the step size,
    /// falls below `epsilon`.
    pub stop_early: bool,
    /// Early-stop criterion `mean(|u_old − u|) / step_size < epsilon`.
    pub epsilon: f64,
    /// [`Trace::None`] or [`Trace::Activation`].
    pub trace: Trace,
}

impl Default for IstaConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            sparsity_penalty: 1e-2,
            stop_early: false,
            epsilon: 1e-2,
            trace: Trace::None,
        }
    }
}

/// Proximal-gradient solver with the Lipschitz-derived step size.
#[derive(Debug, Clone)]
pub struct Ista {
    cfg: IstaConfig,
}

impl Ista {
    /// Validate and freeze a configuration.
    pub fn new(cfg: IstaConfig) -> Result<Self> {
        if cfg.n_iter == 0 {
            return Err(Error::Config("n_iter must be >= 1"));
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

    /// The derived step size `1 / λ_max(DᵀD)`.
    ///
    /// Fails with [`Error::Numeric`] when the largest eigenvalue is not a
    /// positive finite number (for example an all-zero dictionary).
    pub fn step_size(dictionary: &ArrayView2<f64>) -> Result<f64> {
        let (n_features, n_basis) = dictionary.dim();
        if n_features == 0 || n_basis == 0 {
            return Err(Error::Shape("dictionary must be non-empty"));
        }
        let gram = dictionary.t().dot(dictionary);
        let sym = DMatrix::from_fn(n_basis, n_basis, |i, j| gram[[i, j]]);
        let lambda_max = sym
            .symmetric_eigenvalues()
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        if !(lambda_max > 0.0) || !lambda_max.is_finite() {
            return Err(Error::Numeric("gram matrix eigenvalues"));
        }
        Ok(1.0 / lambda_max)
    }

    /// The effective soft threshold `step_size × sparsity_penalty` for a
    /// given dictionary.
    pub fn threshold(&self, dictionary: &ArrayView2<f64>) -> Result<f64> {
        Ok(Self::step_size(dictionary)? * self.cfg.sparsity_penalty)
    }
}

impl InferenceMethod for Ista {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, warm_start)?;
        let cfg = &self.cfg;

        let stepsize = Self::step_size(dictionary)?;
        let threshold = stepsize * cfg.sparsity_penalty;

        let mut u = match warm_start {
            Some(w) => w.to_owned(),
            None => Array2::<f64>::zeros((n_samples, n_basis)),
        };
        let mut a = soft_threshold(&u.view(), threshold);
        let mut residual = a.dot(&dictionary.t()) - data;

        let mut trace = TraceLog::new(cfg.trace != Trace::None, cfg.n_iter);
        let mut iterations = 0;

        for _ in 0..cfg.n_iter {
            let u_old = cfg.stop_early.then(|| u.clone());
            trace.record(|| soft_threshold(&u.view(), threshold));

            u.scaled_add(-stepsize, &residual.dot(dictionary));
            a = soft_threshold(&u.view(), threshold);
            iterations += 1;

            if let Some(u_old) = u_old {
                let change = (&u_old - &u).mapv_into(f64::abs).mean().unwrap_or(0.0);
                if change / stepsize < cfg.epsilon {
                    break;
                }
            }

            residual = a.dot(&dictionary.t()) - data;
            // Re-anchor the pre-threshold state on the activation so the next
            // gradient step starts from the feasible point.
            u.assign(&a);

            if check_finite {
                ensure_finite(&u, "coefficients")?;
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
