//! Locally competitive algorithm (LCA).
//!
//! Membrane-potential dynamics with lateral inhibition and an ideal soft
//! threshold, after Rozell et al., *Sparse Coding via Thresholding and Local
//! Competition in Neural Circuits* (Neural Computation, 2008).
//!
//! Per call the solver precomputes the driver `b = X·D` and the inhibition
//! matrix `G = DᵀD − I`, then integrates
//!
//! ```text
//! a = soft_threshold(u, θ)
//! u ← u + η · (b − u − a·G)
//! ```
//!
//! The trace mode is a tri-state: record nothing, raw membrane potentials,
//! or post-threshold activations. In membrane mode the *returned*
//! coefficients are the final raw potentials, matching the last history
//! frame, instead of being re-thresholded.

use crate::inference::{
    ensure_finite, frobenius, problem_dims, soft_threshold, Inference, InferenceMethod, Trace,
    TraceLog,
};
use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// LCA hyperparameters.
#[derive(Debug, Clone)]
pub struct LcaConfig {
    /// Membrane update steps.
    pub n_iter: usize,
    /// Update rate `η` of the membrane dynamics.
    pub coeff_lr: f64,
    /// Soft-threshold level `θ`.
    pub threshold: f64,
    /// Stop once the relative membrane change falls below `epsilon`.
    pub stop_early: bool,
    /// Early-stop criterion `‖u_old − u‖ / ‖u_old‖ < epsilon`.
    pub epsilon: f64,
    /// Which per-iteration snapshots to keep. All three modes are legal here.
    pub trace: Trace,
}

impl Default for LcaConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            coeff_lr: 1e-3,
            threshold: 0.1,
            stop_early: false,
            epsilon: 1e-2,
            trace: Trace::None,
        }
    }
}

/// Locally competitive algorithm solver.
#[derive(Debug, Clone)]
pub struct Lca {
    cfg: LcaConfig,
}

impl Lca {
    /// Validate and freeze a configuration.
    pub fn new(cfg: LcaConfig) -> Result<Self> {
        if cfg.n_iter == 0 {
            return Err(Error::Config("n_iter must be >= 1"));
        }
        if !(cfg.coeff_lr > 0.0) || !cfg.coeff_lr.is_finite() {
            return Err(Error::Config("coeff_lr must be positive and finite"));
        }
        if !(cfg.threshold >= 0.0) || !cfg.threshold.is_finite() {
            return Err(Error::Config("threshold must be nonnegative and finite"));
        }
        if !(cfg.epsilon > 0.0) || !cfg.epsilon.is_finite() {
            return Err(Error::Config("epsilon must be positive and finite"));
        }
        Ok(Self { cfg })
    }
}

impl InferenceMethod for Lca {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, warm_start)?;
        let cfg = &self.cfg;

        // Fixed for the whole call: driver and lateral inhibition.
        let driver = data.dot(dictionary);
        let gram = dictionary.t().dot(dictionary) - Array2::<f64>::eye(n_basis);

        let mut u = match warm_start {
            Some(w) => w.to_owned(),
            None => Array2::<f64>::zeros((n_samples, n_basis)),
        };

        let mut trace = TraceLog::new(cfg.trace != Trace::None, cfg.n_iter);
        let mut iterations = 0;

        for _ in 0..cfg.n_iter {
            let u_old = cfg.stop_early.then(|| u.clone());

            match cfg.trace {
                Trace::None => {}
                Trace::Membrane => trace.record(|| u.clone()),
                Trace::Activation => trace.record(|| soft_threshold(&u.view(), cfg.threshold)),
            }

            let a = soft_threshold(&u.view(), cfg.threshold);
            // gram is symmetric, so (G aᵀ)ᵀ = a·G.
            let du = &driver - &u - a.dot(&gram);
            u.scaled_add(cfg.coeff_lr, &du);
            iterations += 1;

            if let Some(u_old) = u_old {
                let denom = frobenius(&u_old);
                let change = frobenius(&(&u_old - &u));
                if denom > 0.0 && change / denom < cfg.epsilon {
                    break;
                }
            }

            if check_finite {
                ensure_finite(&u, "membrane potentials")?;
            }
        }

        let coefficients = match cfg.trace {
            Trace::Membrane => u,
            _ => soft_threshold(&u.view(), cfg.threshold),
        };
        trace.record(|| coefficients.clone());

        Ok(Inference {
            coefficients,
            history: trace.into_history(),
            iterations,
        })
    }
}
