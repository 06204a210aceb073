//! Iterative hard thresholding (IHT).
//!
//! Each sample is solved independently: every iteration takes one unit
//! gradient step on the reconstruction error and then projects back onto
//! the set of vectors with at most `K = ceil(sparsity · n_basis)` nonzero
//! entries, keeping the largest magnitudes. The projection rebuilds the
//! coefficient vector from scratch, so atoms can enter and leave the
//! support between iterations.
//!
//! Public invariants (must not change):
//! - Output rows never carry more than `K` nonzero coefficients.
//! - Rows are solved independently and assembled in input order, so batch
//!   results match per-sample results bitwise.
//! - Coefficients start from zero; warm starts are rejected.

use crate::inference::{
    assemble_rows, ensure_finite, map_samples, problem_dims, support_size, Inference,
    InferenceMethod, SampleRun, Trace,
};
use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// IHT hyperparameters.
#[derive(Debug, Clone)]
pub struct IhtConfig {
    /// Fraction of the dictionary allowed in the support, in `(0, 1]`.
    pub sparsity: f64,
    /// Gradient-project iterations.
    pub n_iter: usize,
    /// Optional coefficient history; membrane tracing is rejected.
    pub trace: Trace,
}

impl IhtConfig {
    /// Defaults with the given support fraction.
    pub fn new(sparsity: f64) -> Self {
        Self {
            sparsity,
            n_iter: 10,
            trace: Trace::None,
        }
    }
}

/// Hard-thresholding solver.
#[derive(Debug, Clone)]
pub struct Iht {
    cfg: IhtConfig,
}

impl Iht {
    /// Validate and freeze a configuration.
    pub fn new(cfg: IhtConfig) -> Result<Self> {
        if !(cfg.sparsity > 0.0 && cfg.sparsity <= 1.0) {
            return Err(Error::Config("sparsity must lie in (0, 1]"));
        }
        if cfg.n_iter == 0 {
            return Err(Error::Config("n_iter must be >= 1"));
        }
        if cfg.trace == Trace::Membrane {
            return Err(Error::Config("membrane tracing is only defined for lca"));
        }
        Ok(Self { cfg })
    }

    /// Solve a single sample; the per-iteration finite guard is always on.
    pub fn infer_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        sample: &ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let (n_features, n_basis) = dictionary.dim();
        if n_features == 0 || n_basis == 0 {
            return Err(Error::Shape("dictionary must be non-empty"));
        }
        if sample.len() != n_features {
            return Err(Error::Shape("sample length must match dictionary rows"));
        }
        let k = support_size(self.cfg.sparsity, n_basis);
        let run = self.solve_sample(dictionary, sample, k, false, true)?;
        Ok(run.coefficients)
    }

    fn solve_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        sample: &ArrayView1<f64>,
        k: usize,
        traced: bool,
        check_finite: bool,
    ) -> Result<SampleRun> {
        let n_basis = dictionary.ncols();
        let mut coeff = Array1::<f64>::zeros(n_basis);
        let mut frames = if traced {
            Vec::with_capacity(self.cfg.n_iter + 1)
        } else {
            Vec::new()
        };
        let mut order: Vec<usize> = Vec::with_capacity(n_basis);

        for _ in 0..self.cfg.n_iter {
            if traced {
                frames.push(coeff.clone());
            }
            let residual = sample - &dictionary.dot(&coeff);
            let temp = &coeff + &residual.dot(dictionary);

            // Argsort by descending magnitude; ties keep the lower index.
            order.clear();
            order.extend(0..n_basis);
            order.sort_by(|&a, &b| temp[b].abs().total_cmp(&temp[a].abs()));

            let mut next = Array1::<f64>::zeros(n_basis);
            for &j in order.iter().take(k) {
                next[j] = temp[j];
            }
            coeff = next;
            if check_finite {
                ensure_finite(&coeff, "coefficients")?;
            }
        }
        if traced {
            frames.push(coeff.clone());
        }
        Ok(SampleRun {
            coefficients: coeff,
            frames,
        })
    }
}

impl InferenceMethod for Iht {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        if warm_start.is_some() {
            return Err(Error::Config(
                "warm start is not supported: coefficients start from zero",
            ));
        }
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, None)?;
        let k = support_size(self.cfg.sparsity, n_basis);
        let traced = self.cfg.trace == Trace::Activation;

        let runs = map_samples(n_samples, |i| {
            self.solve_sample(dictionary, &data.row(i), k, traced, check_finite)
        })?;
        let (coefficients, history) =
            assemble_rows(runs, n_basis, traced.then_some(self.cfg.n_iter + 1));

        Ok(Inference {
            coefficients,
            history,
            iterations: self.cfg.n_iter,
        })
    }
}
