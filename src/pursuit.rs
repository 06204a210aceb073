//! Greedy pursuit: matching pursuit (MP) and its orthogonal variant (OMP).
//!
//! Both run `K = ceil(sparsity · n_basis)` selection steps per sample,
//! scoring atoms by `|residual · atom| / ‖atom‖` so unnormalized
//! dictionaries do not bias selection toward long atoms. They differ in
//! what happens after a pick:
//!
//! - MP writes the raw inner product into the chosen slot and deflates the
//!   residual by that single atom. Re-selecting an atom overwrites its
//!   coefficient.
//! - OMP appends the pick to an active list, skipping atoms already in it,
//!   and re-solves the least-squares problem over all active atoms against
//!   the original sample, so the residual stays orthogonal to everything
//!   selected so far.
//!
//! Public invariants (must not change):
//! - Selection scans in index order with a strict `>`, so the lowest index
//!   wins ties and non-finite scores are never picked. OMP additionally
//!   excludes its active set, keeping it duplicate-free.
//! - OMP's residual norm never increases from one step to the next.
//! - Rows are solved independently and assembled in input order.

use crate::inference::{
    assemble_rows, ensure_finite, map_samples, problem_dims, support_size, Inference,
    InferenceMethod, SampleRun, Trace,
};
use crate::{Error, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Singular values below this are treated as zero in the OMP refit.
const REFIT_EPS: f64 = 1e-10;

/// Column L2 norms of the dictionary, `(n_basis,)`.
///
/// Computed once per batch; exposed so [`MatchingPursuit::infer_sample`]
/// and [`OrthogonalMatchingPursuit::infer_sample`] can reuse it across
/// many samples.
pub fn atom_norms(dictionary: &ArrayView2<f64>) -> Array1<f64> {
    dictionary.map_axis(Axis(0), |col| {
        col.iter().map(|v| v * v).sum::<f64>().sqrt()
    })
}

/// Shared pursuit hyperparameters.
#[derive(Debug, Clone)]
pub struct PursuitConfig {
    /// Fraction of the dictionary to select, in `(0, 1]`.
    pub sparsity: f64,
    /// Optional coefficient history; membrane tracing is rejected.
    pub trace: Trace,
}

impl PursuitConfig {
    /// Defaults with the given selection fraction.
    pub fn new(sparsity: f64) -> Self {
        Self {
            sparsity,
            trace: Trace::None,
        }
    }
}

fn validate(cfg: &PursuitConfig) -> Result<()> {
    if !(cfg.sparsity > 0.0 && cfg.sparsity <= 1.0) {
        return Err(Error::Config("sparsity must lie in (0, 1]"));
    }
    if cfg.trace == Trace::Membrane {
        return Err(Error::Config("membrane tracing is only defined for lca"));
    }
    Ok(())
}

/// Index of the best atom under `|dp| / norm`, scanning in index order and
/// passing over anything in `exclude`.
///
/// A zero atom scores `0/0 = NaN` and is skipped by the strict comparison,
/// so it can never beat a finite score; when every candidate ties at NaN
/// the lowest non-excluded index is returned.
fn select_atom(dp: &Array1<f64>, norms: &ArrayView1<f64>, exclude: &[usize]) -> usize {
    let mut best = (0..dp.len()).find(|j| !exclude.contains(j)).unwrap_or(0);
    let mut best_score = f64::NEG_INFINITY;
    for (j, (&d, &n)) in dp.iter().zip(norms.iter()).enumerate() {
        if exclude.contains(&j) {
            continue;
        }
        let score = d.abs() / n;
        if score > best_score {
            best = j;
            best_score = score;
        }
    }
    best
}

fn check_sample_dims(
    dictionary: &ArrayView2<f64>,
    norms: &ArrayView1<f64>,
    sample: &ArrayView1<f64>,
) -> Result<(usize, usize)> {
    let (n_features, n_basis) = dictionary.dim();
    if n_features == 0 || n_basis == 0 {
        return Err(Error::Shape("dictionary must be non-empty"));
    }
    if sample.len() != n_features {
        return Err(Error::Shape("sample length must match dictionary rows"));
    }
    if norms.len() != n_basis {
        return Err(Error::Shape(
            "atom norms length must match dictionary columns",
        ));
    }
    Ok((n_features, n_basis))
}

/// Matching pursuit.
#[derive(Debug, Clone)]
pub struct MatchingPursuit {
    cfg: PursuitConfig,
}

impl MatchingPursuit {
    /// Validate and freeze a configuration.
    pub fn new(cfg: PursuitConfig) -> Result<Self> {
        validate(&cfg)?;
        Ok(Self { cfg })
    }

    /// Solve a single sample with precomputed [`atom_norms`]; the
    /// per-iteration finite guard is always on.
    pub fn infer_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        norms: &ArrayView1<f64>,
        sample: &ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let (_, n_basis) = check_sample_dims(dictionary, norms, sample)?;
        let k = support_size(self.cfg.sparsity, n_basis);
        let run = self.solve_sample(dictionary, norms, sample, k, false, true)?;
        Ok(run.coefficients)
    }

    fn solve_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        norms: &ArrayView1<f64>,
        sample: &ArrayView1<f64>,
        k: usize,
        traced: bool,
        check_finite: bool,
    ) -> Result<SampleRun> {
        let n_basis = dictionary.ncols();
        let mut coeff = Array1::<f64>::zeros(n_basis);
        let mut y = sample.to_owned();
        let mut frames = if traced {
            Vec::with_capacity(k + 1)
        } else {
            Vec::new()
        };

        for _ in 0..k {
            if traced {
                frames.push(coeff.clone());
            }
            let dp = y.dot(dictionary);
            let ind = select_atom(&dp, norms, &[]);
            coeff[ind] = dp[ind];
            y.scaled_add(-dp[ind], &dictionary.column(ind));
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

impl InferenceMethod for MatchingPursuit {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        if warm_start.is_some() {
            return Err(Error::Config(
                "warm start is not supported: pursuit builds the support greedily",
            ));
        }
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, None)?;
        let k = support_size(self.cfg.sparsity, n_basis);
        let traced = self.cfg.trace == Trace::Activation;
        let norms = atom_norms(dictionary);

        let runs = map_samples(n_samples, |i| {
            self.solve_sample(
                dictionary,
                &norms.view(),
                &data.row(i),
                k,
                traced,
                check_finite,
            )
        })?;
        let (coefficients, history) = assemble_rows(runs, n_basis, traced.then_some(k + 1));

        Ok(Inference {
            coefficients,
            history,
            iterations: k,
        })
    }
}

/// Orthogonal matching pursuit.
#[derive(Debug, Clone)]
pub struct OrthogonalMatchingPursuit {
    cfg: PursuitConfig,
}

impl OrthogonalMatchingPursuit {
    /// Validate and freeze a configuration.
    pub fn new(cfg: PursuitConfig) -> Result<Self> {
        validate(&cfg)?;
        Ok(Self { cfg })
    }

    /// Solve a single sample with precomputed [`atom_norms`]; the
    /// per-iteration finite guard is always on.
    pub fn infer_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        norms: &ArrayView1<f64>,
        sample: &ArrayView1<f64>,
    ) -> Result<Array1<f64>> {
        let (_, n_basis) = check_sample_dims(dictionary, norms, sample)?;
        let k = support_size(self.cfg.sparsity, n_basis);
        let run = self.solve_sample(dictionary, norms, sample, k, false, true)?;
        Ok(run.coefficients)
    }

    fn solve_sample(
        &self,
        dictionary: &ArrayView2<f64>,
        norms: &ArrayView1<f64>,
        sample: &ArrayView1<f64>,
        k: usize,
        traced: bool,
        check_finite: bool,
    ) -> Result<SampleRun> {
        let (n_features, n_basis) = dictionary.dim();
        let mut coeff = Array1::<f64>::zeros(n_basis);
        let mut residual = sample.to_owned();
        let mut active: Vec<usize> = Vec::with_capacity(k);
        let rhs = DVector::from_iterator(n_features, sample.iter().copied());
        let mut frames = if traced {
            Vec::with_capacity(k + 1)
        } else {
            Vec::new()
        };

        for _ in 0..k {
            if traced {
                frames.push(coeff.clone());
            }
            // Active atoms are excluded: once the residual is orthogonal to
            // the span, a re-pick would duplicate a design column and the
            // minimum-norm refit would split its weight, growing the
            // residual again.
            let dp = residual.dot(dictionary);
            let ind = select_atom(&dp, norms, &active);
            active.push(ind);

            // Refit over the whole active set against the original sample.
            let design = DMatrix::from_fn(n_features, active.len(), |r, c| {
                dictionary[[r, active[c]]]
            });
            let svd = design.svd(true, true);
            let solution = svd
                .solve(&rhs, REFIT_EPS)
                .map_err(|_| Error::Numeric("least-squares refit"))?;
            if !solution.iter().all(|v| v.is_finite()) {
                return Err(Error::Numeric("least-squares refit"));
            }

            coeff.fill(0.0);
            for (c, &j) in active.iter().enumerate() {
                coeff[j] = solution[c];
            }
            residual = sample - &dictionary.dot(&coeff);
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

impl InferenceMethod for OrthogonalMatchingPursuit {
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference> {
        if warm_start.is_some() {
            return Err(Error::Config(
                "warm start is not supported: pursuit builds the support greedily",
            ));
        }
        let (n_samples, _, n_basis) = problem_dims(dictionary, data, None)?;
        let k = support_size(self.cfg.sparsity, n_basis);
        let traced = self.cfg.trace == Trace::Activation;
        let norms = atom_norms(dictionary);

        let runs = map_samples(n_samples, |i| {
            self.solve_sample(
                dictionary,
                &norms.view(),
                &data.row(i),
                k,
                traced,
                check_finite,
            )
        })?;
        let (coefficients, history) = assemble_rows(runs, n_basis, traced.then_some(k + 1));

        Ok(Inference {
            coefficients,
            history,
            iterations: k,
        })
    }
}
