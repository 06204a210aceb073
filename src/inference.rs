//! Shared solver contract.
//!
//! Everything common to the solvers lives here:
//! - the [`InferenceMethod`] trait and its [`Inference`] result,
//! - the [`Trace`] mode controlling per-iteration history,
//! - the opt-in non-finite guard ([`ensure_finite`]),
//! - the soft-threshold nonlinearity shared by LCA and ISTA.
//!
//! The contract is:
//! - solvers hold no per-call state: `infer(&self, ...)` is reentrant,
//! - shapes are validated before any arithmetic,
//! - history is recorded only when a trace mode is configured, because it
//!   costs O(iterations × batch × basis) memory.

use crate::{Error, Result};
use ndarray::{s, Array2, Array3, ArrayBase, ArrayView2, Data, Dimension};

/// Which per-iteration snapshots [`InferenceMethod::infer`] should keep.
///
/// `Membrane` records the raw pre-threshold state and is only meaningful for
/// LCA; every other solver rejects it at construction. `Activation` records
/// the coefficient estimate as of each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    /// Keep nothing; `Inference::history` is `None`.
    None,
    /// Record raw membrane potentials `u` (LCA only).
    Membrane,
    /// Record the coefficient estimate before each update, plus the final one.
    Activation,
}

impl Default for Trace {
    fn default() -> Self {
        Self::None
    }
}

/// Result of one inference call.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Final coefficients, `(n_samples, n_basis)`.
    pub coefficients: Array2<f64>,
    /// Per-iteration snapshots, `(n_samples, iterations + 1, n_basis)`.
    /// `Some` iff the solver was configured with a trace mode other than
    /// [`Trace::None`]; the last slab always equals `coefficients`.
    pub history: Option<Array3<f64>>,
    /// Update steps actually performed; fewer than the configured `n_iter`
    /// when early stopping fires.
    pub iterations: usize,
}

/// Common contract implemented by every solver in this crate.
pub trait InferenceMethod {
    /// Infer sparse codes for a batch.
    ///
    /// `dictionary` is `(n_features, n_basis)` and is never written. `data`
    /// is `(n_samples, n_features)`. `warm_start`, when given, must be
    /// `(n_samples, n_basis)`; solvers whose algorithm cannot start from a
    /// caller state reject it with [`Error::Config`] rather than silently
    /// ignoring it. `check_finite` enables the per-iteration non-finite
    /// guard; it costs a full pass over the state each iteration, which is
    /// why it is opt-in.
    fn infer(
        &self,
        dictionary: &ArrayView2<f64>,
        data: &ArrayView2<f64>,
        warm_start: Option<&ArrayView2<f64>>,
        check_finite: bool,
    ) -> Result<Inference>;
}

/// Fail with [`Error::Numeric`] naming `label` if any element of `tensor`
/// is NaN or ±inf.
pub fn ensure_finite<S, D>(tensor: &ArrayBase<S, D>, label: &'static str) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if tensor.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::Numeric(label))
    }
}

/// Shrinkage nonlinearity `sign(u) · max(|u| − threshold, 0)`.
pub fn soft_threshold(u: &ArrayView2<f64>, threshold: f64) -> Array2<f64> {
    u.mapv(|v| sign(v) * (v.abs() - threshold).max(0.0))
}

/// Sign with `sign(0) = 0`, the subgradient convention for `|x|` at the
/// origin. `f64::signum` maps ±0 to ±1, which would push an L1 penalty
/// gradient through exactly-zero coefficients.
#[inline]
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Frobenius norm.
#[inline]
pub(crate) fn frobenius(a: &Array2<f64>) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Validate dictionary/data/warm-start agreement.
///
/// Returns `(n_samples, n_features, n_basis)`.
pub(crate) fn problem_dims(
    dictionary: &ArrayView2<f64>,
    data: &ArrayView2<f64>,
    warm_start: Option<&ArrayView2<f64>>,
) -> Result<(usize, usize, usize)> {
    let (n_features, n_basis) = dictionary.dim();
    if n_features == 0 || n_basis == 0 {
        return Err(Error::Shape("dictionary must be non-empty"));
    }
    let (n_samples, data_features) = data.dim();
    if n_samples == 0 {
        return Err(Error::Shape("data batch must be non-empty"));
    }
    if data_features != n_features {
        return Err(Error::Shape("data columns must match dictionary rows"));
    }
    if let Some(w) = warm_start {
        if w.dim() != (n_samples, n_basis) {
            return Err(Error::Shape("warm start must be (n_samples, n_basis)"));
        }
    }
    Ok((n_samples, n_features, n_basis))
}

/// Accumulates per-iteration snapshots for the batch solvers.
///
/// Frames are staged as owned matrices and packed into one
/// `(n_samples, frames, n_basis)` array at the end. When disabled, `record`
/// never evaluates its closure, so the hot path pays nothing.
pub(crate) struct TraceLog {
    enabled: bool,
    frames: Vec<Array2<f64>>,
}

impl TraceLog {
    pub(crate) fn new(enabled: bool, n_iter: usize) -> Self {
        let frames = if enabled {
            Vec::with_capacity(n_iter + 1)
        } else {
            Vec::new()
        };
        Self { enabled, frames }
    }

    #[inline]
    pub(crate) fn record(&mut self, frame: impl FnOnce() -> Array2<f64>) {
        if self.enabled {
            self.frames.push(frame());
        }
    }

    pub(crate) fn into_history(self) -> Option<Array3<f64>> {
        if !self.enabled || self.frames.is_empty() {
            return None;
        }
        let (n_samples, n_basis) = self.frames[0].dim();
        let mut history = Array3::<f64>::zeros((n_samples, self.frames.len(), n_basis));
        for (k, frame) in self.frames.iter().enumerate() {
            history.slice_mut(s![.., k, ..]).assign(frame);
        }
        Some(history)
    }
}

/// Pack per-sample snapshot rows into `history[sample, .., ..]`.
///
/// Used by the per-sample solvers, whose frames are rows rather than whole
/// batch matrices. Every sample must produce the same number of frames.
pub(crate) fn pack_sample_frames(
    history: &mut Array3<f64>,
    sample: usize,
    frames: &[ndarray::Array1<f64>],
) {
    debug_assert_eq!(history.dim().1, frames.len());
    for (k, frame) in frames.iter().enumerate() {
        history.slice_mut(s![sample, k, ..]).assign(frame);
    }
}

/// Active-set size `ceil(sparsity · n_basis)`, at least 1 for any positive
/// sparsity and at most `n_basis` for `sparsity <= 1`.
#[inline]
pub(crate) fn support_size(sparsity: f64, n_basis: usize) -> usize {
    debug_assert!(sparsity > 0.0 && sparsity <= 1.0);
    (sparsity * n_basis as f64).ceil() as usize
}

/// One sample's worth of output from a per-sample solver.
pub(crate) struct SampleRun {
    pub(crate) coefficients: ndarray::Array1<f64>,
    /// Empty unless tracing is on.
    pub(crate) frames: Vec<ndarray::Array1<f64>>,
}

/// Solve each sample independently, in row order.
///
/// With the `parallel` feature the rows fan out over the rayon pool;
/// collection preserves row order either way, and any row error aborts
/// the whole call.
#[cfg(feature = "parallel")]
pub(crate) fn map_samples<F>(n_samples: usize, solve: F) -> Result<Vec<SampleRun>>
where
    F: Fn(usize) -> Result<SampleRun> + Send + Sync,
{
    use rayon::prelude::*;
    (0..n_samples).into_par_iter().map(solve).collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_samples<F>(n_samples: usize, solve: F) -> Result<Vec<SampleRun>>
where
    F: Fn(usize) -> Result<SampleRun> + Send + Sync,
{
    (0..n_samples).map(solve).collect()
}

/// Stack per-sample runs back into batch arrays.
///
/// `traced_len` is the expected frame count per sample when tracing is on.
pub(crate) fn assemble_rows(
    runs: Vec<SampleRun>,
    n_basis: usize,
    traced_len: Option<usize>,
) -> (Array2<f64>, Option<Array3<f64>>) {
    let n_samples = runs.len();
    let mut coefficients = Array2::<f64>::zeros((n_samples, n_basis));
    let mut history = traced_len.map(|len| Array3::<f64>::zeros((n_samples, len, n_basis)));
    for (i, run) in runs.into_iter().enumerate() {
        coefficients.row_mut(i).assign(&run.coefficients);
        if let Some(history) = history.as_mut() {
            pack_sample_frames(history, i, &run.frames);
        }
    }
    (coefficients, history)
}
