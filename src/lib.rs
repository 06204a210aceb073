//! # sparsecode
//!
//! Iterative sparse-coding inference: given a fixed dictionary `D`
//! (`n_features × n_basis`) and a data batch `X` (`n_samples × n_features`),
//! each solver here finds a coefficient matrix `A` (`n_samples × n_basis`)
//! with `X ≈ A·Dᵀ` and most of `A` zero.
//!
//! This crate is intentionally small:
//!
//! - it implements **inference only** — the dictionary-learning outer loop,
//!   data loading, and plotting all live elsewhere,
//! - every solver is a plug-in behind one trait ([`inference::InferenceMethod`]),
//!   so an outer loop can swap algorithms without caring which one runs,
//! - it stays on `ndarray` (CPU); dense factorizations it cannot express
//!   (symmetric eigenvalues, SVD least-squares) come from `nalgebra`.
//!
//! ## Public invariants (must not change)
//!
//! - **Determinism knobs are explicit**: the one stochastic initializer
//!   ([`vanilla`]) takes a `seed`; identical inputs give identical outputs.
//! - **Solvers are frozen at construction**: configs are validated by `new`
//!   and never mutated; `infer` takes `&self` and owns all per-call state,
//!   so one solver value can serve concurrent calls.
//! - **The dictionary is never written** and the output is always
//!   `(n_samples, n_basis)`, plus an opt-in per-iteration history.
//! - **No retries**: a solver converges, exhausts its iteration budget, or
//!   fails with one of the [`Error`] variants.
//!
//! ## Module map
//!
//! - `inference`: the shared solver contract, trace modes, numeric guard
//! - `lca`: locally competitive algorithm (membrane dynamics, soft threshold)
//! - `vanilla`: plain gradient descent on the L1-penalized reconstruction loss
//! - `ista`: proximal gradient with the Lipschitz-derived step size
//! - `lsm`: Laplacian-scale-mixture reweighted L1 (outer loop over Adam)
//! - `optim`: loss/optimizer seams and the fixed-step generic driver
//! - `iht`: per-sample iterative hard thresholding (top-K projection)
//! - `pursuit`: per-sample matching pursuit and orthogonal matching pursuit
//!
//! Per-sample solvers expose `infer_sample` so callers can run their own
//! worker pools; the `parallel` feature switches the built-in batch loops to
//! rayon.

pub mod iht;
pub mod inference;
pub mod ista;
pub mod lca;
pub mod lsm;
pub mod optim;
pub mod pursuit;
pub mod vanilla;

/// sparsecode error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed hyperparameters, an unsupported trace mode, or a warm start
    /// handed to a solver that cannot honor one.
    #[error("invalid configuration: {0}")]
    Config(&'static str),
    /// Dictionary/data/warm-start dimension disagreement, detected before
    /// any arithmetic runs.
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    /// Non-finite values in the named quantity, reported by the opt-in
    /// per-iteration guard or by a failed factorization.
    #[error("numeric instability in {0}")]
    Numeric(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
