//! # Arbora
//!
//! Exact marginal inference for second-order projective dependency parsing.
//!
//! For a sentence of n tokens, Arbora computes the marginal probability of
//! every candidate head-modifier edge and every head-modifier-grandparent
//! triple under a factor-graph model that combines per-edge potentials with
//! grandparent potentials, subject to the hard constraint that selected
//! edges form a projective dependency tree. A hand-written reverse-mode
//! adjoint pass propagates gradients of beliefs or of the partition function
//! back to the raw model scores, making the engine trainable end to end.
//!
//! ## Architecture
//!
//! - **algebra**: Pluggable numeric domains (real, log, signed log) behind a
//!   compile-time semiring interface
//! - **model**: Per-sentence factor graphs over edge variables, with
//!   adjoint storage for training
//! - **engine**: Score tensor, chart hypergraph, inside-outside dynamic
//!   program, belief extraction, and batch dispatch
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbora::{DepFactor, DepFactorGraph, EdgeKey, InferenceConfig,
//!              LogProb, SecondOrderInferencer, Semiring};
//!
//! let model = DepFactorGraph::from_factors(2, vec![
//!     DepFactor::ProjectiveTree,
//!     DepFactor::Edge { key: EdgeKey::new(-1, 0), potential: LogProb::from_real(0.9) },
//! ])?;
//! let mut engine = SecondOrderInferencer::new(InferenceConfig::default());
//! let beliefs = engine.forward(&model)?;
//! ```

#![forbid(unsafe_code)]

pub mod algebra;
pub mod engine;
pub mod model;

// Re-export commonly used types
pub use algebra::{LogProb, LogSign, Real, Ring, Semiring};
pub use engine::batch::{run_batch, BatchConfig};
pub use engine::beliefs::{Beliefs, OutputAdjoints};
pub use engine::errors::InferenceError;
pub use engine::inference::{InferenceConfig, InferenceDiagnostics, SecondOrderInferencer};
pub use model::{DepFactor, DepFactorGraph, EdgeKey, RootStyle, TripleKey};
