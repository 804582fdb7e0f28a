//! The inference engine for projective dependency factor graphs.
//!
//! This module provides:
//! - **errors**: Error types for inference failures
//! - **scores**: Score-tensor assembly from factor potentials
//! - **hypergraph**: Chart construction for span-based parsing
//! - **inside_outside**: Generic forward/backward dynamic program
//! - **beliefs**: Belief extraction and its adjoint inverse
//! - **inference**: Per-sentence orchestration and state machine
//! - **batch**: Sentence-granularity parallel dispatch

pub mod batch;
pub mod beliefs;
pub mod errors;
pub mod hypergraph;
pub mod inference;
pub mod inside_outside;
pub mod scores;
