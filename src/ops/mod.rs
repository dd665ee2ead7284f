//! The `ops` module exposes the built-in operators.
//!
//! Each operator is available both as a struct implementing
//! [`Operator`](crate::Operator), which works with named and LoD-annotated
//! inputs, and as plain functions for the forward and gradient computations
//! on tensors.

mod l1_norm;
mod sequence_pool;

pub use l1_norm::{l1_norm, l1_norm_grad, L1Norm};
pub use sequence_pool::{sequence_pool, sequence_pool_grad, PoolStrategy, SequencePool};
