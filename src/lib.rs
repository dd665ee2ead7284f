//! rten-seqpool provides sequence pooling operators for tensors which pack
//! variable-length sequences along their first dimension.
//!
//! # Packed sequences
//!
//! A batch of sequences with different lengths is stored as a single tensor
//! of shape `[total_rows, ...features]` together with a length-offset index
//! table ([`Lod`]). The table is an ascending list of offsets where each
//! consecutive pair delimits one sequence. For example the offsets
//! `[0, 4, 5, 8, 11]` split an 11-row tensor into sequences of length 4, 1, 3
//! and 3. Tables can have several levels, in which case the coarser levels
//! group sequences of the finer levels.
//!
//! # Operators
//!
//! Operators implement the [`Operator`] trait, which runs the operator on
//! named inputs and computes gradients with respect to those inputs. They
//! can be constructed by type name and attributes using an [`OpRegistry`].
//!
//! The built-in operators are:
//!
//! - `sequence_pool` ([`ops::SequencePool`]) reduces each sequence to a
//!   single row using one of the strategies in [`ops::PoolStrategy`]
//! - `l1_norm` ([`ops::L1Norm`]) computes the sum of absolute values of its
//!   input
//!
//! # Testing operators
//!
//! The [`op_test`] module contains a harness which checks an operator's
//! outputs against expected values and its gradients against numerical
//! estimates.
//!
//! ## Configuration
//!
//! The gradient check can be tuned using environment variables:
//!
//! - `RTEN_GRAD_CHECK_DELTA` sets the default finite-difference step
//! - `RTEN_GRAD_CHECK_LOG=1` logs the error of every checked element at
//!   debug level, via the [log](https://docs.rs/log) crate

mod env;
mod lod;
mod op_registry;
mod operator;

pub mod ops;

pub use lod::{Lod, LodError, LodTensor};
pub use op_registry::{OpRegistry, ReadOp};
pub use operator::{grad_var_name, require, AttrValue, Attrs, OpError, Operator, VarMap};
