use std::ops::Range;
use std::str::FromStr;

use rayon::prelude::*;
use rten_tensor::prelude::*;
use rten_tensor::Tensor;
use smallvec::SmallVec;

use crate::lod::{Lod, LodError, LodTensor};
use crate::op_registry::ReadOp;
use crate::operator::{grad_var_name, require, Attrs, OpError, Operator, VarMap};

/// Reduction applied to each sequence by [`sequence_pool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolStrategy {
    /// Mean of the sequence's rows.
    Average = 0,
    /// Sum of the sequence's rows.
    Sum = 1,
    /// Sum of the sequence's rows divided by the square root of its length.
    Sqrt = 2,
    /// Element-wise maximum of the sequence's rows.
    Max = 3,
    /// Final row of the sequence.
    Last = 4,
    /// Initial row of the sequence.
    First = 5,
}

impl TryFrom<i64> for PoolStrategy {
    type Error = OpError;

    fn try_from(val: i64) -> Result<Self, Self::Error> {
        let strategy = match val {
            0 => PoolStrategy::Average,
            1 => PoolStrategy::Sum,
            2 => PoolStrategy::Sqrt,
            3 => PoolStrategy::Max,
            4 => PoolStrategy::Last,
            5 => PoolStrategy::First,
            _ => {
                return Err(OpError::InvalidAttr {
                    name: "strategy".to_string(),
                    reason: format!("unknown pooling strategy {}", val),
                })
            }
        };
        Ok(strategy)
    }
}

impl FromStr for PoolStrategy {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let strategy = match s.to_ascii_uppercase().as_str() {
            "AVERAGE" => PoolStrategy::Average,
            "SUM" => PoolStrategy::Sum,
            "SQRT" => PoolStrategy::Sqrt,
            "MAX" => PoolStrategy::Max,
            "LAST" => PoolStrategy::Last,
            "FIRST" => PoolStrategy::First,
            _ => {
                return Err(OpError::InvalidAttr {
                    name: "pooltype".to_string(),
                    reason: format!("unknown pooling type \"{}\"", s),
                })
            }
        };
        Ok(strategy)
    }
}

/// Check that `lod` covers the rows of `input` and return the size of each
/// row when trailing dimensions are flattened.
fn check_input(input: &Tensor<f32>, lod: &Lod) -> Result<usize, OpError> {
    let Some((&rows, feature_shape)) = input.shape().split_first() else {
        return Err(OpError::IncompatibleInputShapes(
            "input must have at least one dimension",
        ));
    };
    let end = lod.total_rows();
    if end != rows {
        return Err(LodError::RowCountMismatch { end, rows }.into());
    }
    Ok(feature_shape.iter().product())
}

/// Return the shape of the pooled output, `[num_sequences, ...features]`.
fn pooled_shape(input: &Tensor<f32>, lod: &Lod) -> SmallVec<[usize; 4]> {
    let mut shape = SmallVec::new();
    shape.push(lod.num_sequences(lod.last_level()));
    shape.extend_from_slice(&input.shape()[1..]);
    shape
}

/// Reduce the rows of one sequence, stored contiguously in `rows`, into
/// `out`.
fn pool_sequence(rows: &[f32], strategy: PoolStrategy, out: &mut [f32]) {
    let width = out.len();
    let n_rows = rows.len() / width;
    if n_rows == 0 {
        out.fill(0.);
        return;
    }

    match strategy {
        PoolStrategy::Average | PoolStrategy::Sum | PoolStrategy::Sqrt => {
            out.fill(0.);
            for row in rows.chunks_exact(width) {
                for (acc, x) in out.iter_mut().zip(row) {
                    *acc += x;
                }
            }
            let divisor = match strategy {
                PoolStrategy::Average => n_rows as f32,
                PoolStrategy::Sqrt => (n_rows as f32).sqrt(),
                _ => 1.,
            };
            if divisor != 1. {
                out.iter_mut().for_each(|x| *x /= divisor);
            }
        }
        PoolStrategy::Max => {
            out.copy_from_slice(&rows[..width]);
            for row in rows.chunks_exact(width).skip(1) {
                for (max, &x) in out.iter_mut().zip(row) {
                    if x > *max {
                        *max = x;
                    }
                }
            }
        }
        PoolStrategy::Last => out.copy_from_slice(&rows[(n_rows - 1) * width..]),
        PoolStrategy::First => out.copy_from_slice(&rows[..width]),
    }
}

/// Pool each sequence in the finest level of `lod` into a single row.
///
/// `input` has shape `[rows, ...features]`. The output has shape
/// `[num_sequences, ...features]`. Sequences with no rows produce a row of
/// zeros.
pub fn sequence_pool(
    input: &Tensor<f32>,
    lod: &Lod,
    strategy: PoolStrategy,
) -> Result<Tensor<f32>, OpError> {
    let width = check_input(input, lod)?;
    let out_shape = pooled_shape(input, lod);
    if width == 0 {
        return Ok(Tensor::zeros(out_shape.as_slice()));
    }

    let input_data = input.to_slice();
    let input_data: &[f32] = &input_data;
    let level = lod.last_level();
    let ranges: Vec<Range<usize>> = lod.ranges(level).collect();

    let mut out_data = vec![0.; ranges.len() * width];
    out_data
        .par_chunks_mut(width)
        .zip(ranges.par_iter())
        .for_each(|(out_row, range)| {
            let rows = &input_data[range.start * width..range.end * width];
            pool_sequence(rows, strategy, out_row);
        });

    Ok(Tensor::from_data(out_shape.as_slice(), out_data))
}

/// Propagate the gradient `out_grad` for one pooled row back to the rows of
/// the sequence.
///
/// `rows` is the sequence's input, used to locate the maximum for
/// [`PoolStrategy::Max`]. `grad` must be zero-initialized.
fn pool_sequence_grad(rows: &[f32], out_grad: &[f32], strategy: PoolStrategy, grad: &mut [f32]) {
    let width = out_grad.len();
    let n_rows = rows.len() / width;
    if n_rows == 0 {
        return;
    }

    match strategy {
        PoolStrategy::Average | PoolStrategy::Sum | PoolStrategy::Sqrt => {
            let divisor = match strategy {
                PoolStrategy::Average => n_rows as f32,
                PoolStrategy::Sqrt => (n_rows as f32).sqrt(),
                _ => 1.,
            };
            for grad_row in grad.chunks_exact_mut(width) {
                for (dx, &dy) in grad_row.iter_mut().zip(out_grad) {
                    *dx = dy / divisor;
                }
            }
        }
        PoolStrategy::Max => {
            for col in 0..width {
                // Ties are resolved in favor of the earliest row, matching
                // the forward pass.
                let max_row = (1..n_rows).fold(0, |best, row| {
                    if rows[row * width + col] > rows[best * width + col] {
                        row
                    } else {
                        best
                    }
                });
                grad[max_row * width + col] = out_grad[col];
            }
        }
        PoolStrategy::Last => grad[(n_rows - 1) * width..].copy_from_slice(out_grad),
        PoolStrategy::First => grad[..width].copy_from_slice(out_grad),
    }
}

/// Split `data` into consecutive per-sequence chunks.
///
/// `ranges` must be ascending, contiguous and start at zero, which holds for
/// every level of a valid [`Lod`].
fn split_sequences_mut<'a>(
    mut data: &'a mut [f32],
    ranges: &[Range<usize>],
    width: usize,
) -> Vec<&'a mut [f32]> {
    let mut chunks = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(range.len() * width);
        chunks.push(head);
        data = tail;
    }
    chunks
}

/// Compute the gradient of [`sequence_pool`] with respect to its input.
///
/// `out_grad` is the gradient with respect to the pooled output and must
/// have the same shape as the output of `sequence_pool(input, lod, strategy)`.
pub fn sequence_pool_grad(
    input: &Tensor<f32>,
    lod: &Lod,
    out_grad: &Tensor<f32>,
    strategy: PoolStrategy,
) -> Result<Tensor<f32>, OpError> {
    let width = check_input(input, lod)?;
    if out_grad.shape() != pooled_shape(input, lod).as_slice() {
        return Err(OpError::IncompatibleInputShapes(
            "output gradient shape does not match pooled output",
        ));
    }

    let mut grad_data = vec![0.; input.len()];
    if width == 0 {
        return Ok(Tensor::from_data(input.shape(), grad_data));
    }

    let input_data = input.to_slice();
    let input_data: &[f32] = &input_data;
    let out_grad_data = out_grad.to_slice();
    let out_grad_data: &[f32] = &out_grad_data;
    let ranges: Vec<Range<usize>> = lod.ranges(lod.last_level()).collect();

    split_sequences_mut(&mut grad_data, &ranges, width)
        .into_par_iter()
        .zip(ranges.par_iter())
        .zip(out_grad_data.par_chunks(width))
        .for_each(|((grad, range), seq_out_grad)| {
            let rows = &input_data[range.start * width..range.end * width];
            pool_sequence_grad(rows, seq_out_grad, strategy, grad);
        });

    Ok(Tensor::from_data(input.shape(), grad_data))
}

/// Pools each sequence of input `X` into one row of output `Out`.
///
/// The output carries the input's LoD with the finest level removed.
#[derive(Debug)]
pub struct SequencePool {
    pub strategy: PoolStrategy,
}

fn input_lod(x: &LodTensor) -> Result<&Lod, OpError> {
    x.lod()
        .ok_or(OpError::InvalidValue("input \"X\" must have a LoD"))
}

impl Operator for SequencePool {
    fn name(&self) -> &str {
        "sequence_pool"
    }

    fn input_names(&self) -> &[&'static str] {
        &["X"]
    }

    fn output_names(&self) -> &[&'static str] {
        &["Out"]
    }

    fn run(&self, inputs: &VarMap) -> Result<VarMap, OpError> {
        let x = require(inputs, "X")?;
        let lod = input_lod(x)?;
        let out = sequence_pool(x.tensor(), lod, self.strategy)?;

        let mut outputs = VarMap::default();
        outputs.insert(
            "Out".to_string(),
            LodTensor::new(out, lod.without_last_level())?,
        );
        Ok(outputs)
    }

    fn run_grad(&self, inputs: &VarMap, out_grads: &VarMap) -> Result<VarMap, OpError> {
        let x = require(inputs, "X")?;
        let lod = input_lod(x)?;
        let out_grad = require(out_grads, &grad_var_name("Out"))?;
        let grad = sequence_pool_grad(x.tensor(), lod, out_grad.tensor(), self.strategy)?;

        let mut grads = VarMap::default();
        grads.insert(
            grad_var_name("X"),
            LodTensor::new(grad, Some(lod.clone()))?,
        );
        Ok(grads)
    }
}

impl ReadOp for SequencePool {
    fn op_type() -> &'static str {
        "sequence_pool"
    }

    fn read(attrs: &Attrs) -> Result<Self, OpError> {
        let strategy = match (attrs.get_int("strategy")?, attrs.get_string("pooltype")?) {
            (Some(strategy), _) => PoolStrategy::try_from(strategy)?,
            (None, Some(pool_type)) => pool_type.parse()?,
            (None, None) => PoolStrategy::Average,
        };
        Ok(SequencePool { strategy })
    }
}
