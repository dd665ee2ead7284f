//! Length-offset index tables for tensors which pack variable-length
//! sequences along their first dimension.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::ops::Range;

use rten_tensor::prelude::*;
use rten_tensor::Tensor;

/// Errors from constructing a [`Lod`] or attaching one to a tensor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LodError {
    /// The table has no levels.
    Empty,

    /// A level has no offsets.
    EmptyLevel { level: usize },

    /// A level does not begin at zero.
    NonZeroStart { level: usize },

    /// Offsets in a level decrease.
    Descending { level: usize, index: usize },

    /// The final offset of a level does not match the number of sequences in
    /// the next finer level.
    LevelMismatch { level: usize, end: usize, expected: usize },

    /// The final offset of the finest level does not match the tensor's first
    /// dimension.
    RowCountMismatch { end: usize, rows: usize },
}

impl Display for LodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LodError::Empty => write!(f, "LoD has no levels"),
            LodError::EmptyLevel { level } => write!(f, "LoD level {} is empty", level),
            LodError::NonZeroStart { level } => {
                write!(f, "LoD level {} does not start at 0", level)
            }
            LodError::Descending { level, index } => {
                write!(f, "LoD level {} decreases at offset {}", level, index)
            }
            LodError::LevelMismatch {
                level,
                end,
                expected,
            } => write!(
                f,
                "LoD level {} ends at {} but next level has {} sequences",
                level, end, expected
            ),
            LodError::RowCountMismatch { end, rows } => write!(
                f,
                "LoD ends at {} but tensor has {} rows",
                end, rows
            ),
        }
    }
}

impl Error for LodError {}

/// Multi-level length-offset index table.
///
/// Each level is an ascending list of offsets where consecutive pairs delimit
/// half-open ranges. The finest (last) level indexes rows of a tensor. Each
/// coarser level indexes sequences of the level after it.
///
/// For example `[[0, 4, 5, 8, 11]]` splits an 11-row tensor into sequences
/// of length 4, 1, 3 and 3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lod {
    levels: Vec<Vec<usize>>,
}

impl Lod {
    /// Create a table from offset lists, coarsest level first.
    pub fn new(levels: Vec<Vec<usize>>) -> Result<Lod, LodError> {
        if levels.is_empty() {
            return Err(LodError::Empty);
        }

        for (level, offsets) in levels.iter().enumerate() {
            match offsets.first() {
                None => return Err(LodError::EmptyLevel { level }),
                Some(&start) if start != 0 => return Err(LodError::NonZeroStart { level }),
                _ => {}
            }
            if let Some(index) = offsets.windows(2).position(|w| w[1] < w[0]) {
                return Err(LodError::Descending {
                    level,
                    index: index + 1,
                });
            }
        }

        for (level, pair) in levels.windows(2).enumerate() {
            let end = *pair[0].last().unwrap_or(&0);
            let expected = pair[1].len() - 1;
            if end != expected {
                return Err(LodError::LevelMismatch {
                    level,
                    end,
                    expected,
                });
            }
        }

        Ok(Lod { levels })
    }

    /// Create a single-level table from sequence lengths.
    pub fn from_lengths(lengths: &[usize]) -> Lod {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0);
        let mut end = 0;
        for len in lengths {
            end += len;
            offsets.push(end);
        }
        Lod {
            levels: vec![offsets],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Return the offsets for a level.
    pub fn level(&self, level: usize) -> &[usize] {
        &self.levels[level]
    }

    /// Return the index of the finest level, which addresses tensor rows.
    pub fn last_level(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn num_sequences(&self, level: usize) -> usize {
        self.levels[level].len() - 1
    }

    /// Return the range of entries covered by sequence `index` in `level`.
    pub fn sequence_range(&self, level: usize, index: usize) -> Range<usize> {
        let offsets = &self.levels[level];
        offsets[index]..offsets[index + 1]
    }

    /// Return an iterator over the ranges of all sequences in `level`.
    pub fn ranges(&self, level: usize) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        self.levels[level].windows(2).map(|w| w[0]..w[1])
    }

    /// Return the length of every sequence in `level`.
    pub fn lengths(&self, level: usize) -> Vec<usize> {
        self.ranges(level).map(|r| r.len()).collect()
    }

    /// Return the end offset of the finest level.
    pub fn total_rows(&self) -> usize {
        *self.levels[self.last_level()].last().unwrap_or(&0)
    }

    /// Return the table with the finest level removed, or `None` if there is
    /// only one level.
    ///
    /// This is the table for the output of an operation which reduces every
    /// finest-level sequence to a single row.
    pub fn without_last_level(&self) -> Option<Lod> {
        if self.levels.len() < 2 {
            return None;
        }
        Some(Lod {
            levels: self.levels[..self.levels.len() - 1].to_vec(),
        })
    }
}

/// A tensor with an optional [`Lod`] describing sequences packed along its
/// first dimension.
#[derive(Clone, Debug)]
pub struct LodTensor {
    tensor: Tensor<f32>,
    lod: Option<Lod>,
}

impl LodTensor {
    /// Attach a table to a tensor.
    ///
    /// Fails if the table does not cover exactly the rows of `tensor`.
    pub fn new(tensor: Tensor<f32>, lod: Option<Lod>) -> Result<LodTensor, LodError> {
        if let Some(lod) = &lod {
            let rows = tensor.shape().first().copied().unwrap_or(0);
            let end = lod.total_rows();
            if end != rows {
                return Err(LodError::RowCountMismatch { end, rows });
            }
        }
        Ok(LodTensor { tensor, lod })
    }

    pub fn tensor(&self) -> &Tensor<f32> {
        &self.tensor
    }

    pub fn lod(&self) -> Option<&Lod> {
        self.lod.as_ref()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn into_parts(self) -> (Tensor<f32>, Option<Lod>) {
        (self.tensor, self.lod)
    }
}

impl From<Tensor<f32>> for LodTensor {
    fn from(tensor: Tensor<f32>) -> LodTensor {
        LodTensor { tensor, lod: None }
    }
}
