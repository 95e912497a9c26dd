// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dense row-major tensor used by the bounding stack.
//!
//! Rows are samples and columns are output variables. The buffer is shared
//! behind an [`Arc`] so cloning a tensor is cheap; the first mutable access
//! through [`Tensor::data_mut`] detaches the buffer when another handle still
//! points at it. Every consumer can therefore treat a cloned tensor as an
//! independent value without paying for a copy until it writes.

use core::fmt;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

/// Result alias used throughout the pure module.
pub type PureResult<T> = Result<T, TensorError>;

/// Errors emitted by tensor constructors and accessors.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorError {
    /// A tensor constructor received an invalid shape.
    InvalidDimensions { rows: usize, cols: usize },
    /// Data provided to a constructor does not match the tensor shape.
    DataLength { expected: usize, got: usize },
    /// An operator was asked to combine tensors of incompatible shapes.
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    /// A row or column index fell outside the tensor.
    IndexOutOfBounds {
        axis: &'static str,
        index: usize,
        len: usize,
    },
    /// Generic configuration violation for tensor helpers.
    InvalidValue { label: &'static str },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::InvalidDimensions { rows, cols } => {
                write!(
                    f,
                    "invalid tensor dimensions ({rows} x {cols}); both axes must be non-zero"
                )
            }
            TensorError::DataLength { expected, got } => {
                write!(f, "data length mismatch: expected {expected}, got {got}")
            }
            TensorError::ShapeMismatch { left, right } => {
                write!(
                    f,
                    "shape mismatch: left={:?}, right={:?} cannot be combined",
                    left, right
                )
            }
            TensorError::IndexOutOfBounds { axis, index, len } => {
                write!(f, "{axis} index {index} is out of bounds for length {len}")
            }
            TensorError::InvalidValue { label } => {
                write!(f, "invalid value: {label}")
            }
        }
    }
}

impl Error for TensorError {}

/// A simple 2D tensor backed by a reference-counted, copy-on-write buffer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredTensor", into = "StoredTensor")]
pub struct Tensor {
    data: Arc<Vec<f32>>,
    rows: usize,
    cols: usize,
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.data.as_slice() == other.data.as_slice()
    }
}

impl Tensor {
    fn checked(rows: usize, cols: usize, data: Vec<f32>) -> PureResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(TensorError::InvalidDimensions { rows, cols });
        }
        let expected = rows * cols;
        if expected != data.len() {
            return Err(TensorError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data: Arc::new(data),
            rows,
            cols,
        })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> PureResult<Self> {
        Self::checked(rows, cols, vec![0.0; rows * cols])
    }

    /// Create a tensor from raw row-major data. The provided vector must match
    /// `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> PureResult<Self> {
        Self::checked(rows, cols, data)
    }

    /// Create a tensor from nested rows. Every row must have the same width.
    pub fn from_rows<R>(rows: &[R]) -> PureResult<Self>
    where
        R: AsRef<[f32]>,
    {
        let cols = rows.first().map(|row| row.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(TensorError::ShapeMismatch {
                    left: (1, row.len()),
                    right: (1, cols),
                });
            }
            data.extend_from_slice(row);
        }
        Self::checked(rows.len(), cols, data)
    }

    /// Construct a tensor by applying a generator function to each coordinate.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> PureResult<Self>
    where
        F: FnMut(usize, usize) -> f32,
    {
        if rows == 0 || cols == 0 {
            return Err(TensorError::InvalidDimensions { rows, cols });
        }
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self::checked(rows, cols, data)
    }

    /// Construct a tensor by sampling a uniform distribution in `[min, max)`.
    ///
    /// When `seed` is provided the RNG becomes deterministic which makes tests
    /// and benchmarks reproducible. Otherwise entropy from the host is used.
    pub fn random_uniform(
        rows: usize,
        cols: usize,
        min: f32,
        max: f32,
        seed: Option<u64>,
    ) -> PureResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(TensorError::InvalidDimensions { rows, cols });
        }
        if !(min < max) {
            return Err(TensorError::InvalidValue {
                label: "random_uniform_bounds",
            });
        }
        let mut rng = match seed {
            Some(value) => StdRng::seed_from_u64(value),
            None => StdRng::from_entropy(),
        };
        let distribution = Uniform::new(min, max);
        let data = (0..rows * cols)
            .map(|_| distribution.sample(&mut rng))
            .collect();
        Self::checked(rows, cols, data)
    }

    /// Returns the `(rows, cols)` pair of the tensor.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements stored in the tensor.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Tensors always hold at least one element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a read-only view of the underlying buffer.
    pub fn data(&self) -> &[f32] {
        self.data.as_slice()
    }

    /// Returns a mutable view of the underlying buffer, detaching it from any
    /// other handle that still shares it.
    pub fn data_mut(&mut self) -> &mut [f32] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Returns `true` when both handles point at the same buffer.
    pub fn shares_buffer(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Returns the element stored at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> PureResult<f32> {
        self.check_row(row)?;
        self.check_col(col)?;
        Ok(self.data[row * self.cols + col])
    }

    /// Copies a single column out of the tensor.
    pub fn column(&self, col: usize) -> PureResult<Vec<f32>> {
        self.check_col(col)?;
        Ok(self
            .data
            .chunks_exact(self.cols)
            .map(|row| row[col])
            .collect())
    }

    /// Returns the requested row as a slice.
    pub fn row(&self, row: usize) -> PureResult<&[f32]> {
        self.check_row(row)?;
        let start = row * self.cols;
        Ok(&self.data[start..start + self.cols])
    }

    /// Converts the tensor into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.data
            .chunks_exact(self.cols)
            .map(|row| row.to_vec())
            .collect()
    }

    /// Largest absolute elementwise difference against `other`.
    pub fn max_abs_diff(&self, other: &Tensor) -> PureResult<f32> {
        if self.shape() != other.shape() {
            return Err(TensorError::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max))
    }

    /// Elementwise comparison with an absolute tolerance.
    pub fn allclose(&self, other: &Tensor, atol: f32) -> bool {
        self.max_abs_diff(other)
            .map(|diff| diff <= atol)
            .unwrap_or(false)
    }

    fn check_row(&self, row: usize) -> PureResult<()> {
        if row >= self.rows {
            return Err(TensorError::IndexOutOfBounds {
                axis: "row",
                index: row,
                len: self.rows,
            });
        }
        Ok(())
    }

    fn check_col(&self, col: usize) -> PureResult<()> {
        if col >= self.cols {
            return Err(TensorError::IndexOutOfBounds {
                axis: "column",
                index: col,
                len: self.cols,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredTensor {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TryFrom<StoredTensor> for Tensor {
    type Error = TensorError;

    fn try_from(stored: StoredTensor) -> PureResult<Self> {
        Tensor::from_vec(stored.rows, stored.cols, stored.data)
    }
}

impl From<Tensor> for StoredTensor {
    fn from(tensor: Tensor) -> Self {
        StoredTensor {
            rows: tensor.rows,
            cols: tensor.cols,
            data: tensor.data.as_slice().to_vec(),
        }
    }
}
