//! Dense Tensors for Layer Math
//!
//! A minimal row-major tensor used by every layer, network, and update rule in
//! the crate. Data lives in a flat `Vec<f64>` alongside its shape and strides.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f64>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[batch, features]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//! - **Rows**: The leading dimension is always the example (batch) dimension
//!
//! ## Example
//!
//! ```rust
//! use layerwise::Tensor;
//!
//! let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let w = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let y = x.matmul(&w);
//! assert_eq!(y.shape, vec![2, 2]);
//! assert_eq!(y.data, vec![4.0, 5.0, 10.0, 11.0]);
//! ```
//!
//! ## Parallel Kernels
//!
//! Matrix multiplication and element-wise maps run on Rayon. Each output
//! element is produced by exactly one task, so results are identical to the
//! sequential computation. No reduction is split across threads.
//!
//! ## Shape Errors
//!
//! Operations assert on incompatible shapes and panic with both shapes in the
//! message. Layers rely on this instead of validating shapes themselves.

use rand::Rng;
use rand_distr::Distribution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Storage precision emulated by a network.
///
/// Tensors always store `f64`. With [`Precision::F32`] values are rounded to
/// the nearest single-precision number, which is what a network configured for
/// single precision does to its parameters and inputs. Parameters are rounded
/// at initialization and again at the start of every forward pass, so values
/// written by an update rule are brought back to single precision before use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F64,
}

/// A multi-dimensional array of `f64` values in row-major layout.
///
/// # Memory Layout
///
/// For shape `[2, 3]`, data is stored as
/// `[r0c0, r0c1, r0c2, r1c0, r1c1, r1c2]` with strides `[3, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f64>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.shape, vec![2, 2]);
    /// assert_eq!(tensor.strides, vec![2, 1]);
    /// ```
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: Vec<usize>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Create a tensor where every element is `value`
    pub fn full(shape: Vec<usize>, value: f64) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![value; size], shape)
    }

    /// Create a tensor by drawing every element from `dist`
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use rand_distr::Normal;
    ///
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let normal = Normal::new(0.0, 0.01).unwrap();
    /// let w = Tensor::sample(vec![4, 3], &normal, &mut rng);
    /// assert_eq!(w.len(), 12);
    /// ```
    pub fn sample<D, R>(shape: Vec<usize>, dist: &D, rng: &mut R) -> Self
    where
        D: Distribution<f64>,
        R: Rng + ?Sized,
    {
        let size: usize = shape.iter().product();
        let data = (0..size).map(|_| dist.sample(rng)).collect();
        Self::new(data, shape)
    }

    /// Compute strides from shape (row-major layout)
    ///
    /// For shape `[d0, d1, d2]`, strides are `[d1*d2, d2, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the leading (example) dimension
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Number of elements per example: the product of all trailing dimensions
    pub fn row_size(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Collapse all trailing dimensions, giving shape `[rows, row_size]`
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// let x = Tensor::zeros(vec![2, 3, 4]);
    /// assert_eq!(x.flatten_rows().shape, vec![2, 12]);
    /// ```
    pub fn flatten_rows(&self) -> Tensor {
        self.reshape(&[self.rows(), self.row_size()])
    }

    /// Matrix multiplication of two 2D tensors
    ///
    /// For `A @ B` where `A` is `[m, k]` and `B` is `[k, n]` the result is
    /// `[m, n]` with `C[i,j] = sum_l A[i,l] * B[l,j]`.
    ///
    /// # Performance
    ///
    /// - **Small matrices** (< 1K ops): Sequential computation
    /// - **Large matrices** (≥ 1K ops): Parallel cache-blocked algorithm
    ///
    /// # Panics
    ///
    /// Panics if either operand is not 2D or the inner dimensions differ
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert!(
            self.shape.len() == 2 && other.shape.len() == 2,
            "Unsupported matmul shapes: {:?} @ {:?}",
            self.shape,
            other.shape
        );
        assert_eq!(
            self.shape[1], other.shape[0],
            "Matrix dimensions incompatible: [{}, {}] @ [{}, {}]",
            self.shape[0], self.shape[1], other.shape[0], other.shape[1]
        );

        let m = self.shape[0];
        let n = other.shape[1];
        let k = self.shape[1];

        if m * n * k >= 1_000 {
            return self.matmul_parallel_blocked(other, m, n, k);
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for l in 0..k {
                let a_val = self.data[i * k + l];
                Self::matmul_inner(
                    a_val,
                    &other.data[l * n..(l + 1) * n],
                    &mut result[i * n..(i + 1) * n],
                );
            }
        }

        Tensor::new(result, vec![m, n])
    }

    /// Inner loop `result[j] += a_val * b[j]`, written so LLVM can vectorize it
    #[inline(always)]
    fn matmul_inner(a_val: f64, b: &[f64], result: &mut [f64]) {
        for (r, &b_val) in result.iter_mut().zip(b.iter()) {
            *r += a_val * b_val;
        }
    }

    /// Parallel cache-blocked matrix multiplication
    ///
    /// Output rows are split into blocks of 8 and each block is computed by a
    /// single Rayon task. Within a block, the column and inner dimensions are
    /// tiled 8×8 so the working set stays in L1.
    fn matmul_parallel_blocked(&self, other: &Tensor, m: usize, n: usize, k: usize) -> Tensor {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for j_start in (0..n).step_by(BLOCK_SIZE) {
                    let j_end = (j_start + BLOCK_SIZE).min(n);

                    for k_start in (0..k).step_by(BLOCK_SIZE) {
                        let k_end = (k_start + BLOCK_SIZE).min(k);

                        for i in i_start..i_end {
                            let row_offset = (i - i_start) * n;
                            for k_idx in k_start..k_end {
                                Self::matmul_inner(
                                    self.data[i * k + k_idx],
                                    &other.data[k_idx * n + j_start..k_idx * n + j_end],
                                    &mut result_block[row_offset + j_start..row_offset + j_end],
                                );
                            }
                        }
                    }
                }
            });

        Tensor::new(result, vec![m, n])
    }

    /// Transpose a 2D tensor
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).transpose();
    /// assert_eq!(t.shape, vec![3, 2]);
    /// assert_eq!(t.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    /// ```
    pub fn transpose(&self) -> Tensor {
        assert_eq!(
            self.shape.len(),
            2,
            "transpose expects a 2D tensor, got {:?}",
            self.shape
        );
        let rows = self.shape[0];
        let cols = self.shape[1];
        let mut result = vec![0.0; rows * cols];

        for i in 0..rows {
            for j in 0..cols {
                result[j * rows + i] = self.data[i * cols + j];
            }
        }

        Tensor::new(result, vec![cols, rows])
    }

    /// Reshape tensor to new shape
    ///
    /// Total number of elements must remain the same.
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        let new_size: usize = new_shape.iter().product();
        assert_eq!(
            self.data.len(),
            new_size,
            "Cannot reshape {:?} into {:?}: element count mismatch",
            self.shape,
            new_shape
        );
        Tensor::new(self.data.clone(), new_shape.to_vec())
    }

    /// Apply `f` to every element
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let result = self.data.par_iter().map(|&x| f(x)).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Combine two tensors element by element
    ///
    /// Supports two broadcasting patterns:
    ///
    /// 1. **Exact match**: Same shape
    /// 2. **Broadcast last dim**: `[*, n] op [n]` (e.g., adding a bias row)
    fn zip_with<F>(&self, other: &Tensor, op: &str, f: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64 + Sync + Send,
    {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.shape.len() > other.shape.len() {
            let last_dim = self.shape.last().copied().unwrap_or(0);
            if other.data.len() == last_dim && last_dim > 0 {
                let result = self
                    .data
                    .par_iter()
                    .enumerate()
                    .map(|(i, &a)| f(a, other.data[i % last_dim]))
                    .collect();
                return Tensor::new(result, self.shape.clone());
            }
        }

        panic!(
            "Unsupported broadcast for {}: {:?} and {:?}",
            op, self.shape, other.shape
        );
    }

    /// Element-wise addition (same shape, or `[*, n] + [n]`)
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// let bias = Tensor::new(vec![10.0, 20.0], vec![2]);
    /// assert_eq!(a.add(&bias).data, vec![11.0, 22.0, 13.0, 24.0]);
    /// ```
    pub fn add(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "add", |a, b| a + b)
    }

    /// Element-wise subtraction (same shape, or `[*, n] - [n]`)
    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    /// Element-wise multiplication (same shape, or `[*, n] * [n]`)
    pub fn mul(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "mul", |a, b| a * b)
    }

    /// Element-wise division (same shape, or `[*, n] / [n]`)
    pub fn div(&self, other: &Tensor) -> Tensor {
        self.zip_with(other, "div", |a, b| a / b)
    }

    /// Add scalar to all elements
    pub fn add_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x + scalar)
    }

    /// Multiply all elements by scalar
    pub fn mul_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x * scalar)
    }

    /// Element-wise square root
    pub fn sqrt(&self) -> Tensor {
        self.map(f64::sqrt)
    }

    /// In-place `self += other` for tensors of identical shape
    pub fn add_assign(&mut self, other: &Tensor) {
        assert_eq!(
            self.shape, other.shape,
            "Shapes must match for add_assign: {:?} vs {:?}",
            self.shape, other.shape
        );
        self.data
            .par_iter_mut()
            .zip(&other.data)
            .for_each(|(a, &b)| *a += b);
    }

    /// Sum over the leading dimension of a 2D tensor: `[n, m] -> [m]`
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::Tensor;
    /// let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(x.sum_rows().data, vec![4.0, 6.0]);
    /// ```
    pub fn sum_rows(&self) -> Tensor {
        assert_eq!(
            self.shape.len(),
            2,
            "sum_rows expects a 2D tensor, got {:?}",
            self.shape
        );
        let cols = self.shape[1];
        let mut result = vec![0.0; cols];
        for row in self.data.chunks_exact(cols.max(1)) {
            for (acc, &v) in result.iter_mut().zip(row) {
                *acc += v;
            }
        }
        Tensor::new(result, vec![cols])
    }

    /// Mean over the leading dimension of a 2D tensor: `[n, m] -> [m]`
    pub fn mean_rows(&self) -> Tensor {
        let n = self.rows() as f64;
        self.sum_rows().mul_scalar(1.0 / n)
    }

    /// Sum of all elements
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Sum of squared elements (squared Frobenius norm)
    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|&x| x * x).sum()
    }

    /// Row-wise softmax of a 2D tensor
    ///
    /// Uses the numerically stable version:
    ///
    /// ```text
    /// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    /// ```
    ///
    /// Subtracting the row maximum prevents overflow in `exp()` while producing
    /// the same result.
    pub fn softmax_rows(&self) -> Tensor {
        assert_eq!(
            self.shape.len(),
            2,
            "softmax_rows expects a 2D tensor, got {:?}",
            self.shape
        );
        let cols = self.shape[1];

        let mut result = vec![0.0; self.data.len()];
        result
            .par_chunks_mut(cols.max(1))
            .zip(self.data.par_chunks(cols.max(1)))
            .for_each(|(out, row)| {
                let max = row.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mut sum = 0.0;
                for (o, &x) in out.iter_mut().zip(row) {
                    *o = (x - max).exp();
                    sum += *o;
                }
                for o in out.iter_mut() {
                    *o /= sum;
                }
            });

        Tensor::new(result, self.shape.clone())
    }

    /// Index of the largest element in each row of a 2D tensor
    ///
    /// Ties resolve to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        let cols = self.row_size().max(1);
        self.data
            .chunks_exact(cols)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &v)| {
                        if v > best {
                            (i, v)
                        } else {
                            (best_i, best)
                        }
                    })
                    .0
            })
            .collect()
    }

    /// Gather the given examples (rows of the leading dimension)
    ///
    /// Indices may repeat; the result has `indices.len()` rows and the same
    /// trailing shape.
    pub fn select_rows(&self, indices: &[usize]) -> Tensor {
        let row_size = self.row_size();
        let mut data = Vec::with_capacity(indices.len() * row_size);
        for &i in indices {
            data.extend_from_slice(&self.data[i * row_size..(i + 1) * row_size]);
        }
        let mut shape = self.shape.clone();
        shape[0] = indices.len();
        Tensor::new(data, shape)
    }

    /// Contiguous examples `start..end`, clamped to the number of rows
    pub fn slice_rows(&self, start: usize, end: usize) -> Tensor {
        let end = end.min(self.rows());
        let start = start.min(end);
        let row_size = self.row_size();
        let mut shape = self.shape.clone();
        shape[0] = end - start;
        Tensor::new(self.data[start * row_size..end * row_size].to_vec(), shape)
    }

    /// Round every element to the given storage precision in place
    pub fn round_to(&mut self, precision: Precision) {
        if precision == Precision::F32 {
            self.data.par_iter_mut().for_each(|x| *x = *x as f32 as f64);
        }
    }

    /// Round every element to the given storage precision
    pub fn to_precision(&self, precision: Precision) -> Tensor {
        match precision {
            Precision::F64 => self.clone(),
            Precision::F32 => self.map(|x| x as f32 as f64),
        }
    }

    /// Largest absolute element
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |a, &b| a.max(b.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_matmul_small_and_blocked_agree() {
        let a = Tensor::new((0..24 * 16).map(|i| (i % 7) as f64 - 3.0).collect(), vec![24, 16]);
        let b = Tensor::new((0..16 * 12).map(|i| (i % 5) as f64 * 0.5).collect(), vec![16, 12]);

        let blocked = a.matmul(&b);

        let mut naive = vec![0.0; 24 * 12];
        for i in 0..24 {
            for j in 0..12 {
                for l in 0..16 {
                    naive[i * 12 + j] += a.data[i * 16 + l] * b.data[l * 12 + j];
                }
            }
        }
        assert_eq!(blocked.shape, vec![24, 12]);
        assert_eq!(blocked.data, naive);
    }

    #[test]
    #[should_panic(expected = "Matrix dimensions incompatible")]
    fn test_matmul_shape_mismatch_panics() {
        Tensor::zeros(vec![2, 3]).matmul(&Tensor::zeros(vec![2, 3]));
    }

    #[test]
    fn test_broadcast_last_dim() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2]);
        let v = Tensor::new(vec![2.0, 4.0], vec![2]);
        assert_eq!(x.mul(&v).data, vec![2.0, 8.0, 6.0, 16.0, 10.0, 24.0]);
        assert_eq!(x.div(&v).data, vec![0.5, 0.5, 1.5, 1.0, 2.5, 1.5]);
        assert_eq!(x.sub(&v).data, vec![-1.0, -2.0, 1.0, 0.0, 3.0, 2.0]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = Tensor::new(vec![1000.0, 1001.0, 1002.0, -5.0, 0.0, 5.0], vec![2, 3]);
        let p = x.softmax_rows();
        for row in p.data.chunks(3) {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_argmax_rows_prefers_first_on_tie() {
        let x = Tensor::new(vec![1.0, 3.0, 3.0, 0.0, -1.0, -2.0], vec![2, 3]);
        assert_eq!(x.argmax_rows(), vec![1, 0]);
    }

    #[test]
    fn test_select_and_slice_rows_keep_trailing_shape() {
        let x = Tensor::new((0..12).map(|i| i as f64).collect(), vec![3, 2, 2]);

        let picked = x.select_rows(&[2, 0, 2]);
        assert_eq!(picked.shape, vec![3, 2, 2]);
        assert_eq!(&picked.data[..4], &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(&picked.data[4..8], &[0.0, 1.0, 2.0, 3.0]);

        let tail = x.slice_rows(1, 10);
        assert_eq!(tail.shape, vec![2, 2, 2]);
        assert_eq!(tail.data[0], 4.0);
    }

    #[test]
    fn test_to_precision_rounds_to_single() {
        let x = Tensor::new(vec![0.1], vec![1]);
        let single = x.to_precision(Precision::F32);
        assert_eq!(single.data[0], 0.1f32 as f64);
        assert_ne!(single.data[0], 0.1);
        assert_eq!(x.to_precision(Precision::F64).data[0], 0.1);
    }
}
