//! Affine Layer (Fully Connected)
//!
//! Performs `out = x_flat · W + b`, where `x` of shape `[N, d1, ..., dk]` is
//! flattened per example to `[N, D]` with `D = d1 * ... * dk`.
//!
//! ## Forward Pass
//!
//! ```text
//! Input:  x [N, d1, ..., dk]  →  x_flat [N, D]
//! Weight: W [D, M]
//! Bias:   b [M]
//! Output: out = x_flat · W + b [N, M]
//! ```
//!
//! ## Backward Pass
//!
//! ```text
//! dW = x_flat^T · dout
//! db = sum(dout, axis=0)
//! dx = reshape(dout · W^T, shape of x)
//! ```

use crate::tensor::Tensor;

/// Values saved by [`affine_forward`] for [`affine_backward`]
pub struct AffineCache {
    /// Input as given (original, unflattened shape)
    pub x: Tensor,
    pub w: Tensor,
}

/// Gradients of an affine layer
pub struct AffineGradients {
    pub x: Tensor,
    pub weight: Tensor,
    pub bias: Tensor,
}

/// Affine output without a cache, for passes that never run backward
pub fn affine(x: &Tensor, w: &Tensor, b: &Tensor) -> Tensor {
    x.flatten_rows().matmul(w).add(b)
}

/// Forward pass of an affine layer
///
/// # Arguments
///
/// * `x` - Input tensor `[N, d1, ..., dk]`
/// * `w` - Weights `[D, M]`
/// * `b` - Bias `[M]`
///
/// # Returns
///
/// Tuple of (output `[N, M]`, cache)
pub fn affine_forward(x: &Tensor, w: &Tensor, b: &Tensor) -> (Tensor, AffineCache) {
    let out = affine(x, w, b);
    let cache = AffineCache {
        x: x.clone(),
        w: w.clone(),
    };
    (out, cache)
}

/// Backward pass of an affine layer
///
/// # Arguments
///
/// * `dout` - Upstream gradient `[N, M]`
/// * `cache` - Cache from the matching forward call
///
/// # Returns
///
/// Gradients for input (original shape), weights and bias
pub fn affine_backward(dout: &Tensor, cache: &AffineCache) -> AffineGradients {
    let x_flat = cache.x.flatten_rows();

    let weight = x_flat.transpose().matmul(dout);
    let bias = dout.sum_rows();
    let x = dout.matmul(&cache.w.transpose()).reshape(&cache.x.shape);

    AffineGradients { x, weight, bias }
}
