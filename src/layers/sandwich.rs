//! Affine → ReLU
//!
//! The hidden block of the two-layer network as a single forward/backward pair.

use super::affine::{affine_backward, affine_forward, AffineCache, AffineGradients};
use super::relu::{relu_backward, relu_forward, ReluCache};
use crate::tensor::Tensor;

/// Cache for the fused affine → ReLU backward pass
pub struct AffineReluCache {
    pub affine: AffineCache,
    pub relu: ReluCache,
}

/// Forward pass: `relu(x · W + b)`
pub fn affine_relu_forward(x: &Tensor, w: &Tensor, b: &Tensor) -> (Tensor, AffineReluCache) {
    let (a, affine) = affine_forward(x, w, b);
    let (out, relu) = relu_forward(&a);
    (out, AffineReluCache { affine, relu })
}

/// Backward pass through ReLU, then the affine transform
pub fn affine_relu_backward(dout: &Tensor, cache: &AffineReluCache) -> AffineGradients {
    let da = relu_backward(dout, &cache.relu);
    affine_backward(&da, &cache.affine)
}
