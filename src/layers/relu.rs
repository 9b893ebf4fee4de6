//! ReLU Activation
//!
//! ```text
//! forward:  out = max(x, 0)
//! backward: dx = dout where x > 0, else 0
//! ```
//!
//! The positivity test is strict: an input of exactly zero passes no gradient.

use crate::tensor::Tensor;
use rayon::prelude::*;

/// Cache for ReLU backward pass
pub struct ReluCache {
    /// Input to the forward pass
    pub x: Tensor,
}

/// ReLU without a cache
pub fn relu(x: &Tensor) -> Tensor {
    x.map(|v| if v > 0.0 { v } else { 0.0 })
}

/// ReLU forward pass (any shape)
pub fn relu_forward(x: &Tensor) -> (Tensor, ReluCache) {
    (relu(x), ReluCache { x: x.clone() })
}

/// ReLU backward pass
pub fn relu_backward(dout: &Tensor, cache: &ReluCache) -> Tensor {
    let data = dout
        .data
        .par_iter()
        .zip(&cache.x.data)
        .map(|(&g, &x)| if x > 0.0 { g } else { 0.0 })
        .collect();
    Tensor::new(data, dout.shape.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradcheck::{numerical_gradient_array, random_tensor, rel_error};

    #[test]
    fn test_relu_forward_clamps_negatives() {
        let x = Tensor::new(vec![-2.0, -0.0, 0.0, 0.5, 3.0, -1e-9], vec![2, 3]);
        let (out, _) = relu_forward(&x);
        assert_eq!(out.data, vec![0.0, 0.0, 0.0, 0.5, 3.0, 0.0]);
    }

    #[test]
    fn test_relu_backward_boundary() {
        let x = Tensor::new(vec![-1.0, 0.0, 1e-12, 2.0], vec![1, 4]);
        let dout = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![1, 4]);

        let (_, cache) = relu_forward(&x);
        let dx = relu_backward(&dout, &cache);

        // zero input gets zero gradient, strictly positive passes through
        assert_eq!(dx.data, vec![0.0, 0.0, 7.0, 8.0]);
    }

    #[test]
    fn test_relu_backward_matches_numerical_gradient() {
        // Keep inputs away from the kink so finite differences are exact
        let x = random_tensor(vec![8, 6], 11).map(|v| if v.abs() < 0.05 { v + 0.2 } else { v });
        let dout = random_tensor(vec![8, 6], 12);

        let dx_num = numerical_gradient_array(|x| relu_forward(x).0, &x, &dout);
        let (_, cache) = relu_forward(&x);
        let dx = relu_backward(&dout, &cache);

        assert!(rel_error(&dx, &dx_num) < 1e-6);
    }
}
