//! Batch Normalization
//!
//! Normalizes each feature over the batch, then applies a learnable scale
//! (gamma) and shift (beta).
//!
//! ## Forward Pass (train)
//!
//! ```text
//! 1. mean = sum(x, axis=0) / N
//! 2. var  = sum((x - mean)², axis=0) / N
//! 3. x_norm = (x - mean) / √(var + ε)
//! 4. out = γ * x_norm + β
//! 5. running_mean = momentum * running_mean + (1 - momentum) * mean
//!    running_var  = momentum * running_var  + (1 - momentum) * var
//! ```
//!
//! ## Forward Pass (evaluate)
//!
//! ```text
//! out = γ * (x - running_mean) / √(running_var + ε) + β
//! ```
//!
//! No batch statistics are computed and the running statistics are untouched.
//!
//! ## Backward Pass
//!
//! ```text
//! dβ = sum(dout)
//! dγ = sum(dout * x_norm)
//! dx_norm = dout * γ
//! dx = (1/N) * inv_std * (N * dx_norm - sum(dx_norm) - x_norm * sum(dx_norm * x_norm))
//! ```
//!
//! The two sums account for every element's influence on the batch mean and
//! variance.

use super::Mode;
use crate::tensor::Tensor;

/// Per-layer batch normalization state
///
/// One instance per normalized layer, living as long as the network. The
/// running statistics are updated by every train-mode forward pass and read by
/// every evaluate-mode pass.
#[derive(Clone, Debug)]
pub struct BatchNormState {
    pub eps: f64,
    pub momentum: f64,
    pub running_mean: Tensor,
    pub running_var: Tensor,
}

impl BatchNormState {
    /// State for `dim` features with `eps = 1e-5` and `momentum = 0.9`
    ///
    /// Running mean and variance start at zero.
    pub fn new(dim: usize) -> Self {
        Self {
            eps: 1e-5,
            momentum: 0.9,
            running_mean: Tensor::zeros(vec![dim]),
            running_var: Tensor::zeros(vec![dim]),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }
}

/// Cache for batch normalization backward pass
pub struct BatchNormCache {
    pub x_centered: Tensor,
    pub x_norm: Tensor,
    /// 1 / √(var + ε), per feature
    pub inv_std: Tensor,
    pub gamma: Tensor,
    pub batch_size: usize,
}

/// Gradients for batch normalization
pub struct BatchNormGradients {
    pub x: Tensor,
    pub gamma: Tensor,
    pub beta: Tensor,
}

/// Batch normalization forward pass
///
/// # Arguments
///
/// * `x` - Input `[N, D]`
/// * `gamma` - Scale `[D]`
/// * `beta` - Shift `[D]`
/// * `state` - Running statistics (updated in train mode)
/// * `mode` - Train or evaluate
///
/// # Returns
///
/// Tuple of (output `[N, D]`, cache). The cache is `None` in evaluate mode,
/// which has no backward pass.
pub fn batchnorm_forward(
    x: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    state: &mut BatchNormState,
    mode: Mode,
) -> (Tensor, Option<BatchNormCache>) {
    match mode {
        Mode::Train => {
            let mean = x.mean_rows();
            let x_centered = x.sub(&mean);
            let var = x_centered.map(|v| v * v).mean_rows();
            let eps = state.eps;
            let inv_std = var.map(|v| 1.0 / (v + eps).sqrt());
            let x_norm = x_centered.mul(&inv_std);
            let out = x_norm.mul(gamma).add(beta);

            let momentum = state.momentum;
            state.running_mean = state
                .running_mean
                .mul_scalar(momentum)
                .add(&mean.mul_scalar(1.0 - momentum));
            state.running_var = state
                .running_var
                .mul_scalar(momentum)
                .add(&var.mul_scalar(1.0 - momentum));

            let cache = BatchNormCache {
                x_centered,
                x_norm,
                inv_std,
                gamma: gamma.clone(),
                batch_size: x.rows(),
            };
            (out, Some(cache))
        }
        Mode::Evaluate => {
            let std = state.running_var.add_scalar(state.eps).sqrt();
            let out = x.sub(&state.running_mean).div(&std).mul(gamma).add(beta);
            (out, None)
        }
    }
}

/// Batch normalization backward pass
///
/// # Arguments
///
/// * `dout` - Upstream gradient `[N, D]`
/// * `cache` - Cache from the matching train-mode forward call
pub fn batchnorm_backward(dout: &Tensor, cache: &BatchNormCache) -> BatchNormGradients {
    let n = cache.batch_size as f64;

    let beta = dout.sum_rows();
    let gamma = dout.mul(&cache.x_norm).sum_rows();

    let dx_norm = dout.mul(&cache.gamma);
    let sum_dx_norm = dx_norm.sum_rows();
    let sum_dx_norm_x_norm = dx_norm.mul(&cache.x_norm).sum_rows();

    let x = dx_norm
        .mul_scalar(n)
        .sub(&sum_dx_norm)
        .sub(&cache.x_norm.mul(&sum_dx_norm_x_norm))
        .mul(&cache.inv_std.mul_scalar(1.0 / n));

    BatchNormGradients { x, gamma, beta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradcheck::{numerical_gradient_array, random_tensor, rel_error};
    use approx::assert_abs_diff_eq;

    fn shifted_batch(seed: u64) -> Tensor {
        // Features with distinct means and scales
        let raw = random_tensor(vec![200, 3], seed);
        let scale = Tensor::new(vec![1.0, 5.0, 0.5], vec![3]);
        let shift = Tensor::new(vec![10.0, -3.0, 0.0], vec![3]);
        raw.mul(&scale).add(&shift)
    }

    #[test]
    fn test_train_forward_normalizes_features() {
        let x = shifted_batch(1);
        let gamma = Tensor::ones(vec![3]);
        let beta = Tensor::zeros(vec![3]);
        let mut state = BatchNormState::new(3);

        let (out, cache) = batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train);
        assert!(cache.is_some());

        let mean = out.mean_rows();
        let var = out.map(|v| v * v).mean_rows();
        for j in 0..3 {
            assert_abs_diff_eq!(mean.data[j], 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(var.data[j], 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_gamma_beta_scale_and_shift() {
        let x = shifted_batch(2);
        let gamma = Tensor::new(vec![1.0, 2.0, 3.0], vec![3]);
        let beta = Tensor::new(vec![11.0, 12.0, 13.0], vec![3]);
        let mut state = BatchNormState::new(3);

        let (out, _) = batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train);
        let mean = out.mean_rows();
        for j in 0..3 {
            assert_abs_diff_eq!(mean.data[j], beta.data[j], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_evaluate_mode_uses_running_statistics() {
        let gamma = Tensor::ones(vec![3]);
        let beta = Tensor::zeros(vec![3]);
        let mut state = BatchNormState::new(3);

        // Warm up the running averages on batches from the same distribution
        for seed in 0..200 {
            let x = shifted_batch(100 + seed);
            batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train);
        }

        let before = state.running_mean.clone();
        let x = shifted_batch(7);
        let (out, cache) = batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Evaluate);
        assert!(cache.is_none());
        assert_eq!(state.running_mean, before);

        let mean = out.mean_rows();
        let var = out.map(|v| v * v).mean_rows();
        for j in 0..3 {
            assert_abs_diff_eq!(mean.data[j], 0.0, epsilon = 0.3);
            assert_abs_diff_eq!(var.data[j], 1.0, epsilon = 0.3);
        }
    }

    #[test]
    fn test_train_then_evaluate_on_seed_batch_is_consistent() {
        let x = shifted_batch(3);
        let gamma = Tensor::new(vec![0.5, 1.5, 2.0], vec![3]);
        let beta = Tensor::new(vec![0.1, -0.2, 0.3], vec![3]);
        let mut state = BatchNormState::new(3);

        let mut train_out = None;
        for _ in 0..300 {
            train_out = Some(batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train).0);
        }
        let train_out = train_out.unwrap();
        let (test_out, _) = batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Evaluate);

        // After 300 updates the running averages have converged (0.9^300 ≈ 2e-14)
        assert!(rel_error(&train_out, &test_out) < 1e-6);
    }

    #[test]
    fn test_running_average_update() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 6.0], vec![2, 2]);
        let gamma = Tensor::ones(vec![2]);
        let beta = Tensor::zeros(vec![2]);
        let mut state = BatchNormState::new(2).with_momentum(0.5);

        batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train);

        // batch mean [2, 4], batch var [1, 4]
        assert_eq!(state.running_mean.data, vec![1.0, 2.0]);
        assert_eq!(state.running_var.data, vec![0.5, 2.0]);
    }

    #[test]
    fn test_batchnorm_backward_matches_numerical_gradient() {
        let x = shifted_batch(4).slice_rows(0, 4);
        let gamma = random_tensor(vec![3], 5);
        let beta = random_tensor(vec![3], 6);
        let dout = random_tensor(vec![4, 3], 7);

        let forward = |x: &Tensor, gamma: &Tensor, beta: &Tensor| {
            let mut state = BatchNormState::new(3);
            batchnorm_forward(x, gamma, beta, &mut state, Mode::Train).0
        };

        let dx_num = numerical_gradient_array(|x| forward(x, &gamma, &beta), &x, &dout);
        let dgamma_num = numerical_gradient_array(|g| forward(&x, g, &beta), &gamma, &dout);
        let dbeta_num = numerical_gradient_array(|b| forward(&x, &gamma, b), &beta, &dout);

        let mut state = BatchNormState::new(3);
        let (_, cache) = batchnorm_forward(&x, &gamma, &beta, &mut state, Mode::Train);
        let grads = batchnorm_backward(&dout, &cache.unwrap());

        assert!(rel_error(&grads.x, &dx_num) < 1e-6);
        assert!(rel_error(&grads.gamma, &dgamma_num) < 1e-7);
        assert!(rel_error(&grads.beta, &dbeta_num) < 1e-7);
    }
}
