//! Two-Layer Network
//!
//! ```text
//! x [N, D] → affine(W1, b1) → relu → affine(W2, b2) → scores [N, C]
//! ```
//!
//! The loss adds `0.5 * reg * (‖W1‖² + ‖W2‖²)` to the softmax loss and
//! `reg * W` to each weight gradient. Biases are not regularized.

use super::{weight_init, Classifier};
use crate::error::Result;
use crate::layers::{
    affine, affine_backward, affine_forward, affine_relu_backward, affine_relu_forward, relu,
    softmax_loss,
};
use crate::params::{LayerParams, ParamSet};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Two-layer network hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TwoLayerConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub num_classes: usize,
    /// Standard deviation of the initial weights
    pub weight_scale: f64,
    pub reg: f64,
    /// Seed for weight initialization
    pub seed: Option<u64>,
}

impl Default for TwoLayerConfig {
    fn default() -> Self {
        Self {
            input_dim: 3 * 32 * 32,
            hidden_dim: 100,
            num_classes: 10,
            weight_scale: 1e-3,
            reg: 0.0,
            seed: None,
        }
    }
}

/// Affine → ReLU → affine classifier with softmax loss
#[derive(Clone, Debug)]
pub struct TwoLayerNet {
    pub params: ParamSet,
    pub reg: f64,
}

impl TwoLayerNet {
    /// Create a network with `N(0, weight_scale²)` weights and zero biases
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWeightScale`](crate::Error::InvalidWeightScale) if `weight_scale` is negative or not finite
    pub fn new(config: &TwoLayerConfig) -> Result<Self> {
        match config.seed {
            Some(seed) => Self::with_rng(config, &mut StdRng::seed_from_u64(seed)),
            None => Self::with_rng(config, &mut rand::rng()),
        }
    }

    /// Like [`TwoLayerNet::new`], drawing the initial weights from `rng`
    pub fn with_rng<R: Rng + ?Sized>(config: &TwoLayerConfig, rng: &mut R) -> Result<Self> {
        let normal = weight_init(config.weight_scale)?;

        let layer = |d_in: usize, d_out: usize, rng: &mut R| LayerParams {
            weight: Tensor::sample(vec![d_in, d_out], &normal, rng),
            bias: Tensor::zeros(vec![d_out]),
            norm: None,
        };
        let first = layer(config.input_dim, config.hidden_dim, &mut *rng);
        let second = layer(config.hidden_dim, config.num_classes, &mut *rng);

        Ok(Self {
            params: ParamSet::new(vec![first, second]),
            reg: config.reg,
        })
    }
}

impl Classifier for TwoLayerNet {
    fn scores(&mut self, x: &Tensor) -> Tensor {
        let l1 = &self.params.layers[0];
        let l2 = &self.params.layers[1];
        let hidden = relu(&affine(x, &l1.weight, &l1.bias));
        affine(&hidden, &l2.weight, &l2.bias)
    }

    fn loss(&mut self, x: &Tensor, y: &[usize]) -> (f64, ParamSet) {
        let l1 = &self.params.layers[0];
        let l2 = &self.params.layers[1];

        let (hidden, hidden_cache) = affine_relu_forward(x, &l1.weight, &l1.bias);
        let (scores, scores_cache) = affine_forward(&hidden, &l2.weight, &l2.bias);

        let (data_loss, dscores) = softmax_loss(&scores, y);
        let loss = data_loss + 0.5 * self.reg * self.params.weight_sum_squares();

        let g2 = affine_backward(&dscores, &scores_cache);
        let g1 = affine_relu_backward(&g2.x, &hidden_cache);

        let grads = ParamSet::new(vec![
            LayerParams {
                weight: g1.weight.add(&l1.weight.mul_scalar(self.reg)),
                bias: g1.bias,
                norm: None,
            },
            LayerParams {
                weight: g2.weight.add(&l2.weight.mul_scalar(self.reg)),
                bias: g2.bias,
                norm: None,
            },
        ]);

        (loss, grads)
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}
