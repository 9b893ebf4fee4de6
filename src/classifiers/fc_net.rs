//! Fully Connected Network
//!
//! An arbitrary-depth classifier. With `L = hidden_dims.len() + 1` affine layers:
//!
//! ```text
//! x → [affine → (batchnorm) → relu → (dropout)] × (L - 1) → affine → scores
//! ```
//!
//! Batch normalization and dropout are switched on for every hidden block at
//! once by the configuration. Layer `i` (1-indexed) owns `W{i}`, `b{i}` and,
//! with batch normalization, `gamma{i}`, `beta{i}`. The output layer is never
//! normalized.
//!
//! ## Modes
//!
//! [`Classifier::loss`] runs every block in [`Mode::Train`]: batch statistics,
//! running-average updates, fresh dropout masks. [`Classifier::scores`] runs in
//! [`Mode::Evaluate`]: running statistics only, dropout is the identity.
//!
//! ## Backward Pass
//!
//! ```text
//! dscores → affine_L
//!         → for i = L-1 down to 1:
//!               (dropout) → relu → (batchnorm → dγ_i, dβ_i) → affine_i → dW_i, db_i
//! ```
//!
//! `reg * W_i` is added to every weight gradient, the output layer included.

use super::{weight_init, Classifier};
use crate::error::{Error, Result};
use crate::layers::{
    affine, affine_backward, affine_forward, batchnorm_backward, batchnorm_forward,
    dropout_backward, dropout_forward, relu, relu_backward, relu_forward, softmax_loss,
    AffineCache, BatchNormCache, BatchNormState, DropoutCache, DropoutConfig, Mode, ReluCache,
};
use crate::params::{LayerParams, NormParams, ParamSet};
use crate::tensor::{Precision, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fully connected network hyperparameters
///
/// # Example
///
/// ```rust
/// use layerwise::{FullyConnectedConfig, Precision};
///
/// let config = FullyConnectedConfig::new(vec![100, 50])
///     .with_input_dim(784)
///     .with_batchnorm(true)
///     .with_dropout(0.25)
///     .with_precision(Precision::F64);
/// assert_eq!(config.num_layers(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FullyConnectedConfig {
    /// Width of each hidden layer
    pub hidden_dims: Vec<usize>,
    pub input_dim: usize,
    pub num_classes: usize,
    /// Drop probability; `0.0` disables dropout
    pub dropout: f64,
    pub use_batchnorm: bool,
    /// L2 regularization strength
    pub reg: f64,
    /// Standard deviation of the initial weights
    pub weight_scale: f64,
    pub precision: Precision,
    /// Seeds weight initialization and every dropout layer.
    ///
    /// A seeded dropout layer draws the same mask on every call, which is what
    /// gradient checks need and what real training does not want.
    pub seed: Option<u64>,
}

impl Default for FullyConnectedConfig {
    fn default() -> Self {
        Self {
            hidden_dims: Vec::new(),
            input_dim: 3 * 32 * 32,
            num_classes: 10,
            dropout: 0.0,
            use_batchnorm: false,
            reg: 0.0,
            weight_scale: 1e-2,
            precision: Precision::F32,
            seed: None,
        }
    }
}

impl FullyConnectedConfig {
    pub fn new(hidden_dims: Vec<usize>) -> Self {
        Self {
            hidden_dims,
            ..Self::default()
        }
    }

    pub fn with_input_dim(mut self, input_dim: usize) -> Self {
        self.input_dim = input_dim;
        self
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_dropout(mut self, p: f64) -> Self {
        self.dropout = p;
        self
    }

    pub fn with_batchnorm(mut self, enabled: bool) -> Self {
        self.use_batchnorm = enabled;
        self
    }

    pub fn with_reg(mut self, reg: f64) -> Self {
        self.reg = reg;
        self
    }

    pub fn with_weight_scale(mut self, weight_scale: f64) -> Self {
        self.weight_scale = weight_scale;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Number of affine layers, output layer included
    pub fn num_layers(&self) -> usize {
        self.hidden_dims.len() + 1
    }
}

/// Caches of one hidden block
struct BlockCache {
    affine: AffineCache,
    norm: Option<BatchNormCache>,
    relu: ReluCache,
    dropout: Option<DropoutCache>,
}

/// Multi-layer fully connected classifier
pub struct FullyConnectedNet {
    config: FullyConnectedConfig,
    params: ParamSet,
    /// One per hidden block when batch normalization is enabled
    bn_states: Vec<BatchNormState>,
    dropout: Option<DropoutConfig>,
    rng: StdRng,
}

impl FullyConnectedNet {
    /// Build and initialize a network
    ///
    /// Weights are drawn from `N(0, weight_scale²)`, biases and `beta` start
    /// at zero, `gamma` at one. Everything is then rounded to the configured
    /// precision.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWeightScale`] for a negative or non-finite scale
    /// - [`Error::InvalidDropout`] for a drop probability outside `[0, 1]`
    pub fn new(config: FullyConnectedConfig) -> Result<Self> {
        let normal = weight_init(config.weight_scale)?;
        if !(0.0..=1.0).contains(&config.dropout) {
            return Err(Error::InvalidDropout(config.dropout));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut dims = Vec::with_capacity(config.num_layers() + 1);
        dims.push(config.input_dim);
        dims.extend_from_slice(&config.hidden_dims);
        dims.push(config.num_classes);

        let num_layers = config.num_layers();
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (d_in, d_out) = (pair[0], pair[1]);
                let hidden = i + 1 < num_layers;
                LayerParams {
                    weight: Tensor::sample(vec![d_in, d_out], &normal, &mut rng),
                    bias: Tensor::zeros(vec![d_out]),
                    norm: (hidden && config.use_batchnorm).then(|| NormParams {
                        gamma: Tensor::ones(vec![d_out]),
                        beta: Tensor::zeros(vec![d_out]),
                    }),
                }
            })
            .collect();
        let params = ParamSet::new(layers).to_precision(config.precision);

        let bn_states = if config.use_batchnorm {
            config
                .hidden_dims
                .iter()
                .map(|&dim| BatchNormState::new(dim))
                .collect()
        } else {
            Vec::new()
        };

        let dropout =
            (config.dropout > 0.0).then(|| DropoutConfig::new(config.dropout).with_seed(config.seed));

        debug!(
            layers = num_layers,
            parameters = params.num_elements(),
            batchnorm = config.use_batchnorm,
            dropout = config.dropout,
            "Initialized fully connected network"
        );

        Ok(Self {
            config,
            params,
            bn_states,
            dropout,
            rng,
        })
    }

    pub fn config(&self) -> &FullyConnectedConfig {
        &self.config
    }

    pub fn num_layers(&self) -> usize {
        self.params.layers.len()
    }

    /// Running statistics of each normalized block, in layer order
    pub fn batchnorm_states(&self) -> &[BatchNormState] {
        &self.bn_states
    }

    /// Evaluate-mode pass that keeps no caches
    fn infer(&mut self, x: &Tensor) -> Tensor {
        self.round_params();
        let num_hidden = self.num_layers() - 1;
        let mut out = x.to_precision(self.config.precision);

        for i in 0..num_hidden {
            let layer = &self.params.layers[i];
            let a = affine(&out, &layer.weight, &layer.bias);
            let a = match &layer.norm {
                Some(norm) => {
                    let state = &mut self.bn_states[i];
                    batchnorm_forward(&a, &norm.gamma, &norm.beta, state, Mode::Evaluate).0
                }
                None => a,
            };
            out = relu(&a);
        }

        let last = &self.params.layers[num_hidden];
        affine(&out, &last.weight, &last.bias)
    }

    /// Train-mode pass through every block
    ///
    /// Returns the scores, the hidden-block caches in layer order, and the
    /// output layer's cache.
    fn forward(&mut self, x: &Tensor) -> (Tensor, Vec<BlockCache>, AffineCache) {
        self.round_params();
        let num_hidden = self.num_layers() - 1;
        let mut out = x.to_precision(self.config.precision);
        let mut caches = Vec::with_capacity(num_hidden);

        for i in 0..num_hidden {
            let layer = &self.params.layers[i];

            let (a, affine) = affine_forward(&out, &layer.weight, &layer.bias);

            let (a, norm) = match &layer.norm {
                Some(norm) => batchnorm_forward(
                    &a,
                    &norm.gamma,
                    &norm.beta,
                    &mut self.bn_states[i],
                    Mode::Train,
                ),
                None => (a, None),
            };

            let (a, relu) = relu_forward(&a);

            let (a, dropout) = match &self.dropout {
                Some(config) => {
                    let (a, cache) = dropout_forward(&a, config, Mode::Train, &mut self.rng);
                    (a, Some(cache))
                }
                None => (a, None),
            };

            caches.push(BlockCache {
                affine,
                norm,
                relu,
                dropout,
            });
            out = a;
        }

        let last = &self.params.layers[num_hidden];
        let (scores, output) = affine_forward(&out, &last.weight, &last.bias);
        (scores, caches, output)
    }

    /// Bring updated parameters back to the configured storage precision
    fn round_params(&mut self) {
        if self.config.precision == Precision::F32 {
            self.params.round_to(Precision::F32);
        }
    }
}

impl Classifier for FullyConnectedNet {
    fn scores(&mut self, x: &Tensor) -> Tensor {
        self.infer(x)
    }

    fn loss(&mut self, x: &Tensor, y: &[usize]) -> (f64, ParamSet) {
        let (scores, caches, output) = self.forward(x);

        let reg = self.config.reg;
        let (data_loss, dscores) = softmax_loss(&scores, y);
        let loss = data_loss + 0.5 * reg * self.params.weight_sum_squares();

        let num_hidden = caches.len();
        let mut grads = Vec::with_capacity(num_hidden + 1);

        let g = affine_backward(&dscores, &output);
        grads.push(LayerParams {
            weight: g.weight.add(&self.params.layers[num_hidden].weight.mul_scalar(reg)),
            bias: g.bias,
            norm: None,
        });
        let mut dout = g.x;

        for (i, cache) in caches.iter().enumerate().rev() {
            if let Some(mask) = &cache.dropout {
                dout = dropout_backward(&dout, mask);
            }
            dout = relu_backward(&dout, &cache.relu);

            let norm = match &cache.norm {
                Some(norm_cache) => {
                    let g = batchnorm_backward(&dout, norm_cache);
                    dout = g.x;
                    Some(NormParams {
                        gamma: g.gamma,
                        beta: g.beta,
                    })
                }
                None => None,
            };

            let g = affine_backward(&dout, &cache.affine);
            grads.push(LayerParams {
                weight: g.weight.add(&self.params.layers[i].weight.mul_scalar(reg)),
                bias: g.bias,
                norm,
            });
            dout = g.x;
        }

        grads.reverse();
        (loss, ParamSet::new(grads))
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }
}
