//! Classifiers
//!
//! Networks assembled from the layer primitives. Both own their parameters and
//! any per-layer state, and expose the same two calls:
//!
//! - [`Classifier::scores`]: evaluate-mode forward pass, raw class scores only
//! - [`Classifier::loss`]: train-mode forward and backward pass, returning the
//!   regularized loss and a gradient for every parameter
//!
//! ## Architectures
//!
//! ```text
//! TwoLayerNet:        affine → relu → affine → softmax
//!
//! FullyConnectedNet:  {affine → [batchnorm] → relu → [dropout]} × (L - 1)
//!                     → affine → softmax
//! ```

pub mod fc_net;
pub mod two_layer;

pub use fc_net::{FullyConnectedConfig, FullyConnectedNet};
pub use two_layer::{TwoLayerConfig, TwoLayerNet};

use crate::error::{Error, Result};
use crate::params::ParamSet;
use crate::tensor::Tensor;
use rand_distr::Normal;

/// A network the solver can train
///
/// Both calls take `&mut self`: a forward pass may draw dropout masks from the
/// network's generator and train-mode passes update batch normalization
/// statistics.
pub trait Classifier {
    /// Class scores `[N, C]` for inputs `[N, d1, ..., dk]`, in evaluate mode
    ///
    /// No gradients are computed and no caches outlive the call.
    fn scores(&mut self, x: &Tensor) -> Tensor;

    /// Regularized softmax loss and parameter gradients, in train mode
    ///
    /// The gradient set has exactly the names and shapes of [`Classifier::params`].
    fn loss(&mut self, x: &Tensor, y: &[usize]) -> (f64, ParamSet);

    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    /// Highest-scoring class per example
    fn predict(&mut self, x: &Tensor) -> Vec<usize> {
        self.scores(x).argmax_rows()
    }
}

/// Weight initializer `N(0, weight_scale²)`
///
/// `Normal` accepts a negative standard deviation, so the sign is checked here.
pub(crate) fn weight_init(weight_scale: f64) -> Result<Normal<f64>> {
    if !(weight_scale.is_finite() && weight_scale >= 0.0) {
        return Err(Error::InvalidWeightScale(weight_scale));
    }
    Normal::new(0.0, weight_scale).map_err(|_| Error::InvalidWeightScale(weight_scale))
}
