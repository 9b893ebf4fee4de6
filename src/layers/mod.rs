//! Differentiable Layer Primitives
//!
//! Every layer the classifiers are built from, each with a hand-written
//! forward and backward pass.
//!
//! ## Layers
//!
//! - **affine**: Fully connected transform `x · W + b`
//! - **relu**: Rectified linear unit
//! - **batch_norm**: Batch normalization with running statistics
//! - **dropout**: Inverted dropout
//! - **softmax**: Softmax cross-entropy loss
//! - **sandwich**: Affine followed by ReLU, as one forward/backward pair
//!
//! ## Design Pattern
//!
//! Each primitive is a pair of free functions:
//!
//! ```rust,ignore
//! pub fn layer_forward(x: &Tensor, /* params, state, mode */) -> (Tensor, LayerCache);
//! pub fn layer_backward(dout: &Tensor, cache: &LayerCache) -> LayerGradients;
//! ```
//!
//! The cache carries exactly what backward needs and is consumed by one
//! backward call. Layers with train/test behavior take a [`Mode`] argument
//! instead of reading a flag stored on their state.

pub mod affine;
pub mod batch_norm;
pub mod dropout;
pub mod relu;
pub mod sandwich;
pub mod softmax;

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub use affine::{affine, affine_backward, affine_forward, AffineCache, AffineGradients};
pub use batch_norm::{
    batchnorm_backward, batchnorm_forward, BatchNormCache, BatchNormGradients, BatchNormState,
};
pub use dropout::{dropout_backward, dropout_forward, DropoutCache, DropoutConfig};
pub use relu::{relu, relu_backward, relu_forward, ReluCache};
pub use sandwich::{affine_relu_backward, affine_relu_forward, AffineReluCache};
pub use softmax::softmax_loss;

/// Execution context for layers whose behavior differs between training and
/// evaluation.
///
/// - `Train`: batch statistics are used and running statistics updated;
///   dropout masks are drawn.
/// - `Evaluate`: running statistics are read only; dropout is the identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Evaluate,
}

impl FromStr for Mode {
    type Err = Error;

    /// Parses the conventional mode names `"train"` and `"test"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Mode::Train),
            "test" => Ok(Mode::Evaluate),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Train => write!(f, "train"),
            Mode::Evaluate => write!(f, "test"),
        }
    }
}
