//! Inverted Dropout
//!
//! Dropout randomly zeros activations during training to prevent overfitting.
//! The inverted variant rescales the kept activations by `1 / (1 - p)` at train
//! time, so evaluation needs no rescaling and is the identity.
//!
//! ```text
//! train:    mask = (u >= p) / (1 - p),  u ~ U[0, 1)
//!           out = x * mask
//! evaluate: out = x
//! ```
//!
//! ## Seeded Masks
//!
//! When a seed is configured, a fresh generator is seeded from it on every
//! train-mode call. Every mask of a given shape is then identical, which makes
//! gradient checks reproducible but removes the mask diversity that gives
//! dropout its regularizing effect. Leave the seed unset for real training.

use super::Mode;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Dropout layer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropoutConfig {
    /// Probability of dropping a unit, in `[0, 1]`
    pub p: f64,
    /// Re-seed the mask generator from this value before every train-mode call
    pub seed: Option<u64>,
}

impl DropoutConfig {
    pub fn new(p: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&p),
            "Dropout probability must be between 0.0 and 1.0, got {}",
            p
        );
        Self { p, seed: None }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Cache for dropout backward pass
pub struct DropoutCache {
    /// Scaled keep-mask (`0` or `1 / (1 - p)`); `None` in evaluate mode
    pub mask: Option<Tensor>,
}

/// Dropout forward pass
///
/// # Arguments
///
/// * `x` - Input tensor of any shape
/// * `config` - Drop probability and optional fixed seed
/// * `mode` - Train draws a mask, evaluate passes `x` through
/// * `rng` - Mask generator used when no seed is configured
pub fn dropout_forward<R>(
    x: &Tensor,
    config: &DropoutConfig,
    mode: Mode,
    rng: &mut R,
) -> (Tensor, DropoutCache)
where
    R: Rng + ?Sized,
{
    match mode {
        Mode::Evaluate => (x.clone(), DropoutCache { mask: None }),
        Mode::Train => {
            let mask = match config.seed {
                Some(seed) => draw_mask(&x.shape, config.p, &mut StdRng::seed_from_u64(seed)),
                None => draw_mask(&x.shape, config.p, rng),
            };
            let out = x.mul(&mask);
            (out, DropoutCache { mask: Some(mask) })
        }
    }
}

fn draw_mask<R>(shape: &[usize], p: f64, rng: &mut R) -> Tensor
where
    R: Rng + ?Sized,
{
    // p == 1 keeps nothing, so the scale is never applied
    let scale = if p < 1.0 { 1.0 / (1.0 - p) } else { 0.0 };
    let size: usize = shape.iter().product();
    let data = (0..size)
        .map(|_| if rng.random::<f64>() >= p { scale } else { 0.0 })
        .collect();
    Tensor::new(data, shape.to_vec())
}

/// Dropout backward pass
///
/// Applies the same mask to the gradient; passes it through unchanged when the
/// forward call ran in evaluate mode.
pub fn dropout_backward(dout: &Tensor, cache: &DropoutCache) -> Tensor {
    match &cache.mask {
        Some(mask) => dout.mul(mask),
        None => dout.clone(),
    }
}
