//! Update Rules
//!
//! An update rule turns one parameter and its gradient into the next value of
//! that parameter:
//!
//! ```text
//! (w, dw, config) → (next_w, next_config)
//! ```
//!
//! `config` is per-parameter. It carries the hyperparameters (the solver decays
//! `learning_rate` in place once per epoch) and whatever buffers the rule keeps
//! between steps. Buffers are created on the first call.
//!
//! ## Built-in Rules
//!
//! ```text
//! sgd:          w -= lr * dw
//!
//! sgd_momentum: v  = μ * v - lr * dw                     (μ = 0.9)
//!               w += v
//!
//! rmsprop:      c  = ρ * c + (1 - ρ) * dw²               (ρ = 0.99)
//!               w -= lr * dw / (√c + ε)                  (ε = 1e-8)
//!
//! adam:         t += 1
//!               m  = β₁ * m + (1 - β₁) * dw              (β₁ = 0.9)
//!               v  = β₂ * v + (1 - β₂) * dw²             (β₂ = 0.999)
//!               w -= lr * (m / (1 - β₁ᵗ)) / (√(v / (1 - β₂ᵗ)) + ε)
//! ```
//!
//! ## Registry
//!
//! Rules are resolved by name through a [`Registry`]. The default registry
//! holds the four rules above; [`Registry::register`] adds more. Looking up an
//! unknown name is a configuration error.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-parameter hyperparameters and rule state
///
/// Only `learning_rate` is shared by every rule. Unset hyperparameters are
/// filled with the rule's default on first use. Buffers are never read from or
/// written to configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimConfig {
    pub learning_rate: f64,
    /// `sgd_momentum`
    pub momentum: Option<f64>,
    /// `rmsprop`
    pub decay_rate: Option<f64>,
    /// `adam`
    pub beta1: Option<f64>,
    /// `adam`
    pub beta2: Option<f64>,
    /// `rmsprop`, `adam`
    pub epsilon: Option<f64>,

    #[serde(skip)]
    pub velocity: Option<Tensor>,
    #[serde(skip)]
    pub cache: Option<Tensor>,
    #[serde(skip)]
    pub m: Option<Tensor>,
    #[serde(skip)]
    pub v: Option<Tensor>,
    #[serde(skip)]
    pub t: u64,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            momentum: None,
            decay_rate: None,
            beta1: None,
            beta2: None,
            epsilon: None,
            velocity: None,
            cache: None,
            m: None,
            v: None,
            t: 0,
        }
    }
}

impl OptimConfig {
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }
}

/// Signature shared by every update rule
pub type UpdateRule = fn(&Tensor, &Tensor, OptimConfig) -> (Tensor, OptimConfig);

/// Tensors above this size are updated in parallel
const PARALLEL_THRESHOLD: usize = 1000;

/// Vanilla stochastic gradient descent
pub fn sgd(w: &Tensor, dw: &Tensor, config: OptimConfig) -> (Tensor, OptimConfig) {
    let next_w = w.sub(&dw.mul_scalar(config.learning_rate));
    (next_w, config)
}

/// Stochastic gradient descent with momentum
pub fn sgd_momentum(w: &Tensor, dw: &Tensor, mut config: OptimConfig) -> (Tensor, OptimConfig) {
    let momentum = *config.momentum.get_or_insert(0.9);
    let velocity = config
        .velocity
        .take()
        .unwrap_or_else(|| Tensor::zeros(w.shape.clone()));

    let velocity = velocity
        .mul_scalar(momentum)
        .sub(&dw.mul_scalar(config.learning_rate));
    let next_w = w.add(&velocity);

    config.velocity = Some(velocity);
    (next_w, config)
}

/// RMSProp: per-element step sizes from a moving average of squared gradients
pub fn rmsprop(w: &Tensor, dw: &Tensor, mut config: OptimConfig) -> (Tensor, OptimConfig) {
    let decay_rate = *config.decay_rate.get_or_insert(0.99);
    let epsilon = *config.epsilon.get_or_insert(1e-8);
    let lr = config.learning_rate;

    let mut next_w = w.clone();
    let mut cache = config
        .cache
        .take()
        .unwrap_or_else(|| Tensor::zeros(w.shape.clone()));

    let update = |(w_val, c_val): (&mut f64, &mut f64), g: f64| {
        *c_val = decay_rate * *c_val + (1.0 - decay_rate) * g * g;
        *w_val -= lr * g / (c_val.sqrt() + epsilon);
    };

    if next_w.len() > PARALLEL_THRESHOLD {
        next_w
            .data
            .par_iter_mut()
            .zip(cache.data.par_iter_mut())
            .zip(dw.data.par_iter())
            .for_each(|(pair, &g)| update(pair, g));
    } else {
        next_w
            .data
            .iter_mut()
            .zip(cache.data.iter_mut())
            .zip(dw.data.iter())
            .for_each(|(pair, &g)| update(pair, g));
    }

    config.cache = Some(cache);
    (next_w, config)
}

/// Adam with bias-corrected first and second moments
pub fn adam(w: &Tensor, dw: &Tensor, mut config: OptimConfig) -> (Tensor, OptimConfig) {
    let beta1 = *config.beta1.get_or_insert(0.9);
    let beta2 = *config.beta2.get_or_insert(0.999);
    let epsilon = *config.epsilon.get_or_insert(1e-8);
    let lr = config.learning_rate;

    config.t += 1;
    let step = config.t as i32;
    // m and v start at zero, so early estimates are biased toward zero
    let bias_correction1 = 1.0 - beta1.powi(step);
    let bias_correction2 = 1.0 - beta2.powi(step);

    let mut next_w = w.clone();
    let mut m = config
        .m
        .take()
        .unwrap_or_else(|| Tensor::zeros(w.shape.clone()));
    let mut v = config
        .v
        .take()
        .unwrap_or_else(|| Tensor::zeros(w.shape.clone()));

    let update = |((w_val, g), (m_val, v_val)): ((&mut f64, &f64), (&mut f64, &mut f64))| {
        let g = *g;
        *m_val = beta1 * *m_val + (1.0 - beta1) * g;
        *v_val = beta2 * *v_val + (1.0 - beta2) * g * g;
        let m_hat = *m_val / bias_correction1;
        let v_hat = *v_val / bias_correction2;
        *w_val -= lr * m_hat / (v_hat.sqrt() + epsilon);
    };

    if next_w.len() > PARALLEL_THRESHOLD {
        next_w
            .data
            .par_iter_mut()
            .zip(dw.data.par_iter())
            .zip(m.data.par_iter_mut().zip(v.data.par_iter_mut()))
            .for_each(update);
    } else {
        next_w
            .data
            .iter_mut()
            .zip(dw.data.iter())
            .zip(m.data.iter_mut().zip(v.data.iter_mut()))
            .for_each(update);
    }

    config.m = Some(m);
    config.v = Some(v);
    (next_w, config)
}

/// Name → update rule lookup table
#[derive(Clone)]
pub struct Registry {
    rules: BTreeMap<String, UpdateRule>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("sgd", sgd);
        registry.register("sgd_momentum", sgd_momentum);
        registry.register("rmsprop", rmsprop);
        registry.register("adam", adam);
        registry
    }
}

impl Registry {
    /// Registry without any rules
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Add or replace a rule
    pub fn register(&mut self, name: impl Into<String>, rule: UpdateRule) {
        self.rules.insert(name.into(), rule);
    }

    /// Resolve a rule by name
    ///
    /// # Errors
    ///
    /// [`Error::UnknownUpdateRule`] when no rule is registered under `name`
    pub fn get(&self, name: &str) -> Result<UpdateRule> {
        self.rules
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownUpdateRule(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

/// Resolve a built-in rule by name
pub fn lookup(name: &str) -> Result<UpdateRule> {
    Registry::default().get(name)
}
