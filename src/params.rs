//! Parameter Store
//!
//! Parameters are held per layer, in network order:
//!
//! ```text
//! ParamSet
//! ├── layers[0]: LayerParams { weight: W1, bias: b1, norm: Some { gamma1, beta1 } }
//! ├── layers[1]: LayerParams { weight: W2, bias: b2, norm: Some { gamma2, beta2 } }
//! └── layers[2]: LayerParams { weight: W3, bias: b3, norm: None }
//! ```
//!
//! The flat names (`W{i}`, `b{i}`, `gamma{i}`, `beta{i}`, 1-indexed) exist only
//! as a derived view for code that iterates parameters one at a time, such as
//! the solver applying an update rule.
//!
//! Gradients use the same type. A backward pass builds a `ParamSet` with the
//! same layer structure as the parameters it differentiates, so the two always
//! expose the same names in the same order.

use crate::tensor::{Precision, Tensor};
use serde::{Deserialize, Serialize};

/// Batch normalization scale and shift of one layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormParams {
    pub gamma: Tensor,
    pub beta: Tensor,
}

/// Parameters of one affine layer and its optional normalization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    /// `[D_in, D_out]`
    pub weight: Tensor,
    /// `[D_out]`
    pub bias: Tensor,
    pub norm: Option<NormParams>,
}

impl LayerParams {
    /// Zero-filled tensors with the same shapes
    pub fn zeros_like(&self) -> Self {
        Self {
            weight: Tensor::zeros(self.weight.shape.clone()),
            bias: Tensor::zeros(self.bias.shape.clone()),
            norm: self.norm.as_ref().map(|n| NormParams {
                gamma: Tensor::zeros(n.gamma.shape.clone()),
                beta: Tensor::zeros(n.beta.shape.clone()),
            }),
        }
    }
}

/// All parameters of a network (or all gradients of its loss)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    pub layers: Vec<LayerParams>,
}

impl ParamSet {
    pub fn new(layers: Vec<LayerParams>) -> Self {
        Self { layers }
    }

    /// Flat `(name, tensor)` view in network order
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layerwise::{LayerParams, ParamSet, Tensor};
    /// let params = ParamSet::new(vec![LayerParams {
    ///     weight: Tensor::zeros(vec![4, 3]),
    ///     bias: Tensor::zeros(vec![3]),
    ///     norm: None,
    /// }]);
    /// let names: Vec<String> = params.named().into_iter().map(|(n, _)| n).collect();
    /// assert_eq!(names, vec!["W1", "b1"]);
    /// ```
    pub fn named(&self) -> Vec<(String, &Tensor)> {
        let mut out = Vec::with_capacity(self.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let idx = i + 1;
            out.push((format!("W{}", idx), &layer.weight));
            out.push((format!("b{}", idx), &layer.bias));
            if let Some(norm) = &layer.norm {
                out.push((format!("gamma{}", idx), &norm.gamma));
                out.push((format!("beta{}", idx), &norm.beta));
            }
        }
        out
    }

    /// Mutable flat view, same names and order as [`ParamSet::named`]
    pub fn named_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut out = Vec::with_capacity(self.len());
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let idx = i + 1;
            out.push((format!("W{}", idx), &mut layer.weight));
            out.push((format!("b{}", idx), &mut layer.bias));
            if let Some(norm) = &mut layer.norm {
                out.push((format!("gamma{}", idx), &mut norm.gamma));
                out.push((format!("beta{}", idx), &mut norm.beta));
            }
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        self.named().into_iter().map(|(name, _)| name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.named()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.named_mut()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Number of named tensors
    pub fn len(&self) -> usize {
        self.layers
            .iter()
            .map(|l| if l.norm.is_some() { 4 } else { 2 })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total number of scalar parameters
    pub fn num_elements(&self) -> usize {
        self.named().iter().map(|(_, t)| t.len()).sum()
    }

    /// Zero-filled set with identical structure and shapes
    pub fn zeros_like(&self) -> Self {
        Self {
            layers: self.layers.iter().map(LayerParams::zeros_like).collect(),
        }
    }

    /// `Σ ‖W‖²` over every weight matrix (biases and norm parameters excluded)
    pub fn weight_sum_squares(&self) -> f64 {
        self.layers.iter().map(|l| l.weight.sum_squares()).sum()
    }

    /// Value copy of every parameter, for checkpointing
    pub fn snapshot(&self) -> ParamSet {
        self.clone()
    }

    /// Overwrite every parameter with the values of `snapshot`
    ///
    /// # Panics
    ///
    /// Panics if the snapshot was taken from a differently structured set
    pub fn restore(&mut self, snapshot: &ParamSet) {
        assert_eq!(
            self.names(),
            snapshot.names(),
            "Snapshot does not match parameter layout"
        );
        self.clone_from(snapshot);
    }

    /// Round every parameter to `precision`
    pub fn to_precision(&self, precision: Precision) -> ParamSet {
        let mut out = self.clone();
        out.round_to(precision);
        out
    }

    /// Round every parameter to `precision` in place
    pub fn round_to(&mut self, precision: Precision) {
        if precision == Precision::F64 {
            return;
        }
        for (_, tensor) in self.named_mut() {
            tensor.round_to(precision);
        }
    }
}
