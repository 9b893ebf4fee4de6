//! Layerwise: Hand-Differentiated Feed-Forward Networks
//!
//! A small training toolkit for fully connected classifiers, built from
//! layers that each carry their own forward and backward formula.
//!
//! # Modules
//!
//! - [`tensor`] - Dense row-major `f64` tensors
//! - [`layers`] - Affine, ReLU, batch normalization, dropout and softmax loss
//! - [`params`] - Per-layer parameter store with flat named views
//! - [`classifiers`] - Two-layer and fully connected networks
//! - [`optim`] - Update rules and the rule registry
//! - [`solver`] - Mini-batch training with checkpoints and early stopping
//! - [`report`] - Per-epoch progress reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use layerwise::{
//!     Dataset, FullyConnectedConfig, FullyConnectedNet, Precision, Solver, SolverConfig, Tensor,
//! };
//!
//! # fn main() -> layerwise::Result<()> {
//! let data = Dataset::new(
//!     Tensor::zeros(vec![500, 32]),
//!     vec![0; 500],
//!     Tensor::zeros(vec![100, 32]),
//!     vec![0; 100],
//! )?;
//!
//! let mut model = FullyConnectedNet::new(
//!     FullyConnectedConfig::new(vec![64, 64])
//!         .with_input_dim(32)
//!         .with_batchnorm(true)
//!         .with_dropout(0.1)
//!         .with_precision(Precision::F64),
//! )?;
//!
//! let config = SolverConfig {
//!     update_rule: "adam".to_string(),
//!     num_epochs: 20,
//!     early_stopping: Some(5),
//!     ..SolverConfig::default()
//! };
//! let mut solver = Solver::new(&mut model, &data, config)?;
//! solver.train()?;
//! # Ok(())
//! # }
//! ```

pub mod classifiers;
pub mod error;
pub mod layers;
pub mod optim;
pub mod params;
pub mod report;
pub mod solver;
pub mod tensor;

#[cfg(test)]
mod gradcheck;

// Re-export main types for convenience
pub use classifiers::{
    Classifier, FullyConnectedConfig, FullyConnectedNet, TwoLayerConfig, TwoLayerNet,
};
pub use error::{Error, Result};
pub use layers::Mode;
pub use optim::{OptimConfig, Registry, UpdateRule};
pub use params::{LayerParams, NormParams, ParamSet};
pub use report::{CsvReporter, EpochReport, LogReporter, Reporter};
pub use solver::{Dataset, Solver, SolverConfig, SolverState};
pub use tensor::{Precision, Tensor};
