//! Mini-Batch Solver
//!
//! Trains any [`Classifier`] on a labeled train/validation split.
//!
//! ## Training Loop
//!
//! ```text
//! iterations_per_epoch = max(N_train / batch_size, 1)
//!
//! for t in 0..num_epochs * iterations_per_epoch:
//!     step:        sample batch_size examples (with replacement)
//!                  (loss, grads) = model.loss(batch)
//!                  w, config = update_rule(w, dw, config)   for every parameter
//!     epoch end:   epoch += 1, learning_rate *= lr_decay     for every parameter
//!     checkpoint:  at t = 0, every epoch end, and the last iteration
//!                  train accuracy on a random subsample, validation loss and accuracy
//!                  better validation accuracy → snapshot parameters
//!                  otherwise → patience -= 1, stop at 0
//!
//! restore the best snapshot
//! ```
//!
//! ## States
//!
//! ```text
//! Initialized → Stepping → Completed
//!                        ↘ EarlyStopped
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use layerwise::{Dataset, FullyConnectedConfig, FullyConnectedNet, Solver, SolverConfig};
//! # fn load() -> Dataset { unimplemented!() }
//!
//! let data: Dataset = load();
//! let mut model = FullyConnectedNet::new(FullyConnectedConfig::new(vec![100, 100]))?;
//! let config = SolverConfig::from_json(
//!     r#"{"update_rule": "adam", "optim_config": {"learning_rate": 1e-3}, "num_epochs": 5}"#,
//! )?;
//!
//! let mut solver = Solver::new(&mut model, &data, config)?;
//! solver.train()?;
//! println!("best validation accuracy: {:.3}", solver.best_val_acc());
//! # Ok::<(), layerwise::Error>(())
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use crate::classifiers::Classifier;
use crate::error::{Error, Result};
use crate::layers::softmax_loss;
use crate::optim::{OptimConfig, Registry, UpdateRule};
use crate::params::ParamSet;
use crate::report::{EpochReport, LogReporter, Reporter};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Training and validation examples
///
/// Inputs have a leading example dimension; labels are class indices aligned
/// with the input rows.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub x_train: Tensor,
    pub y_train: Vec<usize>,
    pub x_val: Tensor,
    pub y_val: Vec<usize>,
}

impl Dataset {
    /// # Errors
    ///
    /// - [`Error::DatasetMismatch`] when a split has more inputs than labels or
    ///   the other way round
    /// - [`Error::EmptySplit`] when a split has no examples
    pub fn new(
        x_train: Tensor,
        y_train: Vec<usize>,
        x_val: Tensor,
        y_val: Vec<usize>,
    ) -> Result<Self> {
        let splits = [("train", &x_train, &y_train), ("validation", &x_val, &y_val)];
        for (split, x, y) in splits {
            if x.rows() != y.len() {
                return Err(Error::DatasetMismatch {
                    split,
                    inputs: x.rows(),
                    labels: y.len(),
                });
            }
            if y.is_empty() {
                return Err(Error::EmptySplit(split));
            }
        }
        Ok(Self {
            x_train,
            y_train,
            x_val,
            y_val,
        })
    }

    pub fn num_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn num_val(&self) -> usize {
        self.y_val.len()
    }
}

/// Solver hyperparameters
///
/// Unrecognized keys are rejected when deserializing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Name of a registered update rule
    pub update_rule: String,
    /// Copied once per parameter on reset
    pub optim_config: OptimConfig,
    /// Learning-rate multiplier applied after every epoch
    pub lr_decay: f64,
    pub batch_size: usize,
    pub num_epochs: usize,
    /// Checkpoints without improvement before training stops; `None` disables
    pub early_stopping: Option<usize>,
    /// Iterations between step logs; `0` disables them
    pub print_every: usize,
    pub verbose: bool,
    /// Training examples used for the train accuracy; `None` uses all
    pub num_train_samples: Option<usize>,
    /// Examples per forward pass when evaluating
    pub eval_batch_size: usize,
    /// Seed for batch sampling and accuracy subsampling
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            update_rule: "sgd".to_string(),
            optim_config: OptimConfig::default(),
            lr_decay: 1.0,
            batch_size: 100,
            num_epochs: 10,
            early_stopping: None,
            print_every: 10,
            verbose: true,
            num_train_samples: Some(1000),
            eval_batch_size: 100,
            seed: None,
        }
    }
}

impl SolverConfig {
    /// Parse a JSON configuration, filling missing keys with defaults
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for malformed JSON or unrecognized keys
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Progress of a [`Solver`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    Initialized,
    Stepping,
    EarlyStopped,
    Completed,
}

/// Loss and accuracy over a set of examples
#[derive(Clone, Copy, Debug, PartialEq)]
struct Evaluation {
    loss: f64,
    accuracy: f64,
}

/// Evaluate-mode loss and accuracy, `batch_size` examples per forward pass
///
/// An empty set scores zero for both.
fn evaluate<M>(model: &mut M, x: &Tensor, y: &[usize], batch_size: usize) -> Evaluation
where
    M: Classifier + ?Sized,
{
    let n = y.len();
    if n == 0 {
        return Evaluation {
            loss: 0.0,
            accuracy: 0.0,
        };
    }
    let mut correct = 0usize;
    let mut loss_sum = 0.0;

    for start in (0..n).step_by(batch_size) {
        let end = (start + batch_size).min(n);
        let labels = &y[start..end];
        let scores = model.scores(&x.slice_rows(start, end));

        correct += scores
            .argmax_rows()
            .iter()
            .zip(labels)
            .filter(|(pred, label)| pred == label)
            .count();
        loss_sum += softmax_loss(&scores, labels).0 * labels.len() as f64;
    }

    Evaluation {
        loss: loss_sum / n as f64,
        accuracy: correct as f64 / n as f64,
    }
}

/// Mini-batch trainer with learning-rate decay, best-checkpoint restore and
/// early stopping
pub struct Solver<'a, M: Classifier + ?Sized> {
    model: &'a mut M,
    data: &'a Dataset,
    config: SolverConfig,
    update_rule: UpdateRule,
    reporter: Box<dyn Reporter>,
    rng: StdRng,

    state: SolverState,
    epoch: usize,
    best_val_acc: f64,
    best_params: Option<ParamSet>,
    optim_configs: BTreeMap<String, OptimConfig>,
    early_stopping_counter: Option<usize>,

    loss_history: Vec<f64>,
    train_acc_history: Vec<f64>,
    val_acc_history: Vec<f64>,
    val_loss_history: Vec<f64>,
}

impl<'a, M: Classifier + ?Sized> Solver<'a, M> {
    /// Bind a model and dataset, resolving the update rule from the built-in
    /// registry
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownUpdateRule`] for an unregistered rule name
    /// - [`Error::ZeroSetting`] for a zero batch size, evaluation batch size or
    ///   train accuracy sample count
    pub fn new(model: &'a mut M, data: &'a Dataset, config: SolverConfig) -> Result<Self> {
        Self::with_registry(model, data, config, &Registry::default())
    }

    /// Like [`Solver::new`], resolving the update rule from `registry`
    pub fn with_registry(
        model: &'a mut M,
        data: &'a Dataset,
        config: SolverConfig,
        registry: &Registry,
    ) -> Result<Self> {
        let update_rule = registry.get(&config.update_rule)?;
        if config.batch_size == 0 {
            return Err(Error::ZeroSetting("batch_size"));
        }
        if config.eval_batch_size == 0 {
            return Err(Error::ZeroSetting("eval_batch_size"));
        }
        if config.num_train_samples == Some(0) {
            return Err(Error::ZeroSetting("num_train_samples"));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut solver = Self {
            model,
            data,
            config,
            update_rule,
            reporter: Box::new(LogReporter),
            rng,
            state: SolverState::Initialized,
            epoch: 0,
            best_val_acc: 0.0,
            best_params: None,
            optim_configs: BTreeMap::new(),
            early_stopping_counter: None,
            loss_history: Vec::new(),
            train_acc_history: Vec::new(),
            val_acc_history: Vec::new(),
            val_loss_history: Vec::new(),
        };
        solver.reset();
        Ok(solver)
    }

    /// Send epoch reports to `reporter` instead of the log
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Clear counters, histories and the best checkpoint, and give every
    /// parameter a fresh copy of the optimizer configuration
    pub fn reset(&mut self) {
        self.state = SolverState::Initialized;
        self.epoch = 0;
        self.best_val_acc = 0.0;
        self.best_params = None;
        self.early_stopping_counter = self.config.early_stopping;
        self.loss_history.clear();
        self.train_acc_history.clear();
        self.val_acc_history.clear();
        self.val_loss_history.clear();

        self.optim_configs = self
            .model
            .params()
            .names()
            .into_iter()
            .map(|name| (name, self.config.optim_config.clone()))
            .collect();
    }

    /// One gradient update on a random batch
    ///
    /// Returns the batch loss.
    pub fn step(&mut self) -> f64 {
        let num_train = self.data.num_train();
        let batch: Vec<usize> = (0..self.config.batch_size)
            .map(|_| self.rng.random_range(0..num_train))
            .collect();
        let x_batch = self.data.x_train.select_rows(&batch);
        let y_batch: Vec<usize> = batch.iter().map(|&i| self.data.y_train[i]).collect();

        let (loss, grads) = self.model.loss(&x_batch, &y_batch);
        self.loss_history.push(loss);

        let params = self.model.params_mut().named_mut();
        for ((name, w), (grad_name, dw)) in params.into_iter().zip(grads.named()) {
            debug_assert_eq!(name, grad_name);
            let config = self
                .optim_configs
                .remove(&name)
                .unwrap_or_else(|| self.config.optim_config.clone());
            let (next_w, next_config) = (self.update_rule)(w, dw, config);
            *w = next_w;
            self.optim_configs.insert(name, next_config);
        }

        loss
    }

    /// Fraction of examples the model classifies correctly
    ///
    /// With `num_samples` smaller than the number of examples, a random
    /// subsample of that size (drawn with replacement) is scored instead.
    /// Predictions run in batches of `eval_batch_size`.
    pub fn check_accuracy(&mut self, x: &Tensor, y: &[usize], num_samples: Option<usize>) -> f64 {
        let batch_size = self.config.eval_batch_size;
        match num_samples {
            Some(n) if y.len() > n => {
                let mask: Vec<usize> = (0..n)
                    .map(|_| self.rng.random_range(0..y.len()))
                    .collect();
                let x = x.select_rows(&mask);
                let y: Vec<usize> = mask.iter().map(|&i| y[i]).collect();
                evaluate(&mut *self.model, &x, &y, batch_size).accuracy
            }
            _ => evaluate(&mut *self.model, x, y, batch_size).accuracy,
        }
    }

    /// Run the full optimization
    ///
    /// On return the model holds the parameters of the best validation
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Propagates reporter failures. Training stops at the failing epoch and
    /// the parameters are left as they were.
    pub fn train(&mut self) -> Result<()> {
        let data = self.data;
        let iterations_per_epoch = (data.num_train() / self.config.batch_size).max(1);
        let num_iterations = self.config.num_epochs * iterations_per_epoch;

        self.state = SolverState::Stepping;
        info!(
            update_rule = %self.config.update_rule,
            num_epochs = self.config.num_epochs,
            iterations_per_epoch,
            "Starting training"
        );

        let mut epoch_start = Instant::now();
        let mut epoch_loss = 0.0;
        let mut epoch_steps = 0usize;

        for t in 0..num_iterations {
            let loss = self.step();
            epoch_loss += loss;
            epoch_steps += 1;

            let print_every = self.config.print_every;
            if self.config.verbose && print_every > 0 && t % print_every == 0 {
                debug!(iteration = t + 1, num_iterations, loss, "Step");
            }

            let epoch_end = (t + 1) % iterations_per_epoch == 0;
            if epoch_end {
                self.epoch += 1;
                for config in self.optim_configs.values_mut() {
                    config.learning_rate *= self.config.lr_decay;
                }
            }

            let first_it = t == 0;
            let last_it = t + 1 == num_iterations;
            if !(first_it || last_it || epoch_end) {
                continue;
            }

            let train_acc =
                self.check_accuracy(&data.x_train, &data.y_train, self.config.num_train_samples);
            let val = evaluate(
                &mut *self.model,
                &data.x_val,
                &data.y_val,
                self.config.eval_batch_size,
            );
            self.train_acc_history.push(train_acc);
            self.val_acc_history.push(val.accuracy);
            self.val_loss_history.push(val.loss);

            if epoch_end {
                let report = EpochReport {
                    epoch: self.epoch,
                    train_loss: epoch_loss / epoch_steps as f64,
                    train_acc,
                    val_loss: val.loss,
                    val_acc: val.accuracy,
                    duration: epoch_start.elapsed(),
                };
                if self.config.verbose {
                    self.reporter.report(&report)?;
                }
                epoch_start = Instant::now();
                epoch_loss = 0.0;
                epoch_steps = 0;
            }

            if val.accuracy > self.best_val_acc {
                self.best_val_acc = val.accuracy;
                self.best_params = Some(self.model.params().snapshot());
                self.early_stopping_counter = self.config.early_stopping;
                debug!(epoch = self.epoch, val_acc = val.accuracy, "New best checkpoint");
            } else if let Some(counter) = self.early_stopping_counter.as_mut() {
                *counter = counter.saturating_sub(1);
                if *counter == 0 {
                    info!(
                        epoch = self.epoch,
                        patience = self.config.early_stopping,
                        best_val_acc = self.best_val_acc,
                        "Early stopping: no validation improvement"
                    );
                    self.state = SolverState::EarlyStopped;
                    break;
                }
            }
        }

        if self.state != SolverState::EarlyStopped {
            self.state = SolverState::Completed;
        }
        self.restore_best();

        info!(
            epochs = self.epoch,
            best_val_acc = self.best_val_acc,
            "Training finished"
        );
        Ok(())
    }

    fn restore_best(&mut self) {
        match &self.best_params {
            Some(best) => self.model.params_mut().restore(best),
            None => warn!("No checkpoint improved on zero accuracy; keeping current parameters"),
        }
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Completed epochs
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn best_val_acc(&self) -> f64 {
        self.best_val_acc
    }

    /// Parameters of the best checkpoint so far
    pub fn best_params(&self) -> Option<&ParamSet> {
        self.best_params.as_ref()
    }

    /// Current optimizer configuration of one parameter
    pub fn optim_config(&self, name: &str) -> Option<&OptimConfig> {
        self.optim_configs.get(name)
    }

    /// Batch loss of every step
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Train accuracy at every checkpoint
    pub fn train_acc_history(&self) -> &[f64] {
        &self.train_acc_history
    }

    /// Validation accuracy at every checkpoint
    pub fn val_acc_history(&self) -> &[f64] {
        &self.val_acc_history
    }

    /// Mean validation loss at every checkpoint
    pub fn val_loss_history(&self) -> &[f64] {
        &self.val_loss_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LayerParams;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// One scalar weight `w`, growing by the learning rate every step.
    ///
    /// Predicts class 0 for input `x` when `x < w <= limit`, class 1
    /// otherwise, so validation accuracy on inputs `0..limit` with all-zero
    /// labels rises until `w` passes `limit` and then drops to zero.
    struct Ramp {
        params: ParamSet,
        limit: f64,
    }

    impl Ramp {
        fn new(limit: f64) -> Self {
            Self {
                params: ParamSet::new(vec![LayerParams {
                    weight: Tensor::zeros(vec![1, 1]),
                    bias: Tensor::zeros(vec![1]),
                    norm: None,
                }]),
                limit,
            }
        }

        fn w(&self) -> f64 {
            self.params.layers[0].weight.data[0]
        }
    }

    impl Classifier for Ramp {
        fn scores(&mut self, x: &Tensor) -> Tensor {
            let w = self.w();
            let data = x
                .data
                .iter()
                .flat_map(|&v| {
                    if v < w && w <= self.limit {
                        [1.0, 0.0]
                    } else {
                        [0.0, 1.0]
                    }
                })
                .collect();
            Tensor::new(data, vec![x.rows(), 2])
        }

        fn loss(&mut self, _x: &Tensor, _y: &[usize]) -> (f64, ParamSet) {
            let mut grads = self.params.zeros_like();
            grads.layers[0].weight.data[0] = -1.0;
            (1.0 / (1.0 + self.w()), grads)
        }

        fn params(&self) -> &ParamSet {
            &self.params
        }

        fn params_mut(&mut self) -> &mut ParamSet {
            &mut self.params
        }
    }

    /// Three training examples, validation inputs `0, 1, 2` all labeled 0
    fn ramp_data() -> Dataset {
        Dataset::new(
            Tensor::zeros(vec![3, 1]),
            vec![0, 0, 0],
            Tensor::new(vec![0.0, 1.0, 2.0], vec![3, 1]),
            vec![0, 0, 0],
        )
        .unwrap()
    }

    /// One iteration per epoch, `w += 1` per iteration
    fn ramp_config(num_epochs: usize) -> SolverConfig {
        SolverConfig {
            optim_config: OptimConfig::with_learning_rate(1.0),
            batch_size: 3,
            num_epochs,
            seed: Some(0),
            ..SolverConfig::default()
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Rc<RefCell<Vec<EpochReport>>>);

    impl Reporter for Collect {
        fn report(&mut self, report: &EpochReport) -> Result<()> {
            self.0.borrow_mut().push(report.clone());
            Ok(())
        }
    }

    #[test]
    fn test_restores_best_checkpoint() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);

        let mut solver = Solver::new(&mut model, &data, ramp_config(5)).unwrap();
        solver.train().unwrap();

        let history = solver.val_acc_history().to_vec();
        assert_eq!(history.len(), 5);
        assert_abs_diff_eq!(history[0], 1.0 / 3.0);
        assert_abs_diff_eq!(history[1], 2.0 / 3.0);
        assert_eq!(&history[2..], &[0.0, 0.0, 0.0]);

        assert_eq!(solver.state(), SolverState::Completed);
        assert_abs_diff_eq!(solver.best_val_acc(), 2.0 / 3.0);
        assert_eq!(solver.loss_history().len(), 5);

        // Snapshot from epoch 2, not the final w = 5
        assert_eq!(model.w(), 2.0);
    }

    #[test]
    fn test_early_stopping_halts_before_last_epoch() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        let config = SolverConfig {
            early_stopping: Some(2),
            ..ramp_config(10)
        };

        let mut solver = Solver::new(&mut model, &data, config).unwrap();
        solver.train().unwrap();

        // Improves twice, then two checkpoints without improvement
        assert_eq!(solver.state(), SolverState::EarlyStopped);
        assert_eq!(solver.epoch(), 4);
        assert_eq!(solver.loss_history().len(), 4);
        assert_eq!(model.w(), 2.0);
    }

    #[test]
    fn test_never_improving_keeps_current_parameters() {
        let data = ramp_data();
        // limit 0: every prediction is class 1
        let mut model = Ramp::new(0.0);
        let config = SolverConfig {
            early_stopping: Some(3),
            ..ramp_config(10)
        };

        let mut solver = Solver::new(&mut model, &data, config).unwrap();
        solver.train().unwrap();

        assert_eq!(solver.state(), SolverState::EarlyStopped);
        assert!(solver.best_params().is_none());
        assert_eq!(solver.loss_history().len(), 3);
        assert_eq!(model.w(), 3.0);
    }

    #[test]
    fn test_learning_rate_decays_once_per_epoch() {
        let data = ramp_data();
        let mut model = Ramp::new(100.0);
        let config = SolverConfig {
            lr_decay: 0.5,
            ..ramp_config(3)
        };

        let mut solver = Solver::new(&mut model, &data, config).unwrap();
        solver.train().unwrap();

        for name in ["W1", "b1"] {
            let lr = solver.optim_config(name).unwrap().learning_rate;
            assert_abs_diff_eq!(lr, 0.125);
        }
        // Steps used lr 1, 0.5, 0.25: w went 0 → 1 → 1.5 → 1.75
        let expected = [1.0, 0.5, 0.4];
        for (&loss, &want) in solver.loss_history().iter().zip(&expected) {
            assert_abs_diff_eq!(loss, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_epoch_boundaries_and_reports() {
        // 10 examples, batch 4: 2 iterations per epoch, 6 iterations in total
        let data = Dataset::new(
            Tensor::zeros(vec![10, 1]),
            vec![0; 10],
            Tensor::new(vec![0.0, 1.0, 2.0], vec![3, 1]),
            vec![0, 0, 0],
        )
        .unwrap();
        let mut model = Ramp::new(100.0);
        let config = SolverConfig {
            batch_size: 4,
            ..ramp_config(3)
        };

        let collected = Collect::default();
        let mut solver = Solver::new(&mut model, &data, config)
            .unwrap()
            .with_reporter(collected.clone());
        solver.train().unwrap();

        assert_eq!(solver.loss_history().len(), 6);
        // First iteration plus three epoch ends (the last coincides with one)
        assert_eq!(solver.val_acc_history().len(), 4);
        assert_eq!(solver.train_acc_history().len(), 4);
        assert_eq!(solver.val_loss_history().len(), 4);

        let reports = collected.0.borrow();
        let epochs: Vec<usize> = reports.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);

        // Epoch 1 averages the losses at w = 0 and w = 1
        assert_abs_diff_eq!(reports[0].train_loss, (1.0 + 0.5) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_last_iteration_is_evaluated_once() {
        // 5 examples, batch 2: 2 iterations per epoch
        let data = Dataset::new(
            Tensor::zeros(vec![5, 1]),
            vec![0; 5],
            Tensor::new(vec![0.0, 1.0, 2.0], vec![3, 1]),
            vec![0, 0, 0],
        )
        .unwrap();
        let mut model = Ramp::new(100.0);
        let config = SolverConfig {
            batch_size: 2,
            ..ramp_config(1)
        };

        let mut solver = Solver::new(&mut model, &data, config).unwrap();
        solver.train().unwrap();
        // t = 0 and t = 1 (epoch end and last iteration at once)
        assert_eq!(solver.val_acc_history().len(), 2);
    }

    #[test]
    fn test_quiet_solver_reports_nothing() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        let config = SolverConfig {
            verbose: false,
            ..ramp_config(3)
        };

        let collected = Collect::default();
        let mut solver = Solver::new(&mut model, &data, config)
            .unwrap()
            .with_reporter(collected.clone());
        solver.train().unwrap();
        assert!(collected.0.borrow().is_empty());
    }

    #[test]
    fn test_check_accuracy_batches_and_subsamples() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        model.params.layers[0].weight.data[0] = 2.0;

        let config = SolverConfig {
            eval_batch_size: 2,
            ..ramp_config(1)
        };
        let mut solver = Solver::new(&mut model, &data, config).unwrap();

        let acc = solver.check_accuracy(&data.x_val, &data.y_val, None);
        assert_abs_diff_eq!(acc, 2.0 / 3.0);

        // Subsample of one example: either right or wrong
        let acc = solver.check_accuracy(&data.x_val, &data.y_val, Some(1));
        assert!(acc == 0.0 || acc == 1.0);
    }

    #[test]
    fn test_reset_clears_progress() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        let mut solver = Solver::new(&mut model, &data, ramp_config(2)).unwrap();
        assert_eq!(solver.state(), SolverState::Initialized);

        solver.train().unwrap();
        solver.reset();

        assert_eq!(solver.state(), SolverState::Initialized);
        assert_eq!(solver.epoch(), 0);
        assert!(solver.loss_history().is_empty());
        assert!(solver.best_params().is_none());
        assert_eq!(solver.optim_config("W1").unwrap().learning_rate, 1.0);
    }

    #[test]
    fn test_unknown_update_rule_is_rejected() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        let config = SolverConfig {
            update_rule: "nesterov".to_string(),
            ..SolverConfig::default()
        };
        assert!(matches!(
            Solver::new(&mut model, &data, config),
            Err(Error::UnknownUpdateRule(_))
        ));
    }

    #[test]
    fn test_zero_settings_are_rejected() {
        let data = ramp_data();
        let cases = [
            (
                SolverConfig {
                    batch_size: 0,
                    ..SolverConfig::default()
                },
                "batch_size",
            ),
            (
                SolverConfig {
                    eval_batch_size: 0,
                    ..SolverConfig::default()
                },
                "eval_batch_size",
            ),
            (
                SolverConfig {
                    num_train_samples: Some(0),
                    ..SolverConfig::default()
                },
                "num_train_samples",
            ),
        ];
        for (config, setting) in cases {
            let mut model = Ramp::new(2.0);
            match Solver::new(&mut model, &data, config) {
                Err(Error::ZeroSetting(name)) => assert_eq!(name, setting),
                _ => panic!("{} = 0 was accepted", setting),
            }
        }
    }

    #[test]
    fn test_check_accuracy_of_nothing_is_zero() {
        let data = ramp_data();
        let mut model = Ramp::new(2.0);
        let mut solver = Solver::new(&mut model, &data, ramp_config(1)).unwrap();

        let empty = data.x_val.slice_rows(0, 0);
        assert_eq!(solver.check_accuracy(&empty, &[], None), 0.0);
        assert_eq!(solver.check_accuracy(&data.x_val, &data.y_val, Some(0)), 0.0);
    }

    #[test]
    fn test_config_from_json() {
        let config = SolverConfig::from_json(
            r#"{"update_rule": "sgd_momentum", "optim_config": {"learning_rate": 0.05, "momentum": 0.8}, "early_stopping": 4}"#,
        )
        .unwrap();
        assert_eq!(config.update_rule, "sgd_momentum");
        assert_eq!(config.optim_config.learning_rate, 0.05);
        assert_eq!(config.optim_config.momentum, Some(0.8));
        assert_eq!(config.early_stopping, Some(4));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.num_train_samples, Some(1000));

        let err = SolverConfig::from_json(r#"{"num_epoch": 3}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_dataset_validation() {
        let mismatch = Dataset::new(
            Tensor::zeros(vec![3, 2]),
            vec![0, 1],
            Tensor::zeros(vec![1, 2]),
            vec![0],
        );
        assert!(matches!(
            mismatch,
            Err(Error::DatasetMismatch {
                split: "train",
                inputs: 3,
                labels: 2
            })
        ));

        let empty = Dataset::new(
            Tensor::zeros(vec![2, 2]),
            vec![0, 1],
            Tensor::zeros(vec![0, 2]),
            vec![],
        );
        assert!(matches!(empty, Err(Error::EmptySplit("validation"))));
    }
}
