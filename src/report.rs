//! Progress Reporting
//!
//! The solver hands one [`EpochReport`] per finished epoch to a [`Reporter`].
//! Reporters only observe; nothing they do feeds back into training.
//!
//! - [`LogReporter`]: one `info!` event per epoch
//! - [`CsvReporter`]: one CSV row per epoch, flushed immediately
//!
//! ## CSV Format
//!
//! ```text
//! epoch,train_loss,train_acc,val_loss,val_acc,duration_seconds
//! 1,2.1034,0.3120,2.0541,0.3350,0.84
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use tracing::info;

/// Metrics of one epoch
#[derive(Clone, Debug, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch index
    pub epoch: usize,
    /// Mean of the step losses of this epoch
    pub train_loss: f64,
    pub train_acc: f64,
    pub val_loss: f64,
    pub val_acc: f64,
    /// Wall-clock time since the previous report
    pub duration: Duration,
}

/// Consumer of per-epoch progress
pub trait Reporter {
    fn report(&mut self, report: &EpochReport) -> Result<()>;
}

/// Emits each epoch as a structured `tracing` event
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, report: &EpochReport) -> Result<()> {
        info!(
            epoch = report.epoch,
            train_loss = format_args!("{:.4}", report.train_loss),
            train_acc = format_args!("{:.4}", report.train_acc),
            val_loss = format_args!("{:.4}", report.val_loss),
            val_acc = format_args!("{:.4}", report.val_acc),
            duration = format_args!("{:.2}s", report.duration.as_secs_f64()),
            "Epoch finished"
        );
        Ok(())
    }
}

/// Writes each epoch as a CSV row
///
/// # Example
///
/// ```rust,no_run
/// use layerwise::CsvReporter;
///
/// let _reporter = CsvReporter::create("training_log.csv")?;
/// # Ok::<(), layerwise::Error>(())
/// ```
pub struct CsvReporter {
    log_file: File,
}

impl CsvReporter {
    /// Create (or truncate) `path` and write the header row
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut log_file = File::create(path)?;
        writeln!(
            log_file,
            "epoch,train_loss,train_acc,val_loss,val_acc,duration_seconds"
        )?;
        Ok(Self { log_file })
    }
}

impl Reporter for CsvReporter {
    fn report(&mut self, report: &EpochReport) -> Result<()> {
        writeln!(
            self.log_file,
            "{},{:.4},{:.4},{:.4},{:.4},{:.2}",
            report.epoch,
            report.train_loss,
            report.train_acc,
            report.val_loss,
            report.val_acc,
            report.duration.as_secs_f64()
        )?;
        // Rows survive a crash mid-training
        self.log_file.flush()?;
        Ok(())
    }
}
