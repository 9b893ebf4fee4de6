//! Softmax Cross-Entropy Loss
//!
//! ```text
//! probs = softmax(x)                         (row-wise, max-subtracted)
//! loss  = -mean_i log(probs[i, y[i]])
//! dx    = (probs - one_hot(y)) / N
//! ```
//!
//! This function always produces a gradient. Callers that only need class
//! scores at evaluation time must not call it.

use crate::tensor::Tensor;

/// Softmax loss and its gradient with respect to the scores
///
/// # Arguments
///
/// * `x` - Class scores `[N, C]`
/// * `y` - Labels, `y[i]` in `[0, C)`
///
/// # Returns
///
/// Tuple of (mean cross-entropy loss, gradient `[N, C]`)
///
/// # Panics
///
/// Panics if `y.len() != N` or a label is outside `[0, C)`
///
/// # Example
///
/// ```rust
/// # use layerwise::Tensor;
/// use layerwise::layers::softmax_loss;
///
/// let scores = Tensor::new(vec![0.0, 0.0], vec![1, 2]);
/// let (loss, dx) = softmax_loss(&scores, &[1]);
/// assert!((loss - 2f64.ln()).abs() < 1e-12);
/// assert_eq!(dx.data, vec![0.5, -0.5]);
/// ```
pub fn softmax_loss(x: &Tensor, y: &[usize]) -> (f64, Tensor) {
    let n = x.rows();
    let classes = x.row_size();
    assert_eq!(
        y.len(),
        n,
        "Expected {} labels for scores of shape {:?}, got {}",
        n,
        x.shape,
        y.len()
    );

    let mut dx = x.flatten_rows().softmax_rows();

    let mut loss = 0.0;
    for (i, &label) in y.iter().enumerate() {
        assert!(
            label < classes,
            "Label {} out of range for {} classes",
            label,
            classes
        );
        let idx = i * classes + label;
        loss -= dx.data[idx].ln();
        dx.data[idx] -= 1.0;
    }

    let n = n as f64;
    (loss / n, dx.mul_scalar(1.0 / n))
}
