//! Finite-difference gradients for tests
//!
//! Centered differences with step `h = 1e-5`, evaluated one element at a time.

use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::StandardNormal;

const H: f64 = 1e-5;

/// Standard-normal tensor from a fixed seed
pub fn random_tensor(shape: Vec<usize>, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    Tensor::sample(shape, &StandardNormal, &mut rng)
}

/// Numerical gradient of a scalar function `f` at `x`
pub fn numerical_gradient<F>(mut f: F, x: &Tensor) -> Tensor
where
    F: FnMut(&Tensor) -> f64,
{
    let mut probe = x.clone();
    let mut grad = Tensor::zeros(x.shape.clone());
    for i in 0..x.len() {
        let old = probe.data[i];
        probe.data[i] = old + H;
        let plus = f(&probe);
        probe.data[i] = old - H;
        let minus = f(&probe);
        probe.data[i] = old;
        grad.data[i] = (plus - minus) / (2.0 * H);
    }
    grad
}

/// Numerical gradient of `sum(f(x) * dout)` for an array-valued `f`
pub fn numerical_gradient_array<F>(mut f: F, x: &Tensor, dout: &Tensor) -> Tensor
where
    F: FnMut(&Tensor) -> Tensor,
{
    numerical_gradient(|x| f(x).mul(dout).sum(), x)
}

/// Largest element-wise relative error `|a - b| / max(1e-8, |a| + |b|)`
pub fn rel_error(a: &Tensor, b: &Tensor) -> f64 {
    assert_eq!(a.shape, b.shape, "rel_error shape mismatch");
    a.data
        .iter()
        .zip(&b.data)
        .map(|(&x, &y)| (x - y).abs() / (x.abs() + y.abs()).max(1e-8))
        .fold(0.0, f64::max)
}

/// Relative error of the whole tensor, `‖a - b‖ / max(1e-8, ‖a‖ + ‖b‖)`
///
/// Used for network-level checks, where individual gradient entries can be
/// arbitrarily close to zero.
pub fn norm_rel_error(a: &Tensor, b: &Tensor) -> f64 {
    assert_eq!(a.shape, b.shape, "norm_rel_error shape mismatch");
    let diff = a.sub(b).sum_squares().sqrt();
    diff / (a.sum_squares().sqrt() + b.sum_squares().sqrt()).max(1e-8)
}
