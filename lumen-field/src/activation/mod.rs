//! Density activations and the overflow-guarded exponential.

mod trunc_exp;

pub use trunc_exp::{BACKWARD_INPUT_CLAMP, StableExpBackend};

use burn::prelude::*;
use burn::tensor::TensorPrimitive;
use burn::tensor::activation::softplus;
use serde::{Deserialize, Serialize};

/// Elementwise `exp` whose backward pass multiplies the incoming gradient
/// by `exp(clamp(x, max = 15))` instead of `exp(x)`.
///
/// The forward value stays exact `exp(x)` and may overflow to infinity
/// for very large inputs; only the gradient is guarded, so the chain rule
/// cannot explode where the forward saturates. The input tensor is
/// retained across the forward/backward boundary by the autodiff backend.
///
/// Backends evaluate the op in their configured float element type; burn
/// has no ambient autocast that could re-run it at reduced precision.
pub fn trunc_exp<B: StableExpBackend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    Tensor::from_primitive(TensorPrimitive::Float(B::trunc_exp(
        x.into_primitive().tensor(),
    )))
}

/// Strategy turning raw backbone output into non-negative density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DensityActivation {
    /// `trunc_exp(raw - bias)`. A positive bias makes freshly initialized
    /// networks start near-empty.
    TruncExp { bias: f32 },
    /// `softplus(raw - bias)`, a saturating alternative.
    Softplus { bias: f32 },
}

impl DensityActivation {
    /// Apply the activation elementwise.
    pub fn apply<B: StableExpBackend, const D: usize>(
        &self,
        raw: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Self::TruncExp { bias } => trunc_exp(raw.sub_scalar(*bias)),
            Self::Softplus { bias } => softplus(raw.sub_scalar(*bias), 1.0),
        }
    }
}

impl Default for DensityActivation {
    fn default() -> Self {
        Self::TruncExp { bias: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;
    type AD = burn::backend::Autodiff<B>;

    #[test]
    fn test_trunc_exp_forward_at_zero() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([0.0], &device);
        assert_eq!(trunc_exp(x).into_scalar(), 1.0);
    }

    #[test]
    fn test_trunc_exp_forward_is_exact_exp() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([-2.0, 0.5, 3.0], &device);
        let y = trunc_exp(x).into_data().to_vec::<f32>().unwrap();

        for (value, input) in y.iter().zip([-2.0f32, 0.5, 3.0]) {
            assert!((value - input.exp()).abs() / input.exp() < 1e-6);
        }
    }

    #[test]
    fn test_trunc_exp_forward_may_overflow() {
        // Only the gradient is clamped; the forward pass is allowed to
        // saturate to infinity.
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([100.0], &device);
        assert!(trunc_exp(x).into_scalar().is_infinite());
    }

    #[test]
    fn test_trunc_exp_gradient_unclamped_below_threshold() {
        let device = Default::default();
        let x = Tensor::<AD, 1>::from_floats([1.0], &device).require_grad();

        let grads = trunc_exp(x.clone()).sum().backward();
        let g = x.grad(&grads).unwrap().into_scalar();

        assert!((g - 1f32.exp()).abs() / 1f32.exp() < 1e-6);
    }

    #[test]
    fn test_trunc_exp_gradient_clamps_large_inputs() {
        let device = Default::default();
        let x = Tensor::<AD, 1>::from_floats([100.0], &device).require_grad();

        let grads = trunc_exp(x.clone()).sum().backward();
        let g = x.grad(&grads).unwrap().into_scalar();

        // exp(100) would overflow; the backward pass sees exp(15) instead.
        let expected = BACKWARD_INPUT_CLAMP.exp();
        assert!(g.is_finite());
        assert!((g - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_trunc_exp_gradient_scales_with_upstream() {
        let device = Default::default();
        let x = Tensor::<AD, 1>::from_floats([0.0], &device).require_grad();

        let grads = trunc_exp(x.clone()).mul_scalar(3.0).sum().backward();
        let g = x.grad(&grads).unwrap().into_scalar();

        assert!((g - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_density_activation_bias_shifts_input() {
        let device = Default::default();
        let raw = Tensor::<B, 2>::from_floats([[1.0]], &device);

        let activation = DensityActivation::TruncExp { bias: 1.0 };
        assert_eq!(activation.apply(raw).into_scalar(), 1.0);
    }

    #[test]
    fn test_density_activation_softplus_is_positive() {
        let device = Default::default();
        let raw = Tensor::<B, 2>::from_floats([[-5.0], [0.0], [5.0]], &device);

        let out = DensityActivation::Softplus { bias: 0.0 }
            .apply(raw)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        for v in out {
            assert!(v > 0.0);
        }
    }
}
