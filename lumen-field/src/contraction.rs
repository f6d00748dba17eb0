//! Coordinate normalization and unbounded-scene contraction.
//!
//! Hash-grid encoders only see `[0, 1]^D`. Bounded scenes get there with a
//! plain box normalization; unbounded scenes are first warped so that the
//! infinite exterior of the unit ball lands in the radius-`[1, 2]` annulus,
//! then rescaled. The last tensor axis is always the spatial dimension;
//! any leading batch shape is accepted.

use burn::prelude::*;

use crate::bounds::SceneBounds;

/// Lower clamp for [`contract_to_unisphere_derivative`], keeping the local
/// scale factor strictly positive under floating-point cancellation.
pub const DEFAULT_DERIVATIVE_EPS: f32 = 1e-6;

/// Map points into box-relative coordinates, `(x - min) / (max - min)`.
///
/// Points inside the bounds land in `[0, 1]^D`; everything else falls
/// outside that range and will be rejected by [`validity_mask`].
pub fn normalize_to_bounds<B: Backend, const R: usize>(
    points: Tensor<B, R>,
    bounds: &SceneBounds<B>,
) -> Tensor<B, R> {
    let min = bounds.min().unsqueeze::<R>();
    let extent = bounds.extent().unsqueeze::<R>();
    (points - min) / extent
}

/// Contract unbounded scene coordinates into `[0, 1]^D`.
///
/// Points are first normalized so the bounds map to `[-1, 1]^D`. Points
/// with magnitude `m <= 1` are left as-is; the exterior is warped to
/// `(2 - 1/m) * (x/m)`, which preserves direction and maps `m` into
/// `(1, 2)`. The combined `[-2, 2]` range is then rescaled into `[0, 1]`,
/// so arbitrarily distant points still produce a valid encoder input.
pub fn contract_to_unisphere<B: Backend, const R: usize>(
    points: Tensor<B, R>,
    bounds: &SceneBounds<B>,
) -> Tensor<B, R> {
    let x = normalize_to_bounds(points, bounds)
        .mul_scalar(2.0)
        .sub_scalar(1.0);
    let mag = magnitude(&x);
    let outside = mag.clone().greater_elem(1.0);

    // Reciprocals only ever see m >= 1, so the origin cannot divide by zero.
    let safe = mag.clone().clamp_min(1.0);
    let warp = safe.clone().recip().neg().add_scalar(2.0).div(safe);
    let scale = mag.ones_like().mask_where(outside, warp);

    (x * scale).div_scalar(4.0).add_scalar(0.5)
}

/// Per-axis derivative of the unisphere warp, for density corrections
/// under the change of variables.
///
/// Outside the unit ball this is
/// `(2m - 1)/m^2 + 2x^2 (1/m^3 - (2m - 1)/m^4)` per axis; inside, the warp
/// is the identity and the derivative is `1`. The result is clamped below
/// at `eps` (see [`DEFAULT_DERIVATIVE_EPS`]).
pub fn contract_to_unisphere_derivative<B: Backend, const R: usize>(
    points: Tensor<B, R>,
    bounds: &SceneBounds<B>,
    eps: f32,
) -> Tensor<B, R> {
    let x = normalize_to_bounds(points, bounds)
        .mul_scalar(2.0)
        .sub_scalar(1.0);
    let mag = magnitude(&x);
    let outside = mag.clone().greater_elem(1.0).float();

    let m = mag.clamp_min(1.0);
    let m2 = m.clone().powf_scalar(2.0);
    let m3 = m.clone().powf_scalar(3.0);
    let m4 = m.clone().powf_scalar(4.0);
    let lead = m.mul_scalar(2.0).sub_scalar(1.0);

    let dev = lead.clone().div(m2)
        + x.powf_scalar(2.0).mul_scalar(2.0) * (m3.recip() - lead.div(m4));
    let dev = dev * outside.clone() + outside.neg().add_scalar(1.0);
    dev.clamp_min(eps)
}

/// One boolean per point: true iff the normalized coordinate lies strictly
/// inside `(0, 1)` on every axis. The trailing axis has size 1 so the mask
/// broadcasts over output channels.
pub fn validity_mask<B: Backend, const R: usize>(
    normalized: &Tensor<B, R>,
) -> Tensor<B, R, Bool> {
    // strictly inside (0, 1) per axis: |x - 0.5| < 0.5
    normalized
        .clone()
        .sub_scalar(0.5)
        .abs()
        .lower_elem(0.5)
        .all_dim(R - 1)
}

/// Euclidean magnitude along the last axis, kept as a size-1 dimension.
fn magnitude<B: Backend, const R: usize>(x: &Tensor<B, R>) -> Tensor<B, R> {
    x.clone().powf_scalar(2.0).sum_dim(R - 1).sqrt()
}
