//! Axis-aligned scene bounds.

use burn::prelude::*;
use glam::Vec3;

/// Errors produced while constructing [`SceneBounds`].
#[derive(Debug, thiserror::Error)]
pub enum BoundsError {
    #[error("corner slices differ in length: min has {min}, max has {max}")]
    MismatchedCorners { min: usize, max: usize },
    #[error("bounds need at least one spatial dimension")]
    Empty,
    #[error("degenerate extent on axis {axis}: min {min} >= max {max}")]
    DegenerateAxis { axis: usize, min: f32, max: f32 },
}

/// Axis-aligned bounding box of the scene: one minimum and one maximum
/// corner coordinate per spatial dimension.
///
/// Immutable once built; every field owns the bounds it was constructed
/// with. The corners live as rank-1 tensors on the device the field's
/// queries run on, ready to broadcast against point batches.
#[derive(Debug, Clone)]
pub struct SceneBounds<B: Backend> {
    min: Tensor<B, 1>,
    max: Tensor<B, 1>,
    num_dim: usize,
}

impl<B: Backend> SceneBounds<B> {
    /// Build 3-D bounds from two corner points.
    pub fn new(min: Vec3, max: Vec3, device: &B::Device) -> Result<Self, BoundsError> {
        Self::from_corners(&min.to_array(), &max.to_array(), device)
    }

    /// Build bounds of arbitrary dimension from per-axis corner slices.
    ///
    /// Fails if the slices differ in length, are empty, or any axis has
    /// `min >= max`.
    pub fn from_corners(
        min: &[f32],
        max: &[f32],
        device: &B::Device,
    ) -> Result<Self, BoundsError> {
        if min.len() != max.len() {
            return Err(BoundsError::MismatchedCorners {
                min: min.len(),
                max: max.len(),
            });
        }
        if min.is_empty() {
            return Err(BoundsError::Empty);
        }
        for (axis, (lo, hi)) in min.iter().zip(max.iter()).enumerate() {
            if lo >= hi {
                return Err(BoundsError::DegenerateAxis {
                    axis,
                    min: *lo,
                    max: *hi,
                });
            }
        }
        Ok(Self {
            min: Tensor::from_data(TensorData::new(min.to_vec(), [min.len()]), device),
            max: Tensor::from_data(TensorData::new(max.to_vec(), [max.len()]), device),
            num_dim: min.len(),
        })
    }

    /// Number of spatial dimensions.
    pub fn num_dim(&self) -> usize {
        self.num_dim
    }

    /// Minimum corner as a rank-1 tensor of length `num_dim`.
    pub fn min(&self) -> Tensor<B, 1> {
        self.min.clone()
    }

    /// Maximum corner as a rank-1 tensor of length `num_dim`.
    pub fn max(&self) -> Tensor<B, 1> {
        self.max.clone()
    }

    /// Per-axis extent, `max - min`. Strictly positive on every axis.
    pub fn extent(&self) -> Tensor<B, 1> {
        self.max.clone() - self.min.clone()
    }
}
