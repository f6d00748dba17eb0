//! Lightweight density-only field for occupancy resampling.

use burn::prelude::*;
use tracing::debug;

use crate::activation::{DensityActivation, StableExpBackend};
use crate::backbone::{Backbone, BackboneConfig, BackboneProvider, HashGridConfig, MlpConfig};
use crate::bounds::SceneBounds;
use crate::contraction::{contract_to_unisphere, normalize_to_bounds, validity_mask};

use super::FieldError;

/// Configuration for [`DensityField`].
///
/// The defaults describe a coarse grid (5 levels up to resolution 128)
/// that is cheap enough to query densely during occupancy resampling.
#[derive(Config, Debug)]
pub struct DensityFieldConfig {
    /// Spatial dimension of the scene.
    #[config(default = 3)]
    pub num_dim: usize,
    /// Contract the infinite exterior of the scene into the encoder range
    /// instead of clipping at the bounds.
    #[config(default = false)]
    pub unbounded: bool,
    /// Coarsest grid resolution.
    #[config(default = 16)]
    pub base_resolution: usize,
    /// Finest grid resolution.
    #[config(default = 128)]
    pub max_resolution: usize,
    /// Number of grid levels.
    #[config(default = 5)]
    pub levels: usize,
    /// Hash table size exponent per level.
    #[config(default = 17)]
    pub log2_hashmap_size: usize,
    /// Raw-output activation; the bias keeps freshly initialized networks
    /// near-empty.
    #[config(default = "DensityActivation::TruncExp { bias: 1.0 }")]
    pub activation: DensityActivation,
}

impl DensityFieldConfig {
    /// Backbone configuration this field requests from its provider.
    pub fn backbone_config(&self) -> BackboneConfig {
        BackboneConfig::new(
            self.num_dim,
            1,
            HashGridConfig::geometric(self.base_resolution, self.max_resolution, self.levels)
                .with_log2_hashmap_size(self.log2_hashmap_size),
            MlpConfig::new(),
        )
    }

    /// Build the field, constructing its backbone through `provider`.
    ///
    /// Fails before constructing anything if the bounds dimension does
    /// not match the configuration or the provider rejects the backbone
    /// request.
    pub fn init<B: StableExpBackend>(
        &self,
        bounds: SceneBounds<B>,
        provider: &dyn BackboneProvider<B>,
    ) -> Result<DensityField<B>, FieldError> {
        if bounds.num_dim() != self.num_dim {
            return Err(FieldError::DimensionMismatch {
                bounds: bounds.num_dim(),
                config: self.num_dim,
            });
        }
        let backbone = provider.build(&self.backbone_config())?;
        debug!(
            "Built density field backbone ({} levels, unbounded: {})",
            self.levels, self.unbounded
        );
        Ok(DensityField {
            bounds,
            backbone,
            activation: self.activation,
            unbounded: self.unbounded,
        })
    }
}

/// Density-only field used for auxiliary occupancy and resampling
/// queries.
#[derive(Debug)]
pub struct DensityField<B: Backend> {
    bounds: SceneBounds<B>,
    backbone: Box<dyn Backbone<B>>,
    activation: DensityActivation,
    unbounded: bool,
}

impl<B: StableExpBackend> DensityField<B> {
    /// Per-point density for an arbitrary batch of points.
    ///
    /// Points whose (possibly contracted) normalized coordinate falls
    /// outside the open unit cube get exactly zero density regardless of
    /// backbone output. The result keeps the batch shape of `points` with
    /// the spatial axis replaced by a single channel.
    pub fn evaluate_density<const R: usize>(&self, points: Tensor<B, R>) -> Tensor<B, R> {
        let normalized = if self.unbounded {
            contract_to_unisphere(points, &self.bounds)
        } else {
            normalize_to_bounds(points, &self.bounds)
        };
        let mask = validity_mask(&normalized);

        let mut dims = normalized.dims();
        let flat = normalized.reshape([-1, self.bounds.num_dim() as i32]);
        let raw = self.backbone.evaluate(flat);
        dims[R - 1] = 1;
        let raw = raw.reshape(dims);

        self.activation.apply(raw) * mask.float()
    }

    /// Whether exterior points are contracted rather than clipped.
    pub fn unbounded(&self) -> bool {
        self.unbounded
    }

    /// Bounds the field was built with.
    pub fn bounds(&self) -> &SceneBounds<B> {
        &self.bounds
    }
}
