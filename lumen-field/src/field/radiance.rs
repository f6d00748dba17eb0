//! Full radiance field: geometry and appearance over one bounded box.

use burn::prelude::*;
use tracing::debug;

use crate::activation::{DensityActivation, StableExpBackend};
use crate::backbone::{
    Activation, Backbone, BackboneConfig, BackboneProvider, HashGridConfig, MlpConfig,
};
use crate::bounds::SceneBounds;
use crate::contraction::{normalize_to_bounds, validity_mask};

use super::FieldError;

/// Configuration for [`RadianceField`].
#[derive(Config, Debug)]
pub struct RadianceFieldConfig {
    /// Spatial dimension of the scene.
    #[config(default = 3)]
    pub num_dim: usize,
    /// Accept (and shape-check) view directions in
    /// [`RadianceField::forward`].
    #[config(default = false)]
    pub use_viewdirs: bool,
    /// Channels of the appearance output.
    #[config(default = 3)]
    pub color_channels: usize,
    /// Number of grid levels in both backbones.
    #[config(default = 16)]
    pub levels: usize,
    /// Hash table size exponent per level.
    #[config(default = 18)]
    pub log2_hashmap_size: usize,
    /// Raw-output activation for density.
    #[config(default = "DensityActivation::TruncExp { bias: 0.0 }")]
    pub activation: DensityActivation,
}

impl RadianceFieldConfig {
    /// Geometry backbone request: one raw density logit per point.
    pub fn geometry_config(&self) -> BackboneConfig {
        BackboneConfig::new(
            self.num_dim,
            1,
            HashGridConfig::new()
                .with_levels(self.levels)
                .with_log2_hashmap_size(self.log2_hashmap_size),
            MlpConfig::new(),
        )
    }

    /// Appearance backbone request: sigmoid-bounded color per point.
    pub fn appearance_config(&self) -> BackboneConfig {
        BackboneConfig::new(
            self.num_dim,
            self.color_channels,
            HashGridConfig::new()
                .with_levels(self.levels)
                .with_log2_hashmap_size(self.log2_hashmap_size),
            MlpConfig::new()
                .with_hidden_layers(2)
                .with_output_activation(Activation::Sigmoid),
        )
    }

    /// Build the field, constructing both backbones through `provider`.
    ///
    /// The provider is retained so the geometry backbone can be rebuilt
    /// later; construction fails before anything is allocated if the
    /// bounds dimension does not match or the provider rejects a request.
    pub fn init<B: StableExpBackend>(
        &self,
        bounds: SceneBounds<B>,
        provider: Box<dyn BackboneProvider<B>>,
    ) -> Result<RadianceField<B>, FieldError> {
        if bounds.num_dim() != self.num_dim {
            return Err(FieldError::DimensionMismatch {
                bounds: bounds.num_dim(),
                config: self.num_dim,
            });
        }
        let geometry = provider.build(&self.geometry_config())?;
        let appearance = provider.build(&self.appearance_config())?;
        debug!(
            "Built radiance field backbones ({} levels, {} color channels)",
            self.levels, self.color_channels
        );
        Ok(RadianceField {
            bounds,
            geometry,
            appearance,
            provider,
            activation: self.activation,
            use_viewdirs: self.use_viewdirs,
            color_channels: self.color_channels,
        })
    }
}

/// Instant-NGP-style radiance field over a bounded scene box.
///
/// Holds one geometry backbone (raw density logit) and one appearance
/// backbone (bounded color). Queries are stateless; the only mutation is
/// [`Self::reset_geometry_backbone`].
#[derive(Debug)]
pub struct RadianceField<B: Backend> {
    bounds: SceneBounds<B>,
    geometry: Box<dyn Backbone<B>>,
    appearance: Box<dyn Backbone<B>>,
    provider: Box<dyn BackboneProvider<B>>,
    activation: DensityActivation,
    use_viewdirs: bool,
    color_channels: usize,
}

impl<B: StableExpBackend> RadianceField<B> {
    /// Per-point density.
    ///
    /// Box-relative normalization only; this field does not contract
    /// unbounded scenes. Points outside the box get exactly zero density
    /// regardless of backbone output.
    pub fn query_density<const R: usize>(&self, points: Tensor<B, R>) -> Tensor<B, R> {
        let (raw, mask) = self.evaluate_masked(&*self.geometry, points, 1);
        self.activation.apply(raw) * mask.float()
    }

    /// Per-point color.
    ///
    /// The appearance backbone's own output activation bounds the color
    /// range; points outside the box are zeroed.
    pub fn query_rgb<const R: usize>(&self, points: Tensor<B, R>) -> Tensor<B, R> {
        let (raw, mask) =
            self.evaluate_masked(&*self.appearance, points, self.color_channels);
        raw * mask.float()
    }

    /// Combined `(color, density)` query.
    ///
    /// With `use_viewdirs` set, supplied directions must match the point
    /// batch shape; the two backbone queries then run independently.
    // TODO: route view directions into the appearance backbone instead of
    // dropping them after the shape check.
    pub fn forward<const R: usize>(
        &self,
        points: Tensor<B, R>,
        directions: Option<&Tensor<B, R>>,
    ) -> Result<(Tensor<B, R>, Tensor<B, R>), FieldError> {
        if self.use_viewdirs {
            if let Some(directions) = directions {
                if directions.dims() != points.dims() {
                    return Err(FieldError::ShapeMismatch {
                        points: points.dims().to_vec(),
                        directions: directions.dims().to_vec(),
                    });
                }
            }
        }
        let density = self.query_density(points.clone());
        let color = self.query_rgb(points);
        Ok((color, density))
    }

    /// Rebuild the geometry backbone from the fixed default
    /// hyperparameters, leaving the appearance backbone and every other
    /// part of the field untouched.
    ///
    /// Used to reinitialize geometry between training phases. The
    /// exclusive borrow means no query can run concurrently with a reset.
    pub fn reset_geometry_backbone(&mut self) -> Result<(), FieldError> {
        let config = RadianceFieldConfig::new().geometry_config();
        self.geometry = self.provider.build(&config)?;
        debug!("Reset geometry backbone to default configuration");
        Ok(())
    }

    /// Bounds the field was built with.
    pub fn bounds(&self) -> &SceneBounds<B> {
        &self.bounds
    }

    /// Normalize, evaluate one backbone on the flattened batch, and
    /// reshape back; the mask is returned alongside so callers apply it
    /// after their own activation.
    fn evaluate_masked<const R: usize>(
        &self,
        backbone: &dyn Backbone<B>,
        points: Tensor<B, R>,
        channels: usize,
    ) -> (Tensor<B, R>, Tensor<B, R, Bool>) {
        let normalized = normalize_to_bounds(points, &self.bounds);
        let mask = validity_mask(&normalized);

        let mut dims = normalized.dims();
        let flat = normalized.reshape([-1, self.bounds.num_dim() as i32]);
        let raw = backbone.evaluate(flat);
        dims[R - 1] = channels;
        (raw.reshape(dims), mask)
    }
}
