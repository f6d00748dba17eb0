//! The combined backbone and its provider.

use burn::prelude::*;
use tracing::debug;

use lumen_field::{Backbone, BackboneConfig, BackboneError, BackboneProvider};

use crate::encoding::{HashGridEncoding, MAX_INPUT_DIM};
use crate::mlp::Mlp;

/// Hash-grid encoder feeding a feed-forward network; the reference
/// implementation of the lumen backbone contract.
#[derive(Module, Debug)]
pub struct HashMlpBackbone<B: Backend> {
    encoding: HashGridEncoding<B>,
    network: Mlp<B>,
}

impl<B: Backend> HashMlpBackbone<B> {
    /// Validate `config`, then allocate the backbone on `device`.
    ///
    /// Nothing is allocated for a configuration that fails validation.
    pub fn new(config: &BackboneConfig, device: &B::Device) -> Result<Self, BackboneError> {
        config.validate()?;
        if config.input_dim > MAX_INPUT_DIM {
            return Err(BackboneError::InvalidConfig(format!(
                "hash encoding supports up to {MAX_INPUT_DIM} input dimensions, got {}",
                config.input_dim
            )));
        }

        let encoding = HashGridEncoding::new(&config.encoding, config.input_dim, device);
        let network = Mlp::new(
            &config.network,
            encoding.output_dim(),
            config.output_dim,
            device,
        );
        debug!(
            "Allocated hash+MLP backbone: {} -> {} -> {}",
            config.input_dim,
            encoding.output_dim(),
            config.output_dim
        );
        Ok(Self { encoding, network })
    }

    /// Encode then predict, `[N, input_dim]` to `[N, output_dim]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.network.forward(self.encoding.forward(input))
    }
}

impl<B: Backend> Backbone<B> for HashMlpBackbone<B> {
    fn evaluate(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

/// [`BackboneProvider`] handing out freshly initialized
/// [`HashMlpBackbone`]s on one device.
#[derive(Debug, Clone)]
pub struct NgpProvider<B: Backend> {
    device: B::Device,
}

impl<B: Backend> NgpProvider<B> {
    /// Provider building backbones on `device`.
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> BackboneProvider<B> for NgpProvider<B> {
    fn build(
        &self,
        config: &BackboneConfig,
    ) -> Result<Box<dyn Backbone<B>>, BackboneError> {
        Ok(Box::new(HashMlpBackbone::new(config, &self.device)?))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use lumen_field::{
        DensityFieldConfig, FieldError, HashGridConfig, MlpConfig, RadianceFieldConfig,
        SceneBounds,
    };

    use super::*;

    type B = burn::backend::NdArray;

    fn small_backbone_config(output_dim: usize) -> BackboneConfig {
        BackboneConfig::new(
            3,
            output_dim,
            HashGridConfig::new()
                .with_levels(4)
                .with_log2_hashmap_size(10),
            MlpConfig::new().with_hidden_size(16),
        )
    }

    fn unit_bounds() -> SceneBounds<B> {
        let device = Default::default();
        SceneBounds::new(Vec3::splat(-1.0), Vec3::splat(1.0), &device).unwrap()
    }

    #[test]
    fn test_backbone_shape_contract() {
        let device = Default::default();
        let backbone =
            HashMlpBackbone::<B>::new(&small_backbone_config(1), &device).unwrap();

        let input = Tensor::<B, 2>::from_floats(
            [[0.5, 0.5, 0.5], [0.1, 0.9, 0.3]],
            &device,
        );
        assert_eq!(backbone.evaluate(input).dims(), [2, 1]);
    }

    #[test]
    fn test_provider_rejects_invalid_config() {
        let provider = NgpProvider::<B>::new(Default::default());

        let mut config = small_backbone_config(1);
        config.encoding.levels = 0;
        assert!(matches!(
            provider.build(&config),
            Err(BackboneError::InvalidConfig(_))
        ));

        let config = BackboneConfig::new(
            8,
            1,
            HashGridConfig::new(),
            MlpConfig::new(),
        );
        assert!(matches!(
            provider.build(&config),
            Err(BackboneError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_radiance_field_end_to_end() {
        let device = Default::default();
        let field = RadianceFieldConfig::new()
            .with_levels(4)
            .with_log2_hashmap_size(10)
            .init(unit_bounds(), Box::new(NgpProvider::<B>::new(device)))
            .unwrap();

        let device = Default::default();
        let points =
            Tensor::<B, 2>::from_floats([[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]], &device);
        let (color, density) = field.forward(points, None).unwrap();

        assert_eq!(color.dims(), [2, 3]);
        assert_eq!(density.dims(), [2, 1]);

        let color = color.into_data().to_vec::<f32>().unwrap();
        let density = density.into_data().to_vec::<f32>().unwrap();

        // Inside the box: positive density, sigmoid-bounded color.
        assert!(density[0] > 0.0);
        for channel in &color[0..3] {
            assert!((0.0..=1.0).contains(channel));
        }
        // Outside: masked to exactly zero, whatever the network says.
        assert_eq!(density[1], 0.0);
        assert_eq!(&color[3..6], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_radiance_field_rejects_mismatched_directions() {
        let device = Default::default();
        let field = RadianceFieldConfig::new()
            .with_levels(4)
            .with_log2_hashmap_size(10)
            .with_use_viewdirs(true)
            .init(unit_bounds(), Box::new(NgpProvider::<B>::new(device)))
            .unwrap();

        let device = Default::default();
        let points = Tensor::<B, 2>::zeros([4, 3], &device);
        let directions = Tensor::<B, 2>::zeros([2, 3], &device);

        assert!(matches!(
            field.forward(points, Some(&directions)),
            Err(FieldError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_reset_geometry_reinitializes_parameters() {
        let device = Default::default();
        let mut field = RadianceFieldConfig::new()
            .with_levels(4)
            .with_log2_hashmap_size(10)
            .init(unit_bounds(), Box::new(NgpProvider::<B>::new(device)))
            .unwrap();

        let device = Default::default();
        let points = Tensor::<B, 2>::from_floats(
            [[0.2, -0.3, 0.4], [-0.6, 0.1, 0.0]],
            &device,
        );

        let before = field
            .query_density(points.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        field.reset_geometry_backbone().unwrap();
        let after = field.query_density(points.clone());

        // Same output contract, fresh parameters.
        assert_eq!(after.dims(), [2, 1]);
        assert_ne!(before, after.into_data().to_vec::<f32>().unwrap());
    }

    #[test]
    fn test_unbounded_density_field_covers_distant_points() {
        let device = Default::default();
        let provider = NgpProvider::<B>::new(device);
        let field = DensityFieldConfig::new()
            .with_unbounded(true)
            .init(unit_bounds(), &provider)
            .unwrap();

        let device = Default::default();
        let points = Tensor::<B, 2>::from_floats(
            [[10.0, 0.0, 0.0], [-300.0, 150.0, 2.0]],
            &device,
        );
        let density = field
            .evaluate_density(points)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        // Contraction maps arbitrarily distant points into the valid
        // range, so the activation output survives the mask.
        for v in density {
            assert!(v > 0.0);
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_bounded_density_field_masks_distant_points() {
        let device = Default::default();
        let provider = NgpProvider::<B>::new(device);
        let field = DensityFieldConfig::new().init(unit_bounds(), &provider).unwrap();

        let device = Default::default();
        let points = Tensor::<B, 2>::from_floats([[10.0, 0.0, 0.0]], &device);
        let density = field
            .evaluate_density(points)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(density[0], 0.0);
    }
}
