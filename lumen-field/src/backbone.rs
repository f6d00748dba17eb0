//! The encoder+network backbone contract.
//!
//! Fields never talk to a concrete neural backend; they hold a boxed
//! [`Backbone`] built by an injected [`BackboneProvider`]. The
//! configuration structs here enumerate everything a provider needs:
//! a multiresolution hash-grid encoding and a small feed-forward network.

use burn::prelude::*;
use burn::tensor::activation;
use serde::{Deserialize, Serialize};

/// Errors surfaced while constructing a backbone.
#[derive(Debug, thiserror::Error)]
pub enum BackboneError {
    #[error("invalid backbone configuration: {0}")]
    InvalidConfig(String),
    #[error("neural backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// An opaque encoder+network: a differentiable map from an
/// `N × input_dim` batch to an `N × output_dim` batch.
pub trait Backbone<B: Backend>: core::fmt::Debug + Send {
    /// Evaluate one flattened point batch.
    fn evaluate(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Capability to construct [`Backbone`]s from a configuration.
///
/// Construction is the only point where a neural backend can turn out to
/// be unavailable; implementations must fail loudly here rather than hand
/// back a partially constructed backbone.
pub trait BackboneProvider<B: Backend>: core::fmt::Debug + Send {
    fn build(
        &self,
        config: &BackboneConfig,
    ) -> Result<Box<dyn Backbone<B>>, BackboneError>;
}

/// Multiresolution hash-grid encoding parameters.
#[derive(Config, Debug)]
pub struct HashGridConfig {
    /// Number of resolution levels.
    #[config(default = 16)]
    pub levels: usize,
    /// Feature channels stored per level.
    #[config(default = 2)]
    pub features_per_level: usize,
    /// Each level's hash table holds `2^log2_hashmap_size` entries.
    #[config(default = 18)]
    pub log2_hashmap_size: usize,
    /// Grid resolution of the coarsest level.
    #[config(default = 16)]
    pub base_resolution: usize,
    /// Per-level geometric resolution growth.
    #[config(default = 1.4472692012786865)]
    pub growth_factor: f64,
}

impl HashGridConfig {
    /// Derive the growth factor geometrically so that `levels` levels span
    /// `base_resolution..=max_resolution`.
    pub fn geometric(
        base_resolution: usize,
        max_resolution: usize,
        levels: usize,
    ) -> Self {
        let growth = if levels > 1 {
            (((max_resolution as f64).ln() - (base_resolution as f64).ln())
                / (levels as f64 - 1.0))
                .exp()
        } else {
            1.0
        };
        Self::new()
            .with_levels(levels)
            .with_base_resolution(base_resolution)
            .with_growth_factor(growth)
    }

    /// Feature width of the encoder output.
    pub fn output_dim(&self) -> usize {
        self.levels * self.features_per_level
    }

    /// Grid resolution at `level`.
    pub fn resolution(&self, level: usize) -> usize {
        (self.base_resolution as f64 * self.growth_factor.powi(level as i32)).round()
            as usize
    }

    /// Number of entries in each level's hash table.
    pub fn table_size(&self) -> usize {
        1 << self.log2_hashmap_size
    }

    /// Check the configuration before any allocation happens.
    pub fn validate(&self) -> Result<(), BackboneError> {
        if self.levels == 0 {
            return Err(BackboneError::InvalidConfig(
                "hash grid needs at least one level".into(),
            ));
        }
        if self.features_per_level == 0 {
            return Err(BackboneError::InvalidConfig(
                "features_per_level must be positive".into(),
            ));
        }
        if self.log2_hashmap_size == 0 || self.log2_hashmap_size > 30 {
            return Err(BackboneError::InvalidConfig(format!(
                "log2_hashmap_size {} outside supported range 1..=30",
                self.log2_hashmap_size
            )));
        }
        if self.base_resolution == 0 {
            return Err(BackboneError::InvalidConfig(
                "base_resolution must be positive".into(),
            ));
        }
        if self.growth_factor < 1.0 {
            return Err(BackboneError::InvalidConfig(format!(
                "growth_factor {} must be >= 1",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// Feed-forward network parameters.
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Width of each hidden layer.
    #[config(default = 64)]
    pub hidden_size: usize,
    /// Number of hidden layers between input and output.
    #[config(default = 1)]
    pub hidden_layers: usize,
    /// Activation between hidden layers.
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    /// Activation on the final layer's output.
    #[config(default = "Activation::Identity")]
    pub output_activation: Activation,
}

impl MlpConfig {
    /// Check the configuration before any allocation happens.
    pub fn validate(&self) -> Result<(), BackboneError> {
        if self.hidden_size == 0 {
            return Err(BackboneError::InvalidConfig(
                "hidden_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a [`BackboneProvider`] needs to build one backbone.
#[derive(Config, Debug)]
pub struct BackboneConfig {
    /// Spatial dimension of the encoder input.
    pub input_dim: usize,
    /// Channel count of the network output.
    pub output_dim: usize,
    /// Encoder parameters.
    pub encoding: HashGridConfig,
    /// Network parameters.
    pub network: MlpConfig,
}

impl BackboneConfig {
    /// Check the configuration before any allocation happens.
    pub fn validate(&self) -> Result<(), BackboneError> {
        if self.input_dim == 0 {
            return Err(BackboneError::InvalidConfig(
                "input_dim must be positive".into(),
            ));
        }
        if self.output_dim == 0 {
            return Err(BackboneError::InvalidConfig(
                "output_dim must be positive".into(),
            ));
        }
        self.encoding.validate()?;
        self.network.validate()
    }
}

/// Pointwise nonlinearities the network config can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Pass-through.
    Identity,
    Relu,
    Sigmoid,
}

impl Activation {
    /// Apply the nonlinearity elementwise.
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Identity => x,
            Self::Relu => activation::relu(x),
            Self::Sigmoid => activation::sigmoid(x),
        }
    }
}
