//! Field abstractions over the backbone contract.
//!
//! Both fields are stateless request/response objects: every query is
//! independent, nothing is retained between calls, and the only mutation
//! anywhere is [`RadianceField::reset_geometry_backbone`].

pub mod density;
pub mod radiance;

pub use density::{DensityField, DensityFieldConfig};
pub use radiance::{RadianceField, RadianceFieldConfig};

use crate::backbone::BackboneError;

/// Errors produced by field construction and queries.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error(
        "direction batch shape {directions:?} does not match point batch shape {points:?}"
    )]
    ShapeMismatch {
        points: Vec<usize>,
        directions: Vec<usize>,
    },
    #[error("scene bounds have {bounds} dimensions but the field is configured for {config}")]
    DimensionMismatch { bounds: usize, config: usize },
    #[error(transparent)]
    Backbone(#[from] BackboneError),
}
