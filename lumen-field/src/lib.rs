//! Lumen Field Crate
//!
//! Core of the lumen radiance field: the deterministic geometric and
//! numeric transformations around an injectable neural backbone. This
//! crate knows nothing about any concrete encoder or network; it defines
//! the contract (`Backbone` / `BackboneProvider`) and everything wrapped
//! around it.
//!
//! ## Modules
//!
//! - [`bounds`]: axis-aligned scene bounds
//! - [`contraction`]: box normalization, unisphere contraction and its
//!   analytic derivative, validity masking
//! - [`activation`]: the overflow-guarded exponential and density
//!   activation strategies
//! - [`backbone`]: the encoder+network contract and its configuration
//! - [`field`]: the radiance field and the lightweight density field

pub mod activation;
pub mod backbone;
pub mod bounds;
pub mod contraction;
pub mod field;

pub use activation::{DensityActivation, StableExpBackend, trunc_exp};
pub use backbone::{
    Activation, Backbone, BackboneConfig, BackboneError, BackboneProvider,
    HashGridConfig, MlpConfig,
};
pub use bounds::{BoundsError, SceneBounds};
pub use contraction::{
    DEFAULT_DERIVATIVE_EPS, contract_to_unisphere, contract_to_unisphere_derivative,
    normalize_to_bounds, validity_mask,
};
pub use field::{
    DensityField, DensityFieldConfig, FieldError, RadianceField, RadianceFieldConfig,
};
