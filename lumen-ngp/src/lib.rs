//! Lumen NGP Crate
//!
//! Reference implementation of the lumen backbone contract: a
//! multiresolution hash-grid encoder feeding a small feed-forward
//! network, built on burn. Anything else implementing
//! [`lumen_field::Backbone`] can stand in for it.
//!
//! ## Modules
//!
//! - [`encoding`]: learned multiresolution hash-grid features
//! - [`mlp`]: the feed-forward network stage
//! - [`network`]: the combined backbone and its provider

pub mod encoding;
pub mod mlp;
pub mod network;

pub use encoding::HashGridEncoding;
pub use mlp::Mlp;
pub use network::{HashMlpBackbone, NgpProvider};
