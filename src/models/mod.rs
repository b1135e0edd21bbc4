//! Data models for the storefront order layer.
//!
//! Field names serialize in camelCase to match the storefront's JSON.

mod basket;
mod order;
mod sync;

pub use basket::*;
pub use order::*;
pub use sync::*;
