//! # petjo_core
//!
//! Core authentication and session logic for PetJo.

pub mod auth;
pub mod cache;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
