//! Festival playlist builder - shared modules for all binaries.

pub mod allocate;
pub mod catalog;
pub mod error;
pub mod lineup;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod safety;
pub mod scoring;
pub mod spotify;
