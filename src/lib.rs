#![deny(missing_docs)]

//! Core library for Stylemine, a transcript style miner.

/// Environment-driven configuration management.
pub mod config;
/// Generation providers, prompt templates, and the analysis capability.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Run metrics helpers.
pub mod metrics;
/// Block segmentation and map-reduce style mining.
pub mod mining;
/// Style context derived from a stylebook.
pub mod style_context;
