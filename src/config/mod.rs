//! Predictor Configuration Module
//!
//! Provides service configuration loaded from TOML files, replacing the
//! hardcoded window sizes, fallback dates and default coefficients with
//! operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `MDI_PREDICTOR_CONFIG` environment variable (path to TOML file)
//! 2. `predictor_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded config is handed to [`crate::pipeline::AppContext`] at startup
//! and passed by reference from there.

mod predictor_config;
pub mod defaults;

pub use predictor_config::*;
