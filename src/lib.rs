//! # pixbridge
//!
//! Application layer around [`pixbridge_core`]: configuration, logging and a
//! simulation that drives the capture and display halves from two
//! independently timed tokio tasks.
//!
//! - **`config`**: Figment-based loading of `config/pixbridge.toml` with
//!   `PIXBRIDGE_` environment overrides, plus validation.
//! - **`error`**: The `BridgeError` enum returned by this crate.
//! - **`tracing_init`**: `tracing-subscriber` setup driven by the config.
//! - **`source`**: Raster test pattern with blanking and per-frame tags.
//! - **`simulation`**: The two clock domains and their final report.

pub mod config;
pub mod error;
pub mod simulation;
pub mod source;
pub mod tracing_init;
