//! Custom error types for the application.
//!
//! `BridgeError` is the single error type returned by the application layer.
//! Runtime conditions inside the transport core (overflow, underflow,
//! out-of-range coordinates) never surface here: they are counted by the core
//! and reported in the simulation summary. What remains are startup and
//! orchestration failures.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps `figment` errors, typically TOML syntax problems or
//!   environment overrides that do not deserialize.
//! - **`Configuration`**: Semantic errors that pass parsing but are logically
//!   wrong (e.g. a queue capacity that is not a power of two). Caught by
//!   `BridgeConfig::validate`.
//! - **`Core`**: The transport core rejected its construction parameters.
//! - **`Simulation`**: A clock-domain task failed or panicked.
//!
//! With `#[from]`, every source converts through `?`.

use pixbridge_core::CoreError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, BridgeError>;

/// Primary error type for the pixbridge application.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The transport core rejected its parameters.
    #[error("Transport core error: {0}")]
    Core(#[from] CoreError),

    /// A simulated clock domain failed.
    #[error("Simulation error: {0}")]
    Simulation(String),
}

impl From<figment::Error> for BridgeError {
    fn from(err: figment::Error) -> Self {
        BridgeError::Config(Box::new(err))
    }
}

impl BridgeError {
    /// True for errors fixed by editing the configuration and restarting.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BridgeError::Config(_) | BridgeError::Configuration(_) | BridgeError::Core(_)
        )
    }
}
