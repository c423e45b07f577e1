//! Configuration system using Figment.
//!
//! Configuration is loaded from:
//! 1. `config/pixbridge.toml` (or an explicit path)
//! 2. Environment variables prefixed with `PIXBRIDGE_`, nested with `__`
//!
//! Every section has defaults, so an empty or missing file yields a usable
//! configuration.
//!
//! # Example
//! ```no_run
//! use pixbridge::config::BridgeConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // PIXBRIDGE_QUEUE__CAPACITY=4096 overrides [queue] capacity
//! let config = BridgeConfig::load()?;
//! config.validate()?;
//! println!("{}x{}", config.frame.width, config.frame.height);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pixbridge_core::{BridgeSettings, FrameFormat, MAX_SYNC_STAGES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, BridgeError};
use crate::source::MIN_TAGGED_PIXEL_BITS;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/pixbridge.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PIXBRIDGE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Logging settings
    pub application: ApplicationConfig,
    /// Cross-domain queue settings
    pub queue: QueueConfig,
    /// Stored frame format (after decimation)
    pub frame: FrameConfig,
    /// Input subsampling
    pub decimation: DecimationConfig,
    /// Clocked simulation settings
    pub simulation: SimulationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Pixel queue slots (power of two)
    pub capacity: usize,
    /// Frame-ready token slots (power of two)
    pub frame_ready_capacity: usize,
    /// Synchronizer depth for every cross-domain observation
    pub sync_stages: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            frame_ready_capacity: 4,
            sync_stages: 2,
        }
    }
}

/// Frame format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Stored width in pixels
    pub width: u32,
    /// Stored height in pixels
    pub height: u32,
    /// Significant bits per pixel (1-16)
    pub pixel_bits: u8,
    /// Value read back outside the frame
    pub blank: u16,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            pixel_bits: 16,
            blank: 0,
        }
    }
}

/// Decimation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    /// Subsampling factor in each axis
    pub factor: u32,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self { factor: 2 }
    }
}

/// Simulation configuration.
///
/// Each domain wakes on its own period and runs a burst of steps, so the two
/// effective step rates are unrelated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Frames to publish before stopping
    pub frames: u64,
    /// Producer wake-up period in microseconds
    pub producer_period_us: u64,
    /// Producer steps per wake-up
    pub producer_steps: u32,
    /// Consumer wake-up period in microseconds
    pub consumer_period_us: u64,
    /// Consumer steps per wake-up
    pub consumer_steps: u32,
    /// Blanking lines between frames, during which the boundary level is high
    pub vblank_lines: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frames: 5,
            producer_period_us: 1_000,
            producer_steps: 4_096,
            consumer_period_us: 2_700,
            consumer_steps: 2_048,
            vblank_lines: 4,
        }
    }
}

impl SimulationConfig {
    /// Producer wake-up period
    #[must_use]
    pub fn producer_period(&self) -> Duration {
        Duration::from_micros(self.producer_period_us)
    }

    /// Consumer wake-up period
    #[must_use]
    pub fn consumer_period(&self) -> Duration {
        Duration::from_micros(self.consumer_period_us)
    }
}

impl BridgeConfig {
    /// Load configuration from `config/pixbridge.toml` and environment variables
    ///
    /// Environment variables override the file, e.g.
    /// `PIXBRIDGE_APPLICATION__LOG_LEVEL=debug`.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// Provider chain: defaults, then file, then environment.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(BridgeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(BridgeError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(BridgeError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        for (name, capacity) in [
            ("queue.capacity", self.queue.capacity),
            ("queue.frame_ready_capacity", self.queue.frame_ready_capacity),
        ] {
            if !capacity.is_power_of_two() {
                return Err(BridgeError::Configuration(format!(
                    "{name} must be a power of two, got {capacity}"
                )));
            }
        }

        if self.queue.sync_stages == 0 || self.queue.sync_stages > MAX_SYNC_STAGES {
            return Err(BridgeError::Configuration(format!(
                "queue.sync_stages must be 1-{MAX_SYNC_STAGES}, got {}",
                self.queue.sync_stages
            )));
        }

        self.frame_format().validate()?;
        if self.frame.pixel_bits < MIN_TAGGED_PIXEL_BITS {
            return Err(BridgeError::Configuration(format!(
                "frame.pixel_bits must be at least {MIN_TAGGED_PIXEL_BITS} to carry the frame tag, got {}",
                self.frame.pixel_bits
            )));
        }

        if self.decimation.factor == 0 {
            return Err(BridgeError::Configuration(
                "decimation.factor must be non-zero".to_string(),
            ));
        }
        let input_fits = self
            .frame
            .width
            .checked_mul(self.decimation.factor)
            .zip(
                self.frame
                    .height
                    .checked_mul(self.decimation.factor)
                    .and_then(|h| h.checked_add(self.simulation.vblank_lines)),
            )
            .is_some();
        if !input_fits {
            return Err(BridgeError::Configuration(format!(
                "frame {}x{} at decimation.factor {} (plus blanking) exceeds 32-bit input coordinates",
                self.frame.width, self.frame.height, self.decimation.factor
            )));
        }

        let sim = &self.simulation;
        if sim.producer_steps == 0 || sim.consumer_steps == 0 {
            return Err(BridgeError::Configuration(
                "simulation step bursts must be non-zero".to_string(),
            ));
        }
        if sim.producer_period_us == 0 || sim.consumer_period_us == 0 {
            return Err(BridgeError::Configuration(
                "simulation periods must be non-zero".to_string(),
            ));
        }
        if sim.vblank_lines == 0 {
            return Err(BridgeError::Configuration(
                "simulation.vblank_lines must be at least 1 to produce a frame boundary"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Stored frame format
    #[must_use]
    pub fn frame_format(&self) -> FrameFormat {
        FrameFormat {
            width: self.frame.width,
            height: self.frame.height,
            pixel_bits: self.frame.pixel_bits,
            blank: self.frame.blank,
        }
    }

    /// Construction parameters for the transport core
    #[must_use]
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            queue_capacity: self.queue.capacity,
            frame_ready_capacity: self.queue.frame_ready_capacity,
            sync_stages: self.queue.sync_stages,
            format: self.frame_format(),
            decimation_factor: self.decimation.factor,
        }
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Configuration(format!("cannot render config: {e}")))
    }
}
