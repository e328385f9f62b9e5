// src/config.rs

//! Configuration for the DMD bench.
//!
//! Every section deserializes from JSON with `#[serde(default)]`, so a config
//! file only needs the keys it wants to override. The effective configuration
//! is loaded once into [`CONFIG`].
//!
//! Lookup order: the path in `$DMD_BENCH_CONFIG`, then `dmd-bench.json` in the
//! working directory, then built-in defaults.

use crate::response::ResponseCurve;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DMD_BENCH_CONFIG";
/// Config file looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "dmd-bench.json";

/// The process-wide configuration, read on first access.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::load_or_default);

// --- Top-Level Configuration Structure ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// DMD and framebuffer resolutions.
    pub geometry: GeometryConfig,
    /// Perceptual response model.
    pub response: ResponseConfig,
    /// Command-loop step sizes, cycles and pauses.
    pub control: ControlConfig,
    /// Frame streaming cadence.
    pub stream: StreamConfig,
    /// Where frames are written.
    pub output: OutputConfig,
    /// Projector controller transport.
    pub projector: ProjectorConfig,
}

// --- Geometry ---

/// Resolutions in pixels. The DMD is addressed in mirrors; the framebuffer
/// the SBC scans out is usually twice that per axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeometryConfig {
    pub dmd_width: usize,
    pub dmd_height: usize,
    /// Must match the "geometry" line of `fbset -fb /dev/fb0`.
    pub display_width: usize,
    pub display_height: usize,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig {
            dmd_width: 960,
            dmd_height: 540,
            display_width: 1920,
            display_height: 1080,
        }
    }
}

// --- Response ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResponseConfig {
    pub amplitude: f64,
    pub gamma: f64,
    /// Whether ramps and flat fields start out pre-compensated.
    pub correction: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        let curve = ResponseCurve::default();
        ResponseConfig {
            amplitude: curve.amplitude,
            gamma: curve.gamma,
            correction: true,
        }
    }
}

impl ResponseConfig {
    pub fn curve(&self) -> ResponseCurve {
        ResponseCurve::new(self.amplitude, self.gamma)
    }
}

// --- Control ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Move step sizes cycled by `s`, in mirrors.
    pub step_cycle: Vec<u32>,
    pub initial_step: u32,
    /// Ramp transition widths cycled by `w`, in mirrors.
    pub width_cycle: Vec<u32>,
    pub initial_width: u32,
    /// Flat-field intensity change per `[` / `]`.
    pub intensity_step: u8,
    /// Pause between unlock and lock when retrying a lock.
    pub retry_lock_pause_ms: u64,
    /// Pause between unlock and lock when stepping a sequential edge.
    pub edge_settle_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            step_cycle: vec![1, 10, 100],
            initial_step: 100,
            width_cycle: vec![1, 4, 8],
            initial_width: 1,
            intensity_step: 16,
            retry_lock_pause_ms: 250,
            edge_settle_ms: 100,
        }
    }
}

impl ControlConfig {
    pub fn retry_lock_pause(&self) -> Duration {
        Duration::from_millis(self.retry_lock_pause_ms)
    }

    pub fn edge_settle(&self) -> Duration {
        Duration::from_millis(self.edge_settle_ms)
    }
}

// --- Stream ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Sleep between full-frame rewrites.
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            poll_interval_ms: 100,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// --- Output ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Memory-map the framebuffer device and write frames into it.
    #[default]
    Framebuffer,
    /// Drop frames after rendering them. For running without a display.
    Discard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub sink: SinkKind,
    pub framebuffer_device: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            sink: SinkKind::Framebuffer,
            framebuffer_device: PathBuf::from("/dev/fb0"),
        }
    }
}

// --- Projector ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectorBackend {
    /// Talk to the controller over Linux i2c-dev.
    #[default]
    I2c,
    /// Log commands without touching hardware.
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectorConfig {
    pub backend: ProjectorBackend,
    /// i2c-dev node the controller sits on.
    pub bus: PathBuf,
    /// 7-bit controller address.
    pub address: u16,
    /// Delay before every bus transaction. Some controller commands touch
    /// flash asynchronously and hang the bus without it.
    pub command_delay_ms: u64,
    /// Controller opcode for "Write Mirror Lock".
    pub mirror_lock_opcode: u8,
    /// Parameter byte selecting "DMD interface lock".
    pub mirror_lock_param: u8,
    /// Parameter byte selecting "DMD interface unlock".
    pub mirror_unlock_param: u8,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        ProjectorConfig {
            backend: ProjectorBackend::I2c,
            bus: PathBuf::from("/dev/i2c-7"),
            address: 0x1B,
            command_delay_ms: 0,
            mirror_lock_opcode: 0x39,
            mirror_lock_param: 0x01,
            mirror_unlock_param: 0x00,
        }
    }
}

impl ProjectorConfig {
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }
}

// --- Loading ---

impl Config {
    /// Parses `text` as JSON and validates it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text).context("Malformed config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// The config file path to use, if any exists.
    pub fn resolve_path() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(explicit));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Loads the resolved config file, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::resolve_path() {
            None => {
                info!("No config file found; using defaults.");
                Config::default()
            }
            Some(path) => match Self::load_from(&path) {
                Ok(config) => {
                    info!("Configuration loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{:#}. Using default configuration.", e);
                    Config::default()
                }
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if g.dmd_width == 0 || g.dmd_height == 0 || g.display_width == 0 || g.display_height == 0 {
            bail!(
                "geometry must be non-zero (dmd {}x{}, display {}x{})",
                g.dmd_width,
                g.dmd_height,
                g.display_width,
                g.display_height
            );
        }
        let r = &self.response;
        if !(r.gamma.is_finite() && r.gamma > 0.0) {
            bail!("response.gamma must be positive, got {}", r.gamma);
        }
        if !(r.amplitude.is_finite() && r.amplitude > 0.0) {
            bail!("response.amplitude must be positive, got {}", r.amplitude);
        }
        let c = &self.control;
        if c.step_cycle.is_empty() {
            bail!("control.step_cycle must not be empty");
        }
        if c.width_cycle.is_empty() {
            bail!("control.width_cycle must not be empty");
        }
        if self.stream.poll_interval_ms == 0 {
            bail!("stream.poll_interval_ms must be at least 1");
        }
        Ok(())
    }
}
