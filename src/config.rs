//! TOML configuration for the compiler and the render path.
//!
//! ```toml
//! [compiler]
//! tempo_width = "u16"
//! note_case = "exact"
//!
//! [render]
//! sample_rate = 44100
//! quantum = 128
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use crate::compiler::CompilerOptions;
use crate::error::ConfigError;
use crate::rt::DEFAULT_QUANTUM;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest channel count a render session accepts.
pub const MAX_CHANNELS: usize = 32;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub compiler: CompilerOptions,
    pub render: RenderOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    pub sample_rate: u32,
    /// Frames per render callback.
    pub quantum: usize,
    pub channels: usize,
    /// Peak level of the reference engine's tones.
    pub amplitude: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            quantum: DEFAULT_QUANTUM,
            channels: 2,
            amplitude: 0.25,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        if render.sample_rate == 0 {
            return Err(ConfigError::Invalid("render.sample_rate must be positive".into()));
        }
        if render.quantum == 0 {
            return Err(ConfigError::Invalid("render.quantum must be positive".into()));
        }
        if render.channels == 0 || render.channels > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "render.channels must be between 1 and {}",
                MAX_CHANNELS
            )));
        }
        if !(0.0..=1.0).contains(&render.amplitude) {
            return Err(ConfigError::Invalid("render.amplitude must be within 0..=1".into()));
        }
        Ok(())
    }
}
