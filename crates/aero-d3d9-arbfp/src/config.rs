use thiserror::Error;

use crate::shader_limits::{DEFAULT_PROGRAM_CAPACITY, MAX_PROGRAM_CAPACITY};
use crate::translate::TranslateOptions;

const MODE_ENV: &str = "AERO_PS_MODE";
const CAPACITY_ENV: &str = "AERO_PS_PROGRAM_CAPACITY";

/// Global execution-mode switch for pixel shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderMode {
    /// Translate to a fragment program and upload it.
    #[default]
    Hardware,
    /// Never translate; shaders run through the software executors.
    Software,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for env var {0}")]
    InvalidEnv(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorConfig {
    pub mode: ShaderMode,
    /// Program text capacity in bytes, including the terminating NUL.
    pub program_capacity: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            mode: ShaderMode::Hardware,
            program_capacity: DEFAULT_PROGRAM_CAPACITY,
        }
    }
}

impl TranslatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mode = match lookup(MODE_ENV).as_deref().map(str::trim) {
            None | Some("") => ShaderMode::Hardware,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "hw" | "hardware" => ShaderMode::Hardware,
                "sw" | "software" => ShaderMode::Software,
                _ => return Err(ConfigError::InvalidEnv(MODE_ENV)),
            },
        };
        let program_capacity = match lookup(CAPACITY_ENV) {
            None => DEFAULT_PROGRAM_CAPACITY,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (2..=MAX_PROGRAM_CAPACITY).contains(n))
                .ok_or(ConfigError::InvalidEnv(CAPACITY_ENV))?,
        };
        Ok(Self {
            mode,
            program_capacity,
        })
    }

    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            program_capacity: self.program_capacity,
        }
    }
}
