// Runtime configuration: CLI for the bench-level knobs, a TOML file for the
// satellite's identity, secrets and jokes.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modulations the radio firmware understands.
pub const MODULATIONS: [&str; 2] = ["FSK", "LoRa"];

#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Satellite configuration file.
    #[arg(long, default_value = "satellite.toml")]
    pub config: PathBuf,
    /// File backing the non-volatile memory image.
    #[arg(long, default_value = "nvm.bin")]
    pub nvm: PathBuf,
    #[arg(long, default_value = "0.0.0.0:7892")]
    pub bind_addr: String,
    #[arg(long, default_value = "127.0.0.1:7891")]
    pub ground_addr: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown modulation {0:?}, expected one of {MODULATIONS:?}")]
    UnknownModulation(String),
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cubesat_name: String,
    pub hmac_secret: String,
    /// Operator callsign; transmission is refused while empty.
    pub license: String,
    pub jokes: Vec<String>,
    pub modulation: String,
    pub max_frame_size: usize,
    pub turnaround_delay_ms: u64,
    pub listen_timeout_s: u64,

    #[serde(skip)]
    pub(crate) path: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Read)?;
        let mut config: Config = toml::from_str(&text)?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Validates and applies a new modulation, writing it back to the config
    /// file so it survives a reset. A config without a backing file keeps
    /// the change in memory only.
    pub fn set_modulation(&mut self, modulation: &str) -> Result<(), ConfigError> {
        if !MODULATIONS.contains(&modulation) {
            return Err(ConfigError::UnknownModulation(modulation.to_string()));
        }
        self.modulation = modulation.to_string();
        self.persist()
    }

    fn persist(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let text = toml::to_string_pretty(self).expect("config serializes");
        fs::write(&self.path, text).map_err(ConfigError::Write)
    }
}
