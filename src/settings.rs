// src/settings.rs
//
// Optional TOML settings file for the bridge. Every field has a default;
// command-line flags win over file values (resolution happens in cli.rs).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::Parity;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeSettings {
    /// Serial device path, e.g. /dev/ttyUSB0. Required unless given on the
    /// command line.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    /// Address to bind the listening socket to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen for client connections on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Mirror log output to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_baudrate() -> u32 {
    115200
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_bind() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5555
}

impl Default for BridgeSettings {
    fn default() -> Self {
        BridgeSettings {
            device: None,
            baudrate: default_baudrate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            bind: default_bind(),
            port: default_port(),
            log_file: None,
        }
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<BridgeSettings, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings file {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse settings file {}: {}", path.display(), e))
}
