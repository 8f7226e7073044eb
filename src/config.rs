// =============================================================================
// CONFIGURATION - Load settings from rhi.toml
// =============================================================================
//
// This module handles loading and parsing configuration from rhi.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::backend::query::Format;

pub const DEFAULT_CONFIG_PATH: &str = "rhi.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub debug: DebugConfig,
    pub probe: ProbeConfig,
}

/// Device construction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Timer queries available at once; the pool holds two timestamps each.
    pub max_timer_queries: u32,
    /// Enable device addresses as a core feature, when the GPU supports them.
    pub buffer_device_address: bool,
    pub enable_compute_queue: bool,
    pub enable_copy_queue: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_timer_queries: 256,
            buffer_device_address: true,
            enable_compute_queue: true,
            enable_copy_queue: true,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: cfg!(debug_assertions),
            log_level: "info".to_string(),
        }
    }
}

/// What rhi-probe reports
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub app_name: String,
    pub formats: Vec<Format>,
    pub upload_heap_size: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            app_name: "rhi-probe".to_string(),
            formats: vec![
                Format::R8Unorm,
                Format::Rgba8Unorm,
                Format::Rgba16Float,
                Format::R16Uint,
                Format::R32Uint,
                Format::D32,
            ],
            upload_heap_size: 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {:#}. Using defaults.", DEFAULT_CONFIG_PATH, e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Log level filter, falling back to Info for unknown names
    pub fn log_level(&self) -> log::LevelFilter {
        self.debug.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', defaulting to info", self.debug.log_level);
            log::LevelFilter::Info
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.device.max_timer_queries, 256);
        assert!(config.device.buffer_device_address);
        assert_eq!(config.probe.upload_heap_size, 1024 * 1024);
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [device]
            max_timer_queries = 8
            enable_copy_queue = false

            [debug]
            log_level = "trace"

            [probe]
            formats = ["RGBA8_UNORM", "R32_UINT"]
            "#,
        )
        .unwrap();

        assert_eq!(config.device.max_timer_queries, 8);
        assert!(!config.device.enable_copy_queue);
        assert!(config.device.enable_compute_queue);
        assert_eq!(config.log_level(), log::LevelFilter::Trace);
        assert_eq!(config.probe.formats, vec![Format::Rgba8Unorm, Format::R32Uint]);
        assert_eq!(config.probe.app_name, "rhi-probe");
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        assert!(Config::parse("[probe]\nformats = [\"NOT_A_FORMAT\"]").is_err());
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let config = Config::parse("[debug]\nlog_level = \"loud\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }
}
