//! Config file loading

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use midigen_core::MidiGenConfig;
use tracing::{debug, info};

/// Read a TOML config, or the built-in defaults when no path is given. Not validated.
pub fn load_config(path: Option<&Path>) -> Result<MidiGenConfig> {
    let Some(path) = path else {
        debug!("No config file given, using defaults");
        return Ok(MidiGenConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Defaults rendered as TOML, for `midigen example-config`
pub fn example_config() -> Result<String> {
    toml::to_string_pretty(&MidiGenConfig::default()).context("failed to render default config")
}
