use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use shared::domain::OperatingMode;
use tracing::warn;

use crate::{
    heartbeat::DEFAULT_HEARTBEAT_INTERVAL,
    input::DEFAULT_DEADZONE_RADIUS,
    transport::{websocket_url, DEFAULT_RECONNECT_DELAY},
};

pub const DEFAULT_SETTINGS_FILE: &str = "teleop.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub heartbeat_interval: Duration,
    pub deadzone_radius: f64,
    pub reconnect_delay: Duration,
    pub initial_mode: OperatingMode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7000".into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            deadzone_radius: DEFAULT_DEADZONE_RADIUS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            initial_mode: OperatingMode::Manual,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    server_url: Option<String>,
    heartbeat_interval_ms: Option<u64>,
    deadzone_radius: Option<f64>,
    reconnect_delay_ms: Option<u64>,
    initial_mode: Option<OperatingMode>,
}

/// Defaults, then the TOML file, then `APP__*` environment variables.
///
/// Without an explicit path, `teleop.toml` in the working directory is used
/// when present. An explicit path must exist.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            settings
                .apply_file(&raw)
                .with_context(|| format!("invalid settings file {}", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_SETTINGS_FILE) {
                settings
                    .apply_file(&raw)
                    .with_context(|| format!("invalid settings file {DEFAULT_SETTINGS_FILE}"))?;
            }
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

impl ClientSettings {
    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: SettingsFile = toml::from_str(raw)?;
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.heartbeat_interval_ms {
            self.heartbeat_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.deadzone_radius {
            self.deadzone_radius = v;
        }
        if let Some(v) = file.reconnect_delay_ms {
            self.reconnect_delay = Duration::from_millis(v);
        }
        if let Some(v) = file.initial_mode {
            self.initial_mode = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = parse_env::<u64>(&lookup, "APP__HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval = Duration::from_millis(v);
        }
        if let Some(v) = parse_env::<f64>(&lookup, "APP__DEADZONE_RADIUS") {
            self.deadzone_radius = v;
        }
        if let Some(v) = parse_env::<u64>(&lookup, "APP__RECONNECT_DELAY_MS") {
            self.reconnect_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_env::<OperatingMode>(&lookup, "APP__INITIAL_MODE") {
            self.initial_mode = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.heartbeat_interval.is_zero() {
            bail!("heartbeat_interval_ms must be positive");
        }
        if !self.deadzone_radius.is_finite() || self.deadzone_radius <= 0.0 {
            bail!(
                "deadzone_radius must be a positive number, got {}",
                self.deadzone_radius
            );
        }
        websocket_url(&self.server_url)?;
        Ok(())
    }
}

fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
