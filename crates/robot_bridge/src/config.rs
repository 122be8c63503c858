use std::{fs, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::drive::DriveLimits;

pub const SETTINGS_FILE: &str = "bridge.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub bind_addr: String,
    pub watchdog: Duration,
    pub limits: DriveLimits,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7000".into(),
            watchdog: Duration::from_millis(500),
            limits: DriveLimits::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    bind_addr: Option<String>,
    watchdog_ms: Option<u64>,
    max_pwm: Option<i32>,
    turn_pwm: Option<i32>,
}

pub fn load_settings() -> anyhow::Result<BridgeSettings> {
    let mut settings = BridgeSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings
            .apply_file(&raw)
            .with_context(|| format!("invalid settings file {SETTINGS_FILE}"))?;
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

impl BridgeSettings {
    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: SettingsFile = toml::from_str(raw)?;
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.watchdog_ms {
            self.watchdog = Duration::from_millis(v);
        }
        if let Some(v) = file.max_pwm {
            self.limits.max_pwm = v;
        }
        if let Some(v) = file.turn_pwm {
            self.limits.turn_pwm = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("APP__BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("APP__WATCHDOG_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.watchdog = Duration::from_millis(parsed);
            }
        }
        if let Some(v) = lookup("APP__MAX_PWM") {
            if let Ok(parsed) = v.parse::<i32>() {
                self.limits.max_pwm = parsed;
            }
        }
        if let Some(v) = lookup("APP__TURN_PWM") {
            if let Ok(parsed) = v.parse::<i32>() {
                self.limits.turn_pwm = parsed;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.watchdog.is_zero() {
            bail!("watchdog_ms must be positive");
        }
        if !(1..=255).contains(&self.limits.max_pwm) {
            bail!("max_pwm must be within 1..=255, got {}", self.limits.max_pwm);
        }
        if !(0..=self.limits.max_pwm).contains(&self.limits.turn_pwm) {
            bail!(
                "turn_pwm must be within 0..={}, got {}",
                self.limits.max_pwm,
                self.limits.turn_pwm
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
