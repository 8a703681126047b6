/// TOML configuration with sensible defaults.
/// No config file is required to run; defaults reproduce the stock channel table.

use crate::channel::{Channel, ChannelParams, ChannelTable};
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub device: DeviceConfig,
    pub channels: ChannelsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period while the host reports no frame time.
    pub fallback_cadence_ms: u64,
    /// Frame rate assumed by the daemon until the host sends `frame_time` (0 = none).
    pub frame_rate_hz: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Open the first supported controller at startup.
    pub enabled: bool,
}

/// Per-channel overrides. Missing values keep the channel's default.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ChannelOverride {
    pub peak_strength: Option<f32>,
    pub duration_s: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub block: ChannelOverride,
    pub hit_blocked: ChannelOverride,
    pub hit: ChannelOverride,
    pub pain: ChannelOverride,
    pub struck: ChannelOverride,
    pub custom_pulse: ChannelOverride,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fallback_cadence_ms: 1000,
            frame_rate_hz: 60.0,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl SchedulerConfig {
    pub fn fallback_cadence(&self) -> Duration {
        // Zero would turn the fallback into a busy loop.
        Duration::from_millis(self.fallback_cadence_ms.max(1))
    }
}

impl ChannelsConfig {
    fn get(&self, channel: Channel) -> ChannelOverride {
        match channel {
            Channel::Block => self.block,
            Channel::HitBlocked => self.hit_blocked,
            Channel::Hit => self.hit,
            Channel::Pain => self.pain,
            Channel::Struck => self.struck,
            Channel::CustomPulse => self.custom_pulse,
        }
    }

    /// Resolve overrides into a channel table. Invalid values are logged and the
    /// channel keeps its default parameters.
    pub fn to_table(&self) -> ChannelTable {
        Channel::ALL.into_iter().fold(ChannelTable::default(), |table, channel| {
            let defaults = ChannelParams::default_for(channel);
            let o = self.get(channel);
            let peak = o.peak_strength.unwrap_or(defaults.peak_strength);
            let duration = o.duration_s.unwrap_or(defaults.full_duration);
            match ChannelParams::new(peak, duration) {
                Ok(params) => table.with(channel, params),
                Err(e) => {
                    log::warn!("Ignoring [channels.{channel}] override: {e}. Using defaults.");
                    table
                }
            }
        })
    }
}

impl Config {
    /// Load config from the default config file path, or return defaults if not found.
    pub fn load() -> Self {
        let config_path = config_file_path();
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {config_path}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {config_path}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {config_path}. Using defaults.");
                Self::default()
            }
        }
    }
}

fn config_file_path() -> String {
    std::env::var("COMBAT_RUMBLE_CONFIG").unwrap_or_else(|_| "combat-rumble.toml".into())
}
