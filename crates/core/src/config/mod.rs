use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Upper bound on the pre-start settle delay for the visualizer.
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Top-level configuration structure for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Key/value file describing what the player is doing.
    pub status_path: String,
    /// Single-token file carrying a manual `ON`/`OFF` command.
    pub override_path: String,
    pub display: DisplayConfig,
    pub visualizer: VisualizerConfig,
    pub engine: EngineConfig,
    pub poll: PollConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            status_path: "/var/local/www/currentsong.txt".to_string(),
            override_path: "/tmp/screen_control".to_string(),
            display: DisplayConfig::default(),
            visualizer: VisualizerConfig::default(),
            engine: EngineConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file. Keys that are absent keep their
    /// default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Backlight power node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Shell glob resolving to the `bl_power` node(s).
    pub power_path: String,
    pub use_sudo: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            power_path: "/sys/class/backlight/*/bl_power".to_string(),
            use_sudo: true,
        }
    }
}

/// Companion visualizer process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Command line handed to `sh -c`.
    pub command: String,
    /// Value exported as `DISPLAY` for the child.
    pub display_env: Option<String>,
    /// Pattern given to `pkill -f` when no handle is available.
    pub match_pattern: String,
    pub settle_delay_ms: u64,
    pub stop_grace_ms: u64,
    pub use_sudo: bool,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            command: "python /home/pi/PeppyMeter/peppymeter.py".to_string(),
            display_env: Some(":0".to_string()),
            match_pattern: "peppymeter.py".to_string(),
            settle_delay_ms: 4_000,
            stop_grace_ms: 2_000,
            use_sudo: true,
        }
    }
}

impl VisualizerConfig {
    /// Delay before spawning, clamped so `start` never blocks for long.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms).min(MAX_SETTLE_DELAY)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inactivity_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 300,
        }
    }
}

impl EngineConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub backoff_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            backoff_ms: 1_000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
