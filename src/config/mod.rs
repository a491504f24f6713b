//! Configuration management for Stick Relay
//!
//! Handles loading, parsing, and validating the YAML configuration file.
//! Every section is optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::peer::Framing;
use crate::stick::check_geometry;
use crate::transmit::DEFAULT_EVENT_NAME;

/// Highest accepted transmit rate
pub const MAX_FRAME_RATE_HZ: u32 = 240;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transmit: TransmitConfig,
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub sticks: SticksConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server for the control surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Transmit loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmitConfig {
    /// Frames per second of the read-diff-emit loop
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: u32,
    /// Event name snapshots are emitted under
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

/// Remote peer socket
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    /// WebSocket URL of the peer; snapshots are only logged when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

/// The two sticks of the surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SticksConfig {
    #[serde(default = "default_joystick1")]
    pub joystick1: StickConfig,
    #[serde(default = "default_joystick2")]
    pub joystick2: StickConfig,
}

/// One stick widget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StickConfig {
    /// Id of the surface element the stick is bound to
    pub element: String,
    /// Id of the element showing this stick's status line
    pub status_element: String,
    /// Prefix of the status line
    pub label: String,
    /// Maximum knob travel in pixels
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
    /// Minimum travel in pixels before the value leaves zero
    #[serde(default = "default_stick_deadzone")]
    pub deadzone: f64,
}

impl StickConfig {
    pub fn new(element: &str, status_element: &str, label: &str) -> Self {
        Self {
            element: element.to_string(),
            status_element: status_element.to_string(),
            label: label.to_string(),
            max_distance: default_max_distance(),
            deadzone: default_stick_deadzone(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files, in addition to stdout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.is_empty() {
            anyhow::bail!("server.bind cannot be empty");
        }

        let rate = self.transmit.frame_rate_hz;
        if rate == 0 || rate > MAX_FRAME_RATE_HZ {
            anyhow::bail!(
                "transmit.frame_rate_hz must be between 1 and {} (got {})",
                MAX_FRAME_RATE_HZ,
                rate
            );
        }
        if self.transmit.event_name.trim().is_empty() {
            anyhow::bail!("transmit.event_name cannot be empty");
        }

        if let Some(url) = &self.peer.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                anyhow::bail!("peer.url must be a ws:// or wss:// URL (got '{}')", url);
            }
        }

        let sticks = [
            ("joystick1", &self.sticks.joystick1),
            ("joystick2", &self.sticks.joystick2),
        ];

        let mut elements = HashSet::new();
        for (name, stick) in sticks {
            check_geometry(stick).with_context(|| format!("Invalid stick '{}'", name))?;

            if stick.status_element.trim().is_empty() {
                anyhow::bail!("Stick '{}' status_element cannot be empty", name);
            }
            for id in [&stick.element, &stick.status_element] {
                if !elements.insert(id.as_str()) {
                    anyhow::bail!("Element id '{}' is used more than once", id);
                }
            }
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: default_frame_rate(),
            event_name: default_event_name(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            url: None,
            framing: Framing::default(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for SticksConfig {
    fn default() -> Self {
        Self {
            joystick1: default_joystick1(),
            joystick2: default_joystick2(),
        }
    }
}

// Default value functions
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_frame_rate() -> u32 { 60 }
fn default_event_name() -> String { DEFAULT_EVENT_NAME.to_string() }
fn default_reconnect_delay() -> u64 { 2000 }
fn default_max_distance() -> f64 { 64.0 }
fn default_stick_deadzone() -> f64 { 8.0 }
fn default_joystick1() -> StickConfig { StickConfig::new("stick1", "status1", "Joystick 1") }
fn default_joystick2() -> StickConfig { StickConfig::new("stick2", "status2", "Joystick 2") }
