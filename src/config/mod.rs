//! Configuration management for Winstack
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It combines settings for z-stacking bounds, id pools,
//! layout defaults and dialog behaviour.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all Winstack settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WindowingConfig {
    /// Z-axis bounds for stacked windows
    #[serde(default)]
    pub stacking: StackingConfig,

    /// Protocol and action id pools
    #[serde(default)]
    pub ids: IdConfig,

    /// Layout helpers
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Dialog modality behaviour
    #[serde(default)]
    pub dialog: DialogConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Z-axis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StackingConfig {
    /// Z of the bottom-most window
    pub z_min: f32,

    /// Highest z a window may reach
    pub z_max: f32,

    /// Z distance between two stacked layers
    pub z_offset: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdConfig {
    /// First protocol id handed out
    pub first_protocol_id: u32,

    /// Number of protocol ids available to windows
    pub protocol_id_capacity: u32,

    /// Maximum number of actions one window may register
    pub actions_per_window: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Extra upward shift applied by `center_on_screen`
    pub screen_center_offset_y: f32,
}

/// What `show_dialog` does while another dialog is active for the recipient
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DialogReplacePolicy {
    /// Hide the active dialog (notifying its owner) and install the new one
    ClosePrevious,
    /// Refuse the new dialog
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogConfig {
    pub replace_policy: DialogReplacePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,

    /// Interval between autohide ticks (milliseconds)
    pub tick_interval_ms: u64,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            z_min: -32.0,
            z_max: 32.0,
            z_offset: 0.1,
        }
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            first_protocol_id: 1,
            protocol_id_capacity: 4096,
            actions_per_window: 65535,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            screen_center_offset_y: 6.0,
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            replace_policy: DialogReplacePolicy::ClosePrevious,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            tick_interval_ms: 1000,
        }
    }
}

impl StackingConfig {
    /// Number of layers that fit above the bottom-most one.
    pub fn max_depth(&self) -> usize {
        // Tolerate f32 rounding so that 64 / 0.1 yields 640 layers
        ((self.z_max - self.z_min) / self.z_offset + 1e-3).floor().max(0.0) as usize
    }

    /// Z coordinate of a window sitting `depth` layers above the bottom.
    pub fn z_for_depth(&self, depth: usize) -> f32 {
        (self.z_min + depth as f32 * self.z_offset).min(self.z_max)
    }
}

impl WindowingConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: WindowingConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let stacking = &self.stacking;
        if !(stacking.z_min < stacking.z_max) {
            anyhow::bail!(
                "Invalid z range: z_min ({}) must be below z_max ({})",
                stacking.z_min,
                stacking.z_max
            );
        }

        if !(stacking.z_offset > 0.0) || stacking.z_offset > stacking.z_max - stacking.z_min {
            anyhow::bail!("Invalid z_offset: must be positive and fit inside the z range");
        }

        if self.ids.protocol_id_capacity == 0 {
            anyhow::bail!("Invalid protocol_id_capacity: must be at least 1");
        }

        if u64::from(self.ids.first_protocol_id) + u64::from(self.ids.protocol_id_capacity)
            > u64::from(u32::MAX) + 1
        {
            anyhow::bail!("Invalid protocol id range: exceeds 32-bit id space");
        }

        if self.ids.actions_per_window == 0 {
            anyhow::bail!("Invalid actions_per_window: must be at least 1");
        }

        if self.general.tick_interval_ms == 0 {
            anyhow::bail!("Invalid tick_interval_ms: must be at least 1");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Merge a partial configuration into this one
    /// Non-default sections from the partial config override this config
    pub fn merge_partial(mut self, partial: WindowingConfig) -> Self {
        let default_config = WindowingConfig::default();

        if partial.stacking != default_config.stacking {
            self.stacking = partial.stacking;
        }
        if partial.ids != default_config.ids {
            self.ids = partial.ids;
        }
        if partial.layout != default_config.layout {
            self.layout = partial.layout;
        }
        if partial.dialog != default_config.dialog {
            self.dialog = partial.dialog;
        }
        if partial.general != default_config.general {
            self.general = partial.general;
        }

        self
    }
}

#[cfg(test)]
mod tests;
