//! Engine configuration: devices, channel groups and math channels.
//!
//! Loaded from JSON or YAML, chosen by file extension.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::math::MathOp;
use crate::data::quantity::{
    MeasuredQuantity, Quantity, QuantityFlag, Unit, DEFAULT_DECIMAL_PLACES, DEFAULT_DIGITS,
};
use crate::device::DeviceType;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total digits for hardware packets without precision information.
    pub default_digits: i32,
    /// Decimal places for hardware packets without precision information.
    pub default_decimal_places: i32,
    pub devices: Vec<DeviceConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_digits: DEFAULT_DIGITS,
            default_decimal_places: DEFAULT_DECIMAL_PLACES,
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub channel_groups: Vec<ChannelGroupConfig>,
    /// Pre-create signals from channel names and add the standard
    /// power/resistance/energy/charge math channels per group.
    #[serde(default)]
    pub fixed_channels: bool,
    /// Created in order, after the fixed channels.
    #[serde(default)]
    pub math_channels: Vec<MathChannelDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelGroupConfig {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// A math channel to create on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathChannelDef {
    pub name: String,
    #[serde(default)]
    pub group: String,
    pub quantity: Quantity,
    #[serde(default)]
    pub quantity_flags: BTreeSet<QuantityFlag>,
    pub unit: Unit,
    pub op: MathOp,
}

impl MathChannelDef {
    pub fn measured_quantity(&self) -> MeasuredQuantity {
        MeasuredQuantity::new(self.quantity, self.quantity_flags.iter().copied())
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let txt = std::fs::read_to_string(path)?;
        match format {
            ConfigFormat::Json => Self::from_json_str(&txt),
            ConfigFormat::Yaml => Self::from_yaml_str(&txt),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let txt = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => self.to_json_string()?,
            ConfigFormat::Yaml => self.to_yaml_string()?,
        };
        std::fs::write(path, txt)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(Error::UnsupportedConfig(path.display().to_string())),
        }
    }
}
