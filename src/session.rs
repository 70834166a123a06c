//! Session: the set of open devices and the common start timestamp.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::device::{Device, DeviceId, DeviceType};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Session {
    devices: BTreeMap<DeviceId, Arc<Device>>,
    next_device_id: DeviceId,
    start_timestamp: f64,
    default_digits: i32,
    default_decimal_places: i32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// New session starting now.
    pub fn new() -> Self {
        Self::with_start_timestamp(crate::util::now_timestamp())
    }

    pub fn with_start_timestamp(start_timestamp: f64) -> Self {
        let defaults = EngineConfig::default();
        Self {
            devices: BTreeMap::new(),
            next_device_id: 1,
            start_timestamp,
            default_digits: defaults.default_digits,
            default_decimal_places: defaults.default_decimal_places,
        }
    }

    /// Build a session with every device, channel and math channel from
    /// `config`, in declaration order. Math channels over hardware channels
    /// that have no signal yet are built once the first packet arrives.
    pub fn from_config(config: &EngineConfig, start_timestamp: f64) -> Result<Self> {
        let mut session = Self::with_start_timestamp(start_timestamp);
        session.default_digits = config.default_digits;
        session.default_decimal_places = config.default_decimal_places;

        for dev_cfg in &config.devices {
            let device = session.add_device(&dev_cfg.name, dev_cfg.device_type);
            for group in &dev_cfg.channel_groups {
                for channel in &group.channels {
                    match dev_cfg.device_type {
                        DeviceType::User => {
                            device.add_user_channel(channel, &group.name)?;
                        }
                        _ => {
                            device.add_hardware_channel(channel, &group.name)?;
                        }
                    }
                }
            }
            if dev_cfg.fixed_channels {
                device.init_fixed_channels()?;
            }
            for def in &dev_cfg.math_channels {
                device.declare_math_channel(def)?;
            }
        }
        Ok(session)
    }

    pub fn start_timestamp(&self) -> f64 {
        self.start_timestamp
    }

    pub fn add_device(&mut self, name: &str, device_type: DeviceType) -> Arc<Device> {
        let id = self.next_device_id;
        self.next_device_id += 1;
        let device = Arc::new(
            Device::new(id, name, device_type, self.start_timestamp)
                .with_default_precision(self.default_digits, self.default_decimal_places),
        );
        self.devices.insert(id, Arc::clone(&device));
        device
    }

    pub fn remove_device(&mut self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices.remove(&id)
    }

    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices.get(&id).cloned()
    }

    pub fn device_by_name(&self, name: &str) -> Result<Arc<Device>> {
        self.devices
            .values()
            .find(|d| d.name() == name)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.values().cloned().collect()
    }
}
