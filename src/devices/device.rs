// MIT License - Copyright (c) 2026 Peter Wright
// A single device paired with the hub

use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::devices::category::{DeviceCategory, DeviceState};
use crate::event::{Signal, SignalWaiter};

/// Highest signal strength the hub reports.
const MAX_SIGNAL: u8 = 4;
/// Highest battery percentage.
const MAX_BATTERY: u8 = 100;

/// Fields of a status hex string `SSBBTT..CC`.
///
/// `SS` is the signal strength, `BB` the battery level (hex), `TT..` the
/// state code and `CC` a trailing byte the hub always sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFields {
    pub signal_strength: Option<u8>,
    pub battery_level: Option<u8>,
    pub state_code: String,
}

impl StatusFields {
    pub fn parse(status: &str) -> Self {
        let hex_byte = |range: std::ops::Range<usize>| {
            status
                .get(range)
                .and_then(|s| u8::from_str_radix(s.trim(), 16).ok())
        };
        let state_code = if status.len() >= 6 {
            status.get(4..status.len() - 2).unwrap_or_default().to_string()
        } else {
            String::new()
        };
        Self {
            signal_strength: hex_byte(0..2).filter(|&s| s <= MAX_SIGNAL),
            battery_level: hex_byte(2..4).filter(|&b| b <= MAX_BATTERY),
            state_code,
        }
    }
}

/// A device known to the hub.
///
/// Every externally visible change fires the `updated` signal exactly once
/// per call; alarms additionally fire `alarm`.
#[derive(Debug)]
pub struct Device {
    /// Hub-assigned device id (immutable)
    pub id: u32,
    name: String,
    type_id: String,
    category: DeviceCategory,
    battery_level: Option<u8>,
    signal_strength: Option<u8>,
    state: DeviceState,
    updated: Signal,
    alarm: Signal,
}

impl Device {
    pub fn new(id: u32, type_id: &str) -> Self {
        Self {
            id,
            name: String::new(),
            type_id: type_id.to_string(),
            category: DeviceCategory::from_type_code(type_id),
            battery_level: None,
            signal_strength: None,
            state: DeviceState::Unknown,
            updated: Signal::new(),
            alarm: Signal::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn category(&self) -> DeviceCategory {
        self.category
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.battery_level
    }

    pub fn signal_strength(&self) -> Option<u8> {
        self.signal_strength
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Set the name learned from the hub or chosen by the user.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated.fire();
    }

    /// Set the name without notifying; used while the device is being created.
    pub(crate) fn init_name(&mut self, name: String) {
        self.name = name;
    }

    /// Apply a full status report.
    ///
    /// A type code differing from the stored one corrects the device type.
    /// Fires `updated` once, whatever changed.
    pub fn apply_status(&mut self, type_code: &str, status: &str) {
        if !type_code.is_empty() && !type_code.eq_ignore_ascii_case(&self.type_id) {
            let category = DeviceCategory::from_type_code(type_code);
            info!(
                "Device {}: type corrected {} -> {} ({})",
                self.id, self.type_id, type_code, category
            );
            self.type_id = type_code.to_string();
            self.category = category;
        }

        let fields = StatusFields::parse(status);
        if fields.signal_strength.is_some() {
            self.signal_strength = fields.signal_strength;
        }
        if fields.battery_level.is_some() {
            self.battery_level = fields.battery_level;
        }
        if let Some(state) = self.category.resolve_state(&fields.state_code) {
            if state != self.state {
                debug!("Device {} ({}): {} -> {}", self.id, self.name, self.state, state);
            }
            self.state = state;
        }

        self.updated.fire();
    }

    /// Fire the alarm signal.
    pub fn trigger_alarm(&self) {
        info!("Device {} ({}): alarm in state {}", self.id, self.name, self.state);
        self.alarm.fire();
    }

    /// Waiter woken on every change.
    pub fn updated(&self) -> SignalWaiter {
        self.updated.waiter()
    }

    /// Waiter woken on every alarm.
    pub fn alarm(&self) -> SignalWaiter {
        self.alarm.waiter()
    }

    pub fn updated_count(&self) -> u64 {
        self.updated.version()
    }

    pub fn alarm_count(&self) -> u64 {
        self.alarm.version()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id,
            name: self.name.clone(),
            type_id: self.type_id.clone(),
            category: self.category,
            state: self.state,
            battery_level: self.battery_level,
            signal_strength: self.signal_strength,
        }
    }
}

/// Point-in-time copy of a device, as published on MQTT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(rename = "type_name", serialize_with = "serialize_category")]
    pub category: DeviceCategory,
    pub state: DeviceState,
    #[serde(rename = "battery", serialize_with = "serialize_unknown")]
    pub battery_level: Option<u8>,
    #[serde(rename = "signal", serialize_with = "serialize_unknown")]
    pub signal_strength: Option<u8>,
}

fn serialize_category<S: Serializer>(category: &DeviceCategory, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(category.name())
}

// Unknown readings are published as -1.
fn serialize_unknown<S: Serializer>(value: &Option<u8>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_i16(i16::from(*v)),
        None => s.serialize_i16(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_fields() {
        let fields = StatusFields::parse("0464AA00");
        assert_eq!(fields.signal_strength, Some(4));
        assert_eq!(fields.battery_level, Some(100));
        assert_eq!(fields.state_code, "AA");

        let fields = StatusFields::parse("  2A55  ");
        assert_eq!(fields.signal_strength, None);
        assert_eq!(fields.battery_level, Some(42));
        assert_eq!(fields.state_code, "55");
    }

    #[test]
    fn test_parse_status_out_of_range() {
        let fields = StatusFields::parse("09FF5500");
        assert_eq!(fields.signal_strength, None);
        assert_eq!(fields.battery_level, None);
        assert_eq!(fields.state_code, "55");

        let fields = StatusFields::parse("04");
        assert_eq!(fields.battery_level, None);
        assert_eq!(fields.state_code, "");
    }

    #[test]
    fn test_new_device_is_unknown() {
        let device = Device::new(3, "0101");
        assert_eq!(device.category(), DeviceCategory::DoorWindowSensor);
        assert_eq!(device.state(), DeviceState::Unknown);
        assert_eq!(device.battery_level(), None);
        assert_eq!(device.name(), "");
    }

    #[test]
    fn test_apply_status_fires_updated_once() {
        let mut device = Device::new(1, "0101");
        device.apply_status("0101", "03645500");
        assert_eq!(device.updated_count(), 1);
        assert_eq!(device.alarm_count(), 0);
        assert_eq!(device.state(), DeviceState::Open);
        assert_eq!(device.battery_level(), Some(100));
        assert_eq!(device.signal_strength(), Some(3));
    }

    #[test]
    fn test_door_window_unknown_code_keeps_state() {
        let mut device = Device::new(1, "0101");
        device.apply_status("0101", "0464AA00");
        assert_eq!(device.state(), DeviceState::Closed);
        device.apply_status("0101", "0464BB00");
        assert_eq!(device.state(), DeviceState::Closed);
        assert_eq!(device.updated_count(), 2);
    }

    #[test]
    fn test_type_correction() {
        let mut device = Device::new(7, "0201");
        assert_eq!(device.category(), DeviceCategory::Unsupported);
        device.apply_status("0005", "04641900");
        assert_eq!(device.type_id(), "0005");
        assert_eq!(device.category(), DeviceCategory::FireAlarm);
        assert_eq!(device.state(), DeviceState::FireAlarm);
    }

    #[test]
    fn test_snapshot_json() {
        let mut device = Device::new(2, "0000");
        device.set_name("Kitchen");
        let json = serde_json::to_value(device.snapshot()).unwrap();
        assert_eq!(json["id"], 2);
        assert_eq!(json["name"], "Kitchen");
        assert_eq!(json["type"], "0000");
        assert_eq!(json["type_name"], "CO alarm");
        assert_eq!(json["state"], "Unknown");
        assert_eq!(json["battery"], -1);
        assert_eq!(json["signal"], -1);
    }
}
