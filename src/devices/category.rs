// MIT License - Copyright (c) 2026 Peter Wright
// Device families and their status code tables

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::constants::{
    CO_ALARM_CODES, DOOR_WINDOW_SENSOR_CODES, FIRE_ALARM_CODES, GAS_ALARM_CODES,
    HEAT_ALARM_CODES, SMOKE_ALARM_CODES, WATER_ALARM_CODES,
};

/// Resolved device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceState {
    #[serde(rename = "Unknown")]
    Unknown,
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Closed")]
    Closed,
    #[serde(rename = "Alarm")]
    Alarm,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Offline")]
    Offline,
    #[serde(rename = "Test Alarm")]
    TestAlarm,
    #[serde(rename = "Fault")]
    Fault,
    #[serde(rename = "Silence")]
    Silence,
    #[serde(rename = "Fire Alarm")]
    FireAlarm,
    #[serde(rename = "Illegal demolition")]
    IllegalDemolition,
}

impl DeviceState {
    /// Label used in MQTT payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Alarm => "Alarm",
            Self::Normal => "Normal",
            Self::Offline => "Offline",
            Self::TestAlarm => "Test Alarm",
            Self::Fault => "Fault",
            Self::Silence => "Silence",
            Self::FireAlarm => "Fire Alarm",
            Self::IllegalDemolition => "Illegal demolition",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device family, derived from the hub's 4-hex-digit type code.
///
/// Each family decodes the state byte of a status report with its own table,
/// falling back to the generic alarm table where it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    CoAlarm,
    GasAlarm,
    SmokeAlarm,
    WaterAlarm,
    HeatAlarm,
    FireAlarm,
    DoorWindowSensor,
    Unsupported,
}

impl DeviceCategory {
    /// Resolve a raw type code. Unknown codes map to [`DeviceCategory::Unsupported`].
    pub fn from_type_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        let code = code.as_str();
        if CO_ALARM_CODES.contains(&code) {
            Self::CoAlarm
        } else if GAS_ALARM_CODES.contains(&code) {
            Self::GasAlarm
        } else if SMOKE_ALARM_CODES.contains(&code) {
            Self::SmokeAlarm
        } else if WATER_ALARM_CODES.contains(&code) {
            Self::WaterAlarm
        } else if HEAT_ALARM_CODES.contains(&code) {
            Self::HeatAlarm
        } else if FIRE_ALARM_CODES.contains(&code) {
            Self::FireAlarm
        } else if DOOR_WINDOW_SENSOR_CODES.contains(&code) {
            Self::DoorWindowSensor
        } else {
            Self::Unsupported
        }
    }

    /// Human-readable family name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CoAlarm => "CO alarm",
            Self::GasAlarm => "Gas alarm",
            Self::SmokeAlarm => "Smoke alarm",
            Self::WaterAlarm => "Water alarm",
            Self::HeatAlarm => "Heat alarm",
            Self::FireAlarm => "Fire alarm",
            Self::DoorWindowSensor => "Door/window sensor",
            Self::Unsupported => "Unsupported",
        }
    }

    /// Decode a state code for this family.
    ///
    /// `None` means the family leaves the current state untouched.
    pub fn resolve_state(&self, code: &str) -> Option<DeviceState> {
        let code = code.to_ascii_uppercase();
        match self {
            Self::DoorWindowSensor => match code.as_str() {
                "55" => Some(DeviceState::Open),
                "AA" => Some(DeviceState::Closed),
                other => {
                    warn!("Door/window sensor: unrecognised state code {other:?}");
                    None
                }
            },
            Self::CoAlarm | Self::WaterAlarm | Self::HeatAlarm => match code.as_str() {
                "11" => Some(DeviceState::IllegalDemolition),
                "50" => Some(DeviceState::Normal),
                other => Some(generic_state(other)),
            },
            Self::FireAlarm => match code.as_str() {
                "12" => Some(DeviceState::Fault),
                "15" | "1B" => Some(DeviceState::Silence),
                "17" => Some(DeviceState::TestAlarm),
                "19" => Some(DeviceState::FireAlarm),
                other => Some(generic_state(other)),
            },
            Self::GasAlarm | Self::SmokeAlarm => Some(generic_state(&code)),
            Self::Unsupported => (code == "FF").then_some(DeviceState::Offline),
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Table shared by every alarm family.
fn generic_state(code: &str) -> DeviceState {
    match code {
        "BB" => DeviceState::TestAlarm,
        "55" => DeviceState::Alarm,
        "AA" => DeviceState::Normal,
        "FF" => DeviceState::Offline,
        other => {
            warn!("Unrecognised state code {other:?}");
            DeviceState::Unknown
        }
    }
}
