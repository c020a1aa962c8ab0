// MIT License - Copyright (c) 2026 Peter Wright
// MQTT topic layout and command handling for the bridge binary

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::constants::{HUB_DEVICE_ID, SILENCE_STATUS, TEST_ALARM_STATUS};
use crate::devices::DeviceSnapshot;
use crate::error::Result;
use crate::hub::K1Hub;
use crate::transport::Transport;

/// Topic carrying a device's JSON state.
pub fn device_topic(base: &str, id: u32) -> String {
    format!("{base}/elro/{id}")
}

/// Subscription filter for device commands.
pub fn command_filter(base: &str) -> String {
    format!("{base}/elro/+/set")
}

/// Home Assistant discovery topic for a device.
pub fn discovery_topic(id: u32) -> String {
    format!("homeassistant/sensor/elro_k1/{id}/config")
}

/// Extract the device id from `<base>/elro/<id>/set`.
pub fn parse_command_topic(base: &str, topic: &str) -> Option<u32> {
    topic
        .strip_prefix(base)?
        .strip_prefix("/elro/")?
        .strip_suffix("/set")?
        .parse()
        .ok()
}

/// Home Assistant sensor discovery payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub state_topic: String,
    pub value_template: String,
    pub json_attributes_topic: String,
    pub unique_id: String,
}

impl DiscoveryConfig {
    pub fn for_device(base: &str, device: &DeviceSnapshot) -> Self {
        let topic = device_topic(base, device.id);
        let name = if device.name.is_empty() {
            format!("ELRO K1 device {}", device.id)
        } else {
            device.name.clone()
        };
        Self {
            name,
            state_topic: topic.clone(),
            value_template: "{{ value_json.state }}".to_string(),
            json_attributes_topic: topic,
            unique_id: format!("elro_k1_device_{}", device.id),
        }
    }
}

/// Why a command payload was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("payload is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("{what} is not allowed for device {id}")]
    NotAllowed { id: u32, what: &'static str },

    #[error("invalid value for {field}")]
    InvalidValue { field: &'static str },

    #[error("no recognised command in payload")]
    Empty,
}

/// A command received on `<base>/elro/<id>/set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Rename(String),
    TestAlarm,
    Silence,
    PermitJoin(bool),
    Remove,
    Replace(bool),
}

/// Parse a command payload for device `id`.
///
/// The payload is a JSON object, optionally sent as a quoted JSON string.
/// Several keys may be combined; they are executed in a fixed order.
pub fn parse_command(id: u32, payload: &str) -> std::result::Result<Vec<BridgeCommand>, CommandError> {
    let not_object = || CommandError::NotAnObject(payload.to_string());
    let mut value: Value = serde_json::from_str(payload.trim()).map_err(|_| not_object())?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(|_| not_object())?;
    }
    let Value::Object(fields) = value else {
        return Err(not_object());
    };

    let mut commands = Vec::new();
    if let Some(name) = fields.get("name") {
        if id == HUB_DEVICE_ID {
            return Err(CommandError::NotAllowed { id, what: "rename" });
        }
        let name = name.as_str().ok_or(CommandError::InvalidValue { field: "name" })?;
        commands.push(BridgeCommand::Rename(name.to_string()));
    }
    if let Some(state) = fields.get("state") {
        let state = state.as_str().ok_or(CommandError::InvalidValue { field: "state" })?;
        match state.to_ascii_lowercase().as_str() {
            "test alarm" => commands.push(BridgeCommand::TestAlarm),
            "silence" if id == HUB_DEVICE_ID => commands.push(BridgeCommand::Silence),
            "silence" => return Err(CommandError::NotAllowed { id, what: "silence" }),
            _ => return Err(CommandError::UnknownState(state.to_string())),
        }
    }
    if let Some(join) = fields.get("permit_join") {
        if id != HUB_DEVICE_ID {
            return Err(CommandError::NotAllowed { id, what: "permit_join" });
        }
        let join = join.as_bool().ok_or(CommandError::InvalidValue { field: "permit_join" })?;
        commands.push(BridgeCommand::PermitJoin(join));
    }
    if let Some(remove) = fields.get("remove") {
        if id == HUB_DEVICE_ID {
            return Err(CommandError::NotAllowed { id, what: "remove" });
        }
        if remove.as_bool().ok_or(CommandError::InvalidValue { field: "remove" })? {
            commands.push(BridgeCommand::Remove);
        }
    }
    if let Some(replace) = fields.get("replace") {
        if id == HUB_DEVICE_ID {
            return Err(CommandError::NotAllowed { id, what: "replace" });
        }
        let replace = replace.as_bool().ok_or(CommandError::InvalidValue { field: "replace" })?;
        commands.push(BridgeCommand::Replace(replace));
    }

    if commands.is_empty() {
        return Err(CommandError::Empty);
    }
    Ok(commands)
}

/// Execute a parsed command against the hub. Returns whether it was sent.
pub async fn execute<T: Transport>(hub: &K1Hub<T>, id: u32, command: &BridgeCommand) -> Result<bool> {
    info!("Device {id}: {command:?}");
    match command {
        BridgeCommand::Rename(name) => hub.set_device_name(id, name).await,
        BridgeCommand::TestAlarm => hub.set_device_state(id, TEST_ALARM_STATUS).await,
        BridgeCommand::Silence => hub.set_device_state(HUB_DEVICE_ID, SILENCE_STATUS).await,
        BridgeCommand::PermitJoin(true) => hub.permit_join().await.map(|_| true),
        BridgeCommand::PermitJoin(false) => hub.cancel_permit_join().await.map(|_| true),
        BridgeCommand::Remove => hub.remove_device(id, true).await,
        BridgeCommand::Replace(true) => hub.replace_device(id).await,
        BridgeCommand::Replace(false) => hub.cancel_permit_join().await.map(|_| true),
    }
}

/// Parse and run every command in a payload. Failures are logged.
pub async fn handle_command_payload<T: Transport>(hub: &K1Hub<T>, id: u32, payload: &str) {
    let commands = match parse_command(id, payload) {
        Ok(commands) => commands,
        Err(e) => {
            warn!("Ignoring command for device {id}: {e}");
            return;
        }
    };
    for command in &commands {
        match execute(hub, id, command).await {
            Ok(true) => {}
            Ok(false) => warn!("Device {id}: {command:?} was not sent"),
            Err(e) => warn!("Device {id}: {command:?} failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{DeviceCategory, DeviceState};

    #[test]
    fn test_topics() {
        assert_eq!(device_topic("home", 3), "home/elro/3");
        assert_eq!(command_filter("home"), "home/elro/+/set");
        assert_eq!(discovery_topic(3), "homeassistant/sensor/elro_k1/3/config");
        assert_eq!(parse_command_topic("home", "home/elro/12/set"), Some(12));
        assert_eq!(parse_command_topic("home", "home/elro/x/set"), None);
        assert_eq!(parse_command_topic("home", "other/elro/1/set"), None);
        assert_eq!(parse_command_topic("home", "home/elro/1"), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(2, r#"{"name":"Kitchen"}"#),
            Ok(vec![BridgeCommand::Rename("Kitchen".into())])
        );
        assert_eq!(parse_command(2, r#"{"state":"test alarm"}"#), Ok(vec![BridgeCommand::TestAlarm]));
        assert_eq!(parse_command(0, r#"{"state":"silence"}"#), Ok(vec![BridgeCommand::Silence]));
        assert_eq!(
            parse_command(0, r#"{"permit_join":false}"#),
            Ok(vec![BridgeCommand::PermitJoin(false)])
        );
        assert_eq!(parse_command(4, r#"{"remove":true}"#), Ok(vec![BridgeCommand::Remove]));
        assert_eq!(parse_command(4, r#"{"replace":false}"#), Ok(vec![BridgeCommand::Replace(false)]));
    }

    #[test]
    fn test_parse_quoted_payload() {
        assert_eq!(
            parse_command(0, r#""{\"permit_join\":true}""#),
            Ok(vec![BridgeCommand::PermitJoin(true)])
        );
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(parse_command(1, "not json"), Err(CommandError::NotAnObject(_))));
        assert!(matches!(parse_command(1, "[1]"), Err(CommandError::NotAnObject(_))));
        assert_eq!(parse_command(0, r#"{"name":"x"}"#), Err(CommandError::NotAllowed { id: 0, what: "rename" }));
        assert_eq!(parse_command(3, r#"{"state":"silence"}"#), Err(CommandError::NotAllowed { id: 3, what: "silence" }));
        assert_eq!(parse_command(3, r#"{"permit_join":true}"#), Err(CommandError::NotAllowed { id: 3, what: "permit_join" }));
        assert_eq!(parse_command(3, r#"{"state":"dance"}"#), Err(CommandError::UnknownState("dance".into())));
        assert_eq!(parse_command(3, r#"{"remove":"yes"}"#), Err(CommandError::InvalidValue { field: "remove" }));
        assert_eq!(parse_command(3, r#"{"remove":false}"#), Err(CommandError::Empty));
        assert_eq!(parse_command(3, "{}"), Err(CommandError::Empty));
    }

    #[test]
    fn test_discovery_config() {
        let device = DeviceSnapshot {
            id: 7,
            name: String::new(),
            type_id: "0000".into(),
            category: DeviceCategory::CoAlarm,
            state: DeviceState::Normal,
            battery_level: Some(80),
            signal_strength: None,
        };
        let config = DiscoveryConfig::for_device("home", &device);
        assert_eq!(config.name, "ELRO K1 device 7");
        assert_eq!(config.state_topic, "home/elro/7");
        assert_eq!(config.json_attributes_topic, "home/elro/7");
        assert_eq!(config.unique_id, "elro_k1_device_7");
        assert_eq!(config.value_template, "{{ value_json.state }}");
    }
}
