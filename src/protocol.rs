// MIT License - Copyright (c) 2026 Peter Wright
// Command payloads and inbound message records

use serde::{Deserialize, Deserializer};

use crate::constants::{CmdId, HANDSHAKE_NAME_PREFIX, NAME_OVER};

/// Commands that can be sent to the K1 hub.
///
/// Each renders to the JSON text placed in `params.data` of the outbound
/// envelope. The hub is sensitive to the exact layout, so payloads are
/// written out literally rather than serialized from a struct.
///
/// # Start-up
///
/// After the `IOT_KEY?` handshake the session sends, in order:
///
/// ```text
/// SynDeviceStatus (empty), SynScene 0, GetDeviceNames,
/// (5s later) SynDeviceStatus <roster>
/// ```
///
/// # Idle polling
///
/// ```text
/// every 30s: SyncDevices, GetDeviceNames
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `cmdId 1`: set the status code of a device (`00` silences, `17` tests).
    EquipmentControl { id: u32, status: String },
    /// `cmdId 2`: let new devices pair with the hub.
    PermitJoin,
    /// `cmdId 7`: stop pairing.
    CancelPermitJoin,
    /// `cmdId 3`: replace a device in its slot. The hub pairs the next device.
    Replace,
    /// `cmdId 4`: delete a device from the hub.
    Delete { id: u32 },
    /// `cmdId 5`: rename a device. `encoded_name` is the hex name field plus checksum.
    ModifyName { id: u32, encoded_name: String },
    /// `cmdId 14`: ask the hub to send every device name.
    GetDeviceNames,
    /// `cmdId 15`: ask the hub to send every device status.
    SyncDevices,
    /// `cmdId 29`: send our roster checksum; the hub answers with what differs.
    SyncDeviceStatus { payload: String },
    /// `cmdId 31`: request the scenes of a scene group.
    SyncScenes { group: u32 },
}

impl Command {
    /// The command id carried in the payload.
    pub fn cmd_id(&self) -> CmdId {
        match self {
            Command::EquipmentControl { .. } => CmdId::EquipmentControl,
            Command::PermitJoin => CmdId::IncreaseEquipment,
            Command::CancelPermitJoin => CmdId::CancelIncreaseEquipment,
            Command::Replace => CmdId::ReplaceEquipment,
            Command::Delete { .. } => CmdId::DeleteEquipment,
            Command::ModifyName { .. } => CmdId::ModifyEquipmentName,
            Command::GetDeviceNames => CmdId::GetDeviceName,
            Command::SyncDevices => CmdId::GetAllEquipmentStatus,
            Command::SyncDeviceStatus { .. } => CmdId::SynDeviceStatus,
            Command::SyncScenes { .. } => CmdId::SynScene,
        }
    }

    /// Render the payload JSON text.
    pub fn to_payload(&self) -> String {
        let cmd = self.cmd_id().value();
        match self {
            Command::EquipmentControl { id, status } => format!(
                "{{\"cmdId\":{cmd},\"device_ID\":{id},\"device_status\":\"{status}000000\"}}"
            ),
            Command::PermitJoin | Command::CancelPermitJoin | Command::Replace => {
                format!("{{\"cmdId\":{cmd}}}")
            }
            Command::Delete { id } => format!("{{\"cmdId\":{cmd},\"device_ID\":{id}}}"),
            Command::ModifyName { id, encoded_name } => format!(
                "{{\"cmdId\":{cmd},\"device_ID\":{id},\"device_name\":\"{encoded_name}\"}}"
            ),
            Command::GetDeviceNames => format!("{{\"cmdId\":{cmd},\"device_ID\":0}}"),
            Command::SyncDevices => format!("{{\"cmdId\":{cmd},\"device_status\":\"\"}}"),
            Command::SyncDeviceStatus { payload } => {
                format!("{{\"cmdId\":{cmd},\"device_status\":\"{payload}\"}}")
            }
            Command::SyncScenes { group } => format!(
                "{{\"cmdId\":{cmd},\"sence_group\":{group},\"answer_content\":\"\",\"scene_content\":\"\"}}"
            ),
        }
    }
}

/// The `params.data` record of an inbound hub message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HubData {
    #[serde(rename = "cmdId")]
    pub cmd_id: i64,
    #[serde(rename = "device_ID", default, deserialize_with = "deserialize_device_id")]
    pub device_id: Option<u32>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default)]
    pub answer_content: Option<String>,
}

impl HubData {
    pub fn cmd(&self) -> Option<CmdId> {
        CmdId::from_i64(self.cmd_id)
    }
}

// The hub sends ids as numbers, but some firmware quotes them.
fn deserialize_device_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u32),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid device_ID: {text}"))),
    }
}

/// A full device status as reported by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub device_id: u32,
    /// Raw 4-hex-digit type code, or a marker such as `DEL`
    pub device_name: String,
    /// Status hex `SSBBTT..CC`
    pub device_status: String,
}

impl StatusRecord {
    /// Build a record from a `DEVICE_STATUS_UPDATE` payload.
    pub fn from_hub_data(data: &HubData) -> Option<Self> {
        Some(Self {
            device_id: data.device_id?,
            device_name: data.device_name.clone()?,
            device_status: data.device_status.clone().unwrap_or_default(),
        })
    }

    /// Build a record from the `answer_content` of a `DEVICE_ALARM_TRIGGER`.
    ///
    /// Layout: six leading characters, then device id (4 hex), type code (4)
    /// and status (8).
    pub fn from_alarm_trigger(content: &str) -> Option<Self> {
        let id = u32::from_str_radix(content.get(6..10)?, 16).ok()?;
        Some(Self {
            device_id: id,
            device_name: content.get(10..14)?.to_string(),
            device_status: content.get(14..22)?.to_string(),
        })
    }
}

/// Parsed `DEVICE_NAME_REPLY` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameReply {
    /// End of the name list
    Over,
    /// Name hex for a device id
    Name { id: u32, encoded: String },
}

/// Parse the `answer_content` of a name reply: 4 hex digits of id, then the name field.
pub fn parse_name_reply(answer: &str) -> Option<NameReply> {
    if answer == NAME_OVER {
        return Some(NameReply::Over);
    }
    let id = u32::from_str_radix(answer.get(0..4)?, 16).ok()?;
    Some(NameReply::Name {
        id,
        encoded: answer.get(4..)?.to_string(),
    })
}

/// Keys learned from a handshake reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeKeys {
    pub ctrl_key: Option<String>,
    pub bind_key: Option<String>,
}

/// Check a datagram for the handshake reply to `device_token`.
///
/// Returns `None` unless the text contains `NAME:<token>`. Lines containing
/// `BIND` carry the bind key and other lines containing `KEY` the control key;
/// the value is everything after the first colon.
pub fn parse_handshake_reply(text: &str, device_token: &str) -> Option<HandshakeKeys> {
    let marker = format!("{HANDSHAKE_NAME_PREFIX}{device_token}");
    if !text.contains(&marker) {
        return None;
    }

    let mut keys = HandshakeKeys::default();
    for line in text.lines() {
        let Some((_, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if line.contains("BIND") {
            keys.bind_key = Some(value);
        } else if line.contains("KEY") {
            keys.ctrl_key = Some(value);
        }
    }
    Some(keys)
}
