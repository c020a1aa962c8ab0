// MIT License - Copyright (c) 2026 Peter Wright
// Protocol constants

/// Default UDP port of the K1 hub.
pub const DEFAULT_HUB_PORT: u16 = 1025;

/// Handshake probe prefix; the device token is appended.
pub const KEY_REQUEST_PREFIX: &str = "IOT_KEY?";
/// Marker the hub puts in front of its own token in the handshake reply.
pub const HANDSHAKE_NAME_PREFIX: &str = "NAME:";
/// Keep-alive acknowledgement sent by the hub.
pub const HUB_ACK: &str = "{ST_answer_OK}";
/// Acknowledgement sent back for every dispatched hub message.
pub const APP_ACK: &str = "APP_answer_OK";
/// Terminates a run of device name replies.
pub const NAME_OVER: &str = "NAME_OVER";
/// `device_name` value in a status update meaning the device was deleted on the hub.
pub const DELETE_MARKER: &str = "DEL";
/// `device_name` value of the hub's own status heartbeat; carries no device data.
pub const HEARTBEAT_MARKER: &str = "STATUES";
/// Roster status used for ids learned only through a name reply.
pub const PLACEHOLDER_STATUS: &str = "0464AA00";

/// Id the hub uses for itself (silence, permit join).
pub const HUB_DEVICE_ID: u32 = 0;
/// Status code silencing all alarms.
pub const SILENCE_STATUS: &str = "00";
/// Status code triggering a test alarm on a device.
pub const TEST_ALARM_STATUS: &str = "17";

/// Maximum device name length accepted by the hub.
pub const MAX_NAME_LEN: usize = 15;
/// Hex length of an encoded device name (16 bytes).
pub const ENCODED_NAME_HEX_LEN: usize = 32;
/// Padding character in front of short names.
pub const NAME_PAD: char = '@';
/// Terminator after the name.
pub const NAME_TERMINATOR: char = '$';

/// Command identifiers carried in the `cmdId` field of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CmdId {
    SwitchTimer = -34,
    DeleteEquipmentDetail = -4,
    EquipmentControl = 1,
    IncreaseEquipment = 2,
    ReplaceEquipment = 3,
    DeleteEquipment = 4,
    ModifyEquipmentName = 5,
    ChooseSceneGroup = 6,
    CancelIncreaseEquipment = 7,
    IncreaseScene = 8,
    ModifyScene = 9,
    DeleteScene = 10,
    GetDeviceName = 14,
    GetAllEquipmentStatus = 15,
    DeviceNameReply = 17,
    GetAllSceneInfo = 18,
    DeviceStatusUpdate = 19,
    TimeCheck = 21,
    IncreaseSceneGroup = 23,
    ModifySceneGroup = 24,
    DeviceAlarmTrigger = 25,
    SceneStatusUpdate = 26,
    SynDeviceStatus = 29,
    SynDeviceName = 30,
    SynScene = 31,
    SceneHandle = 32,
    SceneGroupDelete = 33,
    ModelSwitchTimer = 34,
    ModelTimerSyn = 35,
    UploadModelTimer = 36,
    ModelTimerDel = 37,
    SendTimezone = 251,
}

impl CmdId {
    /// Look up a command id received on the wire.
    pub fn from_i64(value: i64) -> Option<Self> {
        Some(match value {
            -34 => Self::SwitchTimer,
            -4 => Self::DeleteEquipmentDetail,
            1 => Self::EquipmentControl,
            2 => Self::IncreaseEquipment,
            3 => Self::ReplaceEquipment,
            4 => Self::DeleteEquipment,
            5 => Self::ModifyEquipmentName,
            6 => Self::ChooseSceneGroup,
            7 => Self::CancelIncreaseEquipment,
            8 => Self::IncreaseScene,
            9 => Self::ModifyScene,
            10 => Self::DeleteScene,
            14 => Self::GetDeviceName,
            15 => Self::GetAllEquipmentStatus,
            17 => Self::DeviceNameReply,
            18 => Self::GetAllSceneInfo,
            19 => Self::DeviceStatusUpdate,
            21 => Self::TimeCheck,
            23 => Self::IncreaseSceneGroup,
            24 => Self::ModifySceneGroup,
            25 => Self::DeviceAlarmTrigger,
            26 => Self::SceneStatusUpdate,
            29 => Self::SynDeviceStatus,
            30 => Self::SynDeviceName,
            31 => Self::SynScene,
            32 => Self::SceneHandle,
            33 => Self::SceneGroupDelete,
            34 => Self::ModelSwitchTimer,
            35 => Self::ModelTimerSyn,
            36 => Self::UploadModelTimer,
            37 => Self::ModelTimerDel,
            251 => Self::SendTimezone,
            _ => return None,
        })
    }

    /// Numeric value written into outbound payloads.
    pub fn value(self) -> i32 {
        self as i32
    }
}

// Device type codes, grouped by family. Every alias of a family behaves the same;
// the raw code is kept on the device for display.

pub const CO_ALARM_CODES: &[&str] = &[
    "0000", "1000", "2000", "0008", "1008", "2008", "000E", "100E", "200E",
];
pub const SMOKE_ALARM_CODES: &[&str] = &[
    "0001", "1001", "2001", "0009", "1009", "2009", "000F", "100F", "200F",
];
pub const GAS_ALARM_CODES: &[&str] = &[
    "0002", "1002", "2002", "000A", "100A", "200A", "0010", "1010", "2010",
];
pub const HEAT_ALARM_CODES: &[&str] = &[
    "0003", "1003", "2003", "000B", "100B", "200B", "0011", "1011", "2011",
];
pub const WATER_ALARM_CODES: &[&str] = &[
    "0004", "1004", "2004", "000C", "100C", "200C", "0012", "1012", "2012",
];
pub const FIRE_ALARM_CODES: &[&str] = &[
    "0005", "1109", "2109", "000D", "100D", "200D", "0013", "1013", "2013",
];
pub const DOOR_WINDOW_SENSOR_CODES: &[&str] = &["0101", "1101", "2101"];
