// MIT License - Copyright (c) 2026 Peter Wright
// Envelope and hex field codec for the K1 hub protocol

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::constants::{ENCODED_NAME_HEX_LEN, HUB_ACK, MAX_NAME_LEN, NAME_PAD, NAME_TERMINATOR};
use crate::error::{DecodeError, K1Error, Result};
use crate::protocol::HubData;

/// A decoded inbound datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `{ST_answer_OK}`: the hub acknowledging our last frame. Nothing to do.
    KeepAliveAck,
    /// A JSON envelope carrying a hub message.
    Message(HubParams),
}

/// The `params` object of an inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct HubParams {
    /// Hub token echoed back in `devTid`, when present
    pub dev_tid: Option<String>,
    /// The message payload
    pub data: HubData,
}

#[derive(Deserialize)]
struct RawEnvelope {
    params: Option<RawParams>,
}

#[derive(Deserialize)]
struct RawParams {
    #[serde(rename = "devTid", default)]
    dev_tid: Option<String>,
    #[serde(default)]
    data: Option<HubData>,
}

/// Wrap a command payload in the `appSend` envelope the hub expects.
///
/// The payload is a JSON object rendered by the caller and is embedded
/// verbatim, so its field order is what goes on the wire.
pub fn encode_envelope(
    msg_id: u64,
    device_token: &str,
    ctrl_key: &str,
    app_id: &str,
    payload: &str,
) -> String {
    format!(
        "{{\"msgId\":{msg_id},\"action\":\"appSend\",\"params\":{{\"devTid\":\"{device_token}\",\"ctrlKey\":\"{ctrl_key}\",\"appTid\":\"{app_id}\",\"data\":{payload}}}}}"
    )
}

/// Turn a raw datagram into text, dropping the trailing line break and NUL
/// padding some hub firmware appends.
pub fn normalize_datagram(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Decode a datagram into a hub message.
///
/// Anything that is not the keep-alive acknowledgement and does not start
/// with `{` is rejected, as are envelopes without `params.data`.
pub fn decode_envelope(raw: &[u8]) -> std::result::Result<Inbound, DecodeError> {
    let text = normalize_datagram(raw);
    if text == HUB_ACK {
        return Ok(Inbound::KeepAliveAck);
    }
    if !text.starts_with('{') {
        return Err(DecodeError::NotAnEnvelope { text });
    }

    let envelope: RawEnvelope = serde_json::from_str(&text)?;
    let params = envelope.params.ok_or(DecodeError::MissingData)?;
    let data = params.data.ok_or(DecodeError::MissingData)?;
    Ok(Inbound::Message(HubParams {
        dev_tid: params.dev_tid,
        data,
    }))
}

/// Decode a 16-byte hex name field into text.
///
/// Padding and terminator characters are stripped, so an all-padding field
/// gives `Some("")`. Returns `None` when the field is not exactly 32 hex digits.
pub fn decode_ascii_name(hex: &str) -> Option<String> {
    if hex.len() != ENCODED_NAME_HEX_LEN {
        return None;
    }
    let bytes = hex_to_bytes(hex)?;
    Some(
        bytes
            .into_iter()
            .map(char::from)
            .filter(|&c| c != NAME_PAD && c != NAME_TERMINATOR)
            .collect(),
    )
}

/// Like [`decode_ascii_name`], with an empty string for undecodable fields.
pub fn extract_ascii_name(hex: &str) -> String {
    decode_ascii_name(hex).unwrap_or_default()
}

/// Encode a device name into the 16-byte hex name field.
///
/// The name is left-padded with `@` to 15 characters and terminated with `$`.
pub fn encode_ascii(name: &str) -> Result<String> {
    let invalid = |reason: &str| K1Error::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if !name.is_ascii() {
        return Err(invalid("only ASCII characters are supported"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("longer than 15 characters"));
    }
    if name.contains([NAME_PAD, NAME_TERMINATOR]) {
        return Err(invalid("'@' and '$' are reserved"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("control characters are not allowed"));
    }

    let padded = format!("{name:@>width$}{NAME_TERMINATOR}", width = MAX_NAME_LEN);
    Ok(padded.bytes().map(|b| format!("{b:02x}")).collect())
}

/// One-byte checksum over a hex string: the sum of its bytes modulo 256,
/// as two lowercase hex digits.
///
/// Not yet confirmed against a real hub; a hub that rejects the roster sync
/// would point at this algorithm.
pub fn crc(hex: &str) -> String {
    let sum = hex
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .fold(0u8, |acc, byte| acc.wrapping_add(byte));
    format!("{sum:02x}")
}

/// Build the `device_status` blob for a roster sync.
///
/// Each entry is the device id as four hex digits followed by its last known
/// status, in ascending id order, and the whole blob is closed by its [`crc`].
/// An empty roster gives an empty payload.
pub fn build_sync_status_payload(roster: &BTreeMap<u32, String>) -> String {
    if roster.is_empty() {
        return String::new();
    }
    let blob: String = roster
        .iter()
        .map(|(id, status)| format!("{id:04x}{status}"))
        .collect();
    let check = crc(&blob);
    blob + &check
}

/// Parse a hex string of even length into bytes.
pub fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
        })
        .collect()
}
