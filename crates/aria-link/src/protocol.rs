//! Wire protocol for the peripheral link
//!
//! Commands are a single opcode byte, optionally followed by a raw payload.
//! There is no length prefix beyond what each opcode implies. Inbound
//! telemetry frames are a fixed 3 bytes; the discovery reply carries a
//! variable-length device name.

use chrono::Utc;

use crate::telemetry::{AlertKind, TemperatureAlert};

/// Stop audio playback
pub const STOP: u8 = 0xA0;
/// Begin an audio stream
pub const AUDIO_STREAM_START: u8 = 0xA3;
/// One chunk of audio stream data follows the opcode
pub const AUDIO_STREAM_DATA: u8 = 0xA4;
/// End the audio stream
pub const AUDIO_STREAM_END: u8 = 0xA5;
/// Ask the device to identify itself
pub const DISCOVERY_PROBE: u8 = 0xA6;

/// Temperature returned to normal
pub const TEMP_NORMAL: u8 = 0xD0;
/// First temperature threshold (28 °C) reached
pub const TEMP_THRESHOLD1: u8 = 0xD1;
/// Second temperature threshold (35 °C) reached
pub const TEMP_THRESHOLD2: u8 = 0xD2;
/// Periodic temperature update
pub const TEMP_UPDATE: u8 = 0xD3;
/// Identification reply, followed by the device name
pub const DISCOVERY_REPLY: u8 = 0xD5;

/// Telemetry frames are exactly `[opcode][temp hi][temp lo]`
pub const TELEMETRY_FRAME_LEN: usize = 3;

pub const THRESHOLD1_CELSIUS: u32 = 28;
pub const THRESHOLD2_CELSIUS: u32 = 35;

/// Frame an outbound command as a single contiguous write
pub fn encode_command(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(opcode);
    frame.extend_from_slice(payload);
    frame
}

/// Decode a 3-byte telemetry frame into an alert
///
/// The temperature is a big-endian 16-bit value in tenths of a degree.
/// Returns None for opcodes that are not temperature telemetry.
pub fn decode_telemetry(frame: &[u8; TELEMETRY_FRAME_LEN]) -> Option<TemperatureAlert> {
    let raw = u16::from_be_bytes([frame[1], frame[2]]);
    let temperature = f64::from(raw) / 10.0;
    let timestamp = Utc::now().timestamp();

    let (kind, threshold, message) = match frame[0] {
        TEMP_THRESHOLD1 => (
            AlertKind::Threshold1,
            Some(THRESHOLD1_CELSIUS),
            format!(
                "Temperature reached {:.1}°C, fan engaged (threshold: {}°C)",
                temperature, THRESHOLD1_CELSIUS
            ),
        ),
        TEMP_THRESHOLD2 => (
            AlertKind::Threshold2,
            Some(THRESHOLD2_CELSIUS),
            format!(
                "Temperature reached {:.1}°C, buzzer alarm (threshold: {}°C)",
                temperature, THRESHOLD2_CELSIUS
            ),
        ),
        TEMP_NORMAL => (
            AlertKind::Normal,
            None,
            format!("Temperature back to normal (current: {:.1}°C)", temperature),
        ),
        TEMP_UPDATE => (
            AlertKind::PeriodicUpdate,
            None,
            format!("Current temperature: {:.1}°C", temperature),
        ),
        _ => return None,
    };

    Some(TemperatureAlert {
        kind,
        threshold,
        temperature,
        message,
        timestamp,
    })
}

/// Decode an identification reply: `0xD5` followed by the device name
///
/// Kept for the manual/legacy discovery path; the bulk sweep never sends the
/// probe that elicits this reply.
pub fn decode_discovery_reply(buf: &[u8]) -> Option<String> {
    if buf.len() < 2 || buf[0] != DISCOVERY_REPLY {
        return None;
    }
    Some(String::from_utf8_lossy(&buf[1..]).into_owned())
}
