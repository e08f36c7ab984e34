use crate::{DeviceState, GroupId, Mode, PartialGroupData};
use chrono::Utc;
use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;
pub const CURRENT_PROTOCOL_VERSION: u16 = 1;

pub const EVENT_UPDATE_DATA: &str = "update_data";
pub const EVENT_MODE_UPDATED: &str = "mode_updated";
pub const EVENT_GLOBAL_WEATHER_RESULT: &str = "global_weather_result";
pub const EVENT_WEATHER_ACTION_RESULT: &str = "weather_action_result";

/// Server pushes the dashboard consumes.
pub const INBOUND_EVENTS: [&str; 4] = [
    EVENT_UPDATE_DATA,
    EVENT_MODE_UPDATED,
    EVENT_GLOBAL_WEATHER_RESULT,
    EVENT_WEATHER_ACTION_RESULT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const CURRENT: Self = Self(CURRENT_PROTOCOL_VERSION);
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ProtocolVersionVisitor;

        impl<'de> Visitor<'de> for ProtocolVersionVisitor {
            type Value = ProtocolVersion;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a protocol version as an integer or numeric string")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let version = u16::try_from(value)
                    .map_err(|_| E::custom(format!("protocol version out of range: {value}")))?;
                Ok(ProtocolVersion(version))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let version = value.trim().parse::<u16>().map_err(|err| {
                    E::custom(format!("invalid protocol version '{value}': {err}"))
                })?;
                Ok(ProtocolVersion(version))
            }
        }

        deserializer.deserialize_any(ProtocolVersionVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEnvelope {
    #[serde(default)]
    pub version: ProtocolVersion,
    pub sender_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub msg: WireMsg,
}

impl WireEnvelope {
    pub fn new(sender_id: &str, msg: WireMsg) -> Self {
        Self {
            version: ProtocolVersion::CURRENT,
            sender_id: sender_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            msg,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.version.0 <= CURRENT_PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WireMsg {
    Hello(HelloPayload),
    Subscribe(SubscribePayload),
    UpdateData(BTreeMap<GroupId, PartialGroupData>),
    /// Raw per-group values; anything that is not a mode string is skipped
    /// when applied so one bad entry never costs the rest of the push.
    ModeUpdated(BTreeMap<GroupId, Value>),
    GlobalWeatherResult(WeatherResultPayload),
    WeatherActionResult(WeatherActionResultPayload),
    ModeChangeEvent(ModeChangePayload),
    ControlEvent(ControlPayload),
    GlobalModeChangeEvent(GlobalModeChangePayload),
    GlobalControlEvent(GlobalControlPayload),
    WeatherActionEvent(WeatherActionPayload),
    RequestGlobalWeather(RequestGlobalWeatherPayload),
}

impl WireMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            WireMsg::Hello(_) => "hello",
            WireMsg::Subscribe(_) => "subscribe",
            WireMsg::UpdateData(_) => EVENT_UPDATE_DATA,
            WireMsg::ModeUpdated(_) => EVENT_MODE_UPDATED,
            WireMsg::GlobalWeatherResult(_) => EVENT_GLOBAL_WEATHER_RESULT,
            WireMsg::WeatherActionResult(_) => EVENT_WEATHER_ACTION_RESULT,
            WireMsg::ModeChangeEvent(_) => "mode_change_event",
            WireMsg::ControlEvent(_) => "control_event",
            WireMsg::GlobalModeChangeEvent(_) => "global_mode_change_event",
            WireMsg::GlobalControlEvent(_) => "global_control_event",
            WireMsg::WeatherActionEvent(_) => "weather_action_event",
            WireMsg::RequestGlobalWeather(_) => "request_global_weather",
        }
    }

    pub fn is_inbound(&self) -> bool {
        INBOUND_EVENTS.contains(&self.event_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloPayload {
    pub client_id: String,
    pub role: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribePayload {
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeatherResultPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeatherActionResultPayload {
    #[serde(alias = "gh_id")]
    pub id: GroupId,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeChangePayload {
    #[serde(alias = "gh_id")]
    pub id: GroupId,
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlPayload {
    #[serde(alias = "gh_id")]
    pub id: GroupId,
    pub device: String,
    pub command: DeviceState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalModeChangePayload {
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalControlPayload {
    pub device: String,
    pub command: DeviceState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeatherActionPayload {
    #[serde(alias = "gh_id")]
    pub id: GroupId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestGlobalWeatherPayload {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("buffer exceeds max size without delimiter: {size} > {max}")]
    OversizedBuffer { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct DecodeReport<T> {
    pub frames: Vec<T>,
    pub errors: Vec<FrameError>,
}

impl<T> Default for DecodeReport<T> {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            errors: Vec::new(),
        }
    }
}

pub fn encode_frame<T: Serialize>(
    value: &T,
    max_frame_bytes: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut encoded =
        serde_json::to_vec(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    encoded.push(b'\n');
    Ok(encoded)
}

/// Incremental newline-delimited JSON decoder. A bad line costs one error
/// entry; decoding resumes at the next newline.
pub struct NdjsonFrameDecoder<T> {
    max_frame_bytes: usize,
    pending: Vec<u8>,
    marker: PhantomData<T>,
}

impl<T> NdjsonFrameDecoder<T> {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<T> Default for NdjsonFrameDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl<T: DeserializeOwned> NdjsonFrameDecoder<T> {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> DecodeReport<T> {
        let mut report = DecodeReport::default();
        self.pending.extend_from_slice(chunk);

        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if !line.is_empty() {
                self.decode_line(line, &mut report);
            }
        }

        if self.pending.len() > self.max_frame_bytes {
            report.errors.push(FrameError::OversizedBuffer {
                size: self.pending.len(),
                max: self.max_frame_bytes,
            });
            self.pending.clear();
        }

        report
    }

    pub fn finish(&mut self) -> DecodeReport<T> {
        let mut report = DecodeReport::default();
        let tail = std::mem::take(&mut self.pending);
        if !tail.is_empty() {
            self.decode_line(&tail, &mut report);
        }
        report
    }

    fn decode_line(&self, line: &[u8], report: &mut DecodeReport<T>) {
        if line.len() > self.max_frame_bytes {
            report.errors.push(FrameError::OversizedFrame {
                size: line.len(),
                max: self.max_frame_bytes,
            });
            return;
        }
        match serde_json::from_slice(line) {
            Ok(parsed) => report.frames.push(parsed),
            Err(err) => report.errors.push(FrameError::Decode(err.to_string())),
        }
    }
}

pub fn new_client_id() -> String {
    format!("greenhouse-dashboard-{}", uuid::Uuid::new_v4())
}
