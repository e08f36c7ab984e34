use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod dashboard;
pub mod intent;
pub mod panel;
pub mod staleness;
pub mod store;
pub mod view;
pub mod wire;

pub type GroupId = String;

/// Keys ending in this suffix carry a device switch state (`light_state: "ON"`).
pub const DEVICE_STATE_SUFFIX: &str = "_state";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Manual,
    Auto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Auto => "auto",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Manual => "Manual",
            Mode::Auto => "Auto",
        }
    }

    /// Mode selected by a toggle whose resulting state is `checked`.
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            Mode::Auto
        } else {
            Mode::Manual
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Mode::Auto)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "auto" => Ok(Mode::Auto),
            other => Err(format!("Unknown mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::On => "ON",
            DeviceState::Off => "OFF",
        }
    }

    pub fn from_checked(checked: bool) -> Self {
        if checked {
            DeviceState::On
        } else {
            DeviceState::Off
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, DeviceState::On)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_uppercase().as_str() {
            "ON" => Ok(DeviceState::On),
            "OFF" => Ok(DeviceState::Off),
            other => Err(format!("Unknown device state: {other}")),
        }
    }
}

/// A single sensor reading as pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Flag(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Number(number) => serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(text) => Value::String(text),
            FieldValue::Flag(flag) => Value::Bool(flag),
        }
    }
}

/// Whatever the server said about one group in a single push.
///
/// Pushes are flat JSON objects. `mode`, `interval` and `<device>_state` keys
/// are lifted into typed slots; every other scalar lands in `fields`. Values
/// that carry no usable information (`null`, nested objects, unknown enum
/// strings) are dropped rather than rejected, so a sloppy push never erases
/// what is already known. A group whose whole value is not an object still
/// counts as present in the snapshot, just with nothing to merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Map<String, Value>")]
pub struct PartialGroupData {
    pub mode: Option<Mode>,
    pub interval_ms: Option<u64>,
    pub devices: BTreeMap<String, DeviceState>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl PartialGroupData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    pub fn with_device(mut self, device: &str, state: DeviceState) -> Self {
        self.devices.insert(device.to_string(), state);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    fn absorb(&mut self, key: String, value: Value) {
        match key.as_str() {
            "mode" => {
                if let Some(mode) = value.as_str().and_then(|raw| raw.parse::<Mode>().ok()) {
                    self.mode = Some(mode);
                }
                return;
            }
            "interval" | "interval_ms" => {
                self.interval_ms = value.as_u64().or_else(|| {
                    value
                        .as_f64()
                        .filter(|ms| ms.is_finite() && *ms >= 0.0)
                        .map(|ms| ms.round() as u64)
                });
                return;
            }
            _ => {}
        }

        if let Some(device) = key.strip_suffix(DEVICE_STATE_SUFFIX) {
            let state = value
                .as_str()
                .and_then(|raw| raw.parse::<DeviceState>().ok());
            if let Some(state) = state.filter(|_| !device.is_empty()) {
                self.devices.insert(device.to_string(), state);
                return;
            }
        }

        let field = match value {
            Value::Number(number) => number.as_f64().map(FieldValue::Number),
            Value::String(text) => Some(FieldValue::Text(text)),
            Value::Bool(flag) => Some(FieldValue::Flag(flag)),
            _ => None,
        };
        if let Some(field) = field {
            self.fields.insert(key, field);
        }
    }
}

impl From<Map<String, Value>> for PartialGroupData {
    fn from(map: Map<String, Value>) -> Self {
        let mut data = PartialGroupData::default();
        for (key, value) in map {
            data.absorb(key, value);
        }
        data
    }
}

impl From<Value> for PartialGroupData {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            _ => PartialGroupData::default(),
        }
    }
}

impl From<PartialGroupData> for Map<String, Value> {
    fn from(data: PartialGroupData) -> Self {
        let mut map = Map::new();
        for (key, field) in data.fields {
            map.insert(key, field.into());
        }
        for (device, state) in data.devices {
            map.insert(
                format!("{device}{DEVICE_STATE_SUFFIX}"),
                Value::String(state.as_str().to_string()),
            );
        }
        if let Some(mode) = data.mode {
            map.insert("mode".to_string(), Value::String(mode.as_str().to_string()));
        }
        if let Some(interval_ms) = data.interval_ms {
            map.insert("interval".to_string(), Value::from(interval_ms));
        }
        map
    }
}

/// Local mirror of one tracked group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub id: GroupId,
    pub mode: Mode,
    pub fields: BTreeMap<String, FieldValue>,
    pub device_states: BTreeMap<String, DeviceState>,
    pub update_interval_ms: Option<u64>,
}

impl GroupEntry {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            mode: Mode::default(),
            fields: BTreeMap::new(),
            device_states: BTreeMap::new(),
            update_interval_ms: None,
        }
    }

    /// Shallow union: incoming keys overwrite, absent keys are kept.
    /// Returns whether anything visible changed.
    pub fn merge(&mut self, data: PartialGroupData) -> bool {
        let mut changed = false;
        if let Some(mode) = data.mode {
            changed |= self.mode != mode;
            self.mode = mode;
        }
        if let Some(interval_ms) = data.interval_ms {
            changed |= self.update_interval_ms != Some(interval_ms);
            self.update_interval_ms = Some(interval_ms);
        }
        for (device, state) in data.devices {
            changed |= self.device_states.insert(device, state) != Some(state);
        }
        for (key, value) in data.fields {
            if self.fields.get(&key) != Some(&value) {
                changed = true;
                self.fields.insert(key, value);
            }
        }
        changed
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn device_state(&self, device: &str) -> Option<DeviceState> {
        self.device_states.get(device).copied()
    }
}
