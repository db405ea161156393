//! Job payload: opaque JSON to the scheduler except for one required field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delivery lane a submission is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Realtime,
    Delay,
    Unique,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Realtime => "realtime",
            Mode::Delay => "delay",
            Mode::Unique => "unique",
        }
    }
}

/// A job payload. Opaque to the scheduler except for `cmd`, which the
/// Dispatcher uses for routing. Additional fields, including `unique_id`, are
/// payload for the handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPayload(Map<String, Value>);

impl JobPayload {
    /// Builds a payload from a field map plus the required `cmd`, overwriting
    /// any `cmd` field already present in `fields`.
    pub fn new(cmd: &str, mut fields: Map<String, Value>) -> Self {
        fields.insert("cmd".to_string(), Value::String(cmd.to_string()));
        Self(fields)
    }

    pub fn cmd(&self) -> Option<&str> {
        self.0.get("cmd").and_then(Value::as_str)
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.0.get("unique_id").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let map: Map<String, Value> = serde_json::from_str(s)?;
        Ok(Self(map))
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// The envelope a delay bucket stores: `{"group": g, "job": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayEnvelope {
    pub group: String,
    pub job: JobPayload,
}

/// A logged entry in the `success` or `failed` list: `{data, time, return}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub data: JobPayload,
    pub time: i64,
    #[serde(rename = "return")]
    pub result: Value,
}
