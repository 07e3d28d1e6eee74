//! Channel wire format: the JSON envelope and its encode/decode helpers.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("envelope encode error: {0}")]
    Encode(serde_json::Error),

    #[error("envelope decode error: {0}")]
    Decode(serde_json::Error),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit exchanged on the shared channel.
///
/// Every envelope carries a `room` tag and a `type`. The fields this service
/// interprets are explicit; anything else a client attaches (patch payloads,
/// sync markers, message ids) rides along in `extra` and is rebroadcast
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub room: String,

    #[serde(rename = "type", default)]
    pub kind: Kind,

    /// Submitted editor contents. Removed before rebroadcast of a run
    /// envelope that produced output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    /// Language key for run requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Captured execution output, attached by the dispatcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,

    /// Client-to-client fields this service does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Envelope type tag. Frames with no `type` field are edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    #[default]
    Edit,
    Run,
    Result,
    /// A type this service does not interpret; preserved on rebroadcast.
    Other(String),
}

impl From<String> for Kind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "edit" => Kind::Edit,
            "run" => Kind::Run,
            "result" => Kind::Result,
            _ => Kind::Other(s),
        }
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Edit => "edit".to_string(),
            Kind::Run => "run".to_string(),
            Kind::Result => "result".to_string(),
            Kind::Other(s) => s,
        }
    }
}

impl Envelope {
    /// Build an edit envelope carrying the full editor contents.
    pub fn edit(room: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            kind: Kind::Edit,
            full_text: Some(full_text.into()),
            ..Default::default()
        }
    }

    /// Build a run request envelope.
    pub fn run(
        room: impl Into<String>,
        language: impl Into<String>,
        full_text: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            kind: Kind::Run,
            language: Some(language.into()),
            full_text: Some(full_text.into()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode helpers
// ---------------------------------------------------------------------------

pub fn encode(envelope: &Envelope) -> Result<String, BusError> {
    serde_json::to_string(envelope).map_err(BusError::Encode)
}

pub fn decode(payload: &str) -> Result<Envelope, BusError> {
    serde_json::from_str(payload).map_err(BusError::Decode)
}

/// Extract the `room` tag from a raw payload without decoding the full
/// envelope. Returns `None` for malformed JSON or a missing/non-string room.
pub fn peek_room(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value.get("room")?.as_str().map(String::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
