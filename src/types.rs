use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing_error::SpanTrace;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ToolCallId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn short(&self) -> &str {
        crate::str_utils::prefix_chars(&self.0, 8)
    }
}

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", Uuid::new_v4().simple()))
    }

    pub fn short(&self) -> &str {
        crate::str_utils::prefix_chars(&self.0, 12)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for ToolCallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum PalaverError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upstream error (status {0}): {1}")]
    Upstream(u16, String),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Invalid stream lifecycle: {0}")]
    Lifecycle(String),

    #[error("Internal error: {0}")]
    Internal(String, SpanTrace),
}

#[derive(Debug)]
pub struct ObservedError {
    pub inner: PalaverError,
    pub span_trace: SpanTrace,
}

impl fmt::Display for ObservedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<PalaverError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;

/// --- TRANSCRIPT MODEL ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Pending,
    Streaming,
    Complete,
    Errored,
}

/// Why a turn ended in `Errored`. `Cancelled` stays distinct so a consumer
/// can render "stopped" rather than "failed".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Transport,
    Upstream,
    Cancelled,
    Truncated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFailure {
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        content: String,
    },
    ToolCall {
        id: ToolCallId,
        name: String,
        arguments: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        status: ToolCallStatus,
    },
    Media {
        kind: MediaKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
    pub status: TurnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StreamFailure>,
}

impl Turn {
    pub fn user(text: String) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text { content: text }],
            status: TurnStatus::Complete,
            failure: None,
        }
    }

    pub fn assistant_streaming() -> Self {
        Self {
            role: Role::Assistant,
            parts: Vec::new(),
            status: TurnStatus::Streaming,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TurnStatus::Complete | TurnStatus::Errored)
    }

    /// Concatenated text content, ignoring tool calls and media.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { content } = part {
                out.push_str(content);
            }
        }
        out
    }
}

/// Ordered conversation state for one session. Mutated only through the
/// reducer while a stream is active; consumers read immutable snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Transcript {
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Index of the assistant turn still in `Streaming`, if any. The reducer
    /// keeps this unique per transcript.
    pub fn streaming_turn_index(&self) -> Option<usize> {
        self.turns
            .iter()
            .rposition(|t| t.role == Role::Assistant && t.status == TurnStatus::Streaming)
    }

    pub fn has_tool_call(&self, turn_index: usize, id: &ToolCallId) -> bool {
        self.turns
            .get(turn_index)
            .map(|t| {
                t.parts
                    .iter()
                    .any(|p| matches!(p, ContentPart::ToolCall { id: pid, .. } if pid == id))
            })
            .unwrap_or(false)
    }
}

/// --- WIRE EVENTS ---

/// One decoded record of the inbound stream. The `type` discriminator is the
/// only required field; everything else is per-type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    RunStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    ContentDelta {
        #[serde(default)]
        content: String,
    },
    ToolCallStarted {
        id: String,
        name: String,
    },
    ToolCallDelta {
        id: String,
        #[serde(default)]
        arguments: String,
    },
    ToolCallCompleted {
        id: String,
        #[serde(default)]
        result: serde_json::Value,
    },
    MediaAttached {
        kind: MediaKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    RunCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<u16>,
    },
}

#[derive(Debug)]
pub enum WireLine {
    Event(WireEvent),
    /// Valid JSON with an unrecognized or missing `type`. Logged, skipped.
    Unknown(String),
    /// Not decodable at all. Logged, skipped; never fatal to the stream.
    Malformed(String),
}

pub fn parse_wire_line(data: &str) -> WireLine {
    if data.len() > crate::constants::MAX_RECORD_BYTES {
        return WireLine::Malformed(format!("record too large: {} bytes", data.len()));
    }
    if let Ok(event) = serde_json::from_str::<WireEvent>(data) {
        return WireLine::Event(event);
    }
    // Distinguish "valid JSON we don't understand" from garbage: the former
    // is forward compatibility, the latter is a malformed frame.
    if serde_json::from_str::<serde_json::Value>(data).is_ok() {
        let snippet = crate::str_utils::prefix_chars(data, 200);
        tracing::debug!("[STREAM] Unknown record type: {}", snippet);
        return WireLine::Unknown(data.to_string());
    }
    WireLine::Malformed(crate::str_utils::prefix_chars(data, 200).to_string())
}
