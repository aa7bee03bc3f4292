use crate::types::{MediaKind, ToolCallId, WireEvent};

/// Semantic instruction derived from one wire record, applied to the
/// transcript by the reducer. Keeping these as plain values means the whole
/// ingestion path is message passing, not field mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenAssistantTurn,
    AppendText {
        delta: String,
    },
    OpenToolCall {
        id: ToolCallId,
        name: String,
    },
    AppendToolCallArgs {
        id: ToolCallId,
        delta: String,
    },
    CompleteToolCall {
        id: ToolCallId,
        result: serde_json::Value,
    },
    AttachMedia {
        kind: MediaKind,
        url: Option<String>,
        data: Option<String>,
        mime_type: Option<String>,
    },
    CompleteTurn,
    FailTurn {
        reason: crate::types::FailureReason,
        message: String,
    },
}

/// Maps one decoded record to zero or one [`Action`]. Pure: no transcript
/// access, no hidden state. Id-matching defense (unknown tool-call ids and
/// the like) belongs to the reducer, which owns the state to decide.
pub fn interpret(event: WireEvent) -> Option<Action> {
    match event {
        WireEvent::RunStarted { .. } => Some(Action::OpenAssistantTurn),
        WireEvent::ContentDelta { content } => {
            if content.is_empty() {
                None
            } else {
                Some(Action::AppendText { delta: content })
            }
        }
        WireEvent::ToolCallStarted { id, name } => Some(Action::OpenToolCall {
            id: ToolCallId(id),
            name,
        }),
        WireEvent::ToolCallDelta { id, arguments } => Some(Action::AppendToolCallArgs {
            id: ToolCallId(id),
            delta: arguments,
        }),
        WireEvent::ToolCallCompleted { id, result } => Some(Action::CompleteToolCall {
            id: ToolCallId(id),
            result,
        }),
        WireEvent::MediaAttached {
            kind,
            url,
            data,
            mime_type,
        } => Some(Action::AttachMedia {
            kind,
            url,
            data,
            mime_type,
        }),
        WireEvent::RunCompleted { .. } => Some(Action::CompleteTurn),
        WireEvent::RunError { message, code } => {
            let message = match code {
                Some(c) => format!("{} (code {})", message, c),
                None => message,
            };
            Some(Action::FailTurn {
                reason: crate::types::FailureReason::Upstream,
                message,
            })
        }
    }
}
