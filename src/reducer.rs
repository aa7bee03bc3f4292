use crate::constants::UNKNOWN_TOOL_NAME;
use crate::interpret::Action;
use crate::types::{
    ContentPart, Role, StreamFailure, ToolCallStatus, Transcript, Turn, TurnStatus,
};

/// Applies one [`Action`] to a transcript, returning the next state.
///
/// Total: every action has a defined effect, including no-ops. Invariants
/// held across calls:
/// - at most one assistant turn is `Streaming` at any time;
/// - parts within a turn are append-only, deltas only touch the most recent
///   eligible part;
/// - a turn that reached `Complete` or `Errored` is frozen, late actions for
///   it are logged and dropped.
pub fn apply(mut state: Transcript, action: Action) -> Transcript {
    match action {
        Action::OpenAssistantTurn => {
            if state.streaming_turn_index().is_some() {
                tracing::warn!("[REDUCE] run_started while a turn is already streaming; ignored");
            } else {
                state.turns.push(Turn::assistant_streaming());
            }
        }
        Action::AppendText { delta } => {
            if let Some(idx) = open_turn(&mut state, "content delta") {
                let turn = &mut state.turns[idx];
                match turn.parts.last_mut() {
                    Some(ContentPart::Text { content }) => content.push_str(&delta),
                    _ => turn.parts.push(ContentPart::Text { content: delta }),
                }
            }
        }
        Action::OpenToolCall { id, name } => {
            if let Some(idx) = open_turn(&mut state, "tool call start") {
                if state.has_tool_call(idx, &id) {
                    tracing::warn!("[REDUCE] Duplicate tool_call_started for {}; ignored", id);
                } else {
                    state.turns[idx].parts.push(ContentPart::ToolCall {
                        id,
                        name,
                        arguments: String::new(),
                        result: None,
                        status: ToolCallStatus::Pending,
                    });
                }
            }
        }
        Action::AppendToolCallArgs { id, delta } => {
            if let Some(idx) = open_turn(&mut state, "tool call delta") {
                let turn = &mut state.turns[idx];
                let pos = turn
                    .parts
                    .iter()
                    .position(|p| matches!(p, ContentPart::ToolCall { id: pid, .. } if pid == &id));
                match pos {
                    Some(pos) => {
                        if let ContentPart::ToolCall { arguments, .. } = &mut turn.parts[pos] {
                            arguments.push_str(&delta);
                        }
                    }
                    None => {
                        // First delta for an unstarted call opens a pending
                        // placeholder; later deltas for the same id land on it.
                        tracing::warn!(
                            "[REDUCE] tool_call_delta for unknown id {}; synthesizing placeholder",
                            id
                        );
                        turn.parts.push(ContentPart::ToolCall {
                            id,
                            name: UNKNOWN_TOOL_NAME.to_string(),
                            arguments: delta,
                            result: None,
                            status: ToolCallStatus::Pending,
                        });
                    }
                }
            }
        }
        Action::CompleteToolCall { id, result } => {
            if let Some(idx) = open_turn(&mut state, "tool call completion") {
                let turn = &mut state.turns[idx];
                let pos = turn
                    .parts
                    .iter()
                    .position(|p| matches!(p, ContentPart::ToolCall { id: pid, .. } if pid == &id));
                match pos {
                    Some(pos) => {
                        if let ContentPart::ToolCall {
                            result: slot,
                            status,
                            ..
                        } = &mut turn.parts[pos]
                        {
                            *slot = Some(result);
                            *status = ToolCallStatus::Complete;
                        }
                    }
                    None => {
                        // A completion carries a result worth keeping, so an
                        // unknown id gets a best-effort placeholder part.
                        tracing::warn!(
                            "[REDUCE] tool_call_completed for unknown id {}; synthesizing placeholder",
                            id
                        );
                        turn.parts.push(ContentPart::ToolCall {
                            id,
                            name: UNKNOWN_TOOL_NAME.to_string(),
                            arguments: String::new(),
                            result: Some(result),
                            status: ToolCallStatus::Complete,
                        });
                    }
                }
            }
        }
        Action::AttachMedia {
            kind,
            url,
            data,
            mime_type,
        } => {
            if let Some(idx) = open_turn(&mut state, "media attachment") {
                state.turns[idx].parts.push(ContentPart::Media {
                    kind,
                    url,
                    data,
                    mime_type,
                });
            }
        }
        Action::CompleteTurn => {
            match state.streaming_turn_index() {
                Some(idx) => state.turns[idx].status = TurnStatus::Complete,
                None => tracing::warn!("[REDUCE] run_completed with no streaming turn; ignored"),
            }
        }
        Action::FailTurn { reason, message } => {
            let idx = match state.streaming_turn_index() {
                Some(idx) => Some(idx),
                // An error with no open turn still deserves a visible errored
                // turn, unless the previous one already ended.
                None => open_turn(&mut state, "run error"),
            };
            if let Some(idx) = idx {
                let turn = &mut state.turns[idx];
                turn.status = TurnStatus::Errored;
                turn.failure = Some(StreamFailure { reason, message });
            }
        }
    }
    state
}

/// Index of the turn that actions should land on. Creates a streaming
/// assistant turn lazily when a delta arrives before `run_started`; refuses
/// (with a log) when the previous assistant turn already reached a terminal
/// status, which makes frozen turns immune to late events.
fn open_turn(state: &mut Transcript, what: &str) -> Option<usize> {
    if let Some(idx) = state.streaming_turn_index() {
        return Some(idx);
    }
    match state.turns.last() {
        Some(turn) if turn.role == Role::Assistant && turn.is_terminal() => {
            tracing::warn!("[REDUCE] Late {} after terminal turn; ignored", what);
            None
        }
        _ => {
            tracing::debug!("[REDUCE] {} before run_started; opening turn lazily", what);
            state.turns.push(Turn::assistant_streaming());
            Some(state.turns.len() - 1)
        }
    }
}
