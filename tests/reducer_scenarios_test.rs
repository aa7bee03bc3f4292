use palaver::interpret::interpret;
use palaver::reducer::apply;
use palaver::types::{
    ContentPart, FailureReason, ToolCallStatus, Transcript, TurnStatus, WireEvent,
};

fn run(events: Vec<WireEvent>) -> Transcript {
    events
        .into_iter()
        .filter_map(interpret)
        .fold(Transcript::new(), apply)
}

#[test]
fn plain_text_run() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ContentDelta {
            content: "Hello ".into(),
        },
        WireEvent::ContentDelta {
            content: "world".into(),
        },
        WireEvent::RunCompleted { run_id: None },
    ]);

    assert_eq!(transcript.turns.len(), 1);
    let turn = &transcript.turns[0];
    assert_eq!(turn.status, TurnStatus::Complete);
    assert_eq!(turn.parts.len(), 1);
    assert_eq!(turn.text(), "Hello world");
}

#[test]
fn tool_call_pairing() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ToolCallStarted {
            id: "t1".into(),
            name: "search".into(),
        },
        WireEvent::ToolCallDelta {
            id: "t1".into(),
            arguments: "{\"q\":".into(),
        },
        WireEvent::ToolCallDelta {
            id: "t1".into(),
            arguments: "\"cats\"}".into(),
        },
        WireEvent::ToolCallCompleted {
            id: "t1".into(),
            result: serde_json::json!("3 results"),
        },
        WireEvent::RunCompleted { run_id: None },
    ]);

    let turn = &transcript.turns[0];
    assert_eq!(turn.status, TurnStatus::Complete);
    let tool_calls: Vec<_> = turn
        .parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolCall {
                arguments,
                result,
                status,
                ..
            } => Some((arguments.clone(), result.clone(), *status)),
            _ => None,
        })
        .collect();
    assert_eq!(tool_calls.len(), 1);
    let (arguments, result, status) = &tool_calls[0];
    assert_eq!(arguments, "{\"q\":\"cats\"}");
    assert_eq!(result, &Some(serde_json::json!("3 results")));
    assert_eq!(*status, ToolCallStatus::Complete);
}

#[test]
fn completion_for_unstarted_tool_call_synthesizes_placeholder() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ToolCallCompleted {
            id: "never_opened".into(),
            result: serde_json::json!({"ok": true}),
        },
        WireEvent::RunCompleted { run_id: None },
    ]);

    let turn = &transcript.turns[0];
    assert_eq!(turn.parts.len(), 1);
    assert!(matches!(
        &turn.parts[0],
        ContentPart::ToolCall {
            result: Some(_),
            status: ToolCallStatus::Complete,
            ..
        }
    ));
}

#[test]
fn run_error_preserves_partial_text() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ContentDelta {
            content: "so far".into(),
        },
        WireEvent::RunError {
            message: "model overloaded".into(),
            code: Some(529),
        },
    ]);

    let turn = &transcript.turns[0];
    assert_eq!(turn.status, TurnStatus::Errored);
    assert_eq!(turn.text(), "so far");
    let failure = turn.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.reason, FailureReason::Upstream);
    assert!(failure.message.contains("model overloaded"));
}

#[test]
fn events_after_terminal_are_ignored() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ContentDelta { content: "a".into() },
        WireEvent::RunCompleted { run_id: None },
        WireEvent::ContentDelta {
            content: "late".into(),
        },
        WireEvent::MediaAttached {
            kind: palaver::types::MediaKind::Image,
            url: Some("http://example/cat.png".into()),
            data: None,
            mime_type: None,
        },
    ]);

    assert_eq!(transcript.turns.len(), 1);
    let turn = &transcript.turns[0];
    assert_eq!(turn.status, TurnStatus::Complete);
    assert_eq!(turn.parts.len(), 1);
    assert_eq!(turn.text(), "a");
}

#[test]
fn media_lands_in_order_between_text_parts() {
    let transcript = run(vec![
        WireEvent::RunStarted { run_id: None },
        WireEvent::ContentDelta {
            content: "look:".into(),
        },
        WireEvent::MediaAttached {
            kind: palaver::types::MediaKind::Image,
            url: Some("http://example/cat.png".into()),
            data: None,
            mime_type: Some("image/png".into()),
        },
        WireEvent::ContentDelta {
            content: "a cat".into(),
        },
        WireEvent::RunCompleted { run_id: None },
    ]);

    let turn = &transcript.turns[0];
    assert_eq!(turn.parts.len(), 3);
    assert!(matches!(turn.parts[1], ContentPart::Media { .. }));
    assert_eq!(turn.text(), "look:a cat");
}
