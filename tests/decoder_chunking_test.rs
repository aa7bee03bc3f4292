use bytes::BytesMut;
use palaver::decoder::EventFrameCodec;
use palaver::types::WireEvent;
use tokio_util::codec::Decoder;

fn decode_all(chunks: &[&[u8]]) -> (Vec<WireEvent>, EventFrameCodec) {
    let mut codec = EventFrameCodec::new();
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Ok(Some(event)) = codec.decode(&mut buf) {
            out.push(event);
        }
    }
    while let Ok(Some(event)) = codec.decode_eof(&mut buf) {
        out.push(event);
    }
    (out, codec)
}

const WIRE: &str = concat!(
    "{\"type\":\"run_started\",\"run_id\":\"r1\"}\n",
    "{\"type\":\"content_delta\",\"content\":\"Hello \"}\n",
    "{\"type\":\"tool_call_started\",\"id\":\"t1\",\"name\":\"search\"}\n",
    "{\"type\":\"tool_call_delta\",\"id\":\"t1\",\"arguments\":\"{\\\"q\\\":\\\"cats\\\"}\"}\n",
    "{\"type\":\"tool_call_completed\",\"id\":\"t1\",\"result\":\"3 results\"}\n",
    "{\"type\":\"content_delta\",\"content\":\"world\"}\n",
    "{\"type\":\"run_completed\"}\n",
);

/// Decoding the same byte sequence must yield the same events no matter
/// where the chunk boundaries fall.
#[test]
fn chunk_boundary_independence() {
    let bytes = WIRE.as_bytes();
    let (reference, _) = decode_all(&[bytes]);
    assert_eq!(reference.len(), 7);

    for split in 1..bytes.len() {
        let (events, codec) = decode_all(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(events, reference, "split at byte {} diverged", split);
        assert_eq!(codec.malformed_frames, 0);
        assert!(!codec.truncated);
    }
}

#[test]
fn three_way_splits_agree_on_a_sample() {
    let bytes = WIRE.as_bytes();
    let (reference, _) = decode_all(&[bytes]);
    for a in (1..bytes.len()).step_by(7) {
        for b in (a + 1..bytes.len()).step_by(11) {
            let (events, _) = decode_all(&[&bytes[..a], &bytes[a..b], &bytes[b..]]);
            assert_eq!(events, reference, "splits at {} and {} diverged", a, b);
        }
    }
}

#[test]
fn malformed_record_mid_stream_is_skipped_and_counted() {
    let wire = b"{\"type\":\"run_started\"}\nnot json at all\n{\"type\":\"run_completed\"}\n";
    let (events, codec) = decode_all(&[wire]);
    assert_eq!(events.len(), 2);
    assert_eq!(codec.malformed_frames, 1);
    assert!(!codec.truncated);
}

#[test]
fn unknown_record_type_is_skipped_without_truncation() {
    let wire = b"{\"type\":\"heartbeat\"}\n{\"type\":\"run_completed\"}\n";
    let (events, codec) = decode_all(&[wire]);
    assert_eq!(events.len(), 1);
    assert_eq!(codec.unknown_records, 1);
    assert_eq!(codec.malformed_frames, 0);
}

#[test]
fn partial_trailing_record_sets_truncated() {
    let wire = b"{\"type\":\"content_delta\",\"content\":\"partial\"}\n{\"type\":\"content_de";
    let (events, codec) = decode_all(&[wire]);
    assert_eq!(events.len(), 1);
    assert!(codec.truncated);
}

#[test]
fn complete_final_record_without_newline_is_emitted() {
    let wire = b"{\"type\":\"run_started\"}\n{\"type\":\"run_completed\"}";
    let (events, codec) = decode_all(&[wire]);
    assert_eq!(events.len(), 2);
    assert!(!codec.truncated);
}
