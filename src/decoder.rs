use crate::constants::{MAX_RECORD_BYTES, RECORD_DELIMITER};
use crate::types::{parse_wire_line, WireEvent, WireLine};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Frames newline-delimited JSON records out of an arbitrarily chunked byte
/// stream and decodes each into a [`WireEvent`].
///
/// A record may span multiple chunks and multiple records may arrive in one
/// chunk; `BytesMut` carries the unconsumed remainder between calls. A record
/// that cannot be decoded is skipped and counted, never fatal. If the stream
/// closes with a non-empty partial record the codec discards it and sets
/// `truncated`, leaving already-emitted events untouched.
#[derive(Debug, Default)]
pub struct EventFrameCodec {
    /// Records skipped because they could not be decoded at all.
    pub malformed_frames: usize,
    /// Valid JSON records with an unrecognized `type`, skipped.
    pub unknown_records: usize,
    /// Set by `decode_eof` when the stream ended mid-record.
    pub truncated: bool,
}

impl EventFrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one complete line, consuming it from the buffer.
    fn take_line(&mut self, buf: &mut BytesMut, delim_at: usize) -> Option<WireEvent> {
        let line = buf.split_to(delim_at);
        buf.advance(1); // the delimiter itself
        let text = match std::str::from_utf8(&line) {
            Ok(t) => t.trim_end_matches('\r'),
            Err(_) => {
                self.malformed_frames += 1;
                tracing::warn!("[DECODE] Skipping non-UTF8 frame ({} bytes)", line.len());
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }
        match parse_wire_line(text) {
            WireLine::Event(event) => Some(event),
            WireLine::Unknown(_) => {
                self.unknown_records += 1;
                None
            }
            WireLine::Malformed(snippet) => {
                self.malformed_frames += 1;
                tracing::warn!("[DECODE] Skipping malformed frame: {}", snippet);
                None
            }
        }
    }
}

impl Decoder for EventFrameCodec {
    type Item = WireEvent;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<WireEvent>> {
        loop {
            match buf.iter().position(|b| *b == RECORD_DELIMITER) {
                Some(delim_at) => {
                    if let Some(event) = self.take_line(buf, delim_at) {
                        return Ok(Some(event));
                    }
                    // Skipped line (blank/unknown/malformed): keep scanning.
                }
                None => {
                    if buf.len() > MAX_RECORD_BYTES {
                        // No delimiter in sight and the buffer is past the
                        // record cap: drop it rather than grow unbounded.
                        self.malformed_frames += 1;
                        tracing::warn!(
                            "[DECODE] Discarding oversized partial record ({} bytes)",
                            buf.len()
                        );
                        buf.clear();
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> std::io::Result<Option<WireEvent>> {
        if let Some(event) = self.decode(buf)? {
            return Ok(Some(event));
        }
        if !buf.is_empty() {
            // Stream closed mid-record. A trailing record without its
            // delimiter may still be complete JSON; try it before declaring
            // truncation.
            let tail = buf.split();
            if let Ok(text) = std::str::from_utf8(&tail) {
                let text = text.trim_end_matches('\r');
                if text.is_empty() {
                    return Ok(None);
                }
                match parse_wire_line(text) {
                    WireLine::Event(event) => return Ok(Some(event)),
                    WireLine::Unknown(_) => {
                        self.unknown_records += 1;
                        return Ok(None);
                    }
                    WireLine::Malformed(_) => {}
                }
            }
            self.truncated = true;
            tracing::warn!(
                "[DECODE] Stream closed with {} undecodable trailing bytes",
                tail.len()
            );
        }
        Ok(None)
    }
}
