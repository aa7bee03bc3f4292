use crate::constants::{MAX_STREAM_RECORDS, RUN_STREAM_PATH};
use crate::decoder::EventFrameCodec;
use crate::identity::IdentityOracle;
use crate::interpret::{interpret, Action};
use crate::logging::StreamMetric;
use crate::reducer;
use crate::types::{
    FailureReason, PalaverError, RequestId, Result, SessionId, Transcript, Turn, WireEvent,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl StreamPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// Payload for one streamed exchange with the agent backend.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub session_id: SessionId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Owns one request/response streaming exchange: opens the transport, feeds
/// bytes through the frame decoder, interprets records into actions and
/// reduces them onto the transcript, in that fixed order, synchronously per
/// chunk. Each controller instance exclusively owns its transcript and decode
/// buffer; snapshots go out through a watch channel so readers never see a
/// half-updated turn.
pub struct StreamController {
    phase: StreamPhase,
    transcript: Transcript,
    request_id: RequestId,
    snapshot_tx: watch::Sender<Arc<Transcript>>,
    cancel: CancellationToken,
}

impl StreamController {
    pub fn new(transcript: Transcript) -> (Self, watch::Receiver<Arc<Transcript>>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(transcript.clone()));
        (
            Self {
                phase: StreamPhase::Idle,
                transcript,
                request_id: RequestId::generate(),
                snapshot_tx,
                cancel: CancellationToken::new(),
            },
            snapshot_rx,
        )
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Handle for cancelling this exchange from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn apply(&mut self, action: Action) {
        let state = std::mem::take(&mut self.transcript);
        self.transcript = reducer::apply(state, action);
        self.snapshot_tx
            .send_replace(Arc::new(self.transcript.clone()));
    }

    fn push_user_turn(&mut self, text: String) {
        self.transcript.turns.push(Turn::user(text));
        self.snapshot_tx
            .send_replace(Arc::new(self.transcript.clone()));
    }

    /// Issues the network call and pumps the response stream to completion.
    /// Refuses to start without an authenticated caller. A failure before any
    /// byte arrives ends in `Errored` with no assistant turn created.
    pub async fn start(
        &mut self,
        client: &reqwest::Client,
        base_url: &str,
        request: &RunRequest,
        identity: &dyn IdentityOracle,
    ) -> Result<()> {
        let user = match identity.current_user() {
            Some(u) => u,
            None => {
                return Err(
                    PalaverError::Forbidden("no authenticated user; refusing to stream".into())
                        .into(),
                )
            }
        };
        if self.phase != StreamPhase::Idle {
            return Err(
                PalaverError::Lifecycle(format!("start() called in {:?}", self.phase)).into(),
            );
        }

        // The user turn exists synchronously on submit, already complete.
        self.push_user_turn(request.message.clone());
        self.phase = StreamPhase::Requesting;

        let url = format!("{}{}", base_url.trim_end_matches('/'), RUN_STREAM_PATH);
        tracing::info!(
            "[STREAM] {} opening {} for session {}",
            self.request_id.short(),
            url,
            request.session_id.short()
        );

        let response = match client
            .post(&url)
            .header("x-user-id", user.id.0.clone())
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.phase = StreamPhase::Errored;
                return Err(PalaverError::Network(e).into());
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = match response.text().await {
                Ok(t) => t,
                Err(_) => "Unknown error (failed to read response text)".to_string(),
            };
            self.phase = StreamPhase::Errored;
            return Err(PalaverError::Upstream(status, body).into());
        }

        let byte_stream = Box::pin(
            response
                .bytes_stream()
                .map(|r| r.map_err(std::io::Error::other)),
        );
        self.pump(byte_stream).await
    }

    /// Decodes and applies a byte stream. Public so tests and alternative
    /// transports can drive the pipeline with in-memory chunks.
    pub async fn pump<R>(&mut self, byte_stream: R) -> Result<()>
    where
        R: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        match self.phase {
            StreamPhase::Idle | StreamPhase::Requesting => {}
            other => {
                return Err(
                    PalaverError::Lifecycle(format!("pump() called in {:?}", other)).into(),
                )
            }
        }
        self.phase = StreamPhase::Streaming;

        let start_time = std::time::Instant::now();
        let mut framed = FramedRead::new(StreamReader::new(byte_stream), EventFrameCodec::new());
        let mut metrics = StreamMetric::new();
        let mut record_count = 0usize;
        let cancel = self.cancel.clone();

        loop {
            // Cancellation is checked before requesting the next chunk and
            // wins over a ready frame.
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish_cancelled();
                    break;
                }
                item = framed.next() => item,
            };

            match next {
                Some(Ok(event)) => {
                    record_count += 1;
                    if record_count > MAX_STREAM_RECORDS {
                        tracing::error!(
                            "[STREAM] {} exceeded max record limit ({})",
                            self.request_id.short(),
                            MAX_STREAM_RECORDS
                        );
                        self.apply(Action::FailTurn {
                            reason: FailureReason::Transport,
                            message: "stream exceeded max record limit".into(),
                        });
                        self.phase = StreamPhase::Errored;
                        break;
                    }
                    metrics.record_event(&event);

                    let terminal = matches!(
                        event,
                        WireEvent::RunCompleted { .. } | WireEvent::RunError { .. }
                    );
                    let errored = matches!(event, WireEvent::RunError { .. });
                    if let Some(action) = interpret(event) {
                        self.apply(action);
                    }
                    if terminal {
                        // Terminal states are sinks: late data on the wire is
                        // ignored, not applied.
                        self.phase = if errored {
                            StreamPhase::Errored
                        } else {
                            StreamPhase::Completed
                        };
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(
                        "[STREAM] {} transport failure mid-stream: {}",
                        self.request_id.short(),
                        e
                    );
                    self.apply(Action::FailTurn {
                        reason: FailureReason::Transport,
                        message: e.to_string(),
                    });
                    self.phase = StreamPhase::Errored;
                    break;
                }
                None => {
                    self.finish_eof(framed.decoder().truncated);
                    break;
                }
            }
        }

        let codec = framed.decoder();
        metrics.log_summary(&self.request_id, codec.malformed_frames, codec.unknown_records);
        tracing::info!(
            "[STREAM] {} finished in {:?} ({:?})",
            self.request_id.short(),
            start_time.elapsed(),
            self.phase
        );
        Ok(())
    }

    fn finish_cancelled(&mut self) {
        tracing::info!("[STREAM] {} cancelled by user", self.request_id.short());
        // A turn left streaming is force-failed, never left dangling; the
        // partial decode buffer dies with the framed reader.
        if self.transcript.streaming_turn_index().is_some() {
            self.apply(Action::FailTurn {
                reason: FailureReason::Cancelled,
                message: "stopped by user".into(),
            });
        }
        self.phase = StreamPhase::Cancelled;
    }

    fn finish_eof(&mut self, decoder_truncated: bool) {
        let mid_turn = self.transcript.streaming_turn_index().is_some();
        if mid_turn || decoder_truncated {
            tracing::warn!(
                "[STREAM] {} closed without a terminal event (truncated frame: {})",
                self.request_id.short(),
                decoder_truncated
            );
        }
        if mid_turn {
            // Whatever streamed so far stays visible; only the status flips.
            self.apply(Action::FailTurn {
                reason: FailureReason::Truncated,
                message: "stream ended before the response completed".into(),
            });
            self.phase = StreamPhase::Errored;
        } else {
            self.phase = StreamPhase::Completed;
        }
    }
}
