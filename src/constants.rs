/// Hard cap on a single wire record. Anything larger is dropped as malformed.
pub const MAX_RECORD_BYTES: usize = 10 * 1024 * 1024;

/// Hard cap on records per stream, against runaway backends.
pub const MAX_STREAM_RECORDS: usize = 100_000;

/// Record separator for the inbound framing (newline-delimited JSON).
pub const RECORD_DELIMITER: u8 = b'\n';

/// Default agent backend endpoint path for one streamed run.
pub const RUN_STREAM_PATH: &str = "/v1/runs/stream";

/// Environment variables consumed by the CLI.
pub const ENV_BACKEND_URL: &str = "PALAVER_BACKEND_URL";
pub const ENV_USER_ID: &str = "PALAVER_USER_ID";
pub const ENV_USER_ROLE: &str = "PALAVER_USER_ROLE";

/// Synthesized tool-call name when a completion arrives for an id that was
/// never opened.
pub const UNKNOWN_TOOL_NAME: &str = "unknown";
