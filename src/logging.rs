use crate::types::WireEvent;
use std::panic;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: env-filtered fmt output on stderr, plus a
/// daily-rolling file layer when `log_dir` is given. The returned guard must
/// be held for the life of the process or file output is lost.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "palaver.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
            None
        }
    }
}

/// Sets up a global panic hook that logs panics through tracing before the
/// default hook runs.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

/// Per-stream counters, summarized once at stream end.
#[derive(Default)]
pub struct StreamMetric {
    pub records: usize,
    pub text_chars: usize,
    pub tool_events: usize,
    pub media_parts: usize,
    pub tool_names: Vec<String>,
}

impl StreamMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self, event: &WireEvent) {
        self.records += 1;
        match event {
            WireEvent::ContentDelta { content } => self.text_chars += content.len(),
            WireEvent::ToolCallStarted { name, .. } => {
                self.tool_events += 1;
                self.tool_names.push(name.clone());
            }
            WireEvent::ToolCallDelta { .. } | WireEvent::ToolCallCompleted { .. } => {
                self.tool_events += 1;
            }
            WireEvent::MediaAttached { .. } => self.media_parts += 1,
            _ => {}
        }
    }

    pub fn log_summary(&self, request_id: &crate::types::RequestId, malformed: usize, unknown: usize) {
        let tools_str = if self.tool_names.is_empty() {
            format!("{}", self.tool_events)
        } else {
            format!("{} ({})", self.tool_events, self.tool_names.join(", "))
        };

        info!(
            target: "stream_recorder",
            "[STREAM END] Request: {} | Records: {} | Tools: {} | Text: {} chars | Media: {} | Malformed: {} | Unknown: {}",
            request_id.short(),
            self.records,
            tools_str,
            self.text_chars,
            self.media_parts,
            malformed,
            unknown
        );
    }
}
