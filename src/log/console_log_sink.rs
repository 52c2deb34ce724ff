use crate::log::{log_level::LogLevel, log_sink::LogSink};

/// Sink that prints to stderr, used by the examples and the integration tests.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        eprintln!("[{level:?}] {target}: {msg}");
    }
}
