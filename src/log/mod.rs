pub mod console_log_sink;
pub mod log_level;
pub mod log_macros;
pub mod log_sink;
pub mod noop_log_sink;
pub use console_log_sink::ConsoleLogSink;
pub use log_level::LogLevel;
pub use log_sink::LogSink;
pub use noop_log_sink::NoopLogSink;
