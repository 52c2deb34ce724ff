use crate::log::log_level::LogLevel;

/// Destination for engine log messages.
///
/// The packetizer, reassembler and handshake hold an `Arc<dyn LogSink>` and
/// never format anything unless the matching level feature is compiled in.
/// Implementations must be `Send + Sync` because streams are driven from
/// arbitrary threads.
pub trait LogSink: Send + Sync {
    /// Records one message.
    ///
    /// * `level` - severity of the message.
    /// * `msg` - formatted message content.
    /// * `target` - static source of the log (module path).
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}
