/// Severity levels for engine log messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-packet noise (fragment bookkeeping, scanner hits).
    Trace,
    /// State transitions, derived key material summaries.
    Debug,
    /// Coarse progress (handshake phases, GC sweeps).
    Info,
    /// Recoverable trouble (late packets, dropped frames).
    Warn,
    /// Failures that end a frame or a session.
    Error,
}
