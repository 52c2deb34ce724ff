use std::fmt;

/// Error kinds surfaced by the payload engine and the key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpError {
    /// Nothing to return (empty delivery queue, no start code found).
    NotFound,
    /// Caller handed us something malformed (no NAL units, bad message layout, MAC mismatch).
    InvalidValue,
    /// Remote speaks an older protocol version than we do.
    NotSupported,
    /// A retransmission schedule ran out of attempts.
    Timeout,
    /// Something went wrong that the stream can survive; the string carries context.
    Generic(String),
}

impl fmt::Display for RtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RtpError::*;
        match self {
            NotFound => write!(f, "not found"),
            InvalidValue => write!(f, "invalid value"),
            NotSupported => write!(f, "not supported"),
            Timeout => write!(f, "timed out"),
            Generic(ctx) => write!(f, "generic error: {ctx}"),
        }
    }
}

impl std::error::Error for RtpError {}

/// What a receive call produced.
///
/// `Pending` means the packet was consumed but no frame completed yet;
/// `Ready` / `MultipleReady` tell how many frames were pushed onto the
/// delivery queue (drain with `next_frame`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvDisposition {
    Ready,
    MultipleReady,
    Pending,
}

pub type Result<T> = std::result::Result<T, RtpError>;
