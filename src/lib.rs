//! RustyRTP is an RTP payload engine for H.26x video streams (H.264/H.265),
//! designed for local network streaming.
//!
//! On the send path it scans raw Annex-B access units for NAL unit boundaries
//! and emits correctly sized RTP payloads (single NAL, aggregation packet or
//! fragmentation unit). On the receive path it classifies incoming payloads,
//! reassembles fragmented NAL units across out-of-order and wrapping sequence
//! numbers, enforces an intra-before-inter delivery discipline and garbage
//! collects stalled frames. A ZRTP-style key exchange produces the keying
//! material the media path uses downstream.
//!
//! Socket I/O, the RTP header itself and low-level key agreement are
//! collaborators behind traits; the crate owns the payload formats and the
//! handshake control flow.

/// Handles configuration loading and the typed media stream settings.
pub mod config;
/// H.26x payload formats: codecs, packetizer and reassembler.
pub mod formats;
/// Logging utilities for the engine.
pub mod log;
/// RTP frame carrier and the outbound frame queue collaborator.
pub mod rtp;
/// Crate-wide error kinds and receive dispositions.
pub mod rtp_error;
/// Annex-B start code lookup and NAL unit partitioning.
pub mod scl;
/// ZRTP-style key exchange state machine.
pub mod zrtp;
