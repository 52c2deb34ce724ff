pub mod codec;
pub mod fragment_type;
pub mod h264;
pub mod h265;
pub mod packetizer;
pub mod reassembler;

pub use codec::H26xCodec;
pub use fragment_type::{FragmentType, NalClass};
pub use h264::H264;
pub use h265::H265;
pub use packetizer::Packetizer;
pub use reassembler::Reassembler;

/// Skip the start code lookup on send; treat the buffer as one NAL unit.
pub const NO_H26X_SCL: u32 = 1 << 0;
/// Prepend `00 00 00 01` to every delivered frame.
pub const H26X_PREPEND_SC: u32 = 1 << 1;
/// Disable the intra-before-inter delivery interlock.
pub const NO_H26X_INTRA_DELAY: u32 = 1 << 2;
