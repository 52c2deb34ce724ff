//! RFC 6184 H.264 payload format (Single NALU + FU-A, STAP-A on receive).
//!
//! Non-interleaved mode (packetization-mode=1). The NAL header is one byte:
//! F(1) | NRI(2) | Type(5). FU-A packets carry a one-byte FU indicator
//! (F | NRI | 28) followed by a one-byte FU header (S | E | R | Type).
//! STAP-A (type 24) is parsed on receive; on send small NALs fall through to
//! single-NAL packets, as interleaved aggregation buys little on a LAN.

use crate::formats::codec::H26xCodec;
use crate::formats::fragment_type::{FragmentType, NalClass};

/// Single NAL unit packet types span 1..=23.
const NAL_TYPE_MAX: u8 = 23;
/// STAP-A aggregation packet.
const NAL_TYPE_STAP_A: u8 = 24;
/// FU-A fragmentation unit.
const NAL_TYPE_FU_A: u8 = 28;
/// IDR slice.
const NAL_TYPE_IDR: u8 = 5;
/// Non-IDR slice.
const NAL_TYPE_NON_IDR: u8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct H264;

impl H264 {
    #[inline]
    fn nal_type(header: u8) -> u8 {
        header & 0x1F
    }
}

impl H26xCodec for H264 {
    fn name(&self) -> &'static str {
        "h264"
    }

    fn payload_header_size(&self) -> usize {
        1
    }

    fn nal_header_size(&self) -> usize {
        1
    }

    fn fragment_type(&self, payload: &[u8]) -> FragmentType {
        let Some(&header) = payload.first() else {
            return FragmentType::Invalid;
        };
        match Self::nal_type(header) {
            NAL_TYPE_STAP_A => FragmentType::Aggregated,
            NAL_TYPE_FU_A => {
                let Some(&fu_header) = payload.get(1) else {
                    return FragmentType::Invalid;
                };
                if fu_header & 0x80 != 0 {
                    FragmentType::Start
                } else if fu_header & 0x40 != 0 {
                    FragmentType::End
                } else {
                    FragmentType::Middle
                }
            }
            1..=NAL_TYPE_MAX => FragmentType::NotFragmented,
            _ => FragmentType::Invalid,
        }
    }

    fn nal_class(&self, payload: &[u8]) -> NalClass {
        let t = match (payload.first(), payload.get(1)) {
            (Some(&header), Some(&fu_header)) if Self::nal_type(header) == NAL_TYPE_FU_A => {
                Self::nal_type(fu_header)
            }
            (Some(&header), _) => Self::nal_type(header),
            _ => return NalClass::Other,
        };
        match t {
            NAL_TYPE_IDR => NalClass::Intra,
            NAL_TYPE_NON_IDR => NalClass::Inter,
            _ => NalClass::Other,
        }
    }

    fn fu_payload_header(&self, nal: &[u8]) -> Vec<u8> {
        // FU indicator: original F and NRI bits, type 28
        vec![(nal[0] & 0xE0) | NAL_TYPE_FU_A]
    }

    fn fu_nal_type(&self, nal: &[u8]) -> u8 {
        Self::nal_type(nal[0])
    }

    fn reconstruct_nal_header(&self, fu_payload: &[u8]) -> Vec<u8> {
        vec![(fu_payload[0] & 0xE0) | (fu_payload[1] & 0x1F)]
    }
}
