//! RFC 7798 H.265 payload format (Single NALU + AP + FU).
//!
//! The NAL header is two bytes: F(1) | Type(6) | LayerId(6) | TID(3).
//! An AP (type 48) concatenates 16-bit-length-prefixed NALs after a two-byte
//! payload header; an FU (type 49) carries the payload header, then a
//! one-byte FU header (S | E | FuType).

use byteorder::{BigEndian, ByteOrder};

use crate::formats::codec::H26xCodec;
use crate::formats::fragment_type::{FragmentType, NalClass};

/// Aggregation packet.
const NAL_TYPE_AP: u8 = 48;
/// Fragmentation unit.
const NAL_TYPE_FU: u8 = 49;
/// First IRAP type (BLA_W_LP).
const NAL_TYPE_IRAP_FIRST: u8 = 16;
/// Last IRAP type (CRA_NUT).
const NAL_TYPE_IRAP_LAST: u8 = 21;

#[derive(Debug, Clone, Copy, Default)]
pub struct H265;

impl H265 {
    #[inline]
    fn nal_type(header: u8) -> u8 {
        (header >> 1) & 0x3F
    }
}

impl H26xCodec for H265 {
    fn name(&self) -> &'static str {
        "h265"
    }

    fn payload_header_size(&self) -> usize {
        2
    }

    fn nal_header_size(&self) -> usize {
        2
    }

    fn fragment_type(&self, payload: &[u8]) -> FragmentType {
        if payload.len() < 2 {
            return FragmentType::Invalid;
        }
        match Self::nal_type(payload[0]) {
            NAL_TYPE_AP => FragmentType::Aggregated,
            NAL_TYPE_FU => {
                let Some(&fu_header) = payload.get(2) else {
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
            0..=47 => FragmentType::NotFragmented,
            _ => FragmentType::Invalid,
        }
    }

    fn nal_class(&self, payload: &[u8]) -> NalClass {
        let t = match (payload.first(), payload.get(2)) {
            (Some(&header), Some(&fu_header)) if Self::nal_type(header) == NAL_TYPE_FU => {
                fu_header & 0x3F
            }
            (Some(&header), _) => Self::nal_type(header),
            _ => return NalClass::Other,
        };
        if (NAL_TYPE_IRAP_FIRST..=NAL_TYPE_IRAP_LAST).contains(&t) {
            NalClass::Intra
        } else if t < NAL_TYPE_IRAP_FIRST {
            NalClass::Inter
        } else {
            NalClass::Other
        }
    }

    fn fu_payload_header(&self, nal: &[u8]) -> Vec<u8> {
        // keep F and the LayerId high bit, swap the type for 49
        vec![(nal[0] & 0x81) | (NAL_TYPE_FU << 1), nal[1]]
    }

    fn fu_nal_type(&self, nal: &[u8]) -> u8 {
        Self::nal_type(nal[0])
    }

    fn reconstruct_nal_header(&self, fu_payload: &[u8]) -> Vec<u8> {
        vec![
            (fu_payload[0] & 0x81) | ((fu_payload[2] & 0x3F) << 1),
            fu_payload[1],
        ]
    }

    fn build_aggregate(&self, nals: &[&[u8]]) -> Option<Vec<u8>> {
        let first = match nals {
            [first, _, ..] => first,
            _ => return None, // an AP needs two constituents
        };

        let total: usize = nals.iter().map(|n| n.len() + 2).sum();
        let mut payload = Vec::with_capacity(2 + total);
        payload.push((first[0] & 0x81) | (NAL_TYPE_AP << 1));
        payload.push(first[1]);
        for nal in nals {
            let mut len = [0u8; 2];
            BigEndian::write_u16(&mut len, nal.len() as u16);
            payload.extend_from_slice(&len);
            payload.extend_from_slice(nal);
        }
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // IDR_W_RADL (type 19), layer 0, tid 1
    const IDR: [u8; 4] = [19 << 1, 1, 0xAB, 0xCD];
    // TRAIL_R (type 1)
    const TRAIL: [u8; 3] = [1 << 1, 1, 0xEF];

    #[test]
    fn classifies_payload_types() {
        let c = H265;
        assert_eq!(c.fragment_type(&IDR), FragmentType::NotFragmented);
        assert_eq!(c.fragment_type(&[48 << 1, 1, 0, 0]), FragmentType::Aggregated);
        assert_eq!(c.fragment_type(&[49 << 1, 1, 0x93, 0]), FragmentType::Start);
        assert_eq!(c.fragment_type(&[49 << 1, 1, 0x13, 0]), FragmentType::Middle);
        assert_eq!(c.fragment_type(&[49 << 1, 1, 0x53, 0]), FragmentType::End);
        assert_eq!(c.fragment_type(&[50 << 1, 1]), FragmentType::Invalid);
        assert_eq!(c.fragment_type(&[49 << 1]), FragmentType::Invalid);
    }

    #[test]
    fn fu_round_trip_preserves_nal_header() {
        let c = H265;
        let ph = c.fu_payload_header(&IDR);
        assert_eq!((ph[0] >> 1) & 0x3F, NAL_TYPE_FU);
        let [start, _, end] = c.fu_headers(&IDR);
        assert_eq!(start, 0x80 | 19);
        assert_eq!(end, 0x40 | 19);
        let fu_start = [ph[0], ph[1], start];
        assert_eq!(c.reconstruct_nal_header(&fu_start), IDR[..2].to_vec());
        let fu_end = [ph[0], ph[1], end];
        assert_eq!(c.reconstruct_nal_header(&fu_end), IDR[..2].to_vec());
    }

    #[test]
    fn intra_and_inter_classes() {
        let c = H265;
        assert_eq!(c.nal_class(&IDR), NalClass::Intra);
        assert_eq!(c.nal_class(&TRAIL), NalClass::Inter);
        assert_eq!(c.nal_class(&[32 << 1, 1]), NalClass::Other); // VPS
        assert_eq!(c.nal_class(&[49 << 1, 1, 0x80 | 19]), NalClass::Intra);
        assert_eq!(c.nal_class(&[49 << 1, 1, 1]), NalClass::Inter);
    }

    #[test]
    fn aggregate_concatenates_with_length_prefixes() {
        let c = H265;
        let a: &[u8] = &[32 << 1, 1, 9];
        let b: &[u8] = &[33 << 1, 1, 7, 7];
        let ap = c.build_aggregate(&[a, b]).expect("AP expected");
        assert_eq!((ap[0] >> 1) & 0x3F, NAL_TYPE_AP);
        assert_eq!(&ap[2..4], &[0, 3]);
        assert_eq!(&ap[4..7], a);
        assert_eq!(&ap[7..9], &[0, 4]);
        assert_eq!(&ap[9..], b);
    }

    #[test]
    fn aggregate_needs_two_nals() {
        let c = H265;
        assert!(c.build_aggregate(&[&IDR]).is_none());
        assert!(c.build_aggregate(&[]).is_none());
    }
}
