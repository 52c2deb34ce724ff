use crate::formats::fragment_type::{FragmentType, NalClass};

/// Codec-specific bit layouts behind one seam.
///
/// The packetizer and reassembler are generic over this trait; H.264 and
/// H.265 differ only in header widths, type numbering and whether a real
/// aggregation packet exists.
pub trait H26xCodec {
    /// Codec name for log lines.
    fn name(&self) -> &'static str;

    /// Bytes of payload header each FU and aggregation packet starts with.
    fn payload_header_size(&self) -> usize;

    /// Bytes of FU header following the payload header.
    fn fu_header_size(&self) -> usize {
        1
    }

    /// Bytes of NAL unit header at the front of a complete NAL.
    fn nal_header_size(&self) -> usize;

    /// Classifies a received RTP payload.
    fn fragment_type(&self, payload: &[u8]) -> FragmentType;

    /// Decodability class of the NAL unit this payload carries (for FU
    /// payloads the type is read out of the FU header).
    fn nal_class(&self, payload: &[u8]) -> NalClass;

    /// Payload header prepended to every fragment of `nal`.
    fn fu_payload_header(&self, nal: &[u8]) -> Vec<u8>;

    /// The three FU header bytes: start, middle, end. They differ only in the
    /// high bits (bit 7 start, bit 6 end).
    fn fu_headers(&self, nal: &[u8]) -> [u8; 3] {
        let t = self.fu_nal_type(nal);
        [(1 << 7) | t, t, (1 << 6) | t]
    }

    /// NAL type bits carried in the FU header, taken from the NAL header.
    fn fu_nal_type(&self, nal: &[u8]) -> u8;

    /// Rebuilds the original NAL header from a fragment's payload+FU headers.
    fn reconstruct_nal_header(&self, fu_payload: &[u8]) -> Vec<u8>;

    /// Builds an aggregation packet payload from the marked NALs, or `None`
    /// when the codec has no aggregation mode and the NALs should go out as
    /// single-NAL packets instead.
    fn build_aggregate(&self, _nals: &[&[u8]]) -> Option<Vec<u8>> {
        None
    }
}
