/// How one received RTP payload relates to a NAL unit.
///
/// Derived from the first bytes of the payload; the bit layout is codec
/// specific, the reassembler only looks at this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentType {
    /// A complete NAL unit in a single payload.
    NotFragmented,
    /// Multiple length-prefixed NAL units in one payload.
    Aggregated,
    /// First fragment of a fragmentation unit.
    Start,
    /// Interior fragment.
    Middle,
    /// Final fragment.
    End,
    /// Unusable payload (truncated, or a type we do not handle).
    Invalid,
}

/// Decodability category of the NAL unit a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalClass {
    /// Independently decodable frame.
    Intra,
    /// Frame referencing other frames.
    Inter,
    /// Parameter sets and everything else.
    Other,
}
