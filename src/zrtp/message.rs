//! ZRTP message wire formats.
//!
//! Every message is `[preamble u16][length u16][type block 8B][body...]`;
//! Hello, Commit, DHPart and Confirm messages end with an 8-byte truncated
//! HMAC and a 4-byte CRC-32, the acknowledgements carry the CRC only. The
//! MAC covers the message bytes minus the 12-byte trailer.

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_32_ISO_HDLC};

use crate::rtp_error::RtpError;
use crate::zrtp::kdf::hmac_trunc64;

pub const ZRTP_PREAMBLE: u16 = 0x505a;
/// Protocol version advertised in Hello.
pub const ZRTP_VERSION: u32 = 110;

pub const ZID_LEN: usize = 12;
pub const HASH_LEN: usize = 32;
/// Public key length on the wire (X25519 backend).
pub const PK_LEN: usize = 32;
/// Retained-secret ID length.
pub const RS_ID_LEN: usize = 8;
pub const MAC_LEN: usize = 8;
pub const CRC_LEN: usize = 4;
pub const TRAILER_LEN: usize = MAC_LEN + CRC_LEN;
pub const HEADER_LEN: usize = 2 + 2 + 8;

pub const HELLO_LEN: usize = HEADER_LEN + 4 + ZID_LEN + HASH_LEN + TRAILER_LEN;
pub const COMMIT_LEN: usize = HEADER_LEN + ZID_LEN + HASH_LEN + HASH_LEN + 20 + TRAILER_LEN;
pub const DH_PART_LEN: usize = HEADER_LEN + HASH_LEN + 4 * RS_ID_LEN + PK_LEN + TRAILER_LEN;
pub const CONFIRM_LEN: usize = HEADER_LEN + HASH_LEN + TRAILER_LEN;
pub const ACK_LEN: usize = HEADER_LEN + CRC_LEN;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Algorithm words carried in Commit.
pub mod algos {
    pub const HASH_S256: u32 = u32::from_be_bytes(*b"S256");
    pub const CIPHER_AES1: u32 = u32::from_be_bytes(*b"AES1");
    pub const AUTH_HS32: u32 = u32::from_be_bytes(*b"HS32");
    pub const KEY_AGREEMENT_X255: u32 = u32::from_be_bytes(*b"X255");
    pub const SAS_B32: u32 = u32::from_be_bytes(*b"B32 ");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Hello,
    HelloAck,
    Commit,
    DhPart1,
    DhPart2,
    Confirm1,
    Confirm2,
    Conf2Ack,
}

impl MsgType {
    pub fn block(self) -> &'static [u8; 8] {
        match self {
            MsgType::Hello => b"Hello   ",
            MsgType::HelloAck => b"HelloACK",
            MsgType::Commit => b"Commit  ",
            MsgType::DhPart1 => b"DHPart1 ",
            MsgType::DhPart2 => b"DHPart2 ",
            MsgType::Confirm1 => b"Confirm1",
            MsgType::Confirm2 => b"Confirm2",
            MsgType::Conf2Ack => b"Conf2ACK",
        }
    }

    pub fn from_block(block: &[u8]) -> Option<MsgType> {
        match block {
            b"Hello   " => Some(MsgType::Hello),
            b"HelloACK" => Some(MsgType::HelloAck),
            b"Commit  " => Some(MsgType::Commit),
            b"DHPart1 " => Some(MsgType::DhPart1),
            b"DHPart2 " => Some(MsgType::DhPart2),
            b"Confirm1" => Some(MsgType::Confirm1),
            b"Confirm2" => Some(MsgType::Confirm2),
            b"Conf2ACK" => Some(MsgType::Conf2Ack),
            _ => None,
        }
    }
}

/// Peeks the message type of a raw datagram without decoding the body.
pub fn classify(raw: &[u8]) -> Option<MsgType> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    if BigEndian::read_u16(&raw[0..2]) != ZRTP_PREAMBLE {
        return None;
    }
    MsgType::from_block(&raw[4..12])
}

fn header(msg_type: MsgType, total_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&ZRTP_PREAMBLE.to_be_bytes());
    out.extend_from_slice(&(total_len as u16).to_be_bytes());
    out.extend_from_slice(msg_type.block());
    out
}

/// Appends the truncated MAC and the CRC trailer.
fn seal(mut out: Vec<u8>, mac_key: &[u8]) -> Result<Vec<u8>, RtpError> {
    let mac = hmac_trunc64(mac_key, &out)?;
    out.extend_from_slice(&mac);
    let crc = CRC32.checksum(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    Ok(out)
}

/// Builds an acknowledgement message (header + CRC, nothing to authenticate).
pub fn encode_ack(msg_type: MsgType) -> Vec<u8> {
    let mut out = header(msg_type, ACK_LEN);
    let crc = CRC32.checksum(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Header, length, type and CRC checks shared by every decoder.
fn check(raw: &[u8], msg_type: MsgType, expected_len: usize) -> Result<(), RtpError> {
    if raw.len() != expected_len {
        return Err(RtpError::InvalidValue);
    }
    if BigEndian::read_u16(&raw[0..2]) != ZRTP_PREAMBLE {
        return Err(RtpError::InvalidValue);
    }
    if usize::from(BigEndian::read_u16(&raw[2..4])) != expected_len {
        return Err(RtpError::InvalidValue);
    }
    if &raw[4..12] != msg_type.block() {
        return Err(RtpError::InvalidValue);
    }
    let crc_offset = raw.len() - CRC_LEN;
    if CRC32.checksum(&raw[..crc_offset]) != BigEndian::read_u32(&raw[crc_offset..]) {
        return Err(RtpError::InvalidValue);
    }
    Ok(())
}

fn read_array<const N: usize>(raw: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[offset..offset + N]);
    out
}

/// Hello: version, ZID and the top of the hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloMsg {
    pub version: u32,
    pub zid: [u8; ZID_LEN],
    pub h3: [u8; HASH_LEN],
}

impl HelloMsg {
    pub fn encode(&self, mac_key: &[u8]) -> Result<Vec<u8>, RtpError> {
        let mut out = header(MsgType::Hello, HELLO_LEN);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.zid);
        out.extend_from_slice(&self.h3);
        seal(out, mac_key)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, RtpError> {
        check(raw, MsgType::Hello, HELLO_LEN)?;
        Ok(Self {
            version: BigEndian::read_u32(&raw[12..16]),
            zid: read_array(raw, 16),
            h3: read_array(raw, 28),
        })
    }
}

/// Commit: ZID, H2, the hash-value-of-initiator and the algorithm words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMsg {
    pub zid: [u8; ZID_LEN],
    pub h2: [u8; HASH_LEN],
    pub hvi: [u8; HASH_LEN],
    pub hash_algo: u32,
    pub cipher_algo: u32,
    pub auth_tag: u32,
    pub key_agreement: u32,
    pub sas_type: u32,
}

impl CommitMsg {
    pub fn encode(&self, mac_key: &[u8]) -> Result<Vec<u8>, RtpError> {
        let mut out = header(MsgType::Commit, COMMIT_LEN);
        out.extend_from_slice(&self.zid);
        out.extend_from_slice(&self.h2);
        out.extend_from_slice(&self.hvi);
        for word in [
            self.hash_algo,
            self.cipher_algo,
            self.auth_tag,
            self.key_agreement,
            self.sas_type,
        ] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        seal(out, mac_key)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, RtpError> {
        check(raw, MsgType::Commit, COMMIT_LEN)?;
        let algos_at = 12 + ZID_LEN + HASH_LEN + HASH_LEN;
        Ok(Self {
            zid: read_array(raw, 12),
            h2: read_array(raw, 12 + ZID_LEN),
            hvi: read_array(raw, 12 + ZID_LEN + HASH_LEN),
            hash_algo: BigEndian::read_u32(&raw[algos_at..]),
            cipher_algo: BigEndian::read_u32(&raw[algos_at + 4..]),
            auth_tag: BigEndian::read_u32(&raw[algos_at + 8..]),
            key_agreement: BigEndian::read_u32(&raw[algos_at + 12..]),
            sas_type: BigEndian::read_u32(&raw[algos_at + 16..]),
        })
    }
}

/// DHPart1/DHPart2: H1, the retained-secret IDs and the public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhPartMsg {
    pub h1: [u8; HASH_LEN],
    pub rs_ids: [[u8; RS_ID_LEN]; 4],
    pub public_key: [u8; PK_LEN],
}

impl DhPartMsg {
    pub fn encode(&self, msg_type: MsgType, mac_key: &[u8]) -> Result<Vec<u8>, RtpError> {
        let mut out = header(msg_type, DH_PART_LEN);
        out.extend_from_slice(&self.h1);
        for rs_id in &self.rs_ids {
            out.extend_from_slice(rs_id);
        }
        out.extend_from_slice(&self.public_key);
        seal(out, mac_key)
    }

    pub fn decode(raw: &[u8], msg_type: MsgType) -> Result<Self, RtpError> {
        check(raw, msg_type, DH_PART_LEN)?;
        let mut rs_ids = [[0u8; RS_ID_LEN]; 4];
        for (i, rs_id) in rs_ids.iter_mut().enumerate() {
            *rs_id = read_array(raw, 12 + HASH_LEN + i * RS_ID_LEN);
        }
        Ok(Self {
            h1: read_array(raw, 12),
            rs_ids,
            public_key: read_array(raw, 12 + HASH_LEN + 4 * RS_ID_LEN),
        })
    }
}

/// Confirm1/Confirm2: reveals H0, sealed with the sender's derived HMAC key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmMsg {
    pub h0: [u8; HASH_LEN],
}

impl ConfirmMsg {
    pub fn encode(&self, msg_type: MsgType, mac_key: &[u8]) -> Result<Vec<u8>, RtpError> {
        let mut out = header(msg_type, CONFIRM_LEN);
        out.extend_from_slice(&self.h0);
        seal(out, mac_key)
    }

    pub fn decode(raw: &[u8], msg_type: MsgType) -> Result<Self, RtpError> {
        check(raw, msg_type, CONFIRM_LEN)?;
        Ok(Self {
            h0: read_array(raw, 12),
        })
    }
}
