//! Hashing, truncated MACs and the key derivation function.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::rtp_error::RtpError;
use crate::zrtp::message::{MAC_LEN, TRAILER_LEN};

pub type HmacSha256 = Hmac<Sha256>;

/// SHA-256 over the concatenation of `chunks`.
pub fn sha256(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// The pre-image chain `H0 -> H1 -> H2 -> H3`, `H_{i+1} = SHA256(H_i)`.
pub fn hash_chain(h0: &[u8; 32]) -> [[u8; 32]; 4] {
    let mut chain = [[0u8; 32]; 4];
    chain[0] = *h0;
    for i in 1..4 {
        chain[i] = sha256(&[&chain[i - 1]]);
    }
    chain
}

/// Simple constant-time comparison to avoid timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Lower 64 bits of HMAC-SHA256 over `data`.
pub fn hmac_trunc64(key: &[u8], data: &[u8]) -> Result<[u8; MAC_LEN], RtpError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| RtpError::InvalidValue)?;
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    let mut truncated = [0u8; MAC_LEN];
    truncated.copy_from_slice(&digest[..MAC_LEN]);
    Ok(truncated)
}

/// Checks the truncated MAC a sealed message carries.
///
/// The MAC covers the message bytes minus the 12-byte trailer (8 bytes MAC,
/// 4 bytes CRC).
pub fn verify_mac(key: &[u8], msg: &[u8]) -> Result<(), RtpError> {
    if msg.len() < TRAILER_LEN {
        return Err(RtpError::InvalidValue);
    }
    let mac_offset = msg.len() - TRAILER_LEN;
    let computed = hmac_trunc64(key, &msg[..mac_offset])?;
    let received = &msg[mac_offset..mac_offset + MAC_LEN];
    if constant_time_eq(&computed, received) {
        Ok(())
    } else {
        Err(RtpError::InvalidValue)
    }
}

/// Master keying material (Section 4.4.1.4 of RFC 6189, preshared secrets
/// absent):
/// `s0 = SHA256(be32(1) || DHResult || "ZRTP-HMAC-KDF" || ZIDi || ZIDr ||
/// total_hash || be32(0) || be32(0) || be32(0))`.
///
/// The DH result is erased before returning.
pub fn compute_s0(
    dh_result: &mut [u8; 32],
    zid_i: &[u8; 12],
    zid_r: &[u8; 12],
    total_hash: &[u8; 32],
) -> [u8; 32] {
    let zero = 0u32.to_be_bytes();
    let s0 = sha256(&[
        &1u32.to_be_bytes(),
        dh_result.as_slice(),
        b"ZRTP-HMAC-KDF",
        zid_i,
        zid_r,
        total_hash,
        &zero, // len(s1)
        &zero, // len(s2)
        &zero, // len(s3)
    ]);
    dh_result.fill(0);
    s0
}

/// ZRTP KDF (Section 4.5.2):
/// `KDF(s0, label, context, L) = HMAC(s0, be32(1) || label || 0x00 ||
/// context || be32(L))` truncated to `L` bits, with
/// `context = ZIDi || ZIDr || total_hash`.
pub fn derive_key(
    s0: &[u8; 32],
    label: &str,
    key_bits: u32,
    zid_i: &[u8; 12],
    zid_r: &[u8; 12],
    total_hash: &[u8; 32],
    out: &mut [u8],
) -> Result<(), RtpError> {
    let mut mac = HmacSha256::new_from_slice(s0).map_err(|_| RtpError::InvalidValue)?;
    mac.update(&1u32.to_be_bytes());
    mac.update(label.as_bytes());
    mac.update(&[0u8]);
    mac.update(zid_i);
    mac.update(zid_r);
    mac.update(total_hash);
    mac.update(&key_bits.to_be_bytes());

    let digest = mac.finalize().into_bytes();
    let len = key_bits as usize / 8;
    if out.len() != len || len > digest.len() {
        return Err(RtpError::InvalidValue);
    }
    out.copy_from_slice(&digest[..len]);
    Ok(())
}
