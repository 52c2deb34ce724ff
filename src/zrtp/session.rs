//! Per-session handshake state: identities, hash chain, transcripts and the
//! derived key material.

use rand::Rng;

use crate::rtp_error::RtpError;
use crate::zrtp::kdf::{derive_key, hash_chain, sha256};
use crate::zrtp::message::{PK_LEN, RS_ID_LEN, ZID_LEN};

/// Which side of the exchange this endpoint plays after role election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZrtpRole {
    Initiator,
    Responder,
}

/// Session key material derived from s0 (Section 4.5.3 labels).
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    pub session_key: [u8; 32],
    pub sas_hash: [u8; 32],
    pub zrtp_key_i: [u8; 16],
    pub zrtp_key_r: [u8; 16],
    pub hmac_key_i: [u8; 32],
    pub hmac_key_r: [u8; 32],
}

impl DerivedKeys {
    pub fn derive(
        s0: &[u8; 32],
        zid_i: &[u8; ZID_LEN],
        zid_r: &[u8; ZID_LEN],
        total_hash: &[u8; 32],
    ) -> Result<Self, RtpError> {
        let mut keys = DerivedKeys {
            session_key: [0; 32],
            sas_hash: [0; 32],
            zrtp_key_i: [0; 16],
            zrtp_key_r: [0; 16],
            hmac_key_i: [0; 32],
            hmac_key_r: [0; 32],
        };
        derive_key(s0, "ZRTP Session Key", 256, zid_i, zid_r, total_hash, &mut keys.session_key)?;
        derive_key(s0, "SAS", 256, zid_i, zid_r, total_hash, &mut keys.sas_hash)?;
        derive_key(s0, "Initiator ZRTP key", 128, zid_i, zid_r, total_hash, &mut keys.zrtp_key_i)?;
        derive_key(s0, "Responder ZRTP key", 128, zid_i, zid_r, total_hash, &mut keys.zrtp_key_r)?;
        derive_key(s0, "Initiator HMAC key", 256, zid_i, zid_r, total_hash, &mut keys.hmac_key_i)?;
        derive_key(s0, "Responder HMAC key", 256, zid_i, zid_r, total_hash, &mut keys.hmac_key_r)?;
        Ok(keys)
    }
}

impl std::fmt::Debug for DerivedKeys {
    // key material stays out of logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys").finish_non_exhaustive()
    }
}

/// Everything one endpoint accumulates across the exchange.
pub struct ZrtpSession {
    /// Our 96-bit ZRTP identifier.
    pub zid: [u8; ZID_LEN],
    pub remote_zid: [u8; ZID_LEN],
    pub remote_version: u32,
    /// Our hash chain H0..H3.
    pub hashes: [[u8; 32]; 4],
    /// Random retained-secret IDs; no preshared mode, so the peer ignores them.
    pub rs_ids: [[u8; RS_ID_LEN]; 4],
    /// Our hash-value-of-initiator for Commit contention.
    pub hvi: [u8; 32],
    pub remote_hvi: [u8; 32],
    pub remote_public_key: [u8; PK_LEN],
    /// H0 the peer reveals in its Confirm message.
    pub remote_h0: [u8; 32],
    pub role: ZrtpRole,
    pub total_hash: [u8; 32],
    pub s0: [u8; 32],
    pub keys: Option<DerivedKeys>,
    // raw transcripts; the MAC chain and total_hash run over exact bytes
    pub l_hello: Vec<u8>,
    pub r_hello: Vec<u8>,
    pub l_commit: Vec<u8>,
    pub r_commit: Vec<u8>,
    pub l_dh: Vec<u8>,
    pub r_dh: Vec<u8>,
}

impl ZrtpSession {
    /// Fresh session state: random ZID, random H0 with its derived chain and
    /// random retained-secret IDs.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut zid = [0u8; ZID_LEN];
        rng.fill(&mut zid[..]);

        let mut h0 = [0u8; 32];
        rng.fill(&mut h0[..]);

        let mut rs_ids = [[0u8; RS_ID_LEN]; 4];
        for rs_id in rs_ids.iter_mut() {
            rng.fill(&mut rs_id[..]);
        }

        Self {
            zid,
            remote_zid: [0; ZID_LEN],
            remote_version: 0,
            hashes: hash_chain(&h0),
            rs_ids,
            hvi: [0; 32],
            remote_hvi: [0; 32],
            remote_public_key: [0; PK_LEN],
            remote_h0: [0; 32],
            role: ZrtpRole::Responder,
            total_hash: [0; 32],
            s0: [0; 32],
            keys: None,
            l_hello: Vec::new(),
            r_hello: Vec::new(),
            l_commit: Vec::new(),
            r_commit: Vec::new(),
            l_dh: Vec::new(),
            r_dh: Vec::new(),
        }
    }

    /// ZIDs ordered (initiator, responder) for hashing contexts.
    pub fn zid_pair(&self) -> ([u8; ZID_LEN], [u8; ZID_LEN]) {
        match self.role {
            ZrtpRole::Initiator => (self.zid, self.remote_zid),
            ZrtpRole::Responder => (self.remote_zid, self.zid),
        }
    }

    /// Recomputes our hvi from the tentative DHPart2 and the peer's Hello.
    pub fn compute_hvi(&mut self) {
        self.hvi = sha256(&[&self.l_dh, &self.r_hello]);
    }
}

impl Default for ZrtpSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_differ() {
        let a = ZrtpSession::new();
        let b = ZrtpSession::new();
        assert_ne!(a.zid, b.zid);
        assert_ne!(a.hashes[0], b.hashes[0]);
    }

    #[test]
    fn hash_chain_is_consistent() {
        let s = ZrtpSession::new();
        assert_eq!(s.hashes[1], sha256(&[&s.hashes[0]]));
        assert_eq!(s.hashes[3], sha256(&[&s.hashes[2]]));
    }

    #[test]
    fn zid_pair_follows_role() {
        let mut s = ZrtpSession::new();
        s.remote_zid = [9; ZID_LEN];
        s.role = ZrtpRole::Initiator;
        assert_eq!(s.zid_pair(), (s.zid, s.remote_zid));
        s.role = ZrtpRole::Responder;
        assert_eq!(s.zid_pair(), (s.remote_zid, s.zid));
    }

    #[test]
    fn derived_keys_depend_on_every_input() {
        let s0 = [1u8; 32];
        let a = DerivedKeys::derive(&s0, &[1; 12], &[2; 12], &[3; 32]).unwrap();
        let b = DerivedKeys::derive(&s0, &[1; 12], &[2; 12], &[3; 32]).unwrap();
        assert!(a == b);
        let c = DerivedKeys::derive(&[2u8; 32], &[1; 12], &[2; 12], &[3; 32]).unwrap();
        assert!(a != c);
        assert_ne!(a.zrtp_key_i, a.zrtp_key_r);
        assert_ne!(a.hmac_key_i, a.hmac_key_r);
    }
}
