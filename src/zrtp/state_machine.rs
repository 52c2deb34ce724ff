//! The key exchange state machine.
//!
//! Four phases run in sequence: Hello exchange, role election, DH exchange
//! and finalization. Each phase retransmits its message on a doubling
//! timeout (`Backoff`) and advances on the peer's answer; exhausting a
//! schedule fails the session with `Timeout`, a MAC or hash-chain mismatch
//! fails it fatally with `InvalidValue`.
//!
//! The handshake runs once per session as one logical task blocking on the
//! transport; there are no timer threads.

use std::sync::Arc;
use std::time::Duration;

use crate::log::log_sink::LogSink;
use crate::rtp_error::RtpError;
use crate::zrtp::backoff::Backoff;
use crate::zrtp::kdf::{compute_s0, hash_chain, sha256, verify_mac};
use crate::zrtp::key_agreement::KeyAgreement;
use crate::zrtp::message::{
    algos, classify, encode_ack, CommitMsg, ConfirmMsg, DhPartMsg, HelloMsg, MsgType, ZRTP_VERSION,
};
use crate::zrtp::session::{DerivedKeys, ZrtpRole, ZrtpSession};
use crate::zrtp::transport::ZrtpTransport;
use crate::{sink_debug, sink_error, sink_info, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    HelloExchange,
    RoleElection,
    DhExchange,
    Finalize,
    Complete,
}

/// RFC 6189 Commit contention: compare the 32-byte hvi values from the last
/// byte down; the strictly greater byte at the first difference wins the
/// initiator role.
pub(crate) fn initiator_wins(ours: &[u8; 32], theirs: &[u8; 32]) -> bool {
    for i in (0..32).rev() {
        if ours[i] > theirs[i] {
            return true;
        }
        if ours[i] < theirs[i] {
            return false;
        }
    }
    true
}

/// One endpoint of the key exchange.
pub struct ZrtpHandshake<T: ZrtpTransport, K: KeyAgreement> {
    transport: T,
    key_agreement: K,
    session: ZrtpSession,
    logger: Arc<dyn LogSink>,
    /// A message received one phase early, consumed by the next phase.
    pending: Option<Vec<u8>>,
}

impl<T: ZrtpTransport, K: KeyAgreement> ZrtpHandshake<T, K> {
    pub fn new(transport: T, key_agreement: K, logger: Arc<dyn LogSink>) -> Self {
        Self {
            transport,
            key_agreement,
            session: ZrtpSession::new(),
            logger,
            pending: None,
        }
    }

    /// The elected role, meaningful once `run` returned successfully.
    pub fn role(&self) -> ZrtpRole {
        self.session.role
    }

    /// Runs the exchange to completion and returns the derived key material.
    pub fn run(&mut self) -> Result<DerivedKeys, RtpError> {
        let mut state = HandshakeState::HelloExchange;
        loop {
            state = match state {
                HandshakeState::HelloExchange => {
                    self.hello_exchange()?;
                    sink_debug!(self.logger, "hello exchange complete");
                    HandshakeState::RoleElection
                }
                HandshakeState::RoleElection => {
                    self.role_election()?;
                    sink_info!(self.logger, "role elected: {:?}", self.session.role);
                    HandshakeState::DhExchange
                }
                HandshakeState::DhExchange => {
                    match self.session.role {
                        ZrtpRole::Responder => self.dh_part1()?,
                        ZrtpRole::Initiator => self.dh_part2()?,
                    }
                    HandshakeState::Finalize
                }
                HandshakeState::Finalize => {
                    match self.session.role {
                        ZrtpRole::Responder => self.responder_finalize()?,
                        ZrtpRole::Initiator => self.initiator_finalize()?,
                    }
                    HandshakeState::Complete
                }
                HandshakeState::Complete => {
                    sink_info!(self.logger, "key exchange complete");
                    return self
                        .session
                        .keys
                        .clone()
                        .ok_or_else(|| RtpError::Generic("no key material derived".into()));
                }
            };
        }
    }

    /// Exchange Hello/HelloACK until both directions are confirmed.
    fn hello_exchange(&mut self) -> Result<(), RtpError> {
        let hello = HelloMsg {
            version: ZRTP_VERSION,
            zid: self.session.zid,
            h3: self.session.hashes[3],
        };
        // Hello is authenticated with H2, one level below the H3 it reveals
        self.session.l_hello = hello.encode(&self.session.hashes[2])?;
        let hello_ack = encode_ack(MsgType::HelloAck);
        let mut hello_recv = false;

        for timeout in Backoff::HELLO.timeouts() {
            if self.transport.send(&self.session.l_hello).is_err() {
                sink_error!(self.logger, "failed to send Hello message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            match classify(&raw) {
                Some(MsgType::Hello) => {
                    let _ = self.transport.send(&hello_ack);
                    if hello_recv {
                        continue;
                    }
                    let msg = match HelloMsg::decode(&raw) {
                        Ok(msg) => msg,
                        Err(_) => {
                            sink_warn!(self.logger, "malformed Hello message ignored");
                            continue;
                        }
                    };
                    if msg.version != ZRTP_VERSION {
                        if msg.version < ZRTP_VERSION {
                            sink_error!(
                                self.logger,
                                "remote supports version {}, we require {}; session cannot continue",
                                msg.version,
                                ZRTP_VERSION
                            );
                            return Err(RtpError::NotSupported);
                        }
                        sink_warn!(
                            self.logger,
                            "protocol version {} not supported, keep sending Hello messages",
                            msg.version
                        );
                        continue;
                    }
                    hello_recv = true;
                    self.session.remote_version = msg.version;
                    self.session.remote_zid = msg.zid;
                    self.session.r_hello = raw;
                }
                // our Hello was ACKed; done once we also hold theirs
                Some(MsgType::HelloAck) => {
                    if hello_recv {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        // remote never answered, or kept an incompatible version in use
        Err(RtpError::Timeout)
    }

    /// Decide who initiates: a queued Commit decides outright, otherwise we
    /// contend with our own Commit and let the hvi comparison settle it.
    fn role_election(&mut self) -> Result<(), RtpError> {
        // Craft the tentative DHPart2 first: our hvi is the hash of its
        // bytes and the peer's Hello, and the election compares hvi values.
        let dh2 = DhPartMsg {
            h1: self.session.hashes[1],
            rs_ids: self.session.rs_ids,
            public_key: self.key_agreement.public_key(),
        };
        self.session.l_dh = dh2.encode(MsgType::DhPart2, &self.session.hashes[0])?;
        self.session.compute_hvi();

        let commit = CommitMsg {
            zid: self.session.zid,
            h2: self.session.hashes[2],
            hvi: self.session.hvi,
            hash_algo: algos::HASH_S256,
            cipher_algo: algos::CIPHER_AES1,
            auth_tag: algos::AUTH_HS32,
            key_agreement: algos::KEY_AGREEMENT_X255,
            sas_type: algos::SAS_B32,
        };
        self.session.l_commit = commit.encode(&self.session.hashes[1])?;

        // drain whatever is queued: a Commit means the peer already leads
        loop {
            match self.transport.recv(Duration::ZERO) {
                Ok(raw) => {
                    if classify(&raw) == Some(MsgType::Commit) {
                        if let Ok(msg) = CommitMsg::decode(&raw) {
                            self.session.remote_hvi = msg.hvi;
                            self.session.r_commit = raw;
                            self.session.role = ZrtpRole::Responder;
                            return Ok(());
                        }
                    }
                }
                Err(RtpError::Timeout) => break,
                Err(e) => return Err(e),
            }
        }

        // assume initiator until a larger hvi proves otherwise
        self.session.role = ZrtpRole::Initiator;

        for timeout in Backoff::COMMIT.timeouts() {
            if self.transport.send(&self.session.l_commit).is_err() {
                sink_error!(self.logger, "failed to send Commit message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            match classify(&raw) {
                Some(MsgType::Commit) => {
                    let msg = match CommitMsg::decode(&raw) {
                        Ok(msg) => msg,
                        Err(_) => continue,
                    };
                    self.session.remote_hvi = msg.hvi;
                    if !initiator_wins(&self.session.hvi, &self.session.remote_hvi) {
                        sink_debug!(self.logger, "commit contention lost, we respond");
                        self.session.r_commit = raw;
                        self.session.role = ZrtpRole::Responder;
                        return Ok(());
                    }
                }
                // the peer elected us by answering our Commit
                Some(MsgType::DhPart1) | Some(MsgType::Confirm1) => {
                    self.pending = Some(raw);
                    return Ok(());
                }
                _ => {}
            }
        }

        Err(RtpError::Timeout)
    }

    /// Responder half of the DH exchange: DHPart1 out, DHPart2 in.
    fn dh_part1(&mut self) -> Result<(), RtpError> {
        let dh1 = DhPartMsg {
            h1: self.session.hashes[1],
            rs_ids: self.session.rs_ids,
            public_key: self.key_agreement.public_key(),
        };
        self.session.l_dh = dh1.encode(MsgType::DhPart1, &self.session.hashes[0])?;

        for timeout in Backoff::COMMIT.timeouts() {
            if self.transport.send(&self.session.l_dh).is_err() {
                sink_error!(self.logger, "failed to send DHPart1 message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            if classify(&raw) == Some(MsgType::DhPart2) {
                let msg = match DhPartMsg::decode(&raw, MsgType::DhPart2) {
                    Ok(msg) => msg,
                    Err(_) => {
                        sink_error!(self.logger, "failed to parse DHPart2 message");
                        continue;
                    }
                };
                self.session.remote_public_key = msg.public_key;
                self.session.r_dh = raw;
                self.generate_shared_secrets()?;
                return Ok(());
            }
        }

        Err(RtpError::Timeout)
    }

    /// Initiator half: parse the DHPart1 that elected us, answer with
    /// DHPart2 and wait for Confirm1.
    fn dh_part2(&mut self) -> Result<(), RtpError> {
        let raw = self.pending.take().ok_or(RtpError::InvalidValue)?;
        let msg = DhPartMsg::decode(&raw, MsgType::DhPart1).map_err(|e| {
            sink_error!(self.logger, "failed to parse DHPart1 message");
            e
        })?;
        self.session.remote_public_key = msg.public_key;
        self.session.r_dh = raw;
        self.generate_shared_secrets()?;

        for timeout in Backoff::COMMIT.timeouts() {
            if self.transport.send(&self.session.l_dh).is_err() {
                sink_error!(self.logger, "failed to send DHPart2 message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            if classify(&raw) == Some(MsgType::Confirm1) {
                self.pending = Some(raw);
                return Ok(());
            }
        }

        Err(RtpError::Timeout)
    }

    /// DHResult, total_hash, s0 and the derived keys (Section 4.4.1.4).
    fn generate_shared_secrets(&mut self) -> Result<(), RtpError> {
        let mut dh_result = self.key_agreement.shared_secret(&self.session.remote_public_key);

        let s = &mut self.session;
        // total_hash covers Hello(R), Commit(I), DHPart1, DHPart2
        s.total_hash = match s.role {
            ZrtpRole::Initiator => sha256(&[&s.r_hello, &s.l_commit, &s.r_dh, &s.l_dh]),
            ZrtpRole::Responder => sha256(&[&s.l_hello, &s.r_commit, &s.l_dh, &s.r_dh]),
        };

        let (zid_i, zid_r) = s.zid_pair();
        s.s0 = compute_s0(&mut dh_result, &zid_i, &zid_r, &s.total_hash);
        s.keys = Some(DerivedKeys::derive(&s.s0, &zid_i, &zid_r, &s.total_hash)?);

        sink_debug!(self.logger, "shared secrets and session keys derived");
        Ok(())
    }

    /// The MAC chain (Section 9): from the revealed H0, derive H1..H3 and
    /// verify each earlier message with the matching level.
    fn validate_session(&self) -> Result<(), RtpError> {
        let derived = hash_chain(&self.session.remote_h0);

        if verify_mac(&derived[2], &self.session.r_hello).is_err() {
            sink_error!(self.logger, "hash mismatch for Hello message");
            return Err(RtpError::InvalidValue);
        }

        // the initiator may never have seen a Commit at all
        if self.session.role == ZrtpRole::Responder
            && verify_mac(&derived[1], &self.session.r_commit).is_err()
        {
            sink_error!(self.logger, "hash mismatch for Commit message");
            return Err(RtpError::InvalidValue);
        }

        if verify_mac(&derived[0], &self.session.r_dh).is_err() {
            sink_error!(self.logger, "hash mismatch for DHPart1/DHPart2 message");
            return Err(RtpError::InvalidValue);
        }

        sink_debug!(self.logger, "all hashes match");
        Ok(())
    }

    fn confirm_mac_key(&self, sender: ZrtpRole) -> Result<[u8; 32], RtpError> {
        let keys = self
            .session
            .keys
            .as_ref()
            .ok_or_else(|| RtpError::Generic("confirm before key derivation".into()))?;
        Ok(match sender {
            ZrtpRole::Initiator => keys.hmac_key_i,
            ZrtpRole::Responder => keys.hmac_key_r,
        })
    }

    /// Responder: Confirm1 out, Confirm2 in, validate, ACK.
    fn responder_finalize(&mut self) -> Result<(), RtpError> {
        let confirm1 = ConfirmMsg {
            h0: self.session.hashes[0],
        }
        .encode(MsgType::Confirm1, &self.confirm_mac_key(ZrtpRole::Responder)?)?;
        let confack = encode_ack(MsgType::Conf2Ack);

        for timeout in Backoff::COMMIT.timeouts() {
            if self.transport.send(&confirm1).is_err() {
                sink_error!(self.logger, "failed to send Confirm1 message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            if classify(&raw) == Some(MsgType::Confirm2) {
                let msg = match ConfirmMsg::decode(&raw, MsgType::Confirm2) {
                    Ok(msg) => msg,
                    Err(_) => {
                        sink_error!(self.logger, "failed to parse Confirm2 message");
                        continue;
                    }
                };
                if verify_mac(&self.confirm_mac_key(ZrtpRole::Initiator)?, &raw).is_err() {
                    sink_error!(self.logger, "Confirm2 MAC mismatch, session cannot continue");
                    return Err(RtpError::InvalidValue);
                }
                self.session.remote_h0 = msg.h0;
                self.validate_session().map_err(|e| {
                    sink_error!(
                        self.logger,
                        "mismatch on one of the received MACs, session cannot continue"
                    );
                    e
                })?;

                let _ = self.transport.send(&confack);
                return Ok(());
            }
        }

        Err(RtpError::Timeout)
    }

    /// Initiator: parse Confirm1, validate, Confirm2 out, wait for Conf2ACK.
    fn initiator_finalize(&mut self) -> Result<(), RtpError> {
        let raw = self.pending.take().ok_or(RtpError::InvalidValue)?;
        let msg = ConfirmMsg::decode(&raw, MsgType::Confirm1).map_err(|e| {
            sink_error!(self.logger, "failed to parse Confirm1 message");
            e
        })?;
        if verify_mac(&self.confirm_mac_key(ZrtpRole::Responder)?, &raw).is_err() {
            sink_error!(self.logger, "Confirm1 MAC mismatch, session cannot continue");
            return Err(RtpError::InvalidValue);
        }
        self.session.remote_h0 = msg.h0;
        self.validate_session().map_err(|e| {
            sink_error!(
                self.logger,
                "mismatch on one of the received MACs, session cannot continue"
            );
            e
        })?;

        let confirm2 = ConfirmMsg {
            h0: self.session.hashes[0],
        }
        .encode(MsgType::Confirm2, &self.confirm_mac_key(ZrtpRole::Initiator)?)?;

        for timeout in Backoff::COMMIT.timeouts() {
            if self.transport.send(&confirm2).is_err() {
                sink_error!(self.logger, "failed to send Confirm2 message");
            }

            let raw = match self.transport.recv(timeout) {
                Ok(raw) => raw,
                Err(RtpError::Timeout) => continue,
                Err(e) => return Err(e),
            };

            if classify(&raw) == Some(MsgType::Conf2Ack) {
                sink_debug!(self.logger, "Conf2ACK received");
                return Ok(());
            }
        }

        Err(RtpError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::noop_log_sink::NoopLogSink;
    use crate::zrtp::key_agreement::X25519KeyAgreement;
    use crate::zrtp::transport::ChannelTransport;

    #[test]
    fn election_is_total_and_antisymmetric() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 2;
        b[31] = 1;
        assert!(initiator_wins(&a, &b));
        assert!(!initiator_wins(&b, &a));

        // first difference from the top decides, lower bytes are noise
        let mut c = [0xFFu8; 32];
        let mut d = [0x00u8; 32];
        c[31] = 1;
        d[31] = 2;
        assert!(!initiator_wins(&c, &d));
        assert!(initiator_wins(&d, &c));

        // ties resolve consistently
        assert!(initiator_wins(&a, &a));
    }

    #[test]
    fn full_exchange_agrees_on_keys_and_roles() {
        let (ta, tb) = ChannelTransport::pair();

        let handle = std::thread::spawn(move || {
            let mut hs = ZrtpHandshake::new(ta, X25519KeyAgreement::new(), Arc::new(NoopLogSink));
            let keys = hs.run().expect("peer A handshake");
            (keys, hs.role())
        });

        let mut hs = ZrtpHandshake::new(tb, X25519KeyAgreement::new(), Arc::new(NoopLogSink));
        let keys_b = hs.run().expect("peer B handshake");
        let role_b = hs.role();

        let (keys_a, role_a) = handle.join().expect("peer A thread");

        assert_ne!(role_a, role_b);
        assert!(keys_a == keys_b);
        assert_ne!(keys_a.session_key, [0u8; 32]);
        assert_ne!(keys_a.hmac_key_i, keys_a.hmac_key_r);
    }

    #[test]
    fn silence_times_out() {
        let (ta, _tb) = ChannelTransport::pair();
        let mut hs = ZrtpHandshake::new(ta, X25519KeyAgreement::new(), Arc::new(NoopLogSink));
        assert_eq!(hs.run(), Err(RtpError::Timeout));
    }
}
