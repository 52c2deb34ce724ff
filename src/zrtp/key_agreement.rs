//! Key agreement seam.
//!
//! The state machine only needs a public key to put on the wire and a shared
//! secret once the peer's key arrives; the group itself is a collaborator.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::zrtp::message::PK_LEN;

pub trait KeyAgreement {
    /// Our public key as sent in DHPart1/DHPart2.
    fn public_key(&self) -> [u8; PK_LEN];
    /// The shared secret for the peer's public key (the DHResult).
    fn shared_secret(&self, remote: &[u8; PK_LEN]) -> [u8; 32];
}

/// X25519 backend.
pub struct X25519KeyAgreement {
    secret: StaticSecret,
    public: PublicKey,
}

impl X25519KeyAgreement {
    /// Generate a fresh, random keypair.
    pub fn new() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }
}

impl Default for X25519KeyAgreement {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyAgreement for X25519KeyAgreement {
    fn public_key(&self) -> [u8; PK_LEN] {
        self.public.to_bytes()
    }

    fn shared_secret(&self, remote: &[u8; PK_LEN]) -> [u8; 32] {
        let peer = PublicKey::from(*remote);
        *self.secret.diffie_hellman(&peer).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree_on_the_secret() {
        let a = X25519KeyAgreement::new();
        let b = X25519KeyAgreement::new();
        let s1 = a.shared_secret(&b.public_key());
        let s2 = b.shared_secret(&a.public_key());
        assert_eq!(s1, s2);
        assert_ne!(s1, [0u8; 32]);
    }

    #[test]
    fn distinct_pairs_yield_distinct_secrets() {
        let a = X25519KeyAgreement::new();
        let b = X25519KeyAgreement::new();
        let c = X25519KeyAgreement::new();
        assert_ne!(a.shared_secret(&b.public_key()), a.shared_secret(&c.public_key()));
    }
}
