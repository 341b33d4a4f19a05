//! P-256 key pair generation and ECDH shared secret derivation for LE Secure
//! Connections pairing ([Vol 3] Part H, Section 2.3.5.6).

use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, PublicKey};
use rand_core::OsRng;

/// Uncompressed P-256 public key coordinates as sent over the air: 32-byte
/// `X` followed by 32-byte `Y`, both little-endian ([Vol 3] Part H, Section
/// 2.3.5.6.1).
pub type PublicKeyBytes = [u8; 64];

/// A local P-256 key pair used for one pairing attempt. Regenerated for
/// every pairing; never persisted.
#[derive(Debug)]
pub struct KeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a new, random key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the public key in the little-endian `X || Y` wire format.
    #[must_use]
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        let pt = self.public.to_encoded_point(false);
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(pt.x().expect("uncompressed point has x"));
        out[32..].copy_from_slice(pt.y().expect("uncompressed point has y"));
        out[..32].reverse();
        out[32..].reverse();
        out
    }

    /// Computes the Diffie-Hellman shared secret (`DHKey`) with a peer's
    /// public key received over the air. Returns `None` if the peer's point
    /// is not a valid P-256 public key (the peer must be disconnected and
    /// pairing must fail, per [Vol 3] Part H, Section 2.3.5.6.1).
    #[must_use]
    pub fn dhkey(&self, peer: &PublicKeyBytes) -> Option<[u8; 32]> {
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&peer[..32]);
        y.copy_from_slice(&peer[32..]);
        x.reverse();
        y.reverse();
        let pt = EncodedPoint::from_affine_coordinates(&x.into(), &y.into(), false);
        let peer_pk = PublicKey::from_sec1_bytes(pt.as_bytes()).ok()?;
        let shared = self.secret.diffie_hellman(&peer_pk);
        let mut dh = [0u8; 32];
        dh.copy_from_slice(shared.raw_secret_bytes().as_slice());
        Some(dh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree_on_the_same_dhkey() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let dh_a = a.dhkey(&b.public_key_bytes()).unwrap();
        let dh_b = b.dhkey(&a.public_key_bytes()).unwrap();
        assert_eq!(dh_a, dh_b);
    }

    #[test]
    fn rejects_garbage_peer_key() {
        let a = KeyPair::generate();
        assert!(a.dhkey(&[0xFFu8; 64]).is_none());
    }
}
