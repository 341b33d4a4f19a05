//! AES-CMAC-based key derivation and confirmation functions
//! ([Vol 3] Part H, Section 2.2.7 and 2.2.8).

use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::{Addr, IoCap, Ltk};

/// `btle` key ID used by [`f5`] ([Vol 3] Part H, Section 2.2.7).
const KEY_ID: [u8; 4] = *b"btle";

/// Salt used to derive the `f5` intermediate key `T`
/// ([Vol 3] Part H, Section 2.2.7).
const F5_SALT: [u8; 16] = [
    0x6C, 0x88, 0x83, 0x91, 0xAA, 0xF5, 0xA5, 0x38, 0x60, 0x37, 0x0B, 0xDB, 0x5A, 0x60, 0x83, 0xBE,
];

#[inline]
fn aes_cmac(key: &[u8; 16], msg: &[u8]) -> [u8; 16] {
    let mut m = <Cmac<Aes128> as Mac>::new_from_slice(key).expect("AES-128 key is 16 bytes");
    m.update(msg);
    m.finalize().into_bytes().into()
}

/// LE Secure Connections confirm value function, used for both numeric
/// comparison and passkey entry association models
/// ([Vol 3] Part H, Section 2.2.6).
///
/// `u` and `v` are the local and peer public key X coordinates; `z` is the
/// passkey bit (or `0` for the first of two numeric-comparison confirms).
#[must_use]
pub fn f4(u: &[u8; 32], v: &[u8; 32], x: &[u8; 16], z: u8) -> [u8; 16] {
    let mut msg = Vec::with_capacity(32 + 32 + 1);
    msg.extend_from_slice(u);
    msg.extend_from_slice(v);
    msg.push(z);
    aes_cmac(x, &msg)
}

/// LE Secure Connections key derivation function. Derives the `MacKey` and
/// `LTK` pair from the Diffie-Hellman shared secret `DHKey` ([Vol 3] Part H,
/// Section 2.2.7).
#[must_use]
pub fn f5(dhkey: &[u8; 32], n1: &[u8; 16], n2: &[u8; 16], a1: &Addr, a2: &Addr) -> (Ltk, Ltk) {
    let t = aes_cmac(&F5_SALT, dhkey);
    let mut common = Vec::with_capacity(1 + 4 + 16 + 16 + 7 + 7 + 2);
    common.extend_from_slice(&KEY_ID);
    common.extend_from_slice(n1);
    common.extend_from_slice(n2);
    common.extend_from_slice(a1.as_bytes());
    common.extend_from_slice(a2.as_bytes());
    common.extend_from_slice(&256u16.to_be_bytes());

    let mut mac_msg = Vec::with_capacity(1 + common.len());
    mac_msg.push(0);
    mac_msg.extend_from_slice(&common);
    let mac_key = aes_cmac(&t, &mac_msg);

    let mut ltk_msg = Vec::with_capacity(1 + common.len());
    ltk_msg.push(1);
    ltk_msg.extend_from_slice(&common);
    let ltk = aes_cmac(&t, &ltk_msg);
    (mac_key, ltk)
}

/// LE Secure Connections DHKey check function ([Vol 3] Part H, Section
/// 2.2.8). `io_cap` is the initiator's `AuthReq || OOB || IOCap` octets.
#[must_use]
pub fn f6(
    mac_key: &[u8; 16],
    n1: &[u8; 16],
    n2: &[u8; 16],
    r: &[u8; 16],
    io_cap: &IoCap,
    a1: &Addr,
    a2: &Addr,
) -> [u8; 16] {
    let mut msg = Vec::with_capacity(16 + 16 + 16 + 3 + 7 + 7);
    msg.extend_from_slice(n1);
    msg.extend_from_slice(n2);
    msg.extend_from_slice(r);
    msg.extend_from_slice(io_cap.as_bytes());
    msg.extend_from_slice(a1.as_bytes());
    msg.extend_from_slice(a2.as_bytes());
    aes_cmac(mac_key, &msg)
}

/// Numeric comparison value generation function. Returns the 6-digit value
/// displayed to the user ([Vol 3] Part H, Section 2.2.9).
#[must_use]
pub fn g2(u: &[u8; 32], v: &[u8; 32], x: &[u8; 16], y: &[u8; 16]) -> u32 {
    let mut msg = Vec::with_capacity(32 + 32 + 16);
    msg.extend_from_slice(u);
    msg.extend_from_slice(v);
    msg.extend_from_slice(y);
    let mac = aes_cmac(x, &msg);
    let v32 = u32::from_be_bytes([mac[12], mac[13], mac[14], mac[15]]);
    v32 % 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b0: u8) -> Addr {
        Addr::from_le_bytes(false, [b0, 1, 2, 3, 4, 5])
    }

    #[test]
    fn f4_is_deterministic_and_sensitive() {
        let u = [1u8; 32];
        let v = [2u8; 32];
        let x = [3u8; 16];
        let a = f4(&u, &v, &x, 0);
        let b = f4(&u, &v, &x, 0);
        assert_eq!(a, b);
        let c = f4(&u, &v, &x, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn f5_produces_distinct_mac_key_and_ltk() {
        let dhkey = [9u8; 32];
        let n1 = [1u8; 16];
        let n2 = [2u8; 16];
        let (mac_key, ltk) = f5(&dhkey, &n1, &n2, &addr(0xAA), &addr(0xBB));
        assert_ne!(mac_key, ltk);
        let (mac_key2, ltk2) = f5(&dhkey, &n1, &n2, &addr(0xAA), &addr(0xBB));
        assert_eq!(mac_key, mac_key2);
        assert_eq!(ltk, ltk2);
    }

    #[test]
    fn f6_changes_with_role_swapped_addresses() {
        let mac_key = [7u8; 16];
        let n1 = [1u8; 16];
        let n2 = [2u8; 16];
        let r = [3u8; 16];
        let io = IoCap::new(0x01, false, 0x03);
        let a = addr(0x10);
        let b = addr(0x20);
        let check1 = f6(&mac_key, &n1, &n2, &r, &io, &a, &b);
        let check2 = f6(&mac_key, &n1, &n2, &r, &io, &b, &a);
        assert_ne!(check1, check2);
    }

    #[test]
    fn g2_is_six_digits_or_fewer() {
        let u = [1u8; 32];
        let v = [2u8; 32];
        let x = [3u8; 16];
        let y = [4u8; 16];
        let code = g2(&u, &v, &x, &y);
        assert!(code < 1_000_000);
    }
}
