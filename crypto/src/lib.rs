//! Bluetooth LE cryptographic toolbox ([Vol 3] Part H, Section 2.2).

#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(unused_crate_dependencies)]

pub use crate::{cmac::*, p256::*};

mod cmac;
mod p256;

/// 128-bit Long Term Key.
pub type Ltk = [u8; 16];

/// 56-bit device address in big-endian byte order used by [`f5`] and [`f6`]
/// functions ([Vol 3] Part H, Section 2.2.7 and 2.2.8).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(transparent)]
pub struct Addr([u8; 7]);

impl Addr {
    /// Creates a device address from a little-endian encoded byte array.
    /// `is_random` is the address-type bit prepended by the toolbox
    /// functions ([Vol 3] Part H, Section 2.2.7).
    #[inline]
    #[must_use]
    pub fn from_le_bytes(is_random: bool, mut v: [u8; 6]) -> Self {
        v.reverse();
        let mut addr = Self::default();
        addr.0[0] = u8::from(is_random);
        addr.0[1..].copy_from_slice(&v);
        addr
    }

    #[inline]
    #[must_use]
    fn as_bytes(&self) -> &[u8; 7] {
        &self.0
    }
}

/// Concatenated `AuthReq`, OOB data flag, and IO capability parameters used
/// by the [`f6`] function ([Vol 3] Part H, Section 2.2.8).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[must_use]
#[repr(transparent)]
pub struct IoCap([u8; 3]);

impl IoCap {
    /// Creates a new `IoCap` parameter. Byte order matches the over-the-air
    /// `AuthReq || OOB || IOCap` field used by `f6`.
    #[inline(always)]
    pub fn new(auth_req: u8, oob: bool, io_cap: u8) -> Self {
        Self([auth_req, u8::from(oob), io_cap])
    }

    #[inline]
    #[must_use]
    fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

/// Generates a fresh 128-bit nonce for the SC Confirm/Random exchange
/// ([Vol 3] Part H, Section 2.3.5.6.2).
#[must_use]
pub fn random_nonce() -> [u8; 16] {
    use rand_core::{OsRng, RngCore};
    let mut n = [0u8; 16];
    OsRng.fill_bytes(&mut n);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_nonce_is_not_constant() {
        assert_ne!(random_nonce(), random_nonce());
    }
}
