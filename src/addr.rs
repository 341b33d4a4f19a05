//! Device addressing (C1, §3 `AddressAndType`).

use std::fmt;

/// BR/EDR or LE address type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AddrType {
    BrEdr,
    LePublic,
    LeRandom,
}

/// Derived sub-type for a `LE_RANDOM` address, from the top two bits of the
/// address (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RandomAddrSubType {
    UnresolvablePrivate,
    ResolvablePrivate,
    StaticPublic,
}

impl RandomAddrSubType {
    /// Derives the sub-type from the top two bits of a random address's most
    /// significant octet (the address is stored in wire/network order:
    /// `eui[5]` is the most significant byte).
    #[must_use]
    pub fn from_msb(msb: u8) -> Self {
        match msb >> 6 {
            0b00 => Self::UnresolvablePrivate,
            0b01 => Self::ResolvablePrivate,
            _ => Self::StaticPublic,
        }
    }
}

/// A 6-octet EUI-48 device address, stored most-significant-octet first
/// (the conventional `AA:BB:CC:DD:EE:FF` display order).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Eui48(pub [u8; 6]);

impl Eui48 {
    /// Creates an address from the display-order octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the most significant octet (used to derive the
    /// [`RandomAddrSubType`]).
    #[must_use]
    pub fn msb(&self) -> u8 {
        self.0[0]
    }

    /// Formats as lowercase hex with no separators, used in key store file
    /// names (§6.1).
    #[must_use]
    pub fn to_hex_compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for Eui48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for Eui48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `(EUI-48 address, address-type)` pair (§3). Value-equal by the pair;
/// hashable.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct AddressAndType {
    pub addr: Eui48,
    pub addr_type: AddrType,
}

impl AddressAndType {
    #[must_use]
    pub const fn new(addr: Eui48, addr_type: AddrType) -> Self {
        Self { addr, addr_type }
    }

    /// Derives the [`RandomAddrSubType`], or `None` if this isn't a
    /// `LE_RANDOM` address.
    #[must_use]
    pub fn random_sub_type(&self) -> Option<RandomAddrSubType> {
        matches!(self.addr_type, AddrType::LeRandom)
            .then(|| RandomAddrSubType::from_msb(self.addr.msb()))
    }

    /// Returns a single digit encoding the address type, used in key store
    /// file names (§6.1): `0` = BR/EDR, `1` = LE public, `2` = LE random.
    #[must_use]
    pub fn type_digit(&self) -> u8 {
        match self.addr_type {
            AddrType::BrEdr => 0,
            AddrType::LePublic => 1,
            AddrType::LeRandom => 2,
        }
    }

    /// Reconstructs an [`AddressAndType`] from a stored type digit.
    #[must_use]
    pub fn from_type_digit(addr: Eui48, digit: u8) -> Option<Self> {
        let addr_type = match digit {
            0 => AddrType::BrEdr,
            1 => AddrType::LePublic,
            2 => AddrType::LeRandom,
            _ => return None,
        };
        Some(Self::new(addr, addr_type))
    }
}

impl fmt::Display for AddressAndType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.addr, self.addr_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_sub_type_from_top_bits() {
        let a = AddressAndType::new(Eui48::new([0x00, 0, 0, 0, 0, 0]), AddrType::LeRandom);
        assert_eq!(a.random_sub_type(), Some(RandomAddrSubType::UnresolvablePrivate));
        let b = AddressAndType::new(Eui48::new([0x40, 0, 0, 0, 0, 0]), AddrType::LeRandom);
        assert_eq!(b.random_sub_type(), Some(RandomAddrSubType::ResolvablePrivate));
        let c = AddressAndType::new(Eui48::new([0xC0, 0, 0, 0, 0, 0]), AddrType::LeRandom);
        assert_eq!(c.random_sub_type(), Some(RandomAddrSubType::StaticPublic));
    }

    #[test]
    fn type_digit_round_trips() {
        let a = AddressAndType::new(Eui48::new([1, 2, 3, 4, 5, 6]), AddrType::LePublic);
        let digit = a.type_digit();
        let back = AddressAndType::from_type_digit(a.addr, digit).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn hex_compact_has_no_separators() {
        let a = Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(a.to_hex_compact(), "AABBCCDDEEFF");
    }
}
