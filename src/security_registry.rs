//! Pattern-matched per-device security policy (C10, §3, §9
//! "`BTSecurityRegistry` address/name pattern matching").
//!
//! Entries narrow security requirements for devices matching an address
//! prefix or a name prefix; they never widen what a caller explicitly
//! requested (§9 "the registry only narrows, never widens").

use crate::addr::{AddrType, AddressAndType, Eui48};
use crate::smp::{IoCap, SecLevel};

/// Sentinel meaning "no fixed passkey configured"; the original's
/// `NO_PASSKEY = -1` (§9).
pub const NO_PASSKEY: i32 = -1;

/// One security policy: the level/IO-cap/passkey to apply when a matching
/// entry is found.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityPolicy {
    pub sec_level: SecLevel,
    pub io_cap: IoCap,
    pub io_cap_auto: IoCap,
    pub passkey: i32,
}

impl SecurityPolicy {
    #[must_use]
    pub fn new(sec_level: SecLevel, io_cap: IoCap) -> Self {
        Self {
            sec_level,
            io_cap,
            io_cap_auto: IoCap::Unset(0xFF),
            passkey: NO_PASSKEY,
        }
    }
}

/// A byte-prefix match against an [`Eui48`]/[`AddrType`] pair. `prefix_len`
/// counts octets compared from the most significant end (display order).
#[derive(Clone, Copy, Debug)]
struct AddrPrefix {
    addr_type: AddrType,
    prefix: Eui48,
    prefix_len: u8,
}

impl AddrPrefix {
    fn matches(&self, addr: AddressAndType) -> bool {
        addr.addr_type == self.addr_type
            && addr.addr.0[..usize::from(self.prefix_len)] == self.prefix.0[..usize::from(self.prefix_len)]
    }
}

enum Matcher {
    Addr(AddrPrefix),
    Name(String),
}

struct Entry {
    matcher: Matcher,
    policy: SecurityPolicy,
}

/// Ordered collection of security entries, matched address-prefix entries
/// first (in insertion order), then name-prefix entries (§9: "try
/// address-sub entries first in insertion order, then name-sub entries").
#[derive(Default)]
pub struct SecurityRegistry {
    entries: Vec<Entry>,
}

impl SecurityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry matched by an address prefix of `prefix_len` octets
    /// (counted from the most-significant octet of `prefix`).
    pub fn add_addr_prefix(&mut self, addr_type: AddrType, prefix: Eui48, prefix_len: u8, policy: SecurityPolicy) {
        self.entries.push(Entry {
            matcher: Matcher::Addr(AddrPrefix { addr_type, prefix, prefix_len: prefix_len.min(6) }),
            policy,
        });
    }

    /// Adds an entry matched by a case-sensitive device-name prefix.
    pub fn add_name_prefix(&mut self, prefix: impl Into<String>, policy: SecurityPolicy) {
        self.entries.push(Entry {
            matcher: Matcher::Name(prefix.into()),
            policy,
        });
    }

    /// Resolves the policy for a connecting device: address-prefix entries
    /// are tried first, in insertion order, then name-prefix entries.
    /// Returns `None` if nothing matches, in which case the caller's
    /// explicit request passes through untouched (§9 "narrows, never
    /// widens").
    #[must_use]
    pub fn resolve(&self, addr: AddressAndType, name: &str) -> Option<SecurityPolicy> {
        for e in &self.entries {
            if let Matcher::Addr(p) = &e.matcher {
                if p.matches(addr) {
                    return Some(e.policy);
                }
            }
        }
        for e in &self.entries {
            if let Matcher::Name(prefix) = &e.matcher {
                if !prefix.is_empty() && name.starts_with(prefix.as_str()) {
                    return Some(e.policy);
                }
            }
        }
        None
    }

    /// Global get-or-default: returns the resolved policy, or
    /// `(SecLevel::Unset, IoCap::Unset)` if nothing matches (§9 "global
    /// get-or-default").
    #[must_use]
    pub fn resolve_or_default(&self, addr: AddressAndType, name: &str) -> SecurityPolicy {
        self.resolve(addr, name).unwrap_or_else(|| SecurityPolicy::new(SecLevel::Unset, IoCap::Unset(0xFF)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(octets: [u8; 6], t: AddrType) -> AddressAndType {
        AddressAndType::new(Eui48::new(octets), t)
    }

    #[test]
    fn address_prefix_entries_are_tried_before_name_entries() {
        let mut reg = SecurityRegistry::new();
        reg.add_name_prefix("Sensor", SecurityPolicy::new(SecLevel::EncOnly, IoCap::NoInputNoOutput));
        reg.add_addr_prefix(
            AddrType::LePublic,
            Eui48::new([0xAA, 0xBB, 0xCC, 0, 0, 0]),
            3,
            SecurityPolicy::new(SecLevel::EncAuth, IoCap::DisplayYesNo),
        );
        let a = addr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], AddrType::LePublic);
        let resolved = reg.resolve(a, "Sensor-1").unwrap();
        assert_eq!(resolved.sec_level, SecLevel::EncAuth);
    }

    #[test]
    fn falls_back_to_name_prefix_when_no_address_matches() {
        let mut reg = SecurityRegistry::new();
        reg.add_name_prefix("Sensor", SecurityPolicy::new(SecLevel::EncOnly, IoCap::NoInputNoOutput));
        let a = addr([1, 2, 3, 4, 5, 6], AddrType::LePublic);
        let resolved = reg.resolve(a, "Sensor-9").unwrap();
        assert_eq!(resolved.sec_level, SecLevel::EncOnly);
    }

    #[test]
    fn unmatched_device_gets_unset_default() {
        let reg = SecurityRegistry::new();
        let a = addr([1, 2, 3, 4, 5, 6], AddrType::LePublic);
        let resolved = reg.resolve_or_default(a, "whatever");
        assert_eq!(resolved.sec_level, SecLevel::Unset);
        assert!(resolved.io_cap.is_unset());
    }
}
