//! Extended Inquiry Response / advertising data container (§3 `EInfoReport`).

use bitflags::bitflags;

use crate::addr::AddressAndType;
use crate::gap::{AdvFlag, Appearance, Uuid};
use crate::octets::Unpacker;

use super::consts::ResponseDataType;

bitflags! {
    /// Marks which [`EInfoReport`] fields have been set, for merge semantics
    /// (§3).
    #[derive(Default)]
    pub struct EirFieldMask: u16 {
        const FLAGS = 1 << 0;
        const NAME = 1 << 1;
        const SHORT_NAME = 1 << 2;
        const TX_POWER = 1 << 3;
        const MANUFACTURER_DATA = 1 << 4;
        const SERVICE_UUIDS = 1 << 5;
        const APPEARANCE = 1 << 6;
        const CONN_INTERVAL = 1 << 7;
        const RSSI = 1 << 8;
    }
}

/// Which advertising PDU an [`EInfoReport`] (or a field within it) was
/// sourced from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdvSource {
    AdvInd,
    AdvScanRsp,
}

/// Mutable container of advertising data accumulated for one device (§3).
/// Supports merging two reports (e.g. an `AD_IND` and a later `AD_SCAN_RSP`)
/// via [`EInfoReport::merge`], where fields present in `other` overwrite
/// fields in `self` only for bits set in `other`'s mask.
#[derive(Clone, Debug, Default)]
pub struct EInfoReport {
    mask: EirFieldMask,
    pub flags: AdvFlag,
    pub name: String,
    pub short_name: String,
    pub tx_power: i8,
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
    pub service_uuids: Vec<Uuid>,
    pub appearance: Appearance,
    pub conn_interval: Option<(u16, u16)>,
    pub rssi: i8,
    pub source: Option<AdvSource>,
}

impl EInfoReport {
    /// Returns which fields have been set.
    #[must_use]
    pub fn mask(&self) -> EirFieldMask {
        self.mask
    }

    /// Sets the RSSI field out-of-band (the advertising-report RSSI rides
    /// alongside the AD-structure payload, not within it).
    pub fn set_rssi(&mut self, rssi: i8) {
        self.rssi = rssi;
        self.mask |= EirFieldMask::RSSI;
    }

    /// Merges `other` into `self`: every field whose bit is set in `other`'s
    /// mask replaces the corresponding field in `self`.
    pub fn merge(&mut self, other: &Self) {
        if other.mask.contains(EirFieldMask::FLAGS) {
            self.flags = other.flags;
        }
        if other.mask.contains(EirFieldMask::NAME) {
            self.name = other.name.clone();
        }
        if other.mask.contains(EirFieldMask::SHORT_NAME) {
            self.short_name = other.short_name.clone();
        }
        if other.mask.contains(EirFieldMask::TX_POWER) {
            self.tx_power = other.tx_power;
        }
        if other.mask.contains(EirFieldMask::MANUFACTURER_DATA) {
            self.manufacturer_data = other.manufacturer_data.clone();
        }
        if other.mask.contains(EirFieldMask::SERVICE_UUIDS) {
            self.service_uuids = other.service_uuids.clone();
        }
        if other.mask.contains(EirFieldMask::APPEARANCE) {
            self.appearance = other.appearance;
        }
        if other.mask.contains(EirFieldMask::CONN_INTERVAL) {
            self.conn_interval = other.conn_interval;
        }
        if other.mask.contains(EirFieldMask::RSSI) {
            self.rssi = other.rssi;
        }
        self.mask |= other.mask;
        if other.source.is_some() {
            self.source = other.source;
        }
    }

    /// Parses one AD structure stream (as carried in `LE_ADVERTISING_REPORT`
    /// or classic EIR) into an [`EInfoReport`].
    #[must_use]
    pub fn parse(data: &[u8], source: AdvSource) -> Self {
        let mut r = Self {
            source: Some(source),
            ..Self::default()
        };
        let mut u = Unpacker::new(data);
        while !u.is_empty() {
            let len = usize::from(u.u8());
            if len == 0 {
                break;
            }
            let Some(mut field) = u.skip(len) else { break };
            let Ok(typ) = ResponseDataType::try_from(field.u8()) else {
                continue;
            };
            r.apply_field(typ, &mut field);
        }
        r
    }

    fn apply_field(&mut self, typ: ResponseDataType, body: &mut Unpacker) {
        match typ {
            ResponseDataType::Flags => {
                self.flags = AdvFlag::from_bits_truncate(body.u8());
                self.mask |= EirFieldMask::FLAGS;
            }
            ResponseDataType::ShortLocalName => {
                self.short_name = String::from_utf8_lossy(body.as_slice()).into_owned();
                self.mask |= EirFieldMask::SHORT_NAME;
            }
            ResponseDataType::CompleteLocalName => {
                self.name = String::from_utf8_lossy(body.as_slice()).into_owned();
                self.mask |= EirFieldMask::NAME;
            }
            ResponseDataType::TxPower => {
                self.tx_power = body.u8() as i8;
                self.mask |= EirFieldMask::TX_POWER;
            }
            ResponseDataType::Appearance => {
                self.appearance = Appearance::from(body.u16());
                self.mask |= EirFieldMask::APPEARANCE;
            }
            ResponseDataType::ManufacturerData => {
                let id = body.u16();
                self.manufacturer_data.push((id, body.as_slice().to_vec()));
                self.mask |= EirFieldMask::MANUFACTURER_DATA;
            }
            ResponseDataType::CompleteServiceClass16 | ResponseDataType::IncompleteServiceClass16 => {
                while body.len() >= 2 {
                    if let Some(u) = Uuid::new(u128::from(body.u16())) {
                        self.service_uuids.push(u);
                    }
                }
                self.mask |= EirFieldMask::SERVICE_UUIDS;
            }
            ResponseDataType::CompleteServiceClass128 | ResponseDataType::IncompleteServiceClass128 => {
                while body.len() >= 16 {
                    if let Some(u) = Uuid::new(body.u128()) {
                        self.service_uuids.push(u);
                    }
                }
                self.mask |= EirFieldMask::SERVICE_UUIDS;
            }
            ResponseDataType::PeripheralConnectionIntervalRange => {
                self.conn_interval = Some((body.u16(), body.u16()));
                self.mask |= EirFieldMask::CONN_INTERVAL;
            }
            _ => {}
        }
    }

    /// Returns the best available display name: complete name if set, else
    /// the short name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            &self.short_name
        }
    }
}

/// One `LE_ADVERTISING_REPORT` subevent entry, prior to being merged into
/// the owning device's [`EInfoReport`].
#[derive(Clone, Debug)]
pub struct AdvertisingReport {
    pub addr: AddressAndType,
    pub rssi: i8,
    pub eir: EInfoReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_name() {
        let mut data = Vec::new();
        data.extend_from_slice(&[2, 0x01, 0x06]); // Flags
        data.extend_from_slice(&[6, 0x09, b'S', b'e', b'n', b's', b'o']); // (truncated) complete name
        let r = EInfoReport::parse(&data, AdvSource::AdvInd);
        assert!(r.mask().contains(EirFieldMask::FLAGS));
        assert_eq!(r.flags, AdvFlag::LE_GENERAL | AdvFlag::NO_BREDR);
        assert!(r.mask().contains(EirFieldMask::NAME));
    }

    #[test]
    fn merge_only_overwrites_set_fields() {
        let mut base = EInfoReport::parse(&[2, 0x01, 0x06], AdvSource::AdvInd);
        let scan_rsp = EInfoReport::parse(&[4, 0x09, b'A', b'B', b'C'], AdvSource::AdvScanRsp);
        base.merge(&scan_rsp);
        assert!(base.mask().contains(EirFieldMask::FLAGS));
        assert!(base.mask().contains(EirFieldMask::NAME));
        assert_eq!(base.name, "ABC");
    }
}
