//! Management-event bus: translates raw HCI events into the
//! higher-level events adapters and devices react to (C4, §4.4).

use crate::addr::{AddrType, AddressAndType, Eui48};
use crate::gap::EInfoReport;
use crate::hci::{
    ConnHandle, EncryptionChange, EncryptionKeyRefreshComplete, Event, EventCode, EventKind,
    LeAdvertisingReports, LeConnectionComplete, LeLongTermKeyRequest, LeReadRemoteFeaturesComplete,
    Status,
};

/// A management event, derived from one or more HCI events per the mapping
/// table in §4.4. This is the vocabulary the adapter/device state machines
/// consume; it deliberately hides HCI wire details (opcodes, subevent
/// codes, parameter layout).
#[derive(Clone, Debug)]
pub enum MgmtEvent {
    /// `LE_CONNECTION_COMPLETE` (success) or `CONNECTION_COMPLETE` (BR/EDR).
    Connected {
        addr: AddressAndType,
        handle: ConnHandle,
    },
    /// `LE_CONNECTION_COMPLETE` (failure) or a synthesized connect failure.
    ConnectFailed { addr: AddressAndType, status: Status },
    /// `DISCONNECTION_COMPLETE`, real or synthesized (§5, §7: exactly one
    /// per successful connect, §I1).
    Disconnected {
        handle: ConnHandle,
        reason: Status,
    },
    /// `LE_ADVERTISING_REPORT`.
    DeviceFound {
        addr: AddressAndType,
        eir: EInfoReport,
    },
    /// `LE_READ_REMOTE_FEATURES_COMPLETE`.
    RemoteFeaturesComplete {
        handle: ConnHandle,
        status: Status,
        features: u64,
    },
    /// `HCI_LE_Enable_Encryption` local request acknowledgement /
    /// `ENCRYPTION_CHANGE`.
    EncryptionChanged { handle: ConnHandle, enabled: bool },
    /// `ENCRYPTION_KEY_REFRESH_COMPLETE`.
    EncryptionKeyRefresh { handle: ConnHandle, status: Status },
    /// `HCI_LE_Long_Term_Key_Request`.
    LongTermKeyRequest {
        handle: ConnHandle,
        ediv: u16,
        rand: u64,
    },
    /// A new LTK became available for the connection (either freshly
    /// distributed via SMP, or mirrored per §4.7 "SC encryption key mirrored
    /// to both init+resp LTK").
    NewLongTermKey { handle: ConnHandle, ltk: [u8; 16] },
    /// `NEW_LINK_KEY` (BR/EDR).
    NewLinkKey { handle: ConnHandle, key: [u8; 16] },
    /// `IDENTITY_ADDRESS_INFORMATION` resolved the peer's stable identity;
    /// the open question in §9 requires a `deviceUpdated` notification with
    /// `BDADDR|BDADDR_TYPE` changed.
    IdentityResolved {
        handle: ConnHandle,
        identity: AddressAndType,
    },
}

/// Translates one decoded HCI event into zero or more normalized
/// [`MgmtEvent`]s per the mapping table in §4.4. `peer_of` resolves a
/// connection handle to the peer's `AddressAndType`, needed because most HCI
/// events after `LE_CONNECTION_COMPLETE` only carry the handle.
pub fn translate(evt: &Event<'_>, peer_of: impl Fn(ConnHandle) -> Option<AddressAndType>) -> Vec<MgmtEvent> {
    let mut params = evt.params().clone();
    match evt.code() {
        EventCode::LeConnectionComplete => {
            let cc = LeConnectionComplete::unpack(evt, &mut params);
            if cc.status.is_ok() {
                let addr_type = if cc.peer_addr_type == 0x01 { AddrType::LeRandom } else { AddrType::LePublic };
                let mut octets = cc.peer_addr;
                octets.reverse();
                let addr = AddressAndType::new(Eui48::new(octets), addr_type);
                vec![MgmtEvent::Connected { addr, handle: cc.handle }]
            } else if let Some(addr) = peer_of(cc.handle) {
                vec![MgmtEvent::ConnectFailed { addr, status: cc.status }]
            } else {
                Vec::new()
            }
        }
        EventCode::LeAdvertisingReport => {
            let reports = LeAdvertisingReports::unpack(evt, &mut params);
            reports
                .0
                .into_iter()
                .map(|r| {
                    let mut eir = r.eir;
                    eir.set_rssi(r.rssi);
                    MgmtEvent::DeviceFound { addr: r.addr, eir }
                })
                .collect()
        }
        EventCode::LeReadRemoteFeaturesComplete => {
            let rc = LeReadRemoteFeaturesComplete::unpack(evt, &mut params);
            vec![MgmtEvent::RemoteFeaturesComplete { handle: rc.handle, status: rc.status, features: rc.features }]
        }
        EventCode::EncryptionChangeV1 => {
            let ec = EncryptionChange::unpack(evt, &mut params);
            vec![MgmtEvent::EncryptionChanged { handle: ec.handle, enabled: ec.status.is_ok() && ec.enabled }]
        }
        EventCode::EncryptionKeyRefreshComplete => {
            let kr = EncryptionKeyRefreshComplete::unpack(evt, &mut params);
            vec![MgmtEvent::EncryptionKeyRefresh { handle: kr.handle, status: kr.status }]
        }
        EventCode::LeLongTermKeyRequest => {
            let lr = LeLongTermKeyRequest::unpack(evt, &mut params);
            vec![MgmtEvent::LongTermKeyRequest { handle: lr.handle, ediv: lr.ediv, rand: lr.rand }]
        }
        EventCode::DisconnectionComplete => {
            let dc = crate::hci::DisconnectionComplete::unpack(evt, &mut params);
            vec![MgmtEvent::Disconnected { handle: dc.handle, reason: dc.reason }]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrType, Eui48};

    #[test]
    fn mgmt_event_is_cloneable_and_constructible() {
        let addr = AddressAndType::new(Eui48::new([1, 2, 3, 4, 5, 6]), AddrType::LePublic);
        let e = MgmtEvent::Connected {
            addr,
            handle: ConnHandle::new(0x0040),
        };
        let cloned = e.clone();
        match cloned {
            MgmtEvent::Connected { handle, .. } => assert_eq!(handle, ConnHandle::new(0x0040)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn translate_le_connection_complete_success() {
        let mut raw = vec![EventCode::LeConnectionComplete as u8, 19, 0x01, 0x00];
        raw.extend_from_slice(&[0x40, 0x00]); // handle
        raw.push(0x00); // role: master
        raw.push(0x00); // peer addr type: public
        raw.extend_from_slice(&[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]); // peer addr (wire order)
        raw.extend_from_slice(&[0x00, 0x00]); // conn interval
        raw.extend_from_slice(&[0x00, 0x00]); // conn latency
        raw.extend_from_slice(&[0xC8, 0x00]); // supervision timeout
        let evt = Event::try_from(raw.as_slice()).unwrap();
        let out = translate(&evt, |_| None);
        assert_eq!(out.len(), 1);
        match &out[0] {
            MgmtEvent::Connected { handle, addr } => {
                assert_eq!(*handle, ConnHandle::new(0x0040));
                assert_eq!(addr.addr, Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
            }
            _ => panic!("wrong variant"),
        }
    }
}
