//! Synchronous HCI event decoding (§4.2). Ported from the async event
//! decoder's framing logic, stripped of the `tokio`-based event router —
//! dispatch and correlation now live in [`super::transport`].

use crate::error::{Error, Result};
use crate::octets::Unpacker;

use super::consts::EventFmt;
use super::{ConnHandle, EventCode, Opcode, Status};

/// One decoded HCI event. Borrows from the packet buffer it was parsed
/// from.
#[derive(Clone, Debug)]
pub struct Event<'a> {
    code: EventCode,
    status: Status,
    cmd_quota: u8,
    opcode: Opcode,
    handle: u16,
    params: Unpacker<'a>,
}

impl<'a> Event<'a> {
    #[must_use]
    pub const fn code(&self) -> EventCode {
        self.code
    }

    /// Status for events that carry one, or `Status::Success` otherwise.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Opcode from `CommandComplete`/`CommandStatus` events; `Opcode::None`
    /// for anything else.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Number of HCI command packets the controller is now willing to
    /// accept, from `CommandComplete`/`CommandStatus`.
    #[must_use]
    pub const fn cmd_quota(&self) -> u8 {
        self.cmd_quota
    }

    #[must_use]
    pub fn conn_handle(&self) -> Option<ConnHandle> {
        self.code
            .param_fmt()
            .contains(EventFmt::CONN_HANDLE)
            .then(|| ConnHandle::new(self.handle))
    }

    /// Returns whatever parameter bytes remain after the common header
    /// fields (status/handle/opcode) were consumed.
    #[must_use]
    pub fn params(&self) -> &Unpacker<'a> {
        &self.params
    }

    #[must_use]
    pub fn params_mut(&mut self) -> &mut Unpacker<'a> {
        &mut self.params
    }
}

impl<'a> TryFrom<&'a [u8]> for Event<'a> {
    type Error = Error;

    /// Parses an `EVENT` packet payload (without the leading packet-type
    /// byte): `[code:1][len:1][params]`, with LE meta-events carrying a
    /// further `[subevent:1]` inside `params`.
    fn try_from(raw: &'a [u8]) -> Result<Self> {
        let mut u = Unpacker::new(raw);
        let code_byte = u.u8();
        let len = usize::from(u.u8());
        if !u.is_ok() || u.len() != len {
            return Err(Error::Codec("truncated HCI event header"));
        }
        let code = if code_byte == EventCode::LeMetaEvent as u8 {
            let subevent = u.u8();
            let combined = (u16::from(subevent) << 8) | u16::from(code_byte);
            EventCode::try_from(combined).map_err(|_| Error::Codec("unknown LE subevent"))?
        } else {
            EventCode::try_from(u16::from(code_byte)).map_err(|_| Error::Codec("unknown HCI event"))?
        };

        let mut evt = Self {
            code,
            status: Status::Success,
            cmd_quota: 0,
            opcode: Opcode::None,
            handle: 0,
            params: u,
        };
        match code {
            EventCode::CommandComplete => {
                evt.cmd_quota = evt.params.u8();
                evt.opcode = Opcode::from(evt.params.u16());
                if !evt.params.is_empty() {
                    evt.status = Status::from(evt.params.u8());
                }
            }
            EventCode::CommandStatus => {
                evt.status = Status::from(evt.params.u8());
                evt.cmd_quota = evt.params.u8();
                evt.opcode = Opcode::from(evt.params.u16());
            }
            _ => {
                let pf = code.param_fmt();
                if pf.intersects(EventFmt::STATUS) {
                    evt.status = Status::from(evt.params.u8());
                }
                if pf.intersects(EventFmt::HANDLE) {
                    evt.handle = if pf.intersects(EventFmt::ADV_HANDLE | EventFmt::BIG_HANDLE) {
                        u16::from(evt.params.u8())
                    } else {
                        evt.params.u16()
                    };
                }
            }
        }
        Ok(evt)
    }
}

/// Decoder for a specific event's trailing parameters, mirroring the
/// `FromEvent` pattern used by individual event payload types.
pub trait EventKind: Sized {
    /// Returns whether this type decodes events of `code`.
    fn matches(code: EventCode) -> bool;

    /// Decodes the event's remaining parameters. Called only when
    /// [`EventKind::matches`] returned `true`.
    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self;
}

/// `DISCONNECTION_COMPLETE` parameters ([Vol 4] Part E, Section 7.7.5).
#[derive(Clone, Copy, Debug)]
pub struct DisconnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub reason: Status,
}

impl EventKind for DisconnectionComplete {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::DisconnectionComplete)
    }

    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        Self {
            status: evt.status(),
            handle: evt.conn_handle().unwrap_or(ConnHandle::PENDING),
            reason: Status::from(params.u8()),
        }
    }
}

/// `LE_CONNECTION_COMPLETE` parameters ([Vol 4] Part E, Section 7.7.65.1).
#[derive(Clone, Copy, Debug)]
pub struct LeConnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub role: u8,
    pub peer_addr_type: u8,
    pub peer_addr: [u8; 6],
    pub conn_interval: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
}

impl EventKind for LeConnectionComplete {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::LeConnectionComplete)
    }

    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        Self {
            status: evt.status(),
            handle: evt.conn_handle().unwrap_or(ConnHandle::PENDING),
            role: params.u8(),
            peer_addr_type: params.u8(),
            peer_addr: params.eui48(),
            conn_interval: params.u16(),
            conn_latency: params.u16(),
            supervision_timeout: params.u8() as u16 | (u16::from(params.u8()) << 8),
        }
    }
}

/// `LE_READ_REMOTE_FEATURES_COMPLETE` parameters ([Vol 4] Part E, Section
/// 7.7.65.4).
#[derive(Clone, Copy, Debug)]
pub struct LeReadRemoteFeaturesComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub features: u64,
}

impl EventKind for LeReadRemoteFeaturesComplete {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::LeReadRemoteFeaturesComplete)
    }

    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        Self {
            status: evt.status(),
            handle: evt.conn_handle().unwrap_or(ConnHandle::PENDING),
            features: params.u64(),
        }
    }
}

/// `LE_LONG_TERM_KEY_REQUEST` parameters ([Vol 4] Part E, Section 7.7.65.5).
#[derive(Clone, Copy, Debug)]
pub struct LeLongTermKeyRequest {
    pub handle: ConnHandle,
    pub rand: u64,
    pub ediv: u16,
}

impl EventKind for LeLongTermKeyRequest {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::LeLongTermKeyRequest)
    }

    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        Self {
            handle: evt.conn_handle().unwrap_or(ConnHandle::PENDING),
            rand: params.u64(),
            ediv: params.u16(),
        }
    }
}

/// `ENCRYPTION_CHANGE` (v1) parameters ([Vol 4] Part E, Section 7.7.8).
#[derive(Clone, Copy, Debug)]
pub struct EncryptionChange {
    pub status: Status,
    pub handle: ConnHandle,
    pub enabled: bool,
}

impl EventKind for EncryptionChange {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::EncryptionChangeV1)
    }

    fn unpack(evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        Self {
            status: evt.status(),
            handle: evt.conn_handle().unwrap_or(ConnHandle::PENDING),
            enabled: params.u8() != 0,
        }
    }
}

/// `ENCRYPTION_KEY_REFRESH_COMPLETE` parameters ([Vol 4] Part E, Section
/// 7.7.39).
#[derive(Clone, Copy, Debug)]
pub struct EncryptionKeyRefreshComplete {
    pub status: Status,
    pub handle: ConnHandle,
}

impl EventKind for EncryptionKeyRefreshComplete {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::EncryptionKeyRefreshComplete)
    }

    fn unpack(_evt: &Event<'_>, _params: &mut Unpacker<'_>) -> Self {
        Self {
            status: _evt.status(),
            handle: _evt.conn_handle().unwrap_or(ConnHandle::PENDING),
        }
    }
}

/// `LE_ADVERTISING_REPORT` parameters ([Vol 4] Part E, Section 7.7.65.2):
/// one event carries one-or-more reports, each with its own address, RSSI,
/// and AD-structure payload (§4.3 "parse one-or-more EIRs").
#[derive(Clone, Debug)]
pub struct LeAdvertisingReports(pub Vec<crate::gap::AdvertisingReport>);

impl EventKind for LeAdvertisingReports {
    fn matches(code: EventCode) -> bool {
        matches!(code, EventCode::LeAdvertisingReport)
    }

    fn unpack(_evt: &Event<'_>, params: &mut Unpacker<'_>) -> Self {
        use crate::addr::{AddrType, AddressAndType, Eui48};
        use crate::gap::{AdvSource, EInfoReport};

        let num = usize::from(params.u8());
        let mut event_types = Vec::with_capacity(num);
        let mut addr_types = Vec::with_capacity(num);
        let mut addrs = Vec::with_capacity(num);
        for _ in 0..num {
            event_types.push(params.u8());
        }
        // Controllers interleave per-field arrays for multi-report events;
        // this host only ever configures `filter_duplicates`-off single
        // reports, so treat `num` as 1 in well-formed wire data while still
        // parsing the documented multi-report layout defensively.
        for _ in 0..num {
            addr_types.push(params.u8());
        }
        for _ in 0..num {
            addrs.push(params.eui48());
        }
        let mut lens = Vec::with_capacity(num);
        for _ in 0..num {
            lens.push(usize::from(params.u8()));
        }
        let mut reports = Vec::with_capacity(num);
        for i in 0..num {
            let data = params.raw(lens[i]).to_vec();
            let source = if event_types[i] & 0x04 != 0 { AdvSource::AdvScanRsp } else { AdvSource::AdvInd };
            let eir = EInfoReport::parse(&data, source);
            let addr_type = if addr_types[i] == 0x01 { AddrType::LeRandom } else { AddrType::LePublic };
            let mut octets = addrs[i];
            octets.reverse();
            reports.push(crate::gap::AdvertisingReport {
                addr: AddressAndType::new(Eui48::new(octets), addr_type),
                rssi: 0,
                eir,
            });
        }
        for r in &mut reports {
            r.rssi = params.u8() as i8;
        }
        Self(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_complete(opcode: u16, status: u8) -> Vec<u8> {
        let mut v = vec![EventCode::CommandComplete as u8, 4, 1];
        v.extend_from_slice(&opcode.to_le_bytes());
        v.push(status);
        v
    }

    #[test]
    fn parses_command_complete() {
        let raw = cmd_complete(Opcode::Reset.into(), 0x00);
        let evt = Event::try_from(raw.as_slice()).unwrap();
        assert_eq!(evt.code(), EventCode::CommandComplete);
        assert_eq!(evt.opcode(), Opcode::Reset);
        assert_eq!(evt.status(), Status::Success);
    }

    #[test]
    fn parses_disconnection_complete() {
        let mut raw = vec![EventCode::DisconnectionComplete as u8, 4, 0x00, 0x40, 0x00, 0x13];
        let evt = Event::try_from(raw.as_slice()).unwrap();
        assert_eq!(evt.conn_handle(), Some(ConnHandle::new(0x0040)));
        let mut params = evt.params().clone();
        let dc = DisconnectionComplete::unpack(&evt, &mut params);
        assert_eq!(dc.reason, Status::RemoteUserTerminatedConnection);
        raw.clear();
    }

    #[test]
    fn rejects_truncated_header() {
        let raw = [EventCode::HardwareError as u8, 5];
        assert!(Event::try_from(raw.as_slice()).is_err());
    }
}
