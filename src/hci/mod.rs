//! HCI packet codec, synchronous transport, and connection tracking
//! (C2/C3, §4.2-§4.4).

pub mod cmd;
mod conn;
mod consts;
mod event;
mod packet;
mod transport;

pub use cmd::Command;
pub use conn::{ConnTrackers, ConnectionState, HciConnection};
pub use consts::{
    AdvAddrType, AdvChanMap, AdvDataOp, AdvFilterPolicy, AdvPhy, AdvProp, CoreVersion, EventCode,
    Opcode, Role, Status,
};
pub use event::{
    DisconnectionComplete, EncryptionChange, EncryptionKeyRefreshComplete, Event, EventKind,
    LeAdvertisingReports, LeConnectionComplete, LeLongTermKeyRequest, LeReadRemoteFeaturesComplete,
};
pub use packet::{PacketType, ACL_HDR, CMD_BUF, CMD_HDR, EVT_BUF, EVT_HDR};
pub use transport::{
    CommandResult, HciTransport, Socket, Transport, TransportEvent, TransportStats,
    TransportStatsSnapshot,
};

/// Connection handle ([Vol 4] Part E, Section 5.3.1). Range is 0x0000-0x0EFF;
/// the top four bits are reserved.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ConnHandle(u16);

impl ConnHandle {
    /// Sentinel meaning "no handle assigned yet" (a connect command has been
    /// issued but `LE_CONNECTION_COMPLETE` has not arrived; §3 `HCIConnection`).
    pub const PENDING: Self = Self(0);

    #[must_use]
    pub const fn new(v: u16) -> Self {
        Self(v & 0x0FFF)
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for ConnHandle {
    fn from(v: u16) -> Self {
        Self::new(v)
    }
}

impl From<ConnHandle> for u16 {
    fn from(h: ConnHandle) -> Self {
        h.0
    }
}

impl std::fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// HCI event mask state, tracked across Page 1, Page 2, and LE bits
/// (§4.3 "event mask ... opcode mask = all issued opcodes").
#[derive(Clone, Copy, Debug, Default)]
pub struct EventMask {
    pub(super) p1: u64,
    pub(super) p2: u64,
    pub(super) le: u64,
}

impl EventMask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables delivery of `evt` (clears the associated bit if `enable` is
    /// false).
    pub fn set(&mut self, evt: EventCode, enable: bool) -> &mut Self {
        evt.set(self, enable);
        self
    }

    #[must_use]
    pub const fn page1(&self) -> u64 {
        self.p1
    }

    #[must_use]
    pub const fn page2(&self) -> u64 {
        self.p2
    }

    #[must_use]
    pub const fn le(&self) -> u64 {
        self.le
    }
}

impl FromIterator<EventCode> for EventMask {
    fn from_iter<I: IntoIterator<Item = EventCode>>(iter: I) -> Self {
        let mut m = Self::default();
        for e in iter {
            m.set(e, true);
        }
        m
    }
}

/// Default HCI event mask per §4.3: `CONN_COMPLETE`, `DISCONN_COMPLETE`,
/// `CMD_COMPLETE`, `CMD_STATUS`, `HARDWARE_ERROR`, and `LE_META`.
#[must_use]
pub fn default_event_mask() -> EventMask {
    [
        EventCode::ConnectionComplete,
        EventCode::DisconnectionComplete,
        EventCode::HardwareError,
        EventCode::LeMetaEvent,
        EventCode::EncryptionChangeV1,
        EventCode::EncryptionKeyRefreshComplete,
    ]
    .into_iter()
    .collect()
}

/// Default LE meta-event mask per §4.3: `LE_CONN_COMPLETE`,
/// `LE_ADVERTISING_REPORT`, `LE_REMOTE_FEAT_COMPLETE`.
#[must_use]
pub fn default_le_event_mask() -> EventMask {
    [
        EventCode::LeConnectionComplete,
        EventCode::LeAdvertisingReport,
        EventCode::LeReadRemoteFeaturesComplete,
        EventCode::LeLongTermKeyRequest,
    ]
    .into_iter()
    .collect()
}
