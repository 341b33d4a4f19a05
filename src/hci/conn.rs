//! Per-adapter HCI connection tracking (§3 `HCIConnection`, §4.3 "Connection
//! trackers").

use parking_lot::Mutex;

use crate::addr::AddressAndType;

use super::{ConnHandle, Status};

/// One tracked HCI-layer connection: a peer address paired with its
/// handle. A zero handle ([`ConnHandle::PENDING`]) means a connect command
/// has been issued and the controller has not yet reported
/// `LE_CONNECTION_COMPLETE`; only a pending handle may be overwritten with a
/// real one (§3, §4.3).
#[derive(Clone, Copy, Debug)]
pub struct HciConnection {
    pub addr: AddressAndType,
    pub handle: ConnHandle,
}

impl HciConnection {
    #[must_use]
    pub const fn pending(addr: AddressAndType) -> Self {
        Self {
            addr,
            handle: ConnHandle::PENDING,
        }
    }
}

/// Lifecycle state of a tracked disconnect command, used to synthesize a
/// disconnect event if the controller never replies (§5 "synthetic
/// disconnect on failed disconnect/socket-close mid-connection").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
}

/// `connectionList`/`disconnectCmdList` from §4.3: tracks in-flight LE
/// connect attempts and in-flight disconnect commands so that the reader
/// thread can correlate completion events and, if the controller or
/// transport fails mid-flight, synthesize the missing event rather than
/// leaving a `Device` in limbo.
#[derive(Debug, Default)]
pub struct ConnTrackers {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    connections: Vec<HciConnection>,
    disconnecting: Vec<ConnHandle>,
}

impl ConnTrackers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending connect attempt. Returns `false` (and does not
    /// add a duplicate) if `addr` is already tracked.
    pub fn add_pending(&self, addr: AddressAndType) -> bool {
        let mut inner = self.inner.lock();
        if inner.connections.iter().any(|c| c.addr == addr) {
            return false;
        }
        inner.connections.push(HciConnection::pending(addr));
        true
    }

    /// Records the real handle assigned to `addr` once
    /// `LE_CONNECTION_COMPLETE` arrives. Refuses (and logs via
    /// `tracing::warn`) to overwrite a connection that already has a
    /// non-zero handle (§4.3: "must not be silently overwritten").
    pub fn complete(&self, addr: AddressAndType, handle: ConnHandle) -> bool {
        let mut inner = self.inner.lock();
        match inner.connections.iter_mut().find(|c| c.addr == addr) {
            Some(c) if c.handle.is_pending() => {
                c.handle = handle;
                true
            }
            Some(c) => {
                tracing::warn!(
                    addr = %c.addr,
                    existing = %c.handle,
                    attempted = %handle,
                    "refusing to overwrite non-pending HCI connection handle"
                );
                false
            }
            None => {
                inner.connections.push(HciConnection { addr, handle });
                true
            }
        }
    }

    /// Removes and returns the tracked connection for `handle`, e.g. on
    /// `DISCONNECTION_COMPLETE`.
    pub fn remove(&self, handle: ConnHandle) -> Option<HciConnection> {
        let mut inner = self.inner.lock();
        let idx = inner.connections.iter().position(|c| c.handle == handle)?;
        Some(inner.connections.remove(idx))
    }

    #[must_use]
    pub fn find_by_addr(&self, addr: AddressAndType) -> Option<HciConnection> {
        self.inner.lock().connections.iter().find(|c| c.addr == addr).copied()
    }

    #[must_use]
    pub fn find_by_handle(&self, handle: ConnHandle) -> Option<HciConnection> {
        self.inner.lock().connections.iter().find(|c| c.handle == handle).copied()
    }

    /// Marks a disconnect command as in flight for `handle`.
    pub fn begin_disconnect(&self, handle: ConnHandle) {
        let mut inner = self.inner.lock();
        if !inner.disconnecting.contains(&handle) {
            inner.disconnecting.push(handle);
        }
    }

    /// Returns whether a disconnect is already in flight for `handle`.
    #[must_use]
    pub fn is_disconnecting(&self, handle: ConnHandle) -> bool {
        self.inner.lock().disconnecting.contains(&handle)
    }

    /// Clears the in-flight disconnect marker, e.g. once
    /// `DISCONNECTION_COMPLETE` (real or synthesized) has been delivered.
    pub fn end_disconnect(&self, handle: ConnHandle) {
        self.inner.lock().disconnecting.retain(|h| *h != handle);
    }

    /// Returns every connection still tracked, used by `close()` to
    /// synthesize disconnects for anything left dangling when the
    /// transport shuts down (§5 cancellation policy).
    #[must_use]
    pub fn drain_all(&self) -> Vec<HciConnection> {
        let mut inner = self.inner.lock();
        inner.disconnecting.clear();
        std::mem::take(&mut inner.connections)
    }
}

/// Reason code used for a synthesized disconnect when the transport cannot
/// obtain a real one from the controller (§5, §7).
pub const SYNTHETIC_DISCONNECT_REASON: Status = Status::ConnectionTerminatedByLocalHost;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrType, Eui48};

    fn addr(b: u8) -> AddressAndType {
        AddressAndType::new(Eui48::new([b, 0, 0, 0, 0, 0]), AddrType::LePublic)
    }

    #[test]
    fn pending_handle_is_overwritable_once() {
        let t = ConnTrackers::new();
        assert!(t.add_pending(addr(1)));
        assert!(t.complete(addr(1), ConnHandle::new(0x0040)));
        assert_eq!(t.find_by_addr(addr(1)).unwrap().handle, ConnHandle::new(0x0040));
    }

    #[test]
    fn non_pending_handle_is_not_overwritten() {
        let t = ConnTrackers::new();
        t.add_pending(addr(2));
        assert!(t.complete(addr(2), ConnHandle::new(0x0041)));
        assert!(!t.complete(addr(2), ConnHandle::new(0x0099)));
        assert_eq!(t.find_by_addr(addr(2)).unwrap().handle, ConnHandle::new(0x0041));
    }

    #[test]
    fn remove_drops_tracked_connection() {
        let t = ConnTrackers::new();
        t.add_pending(addr(3));
        t.complete(addr(3), ConnHandle::new(0x0042));
        let removed = t.remove(ConnHandle::new(0x0042)).unwrap();
        assert_eq!(removed.addr, addr(3));
        assert!(t.find_by_addr(addr(3)).is_none());
    }
}
