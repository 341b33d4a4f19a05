//! Synchronous HCI transport: one reader thread, a bounded event ring, and
//! command/reply correlation (C3, §4.3, §5, §6.2).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::octets::Unpacker;

use super::cmd::Command;
use super::conn::{ConnTrackers, SYNTHETIC_DISCONNECT_REASON};
use super::event::{DisconnectionComplete, Event, EventKind};
use super::packet::{encode_acl, encode_command, PacketType};
use super::{ConnHandle, EventCode, Opcode, Status};

/// A raw, framed byte stream to/from the controller. Opening the underlying
/// kernel HCI socket is out of scope (§1 Non-goals): callers provide an
/// implementation (a real datagram socket in production, an in-memory
/// fixture in tests).
pub trait Socket: Send + Sync {
    /// Sends one fully framed packet (packet-type byte first).
    fn send(&self, packet: &[u8]) -> std::io::Result<()>;

    /// Blocks for up to `timeout` for the next fully framed packet.
    /// Returns `Ok(None)` on a poll timeout with no data.
    fn recv(&self, timeout: Duration) -> std::io::Result<Option<Vec<u8>>>;
}

/// Transport-level counters (§9 "`HCIHandler` statistics counters").
#[derive(Debug, Default)]
pub struct TransportStats {
    pub commands_sent: AtomicU64,
    pub events_received: AtomicU64,
    pub ring_overflows: AtomicU64,
    pub ring_dropped: AtomicU64,
    pub command_timeouts: AtomicU64,
    pub synthetic_disconnects: AtomicU64,
}

impl TransportStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot as plain integers.
    #[must_use]
    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            ring_overflows: self.ring_overflows.load(Ordering::Relaxed),
            ring_dropped: self.ring_dropped.load(Ordering::Relaxed),
            command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
            synthetic_disconnects: self.synthetic_disconnects.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of [`TransportStats`], cheap to pass around.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransportStatsSnapshot {
    pub commands_sent: u64,
    pub events_received: u64,
    pub ring_overflows: u64,
    pub ring_dropped: u64,
    pub command_timeouts: u64,
    pub synthetic_disconnects: u64,
}

/// Result of a completed command: the status plus any return parameters
/// (empty for status-only commands).
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub status: Status,
    pub params: Vec<u8>,
}

impl CommandResult {
    /// Returns `Ok(self)` if `status` is success, else the corresponding
    /// error.
    pub fn into_result(self) -> Result<Self> {
        if self.status.is_ok() {
            Ok(self)
        } else {
            Err(Error::ControllerRejection(self.status))
        }
    }
}

/// Opcodes that acknowledge via `CommandStatus` immediately and complete
/// asynchronously through a separate event, rather than via
/// `CommandComplete` (§4.3).
fn is_status_only(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::LeCreateConnection | Opcode::Disconnect | Opcode::LeCreateConnectionCancel
    )
}

/// An event delivered to the owner of the transport: either a raw HCI event
/// (for the management layer to interpret per §4.4) or an ACL fragment (for
/// L2CAP/SMP routing per §4.3).
#[derive(Debug)]
pub enum TransportEvent {
    Hci { code: EventCode, raw: Vec<u8> },
    Acl { handle: u16, payload: Vec<u8> },
}

/// Abstract synchronous command/event transport, so higher layers can be
/// tested against an in-memory double instead of a real socket.
pub trait Transport: Send + Sync {
    /// Sends `cmd` and blocks for its reply (§4.3 timeouts).
    fn execute(&self, cmd: Command) -> Result<CommandResult>;

    /// Sends a raw ACL fragment.
    fn send_acl(&self, handle: u16, flags: u8, payload: &[u8]) -> Result<()>;

    fn stats(&self) -> TransportStatsSnapshot;

    fn connections(&self) -> &ConnTrackers;

    /// Pops the next queued event, blocking for up to `timeout`. Used by a
    /// management-layer poll loop (§4.3, §5 `getNextReply`).
    fn poll_event(&self, timeout: Duration) -> Option<TransportEvent>;

    /// Joins the reader thread and synthesizes disconnects for anything
    /// still tracked (§5 cancellation policy).
    fn close(&self);
}

struct PendingCommand {
    opcode: Opcode,
    result: Option<CommandResult>,
}

/// Synchronous HCI transport backed by a single reader thread per adapter
/// (§4.3).
pub struct HciTransport {
    socket: Arc<dyn Socket>,
    config: Config,
    stats: Arc<TransportStats>,
    conns: Arc<ConnTrackers>,
    pending: Arc<crate::util::Condvar<Option<PendingCommand>>>,
    send_reply: Mutex<()>,
    ring: Arc<crate::util::Condvar<VecDeque<TransportEvent>>>,
    closing: Arc<AtomicBool>,
    reader: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl HciTransport {
    /// Spawns the reader thread and returns the ready-to-use transport.
    #[must_use]
    pub fn start(socket: Arc<dyn Socket>, config: Config) -> Arc<Self> {
        let t = Arc::new(Self {
            socket,
            config,
            stats: Arc::new(TransportStats::default()),
            conns: Arc::new(ConnTrackers::new()),
            pending: Arc::new(crate::util::Condvar::new(None)),
            send_reply: Mutex::new(()),
            ring: Arc::new(crate::util::Condvar::new(VecDeque::new())),
            closing: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        });
        let handle = {
            let t = Arc::clone(&t);
            std::thread::Builder::new()
                .name("hci-reader".into())
                .spawn(move || t.reader_loop())
                .expect("spawn hci reader thread")
        };
        *t.reader.lock() = Some(handle);
        t
    }

    fn reader_loop(self: Arc<Self>) {
        while !self.closing.load(Ordering::Acquire) {
            match self.socket.recv(self.config.reader_poll_timeout) {
                Ok(Some(raw)) => self.handle_packet(&raw),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "hci socket read failed");
                    break;
                }
            }
        }
        self.synthesize_remaining_disconnects();
    }

    fn handle_packet(&self, raw: &[u8]) {
        let mut u = Unpacker::new(raw);
        let Some(typ) = PacketType::from_byte(u.u8()) else {
            return;
        };
        match typ {
            PacketType::Event => self.handle_event(u.as_slice()),
            PacketType::AclData => {
                if let Ok(frag) = super::packet::parse_acl(u.as_slice()) {
                    self.push_ring(TransportEvent::Acl {
                        handle: frag.handle,
                        payload: frag.payload.to_vec(),
                    });
                }
            }
            PacketType::Command | PacketType::ScoData => {}
        }
    }

    fn handle_event(&self, raw: &[u8]) {
        TransportStats::bump(&self.stats.events_received);
        if self.config.debug_hci_event {
            trace!(bytes = ?raw, "hci event");
        }
        let Ok(evt) = Event::try_from(raw) else {
            warn!("failed to decode hci event");
            return;
        };
        if matches!(evt.code(), EventCode::CommandComplete | EventCode::CommandStatus) {
            self.complete_pending(&evt, raw);
            return;
        }
        if evt.code() == EventCode::DisconnectionComplete {
            let mut params = evt.params().clone();
            let dc = DisconnectionComplete::unpack(&evt, &mut params);
            self.conns.remove(dc.handle);
            self.conns.end_disconnect(dc.handle);
        }
        self.push_ring(TransportEvent::Hci {
            code: evt.code(),
            raw: raw.to_vec(),
        });
    }

    fn complete_pending(&self, evt: &Event<'_>, _raw: &[u8]) {
        let mut guard = self.pending.lock();
        let matches = guard.as_ref().is_some_and(|p| p.opcode == evt.opcode());
        if matches {
            if let Some(p) = guard.as_mut() {
                p.result = Some(CommandResult {
                    status: evt.status(),
                    params: evt.params().as_slice().to_vec(),
                });
            }
            self.pending.notify_all();
        } else {
            trace!(opcode = %evt.opcode(), "unsolicited command event, ignoring");
        }
    }

    fn push_ring(&self, item: TransportEvent) {
        let mut q = self.ring.lock();
        if q.len() >= self.config.evt_ring_capacity {
            let drop_n = (self.config.evt_ring_capacity / 4).max(1);
            for _ in 0..drop_n {
                q.pop_front();
            }
            TransportStats::bump(&self.stats.ring_overflows);
            self.stats.ring_dropped.fetch_add(drop_n as u64, Ordering::Relaxed);
            warn!(dropped = drop_n, "hci event ring overflow, dropped oldest entries");
        }
        q.push_back(item);
        self.ring.notify_all();
    }

    fn synthesize_remaining_disconnects(&self) {
        for conn in self.conns.drain_all() {
            if conn.handle.is_pending() {
                continue;
            }
            TransportStats::bump(&self.stats.synthetic_disconnects);
            warn!(addr = %conn.addr, handle = %conn.handle, "synthesizing disconnect on transport shutdown");
            self.push_ring(TransportEvent::Hci {
                code: EventCode::DisconnectionComplete,
                raw: synthetic_disconnect_event(conn.handle),
            });
        }
    }

}

/// Builds a minimal `DISCONNECTION_COMPLETE` event payload for synthetic
/// delivery (§5, §7).
fn synthetic_disconnect_event(handle: ConnHandle) -> Vec<u8> {
    let mut v = vec![EventCode::DisconnectionComplete as u8, 4, Status::Success as u8];
    v.extend_from_slice(&handle.raw().to_le_bytes());
    v.push(SYNTHETIC_DISCONNECT_REASON as u8);
    v
}

impl Transport for HciTransport {
    fn execute(&self, cmd: Command) -> Result<CommandResult> {
        let _send_guard = self.send_reply.lock();
        let timeout = if is_status_only(cmd.opcode) {
            self.config.cmd_status_timeout
        } else {
            self.config.cmd_complete_timeout
        };
        {
            let mut guard = self.pending.lock();
            *guard = Some(PendingCommand { opcode: cmd.opcode, result: None });
        }
        let framed = encode_command(cmd.opcode.into(), &cmd.params);
        self.socket.send(&framed).map_err(|e| Error::Transport(e.to_string()))?;
        TransportStats::bump(&self.stats.commands_sent);

        let deadline = Instant::now() + timeout;
        let result = {
            let mut guard = self.pending.lock();
            loop {
                if let Some(p) = guard.as_ref() {
                    if let Some(r) = &p.result {
                        break Some(r.clone());
                    }
                }
                let now = Instant::now();
                if now >= deadline {
                    break None;
                }
                self.pending.wait_timeout(&mut guard, deadline - now);
            }
        };
        *self.pending.lock() = None;
        match result {
            Some(r) => r.into_result(),
            None => {
                TransportStats::bump(&self.stats.command_timeouts);
                Err(Error::Timeout("hci command reply"))
            }
        }
    }

    fn send_acl(&self, handle: u16, flags: u8, payload: &[u8]) -> Result<()> {
        let framed = encode_acl(handle, flags, payload);
        self.socket.send(&framed).map_err(|e| Error::Transport(e.to_string()))
    }

    fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    fn connections(&self) -> &ConnTrackers {
        &self.conns
    }

    fn poll_event(&self, timeout: Duration) -> Option<TransportEvent> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.ring.lock();
        loop {
            if let Some(evt) = guard.pop_front() {
                return Some(evt);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            self.ring.wait_timeout(&mut guard, deadline - now);
        }
    }

    fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("closing hci transport");
        if let Some(handle) = self.reader.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HciTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// In-memory [`Socket`] double: a queue of packets to deliver, and a
    /// record of what was sent, with a hook to synthesize replies.
    struct MockSocket {
        inbox: StdMutex<VecDeque<Vec<u8>>>,
        sent: StdMutex<Vec<Vec<u8>>>,
    }

    impl MockSocket {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inbox: StdMutex::new(VecDeque::new()),
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn push_event(&self, raw_event_with_type: Vec<u8>) {
            self.inbox.lock().unwrap().push_back(raw_event_with_type);
        }
    }

    impl Socket for MockSocket {
        fn send(&self, packet: &[u8]) -> std::io::Result<()> {
            self.sent.lock().unwrap().push(packet.to_vec());
            // Auto-reply CommandComplete(Success) for any sent command.
            if packet[0] == PacketType::Command as u8 {
                let opcode = u16::from_le_bytes([packet[1], packet[2]]);
                let mut evt = vec![PacketType::Event as u8, EventCode::CommandComplete as u8, 4, 1];
                evt.extend_from_slice(&opcode.to_le_bytes());
                evt.push(Status::Success as u8);
                self.inbox.lock().unwrap().push_back(evt);
            }
            Ok(())
        }

        fn recv(&self, _timeout: Duration) -> std::io::Result<Option<Vec<u8>>> {
            Ok(self.inbox.lock().unwrap().pop_front())
        }
    }

    #[test]
    fn execute_resolves_on_matching_command_complete() {
        let sock = MockSocket::new();
        let t = HciTransport::start(sock, Config::default());
        let r = t.execute(super::super::cmd::reset()).unwrap();
        assert_eq!(r.status, Status::Success);
        t.close();
    }

    #[test]
    fn execute_times_out_without_a_reply() {
        struct DeafSocket;
        impl Socket for DeafSocket {
            fn send(&self, _packet: &[u8]) -> std::io::Result<()> {
                Ok(())
            }
            fn recv(&self, timeout: Duration) -> std::io::Result<Option<Vec<u8>>> {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
        let mut cfg = Config::default();
        cfg.cmd_complete_timeout = Duration::from_millis(20);
        let t = HciTransport::start(Arc::new(DeafSocket), cfg);
        let err = t.execute(super::super::cmd::reset()).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        t.close();
    }

    #[test]
    fn ring_overflow_drops_oldest_quarter() {
        let sock = MockSocket::new();
        let mut cfg = Config::default();
        cfg.evt_ring_capacity = 8;
        let t = HciTransport::start(sock.clone(), cfg);
        for i in 0..12u8 {
            let evt = vec![PacketType::Event as u8, EventCode::HardwareError as u8, 1, i];
            sock.push_event(evt);
        }
        // Give the reader thread a moment to drain the inbox.
        std::thread::sleep(Duration::from_millis(100));
        assert!(t.stats().ring_overflows >= 1);
        t.close();
    }
}
