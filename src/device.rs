//! Per-remote device state (C6, §3 `Device`).
//!
//! A `Device` is owned once, via an `Arc`, by the adapter's `sharedDevices`
//! registry (§3); other registries (`connectedDevices`, `discoveredDevices`)
//! hold additional strong references, and `pausingDiscoveryDevices` holds a
//! weak one (§9 "Shared ownership with cyclic-looking references").

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::addr::AddressAndType;
use crate::gap::EInfoReport;
use crate::hci::{ConnHandle, Role, Status};
use crate::smp::PairingData;
use crate::util::Condvar;

/// Mutable, non-pairing device state, guarded by a single mutex (§3
/// "Mutable" fields).
#[derive(Debug)]
struct Mutable {
    visible: AddressAndType,
    role: Option<Role>,
    connection_handle: ConnHandle,
    rssi: i8,
    tx_power: i8,
    eir: EInfoReport,
    eir_ind: EInfoReport,
    eir_scan_rsp: EInfoReport,
    le_features: u64,
    tx_phy: u8,
    rx_phy: u8,
    supervision_timeout_10ms: u16,
    is_connected: bool,
    deviceready_reached: bool,
}

/// Outcome of an in-flight `LE_CREATE_CONNECTION` attempt, signaled by the
/// adapter's event loop once `LE_CONNECTION_COMPLETE` (or a synthesized
/// failure) arrives (§4.6 steps 2-3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectOutcome {
    Pending,
    Connected(ConnHandle),
    Failed(Status),
}

/// Per-remote state tracked by an adapter: EIR, RSSI, role, connection
/// handle, PHYs, LE features, SMP pairing data, and key material (§3
/// `Device`).
#[derive(Debug)]
pub struct Device {
    /// `addressAndType`, the device's identity; immutable (§3).
    pub identity: AddressAndType,
    /// Creation timestamp (§3 "Immutable: ... creation timestamp").
    pub created_at: Instant,
    state: parking_lot::Mutex<Mutable>,
    /// SMP pairing progress, paired with a condition variable so callers
    /// (the downgrade ladder, ATT bring-up) can block for a terminal state
    /// (§5 `cv_pairing_state_changed`).
    pub pairing: Condvar<PairingData>,
    /// `LE_CREATE_CONNECTION` completion, signaled by the adapter's event
    /// loop (§4.6 steps 2-3).
    pub connect_signal: Condvar<ConnectOutcome>,
    /// CAS guard deciding which of several concurrent `disconnect()`
    /// callers issues the real HCI command (§4.6).
    allow_disconnect: AtomicBool,
    /// Set by the adapter while stepping the auto-downgrade ladder: while
    /// true, per-device listener callbacks are withheld so only the
    /// ladder's final verdict reaches the application (§4.8 "Intermediate
    /// deviceConnected/deviceDisconnected emissions during ladder
    /// iterations are suppressed").
    suppress_events: AtomicBool,
    /// Set by the adapter at connect time when a stored key file matches
    /// this identity, so an `ENCRYPTION_CHANGE` arriving with no preceding
    /// SMP negotiation is recognized as pre-paired reuse rather than a
    /// protocol violation (§4.11).
    expect_pre_paired: AtomicBool,
    /// LE Secure Connections key-exchange scratch state for the pairing
    /// currently in progress (§4.7 SC path). Lives outside `PairingData`
    /// since the ECDH key pair isn't `Clone` and `PairingData` is snapshotted
    /// freely by callers.
    sc: parking_lot::Mutex<Option<ScKeys>>,
}

/// Per-pairing LE Secure Connections scratch state: the local ECDH key pair
/// and nonce, the peer's public key/nonce/confirm once received, and the
/// derived `DHKey`/`MacKey`/LTK (§4.7 SC path, [Vol 3] Part H, Section
/// 2.3.5.6).
#[derive(Debug)]
struct ScKeys {
    keypair: bthostd_crypto::KeyPair,
    nonce: [u8; 16],
    peer_public: Option<bthostd_crypto::PublicKeyBytes>,
    peer_nonce: Option<[u8; 16]>,
    peer_confirm: Option<[u8; 16]>,
    dhkey: Option<[u8; 32]>,
    mac_key: Option<[u8; 16]>,
    ltk: Option<[u8; 16]>,
    confirm_sent: bool,
    random_sent: bool,
    check_sent: bool,
}

impl Device {
    /// Creates a new device for `identity`, not yet connected (§3
    /// lifecycle: "created via `addOrUpdateTrackerConnection` or
    /// `findOrCreateSharedDevice`").
    #[must_use]
    pub fn new(identity: AddressAndType, is_local_initiator: bool) -> Self {
        Self {
            identity,
            created_at: Instant::now(),
            state: parking_lot::Mutex::new(Mutable {
                visible: identity,
                role: None,
                connection_handle: ConnHandle::PENDING,
                rssi: 0,
                tx_power: 0,
                eir: EInfoReport::default(),
                eir_ind: EInfoReport::default(),
                eir_scan_rsp: EInfoReport::default(),
                le_features: 0,
                tx_phy: 0,
                rx_phy: 0,
                supervision_timeout_10ms: 0,
                is_connected: false,
                deviceready_reached: false,
            }),
            pairing: Condvar::new(PairingData::new(is_local_initiator)),
            connect_signal: Condvar::new(ConnectOutcome::Pending),
            allow_disconnect: AtomicBool::new(false),
            suppress_events: AtomicBool::new(false),
            expect_pre_paired: AtomicBool::new(false),
            sc: parking_lot::Mutex::new(None),
        }
    }

    /// The address used on the wire right now: may differ from `identity`
    /// once a resolvable-private address is promoted to an identity address
    /// post-SMP (§3 `visibleAddressAndType`).
    #[must_use]
    pub fn visible_address(&self) -> AddressAndType {
        self.state.lock().visible
    }

    /// Updates the visible address, e.g. on `IDENTITY_ADDRESS_INFORMATION`
    /// resolution (§9 open question: "emits a `deviceUpdated`").
    pub fn set_visible_address(&self, addr: AddressAndType) {
        self.state.lock().visible = addr;
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.state.lock().role
    }

    #[must_use]
    pub fn connection_handle(&self) -> ConnHandle {
        self.state.lock().connection_handle
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected
    }

    #[must_use]
    pub fn rssi(&self) -> i8 {
        self.state.lock().rssi
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.state.lock().eir.display_name().to_owned()
    }

    #[must_use]
    pub fn eir(&self) -> EInfoReport {
        self.state.lock().eir.clone()
    }

    #[must_use]
    pub fn le_features(&self) -> u64 {
        self.state.lock().le_features
    }

    /// Merges one advertising/scan-response report into the device's EIR
    /// state, keeping per-source copies and a combined view (§3 "EIR
    /// (merged + per-source copies AD_IND / AD_SCAN_RSP)").
    pub fn merge_eir(&self, report: &EInfoReport) {
        let mut st = self.state.lock();
        if let Some(rssi) = report.mask().contains(crate::gap::EirFieldMask::RSSI).then_some(report.rssi) {
            st.rssi = rssi;
        }
        match report.source {
            Some(crate::gap::AdvSource::AdvScanRsp) => st.eir_scan_rsp.merge(report),
            _ => st.eir_ind.merge(report),
        }
        let mut merged = EInfoReport::default();
        let ind = st.eir_ind.clone();
        let scan_rsp = st.eir_scan_rsp.clone();
        merged.merge(&ind);
        merged.merge(&scan_rsp);
        st.eir = merged;
    }

    /// Records `LE_REMOTE_FEAT_COMPLETE`'s feature bitmap (§3 "LE
    /// features").
    pub fn set_le_features(&self, features: u64) {
        self.state.lock().le_features = features;
    }

    pub fn set_phys(&self, tx: u8, rx: u8) {
        let mut st = self.state.lock();
        st.tx_phy = tx;
        st.rx_phy = rx;
    }

    /// Transitions to connected: records handle and role and the link's
    /// supervision timeout, and arms `allowDisconnect` (§3 invariant: "a
    /// Device is in connectedDevices iff connectionHandle != 0 and
    /// isConnected").
    pub fn mark_connected(&self, handle: ConnHandle, role: Role, supervision_timeout_10ms: u16) {
        let mut st = self.state.lock();
        st.connection_handle = handle;
        st.role = Some(role);
        st.is_connected = true;
        st.supervision_timeout_10ms = supervision_timeout_10ms;
        st.deviceready_reached = false;
        drop(st);
        self.allow_disconnect.store(true, Ordering::Release);
    }

    /// Transitions to disconnected: clears the handle, marks not-connected,
    /// and resets transient SMP progress, returning the pairing-data
    /// snapshot observed *before* the reset so the caller can persist any
    /// captured keys first (§3 "`notifyDisconnected` must clear handle,
    /// close ATT, disconnect GATT/SMP, and clear transient SMP state before
    /// keys are preserved").
    #[must_use]
    pub fn notify_disconnected(&self) -> PairingData {
        {
            let mut st = self.state.lock();
            st.connection_handle = ConnHandle::PENDING;
            st.is_connected = false;
            st.deviceready_reached = false;
        }
        self.allow_disconnect.store(false, Ordering::Release);
        self.expect_pre_paired.store(false, Ordering::Release);
        *self.sc.lock() = None;
        let mut guard = self.pairing.lock();
        let snapshot = guard.clone();
        guard.clear(false);
        drop(guard);
        self.pairing.notify_all();
        snapshot
    }

    /// CAS `allowDisconnect: true -> false`. The caller that wins (`true`)
    /// issues the real HCI disconnect; losers get `false` and should treat
    /// their call as a no-op returning
    /// `CONNECTION_TERMINATED_BY_LOCAL_HOST` (§4.6).
    #[must_use]
    pub fn begin_disconnect(&self) -> bool {
        self.allow_disconnect
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks `deviceReady` reached (SMP complete + GATT bring-up done),
    /// consulted by `DiscoveryPolicy::PAUSE_CONNECTED_UNTIL_READY` (§4.5).
    pub fn mark_ready(&self) {
        self.state.lock().deviceready_reached = true;
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.lock().deviceready_reached
    }

    /// Blocks the calling thread until the pairing state reaches a
    /// terminal node (`COMPLETED`/`FAILED`) or `deadline` passes, returning
    /// the pairing snapshot observed (§4.6 step 5, §5 suspension points).
    #[must_use]
    pub fn wait_pairing_terminal(&self, deadline: Instant) -> PairingData {
        self.pairing.wait_until(deadline, |pd| pd.state.is_terminal()).clone()
    }

    #[must_use]
    pub fn pairing_snapshot(&self) -> PairingData {
        self.pairing.lock().clone()
    }

    /// Reason reported to a losing `disconnect()` caller under the CAS
    /// protocol (§4.6).
    #[must_use]
    pub const fn local_disconnect_status() -> Status {
        Status::ConnectionTerminatedByLocalHost
    }

    /// Arms the connect-outcome signal before issuing `LE_CREATE_CONNECTION`
    /// (§4.6 step 2).
    pub fn begin_connect(&self) {
        *self.connect_signal.lock() = ConnectOutcome::Pending;
    }

    /// Records the result of an `LE_CONNECTION_COMPLETE` (or synthesized
    /// failure) and wakes any waiter.
    pub fn set_connect_outcome(&self, outcome: ConnectOutcome) {
        *self.connect_signal.lock() = outcome;
        self.connect_signal.notify_all();
    }

    /// Blocks until the connect attempt resolves or `deadline` passes.
    #[must_use]
    pub fn wait_connect_outcome(&self, deadline: Instant) -> ConnectOutcome {
        *self.connect_signal.wait_until(deadline, |o| *o != ConnectOutcome::Pending)
    }

    pub fn set_suppress_events(&self, suppress: bool) {
        self.suppress_events.store(suppress, Ordering::Release);
    }

    #[must_use]
    pub fn suppress_events(&self) -> bool {
        self.suppress_events.load(Ordering::Acquire)
    }

    pub fn set_expect_pre_paired(&self, expect: bool) {
        self.expect_pre_paired.store(expect, Ordering::Release);
    }

    #[must_use]
    pub fn expect_pre_paired(&self) -> bool {
        self.expect_pre_paired.load(Ordering::Acquire)
    }

    /// Starts this device's LE Secure Connections key exchange: generates a
    /// fresh P-256 key pair and nonce, returning the public key to send in a
    /// `Pairing Public Key` PDU (§4.7 SC path).
    pub fn sc_begin(&self) -> bthostd_crypto::PublicKeyBytes {
        let keypair = bthostd_crypto::KeyPair::generate();
        let nonce = bthostd_crypto::random_nonce();
        let public = keypair.public_key_bytes();
        *self.sc.lock() = Some(ScKeys {
            keypair,
            nonce,
            peer_public: None,
            peer_nonce: None,
            peer_confirm: None,
            dhkey: None,
            mac_key: None,
            ltk: None,
            confirm_sent: false,
            random_sent: false,
            check_sent: false,
        });
        public
    }

    #[must_use]
    pub fn sc_local_nonce(&self) -> Option<[u8; 16]> {
        self.sc.lock().as_ref().map(|s| s.nonce)
    }

    #[must_use]
    pub fn sc_local_public(&self) -> Option<bthostd_crypto::PublicKeyBytes> {
        self.sc.lock().as_ref().map(|s| s.keypair.public_key_bytes())
    }

    /// Records the peer's public key and derives the shared `DHKey`.
    /// Returns `None` if the peer's point is not a valid P-256 public key,
    /// or if SC key exchange was never started.
    pub fn sc_set_peer_public(&self, peer: bthostd_crypto::PublicKeyBytes) -> Option<[u8; 32]> {
        let mut guard = self.sc.lock();
        let sc = guard.as_mut()?;
        let dh = sc.keypair.dhkey(&peer);
        sc.peer_public = Some(peer);
        sc.dhkey = dh;
        dh
    }

    #[must_use]
    pub fn sc_peer_public(&self) -> Option<bthostd_crypto::PublicKeyBytes> {
        self.sc.lock().as_ref().and_then(|s| s.peer_public)
    }

    #[must_use]
    pub fn sc_dhkey(&self) -> Option<[u8; 32]> {
        self.sc.lock().as_ref().and_then(|s| s.dhkey)
    }

    pub fn sc_set_peer_confirm(&self, confirm: [u8; 16]) {
        if let Some(sc) = self.sc.lock().as_mut() {
            sc.peer_confirm = Some(confirm);
        }
    }

    #[must_use]
    pub fn sc_peer_confirm(&self) -> Option<[u8; 16]> {
        self.sc.lock().as_ref().and_then(|s| s.peer_confirm)
    }

    pub fn sc_set_peer_nonce(&self, nonce: [u8; 16]) {
        if let Some(sc) = self.sc.lock().as_mut() {
            sc.peer_nonce = Some(nonce);
        }
    }

    #[must_use]
    pub fn sc_peer_nonce(&self) -> Option<[u8; 16]> {
        self.sc.lock().as_ref().and_then(|s| s.peer_nonce)
    }

    pub fn sc_set_mac_key(&self, mac_key: [u8; 16]) {
        if let Some(sc) = self.sc.lock().as_mut() {
            sc.mac_key = Some(mac_key);
        }
    }

    #[must_use]
    pub fn sc_mac_key(&self) -> Option<[u8; 16]> {
        self.sc.lock().as_ref().and_then(|s| s.mac_key)
    }

    pub fn sc_set_ltk(&self, ltk: [u8; 16]) {
        if let Some(sc) = self.sc.lock().as_mut() {
            sc.ltk = Some(ltk);
        }
    }

    #[must_use]
    pub fn sc_ltk(&self) -> Option<[u8; 16]> {
        self.sc.lock().as_ref().and_then(|s| s.ltk)
    }

    /// Marks the Confirm/Random/DHKeyCheck send step done, returning whether
    /// this call was the first (guards against re-sending a PDU if the peer
    /// retransmits its side of the exchange).
    pub fn sc_mark_confirm_sent(&self) -> bool {
        self.sc.lock().as_mut().is_some_and(|s| !std::mem::replace(&mut s.confirm_sent, true))
    }

    pub fn sc_mark_random_sent(&self) -> bool {
        self.sc.lock().as_mut().is_some_and(|s| !std::mem::replace(&mut s.random_sent, true))
    }

    pub fn sc_mark_check_sent(&self) -> bool {
        self.sc.lock().as_mut().is_some_and(|s| !std::mem::replace(&mut s.check_sent, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrType, Eui48};
    use crate::gap::AdvSource;

    fn identity() -> AddressAndType {
        AddressAndType::new(Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]), AddrType::LePublic)
    }

    #[test]
    fn connected_invariant_tracks_handle_and_flag() {
        let d = Device::new(identity(), true);
        assert!(!d.is_connected());
        d.mark_connected(ConnHandle::new(0x0040), Role::Central, 200);
        assert!(d.is_connected());
        assert_eq!(d.connection_handle(), ConnHandle::new(0x0040));
        d.notify_disconnected();
        assert!(!d.is_connected());
        assert_eq!(d.connection_handle(), ConnHandle::PENDING);
    }

    #[test]
    fn disconnect_cas_admits_exactly_one_winner() {
        let d = Device::new(identity(), true);
        d.mark_connected(ConnHandle::new(0x0041), Role::Central, 200);
        assert!(d.begin_disconnect());
        assert!(!d.begin_disconnect());
    }

    #[test]
    fn eir_merge_combines_ind_and_scan_rsp_sources() {
        let d = Device::new(identity(), true);
        let mut name_data = Vec::new();
        name_data.extend_from_slice(&[7, 0x09, b'S', b'e', b'n', b's', b'o', b'r']);
        d.merge_eir(&EInfoReport::parse(&name_data, AdvSource::AdvInd));
        assert_eq!(d.name(), "Sensor");

        let mut tx_power_data = Vec::new();
        tx_power_data.extend_from_slice(&[2, 0x0A, 0x04]);
        d.merge_eir(&EInfoReport::parse(&tx_power_data, AdvSource::AdvScanRsp));
        // The scan-response report did not carry a name, so the merged name
        // from the AD_IND report must survive.
        assert_eq!(d.name(), "Sensor");
    }

    #[test]
    fn notify_disconnected_returns_pre_clear_snapshot() {
        use crate::smp::pdu::SmpPdu;
        let d = Device::new(identity(), true);
        d.pairing.lock().on_pdu(&SmpPdu::PairingFailed(0x08));
        let snapshot = d.notify_disconnected();
        assert_eq!(snapshot.state, crate::smp::PairingState::Failed);
        assert_eq!(d.pairing_snapshot().state, crate::smp::PairingState::None);
    }
}
