//! Adapter lifecycle, discovery/advertising state machines, device
//! registries, and connect/disconnect orchestration (C5, §3 `Adapter`,
//! §4.5-§4.8, §5 mutex-ordering discipline).
//!
//! Mutex acquisition order, always outer-to-inner when more than one is
//! held at once (§5): `connect` -> `shared_devices` -> `connected_devices`
//! -> `discovered_devices` -> `pausing_discovery` -> `listeners` ->
//! `key_list` -> `security_registry` -> a `Device`'s own state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::addr::{AddrType, AddressAndType};
use crate::att;
use crate::config::Config;
use crate::device::{ConnectOutcome, Device};
use crate::error::{Error, Result};
use crate::gap::EInfoReport;
use crate::gatt::{GattClient, NullGattClient};
use crate::hci::{
    self, AdvAddrType, AdvChanMap, AdvFilterPolicy, ConnHandle, Role, Status, Transport, TransportEvent,
};
use crate::keystore::{KeyStore, SmpKeyBin};
use crate::l2cap::{self, Reassembler};
use crate::mgmt::{self, MgmtEvent};
use crate::security_registry::SecurityRegistry;
use crate::smp::pdu::{PairingFeatures, SmpPdu, ATT_CID, SMP_CID};
use crate::smp::{AuthReq, DowngradeLadder, IoCap, KeyDist, PairingData, PairingMode, PairingState, SecLevel, SmpEvent};
use crate::util::{Condvar, SimpleTimer};

use bthostd_crypto as crypto;

bitflags::bitflags! {
    /// Coarse adapter-level settings (§3 `Adapter` "Mutable" settings
    /// fields). Deliberately smaller than the kernel `MGMT` settings
    /// bitmask (§1 Non-goals excludes classic BR/EDR specifics).
    #[derive(Default)]
    pub struct AdapterSettings: u32 {
        const POWERED      = 1 << 0;
        const CONNECTABLE  = 1 << 1;
        const DISCOVERABLE = 1 << 2;
        const BONDABLE     = 1 << 3;
        const ADVERTISING  = 1 << 4;
        const SC           = 1 << 5;
    }
}

/// Which of the two roles an advertising-vs-scanning adapter currently
/// plays on the link layer (§3, §9 glossary: distinct from SMP's
/// initiator/responder).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkRole {
    Central,
    Peripheral,
}

/// When to pause active discovery for a device the adapter is also trying
/// to connect to (§4.5.b "Discovery policy").
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DiscoveryPolicy {
    AlwaysOn,
    PauseConnectedUntilDisconnected,
    #[default]
    PauseConnectedUntilReady,
    PauseConnectedUntilPaired,
}

/// Outcome the embedder returns from [`AdapterStatusListener::device_found`]
/// to decide whether a freshly discovered device stays tracked (§4.5.a
/// "deviceFound may decline to keep").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListenerAction {
    Keep,
    Discard,
}

/// The eight adapter-status callbacks an embedder may implement (§9 "replace
/// the native event bus with a polymorphic trait exposing the same eight
/// callback operations"). Every method has a do-nothing default so
/// implementors only override what they need.
#[allow(unused_variables)]
pub trait AdapterStatusListener: Send + Sync {
    fn adapter_settings_changed(&self, adapter: &Adapter, settings: AdapterSettings) {}
    fn discovering_changed(&self, adapter: &Adapter, enabled: bool, keep_alive: bool) {}
    fn device_found(&self, adapter: &Adapter, device: &Arc<Device>) -> ListenerAction {
        ListenerAction::Keep
    }
    fn device_updated(&self, adapter: &Adapter, device: &Arc<Device>) {}
    fn device_connected(&self, adapter: &Adapter, device: &Arc<Device>, handle: ConnHandle) {}
    fn device_pairing_state_changed(&self, adapter: &Adapter, device: &Arc<Device>, pairing: PairingData) {}
    fn device_ready(&self, adapter: &Adapter, device: &Arc<Device>) {}
    fn device_disconnected(&self, adapter: &Adapter, device: &Arc<Device>, reason: Status) {}
}

struct ListenerEntry {
    listener: Arc<dyn AdapterStatusListener>,
    filter: Option<AddressAndType>,
}

/// Parameters for [`Adapter::start_discovery`] (§4.5.a, §6.3 scan
/// parameter ranges).
#[derive(Clone, Copy, Debug)]
pub struct DiscoveryParams {
    pub active: bool,
    pub interval: u16,
    pub window: u16,
    pub filter_duplicates: bool,
    pub policy: DiscoveryPolicy,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: 0x0010,
            window: 0x0010,
            filter_duplicates: true,
            policy: DiscoveryPolicy::default(),
        }
    }
}

/// Parameters for [`Adapter::start_advertising`] (§4.5.c, §6.3).
#[derive(Clone, Debug)]
pub struct AdvertisingParams {
    pub interval_min: u16,
    pub interval_max: u16,
    pub local_name: String,
    pub connectable: bool,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            interval_min: 0x0020,
            interval_max: 0x0030,
            local_name: String::new(),
            connectable: true,
        }
    }
}

/// Parameters for [`Adapter::connect_le`] (§4.6, §4.8).
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectLeParams {
    pub sec_level_user: SecLevel,
    pub io_cap_user: IoCap,
    /// Non-`Unset` enables the auto-downgrade ladder (§4.8); `Unset` means
    /// a single connect attempt at `sec_level_user`/`io_cap_user`.
    pub io_cap_auto: IoCap,
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
}

struct Registries {
    shared: Vec<Arc<Device>>,
    connected: Vec<Arc<Device>>,
    discovered: Vec<Arc<Device>>,
    pausing_discovery: Vec<Weak<Device>>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            shared: Vec::new(),
            connected: Vec::new(),
            discovered: Vec::new(),
            pausing_discovery: Vec::new(),
        }
    }
}

/// Per-adapter state: HCI transport, device registries, SMP key material,
/// and the discovery/advertising/connect state machines that drive them
/// (§3 `Adapter`).
pub struct Adapter {
    pub dev_id: u16,
    pub public_addr: AddressAndType,
    transport: Arc<dyn Transport>,
    config: Config,
    reassembler: Reassembler,
    gatt: Mutex<Arc<dyn GattClient>>,
    sc_capable: AtomicBool,
    settings: Mutex<AdapterSettings>,
    link_role: Mutex<Option<LinkRole>>,
    discovery_policy: Mutex<DiscoveryPolicy>,
    registries: Mutex<Registries>,
    listeners: Mutex<Vec<ListenerEntry>>,
    connect_lock: Mutex<()>,
    keystore: Option<KeyStore>,
    key_list: Mutex<HashMap<AddressAndType, SmpKeyBin>>,
    security_registry: Mutex<SecurityRegistry>,
    watchdog: Mutex<Option<SimpleTimer>>,
    smp_last_seen: Mutex<HashMap<AddressAndType, u64>>,
    closing: AtomicBool,
    reader: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Adapter {
    /// Creates a not-yet-powered adapter over `transport`. `key_dir`, if
    /// given, enables the persistent key store (§4.11, §9 "local key-file
    /// dir is optional").
    #[must_use]
    pub fn new(
        dev_id: u16,
        public_addr: AddressAndType,
        transport: Arc<dyn Transport>,
        config: Config,
        key_dir: Option<std::path::PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dev_id,
            public_addr,
            transport,
            config,
            reassembler: Reassembler::new(),
            gatt: Mutex::new(Arc::new(NullGattClient)),
            sc_capable: AtomicBool::new(true),
            settings: Mutex::new(AdapterSettings::CONNECTABLE | AdapterSettings::BONDABLE),
            link_role: Mutex::new(None),
            discovery_policy: Mutex::new(DiscoveryPolicy::default()),
            registries: Mutex::new(Registries::default()),
            listeners: Mutex::new(Vec::new()),
            connect_lock: Mutex::new(()),
            keystore: key_dir.map(KeyStore::new),
            key_list: Mutex::new(HashMap::new()),
            security_registry: Mutex::new(SecurityRegistry::new()),
            watchdog: Mutex::new(None),
            smp_last_seen: Mutex::new(HashMap::new()),
            closing: AtomicBool::new(false),
            reader: Mutex::new(None),
        })
    }

    /// Installs the GATT client bootstrap hook (§4.9 step 5). Defaults to
    /// [`NullGattClient`] if never called.
    pub fn set_gatt_client(&self, client: Arc<dyn GattClient>) {
        *self.gatt.lock() = client;
    }

    #[must_use]
    pub fn settings(&self) -> AdapterSettings {
        *self.settings.lock()
    }

    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.settings().contains(AdapterSettings::POWERED)
    }

    #[must_use]
    pub fn security_registry(&self) -> parking_lot::MutexGuard<'_, SecurityRegistry> {
        self.security_registry.lock()
    }

    fn ensure_powered(&self) -> Result<()> {
        if self.is_powered() {
            Ok(())
        } else {
            Err(Error::Lifecycle("adapter not powered"))
        }
    }

    // -- Lifecycle (§4.1) -------------------------------------------------

    /// Resets the controller, programs the event masks, enables LE host
    /// support, starts the event-loop and SMP watchdog threads, and loads
    /// any stored keys for pre-pair reuse (§4.1, §4.11).
    pub fn power_on(self: &Arc<Self>) -> Result<()> {
        self.transport.execute(hci::cmd::reset())?;
        self.transport.execute(hci::cmd::set_event_mask(&hci::default_event_mask()))?;
        self.transport
            .execute(hci::cmd::set_event_mask_page_2(&hci::default_event_mask()))?;
        self.transport.execute(hci::cmd::le_set_event_mask(&hci::default_le_event_mask()))?;
        self.transport.execute(hci::cmd::write_le_host_support(true))?;

        if let Some(store) = &self.keystore {
            let mut list = self.key_list.lock();
            let results = store.apply_all(self.public_addr, SecLevel::EncOnly, |bin| {
                list.insert(bin.remote, *bin);
                Ok(())
            });
            let loaded = results.iter().filter(|r| r.is_ok()).count();
            let rejected = results.len() - loaded;
            if rejected > 0 {
                warn!(rejected, "discarded stored key files failing the local-adapter/security-floor check");
            }
            info!(count = loaded, "loaded stored keys for pre-pair reuse");
        }

        self.settings.lock().insert(AdapterSettings::POWERED);
        self.fire_settings_changed();

        let handle = {
            let this = Arc::clone(self);
            std::thread::Builder::new()
                .name("bthostd-adapter".into())
                .spawn(move || this.run_event_loop())
                .expect("spawn adapter event loop")
        };
        *self.reader.lock() = Some(handle);

        let watchdog_period = self.config.smp_watchdog_period;
        let this = Arc::clone(self);
        *self.watchdog.lock() = Some(SimpleTimer::start(watchdog_period, move || this.smp_watchdog_tick()));
        Ok(())
    }

    /// Stops discovery/advertising conceptually, joins the event loop, and
    /// stops the watchdog. Idempotent.
    pub fn power_off(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.settings.lock().remove(AdapterSettings::POWERED);
        self.transport.close();
        if let Some(h) = self.reader.lock().take() {
            let _ = h.join();
        }
        if let Some(t) = self.watchdog.lock().take() {
            t.stop();
        }
    }

    fn fire_settings_changed(&self) {
        let settings = self.settings();
        for entry in self.listeners.lock().iter() {
            entry.listener.adapter_settings_changed(self, settings);
        }
    }

    // -- Listeners (§4.5, §9) ---------------------------------------------

    pub fn add_status_listener(&self, listener: Arc<dyn AdapterStatusListener>, filter: Option<AddressAndType>) {
        self.listeners.lock().push(ListenerEntry { listener, filter });
    }

    fn for_each_listener(&self, device: &Arc<Device>, mut f: impl FnMut(&dyn AdapterStatusListener)) {
        if device.suppress_events() {
            return;
        }
        for entry in self.listeners.lock().iter() {
            if entry.filter.is_none_or(|f| f == device.identity) {
                f(entry.listener.as_ref());
            }
        }
    }

    // -- Discovery (§4.5.a, §4.5.b) ---------------------------------------

    /// Starts LE scanning. Fails if advertising is currently active: a
    /// single radio cannot do both roles in this simplified model (§4.5
    /// "Lifecycle conflicts").
    pub fn start_discovery(self: &Arc<Self>, params: DiscoveryParams) -> Result<()> {
        self.ensure_powered()?;
        if self.settings().contains(AdapterSettings::ADVERTISING) {
            return Err(Error::Lifecycle("cannot discover while advertising"));
        }
        self.registries.lock().discovered.clear();
        *self.link_role.lock() = Some(LinkRole::Central);
        *self.discovery_policy.lock() = params.policy;

        self.transport.execute(hci::cmd::le_set_scan_parameters(
            params.active,
            params.interval,
            params.window,
            AdvAddrType::Public,
            AdvFilterPolicy::None,
        ))?;
        self.transport
            .execute(hci::cmd::le_set_scan_enable(true, params.filter_duplicates))?;
        self.settings.lock().insert(AdapterSettings::DISCOVERABLE);
        for entry in self.listeners.lock().iter() {
            entry.listener.discovering_changed(self, true, false);
        }
        Ok(())
    }

    pub fn stop_discovery(&self) -> Result<()> {
        self.ensure_powered()?;
        self.transport.execute(hci::cmd::le_set_scan_enable(false, false))?;
        self.settings.lock().remove(AdapterSettings::DISCOVERABLE);
        for entry in self.listeners.lock().iter() {
            entry.listener.discovering_changed(self, false, false);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_discovering(&self) -> bool {
        self.settings().contains(AdapterSettings::DISCOVERABLE)
    }

    // -- Advertising (§4.5.c) ----------------------------------------------

    /// Enables legacy (non-extended) LE advertising. Fails if currently
    /// discovering or any device is connected or mid-connect, mirroring
    /// the same single-radio-role restriction as discovery.
    ///
    /// TODO: extended advertising (`LE_SET_EXTENDED_ADVERTISING_*`) is not
    /// yet encoded in `hci::cmd`; controllers that require BT5 extended
    /// advertising sets fall back to the legacy path here.
    pub fn start_advertising(&self, params: AdvertisingParams) -> Result<()> {
        self.ensure_powered()?;
        if self.is_discovering() {
            return Err(Error::Lifecycle("cannot advertise while discovering"));
        }
        if !self.registries.lock().connected.is_empty() {
            return Err(Error::Lifecycle("cannot advertise while connected (single-link model)"));
        }
        *self.link_role.lock() = Some(LinkRole::Peripheral);

        let adv_type = if params.connectable { 0x00 } else { 0x03 };
        self.transport.execute(hci::cmd::le_set_advertising_parameters(
            params.interval_min,
            params.interval_max,
            adv_type,
            AdvAddrType::Public,
            AddrType::LePublic,
            crate::addr::Eui48::default(),
            AdvChanMap::default(),
            AdvFilterPolicy::None,
        ))?;

        let data = encode_adv_data(&params.local_name);
        self.transport.execute(hci::cmd::le_set_advertising_data(&data))?;
        self.transport.execute(hci::cmd::le_set_advertising_enable(true))?;
        self.settings.lock().insert(AdapterSettings::ADVERTISING);
        Ok(())
    }

    pub fn stop_advertising(&self) -> Result<()> {
        self.ensure_powered()?;
        self.transport.execute(hci::cmd::le_set_advertising_enable(false))?;
        self.settings.lock().remove(AdapterSettings::ADVERTISING);
        Ok(())
    }

    // -- Device registries (§3 invariants) ----------------------------------

    /// Returns the shared `Device` for `identity`, creating one if none
    /// exists yet (§3 "created via `findOrCreateSharedDevice`").
    #[must_use]
    pub fn find_or_create_device(&self, identity: AddressAndType, is_local_initiator: bool) -> Arc<Device> {
        let mut reg = self.registries.lock();
        if let Some(d) = reg.shared.iter().find(|d| d.identity == identity) {
            return Arc::clone(d);
        }
        let d = Arc::new(Device::new(identity, is_local_initiator));
        reg.shared.push(Arc::clone(&d));
        d
    }

    #[must_use]
    pub fn find_device(&self, identity: AddressAndType) -> Option<Arc<Device>> {
        self.registries.lock().shared.iter().find(|d| d.identity == identity).cloned()
    }

    #[must_use]
    pub fn connected_devices(&self) -> Vec<Arc<Device>> {
        self.registries.lock().connected.clone()
    }

    #[must_use]
    pub fn discovered_devices(&self) -> Vec<Arc<Device>> {
        self.registries.lock().discovered.clone()
    }

    /// Removes a device from every registry (§3 lifecycle: explicit
    /// removal, e.g. on `unpair`).
    pub fn remove_device(&self, identity: AddressAndType) {
        let mut reg = self.registries.lock();
        reg.shared.retain(|d| d.identity != identity);
        reg.connected.retain(|d| d.identity != identity);
        reg.discovered.retain(|d| d.identity != identity);
        reg.pausing_discovery.retain(|w| w.upgrade().is_some_and(|d| d.identity != identity));
        self.listeners.lock().retain(|e| e.filter != Some(identity));
    }

    // -- Connect / disconnect (§4.6, §4.8) ----------------------------------

    /// Connects to `device` over LE, applying the security registry's
    /// policy as a floor/default and, if `params.io_cap_auto` is set,
    /// stepping the auto-downgrade ladder on rejection (§4.6, §4.8).
    pub fn connect_le(self: &Arc<Self>, device: &Arc<Device>, params: ConnectLeParams) -> Result<()> {
        self.ensure_powered()?;
        if device.is_connected() {
            return Err(Error::Lifecycle("device already connected"));
        }
        let _guard = self.connect_lock.lock();

        let policy = self.security_registry.lock().resolve_or_default(device.identity, &device.name());
        let user_sec_level = if params.sec_level_user != SecLevel::Unset { params.sec_level_user } else { policy.sec_level };
        let io_cap = if !params.io_cap_user.is_unset() { params.io_cap_user } else { policy.io_cap };
        let pre_paired = self.key_list.lock().contains_key(&device.identity);
        let sec_level = att::effective_sec_level(user_sec_level, pre_paired, self.sc_capable.load(Ordering::Acquire));

        {
            let mut pd = device.pairing.lock();
            pd.sec_level_user = sec_level;
            pd.io_cap_user = io_cap;
            pd.io_cap_auto = params.io_cap_auto;
        }
        device.set_expect_pre_paired(pre_paired);

        if params.io_cap_auto.is_unset() {
            self.connect_le_attempt(device, &params)?;
            let deadline = Instant::now() + self.config.cmd_complete_timeout;
            if sec_level == SecLevel::None {
                // No SMP will ever run, so the pairing condvar never
                // reaches a terminal state (§4.9: NONE is ready as soon as
                // the link comes up, not after security negotiation).
                device.wait_connect_outcome(deadline);
            } else {
                device.wait_pairing_terminal(deadline);
            }
            return Ok(());
        }

        device.set_suppress_events(true);
        let mut ladder = DowngradeLadder::new(params.io_cap_auto);
        let outcome = loop {
            let Some(rung) = ladder.current() else {
                break Err(Error::Auth(Status::AuthenticationFailure));
            };
            {
                let mut pd = device.pairing.lock();
                pd.sec_level_user = rung.sec_level;
                pd.io_cap_user = rung.io_cap;
            }
            if let Err(e) = self.connect_le_attempt(device, &params) {
                warn!(error = %e, rung = ?rung, "downgrade ladder rung rejected before connecting");
                if !ladder.advance() {
                    break Err(Error::Auth(Status::AuthenticationFailure));
                }
                continue;
            }
            let deadline = Instant::now() + self.config.cmd_complete_timeout;
            let pd = device.wait_pairing_terminal(deadline);
            if pd.state == PairingState::Completed {
                break Ok(());
            }
            let _ = self.disconnect(device, Status::AuthenticationFailure);
            let wait_deadline = Instant::now() + self.config.cmd_complete_timeout;
            device.pairing.wait_until(wait_deadline, |_| !device.is_connected());
            if !ladder.advance() {
                break Err(Error::Auth(Status::AuthenticationFailure));
            }
        };
        device.set_suppress_events(false);
        if outcome.is_ok() {
            self.for_each_listener(device, |l| l.device_connected(self, device, device.connection_handle()));
        } else {
            self.for_each_listener(device, |l| l.device_pairing_state_changed(self, device, device.pairing_snapshot()));
        }
        outcome
    }

    fn connect_le_attempt(&self, device: &Arc<Device>, params: &ConnectLeParams) -> Result<()> {
        device.begin_connect();
        self.transport.connections().add_pending(device.identity);
        let own_addr_type = match device.identity.addr_type {
            AddrType::LeRandom => AdvAddrType::Random,
            _ => AdvAddrType::Public,
        };
        self.transport.execute(hci::cmd::le_create_connection(
            0x0010,
            0x0010,
            device.identity.addr_type,
            device.identity.addr,
            own_addr_type,
            params.conn_interval_min.max(6),
            params.conn_interval_max.max(6),
            params.conn_latency,
            params.supervision_timeout.max(200),
        ))?;
        Ok(())
    }

    /// Disconnects `device`. Only one of several concurrent callers issues
    /// the real HCI command; the rest are reported as a local no-op
    /// (§4.6 CAS protocol).
    pub fn disconnect(&self, device: &Arc<Device>, reason: Status) -> Result<()> {
        if !device.begin_disconnect() {
            return Err(Error::ControllerRejection(Device::local_disconnect_status()));
        }
        let handle = device.connection_handle();
        self.transport.connections().begin_disconnect(handle);
        #[allow(clippy::cast_possible_truncation)]
        self.transport.execute(hci::cmd::disconnect(handle, reason as u8))?;
        Ok(())
    }

    // -- Event loop (§4.3, §4.4, §4.7) ---------------------------------------

    fn run_event_loop(self: Arc<Self>) {
        while !self.closing.load(Ordering::Acquire) {
            match self.transport.poll_event(self.config.reader_poll_timeout) {
                Some(TransportEvent::Hci { code: _, raw }) => self.handle_hci_event(&raw),
                Some(TransportEvent::Acl { handle, payload }) => self.handle_acl(handle, &payload),
                None => {}
            }
        }
    }

    fn handle_hci_event(self: &Arc<Self>, raw: &[u8]) {
        let Ok(evt) = hci::Event::try_from(raw) else {
            return;
        };
        let peer_of = |h: ConnHandle| self.transport.connections().find_by_handle(h).map(|c| c.addr);
        for ev in mgmt::translate(&evt, peer_of) {
            self.handle_mgmt_event(ev);
        }
    }

    fn handle_mgmt_event(self: &Arc<Self>, ev: MgmtEvent) {
        match ev {
            MgmtEvent::Connected { addr, handle } => self.on_connected(addr, handle),
            MgmtEvent::ConnectFailed { addr, status } => self.on_connect_failed(addr, status),
            MgmtEvent::Disconnected { handle, reason } => self.on_disconnected(handle, reason),
            MgmtEvent::DeviceFound { addr, eir } => self.on_device_found(addr, eir),
            MgmtEvent::RemoteFeaturesComplete { handle, status, features } => {
                if status.is_ok() {
                    if let Some(d) = self.device_by_handle(handle) {
                        d.set_le_features(features);
                    }
                }
            }
            MgmtEvent::EncryptionChanged { handle, enabled } => self.on_encryption_changed(handle, enabled),
            MgmtEvent::EncryptionKeyRefresh { handle, status } => {
                if status.is_ok() {
                    if let Some(d) = self.device_by_handle(handle) {
                        d.pairing.lock().on_event(SmpEvent::EncryptionKeyRefresh);
                        d.pairing.notify_all();
                    }
                }
            }
            MgmtEvent::LongTermKeyRequest { handle, ediv, rand } => self.on_long_term_key_request(handle, ediv, rand),
            MgmtEvent::NewLongTermKey { handle, ltk } => {
                if let Some(d) = self.device_by_handle(handle) {
                    d.pairing.lock().on_event(SmpEvent::NewLongTermKey(ltk));
                    d.pairing.notify_all();
                }
            }
            MgmtEvent::NewLinkKey { handle, key } => {
                if let Some(d) = self.device_by_handle(handle) {
                    d.pairing.lock().on_event(SmpEvent::NewLinkKey(key));
                    d.pairing.notify_all();
                }
            }
            MgmtEvent::IdentityResolved { handle, identity } => {
                if let Some(d) = self.device_by_handle(handle) {
                    d.set_visible_address(identity);
                    self.for_each_listener(&d, |l| l.device_updated(self, &d));
                }
            }
        }
    }

    fn device_by_handle(&self, handle: ConnHandle) -> Option<Arc<Device>> {
        let addr = self.transport.connections().find_by_handle(handle)?.addr;
        self.find_device(addr)
    }

    fn on_connected(self: &Arc<Self>, addr: AddressAndType, handle: ConnHandle) {
        self.transport.connections().complete(addr, handle);
        let device = self.find_or_create_device(addr, true);
        let role = self.link_role.lock().map_or(Role::Central, |r| match r {
            LinkRole::Central => Role::Central,
            LinkRole::Peripheral => Role::Peripheral,
        });
        device.mark_connected(handle, role, 0);
        device.set_expect_pre_paired(self.key_list.lock().contains_key(&addr));
        {
            let mut reg = self.registries.lock();
            if !reg.connected.iter().any(|d| d.identity == addr) {
                reg.connected.push(Arc::clone(&device));
            }
        }
        device.set_connect_outcome(ConnectOutcome::Connected(handle));
        self.apply_discovery_policy_on_connect(&device);
        self.for_each_listener(&device, |l| l.device_connected(self, &device, handle));

        match role {
            Role::Central => self.kick_off_central_security(&device),
            Role::Peripheral => self.kick_off_peripheral_security(&device),
        }

        // No security was requested, so there is no SMP/encryption event
        // to drive bring-up to completion (§4.9 effective NONE security is
        // ready immediately once the link is up).
        if device.pairing.lock().sec_level_user == SecLevel::None {
            self.on_device_secured(&device);
        }
    }

    /// Drives the central/initiator side of connection security once the
    /// link comes up (§4.7, §4.11): resumes an existing bond with
    /// `LE_Start_Encryption`, or originates a fresh `Pairing Request`.
    fn kick_off_central_security(&self, device: &Arc<Device>) {
        if device.expect_pre_paired() {
            let stored = self.key_list.lock().get(&device.identity).and_then(|bin| bin.responder.ltk);
            if let Some(ltk) = stored {
                let handle = device.connection_handle();
                let _ = self.transport.execute(hci::cmd::le_start_encryption(handle, ltk.rand, ltk.ediv, &ltk.ltk));
            }
            return;
        }
        let pd = device.pairing.lock();
        let sec_level = pd.sec_level_user;
        let io_cap = pd.io_cap_user;
        drop(pd);
        if sec_level != SecLevel::None && sec_level != SecLevel::Unset {
            self.initiate_pairing(device, sec_level, io_cap);
        }
    }

    /// Resolves the security-registry policy for the peripheral/responder
    /// role and, if it calls for more than `NONE`, asks the peer to initiate
    /// pairing (§4.7, §4.9 "post-ready validation" depends on
    /// `sec_level_user` being populated for this role too).
    fn kick_off_peripheral_security(&self, device: &Arc<Device>) {
        if device.expect_pre_paired() {
            return;
        }
        let policy = self.security_registry.lock().resolve_or_default(device.identity, &device.name());
        {
            let mut pd = device.pairing.lock();
            pd.sec_level_user = policy.sec_level;
            pd.io_cap_user = policy.io_cap;
        }
        if policy.sec_level != SecLevel::None && policy.sec_level != SecLevel::Unset {
            let auth_req = self.auth_req_for(policy.sec_level);
            self.send_smp_pdu(device, &SmpPdu::SecurityRequest(auth_req));
        }
    }

    fn on_connect_failed(&self, addr: AddressAndType, status: Status) {
        self.transport.connections().remove(ConnHandle::PENDING);
        if let Some(device) = self.find_device(addr) {
            device.set_connect_outcome(ConnectOutcome::Failed(status));
            device.pairing.lock().on_event(SmpEvent::AuthFailed);
            device.pairing.notify_all();
        }
    }

    fn on_disconnected(self: &Arc<Self>, handle: ConnHandle, reason: Status) {
        self.reassembler.forget(handle.raw());
        let Some(conn) = self.transport.connections().remove(handle) else {
            return;
        };
        self.transport.connections().end_disconnect(handle);
        let Some(device) = self.find_device(conn.addr) else { return };
        let snapshot = device.notify_disconnected();
        self.persist_keys_if_any(&device, &snapshot);
        {
            let mut reg = self.registries.lock();
            reg.connected.retain(|d| d.identity != conn.addr);
        }
        self.for_each_listener(&device, |l| l.device_disconnected(self, &device, reason));
    }

    fn on_device_found(self: &Arc<Self>, addr: AddressAndType, eir: EInfoReport) {
        let device = self.find_or_create_device(addr, true);
        device.merge_eir(&eir);
        let mut reg = self.registries.lock();
        let already_known = reg.discovered.iter().any(|d| d.identity == addr);
        if !already_known {
            reg.discovered.push(Arc::clone(&device));
        }
        drop(reg);
        if !already_known {
            let mut keep = true;
            for entry in self.listeners.lock().iter() {
                if entry.filter.is_none_or(|f| f == addr) && entry.listener.device_found(self, &device) == ListenerAction::Discard {
                    keep = false;
                }
            }
            if !keep {
                self.registries.lock().discovered.retain(|d| d.identity != addr);
            }
        } else {
            self.for_each_listener(&device, |l| l.device_updated(self, &device));
        }
    }

    fn on_encryption_changed(self: &Arc<Self>, handle: ConnHandle, enabled: bool) {
        let Some(device) = self.device_by_handle(handle) else { return };
        let was_negotiating = { device.pairing.lock().state != PairingState::None };
        if enabled && !was_negotiating && device.expect_pre_paired() {
            let stored = self.key_list.lock().get(&device.identity).map(|bin| (bin.sec_level, bin.io_cap));
            let mut pd = device.pairing.lock();
            if let Some((sec_level, io_cap)) = stored {
                pd.sec_level_conn = sec_level;
                pd.io_cap_conn = io_cap;
            }
            pd.on_event(SmpEvent::PrePairedEncryption);
        } else {
            device.pairing.lock().on_event(SmpEvent::EncryptionChanged(enabled));
        }
        device.pairing.notify_all();
        let snapshot = device.pairing_snapshot();
        self.for_each_listener(&device, |l| l.device_pairing_state_changed(self, &device, snapshot));
        if snapshot.state == PairingState::Completed {
            self.on_device_secured(&device);
        } else if snapshot.state == PairingState::Failed {
            self.for_each_listener(&device, |l| l.device_pairing_state_changed(self, &device, snapshot));
        }
    }

    fn on_long_term_key_request(&self, handle: ConnHandle, ediv: u16, rand: u64) {
        let Some(device) = self.device_by_handle(handle) else {
            let _ = self.transport.execute(hci::cmd::le_long_term_key_request_reply(handle, None));
            return;
        };
        let stored = self.key_list.lock().get(&device.identity).and_then(|bin| bin.responder.ltk);
        let reply = stored.filter(|k| k.ediv == ediv && k.rand == rand).map(|k| k.ltk);
        let ltk_bytes = reply.unwrap_or_default();
        let cmd = if reply.is_some() {
            hci::cmd::le_long_term_key_request_reply(handle, Some(&ltk_bytes))
        } else {
            hci::cmd::le_long_term_key_request_reply(handle, None)
        };
        let _ = self.transport.execute(cmd);
    }

    /// Finishes bring-up once the pairing state machine reaches
    /// `COMPLETED`: persists keys, applies the ready-delay, marks the
    /// device ready, and triggers GATT discovery (§4.9 step 5, §4.10,
    /// §4.11).
    fn on_device_secured(self: &Arc<Self>, device: &Arc<Device>) {
        let snapshot = device.pairing_snapshot();
        if matches!(*self.link_role.lock(), Some(LinkRole::Peripheral))
            && !att::validate_server_security(snapshot.sec_level_user, snapshot.sec_level_conn)
        {
            warn!(
                addr = %device.identity,
                floor = %snapshot.sec_level_user,
                negotiated = %snapshot.sec_level_conn,
                "peripheral security floor not met, disconnecting"
            );
            let _ = self.disconnect(device, Status::AuthenticationFailure);
            return;
        }
        self.persist_keys_if_any(device, &snapshot);
        let delay = att::ready_delay(snapshot.is_pre_paired, self.config.ready_delay);
        std::thread::sleep(delay);
        device.mark_ready();
        self.for_each_listener(device, |l| l.device_ready(self, device));
        if matches!(*self.link_role.lock(), Some(LinkRole::Central) | None) {
            self.gatt.lock().discover_services(device);
        }
        self.resume_discovery_if_policy_allows(device);
    }

    fn persist_keys_if_any(&self, device: &Arc<Device>, snapshot: &PairingData) {
        let Some(store) = &self.keystore else { return };
        if snapshot.responder.ltk.is_none() && snapshot.initiator.ltk.is_none() {
            return;
        }
        let sec_level = if snapshot.use_sc { SecLevel::EncAuthFips } else { snapshot.sec_level_conn };
        let mut bin = SmpKeyBin::new(self.public_addr, device.identity, sec_level, snapshot.io_cap_conn);
        if let Some(ltk) = snapshot.responder.ltk {
            bin.responder.ltk = Some(crate::keystore::StoredLtk {
                responder: true,
                enc_size: snapshot.responder.max_enc_size.max(16),
                ediv: snapshot.responder.ediv,
                rand: snapshot.responder.rand,
                ltk,
            });
        }
        if let Some(irk) = snapshot.responder.irk {
            bin.responder.irk = Some(crate::keystore::StoredIrk { responder: true, irk, identity_address: snapshot.responder.identity_address });
        }
        match store.save(&bin) {
            Ok(path) => debug!(path = %path.display(), "persisted smp keys"),
            Err(e) => warn!(error = %e, "failed to persist smp keys"),
        }
        self.key_list.lock().insert(device.identity, bin);
    }

    // -- Discovery pause/resume (§4.5.b) ------------------------------------

    fn apply_discovery_policy_on_connect(&self, device: &Arc<Device>) {
        if !self.is_discovering() {
            return;
        }
        match *self.discovery_policy.lock() {
            DiscoveryPolicy::AlwaysOn => {}
            _ => {
                let _ = self.transport.execute(hci::cmd::le_set_scan_enable(false, false));
                self.registries.lock().pausing_discovery.push(Arc::downgrade(device));
            }
        }
    }

    fn resume_discovery_if_policy_allows(&self, device: &Arc<Device>) {
        let policy = *self.discovery_policy.lock();
        let should_resume = match policy {
            DiscoveryPolicy::AlwaysOn => false,
            DiscoveryPolicy::PauseConnectedUntilReady | DiscoveryPolicy::PauseConnectedUntilPaired => true,
            DiscoveryPolicy::PauseConnectedUntilDisconnected => false,
        };
        let mut reg = self.registries.lock();
        reg.pausing_discovery.retain(|w| w.upgrade().is_some_and(|d| d.identity != device.identity));
        let still_pausing_others = !reg.pausing_discovery.is_empty();
        drop(reg);
        if should_resume && !still_pausing_others && self.is_discovering() {
            let _ = self.transport.execute(hci::cmd::le_set_scan_enable(true, true));
        }
    }

    // -- ACL / SMP PDU routing (§4.2, §4.7) ---------------------------------

    fn handle_acl(self: &Arc<Self>, handle: u16, payload: &[u8]) {
        let first = payload.len() >= 4;
        let Some(frame) = self.reassembler.feed(handle, first, payload) else {
            return;
        };
        match frame.cid {
            SMP_CID => self.handle_smp_frame(ConnHandle::new(handle), &frame.payload),
            ATT_CID => {}
            l2cap::SIGNALING_CID => {}
            _ => {}
        }
    }

    fn handle_smp_frame(self: &Arc<Self>, handle: ConnHandle, payload: &[u8]) {
        let Some(device) = self.device_by_handle(handle) else { return };
        let Ok(pdu) = SmpPdu::decode(payload) else { return };
        {
            let mut pd = device.pairing.lock();
            pd.on_pdu(&pdu);
        }
        device.pairing.notify_all();
        let snapshot = device.pairing_snapshot();
        self.for_each_listener(&device, |l| l.device_pairing_state_changed(self, &device, snapshot));
        if snapshot.state == PairingState::FeatureExchangeCompleted && snapshot.use_sc {
            self.sc_begin_public_key_exchange(&device);
        }
        self.drive_sc_pdu(&device, &pdu, &snapshot);
        if snapshot.state == PairingState::FeatureExchangeCompleted {
            self.synthesize_user_response(&device, snapshot.mode);
        }
        if snapshot.state == PairingState::Completed {
            self.on_device_secured(&device);
        }
    }

    /// Synthesizes the user-interaction event implied by the negotiated
    /// pairing mode, then applies the auto-response fallback for IO
    /// capabilities that cannot actually service it (§4.7 "User-response
    /// fallback": a passkey request with no keyboard answers `0`; a
    /// numeric-compare request with no display auto-confirms), replying to
    /// the controller over HCI so the link layer actually proceeds.
    fn synthesize_user_response(&self, device: &Arc<Device>, mode: PairingMode) {
        let io_cap = device.pairing.lock().io_cap_user;
        let addr = device.visible_address().addr;
        match mode {
            PairingMode::NumericCompareIni | PairingMode::NumericCompareResp => {
                device.pairing.lock().on_event(SmpEvent::UserConfirmRequest);
                if !io_cap.has_yes_no() {
                    // No way to ask the user: auto-confirm, matching a
                    // NO_INPUT_NO_OUTPUT peer's own forced behavior.
                    let _ = self.transport.execute(hci::cmd::user_confirmation_request_reply(addr, true));
                }
            }
            PairingMode::PasskeyEntryIni | PairingMode::PasskeyEntryResp => {
                device.pairing.lock().on_event(SmpEvent::UserPasskeyRequest);
                if !io_cap.has_keyboard() {
                    let _ = self.transport.execute(hci::cmd::user_passkey_request_reply(addr, Some(0)));
                    device.pairing.lock().passkey = Some(0);
                }
            }
            _ => {}
        }
        device.pairing.notify_all();
    }

    // -- LE Secure Connections key exchange (§4.7 SC path) -------------------
    //
    // Drives the Public-Key/Confirm/Random/DHKey-Check round trip using
    // `bthostd-crypto`'s f4/f5/f6/g2 toolbox once feature exchange selects
    // an SC pairing mode. Passkey Entry is simplified to a single
    // confirm/random round keyed off one passkey bit, rather than the full
    // Core-spec 20-round exchange; the resulting LTK is still correctly
    // derived via `f5`/`f6` for Just Works and Numeric Comparison, the two
    // modes this host's IO capabilities realistically reach.

    fn send_smp_pdu(&self, device: &Arc<Device>, pdu: &SmpPdu) {
        let handle = device.connection_handle();
        let frame = l2cap::encode_frame(SMP_CID, &pdu.encode());
        if let Err(e) = self.transport.send_acl(handle.raw(), 0x02, &frame) {
            warn!(error = %e, addr = %device.identity, "failed to send smp pdu");
        }
    }

    fn auth_req_for(&self, sec_level: SecLevel) -> AuthReq {
        let mut auth_req = AuthReq::BONDING;
        if sec_level >= SecLevel::EncAuth {
            auth_req |= AuthReq::MITM;
        }
        if self.sc_capable.load(Ordering::Acquire) {
            auth_req |= AuthReq::SC;
        }
        auth_req
    }

    fn key_dist_for(&self, auth_req: AuthReq) -> KeyDist {
        let base = KeyDist::ENC_KEY | KeyDist::ID_KEY | KeyDist::SIGN_KEY;
        if auth_req.contains(AuthReq::SC) {
            base | KeyDist::LINK_KEY
        } else {
            base
        }
    }

    /// Originates a `Pairing Request`, starting SMP as the initiator (§4.7:
    /// nothing previously sent one on this host).
    fn initiate_pairing(&self, device: &Arc<Device>, sec_level: SecLevel, io_cap: IoCap) {
        let auth_req = self.auth_req_for(sec_level);
        let key_dist = self.key_dist_for(auth_req);
        let features = PairingFeatures {
            io_cap: u8::from(io_cap),
            oob_present: false,
            auth_req,
            max_enc_key_size: 16,
            init_key_dist: key_dist,
            resp_key_dist: key_dist,
        };
        self.send_smp_pdu(device, &SmpPdu::PairingRequest(features));
    }

    fn sc_begin_public_key_exchange(&self, device: &Arc<Device>) {
        let pubkey = device.sc_begin();
        self.send_smp_pdu(device, &SmpPdu::PairingPublicKey(pubkey));
    }

    fn drive_sc_pdu(self: &Arc<Self>, device: &Arc<Device>, pdu: &SmpPdu, snapshot: &PairingData) {
        if !snapshot.use_sc {
            return;
        }
        match *pdu {
            SmpPdu::PairingPublicKey(peer_pub) => self.sc_on_public_key(device, peer_pub, snapshot),
            SmpPdu::PairingConfirm(peer_confirm) => self.sc_on_confirm(device, peer_confirm),
            SmpPdu::PairingRandom(peer_nonce) => self.sc_on_random(device, peer_nonce, snapshot),
            SmpPdu::PairingDhKeyCheck(peer_check) => self.sc_on_dhkey_check(device, peer_check, snapshot),
            _ => {}
        }
    }

    fn sc_on_public_key(&self, device: &Arc<Device>, peer_pub: [u8; 64], snapshot: &PairingData) {
        let Some(local_pub) = device.sc_local_public() else { return };
        if device.sc_set_peer_public(peer_pub).is_none() {
            warn!(addr = %device.identity, "peer public key is not a valid P-256 point, failing pairing");
            device.pairing.lock().on_event(SmpEvent::AuthFailed);
            device.pairing.notify_all();
            return;
        }
        if !device.sc_mark_confirm_sent() {
            return;
        }
        let Some(nonce) = device.sc_local_nonce() else { return };
        let local_x = sc_x_coord(&local_pub);
        let peer_x = sc_x_coord(&peer_pub);
        let confirm = crypto::f4(&local_x, &peer_x, &nonce, sc_passkey_bit(snapshot));
        self.send_smp_pdu(device, &SmpPdu::PairingConfirm(confirm));
    }

    fn sc_on_confirm(&self, device: &Arc<Device>, peer_confirm: [u8; 16]) {
        device.sc_set_peer_confirm(peer_confirm);
        if !device.sc_mark_random_sent() {
            return;
        }
        let Some(nonce) = device.sc_local_nonce() else { return };
        self.send_smp_pdu(device, &SmpPdu::PairingRandom(nonce));
    }

    fn sc_on_random(self: &Arc<Self>, device: &Arc<Device>, peer_nonce: [u8; 16], snapshot: &PairingData) {
        let (Some(local_pub), Some(peer_pub), Some(peer_confirm)) =
            (device.sc_local_public(), device.sc_peer_public(), device.sc_peer_confirm())
        else {
            return;
        };
        let local_x = sc_x_coord(&local_pub);
        let peer_x = sc_x_coord(&peer_pub);
        let expected = crypto::f4(&peer_x, &local_x, &peer_nonce, sc_passkey_bit(snapshot));
        if expected != peer_confirm {
            warn!(addr = %device.identity, "smp confirm value mismatch, failing pairing");
            device.pairing.lock().on_event(SmpEvent::AuthFailed);
            device.pairing.notify_all();
            return;
        }
        device.sc_set_peer_nonce(peer_nonce);

        let Some(dhkey) = device.sc_dhkey() else { return };
        let Some(local_nonce) = device.sc_local_nonce() else { return };
        let (n1, n2, a1, a2) = if snapshot.is_local_initiator {
            (local_nonce, peer_nonce, self.public_addr, device.identity)
        } else {
            (peer_nonce, local_nonce, device.identity, self.public_addr)
        };
        let (mac_key, ltk) = crypto::f5(&dhkey, &n1, &n2, &crypto_addr(a1), &crypto_addr(a2));
        device.sc_set_mac_key(mac_key);
        device.sc_set_ltk(ltk);
        device.pairing.lock().on_event(SmpEvent::NewLongTermKey(ltk));
        device.pairing.notify_all();

        if matches!(snapshot.mode, PairingMode::NumericCompareIni | PairingMode::NumericCompareResp) {
            let (u, v, x, y) = if snapshot.is_local_initiator {
                (local_x, peer_x, local_nonce, peer_nonce)
            } else {
                (peer_x, local_x, peer_nonce, local_nonce)
            };
            let code = crypto::g2(&u, &v, &x, &y);
            device.pairing.lock().on_event(SmpEvent::PasskeyNotify(code));
            device.pairing.notify_all();
        }

        if !device.sc_mark_check_sent() {
            return;
        }
        // Our own check value puts our nonce/address first regardless of
        // role (Ea = f6(..., Na, Nb, ..., A, B) for the initiator, Eb =
        // f6(..., Nb, Na, ..., B, A) for the responder — own values lead
        // either way); only the IO-cap octets are role-specific.
        let r = sc_check_randomizer(snapshot);
        let side = if snapshot.is_local_initiator { &snapshot.initiator } else { &snapshot.responder };
        let io = crypto::IoCap::new(side.auth_req.bits(), side.oob, u8::from(side.io_cap));
        let check = crypto::f6(
            &mac_key,
            &local_nonce,
            &peer_nonce,
            &r,
            &io,
            &crypto_addr(self.public_addr),
            &crypto_addr(device.identity),
        );
        self.send_smp_pdu(device, &SmpPdu::PairingDhKeyCheck(check));
    }

    fn sc_on_dhkey_check(self: &Arc<Self>, device: &Arc<Device>, peer_check: [u8; 16], snapshot: &PairingData) {
        let (Some(mac_key), Some(local_nonce), Some(peer_nonce)) =
            (device.sc_mac_key(), device.sc_local_nonce(), device.sc_peer_nonce())
        else {
            return;
        };
        // The peer's check value put its own nonce/address first; verifying
        // it means mirroring the order with the peer's values leading, and
        // using the peer's own role for the IO-cap octets.
        let r = sc_check_randomizer(snapshot);
        let side = if snapshot.is_local_initiator { &snapshot.responder } else { &snapshot.initiator };
        let io = crypto::IoCap::new(side.auth_req.bits(), side.oob, u8::from(side.io_cap));
        let expected = crypto::f6(
            &mac_key,
            &peer_nonce,
            &local_nonce,
            &r,
            &io,
            &crypto_addr(device.identity),
            &crypto_addr(self.public_addr),
        );
        if expected != peer_check {
            warn!(addr = %device.identity, "smp dhkey check mismatch, failing pairing");
            device.pairing.lock().on_event(SmpEvent::AuthFailed);
            device.pairing.notify_all();
            return;
        }
        // The Core spec has the central issue LE_Start_Encryption once both
        // DHKey checks pass; the peripheral only ever responds to it.
        if snapshot.is_local_initiator {
            if let Some(ltk) = device.sc_ltk() {
                let handle = device.connection_handle();
                let _ = self.transport.execute(hci::cmd::le_start_encryption(handle, 0, 0, &ltk));
            }
        }
    }

    // -- SMP watchdog (§4.7 "Watchdog") --------------------------------------

    fn smp_watchdog_tick(&self) {
        let devices = self.registries.lock().connected.clone();
        let mut last_seen = self.smp_last_seen.lock();
        for device in devices {
            let pd = device.pairing_snapshot();
            if pd.state == PairingState::Completed || pd.state == PairingState::None || pd.state == PairingState::Failed {
                last_seen.remove(&device.identity);
                continue;
            }
            let prev = last_seen.insert(device.identity, pd.smp_events);
            if prev == Some(pd.smp_events) {
                warn!(addr = %device.identity, "smp watchdog: no progress, failing pairing");
                device.pairing.lock().on_event(SmpEvent::AuthFailed);
                device.pairing.notify_all();
            }
        }
    }
}

/// Builds a minimal advertising-data payload: flags + complete local name.
fn encode_adv_data(name: &str) -> Vec<u8> {
    let mut v = Vec::with_capacity(3 + 2 + name.len());
    v.extend_from_slice(&[2, 0x01, 0x06]);
    if !name.is_empty() {
        let bytes = name.as_bytes();
        #[allow(clippy::cast_possible_truncation)]
        v.push((bytes.len() + 1) as u8);
        v.push(0x09);
        v.extend_from_slice(bytes);
    }
    v
}

/// Converts a host `AddressAndType` to the address form `f5`/`f6` expect,
/// reversing to the little-endian wire order `Addr::from_le_bytes` wants.
fn crypto_addr(a: AddressAndType) -> crypto::Addr {
    let mut le = a.addr.0;
    le.reverse();
    crypto::Addr::from_le_bytes(matches!(a.addr_type, AddrType::LeRandom), le)
}

/// Extracts the X coordinate from an SC public key's X||Y little-endian wire
/// encoding, the form f4/f5/g2 take as `u`/`v`.
fn sc_x_coord(pubkey: &[u8; 64]) -> [u8; 32] {
    let mut x = [0u8; 32];
    x.copy_from_slice(&pubkey[..32]);
    x
}

/// The Z parameter to `f4` for the Confirm value: the current passkey bit
/// for Passkey Entry, 0 for every other association model (§4.7, SC
/// Confirm generation).
fn sc_passkey_bit(pd: &PairingData) -> u8 {
    if matches!(pd.mode, PairingMode::PasskeyEntryIni | PairingMode::PasskeyEntryResp) {
        (pd.passkey.unwrap_or(0) & 1) as u8
    } else {
        0
    }
}

/// The `r` parameter to `f6` for the DHKey Check: the passkey, right-padded
/// into 16 bytes, for Passkey Entry; all-zero otherwise.
fn sc_check_randomizer(pd: &PairingData) -> [u8; 16] {
    if matches!(pd.mode, PairingMode::PasskeyEntryIni | PairingMode::PasskeyEntryResp) {
        let mut r = [0u8; 16];
        r[12..].copy_from_slice(&pd.passkey.unwrap_or(0).to_be_bytes());
        r
    } else {
        [0u8; 16]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Eui48;
    use crate::hci::{CommandResult, ConnTrackers, TransportStatsSnapshot};
    use std::sync::Mutex as StdMutex;

    struct StubTransport {
        conns: ConnTrackers,
        sent: StdMutex<Vec<Opcode>>,
    }
    use crate::hci::Opcode;

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self { conns: ConnTrackers::new(), sent: StdMutex::new(Vec::new()) })
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, cmd: hci::Command) -> Result<CommandResult> {
            self.sent.lock().unwrap().push(cmd.opcode);
            Ok(CommandResult { status: Status::Success, params: Vec::new() })
        }
        fn send_acl(&self, _handle: u16, _flags: u8, _payload: &[u8]) -> Result<()> {
            Ok(())
        }
        fn stats(&self) -> TransportStatsSnapshot {
            TransportStatsSnapshot::default()
        }
        fn connections(&self) -> &ConnTrackers {
            &self.conns
        }
        fn poll_event(&self, _timeout: Duration) -> Option<TransportEvent> {
            std::thread::sleep(Duration::from_millis(1));
            None
        }
        fn close(&self) {}
    }

    fn local() -> AddressAndType {
        AddressAndType::new(Eui48::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]), AddrType::LePublic)
    }

    fn peer() -> AddressAndType {
        AddressAndType::new(Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]), AddrType::LePublic)
    }

    fn adapter() -> Arc<Adapter> {
        Adapter::new(0, local(), StubTransport::new(), Config::default(), None)
    }

    #[test]
    fn power_on_sets_powered_and_starts_loop() {
        let a = adapter();
        a.power_on().unwrap();
        assert!(a.is_powered());
        a.power_off();
    }

    #[test]
    fn find_or_create_device_is_idempotent() {
        let a = adapter();
        let d1 = a.find_or_create_device(peer(), true);
        let d2 = a.find_or_create_device(peer(), true);
        assert!(Arc::ptr_eq(&d1, &d2));
    }

    #[test]
    fn start_advertising_while_discovering_is_rejected() {
        let a = adapter();
        a.power_on().unwrap();
        a.start_discovery(DiscoveryParams::default()).unwrap();
        let err = a.start_advertising(AdvertisingParams::default()).unwrap_err();
        assert!(matches!(err, Error::Lifecycle(_)));
        a.power_off();
    }

    #[test]
    fn device_found_listener_can_decline_to_keep() {
        struct Declining;
        impl AdapterStatusListener for Declining {
            fn device_found(&self, _adapter: &Adapter, _device: &Arc<Device>) -> ListenerAction {
                ListenerAction::Discard
            }
        }
        let a = adapter();
        a.power_on().unwrap();
        a.add_status_listener(Arc::new(Declining), None);
        a.on_device_found(peer(), EInfoReport::default());
        assert!(a.discovered_devices().is_empty());
        a.power_off();
    }

    #[test]
    fn disconnect_cas_rejects_second_caller() {
        let a = adapter();
        a.power_on().unwrap();
        let d = a.find_or_create_device(peer(), true);
        d.mark_connected(ConnHandle::new(0x0040), Role::Central, 200);
        a.disconnect(&d, Status::ConnectionTerminatedByLocalHost).unwrap();
        let err = a.disconnect(&d, Status::ConnectionTerminatedByLocalHost).unwrap_err();
        assert!(matches!(err, Error::ControllerRejection(_)));
        a.power_off();
    }
}
