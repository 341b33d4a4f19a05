//! Process-wide manager spanning every local adapter (C11, §3 "Manager").
//!
//! Modeled per §9 "Global singleton (`Manager`)": an explicitly constructed,
//! explicitly torn-down value rather than an implicit static, so tests can
//! create and drop as many independent managers as they like. Nothing
//! prevents an embedder from stashing one `Arc<Manager>` behind its own
//! process-wide storage if it wants an actual singleton.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::adapter::{Adapter, AdapterSettings, AdapterStatusListener, ListenerAction};
use crate::device::Device;
use crate::smp::PairingData;

/// Process-wide callbacks for adapter presence/settings changes (§3 C11
/// "routes adapter added/removed/powered", "re-issues `NEW_SETTINGS` as
/// synthetic 'adapter updated'"). Every method has a do-nothing default.
#[allow(unused_variables)]
pub trait ManagerListener: Send + Sync {
    fn adapter_added(&self, manager: &Manager, adapter: &Arc<Adapter>) {}
    fn adapter_removed(&self, manager: &Manager, adapter: &Arc<Adapter>) {}
    /// Fired whenever a managed adapter's settings bitmask changes, which
    /// includes the power-on/power-off transition (§4.4 "adapter added /
    /// removed / powered").
    fn adapter_updated(&self, manager: &Manager, adapter: &Arc<Adapter>, settings: AdapterSettings) {}
}

struct SettingsBridge {
    manager: Weak<Manager>,
    adapter: Weak<Adapter>,
}

/// Bridges one adapter's `adapter_settings_changed` callback back to the
/// manager's `adapter_updated` fan-out (§4.4 mapping table: `NEW_SETTINGS`
/// becomes a synthetic "adapter updated"). Installed with no device filter
/// so it observes every settings change, not just device-scoped events.
impl AdapterStatusListener for SettingsBridge {
    fn adapter_settings_changed(&self, _adapter: &Adapter, settings: AdapterSettings) {
        let (Some(manager), Some(adapter)) = (self.manager.upgrade(), self.adapter.upgrade()) else {
            return;
        };
        let listeners = manager.listeners.lock().clone();
        for l in &listeners {
            l.adapter_updated(&manager, &adapter, settings);
        }
    }

    fn device_found(&self, _adapter: &Adapter, _device: &Arc<Device>) -> ListenerAction {
        ListenerAction::Keep
    }

    fn device_pairing_state_changed(&self, _adapter: &Adapter, _device: &Arc<Device>, _pairing: PairingData) {}
}

/// Owns the set of local adapters and the process-wide
/// [`ManagerListener`]s interested in their presence/settings (C11).
pub struct Manager {
    adapters: Mutex<Vec<Arc<Adapter>>>,
    listeners: Mutex<Vec<Arc<dyn ManagerListener>>>,
}

impl Manager {
    /// Creates a new, empty manager. Construction is explicit rather than a
    /// lazily-initialized static (§9) so tests can create independent
    /// instances without cross-test interference.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            adapters: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn ManagerListener>) {
        self.listeners.lock().push(listener);
    }

    /// Registers `adapter` with this manager: installs the settings bridge,
    /// records the adapter, and fires `adapter_added` to every listener
    /// (§4.4 "adapter added").
    pub fn add_adapter(self: &Arc<Self>, adapter: Arc<Adapter>) {
        adapter.add_status_listener(
            Arc::new(SettingsBridge {
                manager: Arc::downgrade(self),
                adapter: Arc::downgrade(&adapter),
            }),
            None,
        );
        self.adapters.lock().push(Arc::clone(&adapter));
        for l in self.listeners.lock().iter() {
            l.adapter_added(self, &adapter);
        }
    }

    /// Powers off and deregisters the adapter with the given `dev_id`,
    /// firing `adapter_removed` to every listener (§4.4 "adapter removed").
    /// Returns `false` if no adapter with that id is registered.
    pub fn remove_adapter(&self, dev_id: u16) -> bool {
        let removed = {
            let mut adapters = self.adapters.lock();
            let idx = adapters.iter().position(|a| a.dev_id == dev_id);
            idx.map(|i| adapters.remove(i))
        };
        let Some(adapter) = removed else { return false };
        adapter.power_off();
        for l in self.listeners.lock().iter() {
            l.adapter_removed(self, &adapter);
        }
        true
    }

    #[must_use]
    pub fn adapters(&self) -> Vec<Arc<Adapter>> {
        self.adapters.lock().clone()
    }

    #[must_use]
    pub fn find_adapter(&self, dev_id: u16) -> Option<Arc<Adapter>> {
        self.adapters.lock().iter().find(|a| a.dev_id == dev_id).cloned()
    }

    /// Powers off and deregisters every managed adapter. Explicit teardown
    /// counterpart to [`Manager::new`] (§9 "explicit init/teardown
    /// methods").
    pub fn shutdown(&self) {
        let adapters = std::mem::take(&mut *self.adapters.lock());
        for adapter in &adapters {
            adapter.power_off();
        }
        for l in self.listeners.lock().iter() {
            for adapter in &adapters {
                l.adapter_removed(self, adapter);
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self {
            adapters: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrType, AddressAndType, Eui48};
    use crate::config::Config;
    use crate::hci::{CommandResult, ConnTrackers, Status, Transport, TransportEvent, TransportStatsSnapshot};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubTransport {
        conns: ConnTrackers,
    }

    impl StubTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self { conns: ConnTrackers::new() })
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, cmd: crate::hci::Command) -> crate::error::Result<CommandResult> {
            let _ = cmd;
            Ok(CommandResult { status: Status::Success, params: Vec::new() })
        }
        fn send_acl(&self, _handle: u16, _flags: u8, _payload: &[u8]) -> crate::error::Result<()> {
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

    #[derive(Default)]
    struct CountingListener {
        added: AtomicUsize,
        updated: AtomicUsize,
        removed: AtomicUsize,
    }

    impl ManagerListener for CountingListener {
        fn adapter_added(&self, _manager: &Manager, _adapter: &Arc<Adapter>) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn adapter_removed(&self, _manager: &Manager, _adapter: &Arc<Adapter>) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        fn adapter_updated(&self, _manager: &Manager, _adapter: &Arc<Adapter>, _settings: AdapterSettings) {
            self.updated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn add_adapter_fires_added_and_power_on_fires_updated() {
        let manager = Manager::new();
        let listener = Arc::new(CountingListener::default());
        manager.add_listener(Arc::clone(&listener) as Arc<dyn ManagerListener>);

        let adapter = Adapter::new(0, local(), StubTransport::new(), Config::default(), None);
        manager.add_adapter(Arc::clone(&adapter));
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);

        adapter.power_on().unwrap();
        assert_eq!(listener.updated.load(Ordering::SeqCst), 1);

        manager.remove_adapter(0);
        assert_eq!(listener.removed.load(Ordering::SeqCst), 1);
        assert!(manager.find_adapter(0).is_none());
    }

    #[test]
    fn shutdown_powers_off_and_clears_every_adapter() {
        let manager = Manager::new();
        let a0 = Adapter::new(0, local(), StubTransport::new(), Config::default(), None);
        manager.add_adapter(Arc::clone(&a0));
        a0.power_on().unwrap();
        manager.shutdown();
        assert!(manager.adapters().is_empty());
        assert!(!a0.is_powered());
    }
}
