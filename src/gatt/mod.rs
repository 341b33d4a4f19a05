//! GATT client bootstrap hook (C8). The attribute database itself —
//! service/characteristic discovery mechanics, MTU exchange, notification
//! fan-out — is an external collaborator (§1 Non-goals: "GATT attribute
//! database server/client logic"). This module only defines the trigger
//! point: the core calls [`GattClient::discover_services`] exactly once per
//! device, right after ATT bring-up reaches `deviceReady` (§4.9 step 5,
//! §4.10 ready-delay).

use std::sync::Arc;

use crate::device::Device;

/// Implemented by whatever layer actually walks the peer's attribute
/// database. Central (client) role only; a peripheral accepting an
/// incoming ATT bearer has nothing to discover and never calls this.
pub trait GattClient: Send + Sync {
    fn discover_services(&self, device: &Arc<Device>);
}

/// A [`GattClient`] that does nothing, used when no real GATT layer has
/// been wired in (e.g. adapter unit tests that only exercise bring-up).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullGattClient;

impl GattClient for NullGattClient {
    fn discover_services(&self, _device: &Arc<Device>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{AddrType, AddressAndType, Eui48};

    #[test]
    fn null_client_is_a_harmless_default() {
        let d = Arc::new(Device::new(
            AddressAndType::new(Eui48::new([1, 2, 3, 4, 5, 6]), AddrType::LePublic),
            true,
        ));
        NullGattClient.discover_services(&d);
    }
}
