//! User-space Bluetooth LE host stack speaking directly to a kernel HCI
//! socket.
//!
//! This crate owns everything between a raw HCI transport and a GATT
//! client: command/event codec ([`hci`]), per-adapter lifecycle ([`adapter`])
//! covering power, discovery, advertising and connection management, the
//! SMP pairing state machine with its security-downgrade ladder ([`smp`]),
//! a persistent key store ([`keystore`]), and a per-peer security policy
//! registry ([`security_registry`]). It does not implement a GATT attribute
//! database, SDP, or any UI — see [`gatt::GattClient`] for the bootstrap
//! seam where a real GATT layer plugs in.
//!
//! [`manager::Manager`] is the entry point for anything running more than
//! one local adapter; single-adapter callers can use [`adapter::Adapter`]
//! directly.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod adapter;
pub mod addr;
pub mod att;
pub mod config;
pub mod device;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod hci;
pub mod keystore;
pub mod l2cap;
pub mod manager;
pub mod mgmt;
mod octets;
pub mod security_registry;
pub mod smp;
mod util;

pub use adapter::{Adapter, AdapterSettings, AdapterStatusListener, DiscoveryPolicy, ListenerAction};
pub use config::Config;
pub use error::{Error, Result};
pub use manager::{Manager, ManagerListener};
