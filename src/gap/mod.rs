//! Generic Access Profile / advertising-data types (C1 address/EIR).

mod consts;
mod eir;
mod uuid;

pub use consts::{AdvFlag, Appearance};
pub use eir::{AdvSource, AdvertisingReport, EInfoReport, EirFieldMask};
pub use uuid::{CharacteristicId, DescriptorId, GattServiceId, ServiceClassId, Uuid, Uuid16};
