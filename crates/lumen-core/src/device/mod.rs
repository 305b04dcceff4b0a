//! Devices and adapter discovery.
//!
//! A [`Device`] binds one backend adapter. It caches the backend's
//! capabilities, owns the handle registry of everything created from it and
//! tracks device loss. Contexts and fences hold counted references to the
//! device, so the backend device is released only after its last dependent.

mod desc;
mod device;

pub use desc::DeviceDesc;
pub use device::{Device, adapter_count, enumerate_adapters, enumerate_adapters_into};

pub(crate) use device::DeviceShared;
