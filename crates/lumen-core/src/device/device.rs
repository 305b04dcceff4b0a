use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::DeviceDesc;
use crate::backend::{
    self, AdapterInfo, Backend, BackendKind, BackendProvider, Capabilities, DeviceFlags,
    FeatureFlags, RawHandle,
};
use crate::context::Context;
use crate::error::{Error, Recorded, Result};
use crate::fence::Fence;
use crate::handle::{HandleRegistry, Registration, ResourceId, ResourceKind};

/// Total number of adapters across every built-in backend (zero-capacity query).
pub fn adapter_count() -> Result<usize> {
    enumerate_adapters_into(&mut []).recorded()
}

/// Fills `out` with adapters of every built-in backend and returns the total count.
pub fn enumerate_adapters_into(out: &mut [AdapterInfo]) -> Result<usize> {
    let mut total = 0;
    for provider in backend::builtin_providers() {
        let start = total.min(out.len());
        total += provider.enumerate_adapters(&mut out[start..])?;
    }
    Ok(total)
}

pub fn enumerate_adapters() -> Result<Vec<AdapterInfo>> {
    collect_adapters().recorded()
}

fn collect_adapters() -> Result<Vec<AdapterInfo>> {
    let count = enumerate_adapters_into(&mut [])?;
    let mut adapters = vec![AdapterInfo::default(); count];
    let filled = enumerate_adapters_into(&mut adapters)?;
    adapters.truncate(filled);
    Ok(adapters)
}

pub(crate) struct DeviceShared {
    reg: Registration,
    registry: Arc<HandleRegistry>,
    backend: Arc<dyn Backend>,
    caps: Capabilities,
    adapter: AdapterInfo,
    desc: DeviceDesc,
    lost: Mutex<Option<String>>,
}

impl DeviceShared {
    #[inline]
    pub(crate) fn id(&self) -> ResourceId {
        self.reg.id()
    }

    #[inline]
    pub(crate) fn caps(&self) -> &Capabilities {
        &self.caps
    }

    /// Backend access for release paths, which must run even on a lost device.
    #[inline]
    pub(crate) fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub(crate) fn register(
        &self,
        kind: ResourceKind,
        owner: ResourceId,
        raw: RawHandle,
    ) -> Result<Registration> {
        self.registry.register(kind, Some(owner), raw)
    }

    pub(crate) fn lost_reason(&self) -> Option<String> {
        self.lost.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn mark_lost(&self, reason: &str) {
        let mut lost = self.lost.lock().unwrap_or_else(PoisonError::into_inner);
        if lost.is_none() {
            log::error!("{} device lost: {reason}", self.caps.backend);
            *lost = Some(reason.to_owned());
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.lost_reason() {
            Some(reason) => Err(Error::DeviceLost(reason)),
            None => Ok(()),
        }
    }

    /// Runs a backend call on a live device, latching device loss it reports.
    pub(crate) fn call<T>(&self, f: impl FnOnce(&dyn Backend) -> Result<T>) -> Result<T> {
        self.check()?;
        let result = f(&*self.backend);
        if let Err(Error::DeviceLost(reason)) = &result {
            self.mark_lost(reason);
        }
        result
    }

    /// Like [`call`](Self::call) for creation calls; a null handle on success is an internal error.
    pub(crate) fn create(
        &self,
        what: &str,
        f: impl FnOnce(&dyn Backend) -> Result<RawHandle>,
    ) -> Result<RawHandle> {
        backend::non_null(self.call(f), what)
    }
}

/// Handle to an opened backend device. Clones share the device.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.shared.caps.backend)
            .field("adapter", &self.shared.adapter.name)
            .field("lost", &self.shared.lost_reason())
            .finish()
    }
}

impl Device {
    /// Opens a device on a built-in backend.
    pub fn create(desc: DeviceDesc) -> Result<Device> {
        let result = match desc.backend {
            BackendKind::Unknown => Err(Error::invalid_parameter("backend kind must be specified")),
            kind => match backend::builtin_provider(kind) {
                Some(provider) => Self::open(provider, desc),
                None => Err(Error::unsupported(format!(
                    "no {kind} backend in this build; supply one with Device::with_provider"
                ))),
            },
        };
        result.recorded()
    }

    /// Opens a device through a caller-supplied backend provider.
    pub fn with_provider(provider: Arc<dyn BackendProvider>, desc: DeviceDesc) -> Result<Device> {
        let result = if provider.kind() != desc.backend {
            Err(Error::invalid_parameter(format!(
                "provider serves {} but {} was requested",
                provider.kind(),
                desc.backend
            )))
        } else {
            Self::open(provider, desc)
        };
        result.recorded()
    }

    fn open(provider: Arc<dyn BackendProvider>, desc: DeviceDesc) -> Result<Device> {
        let total = provider.enumerate_adapters(&mut [])?;
        if desc.adapter_index >= total {
            return Err(Error::invalid_parameter(format!(
                "adapter index {} out of range ({total} {} adapters)",
                desc.adapter_index, desc.backend
            )));
        }
        let mut adapters = vec![AdapterInfo::default(); total];
        let filled = provider.enumerate_adapters(&mut adapters)?;
        let adapter = adapters
            .into_iter()
            .take(filled)
            .nth(desc.adapter_index)
            .ok_or_else(|| Error::internal("adapter list shrank during enumeration"))?;

        let backend = provider.open(desc.adapter_index, desc.flags)?;
        let caps = backend.capabilities();
        if desc.flags.contains(DeviceFlags::HEADLESS)
            && !caps.features.contains(FeatureFlags::HEADLESS_SUPPORTED)
        {
            return Err(Error::unsupported(format!(
                "{} adapter '{}' cannot run headless",
                desc.backend, adapter.name
            )));
        }

        let registry = Arc::new(HandleRegistry::new());
        let reg = registry.register(ResourceKind::Device, None, RawHandle::NULL)?;
        log::info!(
            "opened {} device on '{}' (features {:?})",
            caps.backend,
            adapter.name,
            caps.features
        );

        Ok(Device {
            shared: Arc::new(DeviceShared {
                reg,
                registry,
                backend,
                caps,
                adapter,
                desc,
                lost: Mutex::new(None),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<DeviceShared>) -> Device {
        Device { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared> {
        &self.shared
    }

    #[inline]
    pub fn backend_kind(&self) -> BackendKind {
        self.shared.caps.backend
    }

    #[inline]
    pub fn adapter(&self) -> &AdapterInfo {
        &self.shared.adapter
    }

    #[inline]
    pub fn desc(&self) -> &DeviceDesc {
        &self.shared.desc
    }

    /// Cached capability record.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.shared.caps
    }

    pub fn create_context(&self, width: u32, height: u32) -> Result<Context> {
        Context::create(self, width, height)
    }

    pub fn create_fence(&self) -> Result<Fence> {
        Fence::create(self)
    }

    /// Marks the device lost. Every later operation on it or its dependents fails.
    pub fn notify_lost(&self, reason: &str) {
        self.shared.mark_lost(reason);
    }

    /// Polls the backend for loss and reports the latched state.
    pub fn is_lost(&self) -> bool {
        if self.shared.lost_reason().is_none() {
            if let Err(e) = self.shared.call(|b| b.poll()) {
                log::debug!("poll during loss check failed: {e}");
            }
        }
        self.shared.lost_reason().is_some()
    }

    /// Live resources of `kind` created from this device.
    pub fn live_resources(&self, kind: ResourceKind) -> usize {
        self.shared.registry.count(kind)
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.shared.registry
    }

    /// Whether two handles refer to the same device.
    #[inline]
    pub fn same_device(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
