use std::sync::{Arc, OnceLock};

use anyhow::Context as _;

use super::WgpuBackend;
use crate::backend::{AdapterInfo, Backend, BackendKind, BackendProvider, DeviceFlags};
use crate::error::{Error, Result};

/// Power preferences tried during discovery, most capable first.
const PREFERENCES: [wgpu::PowerPreference; 2] = [
    wgpu::PowerPreference::HighPerformance,
    wgpu::PowerPreference::LowPower,
];

/// Discovers wgpu adapters across every native graphics API.
pub struct WgpuProvider {
    instance: wgpu::Instance,
    adapters: OnceLock<Vec<wgpu::Adapter>>,
}

impl WgpuProvider {
    pub fn new() -> Self {
        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        Self {
            instance,
            adapters: OnceLock::new(),
        }
    }

    fn adapters(&self) -> &[wgpu::Adapter] {
        self.adapters.get_or_init(|| {
            let mut found: Vec<wgpu::Adapter> = Vec::new();
            for power_preference in PREFERENCES {
                let adapter = pollster::block_on(self.instance.request_adapter(
                    &wgpu::RequestAdapterOptions {
                        power_preference,
                        compatible_surface: None,
                        force_fallback_adapter: false,
                    },
                ))
                .context("no adapter for power preference");
                match adapter {
                    Ok(adapter) => {
                        let info = adapter.get_info();
                        let seen = found.iter().any(|a| {
                            let other = a.get_info();
                            other.vendor == info.vendor
                                && other.device == info.device
                                && other.backend == info.backend
                        });
                        if !seen {
                            found.push(adapter);
                        }
                    }
                    Err(e) => log::debug!("wgpu {power_preference:?}: {e:#}"),
                }
            }
            log::debug!("wgpu discovered {} adapters", found.len());
            found
        })
    }
}

impl Default for WgpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn adapter_info(adapter: &wgpu::Adapter) -> AdapterInfo {
    let info = adapter.get_info();
    AdapterInfo {
        backend: BackendKind::WebGpu,
        vendor_id: info.vendor,
        device_id: info.device,
        subsys_id: 0,
        revision: 0,
        dedicated_video_memory: 0,
        shared_system_memory: 0,
        flags: DeviceFlags::HEADLESS,
        name: format!("{} ({:?}, {:?})", info.name, info.backend, info.device_type),
    }
}

impl BackendProvider for WgpuProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::WebGpu
    }

    fn enumerate_adapters(&self, out: &mut [AdapterInfo]) -> Result<usize> {
        let adapters = self.adapters();
        for (slot, adapter) in out.iter_mut().zip(adapters) {
            *slot = adapter_info(adapter);
        }
        Ok(adapters.len())
    }

    fn open(&self, adapter_index: usize, flags: DeviceFlags) -> Result<Arc<dyn Backend>> {
        let adapter = self.adapters().get(adapter_index).ok_or_else(|| {
            Error::invalid_parameter(format!("wgpu has no adapter {adapter_index}"))
        })?;
        let backend = pollster::block_on(WgpuBackend::new(adapter, flags))
            .map_err(|e| Error::unsupported(format!("wgpu device creation failed: {e:#}")))?;
        Ok(Arc::new(backend))
    }
}
