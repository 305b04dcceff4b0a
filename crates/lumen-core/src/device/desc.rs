use crate::backend::{BackendKind, DeviceFlags};
use crate::error::{Error, Result};

/// Device creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDesc {
    pub backend: BackendKind,
    /// Index into the adapters reported for `backend`.
    pub adapter_index: usize,
    pub flags: DeviceFlags,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            backend: BackendKind::Null,
            adapter_index: 0,
            flags: DeviceFlags::empty(),
        }
    }
}

impl DeviceDesc {
    pub const BACKEND_VAR: &'static str = "LUMEN_BACKEND";
    pub const ADAPTER_VAR: &'static str = "LUMEN_ADAPTER";

    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn with_adapter(mut self, adapter_index: usize) -> Self {
        self.adapter_index = adapter_index;
        self
    }

    pub fn with_flags(mut self, flags: DeviceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Defaults overridden by `LUMEN_BACKEND` and `LUMEN_ADAPTER`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var(Self::BACKEND_VAR).ok().as_deref(),
            std::env::var(Self::ADAPTER_VAR).ok().as_deref(),
        )
    }

    fn from_vars(backend: Option<&str>, adapter: Option<&str>) -> Result<Self> {
        let mut desc = Self::default();
        if let Some(backend) = backend.filter(|s| !s.trim().is_empty()) {
            desc.backend = backend.parse()?;
        }
        if let Some(adapter) = adapter.filter(|s| !s.trim().is_empty()) {
            desc.adapter_index = adapter.trim().parse().map_err(|_| {
                Error::invalid_parameter(format!(
                    "{} must be an adapter index, got '{adapter}'",
                    Self::ADAPTER_VAR
                ))
            })?;
        }
        Ok(desc)
    }
}
