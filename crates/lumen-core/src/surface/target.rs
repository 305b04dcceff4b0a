use raw_window_handle::{HasWindowHandle, RawWindowHandle};

use crate::backend::BackendKind;
use crate::error::{Error, Result};

/// Platform object a surface presents into.
///
/// Pointer-sized handles are carried as integers; the caller keeps the
/// window or layer alive for the lifetime of the surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceTarget {
    /// Win32 `HWND` presented through D3D12.
    D3d12Hwnd { hwnd: usize },
    /// `CAMetalLayer*` presented through Metal.
    MetalLayer { layer: usize, sample_count: u32 },
    /// `VkSurfaceKHR` created by the host.
    Vulkan { surface: u64 },
}

impl SurfaceTarget {
    pub fn is_null(&self) -> bool {
        match *self {
            SurfaceTarget::D3d12Hwnd { hwnd } => hwnd == 0,
            SurfaceTarget::MetalLayer { layer, .. } => layer == 0,
            SurfaceTarget::Vulkan { surface } => surface == 0,
        }
    }

    /// Backend able to present into this target.
    pub fn backend(&self) -> BackendKind {
        match self {
            SurfaceTarget::D3d12Hwnd { .. } => BackendKind::D3d12,
            SurfaceTarget::MetalLayer { .. } => BackendKind::Metal,
            SurfaceTarget::Vulkan { .. } => BackendKind::Vulkan,
        }
    }

    /// Whether the host operating system can present into this target kind.
    pub fn host_supported(&self) -> bool {
        match self {
            SurfaceTarget::D3d12Hwnd { .. } => cfg!(target_os = "windows"),
            SurfaceTarget::MetalLayer { .. } => {
                cfg!(any(target_os = "macos", target_os = "ios"))
            }
            SurfaceTarget::Vulkan { .. } => cfg!(any(
                target_os = "linux",
                target_os = "android",
                target_os = "macos"
            )),
        }
    }

    /// Derives a target from a windowing-library window.
    ///
    /// Only Win32 windows map directly; Metal layers and Vulkan surfaces must
    /// be created by the host and passed explicitly.
    pub fn from_window(window: &impl HasWindowHandle) -> Result<SurfaceTarget> {
        let handle = window
            .window_handle()
            .map_err(|e| Error::invalid_parameter(format!("window handle unavailable: {e}")))?;
        match handle.as_raw() {
            RawWindowHandle::Win32(win) => Ok(SurfaceTarget::D3d12Hwnd {
                hwnd: win.hwnd.get() as usize,
            }),
            other => Err(Error::unsupported(format!(
                "no surface target for window handle {other:?}; create the layer or surface on the host"
            ))),
        }
    }
}
