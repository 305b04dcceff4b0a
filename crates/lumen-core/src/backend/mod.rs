//! Backend boundary.
//!
//! A [`BackendProvider`] discovers adapters and opens devices; the resulting
//! [`Backend`] owns every backend-native object of that device and is addressed
//! through [`RawHandle`]s. The core never touches backend objects directly.
//!
//! Built-in backends:
//! - `Null`: headless, CPU rasterized, always available.
//! - `WebGpu`: wgpu-based, behind the `wgpu` cargo feature.
//!
//! Other backend kinds are plugin slots filled through
//! [`Device::with_provider`](crate::Device::with_provider).

mod caps;
mod frame;
mod null;
mod slab;
mod timeline;

#[cfg(feature = "wgpu")]
mod webgpu;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paint::Gradient;
use crate::resource::{BufferFlags, BufferType, ImageData, MapFlags};
use crate::surface::{PresentFlags, SurfaceConfig, SurfaceTarget};

pub use caps::{AdapterInfo, BackendKind, Capabilities, DeviceFlags, FeatureFlags};
pub use frame::{ClipPath, DrawCommand, FrameBatch, FrameInfo, ImageRef};
pub use null::{NullBackend, NullProvider, null_adapter};
#[cfg(feature = "wgpu")]
pub use webgpu::{WgpuBackend, WgpuProvider};

pub(crate) use slab::Slab;
pub(crate) use timeline::FenceTimeline;

/// Backend-native object handle. Zero is never a valid object.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

static HOST_OBJECTS: AtomicU64 = AtomicU64::new(1);

/// Handle for an object a backend keeps no native state for.
pub fn host_handle() -> RawHandle {
    RawHandle::new(HOST_OBJECTS.fetch_add(1, Ordering::Relaxed))
}

/// Turns a successful-but-null backend result into an internal error.
pub(crate) fn non_null(result: Result<RawHandle>, what: &str) -> Result<RawHandle> {
    match result {
        Ok(raw) if raw.is_null() => {
            log::error!("backend returned success with a null {what} handle");
            Err(Error::internal(format!("backend returned a null {what} handle")))
        }
        other => other,
    }
}

/// Adapter discovery and device opening for one backend kind.
pub trait BackendProvider: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Count-then-fill enumeration: returns the total number of adapters and
    /// fills `out` with the first `min(out.len(), total)` of them.
    fn enumerate_adapters(&self, out: &mut [AdapterInfo]) -> Result<usize>;

    fn open(&self, adapter_index: usize, flags: DeviceFlags) -> Result<Arc<dyn Backend>>;
}

/// Per-device backend.
///
/// Creation calls must return a non-null handle on success. Release calls
/// cannot fail; backends log unknown handles.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    fn create_context(&self, width: u32, height: u32) -> Result<RawHandle>;

    fn resize_context(&self, context: RawHandle, width: u32, height: u32) -> Result<()>;

    fn release_context(&self, context: RawHandle);

    fn begin_frame(&self, context: RawHandle, frame: &FrameInfo) -> Result<()>;

    fn end_frame(&self, context: RawHandle) -> Result<()> {
        let _ = context;
        Ok(())
    }

    /// Enqueues a closed frame. Must not wait for its execution.
    fn submit(&self, context: RawHandle, batch: FrameBatch) -> Result<()>;

    /// Copies premultiplied RGBA8 rows of the last executed frame.
    fn read_framebuffer(&self, context: RawHandle, dst: &mut [u8]) -> Result<()> {
        let _ = (context, dst);
        Err(Error::unsupported(format!(
            "{} backend has no CPU framebuffer",
            self.kind()
        )))
    }

    fn create_fence(&self) -> Result<RawHandle>;

    fn release_fence(&self, fence: RawHandle);

    /// Schedules `fence` to reach `value` after all work submitted so far on `context`.
    fn signal_fence(&self, context: RawHandle, fence: RawHandle, value: u64) -> Result<()>;

    fn fence_completed_value(&self, fence: RawHandle) -> Result<u64>;

    /// Blocks until the fence reaches `value`. `Ok(false)` means the timeout expired.
    fn wait_fence(&self, fence: RawHandle, value: u64, timeout: Option<Duration>) -> Result<bool>;

    fn create_buffer(
        &self,
        context: RawHandle,
        ty: BufferType,
        flags: BufferFlags,
        size: usize,
    ) -> Result<RawHandle>;

    fn release_buffer(&self, buffer: RawHandle);

    fn write_buffer(&self, buffer: RawHandle, offset: usize, data: &[u8]) -> Result<()>;

    /// Returns a staging copy of the whole buffer for mapping.
    fn map_buffer(&self, buffer: RawHandle, flags: MapFlags) -> Result<Vec<u8>>;

    /// Ends a mapping, committing the first `written` bytes of `staging`.
    fn unmap_buffer(&self, buffer: RawHandle, staging: &[u8], written: usize) -> Result<()>;

    fn create_image(&self, context: RawHandle, image: &Arc<ImageData>) -> Result<RawHandle>;

    fn release_image(&self, image: RawHandle);

    // Renderers, paths, paints, shaders and fonts are recorded on the host.
    // Backends that keep native state for them override these pairs.

    fn create_renderer(&self, context: RawHandle) -> Result<RawHandle> {
        let _ = context;
        Ok(host_handle())
    }

    fn release_renderer(&self, renderer: RawHandle) {
        let _ = renderer;
    }

    fn create_path(&self, context: RawHandle) -> Result<RawHandle> {
        let _ = context;
        Ok(host_handle())
    }

    fn release_path(&self, path: RawHandle) {
        let _ = path;
    }

    fn create_paint(&self, context: RawHandle) -> Result<RawHandle> {
        let _ = context;
        Ok(host_handle())
    }

    fn release_paint(&self, paint: RawHandle) {
        let _ = paint;
    }

    fn create_shader(&self, context: RawHandle, gradient: &Gradient) -> Result<RawHandle> {
        let _ = (context, gradient);
        Ok(host_handle())
    }

    fn release_shader(&self, shader: RawHandle) {
        let _ = shader;
    }

    /// `data` is the font file the host already parsed.
    fn create_font(&self, context: RawHandle, data: &[u8]) -> Result<RawHandle> {
        let _ = (context, data);
        Ok(host_handle())
    }

    fn release_font(&self, font: RawHandle) {
        let _ = font;
    }

    fn create_surface(
        &self,
        context: RawHandle,
        target: &SurfaceTarget,
        config: &SurfaceConfig,
    ) -> Result<RawHandle> {
        let _ = (context, target, config);
        Err(Error::unsupported(format!(
            "{} backend cannot present",
            self.kind()
        )))
    }

    fn resize_surface(&self, surface: RawHandle, width: u32, height: u32) -> Result<()> {
        let _ = (surface, width, height);
        Err(Error::unsupported("surface resize"))
    }

    fn present(&self, surface: RawHandle, interval: u32, flags: PresentFlags) -> Result<()> {
        let _ = (surface, interval, flags);
        Err(Error::unsupported("present"))
    }

    fn release_surface(&self, surface: RawHandle) {
        let _ = surface;
    }

    /// Reports device loss detected since the last call.
    fn poll(&self) -> Result<()> {
        Ok(())
    }
}

/// Providers compiled into this build.
pub fn builtin_providers() -> Vec<Arc<dyn BackendProvider>> {
    let null: Arc<dyn BackendProvider> = Arc::new(NullProvider);
    #[cfg(feature = "wgpu")]
    let providers = vec![null, Arc::new(WgpuProvider::new()) as Arc<dyn BackendProvider>];
    #[cfg(not(feature = "wgpu"))]
    let providers = vec![null];
    providers
}

pub fn builtin_provider(kind: BackendKind) -> Option<Arc<dyn BackendProvider>> {
    builtin_providers().into_iter().find(|p| p.kind() == kind)
}
