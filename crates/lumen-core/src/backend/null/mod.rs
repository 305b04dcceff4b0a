//! Headless backend.
//!
//! Contexts render into CPU framebuffers on a dedicated queue thread, fences
//! complete in submission order and surfaces are virtual swapchains. Always
//! available; used for tests, servers and as the self-test fallback.

mod queue;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{
    AdapterInfo, Backend, BackendKind, BackendProvider, Capabilities, DeviceFlags, FeatureFlags,
    FenceTimeline, FrameBatch, FrameInfo, RawHandle, Slab,
};
use crate::error::{Error, Result};
use crate::paint::Gradient;
use crate::raster::{Canvas, RasterOp};
use crate::resource::{BufferFlags, BufferType, ImageData, MapFlags};
use crate::surface::{PresentFlags, SurfaceConfig, SurfaceTarget};

use queue::{Queue, Work};

const MAX_BUFFER_SIZE: u64 = 256 * 1024 * 1024;
const MAX_TEXTURE_DIMENSION: u32 = 4096;

/// The single adapter exposed by the null backend.
pub fn null_adapter() -> AdapterInfo {
    AdapterInfo {
        backend: BackendKind::Null,
        vendor_id: 0xffff,
        device_id: 0xffff,
        subsys_id: 0,
        revision: 1,
        dedicated_video_memory: 0,
        shared_system_memory: 0,
        flags: DeviceFlags::HEADLESS,
        name: "Null Renderer".to_owned(),
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct NullProvider;

impl BackendProvider for NullProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn enumerate_adapters(&self, out: &mut [AdapterInfo]) -> Result<usize> {
        if let Some(slot) = out.first_mut() {
            *slot = null_adapter();
        }
        Ok(1)
    }

    fn open(&self, adapter_index: usize, flags: DeviceFlags) -> Result<Arc<dyn Backend>> {
        if adapter_index != 0 {
            return Err(Error::invalid_parameter(format!(
                "null backend has one adapter, index {adapter_index} requested"
            )));
        }
        log::debug!("opening null device (flags {flags:?})");
        Ok(Arc::new(NullBackend::new()?))
    }
}

struct NullContext {
    width: u32,
    height: u32,
    framebuffer: Arc<Mutex<Canvas>>,
    recording: bool,
    last_work: u64,
}

struct NullBuffer {
    data: Vec<u8>,
    mapped: bool,
}

struct NullSurface {
    context: RawHandle,
    width: u32,
    height: u32,
    presented: u64,
}

/// Renderer, path, paint, shader or font: tracked only for validation and leaks.
struct HostObject {
    kind: &'static str,
}

#[derive(Default)]
struct NullState {
    objects: Slab<HostObject>,
    contexts: Slab<NullContext>,
    buffers: Slab<NullBuffer>,
    fences: Slab<Arc<FenceTimeline>>,
    images: Slab<Arc<ImageData>>,
    surfaces: Slab<NullSurface>,
}

pub struct NullBackend {
    state: Mutex<NullState>,
    queue: Queue,
}

impl NullBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            state: Mutex::new(NullState::default()),
            queue: Queue::spawn()?,
        })
    }

    fn state(&self) -> MutexGuard<'_, NullState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_object(&self, context: RawHandle, kind: &'static str) -> Result<RawHandle> {
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        Ok(state.objects.insert(HostObject { kind }))
    }

    fn release_object(&self, raw: RawHandle, kind: &'static str) {
        let mut state = self.state();
        match state.objects.remove(raw) {
            Some(obj) if obj.kind == kind => {}
            Some(obj) => log::error!(
                "null backend released {} {} as a {kind}",
                obj.kind,
                raw.get()
            ),
            None => log::error!("null backend asked to release unknown {kind} {}", raw.get()),
        }
    }

    fn release<T>(slab: &mut Slab<T>, raw: RawHandle, what: &str) {
        if slab.remove(raw).is_none() {
            log::error!("null backend asked to release unknown {what} {}", raw.get());
        }
    }
}

impl Backend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::Null,
            features: FeatureFlags::HEADLESS_SUPPORTED,
            max_buffer_size: MAX_BUFFER_SIZE,
            max_texture_dimension: MAX_TEXTURE_DIMENSION,
            max_texture_array_layers: 1,
            max_sampler_anisotropy: 1.0,
            supports_hdr: false,
            supports_presentation: true,
        }
    }

    fn create_context(&self, width: u32, height: u32) -> Result<RawHandle> {
        let context = NullContext {
            width,
            height,
            framebuffer: Arc::new(Mutex::new(Canvas::new(width, height))),
            recording: false,
            last_work: 0,
        };
        Ok(self.state().contexts.insert(context))
    }

    fn resize_context(&self, context: RawHandle, width: u32, height: u32) -> Result<()> {
        let mut state = self.state();
        let ctx = state.contexts.get_mut(context, "context")?;
        ctx.width = width;
        ctx.height = height;
        Ok(())
    }

    fn release_context(&self, context: RawHandle) {
        Self::release(&mut self.state().contexts, context, "context");
    }

    fn begin_frame(&self, context: RawHandle, frame: &FrameInfo) -> Result<()> {
        let mut state = self.state();
        let ctx = state.contexts.get_mut(context, "context")?;
        ctx.width = frame.width;
        ctx.height = frame.height;
        ctx.recording = true;
        Ok(())
    }

    fn end_frame(&self, context: RawHandle) -> Result<()> {
        let mut state = self.state();
        state.contexts.get_mut(context, "context")?.recording = false;
        Ok(())
    }

    fn submit(&self, context: RawHandle, batch: FrameBatch) -> Result<()> {
        let mut state = self.state();
        let ops = {
            let buffers = &state.buffers;
            batch
                .commands
                .iter()
                .map(|cmd| {
                    RasterOp::resolve(cmd, |raw| Ok(buffers.get(raw, "buffer")?.data.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };
        let ctx = state.contexts.get_mut(context, "context")?;
        let seq = self.queue.push(Work::Frame {
            target: Arc::clone(&ctx.framebuffer),
            width: batch.info.width,
            height: batch.info.height,
            ops,
        })?;
        ctx.last_work = seq;
        Ok(())
    }

    fn read_framebuffer(&self, context: RawHandle, dst: &mut [u8]) -> Result<()> {
        let (target, seq, width, height) = {
            let state = self.state();
            let ctx = state.contexts.get(context, "context")?;
            (Arc::clone(&ctx.framebuffer), ctx.last_work, ctx.width, ctx.height)
        };
        self.queue.wait_retired(seq)?;

        let len = width as usize * height as usize * 4;
        let dst = dst
            .get_mut(..len)
            .ok_or_else(|| Error::invalid_parameter("framebuffer destination too small"))?;
        let canvas = target.lock().unwrap_or_else(PoisonError::into_inner);
        if canvas.width() == width && canvas.height() == height {
            dst.copy_from_slice(canvas.pixels());
        } else {
            // Resized since the last executed frame.
            dst.fill(0);
        }
        Ok(())
    }

    fn create_fence(&self) -> Result<RawHandle> {
        Ok(self.state().fences.insert(Arc::new(FenceTimeline::default())))
    }

    fn release_fence(&self, fence: RawHandle) {
        Self::release(&mut self.state().fences, fence, "fence");
    }

    fn signal_fence(&self, context: RawHandle, fence: RawHandle, value: u64) -> Result<()> {
        let state = self.state();
        state.contexts.get(context, "context")?;
        let timeline = Arc::clone(state.fences.get(fence, "fence")?);
        self.queue.push(Work::Signal { timeline, value })?;
        Ok(())
    }

    fn fence_completed_value(&self, fence: RawHandle) -> Result<u64> {
        Ok(self.state().fences.get(fence, "fence")?.completed())
    }

    fn wait_fence(&self, fence: RawHandle, value: u64, timeout: Option<Duration>) -> Result<bool> {
        let timeline = Arc::clone(self.state().fences.get(fence, "fence")?);
        Ok(timeline.wait(value, timeout))
    }

    fn create_buffer(
        &self,
        context: RawHandle,
        ty: BufferType,
        flags: BufferFlags,
        size: usize,
    ) -> Result<RawHandle> {
        if size as u64 > MAX_BUFFER_SIZE {
            return Err(Error::OutOfMemory(format!(
                "{size} byte buffer exceeds the {MAX_BUFFER_SIZE} byte limit"
            )));
        }
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        log::trace!("null {ty:?} buffer of {size} bytes ({flags:?})");
        Ok(state.buffers.insert(NullBuffer {
            data: vec![0; size],
            mapped: false,
        }))
    }

    fn release_buffer(&self, buffer: RawHandle) {
        Self::release(&mut self.state().buffers, buffer, "buffer");
    }

    fn write_buffer(&self, buffer: RawHandle, offset: usize, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let buf = state.buffers.get_mut(buffer, "buffer")?;
        let size = buf.data.len();
        let dst = offset
            .checked_add(data.len())
            .and_then(|end| buf.data.get_mut(offset..end))
            .ok_or(Error::OutOfBounds {
                offset,
                len: data.len(),
                size,
            })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn map_buffer(&self, buffer: RawHandle, flags: MapFlags) -> Result<Vec<u8>> {
        let mut state = self.state();
        let buf = state.buffers.get_mut(buffer, "buffer")?;
        if buf.mapped {
            return Err(Error::invalid_parameter("buffer is already mapped"));
        }
        buf.mapped = true;
        if flags.intersects(MapFlags::INVALIDATE_RANGE | MapFlags::DISCARD_RANGE) {
            Ok(vec![0; buf.data.len()])
        } else {
            Ok(buf.data.clone())
        }
    }

    fn unmap_buffer(&self, buffer: RawHandle, staging: &[u8], written: usize) -> Result<()> {
        let mut state = self.state();
        let buf = state.buffers.get_mut(buffer, "buffer")?;
        if !buf.mapped {
            return Err(Error::invalid_parameter("buffer is not mapped"));
        }
        buf.mapped = false;
        let n = written.min(staging.len()).min(buf.data.len());
        buf.data[..n].copy_from_slice(&staging[..n]);
        Ok(())
    }

    fn create_image(&self, context: RawHandle, image: &Arc<ImageData>) -> Result<RawHandle> {
        if image.width > MAX_TEXTURE_DIMENSION || image.height > MAX_TEXTURE_DIMENSION {
            return Err(Error::unsupported(format!(
                "{}x{} image exceeds the {MAX_TEXTURE_DIMENSION} texel limit",
                image.width, image.height
            )));
        }
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        Ok(state.images.insert(Arc::clone(image)))
    }

    fn release_image(&self, image: RawHandle) {
        Self::release(&mut self.state().images, image, "image");
    }

    fn create_renderer(&self, context: RawHandle) -> Result<RawHandle> {
        self.create_object(context, "renderer")
    }

    fn release_renderer(&self, renderer: RawHandle) {
        self.release_object(renderer, "renderer");
    }

    fn create_path(&self, context: RawHandle) -> Result<RawHandle> {
        self.create_object(context, "path")
    }

    fn release_path(&self, path: RawHandle) {
        self.release_object(path, "path");
    }

    fn create_paint(&self, context: RawHandle) -> Result<RawHandle> {
        self.create_object(context, "paint")
    }

    fn release_paint(&self, paint: RawHandle) {
        self.release_object(paint, "paint");
    }

    fn create_shader(&self, context: RawHandle, _gradient: &Gradient) -> Result<RawHandle> {
        self.create_object(context, "shader")
    }

    fn release_shader(&self, shader: RawHandle) {
        self.release_object(shader, "shader");
    }

    fn create_font(&self, context: RawHandle, _data: &[u8]) -> Result<RawHandle> {
        self.create_object(context, "font")
    }

    fn release_font(&self, font: RawHandle) {
        self.release_object(font, "font");
    }

    fn create_surface(
        &self,
        context: RawHandle,
        target: &SurfaceTarget,
        config: &SurfaceConfig,
    ) -> Result<RawHandle> {
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        log::debug!(
            "null swapchain for {target:?}: {}x{}, {} buffers",
            config.width,
            config.height,
            config.buffer_count
        );
        Ok(state.surfaces.insert(NullSurface {
            context,
            width: config.width,
            height: config.height,
            presented: 0,
        }))
    }

    fn resize_surface(&self, surface: RawHandle, width: u32, height: u32) -> Result<()> {
        let mut state = self.state();
        let s = state.surfaces.get_mut(surface, "surface")?;
        s.width = width;
        s.height = height;
        Ok(())
    }

    fn present(&self, surface: RawHandle, interval: u32, flags: PresentFlags) -> Result<()> {
        let seq = {
            let state = self.state();
            let s = state.surfaces.get(surface, "surface")?;
            state.contexts.get(s.context, "context")?.last_work
        };
        // The back buffer is shown once the frame that drew it has executed.
        self.queue.wait_retired(seq)?;

        let mut state = self.state();
        let s = state.surfaces.get_mut(surface, "surface")?;
        s.presented += 1;
        log::trace!(
            "null present #{} {}x{} interval {interval} {flags:?}",
            s.presented,
            s.width,
            s.height
        );
        Ok(())
    }

    fn release_surface(&self, surface: RawHandle) {
        Self::release(&mut self.state().surfaces, surface, "surface");
    }
}

impl Drop for NullBackend {
    fn drop(&mut self) {
        let state = self.state();
        let leaked = state.objects.len()
            + state.contexts.len()
            + state.buffers.len()
            + state.fences.len()
            + state.images.len()
            + state.surfaces.len();
        if leaked > 0 {
            log::error!("null device dropped with {leaked} live objects");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_then_fill() {
        let provider = NullProvider;
        assert_eq!(provider.enumerate_adapters(&mut []).unwrap(), 1);
        let mut out = vec![AdapterInfo::default(); 3];
        assert_eq!(provider.enumerate_adapters(&mut out).unwrap(), 1);
        assert_eq!(out[0].name, "Null Renderer");
        assert_eq!(out[0].vendor_id, 0xffff);
        assert_eq!(out[1], AdapterInfo::default());
    }

    #[test]
    fn second_adapter_is_invalid() {
        let err = NullProvider.open(1, DeviceFlags::empty()).err().unwrap();
        assert_eq!(err.status(), crate::error::Status::InvalidParameter);
    }

    #[test]
    fn mapping_is_exclusive_and_discard_zeroes() {
        let backend = NullBackend::new().unwrap();
        let ctx = backend.create_context(4, 4).unwrap();
        let buf = backend
            .create_buffer(ctx, BufferType::Vertex, BufferFlags::empty(), 4)
            .unwrap();
        backend.write_buffer(buf, 0, &[1, 2, 3, 4]).unwrap();

        let staging = backend.map_buffer(buf, MapFlags::empty()).unwrap();
        assert_eq!(staging, vec![1, 2, 3, 4]);
        assert!(backend.map_buffer(buf, MapFlags::empty()).is_err());
        backend.unmap_buffer(buf, &[9, 9, 9, 9], 2).unwrap();
        assert!(backend.unmap_buffer(buf, &[], 0).is_err());

        assert_eq!(backend.map_buffer(buf, MapFlags::empty()).unwrap(), vec![9, 9, 3, 4]);
        backend.unmap_buffer(buf, &[], 0).unwrap();
        assert_eq!(backend.map_buffer(buf, MapFlags::DISCARD_RANGE).unwrap(), vec![0; 4]);
        backend.unmap_buffer(buf, &[], 0).unwrap();

        backend.release_buffer(buf);
        backend.release_context(ctx);
    }

    #[test]
    fn host_objects_need_a_live_context() {
        let backend = NullBackend::new().unwrap();
        let ctx = backend.create_context(4, 4).unwrap();
        let path = backend.create_path(ctx).unwrap();
        let font = backend.create_font(ctx, &[1, 2, 3]).unwrap();
        assert_ne!(path, font);
        assert_eq!(backend.state().objects.len(), 2);

        backend.release_path(path);
        backend.release_font(font);
        backend.release_context(ctx);
        assert_eq!(backend.state().objects.len(), 0);
        let err = backend.create_paint(ctx).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InvalidHandle);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let backend = NullBackend::new().unwrap();
        let err = backend.resize_context(RawHandle::new(42), 1, 1).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InvalidHandle);
    }
}
