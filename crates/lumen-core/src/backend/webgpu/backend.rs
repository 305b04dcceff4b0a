use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context as _;

use super::provider::adapter_info;
use crate::backend::{
    AdapterInfo, Backend, BackendKind, Capabilities, DeviceFlags, FeatureFlags, FenceTimeline,
    FrameBatch, FrameInfo, RawHandle, Slab,
};
use crate::error::{Error, Result};
use crate::raster::{self, Canvas, RasterOp};
use crate::resource::{BufferFlags, BufferType, ImageData, MapFlags};

/// Poll interval while blocking on a fence.
const WAIT_SLICE: Duration = Duration::from_millis(1);

struct WgpuContext {
    canvas: Canvas,
    target: wgpu::Texture,
}

struct WgpuBuffer {
    gpu: wgpu::Buffer,
    /// CPU copy read by the rasterizer.
    shadow: Vec<u8>,
    mapped: bool,
}

struct WgpuImage {
    _texture: wgpu::Texture,
}

#[derive(Default)]
struct WgpuState {
    contexts: Slab<WgpuContext>,
    buffers: Slab<WgpuBuffer>,
    fences: Slab<Arc<FenceTimeline>>,
    images: Slab<WgpuImage>,
}

/// One wgpu device and queue.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: AdapterInfo,
    limits: wgpu::Limits,
    lost: Arc<Mutex<Option<String>>>,
    state: Mutex<WgpuState>,
}

fn target_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen context target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, pixels: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Rounds `[start, end)` outward to the copy alignment, clamped to `size`.
fn aligned_span(start: usize, end: usize, size: usize) -> (usize, usize) {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    let lo = start / align * align;
    let hi = end.div_ceil(align) * align;
    (lo, hi.min(size))
}

impl WgpuBackend {
    pub(super) async fn new(adapter: &wgpu::Adapter, flags: DeviceFlags) -> anyhow::Result<Self> {
        // The adapter's own limits are always satisfiable.
        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            let mut lost = flag.lock().unwrap_or_else(PoisonError::into_inner);
            *lost = Some(format!("{reason:?}: {message}"));
        });

        let adapter = adapter_info(adapter);
        log::debug!("opened wgpu device on '{}' ({flags:?})", adapter.name);
        Ok(Self {
            limits: device.limits(),
            device,
            queue,
            adapter,
            lost,
            state: Mutex::new(WgpuState::default()),
        })
    }

    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    fn state(&self) -> MutexGuard<'_, WgpuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release<T>(slab: &mut Slab<T>, raw: RawHandle, what: &str) {
        if slab.remove(raw).is_none() {
            log::error!("wgpu backend asked to release unknown {what} {}", raw.get());
        }
    }

    fn check_lost(&self) -> Result<()> {
        match &*self.lost.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(reason) => Err(Error::DeviceLost(reason.clone())),
            None => Ok(()),
        }
    }

    /// Drives pending callbacks without blocking.
    fn pump(&self) -> Result<()> {
        self.device.poll(wgpu::PollType::Poll).map(drop).map_err(|e| {
            log::warn!("wgpu poll failed: {e}");
            Error::internal(format!("device poll failed: {e}"))
        })
    }

    fn flush(&self) {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen frame encoder"),
            });
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl Backend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WebGpu
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            backend: BackendKind::WebGpu,
            features: FeatureFlags::HEADLESS_SUPPORTED,
            max_buffer_size: self.limits.max_buffer_size,
            max_texture_dimension: self.limits.max_texture_dimension_2d,
            max_texture_array_layers: self.limits.max_texture_array_layers,
            max_sampler_anisotropy: 16.0,
            supports_hdr: false,
            supports_presentation: false,
        }
    }

    fn create_context(&self, width: u32, height: u32) -> Result<RawHandle> {
        self.check_lost()?;
        let target = target_texture(&self.device, width, height);
        Ok(self.state().contexts.insert(WgpuContext {
            canvas: Canvas::new(width, height),
            target,
        }))
    }

    fn resize_context(&self, context: RawHandle, width: u32, height: u32) -> Result<()> {
        let mut state = self.state();
        let ctx = state.contexts.get_mut(context, "context")?;
        ctx.canvas.reset(width, height);
        ctx.target = target_texture(&self.device, width, height);
        Ok(())
    }

    fn release_context(&self, context: RawHandle) {
        Self::release(&mut self.state().contexts, context, "context");
    }

    fn begin_frame(&self, context: RawHandle, frame: &FrameInfo) -> Result<()> {
        self.check_lost()?;
        let state = self.state();
        state.contexts.get(context, "context")?;
        log::trace!("wgpu frame {} begins", frame.frame_index);
        Ok(())
    }

    fn submit(&self, context: RawHandle, batch: FrameBatch) -> Result<()> {
        self.check_lost()?;
        let mut state = self.state();
        let ops = {
            let buffers = &state.buffers;
            batch
                .commands
                .iter()
                .map(|cmd| {
                    RasterOp::resolve(cmd, |raw| {
                        buffers.get(raw, "buffer").map(|b| b.shadow.clone())
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };
        let ctx = state.contexts.get_mut(context, "context")?;
        ctx.canvas.reset(batch.info.width, batch.info.height);
        raster::render(&mut ctx.canvas, &ops);
        write_rgba(
            &self.queue,
            &ctx.target,
            ctx.canvas.width(),
            ctx.canvas.height(),
            ctx.canvas.pixels(),
        );
        drop(state);
        self.flush();
        Ok(())
    }

    fn create_fence(&self) -> Result<RawHandle> {
        Ok(self.state().fences.insert(Arc::new(FenceTimeline::default())))
    }

    fn release_fence(&self, fence: RawHandle) {
        Self::release(&mut self.state().fences, fence, "fence");
    }

    fn signal_fence(&self, context: RawHandle, fence: RawHandle, value: u64) -> Result<()> {
        self.check_lost()?;
        let timeline = {
            let state = self.state();
            state.contexts.get(context, "context")?;
            Arc::clone(state.fences.get(fence, "fence")?)
        };
        self.queue
            .on_submitted_work_done(move || timeline.complete(value));
        self.flush();
        Ok(())
    }

    fn fence_completed_value(&self, fence: RawHandle) -> Result<u64> {
        self.pump()?;
        Ok(self.state().fences.get(fence, "fence")?.completed())
    }

    fn wait_fence(&self, fence: RawHandle, value: u64, timeout: Option<Duration>) -> Result<bool> {
        let timeline = Arc::clone(self.state().fences.get(fence, "fence")?);
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            self.pump()?;
            if timeline.wait(value, Some(Duration::ZERO)) {
                return Ok(true);
            }
            self.check_lost()?;
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }
            timeline.wait(value, Some(WAIT_SLICE));
        }
    }

    fn create_buffer(
        &self,
        context: RawHandle,
        ty: BufferType,
        flags: BufferFlags,
        size: usize,
    ) -> Result<RawHandle> {
        self.check_lost()?;
        if size as u64 > self.limits.max_buffer_size {
            return Err(Error::OutOfMemory(format!(
                "{size} byte buffer exceeds the {} byte limit",
                self.limits.max_buffer_size
            )));
        }
        let usage = match ty {
            BufferType::Index => wgpu::BufferUsages::INDEX,
            BufferType::Vertex => wgpu::BufferUsages::VERTEX,
        } | wgpu::BufferUsages::COPY_DST;
        let gpu = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen render buffer"),
            size: (size as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage,
            mapped_at_creation: false,
        });
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        log::trace!("wgpu {ty:?} buffer of {size} bytes ({flags:?})");
        Ok(state.buffers.insert(WgpuBuffer {
            gpu,
            shadow: vec![0; size],
            mapped: false,
        }))
    }

    fn release_buffer(&self, buffer: RawHandle) {
        Self::release(&mut self.state().buffers, buffer, "buffer");
    }

    fn write_buffer(&self, buffer: RawHandle, offset: usize, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let buf = state.buffers.get_mut(buffer, "buffer")?;
        let size = buf.shadow.len();
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= size)
            .ok_or(Error::OutOfBounds {
                offset,
                len: data.len(),
                size,
            })?;
        buf.shadow[offset..end].copy_from_slice(data);

        let (lo, hi) = aligned_span(offset, end, size);
        let mut span = buf.shadow[lo..hi].to_vec();
        span.resize(span.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize), 0);
        self.queue.write_buffer(&buf.gpu, lo as u64, &span);
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
            Ok(vec![0; buf.shadow.len()])
        } else {
            Ok(buf.shadow.clone())
        }
    }

    fn unmap_buffer(&self, buffer: RawHandle, staging: &[u8], written: usize) -> Result<()> {
        {
            let mut state = self.state();
            let buf = state.buffers.get_mut(buffer, "buffer")?;
            if !buf.mapped {
                return Err(Error::invalid_parameter("buffer is not mapped"));
            }
            buf.mapped = false;
        }
        let n = written.min(staging.len());
        if n == 0 {
            return Ok(());
        }
        self.write_buffer(buffer, 0, &staging[..n])
    }

    fn create_image(&self, context: RawHandle, image: &Arc<ImageData>) -> Result<RawHandle> {
        self.check_lost()?;
        let max = self.limits.max_texture_dimension_2d;
        if image.width > max || image.height > max {
            return Err(Error::unsupported(format!(
                "{}x{} image exceeds the {max} texel limit",
                image.width, image.height
            )));
        }
        let texture = target_texture(&self.device, image.width, image.height);
        write_rgba(&self.queue, &texture, image.width, image.height, image.pixels());
        let mut state = self.state();
        state.contexts.get(context, "context")?;
        Ok(state.images.insert(WgpuImage { _texture: texture }))
    }

    fn release_image(&self, image: RawHandle) {
        Self::release(&mut self.state().images, image, "image");
    }

    fn poll(&self) -> Result<()> {
        self.check_lost()?;
        self.pump()
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        let state = self.state();
        let leaked = state.contexts.len()
            + state.buffers.len()
            + state.fences.len()
            + state.images.len();
        if leaked > 0 {
            log::error!("wgpu device dropped with {leaked} live objects");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_round_to_copy_alignment() {
        assert_eq!(aligned_span(5, 6, 16), (4, 8));
        assert_eq!(aligned_span(0, 10, 10), (0, 10));
        assert_eq!(aligned_span(8, 8, 16), (8, 8));
    }
}
