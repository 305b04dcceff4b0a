//! Rendering contexts and the frame state machine.
//!
//! ```text
//! Idle --begin_frame--> Recording --end_frame--> Closed --submit--> Idle
//! ```
//!
//! BeginFrame from `Closed` discards the unsubmitted frame. Submit enqueues
//! the frame on the backend and returns without waiting for it.

mod options;
mod state;

use std::fmt;
use std::sync::Arc;

pub use options::FrameOptions;
pub use state::FramePhase;

pub(crate) use state::ContextInner;
use state::FrameState;

use crate::backend::{FrameBatch, FrameInfo};
use crate::coords::Vec2;
use crate::device::Device;
use crate::error::{Error, Recorded, Result};
use crate::fence::Fence;
use crate::paint::FillRule;
use crate::render::Renderer;
use crate::resource::{
    BufferFlags, BufferType, Font, Image, ImageData, Paint, Path, RenderBuffer, Shader, TextStyle,
};
use crate::time::FrameTime;

/// A drawing context bound to a device. Clones share the context.
///
/// The backend context lives until the last handle, surface, renderer and
/// resource created from it are dropped. When the last `Context` handle is
/// dropped, an open or unsubmitted frame is discarded.
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self::from_inner(Arc::clone(&self.inner))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.inner.release_public() {
            self.inner.discard_frame("last context handle dropped");
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Context")
            .field("id", &self.inner.id().get())
            .field("size", &(state.width, state.height))
            .field("phase", &state.frame.phase())
            .finish()
    }
}

impl Context {
    pub fn create(device: &Device, width: u32, height: u32) -> Result<Context> {
        let result = if width == 0 || height == 0 {
            Err(Error::invalid_parameter("context dimensions must be non-zero"))
        } else {
            ContextInner::new(device.shared(), width, height).map(Self::from_inner)
        };
        result.recorded()
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        inner.acquire_public();
        Self { inner }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &Arc<ContextInner> {
        &self.inner
    }

    pub fn device(&self) -> Device {
        Device::from_shared(Arc::clone(self.inner.device()))
    }

    pub fn size(&self) -> (u32, u32) {
        let state = self.inner.state();
        (state.width, state.height)
    }

    pub fn phase(&self) -> FramePhase {
        self.inner.state().frame.phase()
    }

    /// Number of frames begun on this context.
    pub fn frame_index(&self) -> u64 {
        self.inner.state().frame_serial
    }

    pub fn submitted_frames(&self) -> u64 {
        self.inner.state().submitted
    }

    pub fn last_frame_time(&self) -> Option<FrameTime> {
        self.inner.state().last_frame_time
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.inner.resize(width, height).recorded()
    }

    pub fn begin_frame(&self, options: FrameOptions) -> Result<()> {
        self.begin_frame_inner(options).recorded()
    }

    fn begin_frame_inner(&self, options: FrameOptions) -> Result<()> {
        let device = self.inner.device();
        device.check()?;

        let mut state = self.inner.state();
        let discarded = match std::mem::replace(&mut state.frame, FrameState::Idle) {
            FrameState::Recording(batch) => {
                state.frame = FrameState::Recording(batch);
                return Err(Error::invalid_parameter(
                    "begin_frame called while a frame is recording",
                ));
            }
            FrameState::Closed(batch) => {
                log::warn!(
                    "context #{}: frame {} was ended but never submitted; discarding",
                    self.inner.id().get(),
                    batch.info.frame_index
                );
                Some(batch)
            }
            FrameState::Idle => None,
        };

        let width = if options.width == 0 { state.width } else { options.width };
        let height = if options.height == 0 { state.height } else { options.height };
        let raw = self.inner.raw();
        if (width, height) != (state.width, state.height) {
            device.call(|b| b.resize_context(raw, width, height))?;
            state.width = width;
            state.height = height;
        }

        let time = state.clock.tick();
        let delta_time_ms = if options.delta_time_ms > 0.0 && options.delta_time_ms.is_finite() {
            options.delta_time_ms
        } else {
            time.dt_ms()
        };
        let info = FrameInfo {
            width,
            height,
            delta_time_ms,
            vsync: options.vsync,
            frame_index: state.frame_serial,
        };
        device.call(|b| b.begin_frame(raw, &info))?;

        state.frame = FrameState::Recording(FrameBatch::new(info));
        state.frame_serial += 1;
        state.last_frame_time = Some(time);
        drop(state);
        drop(discarded);
        Ok(())
    }

    pub fn end_frame(&self) -> Result<()> {
        self.end_frame_inner().recorded()
    }

    fn end_frame_inner(&self) -> Result<()> {
        let device = self.inner.device();
        device.check()?;

        let mut state = self.inner.state();
        let batch = match std::mem::replace(&mut state.frame, FrameState::Idle) {
            FrameState::Recording(batch) => batch,
            other => {
                state.frame = other;
                return Err(Error::invalid_parameter(
                    "begin_frame must be called before end_frame",
                ));
            }
        };
        let raw = self.inner.raw();
        state.frame = FrameState::Closed(batch);
        device.call(|b| b.end_frame(raw))
    }

    pub fn submit(&self) -> Result<()> {
        self.submit_inner().recorded()
    }

    fn submit_inner(&self) -> Result<()> {
        let device = self.inner.device();
        device.check()?;

        let batch = {
            let mut state = self.inner.state();
            match std::mem::replace(&mut state.frame, FrameState::Idle) {
                FrameState::Closed(batch) => {
                    state.submitted += 1;
                    batch
                }
                other => {
                    state.frame = other;
                    return Err(Error::invalid_parameter(
                        "end_frame must be called before submit",
                    ));
                }
            }
        };
        log::trace!(
            "context #{}: submitting frame {} ({} commands)",
            self.inner.id().get(),
            batch.info.frame_index,
            batch.commands.len()
        );
        let raw = self.inner.raw();
        device.call(|b| b.submit(raw, batch))
    }

    /// Copies the last executed frame as premultiplied RGBA8 rows.
    ///
    /// Waits for work already submitted on this context to finish.
    pub fn copy_cpu_framebuffer(&self, dst: &mut [u8]) -> Result<()> {
        self.copy_cpu_framebuffer_inner(dst).recorded()
    }

    fn copy_cpu_framebuffer_inner(&self, dst: &mut [u8]) -> Result<()> {
        let (width, height) = self.size();
        let needed = width as usize * height as usize * 4;
        if dst.len() < needed {
            return Err(Error::invalid_parameter(format!(
                "framebuffer copy needs {needed} bytes, got {}",
                dst.len()
            )));
        }
        let raw = self.inner.raw();
        self.inner
            .device()
            .call(|b| b.read_framebuffer(raw, &mut dst[..needed]))
    }

    /// Schedules `fence` to reach `value` once all work submitted so far completes.
    ///
    /// `value == 0` signals one past the last signaled value. Returns the value used.
    pub fn signal(&self, fence: &Fence, value: u64) -> Result<u64> {
        fence.signal_from(self, value).recorded()
    }

    pub fn create_renderer(&self) -> Result<Renderer> {
        Renderer::create(self).recorded()
    }

    pub fn create_path(&self, fill_rule: FillRule) -> Result<Path> {
        Path::create(self, fill_rule).recorded()
    }

    pub fn create_paint(&self) -> Result<Paint> {
        Paint::create(self).recorded()
    }

    pub fn create_buffer(&self, ty: BufferType, flags: BufferFlags, size: usize) -> Result<RenderBuffer> {
        RenderBuffer::create(self, ty, flags, size).recorded()
    }

    /// Creates a buffer sized to `data` and uploads it.
    pub fn create_buffer_init(&self, ty: BufferType, flags: BufferFlags, data: &[u8]) -> Result<RenderBuffer> {
        RenderBuffer::create_init(self, ty, flags, data).recorded()
    }

    pub fn decode_image(&self, bytes: &[u8]) -> Result<Image> {
        Image::decode(self, bytes).recorded()
    }

    /// Uploads already decoded pixels.
    pub fn create_image(&self, data: ImageData) -> Result<Image> {
        Image::upload(self, data).recorded()
    }

    pub fn decode_font(&self, bytes: &[u8]) -> Result<Font> {
        Font::decode(self, bytes).recorded()
    }

    /// Lays out `text` and returns its glyph outlines as a path.
    pub fn create_text_path(
        &self,
        font: &Font,
        text: &str,
        style: &TextStyle,
        fill_rule: FillRule,
    ) -> Result<Path> {
        Path::from_text(self, font, text, style, fill_rule).recorded()
    }

    /// Linear gradient from packed `0xAARRGGBB` colors and matching stop offsets.
    pub fn linear_gradient(&self, start: Vec2, end: Vec2, colors: &[u32], stops: &[f32]) -> Result<Shader> {
        Shader::linear(self, start, end, colors, stops).recorded()
    }

    pub fn radial_gradient(&self, center: Vec2, radius: f32, colors: &[u32], stops: &[f32]) -> Result<Shader> {
        Shader::radial(self, center, radius, colors, stops).recorded()
    }
}
