use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{DrawCommand, FrameBatch, RawHandle};
use crate::device::DeviceShared;
use crate::error::{Error, Result};
use crate::handle::{Registration, ResourceId, ResourceKind};
use crate::time::{FrameClock, FrameTime};

/// Observable frame phase of a context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    Recording,
    Closed,
}

pub(crate) enum FrameState {
    Idle,
    Recording(FrameBatch),
    Closed(FrameBatch),
}

impl FrameState {
    pub(crate) fn phase(&self) -> FramePhase {
        match self {
            FrameState::Idle => FramePhase::Idle,
            FrameState::Recording(_) => FramePhase::Recording,
            FrameState::Closed(_) => FramePhase::Closed,
        }
    }
}

pub(crate) struct ContextState {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) frame: FrameState,
    /// Frames begun so far; identifies the current frame to renderers.
    pub(crate) frame_serial: u64,
    pub(crate) submitted: u64,
    pub(crate) clock: FrameClock,
    pub(crate) last_frame_time: Option<FrameTime>,
    pub(crate) surface: Option<ResourceId>,
}

pub(crate) struct ContextInner {
    reg: Registration,
    raw: RawHandle,
    device: Arc<DeviceShared>,
    state: Mutex<ContextState>,
    public_handles: AtomicUsize,
}

impl ContextInner {
    pub(crate) fn new(device: &Arc<DeviceShared>, width: u32, height: u32) -> Result<Arc<Self>> {
        let raw = device.create("context", |b| b.create_context(width, height))?;
        let reg = match device.register(ResourceKind::Context, device.id(), raw) {
            Ok(reg) => reg,
            Err(e) => {
                device.backend().release_context(raw);
                return Err(e);
            }
        };
        log::debug!("context #{} created at {width}x{height}", reg.id().get());

        Ok(Arc::new(Self {
            reg,
            raw,
            device: Arc::clone(device),
            state: Mutex::new(ContextState {
                width,
                height,
                frame: FrameState::Idle,
                frame_serial: 0,
                submitted: 0,
                clock: FrameClock::new(),
                last_frame_time: None,
                surface: None,
            }),
            public_handles: AtomicUsize::new(0),
        }))
    }

    #[inline]
    pub(crate) fn id(&self) -> ResourceId {
        self.reg.id()
    }

    #[inline]
    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    #[inline]
    pub(crate) fn device(&self) -> &Arc<DeviceShared> {
        &self.device
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire_public(&self) {
        self.public_handles.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns true when the last public handle went away.
    pub(crate) fn release_public(&self) -> bool {
        self.public_handles.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Updates the logical size. Rejected while a frame is recording.
    pub(crate) fn resize(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameter("context dimensions must be non-zero"));
        }
        let mut state = self.state();
        if matches!(state.frame, FrameState::Recording(_)) {
            return Err(Error::invalid_parameter("cannot resize while a frame is active"));
        }
        if (state.width, state.height) != (width, height) {
            let raw = self.raw;
            self.device.call(|b| b.resize_context(raw, width, height))?;
            state.width = width;
            state.height = height;
            log::debug!("context #{} resized to {width}x{height}", self.id().get());
        }
        Ok(())
    }

    /// Serial of the frame being recorded.
    pub(crate) fn recording_serial(&self) -> Result<u64> {
        let state = self.state();
        match state.frame {
            FrameState::Recording(_) => Ok(state.frame_serial),
            _ => Err(Error::invalid_parameter(
                "draw calls require a frame begun with begin_frame",
            )),
        }
    }

    pub(crate) fn record(&self, cmd: DrawCommand) -> Result<()> {
        let mut state = self.state();
        match &mut state.frame {
            FrameState::Recording(batch) => {
                batch.commands.push(cmd);
                Ok(())
            }
            _ => Err(Error::invalid_parameter(
                "draw calls require a frame begun with begin_frame",
            )),
        }
    }

    #[cfg(test)]
    pub(crate) fn recorded_len(&self) -> usize {
        match &self.state().frame {
            FrameState::Recording(batch) | FrameState::Closed(batch) => batch.commands.len(),
            FrameState::Idle => 0,
        }
    }

    /// Drops any open or unsubmitted frame.
    pub(crate) fn discard_frame(&self, why: &str) {
        let discarded = {
            let mut state = self.state();
            std::mem::replace(&mut state.frame, FrameState::Idle)
        };
        if let FrameState::Recording(batch) | FrameState::Closed(batch) = discarded {
            log::warn!(
                "context #{}: discarding frame {} with {} commands ({why})",
                self.id().get(),
                batch.info.frame_index,
                batch.commands.len()
            );
        }
    }

    pub(crate) fn same_context(&self, other: &ContextInner) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.device.backend().release_context(self.raw);
        log::debug!("context #{} released", self.reg.id().get());
    }
}
