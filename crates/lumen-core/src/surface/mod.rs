//! Presentation surfaces.
//!
//! A surface binds a context to a platform window or layer. It keeps the
//! context's backend object alive, so a context handle may be dropped while
//! its surface is still presenting.

mod desc;
mod target;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use desc::{PresentFlags, SurfaceConfig, SurfaceDesc, SurfaceFlags};
pub use target::SurfaceTarget;

use crate::backend::{BackendKind, RawHandle};
use crate::context::{Context, ContextInner, FramePhase};
use crate::error::{Error, Recorded, Result};
use crate::handle::{Registration, ResourceId, ResourceKind};

struct SurfaceInner {
    reg: Registration,
    raw: RawHandle,
    ctx: Arc<ContextInner>,
    target: SurfaceTarget,
    config: Mutex<SurfaceConfig>,
    presents: AtomicU64,
}

impl Drop for SurfaceInner {
    fn drop(&mut self) {
        self.ctx.device().backend().release_surface(self.raw);
        let mut state = self.ctx.state();
        if state.surface == Some(self.reg.id()) {
            state.surface = None;
        }
        log::debug!("surface #{} released", self.reg.id().get());
    }
}

/// A swapchain bound to a context.
#[derive(Clone)]
pub struct Surface {
    inner: Arc<SurfaceInner>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.inner.reg.id().get())
            .field("target", &self.inner.target)
            .field("config", &self.config())
            .finish()
    }
}

impl Surface {
    pub fn create(context: &Context, target: SurfaceTarget, desc: SurfaceDesc) -> Result<Surface> {
        Self::create_inner(context, target, desc).recorded()
    }

    fn create_inner(context: &Context, target: SurfaceTarget, desc: SurfaceDesc) -> Result<Surface> {
        if target.is_null() {
            return Err(Error::NullPointer(format!("{target:?} has a null handle")));
        }
        if !target.host_supported() {
            return Err(Error::unsupported(format!(
                "{} surfaces are not available on {}",
                target.backend(),
                std::env::consts::OS
            )));
        }
        let ctx = context.inner();
        let device = ctx.device();
        let caps = device.caps();
        if !caps.supports_presentation {
            return Err(Error::unsupported(format!(
                "{} backend cannot present",
                caps.backend
            )));
        }
        if caps.backend != BackendKind::Null && caps.backend != target.backend() {
            return Err(Error::unsupported(format!(
                "{} device cannot present into a {} target",
                caps.backend,
                target.backend()
            )));
        }

        let mut state = ctx.state();
        if let Some(existing) = state.surface {
            return Err(Error::invalid_parameter(format!(
                "context already has surface #{}",
                existing.get()
            )));
        }
        let config = SurfaceConfig::resolve(&desc, (state.width, state.height));
        let raw = device.create("surface", |b| b.create_surface(ctx.raw(), &target, &config))?;
        let reg = match device.register(ResourceKind::Surface, ctx.id(), raw) {
            Ok(reg) => reg,
            Err(e) => {
                device.backend().release_surface(raw);
                return Err(e);
            }
        };
        state.surface = Some(reg.id());
        drop(state);
        log::debug!(
            "surface #{} created for {target:?} at {}x{}",
            reg.id().get(),
            config.width,
            config.height
        );

        let surface = Surface {
            inner: Arc::new(SurfaceInner {
                reg,
                raw,
                ctx: Arc::clone(ctx),
                target,
                config: Mutex::new(config),
                presents: AtomicU64::new(0),
            }),
        };
        if (config.width, config.height) != context.size() {
            ctx.resize(config.width, config.height)?;
        }
        Ok(surface)
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.reg.id()
    }

    #[inline]
    pub fn target(&self) -> SurfaceTarget {
        self.inner.target
    }

    pub fn config(&self) -> SurfaceConfig {
        *self.inner.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> (u32, u32) {
        let config = self.config();
        (config.width, config.height)
    }

    /// Resizes the swapchain and the owning context.
    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.resize_inner(width, height).recorded()
    }

    fn resize_inner(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameter("surface dimensions must be non-zero"));
        }
        let ctx = &self.inner.ctx;
        if ctx.state().frame.phase() == FramePhase::Recording {
            return Err(Error::invalid_parameter("cannot resize a surface during a frame"));
        }
        let mut config = self.inner.config.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = self.inner.raw;
        ctx.device().call(|b| b.resize_surface(raw, width, height))?;
        config.width = width;
        config.height = height;
        drop(config);
        ctx.resize(width, height)
    }

    /// Presents the last submitted frame.
    ///
    /// Fails while a frame is recording or ended but not yet submitted.
    /// `ALLOW_TEARING` needs interval 0 and tearing enabled at creation.
    pub fn present(&self, interval: u32, flags: PresentFlags) -> Result<()> {
        self.present_inner(interval, flags).recorded()
    }

    fn present_inner(&self, interval: u32, flags: PresentFlags) -> Result<()> {
        let ctx = &self.inner.ctx;
        if ctx.state().frame.phase() != FramePhase::Idle {
            return Err(Error::invalid_parameter(
                "end_frame and submit must be called before present",
            ));
        }
        let tearing = flags.contains(PresentFlags::ALLOW_TEARING);
        if tearing && interval != 0 {
            return Err(Error::invalid_parameter(format!(
                "tearing present needs interval 0, got {interval}"
            )));
        }
        if tearing && !self.config().allows_tearing() {
            return Err(Error::unsupported(
                "tearing was not enabled when the surface was created",
            ));
        }
        let raw = self.inner.raw;
        ctx.device().call(|b| b.present(raw, interval, flags))?;
        self.inner.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn present_count(&self) -> u64 {
        self.inner.presents.load(Ordering::Relaxed)
    }
}

#[cfg(all(test, any(target_os = "linux", target_os = "android", target_os = "macos")))]
mod tests {
    use super::*;
    use crate::context::FrameOptions;
    use crate::device::{Device, DeviceDesc};
    use crate::error::Status;

    const TARGET: SurfaceTarget = SurfaceTarget::Vulkan { surface: 0xbeef };

    fn context() -> Context {
        Device::create(DeviceDesc::default())
            .unwrap()
            .create_context(32, 32)
            .unwrap()
    }

    #[test]
    fn validation_order() {
        let ctx = context();
        let err = Surface::create(&ctx, SurfaceTarget::Vulkan { surface: 0 }, SurfaceDesc::default())
            .unwrap_err();
        assert_eq!(err.status(), Status::NullPointer);
        let err = Surface::create(&ctx, SurfaceTarget::D3d12Hwnd { hwnd: 1 }, SurfaceDesc::default())
            .unwrap_err();
        assert_eq!(err.status(), Status::Unsupported);

        let surface = Surface::create(&ctx, TARGET, SurfaceDesc::default()).unwrap();
        assert_eq!(surface.size(), (32, 32));
        let err = Surface::create(&ctx, TARGET, SurfaceDesc::default()).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        drop(surface);
        assert!(Surface::create(&ctx, TARGET, SurfaceDesc::default()).is_ok());
    }

    #[test]
    fn resize_propagates_to_context() {
        let ctx = context();
        let surface = Surface::create(&ctx, TARGET, SurfaceDesc::default()).unwrap();
        surface.resize(64, 48).unwrap();
        assert_eq!(ctx.size(), (64, 48));
        assert_eq!(surface.resize(0, 48).unwrap_err().status(), Status::InvalidParameter);

        ctx.begin_frame(FrameOptions::default()).unwrap();
        assert_eq!(surface.resize(10, 10).unwrap_err().status(), Status::InvalidParameter);
    }

    #[test]
    fn present_rules() {
        let ctx = context();
        let surface = Surface::create(&ctx, TARGET, SurfaceDesc::default()).unwrap();
        ctx.begin_frame(FrameOptions::default()).unwrap();
        assert_eq!(
            surface.present(1, PresentFlags::empty()).unwrap_err().status(),
            Status::InvalidParameter
        );
        ctx.end_frame().unwrap();
        assert_eq!(ctx.phase(), FramePhase::Closed);
        assert_eq!(
            surface.present(1, PresentFlags::empty()).unwrap_err().status(),
            Status::InvalidParameter
        );
        assert_eq!(surface.present_count(), 0);
        ctx.submit().unwrap();
        assert_eq!(
            surface.present(0, PresentFlags::ALLOW_TEARING).unwrap_err().status(),
            Status::Unsupported
        );
        surface.present(1, PresentFlags::empty()).unwrap();
        assert_eq!(surface.present_count(), 1);
    }

    #[test]
    fn negotiated_tearing_is_allowed() {
        let ctx = context();
        let desc = SurfaceDesc {
            flags: SurfaceFlags::ALLOW_TEARING,
            present_interval: 0,
            ..SurfaceDesc::default()
        };
        let surface = Surface::create(&ctx, TARGET, desc).unwrap();
        surface.present(0, PresentFlags::ALLOW_TEARING).unwrap();
        assert_eq!(
            surface.present(1, PresentFlags::ALLOW_TEARING).unwrap_err().status(),
            Status::InvalidParameter
        );
        assert_eq!(surface.present_count(), 1);
    }
}
