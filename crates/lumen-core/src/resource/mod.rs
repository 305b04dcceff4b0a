//! Context-owned resources: paths, paints, shaders, buffers, images and fonts.
//!
//! Every resource keeps its context alive and is registered under it, so the
//! context's backend object outlives everything created from it.

mod buffer;
mod font;
mod image;
mod paint;
mod path;
mod shader;
mod text;

use std::sync::Arc;

pub use buffer::{BufferFlags, BufferType, MapFlags, Mapping, RenderBuffer};
pub use font::Font;
pub use image::{Image, ImageData, ImageFilter, ImageSampler, ImageWrap};
pub use paint::Paint;
pub use path::Path;
pub use shader::Shader;
pub use text::{TextAlign, TextDirection, TextStyle, TextWrap};

use crate::backend::{Backend, RawHandle};
use crate::context::ContextInner;
use crate::error::{Error, Result};
use crate::handle::{Registration, ResourceId, ResourceKind};

/// Backend release call for an object owned by a [`ContextLink`].
pub(crate) type ReleaseFn = fn(&dyn Backend, RawHandle);

/// Registration of a resource under its context.
///
/// Field order matters: the registration is released before the context
/// reference, so the context never sees a dependent outlive it.
pub(crate) struct ContextLink {
    reg: Registration,
    ctx: Arc<ContextInner>,
    owned: Option<(RawHandle, ReleaseFn)>,
}

impl Drop for ContextLink {
    fn drop(&mut self) {
        if let Some((raw, release)) = self.owned.take() {
            release(self.ctx.device().backend(), raw);
        }
    }
}

impl ContextLink {
    /// Registers a resource whose backend object is owned elsewhere.
    pub(crate) fn new(ctx: &Arc<ContextInner>, kind: ResourceKind, raw: RawHandle) -> Result<Self> {
        ctx.device().check()?;
        let reg = ctx.device().register(kind, ctx.id(), raw)?;
        Ok(Self {
            reg,
            ctx: Arc::clone(ctx),
            owned: None,
        })
    }

    /// Creates the backend object through `create` and registers it.
    ///
    /// The link releases the object with `release` when dropped.
    pub(crate) fn create(
        ctx: &Arc<ContextInner>,
        kind: ResourceKind,
        what: &str,
        create: impl FnOnce(&dyn Backend, RawHandle) -> Result<RawHandle>,
        release: ReleaseFn,
    ) -> Result<Self> {
        let device = ctx.device();
        let ctx_raw = ctx.raw();
        let raw = device.create(what, |b| create(b, ctx_raw))?;
        let reg = match device.register(kind, ctx.id(), raw) {
            Ok(reg) => reg,
            Err(e) => {
                release(device.backend(), raw);
                return Err(e);
            }
        };
        Ok(Self {
            reg,
            ctx: Arc::clone(ctx),
            owned: Some((raw, release)),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> ResourceId {
        self.reg.id()
    }

    #[inline]
    pub(crate) fn ctx(&self) -> &Arc<ContextInner> {
        &self.ctx
    }

    /// Fails with `InvalidHandle` unless the resource belongs to `ctx`.
    pub(crate) fn ensure_context(&self, ctx: &ContextInner, what: &str) -> Result<()> {
        if self.ctx.same_context(ctx) {
            Ok(())
        } else {
            Err(Error::invalid_handle(format!(
                "{what} #{} belongs to another context",
                self.id().get()
            )))
        }
    }
}
