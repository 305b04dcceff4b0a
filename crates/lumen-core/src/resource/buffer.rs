use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bitflags::bitflags;
use bytemuck::Pod;

use super::ContextLink;
use crate::backend::RawHandle;
use crate::context::Context;
use crate::error::{Error, Recorded, Result};
use crate::handle::{ResourceId, ResourceKind};

/// What a render buffer feeds into a mesh draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// `u16` triangle indices.
    Index,
    /// `[f32; 2]` positions or texture coordinates.
    Vertex,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Contents are written once; the first unmap seals the buffer.
        const MAPPED_ONCE_AT_INITIALIZATION = 1 << 0;
    }
}

bitflags! {
    /// Preservation hints for [`RenderBuffer::map`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        /// Previous contents of the mapped range need not be preserved.
        const INVALIDATE_RANGE = 1 << 0;
        /// Previous contents of the whole buffer need not be preserved.
        const DISCARD_RANGE = 1 << 1;
    }
}

struct BufferInner {
    link: ContextLink,
    raw: RawHandle,
    ty: BufferType,
    flags: BufferFlags,
    size: usize,
    mapped: AtomicBool,
    sealed: AtomicBool,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.link.ctx().device().backend().release_buffer(self.raw);
        log::trace!("buffer #{} released", self.link.id().get());
    }
}

/// Vertex or index storage for mesh draws. Clones share the buffer.
#[derive(Clone)]
pub struct RenderBuffer {
    inner: Arc<BufferInner>,
}

impl fmt::Debug for RenderBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBuffer")
            .field("id", &self.inner.link.id().get())
            .field("ty", &self.inner.ty)
            .field("size", &self.inner.size)
            .finish()
    }
}

impl RenderBuffer {
    pub(crate) fn create(ctx: &Context, ty: BufferType, flags: BufferFlags, size: usize) -> Result<RenderBuffer> {
        if size == 0 {
            return Err(Error::invalid_parameter("buffer size must be non-zero"));
        }
        let inner = ctx.inner();
        let device = inner.device();
        let raw = device.create("buffer", |b| b.create_buffer(inner.raw(), ty, flags, size))?;
        let link = match ContextLink::new(inner, ResourceKind::Buffer, raw) {
            Ok(link) => link,
            Err(e) => {
                device.backend().release_buffer(raw);
                return Err(e);
            }
        };
        log::trace!("{ty:?} buffer #{} created ({size} bytes)", link.id().get());
        Ok(RenderBuffer {
            inner: Arc::new(BufferInner {
                link,
                raw,
                ty,
                flags,
                size,
                mapped: AtomicBool::new(false),
                sealed: AtomicBool::new(false),
            }),
        })
    }

    /// Creates a buffer holding exactly `data`.
    ///
    /// Map-once buffers are filled through their single mapping.
    pub(crate) fn create_init(ctx: &Context, ty: BufferType, flags: BufferFlags, data: &[u8]) -> Result<RenderBuffer> {
        let mut buffer = Self::create(ctx, ty, flags, data.len())?;
        if flags.contains(BufferFlags::MAPPED_ONCE_AT_INITIALIZATION) {
            let mut mapping = buffer.map_inner(MapFlags::DISCARD_RANGE)?;
            mapping.copy_from_slice(data);
            mapping.unmap_inner(data.len())?;
        } else {
            buffer.upload_inner(data, 0)?;
        }
        Ok(buffer)
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.link.id()
    }

    #[inline]
    pub fn raw_handle(&self) -> RawHandle {
        self.inner.raw
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    #[inline]
    pub fn ty(&self) -> BufferType {
        self.inner.ty
    }

    #[inline]
    pub fn flags(&self) -> BufferFlags {
        self.inner.flags
    }

    pub fn is_mapped(&self) -> bool {
        self.inner.mapped.load(Ordering::Acquire)
    }

    pub(crate) fn link(&self) -> &ContextLink {
        &self.inner.link
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.inner.sealed.load(Ordering::Acquire) {
            return Err(Error::invalid_parameter(
                "map-once buffer was already initialized",
            ));
        }
        if self.is_mapped() {
            return Err(Error::invalid_parameter("buffer is mapped"));
        }
        Ok(())
    }

    /// Copies `data` to `offset`. Fails unless `offset + data.len() <= size()`.
    pub fn upload(&self, data: &[u8], offset: usize) -> Result<()> {
        self.upload_inner(data, offset).recorded()
    }

    /// Uploads a slice of plain-old-data values.
    pub fn upload_pod<T: Pod>(&self, data: &[T], offset: usize) -> Result<()> {
        self.upload(bytemuck::cast_slice(data), offset)
    }

    fn upload_inner(&self, data: &[u8], offset: usize) -> Result<()> {
        let size = self.inner.size;
        let fits = offset
            .checked_add(data.len())
            .is_some_and(|end| end <= size);
        if !fits {
            return Err(Error::OutOfBounds {
                offset,
                len: data.len(),
                size,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        self.ensure_writable()?;
        let raw = self.inner.raw;
        self.inner
            .link
            .ctx()
            .device()
            .call(|b| b.write_buffer(raw, offset, data))
    }

    /// Maps the whole buffer for writing.
    ///
    /// Only one mapping may be open at a time, across every clone.
    pub fn map(&mut self, flags: MapFlags) -> Result<Mapping<'_>> {
        self.map_inner(flags).recorded()
    }

    fn map_inner(&mut self, flags: MapFlags) -> Result<Mapping<'_>> {
        if self.inner.sealed.load(Ordering::Acquire) {
            return Err(Error::invalid_parameter(
                "map-once buffer was already initialized",
            ));
        }
        if self
            .inner
            .mapped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::invalid_parameter("buffer is already mapped"));
        }
        let raw = self.inner.raw;
        match self.inner.link.ctx().device().call(|b| b.map_buffer(raw, flags)) {
            Ok(staging) => Ok(Mapping {
                buffer: self,
                staging,
                finished: false,
            }),
            Err(e) => {
                self.inner.mapped.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn finish_mapping(&self, staging: &[u8], written: usize) -> Result<()> {
        let raw = self.inner.raw;
        let result = self
            .inner
            .link
            .ctx()
            .device()
            .call(|b| b.unmap_buffer(raw, staging, written));
        if self
            .inner
            .flags
            .contains(BufferFlags::MAPPED_ONCE_AT_INITIALIZATION)
        {
            self.inner.sealed.store(true, Ordering::Release);
        }
        self.inner.mapped.store(false, Ordering::Release);
        result
    }
}

/// An open mapping of a [`RenderBuffer`].
///
/// Writes land in a staging copy; [`unmap`](Mapping::unmap) commits a prefix
/// of it. Dropping the mapping commits nothing.
pub struct Mapping<'a> {
    buffer: &'a RenderBuffer,
    staging: Vec<u8>,
    finished: bool,
}

impl fmt::Debug for Mapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("buffer", &self.buffer.id().get())
            .field("len", &self.staging.len())
            .finish()
    }
}

impl Mapping<'_> {
    /// Commits the first `written` bytes and releases the mapping.
    ///
    /// `written` larger than the mapping fails, but the mapping is still released.
    pub fn unmap(self, written: usize) -> Result<()> {
        self.unmap_inner(written).recorded()
    }

    fn unmap_inner(mut self, written: usize) -> Result<()> {
        self.finished = true;
        let len = self.staging.len();
        if written > len {
            self.buffer.finish_mapping(&self.staging, 0)?;
            return Err(Error::invalid_parameter(format!(
                "unmap of {written} bytes exceeds the {len} byte mapping"
            )));
        }
        self.buffer.finish_mapping(&self.staging, written)
    }
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.staging
    }
}

impl DerefMut for Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!(
                "buffer #{} mapping dropped without unmap; nothing committed",
                self.buffer.id().get()
            );
            if let Err(e) = self.buffer.finish_mapping(&self.staging, 0) {
                log::error!("failed to release mapping: {e}");
            }
        }
    }
}
