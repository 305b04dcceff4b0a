use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::RawHandle;
use crate::error::{Error, Result};

/// Opaque, never-reused identifier of a registered resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(NonZeroU64);

impl ResourceId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    Context,
    Surface,
    Fence,
    Renderer,
    Path,
    Paint,
    Shader,
    Buffer,
    Image,
    Font,
}

#[derive(Debug)]
struct Entry {
    kind: ResourceKind,
    owner: Option<ResourceId>,
    raw: RawHandle,
    dependents: usize,
}

/// Per-device table of live resources.
#[derive(Debug)]
pub struct HandleRegistry {
    next: AtomicU64,
    entries: Mutex<HashMap<ResourceId, Entry>>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a resource; `owner` gains one dependent.
    pub(crate) fn register(
        self: &Arc<Self>,
        kind: ResourceKind,
        owner: Option<ResourceId>,
        raw: RawHandle,
    ) -> Result<Registration> {
        let raw_id = self.next.fetch_add(1, Ordering::Relaxed);
        let id = NonZeroU64::new(raw_id)
            .map(ResourceId)
            .ok_or_else(|| Error::internal("resource id space exhausted"))?;

        let mut entries = self.entries();
        if let Some(owner) = owner {
            let parent = entries.get_mut(&owner).ok_or_else(|| {
                Error::invalid_handle(format!("owner {} of new {kind:?} is not registered", owner.get()))
            })?;
            parent.dependents += 1;
        }
        entries.insert(
            id,
            Entry {
                kind,
                owner,
                raw,
                dependents: 0,
            },
        );
        log::trace!("registered {kind:?} #{raw_id}");

        Ok(Registration {
            id,
            registry: Arc::clone(self),
        })
    }

    fn release(&self, id: ResourceId) -> Result<()> {
        let mut entries = self.entries();
        let entry = entries
            .get(&id)
            .ok_or_else(|| Error::invalid_handle(format!("resource {} is not registered", id.get())))?;
        if entry.dependents > 0 {
            return Err(Error::internal(format!(
                "{:?} #{} released with {} live dependents",
                entry.kind,
                id.get(),
                entry.dependents
            )));
        }

        let owner = entry.owner;
        let kind = entry.kind;
        entries.remove(&id);
        if let Some(parent) = owner.and_then(|o| entries.get_mut(&o)) {
            parent.dependents = parent.dependents.saturating_sub(1);
        }
        log::trace!("released {kind:?} #{}", id.get());
        Ok(())
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries().contains_key(&id)
    }

    pub fn kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.entries().get(&id).map(|e| e.kind)
    }

    pub fn owner(&self, id: ResourceId) -> Option<ResourceId> {
        self.entries().get(&id).and_then(|e| e.owner)
    }

    /// Backend-native object behind `id`.
    pub fn raw(&self, id: ResourceId) -> Option<RawHandle> {
        self.entries().get(&id).map(|e| e.raw)
    }

    pub fn dependents(&self, id: ResourceId) -> usize {
        self.entries().get(&id).map_or(0, |e| e.dependents)
    }

    /// Number of live resources of `kind`.
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.entries().values().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Live registry entry. Dropping it releases the entry.
#[derive(Debug)]
pub(crate) struct Registration {
    id: ResourceId,
    registry: Arc<HandleRegistry>,
}

impl Registration {
    #[inline]
    pub(crate) fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Err(e) = self.registry.release(self.id) {
            log::error!("teardown order violated: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(v: u64) -> RawHandle {
        RawHandle::new(v)
    }

    #[test]
    fn ownership_edges_are_counted() {
        let reg = Arc::new(HandleRegistry::new());
        let device = reg.register(ResourceKind::Device, None, raw(1)).unwrap();
        let ctx = reg
            .register(ResourceKind::Context, Some(device.id()), raw(2))
            .unwrap();
        let path = reg.register(ResourceKind::Path, Some(ctx.id()), raw(3)).unwrap();

        assert_eq!(reg.dependents(device.id()), 1);
        assert_eq!(reg.dependents(ctx.id()), 1);
        assert_eq!(reg.owner(path.id()), Some(ctx.id()));
        assert_eq!(reg.raw(ctx.id()), Some(raw(2)));
        assert_eq!(reg.count(ResourceKind::Path), 1);

        drop(path);
        assert_eq!(reg.dependents(ctx.id()), 0);
        drop(ctx);
        drop(device);
        assert!(reg.is_empty());
    }

    #[test]
    fn releasing_owner_with_dependents_fails() {
        let reg = Arc::new(HandleRegistry::new());
        let device = reg.register(ResourceKind::Device, None, raw(1)).unwrap();
        let fence = reg
            .register(ResourceKind::Fence, Some(device.id()), raw(2))
            .unwrap();

        let err = reg.release(device.id()).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InternalError);
        assert!(reg.contains(device.id()));

        drop(fence);
        drop(device);
        assert!(reg.is_empty());
    }

    #[test]
    fn unknown_owner_is_invalid_handle() {
        let reg = Arc::new(HandleRegistry::new());
        let ghost = {
            let tmp = reg.register(ResourceKind::Device, None, raw(1)).unwrap();
            tmp.id()
        };
        let err = reg.register(ResourceKind::Context, Some(ghost), raw(2)).unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InvalidHandle);
    }

    #[test]
    fn ids_are_not_reused() {
        let reg = Arc::new(HandleRegistry::new());
        let a = reg.register(ResourceKind::Paint, None, RawHandle::NULL).unwrap().id();
        let b = reg.register(ResourceKind::Paint, None, RawHandle::NULL).unwrap().id();
        assert_ne!(a, b);
    }
}
