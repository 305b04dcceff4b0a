use std::collections::HashMap;

use super::RawHandle;
use crate::error::{Error, Result};

/// Backend object table keyed by non-null raw handles.
#[derive(Debug)]
pub(crate) struct Slab<T> {
    next: u64,
    items: HashMap<u64, T>,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self {
            next: 1,
            items: HashMap::new(),
        }
    }
}

impl<T> Slab<T> {
    pub(crate) fn insert(&mut self, item: T) -> RawHandle {
        let raw = self.next;
        self.next += 1;
        self.items.insert(raw, item);
        RawHandle::new(raw)
    }

    pub(crate) fn get(&self, handle: RawHandle, what: &str) -> Result<&T> {
        self.items
            .get(&handle.get())
            .ok_or_else(|| Error::invalid_handle(format!("unknown {what} handle {}", handle.get())))
    }

    pub(crate) fn get_mut(&mut self, handle: RawHandle, what: &str) -> Result<&mut T> {
        self.items
            .get_mut(&handle.get())
            .ok_or_else(|| Error::invalid_handle(format!("unknown {what} handle {}", handle.get())))
    }

    pub(crate) fn remove(&mut self, handle: RawHandle) -> Option<T> {
        self.items.remove(&handle.get())
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
