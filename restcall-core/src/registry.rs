use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::MethodError;
use crate::method::{MethodDescriptor, MethodSpec};

/// Memoized descriptor compiler.
///
/// Descriptors are keyed by a stable method key (typically
/// `"Service.method"`) and compiled at most once; every later resolution of
/// the same key returns the identical `Arc`. Concurrent first use is safe:
/// the vacant entry holds the shard lock while the winning thread compiles,
/// so racing threads observe the published descriptor, never a duplicate.
/// Compilation failures are returned to every caller and never cached.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    cache: DashMap<&'static str, Arc<MethodDescriptor>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        MethodRegistry {
            cache: DashMap::new(),
        }
    }

    /// Resolve `key`, compiling with `spec` on first use.
    pub fn resolve<F>(&self, key: &'static str, spec: F) -> Result<Arc<MethodDescriptor>, MethodError>
    where
        F: FnOnce() -> MethodSpec,
    {
        if let Some(hit) = self.cache.get(key) {
            return Ok(Arc::clone(&hit));
        }
        match self.cache.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let descriptor = Arc::new(spec().compile()?);
                slot.insert(Arc::clone(&descriptor));
                Ok(descriptor)
            }
        }
    }

    /// Number of compiled descriptors currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
