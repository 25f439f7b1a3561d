//! The managed heap: objects, roots, namespace and collection.

use std::collections::HashSet;

use indexmap::IndexMap;
use smallvec::SmallVec;

use dae_bridge_core::HostError;

use crate::config::HeapConfig;
use crate::object::{Entry, NativeFunction, Object};
use crate::table::{ObjRef, ObjectTable};

/// Counters describing heap activity since creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects allocated.
    pub allocations: u64,
    /// Completed collections.
    pub collections: u64,
    /// Objects reclaimed by collection.
    pub freed: u64,
    /// Views retired at the end of an invocation.
    pub retired_views: u64,
}

/// A small garbage-collected heap.
///
/// Roots are pinned objects (pin count above zero), objects bound in the
/// namespace, and objects allocated by a native function that has not
/// returned yet. Everything else is reclaimed by [`collect`](Self::collect).
/// Objects never reference each other, so marking is just the root set.
pub struct ManagedHeap {
    pub(crate) table: ObjectTable<Entry>,
    globals: IndexMap<String, ObjRef>,
    locals: Vec<ObjRef>,
    scopes: SmallVec<[usize; 4]>,
    config: HeapConfig,
    pub(crate) stats: HeapStats,
}

// SAFETY: the only non-Send contents are the raw pointers of views. They are
// dereferenced only through `&self`/`&mut self`, and only until the view is
// retired at the end of the invocation that created it.
#[allow(unsafe_code)]
unsafe impl Send for ManagedHeap {}

impl ManagedHeap {
    /// Create an empty heap with default settings.
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Create an empty heap.
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            table: ObjectTable::new(),
            globals: IndexMap::new(),
            locals: Vec::new(),
            scopes: SmallVec::new(),
            config,
            stats: HeapStats::default(),
        }
    }

    pub(crate) fn alloc(&mut self, object: Object) -> ObjRef {
        self.stats.allocations += 1;
        let every = self.config.collect_every as u64;
        if every > 0 && self.stats.allocations % every == 0 {
            self.collect();
        }
        let r = self.table.insert(Entry { object, pins: 0 });
        if !self.scopes.is_empty() {
            self.locals.push(r);
        }
        r
    }

    /// Allocate an owned f64 array.
    pub fn alloc_array(&mut self, data: Vec<f64>) -> ObjRef {
        self.alloc(Object::Array(data))
    }

    /// Allocate a string. Not an array; useful to provoke type errors.
    pub fn alloc_text(&mut self, text: impl Into<String>) -> ObjRef {
        self.alloc(Object::Text(text.into()))
    }

    /// Allocate a native function.
    pub fn alloc_function(&mut self, function: NativeFunction) -> ObjRef {
        self.alloc(Object::Function(function))
    }

    /// Bind `name` to `value` in the namespace, returning the previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: ObjRef) -> Option<ObjRef> {
        self.globals.insert(name.into(), value)
    }

    /// Allocate a native function and bind it under its own name.
    pub fn define_function(&mut self, function: NativeFunction) -> ObjRef {
        let name = function.name.clone();
        let r = self.alloc_function(function);
        self.define(name, r);
        r
    }

    /// Remove a namespace binding.
    pub fn undefine(&mut self, name: &str) -> Option<ObjRef> {
        self.globals.shift_remove(name)
    }

    /// Look up a live namespace binding.
    pub fn lookup(&self, name: &str) -> Option<ObjRef> {
        self.globals
            .get(name)
            .copied()
            .filter(|r| self.table.get(*r).is_some())
    }

    /// Contents of a text object, or `None` for anything else.
    pub fn text(&self, r: ObjRef) -> Option<&str> {
        match &self.table.get(r)?.object {
            Object::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Read `r` as contiguous doubles. Works for arrays and live views.
    pub fn array(&self, r: ObjRef) -> Result<&[f64], HostError> {
        match &self.entry(r)?.object {
            Object::Array(data) => Ok(data.as_slice()),
            Object::View(view) if view.retired => Err(HostError::RetiredView),
            Object::View(view) => {
                // SAFETY: a view is only live between `materialize`/`repoint`
                // and `retire`, during which its solver buffer is valid.
                #[allow(unsafe_code)]
                let data = unsafe { std::slice::from_raw_parts(view.ptr, view.shape.len) };
                Ok(data)
            }
            other => Err(HostError::NotF64Array {
                found: other.kind().to_owned(),
            }),
        }
    }

    /// Returns `true` if `r` refers to an object that has not been collected.
    pub fn is_live(&self, r: ObjRef) -> bool {
        self.table.get(r).is_some()
    }

    /// Object kind of `r`, if live.
    pub fn kind(&self, r: ObjRef) -> Option<&'static str> {
        self.table.get(r).map(|e| e.object.kind())
    }

    /// Pin count of `r`, if live.
    pub fn pin_count(&self, r: ObjRef) -> Option<u32> {
        self.table.get(r).map(|e| e.pins)
    }

    /// Number of live objects.
    pub fn live_objects(&self) -> usize {
        self.table.len()
    }

    /// Activity counters.
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    /// Reclaim every object that is not a root. Returns how many were freed.
    pub fn collect(&mut self) -> usize {
        let mut roots: HashSet<ObjRef> = self.globals.values().copied().collect();
        roots.extend(self.locals.iter().copied());
        let freed = self.table.sweep(|r, e| e.pins > 0 || roots.contains(&r));
        self.stats.collections += 1;
        self.stats.freed += freed as u64;
        log::trace!("collection {}: freed {freed}", self.stats.collections);
        freed
    }

    pub(crate) fn entry(&self, r: ObjRef) -> Result<&Entry, HostError> {
        self.table
            .get(r)
            .ok_or_else(|| HostError::StaleReference(r.to_string()))
    }

    pub(crate) fn entry_mut(&mut self, r: ObjRef) -> Result<&mut Entry, HostError> {
        self.table
            .get_mut(r)
            .ok_or_else(|| HostError::StaleReference(r.to_string()))
    }

}

/// A native call in progress. Everything the heap allocates while the
/// scope is open stays rooted; the scope closes when it is dropped, also
/// when the native function unwinds.
pub(crate) struct CallScope<'h> {
    heap: &'h mut ManagedHeap,
}

impl<'h> CallScope<'h> {
    pub(crate) fn enter(heap: &'h mut ManagedHeap) -> Self {
        heap.scopes.push(heap.locals.len());
        Self { heap }
    }

    pub(crate) fn heap(&mut self) -> &mut ManagedHeap {
        self.heap
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if let Some(mark) = self.heap.scopes.pop() {
            self.heap.locals.truncate(mark);
        }
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new()
    }
}
