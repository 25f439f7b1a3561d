//! Heap object kinds.

use std::fmt;
use std::sync::Arc;

use dae_bridge_core::{HostError, ViewDescriptor};

use crate::heap::ManagedHeap;
use crate::table::ObjRef;

/// Body of a native user function.
///
/// Receives the heap and `(t, y, yp)`; returns a reference to its result.
/// Values it allocates stay rooted until the call returns. It must not
/// hold on to heap references beyond the call except through
/// [`ManagedHeap::define`].
pub type NativeBody =
    dyn Fn(&mut ManagedHeap, [ObjRef; 3]) -> Result<ObjRef, HostError> + Send + Sync;

/// A named native function.
#[derive(Clone)]
pub struct NativeFunction {
    pub(crate) name: String,
    pub(crate) body: Arc<NativeBody>,
}

impl NativeFunction {
    /// Wrap `body` under `name`.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut ManagedHeap, [ObjRef; 3]) -> Result<ObjRef, HostError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Wrap a function of plain slices.
    ///
    /// The inputs are read through the views; the returned vector becomes
    /// a new heap array. An `Err` is reported as a user failure.
    pub fn from_slices(
        name: impl Into<String>,
        f: impl Fn(&[f64], &[f64], &[f64]) -> Result<Vec<f64>, String> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |heap, [t, y, yp]| {
            let out = f(heap.array(t)?, heap.array(y)?, heap.array(yp)?)
                .map_err(HostError::UserFailure)?;
            Ok(heap.alloc_array(out))
        })
    }

    /// Invoke the body directly, outside any bridge call.
    pub fn call(&self, heap: &mut ManagedHeap, args: [ObjRef; 3]) -> Result<ObjRef, HostError> {
        (self.body)(heap, args)
    }

    /// Function name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A non-owning f64 view over solver memory.
///
/// `ptr` is only dereferenced while `retired` is false, and then for
/// `shape.len` elements.
#[derive(Debug)]
pub(crate) struct ArrayView {
    pub(crate) ptr: *const f64,
    pub(crate) shape: ViewDescriptor,
    pub(crate) retired: bool,
}

#[derive(Debug)]
pub(crate) enum Object {
    Array(Vec<f64>),
    View(ArrayView),
    Function(NativeFunction),
    Text(String),
}

impl Object {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Object::Array(_) => "array",
            Object::View(_) => "view",
            Object::Function(_) => "function",
            Object::Text(_) => "text",
        }
    }
}

pub(crate) struct Entry {
    pub(crate) object: Object,
    pub(crate) pins: u32,
}
