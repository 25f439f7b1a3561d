//! [`HostRuntime`] for [`ManagedHeap`].

use std::ptr::NonNull;

use dae_bridge_core::{HostError, HostRuntime, RawBuffer};

use crate::heap::{CallScope, ManagedHeap};
use crate::object::{ArrayView, Object};
use crate::table::ObjRef;

/// A long-lived root on a heap object.
///
/// Deliberately not `Clone`: each `Rooted` is released exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Rooted(ObjRef);

impl Rooted {
    /// The rooted object.
    pub fn get(&self) -> ObjRef {
        self.0
    }
}

#[allow(unsafe_code)]
impl HostRuntime for ManagedHeap {
    type Ref = ObjRef;
    type Handle = Rooted;

    const SUPPORTS_REUSE: bool = true;

    fn resolve(&mut self, name: &str) -> Option<ObjRef> {
        self.lookup(name)
    }

    fn is_callable(&self, value: &ObjRef) -> bool {
        matches!(
            self.entry(*value).map(|e| &e.object),
            Ok(Object::Function(_))
        )
    }

    fn type_name(&self, value: &ObjRef) -> String {
        self.kind(*value).unwrap_or("stale reference").to_owned()
    }

    unsafe fn materialize(&mut self, buffer: RawBuffer<'_>) -> Result<ObjRef, HostError> {
        Ok(self.alloc(Object::View(ArrayView {
            ptr: buffer.as_ptr(),
            shape: buffer.descriptor(),
            retired: false,
        })))
    }

    unsafe fn repoint(&mut self, view: &ObjRef, buffer: RawBuffer<'_>) -> Result<(), HostError> {
        match &mut self.entry_mut(*view)?.object {
            Object::View(v) => {
                debug_assert_eq!(v.shape.role, buffer.role());
                v.ptr = buffer.as_ptr();
                v.shape = buffer.descriptor();
                v.retired = false;
                Ok(())
            }
            _ => Err(HostError::Unsupported("repointing a non-view value")),
        }
    }

    fn retire(&mut self, view: &ObjRef) {
        let Ok(entry) = self.entry_mut(*view) else {
            return;
        };
        if let Object::View(v) = &mut entry.object {
            v.ptr = NonNull::dangling().as_ptr();
            v.shape.len = 0;
            v.shape.nrows = 0;
            v.retired = true;
            self.stats.retired_views += 1;
        }
    }

    fn pin(&mut self, value: &ObjRef) {
        match self.entry_mut(*value) {
            Ok(e) => e.pins += 1,
            Err(_) => log::warn!("pinning stale reference {value}"),
        }
    }

    fn unpin(&mut self, value: &ObjRef) {
        match self.entry_mut(*value) {
            Ok(e) => {
                debug_assert!(e.pins > 0, "unbalanced unpin of {value}");
                e.pins = e.pins.saturating_sub(1);
            }
            Err(_) => log::warn!("unpinning stale reference {value}"),
        }
    }

    fn persist(&mut self, value: &ObjRef) -> Rooted {
        self.pin(value);
        Rooted(*value)
    }

    fn attach(&mut self, handle: &Rooted) -> ObjRef {
        handle.0
    }

    fn release(&mut self, handle: Rooted) {
        self.unpin(&handle.0);
    }

    fn call(&mut self, function: &ObjRef, args: [&ObjRef; 3]) -> Result<ObjRef, HostError> {
        let native = match &self.entry(*function)?.object {
            Object::Function(f) => f.clone(),
            other => {
                return Err(HostError::NotCallable {
                    found: other.kind().to_owned(),
                })
            }
        };
        for arg in args {
            self.entry(*arg)?;
        }
        log::trace!("calling native '{}'", native.name);
        let result = {
            let mut scope = CallScope::enter(self);
            (native.body)(scope.heap(), [*args[0], *args[1], *args[2]])?
        };
        self.entry(result)?;
        Ok(result)
    }

    fn with_f64_slice<T>(&self, value: &ObjRef, f: impl FnOnce(&[f64]) -> T) -> Result<T, HostError> {
        self.array(*value).map(f)
    }
}
