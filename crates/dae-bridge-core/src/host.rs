//! The seam between the bridge and a managed host runtime.

use crate::buffer::RawBuffer;
use crate::error::HostError;

/// A garbage-collected runtime the bridge can call into.
///
/// The bridge drives every method from a single thread, inside one
/// invocation at a time. Implementations must never copy the data behind a
/// [`RawBuffer`] when materializing a view.
///
/// # Rooting
///
/// [`pin`](Self::pin) and [`unpin`](Self::unpin) are driven exclusively by
/// [`RootGuard`](crate::RootGuard), which pairs them. A host must treat a
/// pinned value as a root: it may not be reclaimed or moved until unpinned
/// as many times as it was pinned.
#[allow(unsafe_code)]
pub trait HostRuntime {
    /// Managed reference, valid for the current invocation.
    type Ref: Clone;
    /// Long-lived rooted reference that may be stored across invocations.
    type Handle;

    /// Whether [`repoint`](Self::repoint) is implemented.
    const SUPPORTS_REUSE: bool;

    /// Look up a named value in the host namespace.
    fn resolve(&mut self, name: &str) -> Option<Self::Ref>;

    /// Returns `true` if `value` can be called.
    fn is_callable(&self, value: &Self::Ref) -> bool;

    /// Host type name of `value`, for diagnostics.
    fn type_name(&self, value: &Self::Ref) -> String;

    /// Construct a new view aliasing `buffer`. Never copies.
    ///
    /// # Safety
    ///
    /// The view must be passed to [`retire`](Self::retire) before the memory
    /// behind `buffer` is freed or reused. [`RootGuard`](crate::RootGuard)
    /// retires every view it adopted when it drops.
    unsafe fn materialize(&mut self, buffer: RawBuffer<'_>) -> Result<Self::Ref, HostError>;

    /// Point an existing view at `buffer`, replacing its pointer and shape.
    ///
    /// # Safety
    ///
    /// Same contract as [`materialize`](Self::materialize).
    unsafe fn repoint(&mut self, view: &Self::Ref, buffer: RawBuffer<'_>) -> Result<(), HostError> {
        let _ = (view, buffer);
        Err(HostError::Unsupported("view reuse"))
    }

    /// Detach a view from the solver buffer it aliased.
    ///
    /// Called when the invocation that materialized or re-pointed the view
    /// ends. After this, the view must not expose the old buffer.
    fn retire(&mut self, view: &Self::Ref);

    /// Root `value`.
    fn pin(&mut self, value: &Self::Ref);

    /// Undo one [`pin`](Self::pin).
    fn unpin(&mut self, value: &Self::Ref);

    /// Root `value` beyond the current invocation.
    fn persist(&mut self, value: &Self::Ref) -> Self::Handle;

    /// Obtain a per-invocation reference from a handle.
    fn attach(&mut self, handle: &Self::Handle) -> Self::Ref;

    /// Drop the root held by `handle`.
    fn release(&mut self, handle: Self::Handle);

    /// Call `function` with exactly `(t, y, yp)`.
    fn call(&mut self, function: &Self::Ref, args: [&Self::Ref; 3])
        -> Result<Self::Ref, HostError>;

    /// Read `value` as contiguous doubles.
    ///
    /// Fails with [`HostError::NotF64Array`] for anything that is not an
    /// array of f64.
    fn with_f64_slice<T>(
        &self,
        value: &Self::Ref,
        f: impl FnOnce(&[f64]) -> T,
    ) -> Result<T, HostError>;
}
