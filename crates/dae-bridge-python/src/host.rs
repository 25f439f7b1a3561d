//! [`HostRuntime`] over CPython and numpy.
//!
//! A `PyHost` only exists while the GIL is held: the callback target
//! attaches to the interpreter, builds one for the invocation and drops it
//! before returning to the solver.
//!
//! Views are numpy arrays borrowed over solver memory and marked read-only.
//! Pinning is reference counting: every value the bridge roots is held as
//! a strong [`Bound`] reference until the invocation ends. numpy arrays
//! cannot be re-pointed, so only the Fresh view strategy is available.

use std::collections::HashMap;

use numpy::ndarray::ArrayView1;
use numpy::{
    PyArray1, PyArrayDescrMethods, PyArrayMethods, PyUntypedArray, PyUntypedArrayMethods,
};
use pyo3::intern;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use dae_bridge_core::{HostError, HostRuntime, RawBuffer, ViewRole};

/// Reference counts the host can account for when a view is retired.
///
/// Keyed by object address. A view is expected to be held by the caller,
/// once per pin, and once per pinned result whose numpy `base` is the view
/// (`return y[:]` and similar slices of an input).
#[derive(Debug, Default)]
struct RefLedger {
    pins: HashMap<usize, usize>,
    views: HashMap<usize, ViewRole>,
    derived: HashMap<usize, usize>,
}

impl RefLedger {
    fn track_view(&mut self, view: usize, role: ViewRole) {
        self.views.insert(view, role);
    }

    fn is_view(&self, value: usize) -> bool {
        self.views.contains_key(&value)
    }

    /// A result whose `base` is `view` was returned by user code.
    fn derive(&mut self, view: usize) {
        *self.derived.entry(view).or_default() += 1;
    }

    fn pin(&mut self, value: usize) {
        *self.pins.entry(value).or_default() += 1;
    }

    /// Returns `false` if `value` was not pinned.
    fn unpin(&mut self, value: usize) -> bool {
        match self.pins.get_mut(&value) {
            Some(1) => {
                self.pins.remove(&value);
                true
            }
            Some(count) => {
                *count -= 1;
                true
            }
            None => false,
        }
    }

    /// Forget `view`, returning its role and how many of the `held`
    /// references are unaccounted for. `None` if it is not a live view.
    fn retire(&mut self, view: usize, held: usize) -> Option<(ViewRole, usize)> {
        let role = self.views.remove(&view)?;
        let expected = 1
            + self.pins.get(&view).copied().unwrap_or(0)
            + self.derived.remove(&view).unwrap_or(0);
        Some((role, held.saturating_sub(expected)))
    }
}

/// Only a one-dimensional float64 array is a result; anything else is
/// rejected rather than reshaped.
fn is_result_shape(shape: &[usize], is_f64: bool) -> bool {
    is_f64 && shape.len() == 1
}

fn describe_array(shape: &[usize], dtype: &str) -> String {
    match shape {
        [] => format!("0-d {dtype} ndarray"),
        [n] => format!("{dtype} ndarray of length {n}"),
        dims => format!("{}-d {dtype} ndarray of shape {dims:?}", dims.len()),
    }
}

/// One invocation's view of the interpreter.
pub(crate) struct PyHost<'py> {
    py: Python<'py>,
    namespace: Option<Bound<'py, PyDict>>,
    refs: RefLedger,
}

impl<'py> PyHost<'py> {
    pub(crate) fn new(py: Python<'py>, namespace: Option<Bound<'py, PyDict>>) -> Self {
        Self {
            py,
            namespace,
            refs: RefLedger::default(),
        }
    }

    /// Record `result` if it is a slice of one of this invocation's views.
    fn note_derived(&mut self, result: &Bound<'py, PyAny>) {
        if !result.is_instance_of::<PyUntypedArray>() {
            return;
        }
        if let Ok(base) = result.getattr(intern!(self.py, "base")) {
            let base = address(&base);
            if self.refs.is_view(base) {
                self.refs.derive(base);
            }
        }
    }
}

fn address(value: &Bound<'_, PyAny>) -> usize {
    value.as_ptr() as usize
}

#[allow(unsafe_code)]
impl<'py> HostRuntime for PyHost<'py> {
    type Ref = Bound<'py, PyAny>;
    type Handle = Py<PyAny>;

    const SUPPORTS_REUSE: bool = false;

    fn resolve(&mut self, name: &str) -> Option<Self::Ref> {
        self.namespace.as_ref()?.get_item(name).ok().flatten()
    }

    fn is_callable(&self, value: &Self::Ref) -> bool {
        value.is_callable()
    }

    fn type_name(&self, value: &Self::Ref) -> String {
        value
            .get_type()
            .name()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "<unknown type>".to_owned())
    }

    unsafe fn materialize(&mut self, buffer: RawBuffer<'_>) -> Result<Self::Ref, HostError> {
        let shape = buffer.descriptor();
        // SAFETY: the caller guarantees `buffer` stays valid until the view
        // is retired. The array borrows it; `None` stands in as the owner.
        let array = unsafe {
            let data = ArrayView1::from_shape_ptr(shape.nrows, buffer.as_ptr());
            PyArray1::borrow_from_array(&data, self.py.None().into_bound(self.py))
        };
        array
            .getattr(intern!(self.py, "flags"))
            .and_then(|flags| flags.setattr(intern!(self.py, "writeable"), false))
            .map_err(|_| HostError::Unsupported("read-only numpy views"))?;
        let view = array.into_any();
        self.refs.track_view(address(&view), shape.role);
        Ok(view)
    }

    fn retire(&mut self, view: &Self::Ref) {
        let held = usize::try_from(view.get_refcnt()).unwrap_or(0);
        if let Some((role, extra)) = self.refs.retire(address(view), held) {
            if extra > 0 {
                log::warn!(
                    "'{role}' array outlived its callback ({extra} extra references); it aliases \
                     solver memory that is reused after the call"
                );
            }
        }
    }

    fn pin(&mut self, value: &Self::Ref) {
        self.refs.pin(address(value));
    }

    fn unpin(&mut self, value: &Self::Ref) {
        if !self.refs.unpin(address(value)) {
            log::warn!("unbalanced unpin of a {}", self.type_name(value));
        }
    }

    fn persist(&mut self, value: &Self::Ref) -> Self::Handle {
        value.clone().unbind()
    }

    fn attach(&mut self, handle: &Self::Handle) -> Self::Ref {
        handle.bind(self.py).clone()
    }

    fn release(&mut self, handle: Self::Handle) {
        drop(handle);
    }

    fn call(&mut self, function: &Self::Ref, args: [&Self::Ref; 3]) -> Result<Self::Ref, HostError> {
        if !function.is_callable() {
            return Err(HostError::NotCallable {
                found: self.type_name(function),
            });
        }
        let [t, y, yp] = args;
        let result = function.call1((t, y, yp)).map_err(|e| {
            let reason = e.to_string();
            e.print(self.py);
            HostError::UserFailure(reason)
        })?;
        self.note_derived(&result);
        Ok(result)
    }

    fn with_f64_slice<T>(
        &self,
        value: &Self::Ref,
        f: impl FnOnce(&[f64]) -> T,
    ) -> Result<T, HostError> {
        let untyped = value
            .cast::<PyUntypedArray>()
            .map_err(|_| HostError::NotF64Array {
                found: self.type_name(value),
            })?;
        let dtype = untyped.dtype();
        let is_f64 = dtype.is_equiv_to(&numpy::dtype::<f64>(self.py));
        if !is_result_shape(untyped.shape(), is_f64) {
            return Err(HostError::NotF64Array {
                found: describe_array(untyped.shape(), &dtype.to_string()),
            });
        }
        let array = value
            .cast::<PyArray1<f64>>()
            .map_err(|_| HostError::NotF64Array {
                found: self.type_name(value),
            })?;
        let readonly = array
            .try_readonly()
            .map_err(|_| HostError::Unsupported("reading an array borrowed mutably"))?;
        let values = readonly.as_slice().map_err(|_| HostError::NotF64Array {
            found: "non-contiguous ndarray".to_owned(),
        })?;
        Ok(f(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_dimensional_f64_results_are_accepted() {
        assert!(is_result_shape(&[3], true));
        assert!(is_result_shape(&[0], true));
        assert!(!is_result_shape(&[3], false));
        assert!(!is_result_shape(&[], true));
        assert!(!is_result_shape(&[2, 1], true));
        assert!(!is_result_shape(&[1, 2], true));
    }

    #[test]
    fn rejected_arrays_are_described_by_shape() {
        assert_eq!(describe_array(&[], "float64"), "0-d float64 ndarray");
        assert_eq!(describe_array(&[4], "int64"), "int64 ndarray of length 4");
        assert_eq!(
            describe_array(&[2, 1], "float64"),
            "2-d float64 ndarray of shape [2, 1]"
        );
    }

    #[test]
    fn slice_returned_as_result_is_not_an_escape() {
        let mut refs = RefLedger::default();
        let (y, result) = (0x10, 0x20);
        refs.track_view(y, ViewRole::State);
        refs.pin(y);
        refs.derive(y);
        refs.pin(result);
        // Caller, pin, and the result's `base`.
        assert_eq!(refs.retire(y, 3), Some((ViewRole::State, 0)));
    }

    #[test]
    fn kept_view_is_reported() {
        let mut refs = RefLedger::default();
        refs.track_view(0x10, ViewRole::Derivative);
        refs.pin(0x10);
        assert_eq!(refs.retire(0x10, 4), Some((ViewRole::Derivative, 2)));
        assert_eq!(refs.retire(0x10, 4), None);
    }

    #[test]
    fn derived_count_does_not_outlive_its_view() {
        let mut refs = RefLedger::default();
        refs.track_view(0x10, ViewRole::Time);
        refs.derive(0x10);
        assert_eq!(refs.retire(0x10, 2), Some((ViewRole::Time, 0)));
        // A new view at the same address starts clean.
        refs.track_view(0x10, ViewRole::Time);
        assert_eq!(refs.retire(0x10, 2), Some((ViewRole::Time, 1)));
    }

    #[test]
    fn unbalanced_unpin_is_detected() {
        let mut refs = RefLedger::default();
        refs.pin(0x30);
        refs.pin(0x30);
        assert!(refs.unpin(0x30));
        assert!(refs.unpin(0x30));
        assert!(!refs.unpin(0x30));
    }
}
