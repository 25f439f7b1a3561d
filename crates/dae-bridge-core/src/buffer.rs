//! Solver-owned buffers and the statically typed view descriptor.
//!
//! A [`RawBuffer`] is a borrowed window onto memory the solver allocated.
//! The bridge never frees or resizes it, and its lifetime parameter pins it
//! to a single callback invocation.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Which solver argument a view aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewRole {
    /// Elapsed time `t`; always exactly one element.
    Time,
    /// State vector `y`; `ipar[0]` elements.
    State,
    /// Derivative vector `yp`; `ipar[0]` elements.
    Derivative,
}

impl ViewRole {
    /// Roles in call-argument order.
    pub const ALL: [ViewRole; 3] = [ViewRole::Time, ViewRole::State, ViewRole::Derivative];

    /// Name of the solver argument this role aliases.
    pub fn arg_name(self) -> &'static str {
        match self {
            ViewRole::Time => "t",
            ViewRole::State => "y",
            ViewRole::Derivative => "yp",
        }
    }
}

impl fmt::Display for ViewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arg_name())
    }
}

/// Shape of a one-dimensional f64 view.
///
/// Every view the bridge builds is a column vector of doubles, so the
/// descriptor is fully determined by its role and length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewDescriptor {
    /// Solver argument the view aliases.
    pub role: ViewRole,
    /// Element count.
    pub len: usize,
    /// Row count (equal to `len` for a column vector).
    pub nrows: usize,
}

/// Non-owning window onto a solver-owned `f64` buffer.
///
/// Holds a non-null pointer and an element count. The `'a` lifetime ties
/// the buffer to the invocation that received it; nothing derived from a
/// `RawBuffer` may outlive that invocation.
#[derive(Clone, Copy)]
pub struct RawBuffer<'a> {
    ptr: NonNull<f64>,
    len: usize,
    role: ViewRole,
    _solver: PhantomData<&'a [f64]>,
}

impl<'a> RawBuffer<'a> {
    /// Borrow a Rust slice as a solver buffer.
    pub fn from_slice(role: ViewRole, data: &'a [f64]) -> Self {
        Self {
            ptr: NonNull::from(data).cast::<f64>(),
            len: data.len(),
            role,
            _solver: PhantomData,
        }
    }

    /// Wrap a raw pointer handed over by the solver.
    ///
    /// Returns `None` if `ptr` is null.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` initialized, properly aligned `f64` values
    /// that stay valid and are not written by anyone else for `'a`.
    #[allow(unsafe_code)]
    pub unsafe fn from_raw(role: ViewRole, ptr: *const f64, len: usize) -> Option<Self> {
        let ptr = NonNull::new(ptr as *mut f64)?;
        Some(Self {
            ptr,
            len,
            role,
            _solver: PhantomData,
        })
    }

    /// The leading `len` elements, or `None` if the buffer is shorter.
    pub fn prefix(self, len: usize) -> Option<Self> {
        if len > self.len {
            return None;
        }
        Some(Self { len, ..self })
    }

    /// Base pointer of the buffer.
    pub fn as_ptr(&self) -> *const f64 {
        self.ptr.as_ptr()
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Solver argument this buffer was passed as.
    pub fn role(&self) -> ViewRole {
        self.role
    }

    /// Descriptor of the view that aliases this buffer.
    pub fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor {
            role: self.role,
            len: self.len,
            nrows: self.len,
        }
    }

    /// Read the buffer as a slice.
    #[allow(unsafe_code)]
    pub fn as_slice(&self) -> &'a [f64] {
        // SAFETY: both constructors guarantee `len` valid elements for 'a.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for RawBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("role", &self.role)
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
