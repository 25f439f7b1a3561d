//! dae-bridge: a callback bridge between native DAE solvers and managed
//! host runtimes.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use dae_bridge::prelude::*;
//!
//! // The user residual lives in the managed heap under its DASKR name.
//! let mut heap = ManagedHeap::new();
//! heap.define_function(NativeFunction::from_slices(DASKR_RESIDUAL, |_, y, yp| {
//!     Ok(y.iter().zip(yp).map(|(a, b)| a - b).collect())
//! }));
//! let bridge = Bridge::resolve_at_setup(&mut heap, BridgeConfig::default()).unwrap();
//! let mut session = HeapSession::new(heap, bridge);
//!
//! // One residual call, as the solver would make it.
//! let (t, y, yp, ipar) = ([0.0], [3.0, 2.0], [1.0, 1.0], [2, 0]);
//! let mut res = [0.0; 2];
//! session
//!     .residual(Invocation {
//!         t: RawBuffer::from_slice(ViewRole::Time, &t),
//!         y: RawBuffer::from_slice(ViewRole::State, &y),
//!         yp: RawBuffer::from_slice(ViewRole::Derivative, &yp),
//!         ipar: LengthParameters::from_slice(&ipar),
//!         res: &mut res,
//!     })
//!     .unwrap();
//! assert_eq!(res, [2.0, 1.0]);
//! ```
//!
//! To hand the bridge to a Fortran solver instead, install the session
//! with [`ffi::install`] and pass [`ffi::dae_bridge_daskr_res`] (and
//! [`ffi::dae_bridge_daskr_event`]) as the `RES`/`RT` arguments.
//!
//! # Modules
//!
//! | Module | Crate | Contents |
//! |--------|-------|----------|
//! | [`bridge`] | `dae-bridge-core` | Bridge, host seam, rooting, views, errors |
//! | [`heap`] | `dae-bridge-heap` | In-process managed heap host |
//! | [`ffi`] | `dae-bridge-ffi` | `extern "C"` entry points and status codes |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Bridge, host runtime seam, rooting and error types (`dae-bridge-core`).
///
/// [`bridge::HostRuntime`] is the extension point for new hosts.
pub use dae_bridge_core as bridge;

/// In-process managed heap host (`dae-bridge-heap`).
///
/// A mark-and-sweep heap with generational handles, used as the reference
/// host and for testing rooting under forced collections.
pub use dae_bridge_heap as heap;

/// Native entry points (`dae-bridge-ffi`).
///
/// [`ffi::dae_bridge_daskr_res`], [`ffi::dae_bridge_dassl_res`] and
/// [`ffi::dae_bridge_daskr_event`] forward to the installed
/// [`bridge::CallbackTarget`].
pub use dae_bridge_ffi as ffi;

/// Common imports for typical usage.
///
/// ```rust
/// use dae_bridge::prelude::*;
/// ```
pub mod prelude {
    // Bridge and configuration
    pub use dae_bridge_core::{
        Bridge, BridgeConfig, CallbackTarget, FailurePolicy, Session, ViewStrategy,
    };

    // Invocation arguments
    pub use dae_bridge_core::{Invocation, LengthParameters, RawBuffer, ViewRole};

    // Bindings
    pub use dae_bridge_core::resolve::{
        BindingNames, Bindings, DASKR_EVENT, DASKR_RESIDUAL, DASSL_RESIDUAL,
    };

    // Errors
    pub use dae_bridge_core::{BridgeError, HostError};

    // Heap host
    pub use dae_bridge_heap::{HeapConfig, HeapSession, ManagedHeap, NativeFunction};

    // Native layer
    pub use dae_bridge_ffi::{DaeStatus, IRES_ABORT, IRES_RETRY};
}
