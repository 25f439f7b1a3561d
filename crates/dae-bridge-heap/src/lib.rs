//! In-process managed heap host for the DAE callback bridge.
//!
//! [`ManagedHeap`] is a deliberately small garbage-collected runtime: objects
//! live in a slot+generation table, roots are pins plus the string-keyed
//! namespace, and [`ManagedHeap::collect`] sweeps everything else. User
//! functions are native closures ([`NativeFunction`]).
//!
//! Its point is to make rooting mistakes observable. With
//! [`HeapConfig::stress`] the heap collects before every allocation, so a
//! reference the bridge forgot to pin turns into a
//! [`HostError::StaleReference`](dae_bridge_core::HostError::StaleReference)
//! at the next allocation instead of a silent use-after-free. Views are
//! retired when the invocation ends, so a view that escapes into the
//! namespace reads as
//! [`HostError::RetiredView`](dae_bridge_core::HostError::RetiredView).
//!
//! ```
//! use dae_bridge_core::{Bridge, BridgeConfig, CallbackTarget, Invocation,
//!     LengthParameters, RawBuffer, ViewRole};
//! use dae_bridge_heap::{HeapSession, ManagedHeap, NativeFunction};
//!
//! let mut heap = ManagedHeap::new();
//! heap.define_function(NativeFunction::from_slices("__daskr_res_callback", |_, y, yp| {
//!     Ok(y.iter().zip(yp).map(|(a, b)| a - b).collect())
//! }));
//! let bridge = Bridge::resolve_at_setup(&mut heap, BridgeConfig::default()).unwrap();
//! let mut session = HeapSession::new(heap, bridge);
//!
//! let mut res = [0.0; 2];
//! session.residual(Invocation {
//!     t: RawBuffer::from_slice(ViewRole::Time, &[0.0]),
//!     y: RawBuffer::from_slice(ViewRole::State, &[1.0, 2.0]),
//!     yp: RawBuffer::from_slice(ViewRole::Derivative, &[0.5, 0.5]),
//!     ipar: LengthParameters::from_slice(&[2]),
//!     res: &mut res,
//! }).unwrap();
//! assert_eq!(res, [0.5, 1.5]);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod heap;
pub mod host;
pub mod object;
pub mod table;

pub use config::HeapConfig;
pub use heap::{HeapStats, ManagedHeap};
pub use host::Rooted;
pub use object::{NativeBody, NativeFunction};
pub use table::ObjRef;

/// A managed heap paired with its bridge; installable as a callback target.
pub type HeapSession = dae_bridge_core::Session<ManagedHeap>;
