//! Callback bridge between a native DAE solver and a managed host runtime.
//!
//! A DASSL/DASKR-style solver calls back into user code at every residual
//! evaluation and, with root finding enabled, at every accepted step. The
//! solver owns every buffer it passes; the user code lives in a
//! garbage-collected runtime. This crate presents the solver's buffers to
//! that runtime as non-owning views, keeps everything the call touches
//! rooted, invokes the user function and copies its result back.
//!
//! # Architecture
//!
//! ```text
//! solver ──► Bridge::residual / Bridge::event
//!              ├── resolve        (Symbol Resolver: bound handles or per-call lookup)
//!              ├── RootGuard      (one per invocation, released on every exit path)
//!              │   ├── view       (View Materializer: Fresh or Reuse strategy)
//!              │   └── dispatch   (fixed (t, y, yp) call, result rooted)
//!              └── copy           (exactly N or M doubles into the solver buffer)
//! ```
//!
//! The runtime itself sits behind [`HostRuntime`]. `dae-bridge-heap` provides
//! an in-process managed heap; `dae-bridge-python` provides CPython/numpy.
//! The `extern "C"` entry points live in `dae-bridge-ffi`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod copy;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod host;
pub mod lengths;
pub mod resolve;
pub mod session;
pub mod view;

#[cfg(test)]
pub(crate) mod mock;

pub use bridge::{Bridge, Entry, Invocation};
pub use buffer::{RawBuffer, ViewDescriptor, ViewRole};
pub use config::{BridgeConfig, ConfigError, FailurePolicy, ViewStrategy};
pub use error::{BridgeError, HostError};
pub use guard::RootGuard;
pub use host::HostRuntime;
pub use lengths::LengthParameters;
pub use resolve::{BindingNames, Bindings};
pub use session::{CallbackTarget, Session};
