//! C entry points for the DAE callback bridge.
//!
//! A DASSL or DASKR driver passes these functions to the solver as its
//! residual (`RES`) and root (`RT`) subroutines. Each call is forwarded to
//! the process-wide installed [`CallbackTarget`](dae_bridge_core::CallbackTarget),
//! typically a [`Session`](dae_bridge_core::Session) over some host runtime.
//!
//! ```text
//! solver ──► dae_bridge_daskr_res / dae_bridge_dassl_res / dae_bridge_daskr_event
//!              │  catch_unwind, null checks, ipar
//!              ▼
//!            registry (installed target, serialized)
//!              ▼
//!            Bridge::residual / Bridge::event
//! ```
//!
//! Failures are reported to the solver through `IRES` (`-1` retry with a
//! smaller step, `-2` terminate) and to the driver through
//! [`dae_bridge_last_status`]. This crate is the only one besides the hosts
//! that contains `unsafe` code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run `$body` with panics contained, yielding an `i32` status code.
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(code) => code,
            Err(_) => {
                log::error!("panic caught at the FFI boundary");
                $crate::status::DaeStatus::Panicked as i32
            }
        }
    };
}

pub mod callbacks;
pub mod registry;
pub mod status;

pub use callbacks::{dae_bridge_daskr_event, dae_bridge_daskr_res, dae_bridge_dassl_res};
pub use registry::{
    dae_bridge_is_installed, dae_bridge_last_status, dae_bridge_uninstall, install,
    is_installed, last_status, uninstall,
};
pub use status::{DaeStatus, IRES_ABORT, IRES_RETRY};
