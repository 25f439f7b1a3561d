//! Python bindings for the DAE callback bridge.
//!
//! The native extension is named `_dae_bridge`. It exposes `Bridge`, which
//! connects Python residual and event functions to a DASSL/DASKR solver
//! through the C entry points of `dae-bridge-ffi`, with numpy arrays as
//! zero-copy views over the solver's buffers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unsafe_code)]

use pyo3::prelude::*;

mod bridge;
mod error;
mod host;

/// Status of the most recent native callback (0 on success).
#[pyfunction]
fn last_status() -> i32 {
    dae_bridge_ffi::dae_bridge_last_status()
}

/// The native `_dae_bridge` extension module.
#[pymodule]
fn _dae_bridge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bridge::Bridge>()?;
    m.add_function(wrap_pyfunction!(last_status, m)?)?;

    m.add("DASKR_RESIDUAL", dae_bridge_core::resolve::DASKR_RESIDUAL)?;
    m.add("DASKR_EVENT", dae_bridge_core::resolve::DASKR_EVENT)?;
    m.add("DASSL_RESIDUAL", dae_bridge_core::resolve::DASSL_RESIDUAL)?;
    m.add("IRES_RETRY", dae_bridge_ffi::IRES_RETRY)?;
    m.add("IRES_ABORT", dae_bridge_ffi::IRES_ABORT)?;

    Ok(())
}
