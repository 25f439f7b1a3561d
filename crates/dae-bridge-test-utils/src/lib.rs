//! Test utilities for DAE callback bridge development.
//!
//! - [`CanaryBuffer`]: solver buffers with guard regions, to prove the bridge
//!   writes exactly the expected prefix and nothing on failure.
//! - [`MockSolver`]: owns `t`, `y`, `yp`, `ipar` and calls the native
//!   callbacks through function pointers with the DASSL/DASKR layout.
//! - [`fixtures`]: reference user functions and ready-bound heap sessions.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod canary;
pub mod fixtures;
pub mod solver;

pub use canary::{canary, CanaryBuffer, CANARY_BITS};
pub use solver::{
    DaskrResidualFn, DaskrRootFn, DasslResidualFn, MarchReport, MockSolver, ResidualOutcome,
};
