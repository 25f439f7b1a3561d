//! Benchmark profiles and utilities for the DAE callback bridge.
//!
//! - [`residual_session`]: a heap session bound to `f(t, y, yp) = y - yp`
//!   with a chosen view strategy and symbol resolution mode
//! - [`SolverState`]: solver-owned buffers for one system size, reusable
//!   across iterations
//! - [`STATE_SIZES`]: the system sizes every benchmark sweeps

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use dae_bridge_core::resolve::DASKR_RESIDUAL;
use dae_bridge_core::{
    Bridge, BridgeConfig, BridgeError, Invocation, LengthParameters, RawBuffer, ViewRole,
    ViewStrategy,
};
use dae_bridge_heap::{HeapConfig, HeapSession, ManagedHeap, NativeFunction};

/// System sizes swept by the benchmarks, from a scalar ODE to a
/// discretized PDE.
pub const STATE_SIZES: [usize; 4] = [1, 16, 256, 4096];

/// How the bridge finds the user function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Bound once at setup.
    AtSetup,
    /// Looked up by name on every call.
    PerCall,
}

/// A heap holding the residual `y - yp` under the DASKR name.
pub fn residual_heap(heap_config: HeapConfig) -> ManagedHeap {
    let mut heap = ManagedHeap::with_config(heap_config);
    heap.define_function(NativeFunction::from_slices(DASKR_RESIDUAL, |_, y, yp| {
        Ok(y.iter().zip(yp).map(|(a, b)| a - b).collect())
    }));
    heap
}

/// A ready session over [`residual_heap`].
pub fn residual_session(
    strategy: ViewStrategy,
    resolution: Resolution,
    heap_config: HeapConfig,
) -> Result<HeapSession, BridgeError> {
    let mut heap = residual_heap(heap_config);
    let config = BridgeConfig {
        view_strategy: strategy,
        ..Default::default()
    };
    let bridge = match resolution {
        Resolution::AtSetup => Bridge::resolve_at_setup(&mut heap, config)?,
        Resolution::PerCall => Bridge::resolve_per_call(config)?,
    };
    Ok(HeapSession::new(heap, bridge))
}

/// Solver-side buffers for an `n`-equation system.
#[derive(Clone, Debug)]
pub struct SolverState {
    pub t: [f64; 1],
    pub y: Vec<f64>,
    pub yp: Vec<f64>,
    pub ipar: [i32; 2],
    pub res: Vec<f64>,
}

impl SolverState {
    /// `y = 0, 1, 2, ...` and `yp = 1` so every residual entry differs.
    ///
    /// # Panics
    ///
    /// If `n` does not fit in an `i32`.
    pub fn new(n: usize) -> Self {
        let len = i32::try_from(n).expect("system size fits in ipar");
        Self {
            t: [0.0],
            y: (0..n).map(|i| i as f64).collect(),
            yp: vec![1.0; n],
            ipar: [len, 0],
            res: vec![0.0; n],
        }
    }

    /// Borrow the buffers as one residual invocation.
    pub fn invocation(&mut self) -> Invocation<'_> {
        Invocation {
            t: RawBuffer::from_slice(ViewRole::Time, &self.t),
            y: RawBuffer::from_slice(ViewRole::State, &self.y),
            yp: RawBuffer::from_slice(ViewRole::Derivative, &self.yp),
            ipar: LengthParameters::from_slice(&self.ipar),
            res: &mut self.res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dae_bridge_core::CallbackTarget;

    #[test]
    fn every_profile_computes_the_residual() {
        for strategy in [ViewStrategy::Fresh, ViewStrategy::Reuse] {
            for resolution in [Resolution::AtSetup, Resolution::PerCall] {
                let mut session =
                    residual_session(strategy, resolution, HeapConfig::default()).unwrap();
                let mut state = SolverState::new(16);
                session.residual(state.invocation()).unwrap();
                let expected: Vec<f64> = (0..16).map(|i| i as f64 - 1.0).collect();
                assert_eq!(state.res, expected, "{strategy:?} {resolution:?}");
            }
        }
    }

    #[test]
    fn repeated_calls_do_not_grow_the_heap() {
        let mut session =
            residual_session(ViewStrategy::Reuse, Resolution::AtSetup, HeapConfig::stress())
                .unwrap();
        let mut state = SolverState::new(4);
        session.residual(state.invocation()).unwrap();
        let live = session.host().live_objects();
        for _ in 0..100 {
            session.residual(state.invocation()).unwrap();
        }
        assert!(session.host().live_objects() <= live + 1);
    }
}
