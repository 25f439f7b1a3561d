//! Reusable user functions and heap sessions.
//!
//! - [`y_minus_yp`]: the reference residual `f(t, y, yp) = y - yp`.
//! - [`first_roots`]: event function returning `y[..m] - t`.
//! - [`failing_after`]: succeeds `n` times, then fails on every call.
//! - [`heap_session`]: a [`HeapSession`] with the residual (and optionally
//!   the event function) already bound under the DASKR names.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dae_bridge_core::resolve::{DASKR_EVENT, DASKR_RESIDUAL};
use dae_bridge_core::{Bridge, BridgeConfig, HostError};
use dae_bridge_heap::{HeapConfig, HeapSession, ManagedHeap, NativeFunction};

/// `f(t, y, yp) = y - yp`, bound as `name`.
pub fn y_minus_yp(name: &str) -> NativeFunction {
    NativeFunction::from_slices(name, |_, y, yp| {
        Ok(y.iter().zip(yp).map(|(a, b)| a - b).collect())
    })
}

/// `g(t, y, yp) = y[..m] - t`, bound as `name`.
pub fn first_roots(name: &str, m: usize) -> NativeFunction {
    NativeFunction::from_slices(name, move |t, y, _| {
        Ok(y.iter().take(m).map(|v| v - t[0]).collect())
    })
}

/// Wraps `inner`; after `n` successful calls every call fails.
///
/// The returned counter reports how many calls were made.
pub fn failing_after(inner: NativeFunction, n: usize) -> (NativeFunction, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let name = inner.name().to_owned();
    let f = NativeFunction::new(name, move |heap, args| {
        let made = counter.fetch_add(1, Ordering::SeqCst);
        if made >= n {
            return Err(HostError::UserFailure(format!("deliberate failure on call {}", made + 1)));
        }
        inner.call(heap, args)
    });
    (f, calls)
}

/// A heap with the reference residual bound, plus `m` root functions when
/// `m > 0`.
pub fn reference_heap(heap_config: HeapConfig, m: usize) -> ManagedHeap {
    let mut heap = ManagedHeap::with_config(heap_config);
    heap.define_function(y_minus_yp(DASKR_RESIDUAL));
    if m > 0 {
        heap.define_function(first_roots(DASKR_EVENT, m));
    }
    heap
}

/// A session over [`reference_heap`], resolved at setup.
pub fn heap_session(config: BridgeConfig, heap_config: HeapConfig, m: usize) -> HeapSession {
    let mut heap = reference_heap(heap_config, m);
    match Bridge::resolve_at_setup(&mut heap, config) {
        Ok(bridge) => HeapSession::new(heap, bridge),
        Err(e) => panic!("reference heap failed to bind: {e}"),
    }
}
