//! End-to-end properties of the bridge over the managed heap.

use dae_bridge_core::resolve::{DASKR_EVENT, DASKR_RESIDUAL};
use dae_bridge_core::{
    Bridge, BridgeConfig, BridgeError, Invocation, LengthParameters, RawBuffer, ViewRole,
    ViewStrategy,
};
use dae_bridge_heap::{HeapConfig, ManagedHeap, NativeFunction, Rooted};
use proptest::prelude::*;

fn invocation<'a>(
    t: &'a [f64],
    y: &'a [f64],
    yp: &'a [f64],
    ipar: &[i32],
    res: &'a mut [f64],
) -> Invocation<'a> {
    Invocation {
        t: RawBuffer::from_slice(ViewRole::Time, t),
        y: RawBuffer::from_slice(ViewRole::State, y),
        yp: RawBuffer::from_slice(ViewRole::Derivative, yp),
        ipar: LengthParameters::from_slice(ipar),
        res,
    }
}

fn y_minus_yp() -> NativeFunction {
    NativeFunction::from_slices(DASKR_RESIDUAL, |_, y, yp| {
        Ok(y.iter().zip(yp).map(|(a, b)| a - b).collect())
    })
}

fn setup(strategy: ViewStrategy, heap_config: HeapConfig) -> (ManagedHeap, Bridge<Rooted>) {
    let mut heap = ManagedHeap::with_config(heap_config);
    heap.define_function(y_minus_yp());
    let config = BridgeConfig {
        view_strategy: strategy,
        ..Default::default()
    };
    let bridge = Bridge::resolve_at_setup(&mut heap, config).unwrap();
    (heap, bridge)
}

#[test]
fn residual_of_y_minus_yp() {
    let (mut heap, mut bridge) = setup(ViewStrategy::Fresh, HeapConfig::default());
    let mut res = [f64::NAN; 4];
    bridge
        .residual(
            &mut heap,
            invocation(&[0.0], &[1.0, 2.0], &[0.5, 0.5], &[2], &mut res),
        )
        .unwrap();
    assert_eq!(&res[..2], &[0.5, 1.5]);
    assert!(res[2..].iter().all(|v| v.is_nan()));
}

#[test]
fn event_copies_ipar_1_elements() {
    let mut heap = ManagedHeap::new();
    heap.define_function(y_minus_yp());
    heap.define_function(NativeFunction::from_slices(DASKR_EVENT, |t, y, _| {
        Ok(vec![y[0] - t[0], y[4] - t[0], 1e9, 1e9])
    }));
    let mut bridge = Bridge::resolve_at_setup(&mut heap, BridgeConfig::default()).unwrap();
    let y = [3.0, 0.0, 0.0, 0.0, 7.0];
    let mut res = [f64::NAN; 5];
    bridge
        .event(&mut heap, invocation(&[1.0], &y, &[0.0; 5], &[5, 2], &mut res))
        .unwrap();
    assert_eq!(&res[..2], &[2.0, 6.0]);
    assert!(res[2..].iter().all(|v| v.is_nan()));
}

#[test]
fn mutating_y_after_the_call_does_not_change_res() {
    let (mut heap, mut bridge) = setup(ViewStrategy::Reuse, HeapConfig::default());
    let mut y = vec![1.0, 2.0];
    let mut res = [0.0; 2];
    bridge
        .residual(&mut heap, invocation(&[0.0], &y, &[0.0, 0.0], &[2], &mut res))
        .unwrap();
    y[0] = 100.0;
    y[1] = 200.0;
    assert_eq!(res, [1.0, 2.0]);
}

#[test]
fn missing_binding_fails_before_any_write() {
    let mut heap = ManagedHeap::new();
    let err = Bridge::<Rooted>::resolve_at_setup(&mut heap, BridgeConfig::default())
        .err()
        .unwrap();
    assert_eq!(
        err,
        BridgeError::UnresolvedBinding {
            name: DASKR_RESIDUAL.into()
        }
    );

    let mut bridge: Bridge<Rooted> = Bridge::resolve_per_call(BridgeConfig::default()).unwrap();
    let mut res = [42.0; 2];
    let err = bridge
        .residual(&mut heap, invocation(&[0.0], &[1.0, 2.0], &[0.0; 2], &[2], &mut res))
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnresolvedBinding { .. }));
    assert_eq!(res, [42.0; 2]);
}

#[test]
fn sequential_calls_with_different_n_do_not_leak() {
    for strategy in [ViewStrategy::Fresh, ViewStrategy::Reuse] {
        let mut heap = ManagedHeap::new();
        // Reports the time view's length and then echoes y.
        heap.define_function(NativeFunction::from_slices(DASKR_RESIDUAL, |t, y, _| {
            let mut out = vec![t.len() as f64];
            out.extend_from_slice(y);
            Ok(out)
        }));
        let config = BridgeConfig {
            view_strategy: strategy,
            ..Default::default()
        };
        let mut bridge = Bridge::resolve_at_setup(&mut heap, config).unwrap();

        let mut res = [0.0; 4];
        bridge
            .residual(
                &mut heap,
                invocation(&[0.0], &[9.0, 9.0, 9.0, 9.0], &[0.0; 4], &[4], &mut res),
            )
            .unwrap();
        assert_eq!(res, [1.0, 9.0, 9.0, 9.0]);

        let mut res = [f64::NAN; 4];
        bridge
            .residual(&mut heap, invocation(&[1.0], &[5.0], &[0.0], &[1], &mut res))
            .unwrap();
        assert_eq!(res[0], 1.0);
        assert!(res[1..].iter().all(|v| v.is_nan()), "{strategy:?}: {res:?}");
    }
}

#[test]
fn short_result_is_a_length_mismatch() {
    let mut heap = ManagedHeap::new();
    heap.define_function(NativeFunction::from_slices(DASKR_RESIDUAL, |_, _, _| {
        Ok(vec![1.0])
    }));
    let mut bridge = Bridge::resolve_at_setup(&mut heap, BridgeConfig::default()).unwrap();
    let mut res = [0.25; 3];
    let err = bridge
        .residual(&mut heap, invocation(&[0.0], &[0.0; 3], &[0.0; 3], &[3], &mut res))
        .unwrap_err();
    assert_eq!(
        err,
        BridgeError::LengthMismatch {
            expected: 3,
            found: 1
        }
    );
    assert_eq!(res, [0.25; 3]);
}

#[test]
fn non_array_result_is_a_type_mismatch() {
    let mut heap = ManagedHeap::new();
    heap.define_function(NativeFunction::new(DASKR_RESIDUAL, |heap, _| {
        Ok(heap.alloc_text("not an array"))
    }));
    let mut bridge = Bridge::resolve_at_setup(&mut heap, BridgeConfig::default()).unwrap();
    let mut res = [0.0];
    let err = bridge
        .residual(&mut heap, invocation(&[0.0], &[0.0], &[0.0], &[1], &mut res))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::TypeMismatch {
            expected: "f64 array",
            ..
        }
    ));
}

#[test]
fn non_callable_binding_is_rejected_at_setup() {
    let mut heap = ManagedHeap::new();
    let text = heap.alloc_text("f");
    heap.define(DASKR_RESIDUAL, text);
    let err = Bridge::<Rooted>::resolve_at_setup(&mut heap, BridgeConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        BridgeError::TypeMismatch {
            expected: "callable",
            ..
        }
    ));
}

#[test]
fn injected_bindings_skip_the_namespace() {
    let mut heap = ManagedHeap::new();
    let f = heap.alloc_function(y_minus_yp());
    let root = dae_bridge_core::HostRuntime::persist(&mut heap, &f);
    let bindings = dae_bridge_core::Bindings {
        residual: root,
        event: None,
    };
    let mut bridge = Bridge::new(BridgeConfig::default(), bindings).unwrap();
    let mut res = [0.0];
    bridge
        .residual(&mut heap, invocation(&[0.0], &[3.0], &[1.0], &[1], &mut res))
        .unwrap();
    assert_eq!(res, [2.0]);
    assert_eq!(heap.lookup(DASKR_RESIDUAL), None);
    bridge.teardown(&mut heap);
    assert_eq!(heap.pin_count(f), Some(0));
}

proptest! {
    #[test]
    fn copies_exactly_n_for_every_n(
        n in 1usize..48,
        slack in 0usize..8,
        reuse in any::<bool>(),
        seed in -1e3f64..1e3,
    ) {
        let strategy = if reuse { ViewStrategy::Reuse } else { ViewStrategy::Fresh };
        let (mut heap, mut bridge) = setup(strategy, HeapConfig::default());
        let y: Vec<f64> = (0..n + slack).map(|i| seed + i as f64).collect();
        let yp: Vec<f64> = (0..n + slack).map(|i| i as f64 * 0.5).collect();
        let mut res = vec![f64::INFINITY; n + slack];
        bridge
            .residual(&mut heap, invocation(&[0.0], &y, &yp, &[n as i32], &mut res))
            .unwrap();
        for i in 0..n {
            prop_assert_eq!(res[i], y[i] - yp[i]);
        }
        prop_assert!(res[n..].iter().all(|v| *v == f64::INFINITY));
    }
}
