//! Callback Dispatcher: the fixed `(t, y, yp)` call into user code.

use crate::error::{BridgeError, HostError};
use crate::guard::RootGuard;
use crate::host::HostRuntime;
use crate::view::StateViews;

/// Call `function` with the three state views and root its result.
///
/// `function_name` is the binding name, used to label failures.
pub(crate) fn invoke<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    function: &H::Ref,
    function_name: &str,
    views: &StateViews<H::Ref>,
) -> Result<H::Ref, BridgeError> {
    let result = guard
        .host()
        .call(function, views.args())
        .map_err(|e| classify_call_error(e, function_name))?;
    guard.root(&result);
    Ok(result)
}

/// Map a host failure raised by the call itself into the bridge taxonomy.
pub(crate) fn classify_call_error(error: HostError, function_name: &str) -> BridgeError {
    match error {
        HostError::UserFailure(reason) => BridgeError::UserFunctionFailure {
            function: function_name.to_owned(),
            reason,
        },
        HostError::NotCallable { found } => BridgeError::TypeMismatch {
            what: function_name.to_owned(),
            expected: "callable",
            found,
        },
        other => BridgeError::Host(other),
    }
}

/// Map a failure to read the call result into the bridge taxonomy.
pub(crate) fn classify_result_error(error: HostError) -> BridgeError {
    match error {
        HostError::NotF64Array { found } => BridgeError::TypeMismatch {
            what: "result".to_owned(),
            expected: "f64 array",
            found,
        },
        other => BridgeError::Host(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{RawBuffer, ViewRole};
    use crate::mock::MockHost;
    use crate::view::{materialize, StateBuffers};
    use crate::ViewStrategy;

    fn call(host: &mut MockHost, f: usize) -> Result<Vec<f64>, BridgeError> {
        let (t, y, yp) = ([0.0], [1.0, 2.0], [0.5, 0.5]);
        let buffers = StateBuffers {
            t: RawBuffer::from_slice(ViewRole::Time, &t),
            y: RawBuffer::from_slice(ViewRole::State, &y),
            yp: RawBuffer::from_slice(ViewRole::Derivative, &yp),
        };
        let mut guard = RootGuard::acquire(host);
        let views = materialize(&mut guard, ViewStrategy::Fresh, &mut None, &buffers)?;
        let result = invoke(&mut guard, &f, "f", &views)?;
        guard
            .host_ref()
            .with_f64_slice(&result, |v| v.to_vec())
            .map_err(classify_result_error)
    }

    #[test]
    fn passes_t_y_yp_in_order() {
        let mut host = MockHost::new();
        let f = host.function(|a| Ok(vec![a[0].len() as f64, a[1][1], a[2][0]]));
        assert_eq!(call(&mut host, f), Ok(vec![1.0, 2.0, 0.5]));
    }

    #[test]
    fn user_failure_is_distinguishable() {
        let mut host = MockHost::new();
        let f = host.function(|_| Err("singular jacobian".into()));
        assert_eq!(
            call(&mut host, f),
            Err(BridgeError::UserFunctionFailure {
                function: "f".into(),
                reason: "singular jacobian".into()
            })
        );
        assert_eq!(host.total_pins(), 0);
    }

    #[test]
    fn non_callable_is_type_mismatch() {
        let mut host = MockHost::new();
        let t = host.text();
        assert!(matches!(
            call(&mut host, t),
            Err(BridgeError::TypeMismatch {
                expected: "callable",
                ..
            })
        ));
    }

    #[test]
    fn non_array_result_is_type_mismatch() {
        assert_eq!(
            classify_result_error(HostError::NotF64Array {
                found: "text".into()
            }),
            BridgeError::TypeMismatch {
                what: "result".into(),
                expected: "f64 array",
                found: "text".into()
            }
        );
    }
}
