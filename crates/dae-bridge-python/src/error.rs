//! DaeStatus -> Python exception mapping with recovery hints.

use pyo3::exceptions::{PyLookupError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::{PyErr, PyResult};

use dae_bridge_core::BridgeError;
use dae_bridge_ffi::DaeStatus;

/// Check a status code. Returns `Ok(())` on success, raises a typed Python
/// exception with a recovery hint on error.
pub(crate) fn check_status(code: i32) -> PyResult<()> {
    if code == DaeStatus::Ok as i32 {
        return Ok(());
    }
    let (msg, hint) = error_detail(code);
    Err(status_error(code, format!("dae-bridge error {code}: {msg}\n  Hint: {hint}")))
}

/// Raise `error` with the hint for its status code.
pub(crate) fn bridge_error(error: &BridgeError) -> PyErr {
    let code = DaeStatus::from(error) as i32;
    let (_, hint) = error_detail(code);
    status_error(code, format!("{error}\n  Hint: {hint}"))
}

/// Raise the error for a registry operation that was refused.
pub(crate) fn registry_error(status: DaeStatus) -> PyErr {
    let code = status as i32;
    check_status(code)
        .err()
        .unwrap_or_else(|| PyRuntimeError::new_err("registry refused the operation"))
}

fn status_error(code: i32, full: String) -> PyErr {
    match DaeStatus::from_raw(code) {
        Some(DaeStatus::UnresolvedBinding) => PyLookupError::new_err(full),
        Some(DaeStatus::TypeMismatch) => PyTypeError::new_err(full),

        // Lengths and configuration (caller's fault) → ValueError
        Some(
            DaeStatus::LengthMismatch
            | DaeStatus::InvalidLengthParameter
            | DaeStatus::BufferTooShort
            | DaeStatus::ConfigError
            | DaeStatus::InvalidArgument,
        ) => PyValueError::new_err(full),

        _ => PyRuntimeError::new_err(full),
    }
}

/// Returns `(message, recovery_hint)` for each status code.
fn error_detail(code: i32) -> (&'static str, &'static str) {
    match DaeStatus::from_raw(code) {
        Some(DaeStatus::Ok) => ("ok", "No action needed."),
        Some(DaeStatus::UnresolvedBinding) => (
            "user function is not bound",
            "Define the residual (and, with root finding, the event) function \
             in the namespace before the solve starts, or pass `event=` when \
             constructing the Bridge.",
        ),
        Some(DaeStatus::TypeMismatch) => (
            "value has the wrong type",
            "Bindings must be callables taking (t, y, yp). They must return a \
             one-dimensional contiguous numpy float64 array; a (N, 1) or 0-d \
             result is rejected, not reshaped. Convert with \
             `numpy.ascontiguousarray(out, dtype=numpy.float64).ravel()`.",
        ),
        Some(DaeStatus::LengthMismatch) => (
            "user function returned too few values",
            "The residual must return at least N values (N = len(y)); the \
             event function must return at least as many values as there \
             are root functions.",
        ),
        Some(DaeStatus::UserFunctionFailure) => (
            "user function raised",
            "The traceback was printed above. Construct the Bridge with \
             on_user_error=\"retry\" if the failure is transient and the \
             solver should retry with a smaller step.",
        ),
        Some(DaeStatus::InvalidLengthParameter) => (
            "ipar does not hold a usable length",
            "ipar[0] must be the number of equations (>= 1) and ipar[1] the \
             number of root functions (>= 0). If state_len or event_count \
             was given, they must match ipar.",
        ),
        Some(DaeStatus::BufferTooShort) => (
            "solver buffer shorter than its declared length",
            "y and yp must hold ipar[0] values and the output buffer must \
             hold the output length.",
        ),
        Some(DaeStatus::ConfigError) => (
            "configuration error",
            "state_len must be at least 1 and binding names must not be empty.",
        ),
        Some(DaeStatus::HostError) => (
            "the Python host failed",
            "A value could not be read or a view could not be created. Check \
             that numpy is importable and that user functions do not keep \
             the arrays they are given.",
        ),
        Some(DaeStatus::NotInstalled) => (
            "no bridge installed",
            "Call bridge.install() before handing callback_addresses() to \
             the solver.",
        ),
        Some(DaeStatus::Busy) => (
            "a callback is already running",
            "User functions must not install, uninstall or evaluate a Bridge \
             while the solver is calling them.",
        ),
        Some(DaeStatus::InvalidArgument) => (
            "null pointer argument",
            "The solver passed a null buffer. Check the driver's argument list.",
        ),
        Some(DaeStatus::InternalError) => (
            "internal error",
            "An earlier callback panicked. Install the Bridge again to recover.",
        ),
        Some(DaeStatus::Panicked) => (
            "panic caught at the FFI boundary",
            "This is a bug in dae-bridge. The integration was stopped; \
             install the Bridge again to continue.",
        ),
        None => (
            "unknown dae-bridge error",
            "An unrecognized status code was returned. This may indicate a \
             version mismatch between the Python bindings and the native \
             library.",
        ),
    }
}
