//! The Python-visible `Bridge` and the callback target it installs.
//!
//! The installed target lives in the process-wide registry and is called
//! by the solver without the GIL. It re-acquires the GIL for each callback
//! and builds a fresh [`PyHost`] for that one invocation.

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use dae_bridge_core::resolve::{BindingNames, Bindings};
use dae_bridge_core::{
    BridgeConfig, BridgeError, CallbackTarget, FailurePolicy, Invocation, ViewStrategy,
};
use dae_bridge_ffi::{
    dae_bridge_daskr_event, dae_bridge_daskr_res, dae_bridge_dassl_res, install, last_status,
    uninstall, DaeStatus,
};

use crate::error::{bridge_error, check_status, registry_error};
use crate::host::PyHost;

/// What an installed Python bridge dispatches into.
pub(crate) struct PyTarget {
    bridge: dae_bridge_core::Bridge<Py<PyAny>>,
    namespace: Option<Py<PyDict>>,
}

impl PyTarget {
    fn evaluate(
        &mut self,
        call: Invocation<'_>,
        run: impl FnOnce(
            &mut dae_bridge_core::Bridge<Py<PyAny>>,
            &mut PyHost<'_>,
            Invocation<'_>,
        ) -> Result<(), BridgeError>,
    ) -> Result<(), BridgeError> {
        Python::attach(|py| {
            let namespace = self.namespace.as_ref().map(|ns| ns.bind(py).clone());
            let mut host = PyHost::new(py, namespace);
            run(&mut self.bridge, &mut host, call)
        })
    }
}

impl CallbackTarget for PyTarget {
    fn residual(&mut self, call: Invocation<'_>) -> Result<(), BridgeError> {
        self.evaluate(call, |bridge, host, call| bridge.residual(host, call))
    }

    fn event(&mut self, call: Invocation<'_>) -> Result<(), BridgeError> {
        self.evaluate(call, |bridge, host, call| bridge.event(host, call))
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.bridge.config().user_failure
    }
}

enum Source {
    Injected {
        residual: Py<PyAny>,
        event: Option<Py<PyAny>>,
    },
    Namespace {
        namespace: Py<PyDict>,
        per_call: bool,
    },
}

/// Connects Python residual and event functions to a DASSL/DASKR solver.
///
/// The functions are called as `f(t, y, yp)` with three read-only float64
/// arrays that alias solver memory; they are only valid during the call.
/// The residual returns at least `len(y)` values, the event function at
/// least as many values as there are root functions.
#[pyclass]
pub(crate) struct Bridge {
    source: Source,
    config: BridgeConfig,
}

#[pymethods]
impl Bridge {
    /// Create a bridge over the given functions.
    ///
    /// Args:
    ///     residual: Callable `(t, y, yp) -> ndarray[float64]`.
    ///     event: Optional root function with the same signature.
    ///     on_user_error: `"abort"` (default) stops the solve when a user
    ///         function raises; `"retry"` asks the solver for a smaller step.
    ///     state_len: Expected number of equations, checked on every call.
    ///     event_count: Expected number of root functions.
    #[new]
    #[pyo3(signature = (residual, event=None, on_user_error="abort", state_len=None, event_count=None))]
    fn new(
        residual: Bound<'_, PyAny>,
        event: Option<Bound<'_, PyAny>>,
        on_user_error: &str,
        state_len: Option<usize>,
        event_count: Option<usize>,
    ) -> PyResult<Self> {
        let names = BindingNames {
            residual: label(&residual, "residual")?,
            event: event.as_ref().map(|e| label(e, "event")).transpose()?,
        };
        let config = config(names, on_user_error, state_len, event_count)?;
        Ok(Bridge {
            source: Source::Injected {
                residual: residual.unbind(),
                event: event.map(Bound::unbind),
            },
            config,
        })
    }

    /// Create a bridge that looks its functions up in `namespace`.
    ///
    /// Args:
    ///     namespace: Dict holding the functions, e.g. `globals()`.
    ///     interface: `"daskr"` (residual `__daskr_res_callback`, event
    ///         `__daskr_event_callback`) or `"dassl"` (`__dassl_res_callback`).
    ///     per_call: Look the functions up on every call instead of once at
    ///         install time, so they may be redefined mid-solve.
    #[staticmethod]
    #[pyo3(signature = (namespace, interface="daskr", per_call=false, on_user_error="abort", state_len=None, event_count=None))]
    fn from_namespace(
        namespace: Bound<'_, PyDict>,
        interface: &str,
        per_call: bool,
        on_user_error: &str,
        state_len: Option<usize>,
        event_count: Option<usize>,
    ) -> PyResult<Self> {
        let names = match interface {
            "daskr" => BindingNames::daskr(),
            "dassl" => BindingNames::dassl(),
            other => {
                return Err(PyValueError::new_err(format!(
                    "interface must be \"daskr\" or \"dassl\", got {other:?}"
                )))
            }
        };
        let config = config(names, on_user_error, state_len, event_count)?;
        Ok(Bridge {
            source: Source::Namespace {
                namespace: namespace.unbind(),
                per_call,
            },
            config,
        })
    }

    /// Make this bridge the target of the native callbacks.
    ///
    /// Replaces any previously installed bridge.
    fn install(&self, py: Python<'_>) -> PyResult<()> {
        let target = self.target(py)?;
        install(Box::new(target)).map_err(registry_error)?;
        Ok(())
    }

    /// Remove the installed bridge, whichever it is.
    ///
    /// Returns:
    ///     True if a bridge was installed.
    #[staticmethod]
    fn uninstall() -> PyResult<bool> {
        Ok(uninstall().map_err(registry_error)?.is_some())
    }

    /// Addresses of the native callbacks, for handing to the solver.
    ///
    /// Returns:
    ///     Dict with keys `daskr_res`, `dassl_res` and `daskr_event`.
    #[staticmethod]
    fn callback_addresses(py: Python<'_>) -> PyResult<Bound<'_, PyDict>> {
        let addresses = PyDict::new(py);
        addresses.set_item("daskr_res", dae_bridge_daskr_res as usize)?;
        addresses.set_item("dassl_res", dae_bridge_dassl_res as usize)?;
        addresses.set_item("daskr_event", dae_bridge_daskr_event as usize)?;
        Ok(addresses)
    }

    /// Evaluate the residual through the native entry point.
    ///
    /// Installs this bridge for the duration of the call and restores the
    /// previous one afterwards.
    fn evaluate_residual<'py>(
        &self,
        py: Python<'py>,
        t: f64,
        y: PyReadonlyArray1<'py, f64>,
        yp: PyReadonlyArray1<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let (y, yp) = (y.as_slice()?, yp.as_slice()?);
        let n = state_len(y, yp)?;
        let ipar = [n, 0];
        let mut res = vec![0.0; y.len()];
        let (cj, rpar) = (1.0, [0.0]);
        let mut ires = 0;
        let status = self.with_installed(py, || {
            dae_bridge_daskr_res(
                &t,
                y.as_ptr(),
                yp.as_ptr(),
                &cj,
                res.as_mut_ptr(),
                &mut ires,
                rpar.as_ptr(),
                ipar.as_ptr(),
            );
            last_status()
        })?;
        check_status(status as i32)?;
        Ok(PyArray1::from_vec(py, res))
    }

    /// Evaluate the event functions through the native entry point.
    fn evaluate_event<'py>(
        &self,
        py: Python<'py>,
        t: f64,
        y: PyReadonlyArray1<'py, f64>,
        yp: PyReadonlyArray1<'py, f64>,
        n_events: usize,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let (y, yp) = (y.as_slice()?, yp.as_slice()?);
        let n = state_len(y, yp)?;
        let m = i32::try_from(n_events)
            .map_err(|_| PyValueError::new_err("n_events does not fit in an i32"))?;
        let ipar = [n, m];
        let mut rval = vec![0.0; n_events];
        let rpar = [0.0];
        let status = self.with_installed(py, || {
            dae_bridge_daskr_event(
                &n,
                &t,
                y.as_ptr(),
                yp.as_ptr(),
                &m,
                rval.as_mut_ptr(),
                rpar.as_ptr(),
                ipar.as_ptr(),
            );
            last_status()
        })?;
        check_status(status as i32)?;
        Ok(PyArray1::from_vec(py, rval))
    }

    fn __repr__(&self) -> String {
        let source = match &self.source {
            Source::Injected { .. } => "injected",
            Source::Namespace { per_call: true, .. } => "namespace, per call",
            Source::Namespace { per_call: false, .. } => "namespace",
        };
        format!(
            "Bridge(residual={:?}, event={:?}, {source}, on_user_error={:?})",
            self.config.names.residual,
            self.config.names.event,
            self.config.user_failure,
        )
    }
}

impl Bridge {
    /// Build a fresh callback target from this bridge's bindings.
    fn target(&self, py: Python<'_>) -> PyResult<PyTarget> {
        let config = self.config.clone();
        let (bridge, namespace) = match &self.source {
            Source::Injected { residual, event } => {
                let bindings = Bindings {
                    residual: residual.clone_ref(py),
                    event: event.as_ref().map(|e| e.clone_ref(py)),
                };
                (dae_bridge_core::Bridge::new(config, bindings), None)
            }
            Source::Namespace {
                namespace,
                per_call: true,
            } => (
                dae_bridge_core::Bridge::resolve_per_call(config),
                Some(namespace.clone_ref(py)),
            ),
            Source::Namespace {
                namespace,
                per_call: false,
            } => {
                let mut host = PyHost::new(py, Some(namespace.bind(py).clone()));
                (
                    dae_bridge_core::Bridge::resolve_at_setup(&mut host, config),
                    Some(namespace.clone_ref(py)),
                )
            }
        };
        Ok(PyTarget {
            bridge: bridge.map_err(|e| bridge_error(&e))?,
            namespace,
        })
    }

    /// Run `f` with this bridge installed, then put back whatever was
    /// installed before.
    fn with_installed(
        &self,
        py: Python<'_>,
        f: impl FnOnce() -> DaeStatus,
    ) -> PyResult<DaeStatus> {
        let previous = install(Box::new(self.target(py)?)).map_err(registry_error)?;
        let status = f();
        match previous {
            Some(previous) => install(previous).map(drop),
            None => uninstall().map(drop),
        }
        .map_err(registry_error)?;
        Ok(status)
    }
}

fn config(
    names: BindingNames,
    on_user_error: &str,
    state_len: Option<usize>,
    event_count: Option<usize>,
) -> PyResult<BridgeConfig> {
    let user_failure = match on_user_error {
        "abort" => FailurePolicy::Abort,
        "retry" => FailurePolicy::RetrySmallerStep,
        other => {
            return Err(PyValueError::new_err(format!(
                "on_user_error must be \"abort\" or \"retry\", got {other:?}"
            )))
        }
    };
    let config = BridgeConfig {
        view_strategy: ViewStrategy::Fresh,
        user_failure,
        state_len,
        event_count,
        names,
    };
    config
        .validate()
        .map_err(|e| bridge_error(&BridgeError::Config(e)))?;
    Ok(config)
}

/// Label an injected function by its qualified name.
fn label(function: &Bound<'_, PyAny>, role: &str) -> PyResult<String> {
    if !function.is_callable() {
        return Err(PyTypeError::new_err(format!(
            "{role} must be callable, got {}",
            function.get_type().name()?
        )));
    }
    Ok(function
        .getattr("__qualname__")
        .and_then(|n| n.extract::<String>())
        .unwrap_or_else(|_| role.to_owned()))
}

fn state_len(y: &[f64], yp: &[f64]) -> PyResult<i32> {
    if y.len() != yp.len() {
        return Err(PyValueError::new_err(format!(
            "y and yp must have the same length ({} != {})",
            y.len(),
            yp.len()
        )));
    }
    i32::try_from(y.len()).map_err(|_| PyValueError::new_err("len(y) does not fit in an i32"))
}
