//! Symbol Resolver: binding names and resolved binding handles.
//!
//! Bindings are normally injected (or resolved once at setup) and held as
//! typed handles. Resolving by name on every call is kept for hosts whose
//! user code redefines its functions mid-solve.

use crate::error::BridgeError;
use crate::host::HostRuntime;

/// Residual function name used by the DASKR interface.
pub const DASKR_RESIDUAL: &str = "__daskr_res_callback";
/// Event function name used by the DASKR interface.
pub const DASKR_EVENT: &str = "__daskr_event_callback";
/// Residual function name used by the DASSL interface.
pub const DASSL_RESIDUAL: &str = "__dassl_res_callback";

/// Names the host namespace must bind before the first invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingNames {
    /// User residual function.
    pub residual: String,
    /// User event function, if root finding is enabled.
    pub event: Option<String>,
}

impl BindingNames {
    /// DASKR names: residual plus event function.
    pub fn daskr() -> Self {
        Self {
            residual: DASKR_RESIDUAL.to_owned(),
            event: Some(DASKR_EVENT.to_owned()),
        }
    }

    /// DASSL names: residual only.
    pub fn dassl() -> Self {
        Self {
            residual: DASSL_RESIDUAL.to_owned(),
            event: None,
        }
    }

    /// Name of the event function, or a placeholder when none is configured.
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("<event function>")
    }
}

impl Default for BindingNames {
    fn default() -> Self {
        Self::daskr()
    }
}

/// Resolved user functions, held as long-lived host handles.
#[derive(Debug)]
pub struct Bindings<K> {
    /// Residual function.
    pub residual: K,
    /// Event function; `None` when root finding is disabled.
    pub event: Option<K>,
}

/// Resolve `name` and check that it is callable.
pub fn resolve_function<H: HostRuntime>(
    host: &mut H,
    name: &str,
) -> Result<H::Ref, BridgeError> {
    let value = host
        .resolve(name)
        .ok_or_else(|| BridgeError::UnresolvedBinding {
            name: name.to_owned(),
        })?;
    if !host.is_callable(&value) {
        return Err(BridgeError::TypeMismatch {
            what: name.to_owned(),
            expected: "callable",
            found: host.type_name(&value),
        });
    }
    Ok(value)
}

/// Resolve every configured binding once, for the lifetime of a solve.
///
/// The residual function is required. An event function that is named but
/// not yet bound is left unresolved; the first event call then fails with
/// [`BridgeError::UnresolvedBinding`].
pub fn resolve_bindings<H: HostRuntime>(
    host: &mut H,
    names: &BindingNames,
) -> Result<Bindings<H::Handle>, BridgeError> {
    let residual = resolve_function(host, &names.residual)?;
    let event = match names.event.as_deref() {
        Some(name) => match resolve_function(host, name) {
            Ok(f) => Some(f),
            Err(BridgeError::UnresolvedBinding { .. }) => {
                log::debug!("event function '{name}' not bound at setup; root finding disabled");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };
    Ok(Bindings {
        residual: host.persist(&residual),
        event: event.map(|f| host.persist(&f)),
    })
}
