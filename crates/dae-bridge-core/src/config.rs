//! Bridge configuration and validation.

use crate::resolve::BindingNames;

/// How the View Materializer obtains a view per role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewStrategy {
    /// Construct new views on every invocation. Reentrant; one allocation
    /// per view per call.
    #[default]
    Fresh,
    /// Keep one long-lived view per role and re-point it at each call's
    /// buffers. No per-call allocation, but the views are shared mutable
    /// state: invocations must be serialized.
    Reuse,
}

/// What a failing user function asks the solver to do.
///
/// Only consulted for [`BridgeError::UserFunctionFailure`](crate::BridgeError::UserFunctionFailure);
/// every other error aborts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Terminate the integration (`IRES = -2`).
    #[default]
    Abort,
    /// Ask the solver to retry with a smaller step (`IRES = -1`).
    RetrySmallerStep,
}

/// Bridge configuration.
///
/// Validated once when a [`Bridge`](crate::Bridge) is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// View Materializer strategy. Default: `Fresh`.
    pub view_strategy: ViewStrategy,
    /// Mapping of user-function failures onto the solver's status flag.
    /// Default: `Abort`.
    pub user_failure: FailurePolicy,
    /// Expected state length N. When set, every call's `ipar[0]` must
    /// equal it.
    pub state_len: Option<usize>,
    /// Expected event count M. When set, every event call's `ipar[1]` must
    /// equal it.
    pub event_count: Option<usize>,
    /// Namespace names used when bindings are resolved by name.
    pub names: BindingNames,
}

impl BridgeConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_len == Some(0) {
            return Err(ConfigError::ZeroStateLen);
        }
        if self.names.residual.is_empty() {
            return Err(ConfigError::EmptyBindingName { role: "residual" });
        }
        if self.names.event.as_deref() == Some("") {
            return Err(ConfigError::EmptyBindingName { role: "event" });
        }
        Ok(())
    }
}

/// Errors detected by [`BridgeConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A DAE needs at least one state variable.
    #[error("state_len must be at least 1")]
    ZeroStateLen,
    /// A binding name is the empty string.
    #[error("{role} binding name is empty")]
    EmptyBindingName {
        /// Which binding.
        role: &'static str,
    },
}
