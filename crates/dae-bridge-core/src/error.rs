//! Error taxonomy for the bridge and its host runtimes.
//!
//! [`BridgeError`] is what an entry point reports. [`HostError`] is what a
//! [`HostRuntime`](crate::HostRuntime) reports; the bridge classifies host
//! errors into the bridge taxonomy before surfacing them.

use crate::config::ConfigError;

/// Failures reported by a host runtime.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The value cannot be called.
    #[error("value is not callable (found {found})")]
    NotCallable {
        /// Host type name of the value.
        found: String,
    },
    /// The value is not a contiguous array of doubles.
    #[error("expected an f64 array, found {found}")]
    NotF64Array {
        /// Host type name of the value.
        found: String,
    },
    /// A reference no longer resolves (collected, or never allocated).
    #[error("stale reference {0}")]
    StaleReference(String),
    /// A view was read after the invocation that created it returned.
    #[error("view was retired when its invocation returned")]
    RetiredView,
    /// User code raised or returned an error.
    #[error("{0}")]
    UserFailure(String),
    /// The host cannot perform the requested operation.
    #[error("host does not support {0}")]
    Unsupported(&'static str),
}

/// Failures surfaced by the bridge entry points.
///
/// Every variant except [`UserFunctionFailure`](Self::UserFunctionFailure)
/// is a contract violation between solver, bridge and user code, and must
/// stop the solve.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// A required named value is absent from the host namespace.
    #[error("no binding named '{name}' in the host namespace")]
    UnresolvedBinding {
        /// The name that failed to resolve.
        name: String,
    },
    /// A value has the wrong host type for its role.
    #[error("{what}: expected {expected}, found {found}")]
    TypeMismatch {
        /// What was being checked (binding name or "result").
        what: String,
        /// Expected host type.
        expected: &'static str,
        /// Actual host type.
        found: String,
    },
    /// The user result is shorter than the required output length.
    #[error("user function returned {found} values, {expected} required")]
    LengthMismatch {
        /// Required output length.
        expected: usize,
        /// Length of the user result.
        found: usize,
    },
    /// User code failed.
    #[error("user function '{function}' failed: {reason}")]
    UserFunctionFailure {
        /// Binding name of the failing function.
        function: String,
        /// Failure description from the host.
        reason: String,
    },
    /// An `ipar` entry is negative, zero where a state length is required,
    /// or contradicts a length the solver passed alongside it.
    #[error("ipar[{index}] = {value} is not a valid length")]
    InvalidLengthParameter {
        /// Index into `ipar`.
        index: usize,
        /// Offending value.
        value: i64,
    },
    /// An `ipar` entry the entry point needs is absent.
    #[error("ipar[{index}] is missing")]
    MissingLengthParameter {
        /// Index into `ipar`.
        index: usize,
    },
    /// An `ipar` entry differs from the length the bridge was configured for.
    #[error("ipar[{index}] = {found}, bridge configured for {expected}")]
    UnexpectedLength {
        /// Index into `ipar`.
        index: usize,
        /// Configured length.
        expected: usize,
        /// Length found in `ipar`.
        found: usize,
    },
    /// A solver buffer is shorter than the length `ipar` declares for it.
    #[error("buffer '{buffer}' holds {found} values, {expected} required")]
    BufferTooShort {
        /// Solver argument name.
        buffer: &'static str,
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// Bridge configuration rejected.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// Any other host failure.
    #[error("host: {0}")]
    Host(#[from] HostError),
}

impl BridgeError {
    /// Returns `true` if user code failed (as opposed to a contract violation).
    pub fn is_user_failure(&self) -> bool {
        matches!(self, BridgeError::UserFunctionFailure { .. })
    }
}
