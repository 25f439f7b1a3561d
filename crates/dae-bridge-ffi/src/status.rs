//! C-compatible status codes and the `IRES` mapping.

use dae_bridge_core::{BridgeError, FailurePolicy};

/// `IRES` value asking the solver to retry with a smaller step.
pub const IRES_RETRY: i32 = -1;
/// `IRES` value asking the solver to terminate the integration.
pub const IRES_ABORT: i32 = -2;

/// Outcome of the most recent callback, as reported by
/// [`dae_bridge_last_status`](crate::dae_bridge_last_status).
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaeStatus {
    /// Success.
    Ok = 0,
    /// A required binding was absent.
    UnresolvedBinding = -1,
    /// A value had the wrong host type.
    TypeMismatch = -2,
    /// The user result was shorter than required.
    LengthMismatch = -3,
    /// User code failed.
    UserFunctionFailure = -4,
    /// `ipar` (or `neq`/`nrt`) held an unusable length.
    InvalidLengthParameter = -5,
    /// A solver buffer was shorter than its declared length.
    BufferTooShort = -6,
    /// Bridge configuration was rejected.
    ConfigError = -7,
    /// The host runtime failed.
    HostError = -8,
    /// No callback target is installed.
    NotInstalled = -9,
    /// A callback was entered while another was still running.
    Busy = -10,
    /// A required pointer argument was null.
    InvalidArgument = -11,
    /// Internal error (e.g. poisoned mutex after a prior panic).
    InternalError = -20,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl DaeStatus {
    /// Decode a raw status code.
    pub fn from_raw(code: i32) -> Option<Self> {
        Some(match code {
            0 => DaeStatus::Ok,
            -1 => DaeStatus::UnresolvedBinding,
            -2 => DaeStatus::TypeMismatch,
            -3 => DaeStatus::LengthMismatch,
            -4 => DaeStatus::UserFunctionFailure,
            -5 => DaeStatus::InvalidLengthParameter,
            -6 => DaeStatus::BufferTooShort,
            -7 => DaeStatus::ConfigError,
            -8 => DaeStatus::HostError,
            -9 => DaeStatus::NotInstalled,
            -10 => DaeStatus::Busy,
            -11 => DaeStatus::InvalidArgument,
            -20 => DaeStatus::InternalError,
            -128 => DaeStatus::Panicked,
            _ => return None,
        })
    }
}

impl From<&BridgeError> for DaeStatus {
    fn from(e: &BridgeError) -> Self {
        match e {
            BridgeError::UnresolvedBinding { .. } => DaeStatus::UnresolvedBinding,
            BridgeError::TypeMismatch { .. } => DaeStatus::TypeMismatch,
            BridgeError::LengthMismatch { .. } => DaeStatus::LengthMismatch,
            BridgeError::UserFunctionFailure { .. } => DaeStatus::UserFunctionFailure,
            BridgeError::InvalidLengthParameter { .. }
            | BridgeError::MissingLengthParameter { .. }
            | BridgeError::UnexpectedLength { .. } => DaeStatus::InvalidLengthParameter,
            BridgeError::BufferTooShort { .. } => DaeStatus::BufferTooShort,
            BridgeError::Config(_) => DaeStatus::ConfigError,
            BridgeError::Host(_) => DaeStatus::HostError,
        }
    }
}

/// `IRES` to report for `error` under `policy`.
///
/// Only a user-function failure can ask for a retry; every contract
/// violation terminates.
pub fn ires_for(error: &BridgeError, policy: FailurePolicy) -> i32 {
    match policy {
        FailurePolicy::RetrySmallerStep if error.is_user_failure() => IRES_RETRY,
        _ => IRES_ABORT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dae_bridge_core::HostError;

    #[test]
    fn status_code_values_are_stable() {
        assert_eq!(DaeStatus::Ok as i32, 0);
        assert_eq!(DaeStatus::UnresolvedBinding as i32, -1);
        assert_eq!(DaeStatus::TypeMismatch as i32, -2);
        assert_eq!(DaeStatus::LengthMismatch as i32, -3);
        assert_eq!(DaeStatus::UserFunctionFailure as i32, -4);
        assert_eq!(DaeStatus::InvalidLengthParameter as i32, -5);
        assert_eq!(DaeStatus::BufferTooShort as i32, -6);
        assert_eq!(DaeStatus::ConfigError as i32, -7);
        assert_eq!(DaeStatus::HostError as i32, -8);
        assert_eq!(DaeStatus::NotInstalled as i32, -9);
        assert_eq!(DaeStatus::Busy as i32, -10);
        assert_eq!(DaeStatus::InvalidArgument as i32, -11);
        assert_eq!(DaeStatus::InternalError as i32, -20);
        assert_eq!(DaeStatus::Panicked as i32, -128);
    }

    #[test]
    fn from_raw_inverts_the_discriminant() {
        for status in [
            DaeStatus::Ok,
            DaeStatus::UserFunctionFailure,
            DaeStatus::InvalidArgument,
            DaeStatus::Panicked,
        ] {
            assert_eq!(DaeStatus::from_raw(status as i32), Some(status));
        }
        assert_eq!(DaeStatus::from_raw(-99), None);
    }

    #[test]
    fn length_errors_share_a_status() {
        for e in [
            BridgeError::MissingLengthParameter { index: 1 },
            BridgeError::InvalidLengthParameter { index: 0, value: -1 },
            BridgeError::UnexpectedLength {
                index: 0,
                expected: 2,
                found: 3,
            },
        ] {
            assert_eq!(DaeStatus::from(&e), DaeStatus::InvalidLengthParameter);
        }
        assert_eq!(
            DaeStatus::from(&BridgeError::Host(HostError::RetiredView)),
            DaeStatus::HostError
        );
    }

    #[test]
    fn only_user_failure_can_retry() {
        let user = BridgeError::UserFunctionFailure {
            function: "f".into(),
            reason: "nan".into(),
        };
        let contract = BridgeError::LengthMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(ires_for(&user, FailurePolicy::RetrySmallerStep), IRES_RETRY);
        assert_eq!(ires_for(&user, FailurePolicy::Abort), IRES_ABORT);
        assert_eq!(
            ires_for(&contract, FailurePolicy::RetrySmallerStep),
            IRES_ABORT
        );
    }
}
