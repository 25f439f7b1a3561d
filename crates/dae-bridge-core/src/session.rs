//! A host paired with a bridge, as one installable callback target.

use crate::bridge::{Bridge, Invocation};
use crate::config::FailurePolicy;
use crate::error::BridgeError;
use crate::host::HostRuntime;

/// Something the native entry points can dispatch into.
///
/// Object-safe so the foreign-function layer can hold any host behind a
/// `Box<dyn CallbackTarget>`.
pub trait CallbackTarget: Send {
    /// Residual entry point.
    fn residual(&mut self, call: Invocation<'_>) -> Result<(), BridgeError>;

    /// Event entry point.
    fn event(&mut self, call: Invocation<'_>) -> Result<(), BridgeError>;

    /// How a user-function failure is reported to the solver.
    fn failure_policy(&self) -> FailurePolicy;
}

/// Owns a host and the bridge that evaluates against it.
pub struct Session<H: HostRuntime> {
    host: H,
    bridge: Bridge<H::Handle>,
}

impl<H: HostRuntime> Session<H> {
    /// Pair `host` with `bridge`.
    pub fn new(host: H, bridge: Bridge<H::Handle>) -> Self {
        Self { host, bridge }
    }

    /// Borrow the host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutably borrow the host, e.g. to redefine a binding between steps.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Borrow the bridge.
    pub fn bridge(&self) -> &Bridge<H::Handle> {
        &self.bridge
    }

    /// Release the bridge's roots and return the host.
    pub fn into_host(self) -> H {
        let Self { mut host, bridge } = self;
        bridge.teardown(&mut host);
        host
    }
}

impl<H> CallbackTarget for Session<H>
where
    H: HostRuntime + Send,
    H::Handle: Send,
{
    fn residual(&mut self, call: Invocation<'_>) -> Result<(), BridgeError> {
        self.bridge.residual(&mut self.host, call)
    }

    fn event(&mut self, call: Invocation<'_>) -> Result<(), BridgeError> {
        self.bridge.event(&mut self.host, call)
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.bridge.config().user_failure
    }
}
