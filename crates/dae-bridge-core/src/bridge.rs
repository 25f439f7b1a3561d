//! The two entry points: residual and event evaluation.
//!
//! Both run the same sequence under a single [`RootGuard`]:
//!
//! 1. validate `ipar` and cut the solver buffers to their authoritative
//!    lengths (before anything is touched on the host),
//! 2. obtain the user function (bound handle, or per-call lookup),
//! 3. materialize `(t, y, yp)`,
//! 4. dispatch,
//! 5. copy exactly N (residual) or M (event) doubles into `res`.
//!
//! The guard drops on every return path, retiring the views and releasing
//! every pin.

use crate::buffer::RawBuffer;
use crate::config::BridgeConfig;
use crate::copy::copy_out;
use crate::dispatch::{classify_result_error, invoke};
use crate::error::BridgeError;
use crate::guard::RootGuard;
use crate::host::HostRuntime;
use crate::lengths::{LengthParameters, EVENT_COUNT_INDEX, STATE_LEN_INDEX};
use crate::resolve::{resolve_bindings, resolve_function, BindingNames, Bindings};
use crate::view::{materialize, ReusableViews, StateBuffers};

/// Which entry point is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Residual evaluation; output length `ipar[0]`.
    Residual,
    /// Event/root evaluation; output length `ipar[1]`.
    Event,
}

/// Arguments of one solver callback.
///
/// `y` and `yp` may be longer than `ipar[0]` and `res` longer than the
/// output length; only the leading elements are used.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Elapsed time.
    pub t: RawBuffer<'a>,
    /// State vector.
    pub y: RawBuffer<'a>,
    /// Derivative vector.
    pub yp: RawBuffer<'a>,
    /// Solver integer parameters.
    pub ipar: LengthParameters,
    /// Solver-owned output buffer.
    pub res: &'a mut [f64],
}

enum Symbols<K> {
    Bound(Bindings<K>),
    PerCall,
}

/// Callback bridge for one solve.
///
/// `K` is the host's long-lived handle type (see
/// [`HostRuntime::Handle`]). The bridge itself holds no host; each entry
/// point borrows one for the duration of the call.
pub struct Bridge<K> {
    config: BridgeConfig,
    symbols: Symbols<K>,
    reusable: Option<ReusableViews<K>>,
    calls: u64,
}

impl<K> Bridge<K> {
    /// Build a bridge over injected function handles.
    pub fn new(config: BridgeConfig, bindings: Bindings<K>) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self::with_symbols(config, Symbols::Bound(bindings)))
    }

    /// Resolve the configured binding names once, now.
    ///
    /// Fails with [`BridgeError::UnresolvedBinding`] if the residual
    /// function is not bound, before any solver buffer exists.
    pub fn resolve_at_setup<H>(host: &mut H, config: BridgeConfig) -> Result<Self, BridgeError>
    where
        H: HostRuntime<Handle = K>,
    {
        config.validate()?;
        let bindings = resolve_bindings(host, &config.names)?;
        log::debug!(
            "bridge bound to '{}' (event: {})",
            config.names.residual,
            bindings.event.is_some()
        );
        Ok(Self::with_symbols(config, Symbols::Bound(bindings)))
    }

    /// Resolve the configured binding names on every invocation.
    ///
    /// Tolerates user code redefining its functions mid-solve.
    pub fn resolve_per_call(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self::with_symbols(config, Symbols::PerCall))
    }

    fn with_symbols(config: BridgeConfig, symbols: Symbols<K>) -> Self {
        Self {
            config,
            symbols,
            reusable: None,
            calls: 0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of invocations that got past argument validation.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Evaluate the residual: `res[..N] = f(t, y, yp)[..N]`.
    pub fn residual<H>(&mut self, host: &mut H, call: Invocation<'_>) -> Result<(), BridgeError>
    where
        H: HostRuntime<Handle = K>,
    {
        self.evaluate(host, Entry::Residual, call)
    }

    /// Evaluate the event functions: `res[..M] = g(t, y, yp)[..M]`.
    pub fn event<H>(&mut self, host: &mut H, call: Invocation<'_>) -> Result<(), BridgeError>
    where
        H: HostRuntime<Handle = K>,
    {
        self.evaluate(host, Entry::Event, call)
    }

    /// Release every long-lived root held by the bridge.
    pub fn teardown<H>(self, host: &mut H)
    where
        H: HostRuntime<Handle = K>,
    {
        if let Symbols::Bound(bindings) = self.symbols {
            host.release(bindings.residual);
            if let Some(event) = bindings.event {
                host.release(event);
            }
        }
        if let Some(views) = self.reusable {
            host.release(views.t);
            host.release(views.y);
            host.release(views.yp);
        }
    }

    fn evaluate<H>(&mut self, host: &mut H, entry: Entry, call: Invocation<'_>) -> Result<(), BridgeError>
    where
        H: HostRuntime<Handle = K>,
    {
        let n = expect_len(
            call.ipar.state_len()?,
            self.config.state_len,
            STATE_LEN_INDEX,
        )?;
        let out_len = match entry {
            Entry::Residual => n,
            Entry::Event => expect_len(
                call.ipar.event_count()?,
                self.config.event_count,
                EVENT_COUNT_INDEX,
            )?,
        };
        let buffers = StateBuffers {
            t: cut(call.t, 1)?,
            y: cut(call.y, n)?,
            yp: cut(call.yp, n)?,
        };
        if call.res.len() < out_len {
            return Err(BridgeError::BufferTooShort {
                buffer: "res",
                expected: out_len,
                found: call.res.len(),
            });
        }

        self.calls += 1;
        log::trace!("{entry:?} call {}: n = {n}, out = {out_len}", self.calls);

        let mut guard = RootGuard::acquire(host);
        let (function, name) = user_function(&self.symbols, &self.config.names, &mut guard, entry)?;
        let views = materialize(
            &mut guard,
            self.config.view_strategy,
            &mut self.reusable,
            &buffers,
        )?;
        let result = invoke(&mut guard, &function, name, &views)?;
        guard
            .host_ref()
            .with_f64_slice(&result, |values| copy_out(values, call.res, out_len))
            .map_err(classify_result_error)?
    }
}

/// Obtain and root the user function for `entry`.
fn user_function<'n, K, H>(
    symbols: &Symbols<K>,
    names: &'n BindingNames,
    guard: &mut RootGuard<'_, H>,
    entry: Entry,
) -> Result<(H::Ref, &'n str), BridgeError>
where
    H: HostRuntime<Handle = K>,
{
    let unresolved = || BridgeError::UnresolvedBinding {
        name: names.event_name().to_owned(),
    };
    let (function, name) = match (symbols, entry) {
        (Symbols::Bound(b), Entry::Residual) => {
            (guard.host().attach(&b.residual), names.residual.as_str())
        }
        (Symbols::Bound(b), Entry::Event) => {
            let handle = b.event.as_ref().ok_or_else(unresolved)?;
            (guard.host().attach(handle), names.event_name())
        }
        (Symbols::PerCall, Entry::Residual) => (
            resolve_function(guard.host(), &names.residual)?,
            names.residual.as_str(),
        ),
        (Symbols::PerCall, Entry::Event) => {
            let name = names.event.as_deref().ok_or_else(unresolved)?;
            (resolve_function(guard.host(), name)?, name)
        }
    };
    guard.root(&function);
    Ok((function, name))
}

fn expect_len(found: usize, configured: Option<usize>, index: usize) -> Result<usize, BridgeError> {
    match configured {
        Some(expected) if expected != found => Err(BridgeError::UnexpectedLength {
            index,
            expected,
            found,
        }),
        _ => Ok(found),
    }
}

fn cut(buffer: RawBuffer<'_>, len: usize) -> Result<RawBuffer<'_>, BridgeError> {
    buffer.prefix(len).ok_or(BridgeError::BufferTooShort {
        buffer: buffer.role().arg_name(),
        expected: len,
        found: buffer.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ViewRole;
    use crate::config::ViewStrategy;
    use crate::mock::{MockEvent, MockHost};
    use crate::resolve::{DASKR_EVENT, DASKR_RESIDUAL};

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

    fn y_minus_yp(host: &mut MockHost) -> usize {
        host.function(|a| Ok(a[1].iter().zip(&a[2]).map(|(y, yp)| y - yp).collect()))
    }

    fn bound_bridge(host: &mut MockHost, config: BridgeConfig) -> Bridge<usize> {
        let f = y_minus_yp(host);
        host.define(DASKR_RESIDUAL, f);
        Bridge::resolve_at_setup(host, config).unwrap()
    }

    #[test]
    fn residual_writes_y_minus_yp() {
        let mut host = MockHost::new();
        let mut bridge = bound_bridge(&mut host, BridgeConfig::default());
        let mut res = [f64::NAN; 3];
        bridge
            .residual(
                &mut host,
                invocation(&[0.0], &[1.0, 2.0], &[0.5, 0.5], &[2], &mut res),
            )
            .unwrap();
        assert_eq!(&res[..2], &[0.5, 1.5]);
        assert!(res[2].is_nan());
        assert_eq!(bridge.calls(), 1);
    }

    #[test]
    fn every_pin_is_released_after_a_call() {
        for strategy in [ViewStrategy::Fresh, ViewStrategy::Reuse] {
            let mut host = MockHost::new();
            let config = BridgeConfig {
                view_strategy: strategy,
                ..Default::default()
            };
            let mut bridge = bound_bridge(&mut host, config);
            let baseline = host.total_pins();
            let mut res = [0.0; 2];
            for _ in 0..3 {
                bridge
                    .residual(
                        &mut host,
                        invocation(&[0.0], &[1.0, 2.0], &[0.5, 0.5], &[2], &mut res),
                    )
                    .unwrap();
            }
            let persisted = if strategy == ViewStrategy::Reuse { 3 } else { 0 };
            assert_eq!(host.total_pins(), baseline + persisted);
            bridge.teardown(&mut host);
            assert_eq!(host.total_pins(), 0);
        }
    }

    #[test]
    fn event_output_length_is_ipar_1() {
        let mut host = MockHost::new();
        let r = y_minus_yp(&mut host);
        let g = host.function(|a| Ok(vec![a[1][0], a[1][4], 99.0]));
        host.define(DASKR_RESIDUAL, r);
        host.define(DASKR_EVENT, g);
        let mut bridge = Bridge::resolve_at_setup(&mut host, BridgeConfig::default()).unwrap();
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut res = [f64::NAN; 5];
        bridge
            .event(&mut host, invocation(&[0.0], &y, &[0.0; 5], &[5, 2], &mut res))
            .unwrap();
        assert_eq!(&res[..2], &[1.0, 5.0]);
        assert!(res[2..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn short_result_is_length_mismatch_and_res_untouched() {
        let mut host = MockHost::new();
        let f = host.function(|_| Ok(vec![1.0]));
        host.define(DASKR_RESIDUAL, f);
        let mut bridge = Bridge::resolve_at_setup(&mut host, BridgeConfig::default()).unwrap();
        let mut res = [7.0; 3];
        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[0.0; 3], &[0.0; 3], &[3], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::LengthMismatch {
                expected: 3,
                found: 1
            }
        );
        assert_eq!(res, [7.0; 3]);
        assert_eq!(host.total_pins(), 1);
    }

    #[test]
    fn per_call_resolution_sees_redefinition() {
        let mut host = MockHost::new();
        let mut bridge: Bridge<usize> =
            Bridge::resolve_per_call(BridgeConfig::default()).unwrap();
        let mut res = [0.0; 1];

        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[1], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnresolvedBinding {
                name: DASKR_RESIDUAL.into()
            }
        );
        assert_eq!(res, [0.0]);

        let one = host.function(|_| Ok(vec![1.0]));
        host.define(DASKR_RESIDUAL, one);
        bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[1], &mut res))
            .unwrap();
        assert_eq!(res, [1.0]);

        let two = host.function(|_| Ok(vec![2.0]));
        host.define(DASKR_RESIDUAL, two);
        bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[1], &mut res))
            .unwrap();
        assert_eq!(res, [2.0]);
        assert_eq!(host.total_pins(), 0);
    }

    #[test]
    fn unbound_event_function_fails_before_host_work() {
        let mut host = MockHost::new();
        let mut bridge = bound_bridge(&mut host, BridgeConfig::default());
        host.clear_events();
        let mut res = [3.0; 2];
        let err = bridge
            .event(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[1, 2], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnresolvedBinding {
                name: DASKR_EVENT.into()
            }
        );
        assert_eq!(res, [3.0; 2]);
        assert!(host.events().is_empty());
    }

    #[test]
    fn invalid_ipar_rejected_before_host_work() {
        let mut host = MockHost::new();
        let mut bridge = bound_bridge(&mut host, BridgeConfig::default());
        host.clear_events();
        let mut res = [0.0; 2];
        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[-4], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InvalidLengthParameter {
                index: 0,
                value: -4
            }
        );
        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[2], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::BufferTooShort {
                buffer: "y",
                expected: 2,
                found: 1
            }
        );
        assert!(host.events().is_empty());
        assert_eq!(bridge.calls(), 0);
    }

    #[test]
    fn configured_lengths_are_enforced() {
        let mut host = MockHost::new();
        let config = BridgeConfig {
            state_len: Some(2),
            ..Default::default()
        };
        let mut bridge = bound_bridge(&mut host, config);
        let mut res = [0.0; 3];
        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[0.0; 3], &[0.0; 3], &[3], &mut res))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::UnexpectedLength {
                index: 0,
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn user_failure_releases_everything() {
        let mut host = MockHost::new();
        let f = host.function(|_| Err("division by zero".into()));
        host.define(DASKR_RESIDUAL, f);
        let mut bridge = Bridge::resolve_at_setup(&mut host, BridgeConfig::default()).unwrap();
        let mut res = [5.0];
        let err = bridge
            .residual(&mut host, invocation(&[0.0], &[1.0], &[1.0], &[1], &mut res))
            .unwrap_err();
        assert!(err.is_user_failure());
        assert_eq!(res, [5.0]);
        assert_eq!(host.total_pins(), 1);
        let retired = host
            .events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Retire(_)))
            .count();
        assert_eq!(retired, 3);
    }

    #[test]
    fn returned_state_view_is_copied_by_value() {
        let mut host = MockHost::new();
        let f = host.function(|a| Ok(a[1].clone()));
        host.define(DASKR_RESIDUAL, f);
        let mut bridge = Bridge::resolve_at_setup(&mut host, BridgeConfig::default()).unwrap();
        let mut y = [4.0];
        let mut res = [0.0];
        bridge
            .residual(&mut host, invocation(&[0.0], &y, &[1.0], &[1], &mut res))
            .unwrap();
        y[0] = -1.0;
        assert_eq!(res, [4.0]);
        assert_eq!(y, [-1.0]);
    }
}
