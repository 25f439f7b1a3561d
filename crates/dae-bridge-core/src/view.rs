//! View Materializer: wraps solver buffers as host views without copying.
//!
//! Both strategies hand every view to the invocation's [`RootGuard`] the
//! moment it exists, so a collection triggered while materializing the next
//! view cannot reclaim it, and the guard retires it when the call ends.

use crate::buffer::RawBuffer;
use crate::config::ViewStrategy;
use crate::error::{BridgeError, HostError};
use crate::guard::RootGuard;
use crate::host::HostRuntime;

/// The three solver inputs of one invocation, already cut to their
/// authoritative lengths (1, N, N).
#[derive(Clone, Copy, Debug)]
pub struct StateBuffers<'a> {
    /// Elapsed time.
    pub t: RawBuffer<'a>,
    /// State vector.
    pub y: RawBuffer<'a>,
    /// Derivative vector.
    pub yp: RawBuffer<'a>,
}

/// Views over [`StateBuffers`], in call-argument order.
#[derive(Clone, Debug)]
pub struct StateViews<R> {
    /// View over `t`.
    pub t: R,
    /// View over `y`.
    pub y: R,
    /// View over `yp`.
    pub yp: R,
}

impl<R> StateViews<R> {
    /// Borrow as the fixed `(t, y, yp)` argument list.
    pub fn args(&self) -> [&R; 3] {
        [&self.t, &self.y, &self.yp]
    }
}

/// Long-lived views kept by the `Reuse` strategy.
pub(crate) type ReusableViews<K> = StateViews<K>;

/// Materialize `(t, y, yp)` under `guard` using `strategy`.
pub(crate) fn materialize<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    strategy: ViewStrategy,
    reusable: &mut Option<ReusableViews<H::Handle>>,
    buffers: &StateBuffers<'_>,
) -> Result<StateViews<H::Ref>, BridgeError> {
    match strategy {
        ViewStrategy::Fresh => fresh(guard, buffers),
        ViewStrategy::Reuse => reuse(guard, reusable, buffers),
    }
}

fn fresh<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    buffers: &StateBuffers<'_>,
) -> Result<StateViews<H::Ref>, BridgeError> {
    Ok(StateViews {
        t: fresh_one(guard, buffers.t)?,
        y: fresh_one(guard, buffers.y)?,
        yp: fresh_one(guard, buffers.yp)?,
    })
}

fn fresh_one<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    buffer: RawBuffer<'_>,
) -> Result<H::Ref, BridgeError> {
    // SAFETY: the view is adopted before anything else can fail, and the
    // guard retires it before the invocation's buffers go out of scope.
    #[allow(unsafe_code)]
    let view = unsafe { guard.host().materialize(buffer)? };
    guard.adopt_view(&view);
    Ok(view)
}

fn reuse<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    reusable: &mut Option<ReusableViews<H::Handle>>,
    buffers: &StateBuffers<'_>,
) -> Result<StateViews<H::Ref>, BridgeError> {
    if !H::SUPPORTS_REUSE {
        return Err(HostError::Unsupported("view reuse").into());
    }
    let Some(handles) = reusable.as_ref() else {
        // First call: build the long-lived views, then keep them rooted.
        let views = fresh(guard, buffers)?;
        let host = guard.host();
        *reusable = Some(StateViews {
            t: host.persist(&views.t),
            y: host.persist(&views.y),
            yp: host.persist(&views.yp),
        });
        log::debug!("reusable views created");
        return Ok(views);
    };
    let host = guard.host();
    let views = StateViews {
        t: host.attach(&handles.t),
        y: host.attach(&handles.y),
        yp: host.attach(&handles.yp),
    };
    repoint_one(guard, &views.t, buffers.t)?;
    repoint_one(guard, &views.y, buffers.y)?;
    repoint_one(guard, &views.yp, buffers.yp)?;
    Ok(views)
}

fn repoint_one<H: HostRuntime>(
    guard: &mut RootGuard<'_, H>,
    view: &H::Ref,
    buffer: RawBuffer<'_>,
) -> Result<(), BridgeError> {
    // SAFETY: as in `fresh_one`.
    #[allow(unsafe_code)]
    unsafe {
        guard.host().repoint(view, buffer)?;
    }
    guard.adopt_view(view);
    Ok(())
}
