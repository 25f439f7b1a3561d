//! Scoped GC rooting for one invocation.
//!
//! [`RootGuard`] is the only caller of [`HostRuntime::pin`] and
//! [`HostRuntime::unpin`]. Every value it roots is unpinned exactly once,
//! in reverse order, when the guard drops, on the success path and on every
//! early return alike. Views registered with the guard are retired before
//! anything is unpinned.

use smallvec::SmallVec;

use crate::host::HostRuntime;

/// Pins every reference touched during one invocation.
///
/// Holds the host mutably for its whole lifetime, so nothing else can
/// interleave host calls while values are rooted.
pub struct RootGuard<'h, H: HostRuntime> {
    host: &'h mut H,
    pinned: SmallVec<[H::Ref; 8]>,
    views: SmallVec<[H::Ref; 3]>,
}

impl<'h, H: HostRuntime> RootGuard<'h, H> {
    /// Open a rooting scope. Only the bridge opens one, once per invocation.
    pub(crate) fn acquire(host: &'h mut H) -> Self {
        Self {
            host,
            pinned: SmallVec::new(),
            views: SmallVec::new(),
        }
    }

    /// Root `value` until the guard drops.
    pub(crate) fn root(&mut self, value: &H::Ref) {
        self.host.pin(value);
        self.pinned.push(value.clone());
    }

    /// Root a view and retire it when the guard drops.
    pub(crate) fn adopt_view(&mut self, view: &H::Ref) {
        self.root(view);
        self.views.push(view.clone());
    }

    pub(crate) fn host(&mut self) -> &mut H {
        self.host
    }

    /// Shared access to the host.
    pub fn host_ref(&self) -> &H {
        self.host
    }

    /// Number of values currently rooted by this guard.
    pub fn pinned_len(&self) -> usize {
        self.pinned.len()
    }
}

impl<H: HostRuntime> Drop for RootGuard<'_, H> {
    fn drop(&mut self) {
        for view in self.views.drain(..) {
            self.host.retire(&view);
        }
        while let Some(value) = self.pinned.pop() {
            self.host.unpin(&value);
        }
    }
}
