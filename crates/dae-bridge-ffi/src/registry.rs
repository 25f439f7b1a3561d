//! The process-wide installed callback target.
//!
//! The solver's native callback signatures carry no user-data pointer, so
//! the entry points find their target here. The slot is only ever
//! `try_lock`ed: a user function that re-enters the bridge, or installs a
//! new target mid-call, gets [`DaeStatus::Busy`] instead of a deadlock.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use dae_bridge_core::CallbackTarget;

use crate::status::DaeStatus;

type Slot = Option<Box<dyn CallbackTarget>>;

static INSTALLED: Mutex<Slot> = Mutex::new(None);
static LAST_STATUS: AtomicI32 = AtomicI32::new(DaeStatus::Ok as i32);

/// Lock the slot for (un)installation. A slot poisoned by an earlier panic
/// is recovered, since replacing the target is how a driver recovers.
fn lock_for_update() -> Result<MutexGuard<'static, Slot>, DaeStatus> {
    match INSTALLED.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::WouldBlock) => Err(DaeStatus::Busy),
        Err(TryLockError::Poisoned(poisoned)) => {
            log::warn!("callback target poisoned by an earlier panic; recovering");
            INSTALLED.clear_poison();
            Ok(poisoned.into_inner())
        }
    }
}

/// Install `target`, returning the previously installed one.
///
/// Fails with [`DaeStatus::Busy`] while a callback is running.
pub fn install(
    target: Box<dyn CallbackTarget>,
) -> Result<Option<Box<dyn CallbackTarget>>, DaeStatus> {
    let mut slot = lock_for_update()?;
    let previous = slot.replace(target);
    if previous.is_some() {
        log::warn!("replacing the installed callback target");
    } else {
        log::debug!("callback target installed");
    }
    record(DaeStatus::Ok);
    Ok(previous)
}

/// Remove and return the installed target.
pub fn uninstall() -> Result<Option<Box<dyn CallbackTarget>>, DaeStatus> {
    let previous = lock_for_update()?.take();
    if previous.is_some() {
        log::debug!("callback target uninstalled");
    }
    Ok(previous)
}

/// Returns `true` if a target is installed (including one that is
/// currently running a callback).
pub fn is_installed() -> bool {
    match INSTALLED.try_lock() {
        Ok(slot) => slot.is_some(),
        Err(TryLockError::WouldBlock) => true,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_some(),
    }
}

/// Status of the most recent callback.
pub fn last_status() -> DaeStatus {
    DaeStatus::from_raw(LAST_STATUS.load(Ordering::Acquire)).unwrap_or(DaeStatus::InternalError)
}

pub(crate) fn record(status: DaeStatus) {
    LAST_STATUS.store(status as i32, Ordering::Release);
}

/// Run `f` against the installed target.
pub(crate) fn with_target<T>(
    f: impl FnOnce(&mut dyn CallbackTarget) -> T,
) -> Result<T, DaeStatus> {
    let mut slot = match INSTALLED.try_lock() {
        Ok(slot) => slot,
        Err(TryLockError::WouldBlock) => return Err(DaeStatus::Busy),
        Err(TryLockError::Poisoned(_)) => return Err(DaeStatus::InternalError),
    };
    match slot.as_deref_mut() {
        Some(target) => Ok(f(target)),
        None => Err(DaeStatus::NotInstalled),
    }
}

/// Returns 1 if a callback target is installed, 0 otherwise.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dae_bridge_is_installed() -> i32 {
    ffi_guard!({ i32::from(is_installed()) })
}

/// Uninstall the callback target.
///
/// Returns `DAE_STATUS_OK`, `DAE_STATUS_NOT_INSTALLED` if nothing was
/// installed, or `DAE_STATUS_BUSY` if called from inside a callback.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dae_bridge_uninstall() -> i32 {
    ffi_guard!({
        let status = match uninstall() {
            Ok(Some(_)) => DaeStatus::Ok,
            Ok(None) => DaeStatus::NotInstalled,
            Err(status) => status,
        };
        status as i32
    })
}

/// Status of the most recent residual or event callback.
///
/// The solver only sees `IRES`; a driver calls this after the solver
/// stops to find out why.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dae_bridge_last_status() -> i32 {
    LAST_STATUS.load(Ordering::Acquire)
}
