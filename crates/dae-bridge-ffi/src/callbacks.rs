//! The native callback entry points.
//!
//! Signatures follow the DASSL/DASKR Fortran subroutines: every argument is
//! passed by reference, `rpar`/`cj` are accepted and ignored, and `ipar[0]`
//! (and for root functions `ipar[1]`) carry the lengths. All pointers are
//! only valid for the duration of the call.

use std::slice;

use dae_bridge_core::lengths::{EVENT_COUNT_INDEX, STATE_LEN_INDEX};
use dae_bridge_core::{BridgeError, Entry, Invocation, LengthParameters, RawBuffer, ViewRole};

use crate::registry;
use crate::status::{ires_for, DaeStatus, IRES_ABORT, IRES_RETRY};

struct RawArgs {
    t: *const f64,
    y: *const f64,
    yp: *const f64,
    res: *mut f64,
    ipar: *const i32,
    neq: *const i32,
    nrt: *const i32,
}

#[derive(Debug)]
struct CallbackError {
    status: DaeStatus,
    ires: i32,
}

impl CallbackError {
    fn status(status: DaeStatus) -> Self {
        Self {
            status,
            ires: IRES_ABORT,
        }
    }

    fn contract(error: BridgeError) -> Self {
        log::error!("rejected callback arguments: {error}");
        Self::status(DaeStatus::from(&error))
    }
}

/// A solver-side length argument must agree with `ipar`.
#[allow(unsafe_code)]
fn cross_check(ptr: *const i32, expected: usize, index: usize) -> Result<(), CallbackError> {
    if ptr.is_null() {
        return Ok(());
    }
    // SAFETY: non-null `neq`/`nrt` point at one integer per the solver ABI.
    let value = unsafe { *ptr };
    if usize::try_from(value).ok() == Some(expected) {
        Ok(())
    } else {
        Err(CallbackError::contract(
            BridgeError::InvalidLengthParameter {
                index,
                value: i64::from(value),
            },
        ))
    }
}

#[allow(unsafe_code)]
fn evaluate(entry: Entry, args: &RawArgs) -> Result<(), CallbackError> {
    if args.ipar.is_null() {
        return Err(CallbackError::status(DaeStatus::InvalidArgument));
    }
    let needed = match entry {
        Entry::Residual => STATE_LEN_INDEX + 1,
        Entry::Event => EVENT_COUNT_INDEX + 1,
    };
    // SAFETY: the driver sizes `ipar` to hold N (and M when root finding is
    // on) before the solve starts.
    let ipar = LengthParameters::from_slice(unsafe { slice::from_raw_parts(args.ipar, needed) });
    let n = ipar.state_len().map_err(CallbackError::contract)?;
    let out_len = match entry {
        Entry::Residual => n,
        Entry::Event => ipar.event_count().map_err(CallbackError::contract)?,
    };
    cross_check(args.neq, n, STATE_LEN_INDEX)?;
    cross_check(args.nrt, out_len, EVENT_COUNT_INDEX)?;

    // SAFETY: the solver passes t (1), y and yp (N) and res (N or M) with at
    // least those lengths, valid until this function returns.
    let buffer = |role, ptr, len| {
        unsafe { RawBuffer::from_raw(role, ptr, len) }
            .ok_or(CallbackError::status(DaeStatus::InvalidArgument))
    };
    let t = buffer(ViewRole::Time, args.t, 1)?;
    let y = buffer(ViewRole::State, args.y, n)?;
    let yp = buffer(ViewRole::Derivative, args.yp, n)?;
    let res: &mut [f64] = if out_len == 0 {
        &mut []
    } else if args.res.is_null() {
        return Err(CallbackError::status(DaeStatus::InvalidArgument));
    } else {
        unsafe { slice::from_raw_parts_mut(args.res, out_len) }
    };

    let call = Invocation {
        t,
        y,
        yp,
        ipar,
        res,
    };
    let (outcome, policy) = registry::with_target(|target| {
        let policy = target.failure_policy();
        let outcome = match entry {
            Entry::Residual => target.residual(call),
            Entry::Event => target.event(call),
        };
        (outcome, policy)
    })
    .map_err(|status| {
        log::error!("{entry:?} callback not dispatched: {status:?}");
        CallbackError::status(status)
    })?;

    outcome.map_err(|e| {
        let ires = ires_for(&e, policy);
        if ires == IRES_RETRY {
            log::warn!("{entry:?} callback failed, asking for a smaller step: {e}");
        } else {
            log::error!("{entry:?} callback failed: {e}");
        }
        CallbackError {
            status: DaeStatus::from(&e),
            ires,
        }
    })
}

#[allow(unsafe_code)]
fn write_ires(ires: *mut i32, value: i32) {
    if !ires.is_null() {
        // SAFETY: non-null `ires` points at one integer per the solver ABI.
        unsafe { *ires = value };
    }
}

/// Run one callback, write `IRES` on failure and record the status.
fn run(entry: Entry, args: RawArgs, ires: *mut i32) {
    let code = ffi_guard!({
        match evaluate(entry, &args) {
            Ok(()) => DaeStatus::Ok as i32,
            Err(e) => {
                write_ires(ires, e.ires);
                e.status as i32
            }
        }
    });
    let status = DaeStatus::from_raw(code).unwrap_or(DaeStatus::InternalError);
    if status == DaeStatus::Panicked {
        write_ires(ires, IRES_ABORT);
    }
    registry::record(status);
}

/// DASKR residual: `RES(T, Y, YPRIME, CJ, DELTA, IRES, RPAR, IPAR)`.
///
/// Writes `ipar[0]` values into `delta`. On failure `delta` is left
/// untouched and `*ires` is set to -1 or -2; on success `*ires` is not
/// modified.
#[no_mangle]
#[allow(unsafe_code)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn dae_bridge_daskr_res(
    t: *const f64,
    y: *const f64,
    yp: *const f64,
    cj: *const f64,
    delta: *mut f64,
    ires: *mut i32,
    rpar: *const f64,
    ipar: *const i32,
) {
    let _ = (cj, rpar);
    run(
        Entry::Residual,
        RawArgs {
            t,
            y,
            yp,
            res: delta,
            ipar,
            neq: std::ptr::null(),
            nrt: std::ptr::null(),
        },
        ires,
    );
}

/// DASSL residual: `RES(T, Y, YPRIME, DELTA, IRES, RPAR, IPAR)`.
///
/// Same contract as [`dae_bridge_daskr_res`], without `CJ`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dae_bridge_dassl_res(
    t: *const f64,
    y: *const f64,
    yp: *const f64,
    delta: *mut f64,
    ires: *mut i32,
    rpar: *const f64,
    ipar: *const i32,
) {
    let _ = rpar;
    run(
        Entry::Residual,
        RawArgs {
            t,
            y,
            yp,
            res: delta,
            ipar,
            neq: std::ptr::null(),
            nrt: std::ptr::null(),
        },
        ires,
    );
}

/// DASKR root function: `RT(NEQ, T, Y, YP, NRT, RVAL, RPAR, IPAR)`.
///
/// Writes `ipar[1]` values into `rval`. `*neq` and `*nrt` must agree with
/// `ipar[0]` and `ipar[1]`. There is no status out-parameter: failures
/// leave `rval` untouched and are reported by
/// [`dae_bridge_last_status`](crate::dae_bridge_last_status).
#[no_mangle]
#[allow(unsafe_code)]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn dae_bridge_daskr_event(
    neq: *const i32,
    t: *const f64,
    y: *const f64,
    yp: *const f64,
    nrt: *const i32,
    rval: *mut f64,
    rpar: *const f64,
    ipar: *const i32,
) {
    let _ = rpar;
    run(
        Entry::Event,
        RawArgs {
            t,
            y,
            yp,
            res: rval,
            ipar,
            neq,
            nrt,
        },
        std::ptr::null_mut(),
    );
}
