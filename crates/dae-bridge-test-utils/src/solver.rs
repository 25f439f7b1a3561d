//! A stand-in for the DASSL/DASKR driver.
//!
//! [`MockSolver`] owns `t`, `y`, `yp` and `ipar` exactly as the Fortran
//! solver does and calls the native callbacks through function pointers
//! with the solver's argument layout.

use crate::canary::CanaryBuffer;

/// DASKR `RES(T, Y, YPRIME, CJ, DELTA, IRES, RPAR, IPAR)`.
pub type DaskrResidualFn = extern "C" fn(
    *const f64,
    *const f64,
    *const f64,
    *const f64,
    *mut f64,
    *mut i32,
    *const f64,
    *const i32,
);

/// DASSL `RES(T, Y, YPRIME, DELTA, IRES, RPAR, IPAR)`.
pub type DasslResidualFn =
    extern "C" fn(*const f64, *const f64, *const f64, *mut f64, *mut i32, *const f64, *const i32);

/// DASKR `RT(NEQ, T, Y, YP, NRT, RVAL, RPAR, IPAR)`.
pub type DaskrRootFn = extern "C" fn(
    *const i32,
    *const f64,
    *const f64,
    *const f64,
    *const i32,
    *mut f64,
    *const f64,
    *const i32,
);

/// What one residual call left behind.
#[derive(Debug)]
pub struct ResidualOutcome {
    pub res: CanaryBuffer,
    /// `IRES` after the call; the solver initialises it to 0.
    pub ires: i32,
}

/// Result of [`MockSolver::march`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarchReport {
    pub accepted_steps: usize,
    /// Calls that came back with `IRES = -1`.
    pub retries: usize,
    /// `true` if a call came back with `IRES = -2`, or retries ran out.
    pub aborted: bool,
    pub final_dt: f64,
}

/// Owns the solver-side buffers of one solve.
#[derive(Clone, Debug)]
pub struct MockSolver {
    pub t: f64,
    pub y: Vec<f64>,
    pub yp: Vec<f64>,
    pub ipar: Vec<i32>,
    pub cj: f64,
    pub rpar: Vec<f64>,
}

impl MockSolver {
    /// `n` state variables, `m` root functions. `y` and `yp` start at zero.
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            t: 0.0,
            y: vec![0.0; n],
            yp: vec![0.0; n],
            ipar: vec![n as i32, m as i32],
            cj: 1.0,
            rpar: vec![0.0],
        }
    }

    pub fn with_state(mut self, t: f64, y: &[f64], yp: &[f64]) -> Self {
        self.t = t;
        self.y = y.to_vec();
        self.yp = yp.to_vec();
        self
    }

    pub fn n(&self) -> usize {
        self.ipar[0].max(0) as usize
    }

    pub fn m(&self) -> usize {
        self.ipar.get(1).copied().unwrap_or(0).max(0) as usize
    }

    /// Call a DASKR residual; `res` is sized `out_len` (defaults to N).
    pub fn daskr_residual(&self, f: DaskrResidualFn) -> ResidualOutcome {
        self.daskr_residual_into(f, self.n())
    }

    pub fn daskr_residual_into(&self, f: DaskrResidualFn, out_len: usize) -> ResidualOutcome {
        let mut res = CanaryBuffer::new(out_len);
        let mut ires = 0;
        f(
            &self.t,
            self.y.as_ptr(),
            self.yp.as_ptr(),
            &self.cj,
            res.as_mut_ptr(),
            &mut ires,
            self.rpar.as_ptr(),
            self.ipar.as_ptr(),
        );
        ResidualOutcome { res, ires }
    }

    /// Call a DASSL residual.
    pub fn dassl_residual(&self, f: DasslResidualFn) -> ResidualOutcome {
        let mut res = CanaryBuffer::new(self.n());
        let mut ires = 0;
        f(
            &self.t,
            self.y.as_ptr(),
            self.yp.as_ptr(),
            res.as_mut_ptr(),
            &mut ires,
            self.rpar.as_ptr(),
            self.ipar.as_ptr(),
        );
        ResidualOutcome { res, ires }
    }

    /// Call a DASKR root function with `NEQ = N` and `NRT = M`.
    pub fn roots(&self, f: DaskrRootFn) -> CanaryBuffer {
        self.roots_with(f, self.ipar[0], self.m() as i32)
    }

    /// Call a DASKR root function with explicit `NEQ`/`NRT`.
    pub fn roots_with(&self, f: DaskrRootFn, neq: i32, nrt: i32) -> CanaryBuffer {
        let mut rval = CanaryBuffer::new(self.m());
        f(
            &neq,
            &self.t,
            self.y.as_ptr(),
            self.yp.as_ptr(),
            &nrt,
            rval.as_mut_ptr(),
            self.rpar.as_ptr(),
            self.ipar.as_ptr(),
        );
        rval
    }

    /// Take `steps` explicit steps of `y += dt * yp`, evaluating the
    /// residual at each trial point before accepting it. `IRES = -1` halves
    /// `dt` and retries (at most `max_retries` times in a row); `IRES = -2`
    /// stops.
    pub fn march(
        &mut self,
        f: DaskrResidualFn,
        steps: usize,
        mut dt: f64,
        max_retries: usize,
    ) -> MarchReport {
        let mut report = MarchReport::default();
        let mut consecutive = 0;
        while report.accepted_steps < steps {
            let mut trial = self.clone();
            trial.t += dt;
            for (y, yp) in trial.y.iter_mut().zip(&self.yp) {
                *y += dt * yp;
            }
            match trial.daskr_residual(f).ires {
                0 => {
                    *self = trial;
                    consecutive = 0;
                    report.accepted_steps += 1;
                }
                -1 if consecutive < max_retries => {
                    consecutive += 1;
                    report.retries += 1;
                    dt *= 0.5;
                }
                _ => {
                    report.aborted = true;
                    break;
                }
            }
        }
        report.final_dt = dt;
        report
    }
}
