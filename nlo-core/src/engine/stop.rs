//! Stopping-criteria evaluation.
//!
//! All criteria are polled between iterations (or between evaluations); none
//! interrupt an in-flight callback invocation. The force-stop flag lives in
//! an `Arc` so a host can set it re-entrantly while `optimize` blocks.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::status::Status;

/// Stop criteria for one solve, in the engine's minimization frame.
#[derive(Debug)]
pub(crate) struct Stop {
    /// Objective target; reaching `f <= stopval` halts. Non-finite = disabled.
    pub stopval: f64,
    /// Relative objective tolerance (`<= 0` disables).
    pub ftol_rel: f64,
    /// Absolute objective tolerance (`<= 0` disables).
    pub ftol_abs: f64,
    /// Relative point tolerance (`<= 0` disables).
    pub xtol_rel: f64,
    /// Per-coordinate absolute point tolerances (`<= 0` entries disable).
    pub xtol_abs: Vec<f64>,
    /// Evaluation budget (`0` = unlimited).
    pub maxeval: u64,
    /// Wall-clock budget.
    pub maxtime: Option<Duration>,
    /// Objective evaluations performed so far.
    pub nevals: u64,
    start: Instant,
    force_stop: Arc<AtomicI32>,
}

impl Stop {
    pub(crate) fn new(
        stopval: f64,
        ftol_rel: f64,
        ftol_abs: f64,
        xtol_rel: f64,
        xtol_abs: Vec<f64>,
        maxeval: u64,
        maxtime: Option<Duration>,
        force_stop: Arc<AtomicI32>,
    ) -> Stop {
        Stop {
            stopval,
            ftol_rel,
            ftol_abs,
            xtol_rel,
            xtol_abs,
            maxeval,
            maxtime,
            nevals: 0,
            start: Instant::now(),
            force_stop,
        }
    }

    pub(crate) fn note_eval(&mut self) {
        self.nevals += 1;
    }

    pub(crate) fn forced(&self) -> bool {
        self.force_stop.load(Ordering::Relaxed) != 0
    }

    fn evals_exhausted(&self) -> bool {
        self.maxeval > 0 && self.nevals >= self.maxeval
    }

    fn time_exhausted(&self) -> bool {
        self.maxtime
            .map(|limit| self.start.elapsed() >= limit)
            .unwrap_or(false)
    }

    /// The cheap resource criteria, in priority order.
    pub(crate) fn halt(&self) -> Option<Status> {
        if self.forced() {
            Some(Status::ForcedStop)
        } else if self.evals_exhausted() {
            Some(Status::MaxevalReached)
        } else if self.time_exhausted() {
            Some(Status::MaxtimeReached)
        } else {
            None
        }
    }

    pub(crate) fn stopval_reached(&self, f: f64) -> bool {
        self.stopval.is_finite() && f <= self.stopval
    }

    /// Objective-change convergence between two merit values.
    pub(crate) fn f_converged(&self, f_old: f64, f_new: f64) -> bool {
        let delta = (f_old - f_new).abs();
        let scale = f_old.abs().max(f_new.abs());
        (self.ftol_rel > 0.0 && delta <= self.ftol_rel * scale)
            || (self.ftol_abs > 0.0 && delta <= self.ftol_abs)
    }

    /// Point convergence: every coordinate within its tolerance. The
    /// relative test scales by the mean magnitude and treats coordinates
    /// that are exactly equal as converged, so minima at the origin still
    /// terminate.
    pub(crate) fn x_converged(&self, a: &[f64], b: &[f64]) -> bool {
        let abs_enabled = self.xtol_abs.iter().any(|&t| t > 0.0);
        if self.xtol_rel <= 0.0 && !abs_enabled {
            return false;
        }
        a.iter().zip(b).enumerate().all(|(i, (&ai, &bi))| {
            let delta = (ai - bi).abs();
            let rel_ok = self.xtol_rel > 0.0
                && (delta <= self.xtol_rel * 0.5 * (ai.abs() + bi.abs()) || ai == bi);
            let abs_tol = self.xtol_abs.get(i).copied().unwrap_or(0.0);
            let abs_ok = abs_tol > 0.0 && delta <= abs_tol;
            rel_ok || abs_ok
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop() -> Stop {
        Stop::new(
            f64::NEG_INFINITY,
            0.0,
            0.0,
            0.0,
            vec![0.0; 2],
            0,
            None,
            Arc::new(AtomicI32::new(0)),
        )
    }

    #[test]
    fn test_disabled_criteria_never_fire() {
        let s = stop();
        assert!(s.halt().is_none());
        assert!(!s.stopval_reached(-1e300));
        assert!(!s.f_converged(1.0, 1.0));
        assert!(!s.x_converged(&[1.0, 1.0], &[1.0, 1.0]));
    }

    #[test]
    fn test_maxeval() {
        let mut s = stop();
        s.maxeval = 2;
        s.note_eval();
        assert!(s.halt().is_none());
        s.note_eval();
        assert_eq!(s.halt(), Some(Status::MaxevalReached));
    }

    #[test]
    fn test_force_stop_takes_priority() {
        let flag = Arc::new(AtomicI32::new(0));
        let mut s = stop();
        s.force_stop = flag.clone();
        s.maxeval = 1;
        s.note_eval();
        flag.store(1, Ordering::Relaxed);
        assert_eq!(s.halt(), Some(Status::ForcedStop));
    }

    #[test]
    fn test_ftol() {
        let mut s = stop();
        s.ftol_rel = 1e-6;
        assert!(s.f_converged(1.0, 1.0 + 1e-8));
        assert!(!s.f_converged(1.0, 1.1));
    }

    #[test]
    fn test_xtol_rel_fires_at_origin() {
        let mut s = stop();
        s.xtol_rel = 1e-4;
        // Identical points converge even when every coordinate is zero.
        assert!(s.x_converged(&[0.0, 0.0], &[0.0, 0.0]));
        // Tiny magnitudes are judged against their own scale, not the
        // starting point's.
        assert!(s.x_converged(&[1e-30, 0.0], &[1e-30 * (1.0 + 1e-5), 0.0]));
        assert!(!s.x_converged(&[1e-30, 0.0], &[2e-30, 0.0]));
    }

    #[test]
    fn test_xtol_per_coordinate() {
        let mut s = stop();
        s.xtol_abs = vec![1e-3, 0.0];
        s.xtol_rel = 1e-6;
        // First coordinate passes on the absolute tolerance, second must
        // pass on the relative one.
        assert!(s.x_converged(&[0.0, 100.0], &[5e-4, 100.00001]));
        assert!(!s.x_converged(&[0.0, 100.0], &[5e-4, 101.0]));
    }
}
