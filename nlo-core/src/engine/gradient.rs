//! Projected gradient descent with backtracking line search.
//!
//! Backend for the local gradient identifiers. This is the path that
//! exercises gradient marshaling: the objective callable receives the
//! gradient buffer on every accepted-point evaluation, pre-populated with
//! whatever the previous iteration wrote there.

use super::{clamp, EvalContext};
use crate::status::Status;

const ARMIJO_C1: f64 = 1e-4;
const STEP_GROWTH: f64 = 2.0;
const STEP_SHRINK: f64 = 0.5;
const STEP_MIN: f64 = 1e-20;
// Projected-gradient norm under this (relative) threshold means the point
// is stationary within the box.
const STATIONARY_TOL: f64 = 1e-12;

pub(crate) fn minimize(ctx: &mut EvalContext<'_>, x: &mut [f64]) -> (Status, f64) {
    let n = ctx.n;
    let (lower, upper) = (ctx.lower.to_vec(), ctx.upper.to_vec());

    // Persistent gradient buffer: re-handed to the callable each iteration.
    let mut grad = vec![0.0; n];
    let mut f = ctx.value_grad(x, &mut grad);
    if let Some(status) = ctx.halt() {
        return (status, f);
    }

    let mut step = 1.0;
    loop {
        if ctx.stop.stopval_reached(f) {
            return (Status::StopvalReached, f);
        }

        // Projected steepest-descent direction: zero out components pushing
        // outward through an active bound.
        let mut dir_norm2 = 0.0;
        let mut dir = vec![0.0; n];
        for i in 0..n {
            let d = -grad[i];
            let blocked = (x[i] <= lower[i] && d < 0.0) || (x[i] >= upper[i] && d > 0.0);
            if !blocked {
                dir[i] = d;
                dir_norm2 += d * d;
            }
        }
        let scale = 1.0 + f.abs();
        if dir_norm2.sqrt() <= STATIONARY_TOL * scale {
            return (Status::Success, f);
        }

        // Backtracking line search on the merit function.
        let mut accepted = None;
        let mut t = step;
        while t >= STEP_MIN {
            let mut candidate: Vec<f64> =
                x.iter().zip(&dir).map(|(&xi, &di)| xi + t * di).collect();
            clamp(&lower, &upper, &mut candidate);
            let moved = candidate.iter().zip(x.iter()).any(|(a, b)| a != b);
            if !moved {
                t *= STEP_SHRINK;
                continue;
            }
            let f_new = ctx.value(&candidate);
            if let Some(status) = ctx.halt() {
                return (status, f);
            }
            // dir is the negative (projected) gradient, so the Armijo
            // decrease target is t * c1 * |dir|^2.
            if f_new <= f - ARMIJO_C1 * t * dir_norm2 {
                accepted = Some((candidate, f_new));
                break;
            }
            t *= STEP_SHRINK;
        }

        let Some((x_new, f_new)) = accepted else {
            // No decrease at any representable step.
            return (Status::RoundoffLimited, f);
        };

        let f_old = f;
        let x_old = x.to_vec();
        x.copy_from_slice(&x_new);
        // Re-evaluate with gradient at the accepted point.
        f = ctx.value_grad(x, &mut grad);
        if let Some(status) = ctx.halt() {
            return (status, f);
        }

        if ctx.stop.f_converged(f_old, f_new) {
            return (Status::FtolReached, f);
        }
        if ctx.stop.x_converged(&x_old, x) {
            return (Status::XtolReached, f);
        }

        step = (t * STEP_GROWTH).min(1e6);
    }
}
