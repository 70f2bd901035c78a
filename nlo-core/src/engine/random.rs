//! Seeded random search for the global algorithm identifiers.
//!
//! Draws candidate points uniformly from the bound box using the
//! process-wide RNG stream, keeps the incumbent best, and after a stall
//! window hands the incumbent to the simplex backend for a local polish.
//! Candidates are drawn inside the RNG lock; host callables are always
//! invoked outside it.

use rand::Rng;

use super::{neldermead, EvalContext};
use crate::rng;
use crate::status::Status;

// Width of the sampling box around the start point for coordinates with
// an infinite bound.
const UNBOUNDED_HALF_WIDTH: f64 = 10.0;

fn stall_limit(n: usize) -> u64 {
    (10 * n as u64).max(50)
}

/// Per-coordinate sampling interval: the bound box where finite, a window
/// around the start point where not.
fn sample_box(x: &[f64], lower: &[f64], upper: &[f64]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(lower.iter().zip(upper))
        .map(|(&xi, (&lo, &hi))| {
            let lo = if lo.is_finite() {
                lo
            } else {
                xi - UNBOUNDED_HALF_WIDTH
            };
            let hi = if hi.is_finite() {
                hi
            } else {
                xi + UNBOUNDED_HALF_WIDTH
            };
            (lo, hi)
        })
        .collect()
}

pub(crate) fn minimize(ctx: &mut EvalContext<'_>, x: &mut [f64]) -> (Status, f64) {
    let n = ctx.n;
    let boxes = sample_box(x, ctx.lower, ctx.upper);

    let mut best = x.to_vec();
    let mut f_best = ctx.value(x);
    if let Some(status) = ctx.halt() {
        return (status, f_best);
    }
    if ctx.stop.stopval_reached(f_best) {
        return (Status::StopvalReached, f_best);
    }

    let limit = stall_limit(n);
    let mut stalled = 0;
    let mut candidate = vec![0.0; n];
    while stalled < limit {
        rng::with_rng(|r| {
            for (c, &(lo, hi)) in candidate.iter_mut().zip(&boxes) {
                *c = if lo < hi { r.gen_range(lo..=hi) } else { lo };
            }
        });
        let f = ctx.value(&candidate);
        if let Some(status) = ctx.halt() {
            x.copy_from_slice(&best);
            return (status, f_best);
        }
        if f < f_best {
            f_best = f;
            best.copy_from_slice(&candidate);
            stalled = 0;
            if ctx.stop.stopval_reached(f_best) {
                x.copy_from_slice(&best);
                return (Status::StopvalReached, f_best);
            }
        } else {
            stalled += 1;
        }
    }

    // Local polish from the incumbent with whatever budget remains.
    x.copy_from_slice(&best);
    let (status, f) = neldermead::minimize(ctx, x);
    if f <= f_best {
        (status, f)
    } else {
        x.copy_from_slice(&best);
        (status, f_best)
    }
}
