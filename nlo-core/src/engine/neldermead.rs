//! Bound-constrained Nelder-Mead simplex.
//!
//! Backend for the local derivative-free identifiers. Vertices are clamped
//! into the bound box after every move; convergence is judged by the stop
//! criteria on the simplex spread (ftol on the value spread, xtol on the
//! best/worst vertex distance).

use super::{clamp, EvalContext};
use crate::status::Status;

const ALPHA: f64 = 1.0; // reflection
const GAMMA: f64 = 2.0; // expansion
const RHO: f64 = 0.5; // contraction
const SIGMA: f64 = 0.5; // shrink

// Simplex collapse below this relative diameter means roundoff has eaten
// all remaining progress.
const COLLAPSE_REL: f64 = 1e-30;

struct Simplex {
    vertices: Vec<Vec<f64>>,
    values: Vec<f64>,
}

impl Simplex {
    fn order(&mut self) {
        let mut idx: Vec<usize> = (0..self.values.len()).collect();
        idx.sort_by(|&a, &b| {
            self.values[a]
                .partial_cmp(&self.values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.vertices = idx.iter().map(|&i| self.vertices[i].clone()).collect();
        self.values = idx.iter().map(|&i| self.values[i]).collect();
    }

    fn best(&self) -> (&[f64], f64) {
        (&self.vertices[0], self.values[0])
    }

    fn diameter(&self) -> f64 {
        let best = &self.vertices[0];
        self.vertices[1..]
            .iter()
            .map(|v| {
                v.iter()
                    .zip(best)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0f64, f64::max)
            })
            .fold(0.0f64, f64::max)
    }
}

/// Initial per-coordinate steps: a fraction of the bound box where finite,
/// otherwise proportional to the starting point.
fn initial_steps(x: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(lower.iter().zip(upper))
        .map(|(&xi, (&lo, &hi))| {
            let width = hi - lo;
            let mut step = if width.is_finite() && width > 0.0 {
                0.15 * width
            } else {
                0.1 * xi.abs().max(1.0)
            };
            // Step inward when the vertex would leave the box.
            if xi + step > hi {
                step = -step;
            }
            step
        })
        .collect()
}

pub(crate) fn minimize(ctx: &mut EvalContext<'_>, x: &mut [f64]) -> (Status, f64) {
    let n = ctx.n;
    let (lower, upper) = (ctx.lower.to_vec(), ctx.upper.to_vec());

    // Build and evaluate the initial simplex.
    let steps = initial_steps(x, &lower, &upper);
    let mut vertices = Vec::with_capacity(n + 1);
    vertices.push(x.to_vec());
    for i in 0..n {
        let mut v = x.to_vec();
        v[i] += steps[i];
        clamp(&lower, &upper, &mut v);
        vertices.push(v);
    }

    let mut simplex = Simplex {
        values: Vec::with_capacity(n + 1),
        vertices,
    };
    let mut halted = None;
    for i in 0..=n {
        if let Some(status) = ctx.halt() {
            halted = Some(status);
            // Evaluate nothing further; pad unevaluated vertices.
            simplex.values.resize(n + 1, f64::INFINITY);
            break;
        }
        let v = simplex.vertices[i].clone();
        simplex.values.push(ctx.value(&v));
    }
    simplex.order();

    if let Some(status) = halted {
        let (best, fbest) = simplex.best();
        x.copy_from_slice(best);
        return (status, fbest);
    }

    let mut centroid = vec![0.0; n];
    loop {
        simplex.order();
        let (fbest, fworst) = (simplex.values[0], simplex.values[n]);

        if ctx.stop.stopval_reached(fbest) {
            break_out(&mut simplex, x);
            return (Status::StopvalReached, simplex.values[0]);
        }
        if let Some(status) = ctx.halt() {
            break_out(&mut simplex, x);
            return (status, simplex.values[0]);
        }
        if ctx.stop.f_converged(fworst, fbest) {
            break_out(&mut simplex, x);
            return (Status::FtolReached, simplex.values[0]);
        }
        if ctx.stop.x_converged(&simplex.vertices[0], &simplex.vertices[n]) {
            break_out(&mut simplex, x);
            return (Status::XtolReached, simplex.values[0]);
        }
        // Collapse is judged against the simplex's own coordinate scale;
        // a zero diameter means every vertex is identical.
        let scale = simplex.vertices[0]
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let diameter = simplex.diameter();
        if diameter == 0.0 || diameter <= COLLAPSE_REL * scale {
            break_out(&mut simplex, x);
            return (Status::RoundoffLimited, simplex.values[0]);
        }

        // Centroid of all but the worst vertex.
        centroid.fill(0.0);
        for v in &simplex.vertices[..n] {
            for (c, &vi) in centroid.iter_mut().zip(v) {
                *c += vi;
            }
        }
        for c in centroid.iter_mut() {
            *c /= n as f64;
        }

        let worst = simplex.vertices[n].clone();
        let mut reflected: Vec<f64> = centroid
            .iter()
            .zip(&worst)
            .map(|(&c, &w)| c + ALPHA * (c - w))
            .collect();
        clamp(&lower, &upper, &mut reflected);
        let fr = ctx.value(&reflected);

        if fr < simplex.values[0] {
            // Try expanding past the reflection.
            let mut expanded: Vec<f64> = centroid
                .iter()
                .zip(&worst)
                .map(|(&c, &w)| c + GAMMA * (c - w))
                .collect();
            clamp(&lower, &upper, &mut expanded);
            let fe = ctx.value(&expanded);
            if fe < fr {
                simplex.vertices[n] = expanded;
                simplex.values[n] = fe;
            } else {
                simplex.vertices[n] = reflected;
                simplex.values[n] = fr;
            }
        } else if fr < simplex.values[n - 1] {
            simplex.vertices[n] = reflected;
            simplex.values[n] = fr;
        } else {
            // Contract toward the centroid.
            let toward = if fr < simplex.values[n] {
                &reflected
            } else {
                &worst
            };
            let mut contracted: Vec<f64> = centroid
                .iter()
                .zip(toward)
                .map(|(&c, &t)| c + RHO * (t - c))
                .collect();
            clamp(&lower, &upper, &mut contracted);
            let fc = ctx.value(&contracted);
            if fc < simplex.values[n].min(fr) {
                simplex.vertices[n] = contracted;
                simplex.values[n] = fc;
            } else {
                // Shrink everything toward the best vertex.
                let best = simplex.vertices[0].clone();
                for i in 1..=n {
                    for (vi, &bi) in simplex.vertices[i].iter_mut().zip(&best) {
                        *vi = bi + SIGMA * (*vi - bi);
                    }
                    let v = simplex.vertices[i].clone();
                    if let Some(status) = ctx.halt() {
                        break_out(&mut simplex, x);
                        return (status, simplex.values[0]);
                    }
                    simplex.values[i] = ctx.value(&v);
                }
            }
        }
    }
}

/// Write the best vertex back into `x`.
fn break_out(simplex: &mut Simplex, x: &mut [f64]) {
    simplex.order();
    let (best, _) = simplex.best();
    x.copy_from_slice(best);
}
