//! The synchronous solve engine.
//!
//! `optimize` is a blocking entry point: every algorithm identifier
//! dispatches onto one of three backends (simplex, projected gradient,
//! seeded random search) which drive host callables through an
//! [`EvalContext`]. Constraints are handled by an outer quadratic-penalty
//! loop wrapped around the chosen backend.
//!
//! The engine always works in a minimization frame; maximization is a sign
//! flip applied inside the context, undone by the handle when reporting.

pub(crate) mod gradient;
pub(crate) mod neldermead;
pub(crate) mod random;
pub(crate) mod stop;

use crate::algorithm::Backend;
use crate::binding::{BindingKind, CallbackBinding};
use crate::marshal::Invoker;
use crate::status::Status;
use stop::Stop;

const PENALTY_MU_INITIAL: f64 = 10.0;
const PENALTY_MU_GROWTH: f64 = 10.0;
const PENALTY_ROUNDS: usize = 6;
const PENALTY_FEAS_TOL: f64 = 1e-10;

/// Everything a backend needs to evaluate the merit function: the bound
/// callables, the invoker applying the containment policy, the stop
/// criteria, and the bound box.
pub(crate) struct EvalContext<'a> {
    pub(crate) n: usize,
    maximize: bool,
    objective: &'a CallbackBinding,
    inequality: &'a [CallbackBinding],
    equality: &'a [CallbackBinding],
    invoker: Invoker,
    pub(crate) stop: Stop,
    pub(crate) lower: &'a [f64],
    pub(crate) upper: &'a [f64],
    /// Penalty weight for the current outer round.
    mu: f64,
    // Scratch for constraint evaluation; sized to the largest arity.
    cons_values: Vec<f64>,
    cons_grad: Vec<f64>,
}

impl<'a> EvalContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        n: usize,
        maximize: bool,
        objective: &'a CallbackBinding,
        inequality: &'a [CallbackBinding],
        equality: &'a [CallbackBinding],
        invoker: Invoker,
        stop: Stop,
        lower: &'a [f64],
        upper: &'a [f64],
    ) -> EvalContext<'a> {
        let max_arity = inequality
            .iter()
            .chain(equality)
            .map(CallbackBinding::arity)
            .max()
            .unwrap_or(0);
        EvalContext {
            n,
            maximize,
            objective,
            inequality,
            equality,
            invoker,
            stop,
            lower,
            upper,
            mu: PENALTY_MU_INITIAL,
            cons_values: vec![0.0; max_arity],
            cons_grad: vec![0.0; max_arity * n],
        }
    }

    pub(crate) fn has_constraints(&self) -> bool {
        !self.inequality.is_empty() || !self.equality.is_empty()
    }

    /// Number of contained callback failures so far.
    pub(crate) fn callback_errors(&self) -> u64 {
        self.invoker.errors()
    }

    /// Resource criteria plus the abort-on-callback-error escape hatch.
    pub(crate) fn halt(&self) -> Option<Status> {
        if self.invoker.abort_requested() {
            return Some(Status::ForcedStop);
        }
        self.stop.halt()
    }

    /// Raw objective in the minimization frame, without penalty terms.
    /// Counts as one evaluation.
    pub(crate) fn raw_value(&mut self, x: &[f64]) -> f64 {
        self.stop.note_eval();
        let f = self.invoker.eval_scalar(self.objective, x, None);
        if self.maximize {
            -f
        } else {
            f
        }
    }

    /// Merit value: objective plus quadratic penalty for every attached
    /// constraint. Counts as one evaluation (constraint callables are not
    /// billed against `maxeval`).
    pub(crate) fn value(&mut self, x: &[f64]) -> f64 {
        let f = self.raw_value(x);
        f + self.penalty(x, None)
    }

    /// Merit value and gradient. `grad` must have length `n`; it arrives
    /// pre-populated with its previous contents and is fully overwritten.
    pub(crate) fn value_grad(&mut self, x: &[f64], grad: &mut [f64]) -> f64 {
        self.stop.note_eval();
        let f = self.invoker.eval_scalar(self.objective, x, Some(grad));
        let f = if self.maximize {
            for g in grad.iter_mut() {
                *g = -*g;
            }
            -f
        } else {
            f
        };
        f + self.penalty(x, Some(grad))
    }

    /// Quadratic penalty over all constraints, accumulating its gradient
    /// into `grad` when supplied.
    fn penalty(&mut self, x: &[f64], mut grad: Option<&mut [f64]>) -> f64 {
        if !self.has_constraints() {
            return 0.0;
        }
        let n = self.n;
        let mu = self.mu;
        let mut total = 0.0;
        let wants_grad = grad.is_some();

        // Split borrows: iterate over an index list so `self.invoker` and
        // the scratch buffers stay usable inside the loop.
        for (list, equality) in [(self.inequality, false), (self.equality, true)] {
            for binding in list {
                let m = binding.arity();
                match binding.kind() {
                    BindingKind::ScalarConstraint { .. } => {
                        let g = wants_grad.then(|| &mut self.cons_grad[..n]);
                        let c = self.invoker.eval_scalar(binding, x, g);
                        let active = if equality { c } else { c.max(0.0) };
                        total += mu * active * active;
                        if let Some(out) = grad.as_deref_mut() {
                            if active != 0.0 {
                                for j in 0..n {
                                    out[j] += 2.0 * mu * active * self.cons_grad[j];
                                }
                            }
                        }
                    }
                    BindingKind::VectorConstraint { .. } => {
                        let values = &mut self.cons_values[..m];
                        values.fill(0.0);
                        let g = wants_grad.then(|| &mut self.cons_grad[..m * n]);
                        self.invoker.eval_vector(binding, values, x, g);
                        for i in 0..m {
                            let c = self.cons_values[i];
                            let active = if equality { c } else { c.max(0.0) };
                            total += mu * active * active;
                            if let Some(out) = grad.as_deref_mut() {
                                if active != 0.0 {
                                    for j in 0..n {
                                        out[j] +=
                                            2.0 * mu * active * self.cons_grad[i * n + j];
                                    }
                                }
                            }
                        }
                    }
                    BindingKind::Objective { .. } => unreachable!("objective in constraint list"),
                }
            }
        }
        total
    }

    /// Largest tolerance-adjusted constraint excess at `x`; `<= 0` means
    /// feasible. Does not bill evaluations.
    pub(crate) fn violation(&mut self, x: &[f64]) -> f64 {
        let mut worst = 0.0f64;
        for (list, equality) in [(self.inequality, false), (self.equality, true)] {
            for binding in list {
                match binding.kind() {
                    BindingKind::ScalarConstraint { tolerance, .. } => {
                        let tol = *tolerance;
                        let c = self.invoker.eval_scalar(binding, x, None);
                        let excess = if equality { c.abs() - tol } else { c - tol };
                        worst = worst.max(excess);
                    }
                    BindingKind::VectorConstraint { tolerances, .. } => {
                        let m = binding.arity();
                        let tols = tolerances.clone();
                        let values = &mut self.cons_values[..m];
                        values.fill(0.0);
                        self.invoker.eval_vector(binding, values, x, None);
                        for i in 0..m {
                            let tol = tols.as_ref().map(|t| t[i]).unwrap_or(0.0);
                            let c = self.cons_values[i];
                            let excess = if equality { c.abs() - tol } else { c - tol };
                            worst = worst.max(excess);
                        }
                    }
                    BindingKind::Objective { .. } => unreachable!("objective in constraint list"),
                }
            }
        }
        worst
    }
}

/// Clamp a point into the bound box, in place.
pub(crate) fn clamp(lower: &[f64], upper: &[f64], x: &mut [f64]) {
    for (xi, (&lo, &hi)) in x.iter_mut().zip(lower.iter().zip(upper)) {
        *xi = xi.clamp(lo, hi);
    }
}

fn dispatch(ctx: &mut EvalContext<'_>, x: &mut [f64], backend: Backend) -> (Status, f64) {
    match backend {
        Backend::NelderMead => neldermead::minimize(ctx, x),
        Backend::Gradient => gradient::minimize(ctx, x),
        Backend::Random => random::minimize(ctx, x),
    }
}

/// Run one solve: backend dispatch, wrapped in a quadratic-penalty outer
/// loop when constraints are attached. Returns the status and the raw
/// objective value (minimization frame) at the returned point.
pub(crate) fn solve(
    ctx: &mut EvalContext<'_>,
    x: &mut [f64],
    backend: Backend,
    verbose: bool,
) -> (Status, f64) {
    if !ctx.has_constraints() {
        return dispatch(ctx, x, backend);
    }

    let mut outcome = (Status::Failure, f64::INFINITY);
    for round in 0..PENALTY_ROUNDS {
        outcome = dispatch(ctx, x, backend);
        let violation = ctx.violation(x);
        if verbose {
            eprintln!(
                "penalty round {}: mu={:.1e} violation={:.3e} status={}",
                round, ctx.mu, violation, outcome.0
            );
        }
        if violation <= PENALTY_FEAS_TOL {
            break;
        }
        if matches!(
            outcome.0,
            Status::ForcedStop | Status::MaxevalReached | Status::MaxtimeReached
        ) {
            break;
        }
        ctx.mu *= PENALTY_MU_GROWTH;
    }
    // Report the unpenalized objective at the final point.
    let raw = ctx.raw_value(x);
    (outcome.0, raw)
}
