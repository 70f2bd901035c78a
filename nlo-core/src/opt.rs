//! The optimizer handle.
//!
//! An [`Opt`] is the opaque object a host holds: algorithm and dimension
//! fixed at creation, mutable bounds and stopping criteria, zero or one
//! objective binding and ordered constraint binding lists. The lifecycle
//! protocol lives in `Clone` (duplication, every binding re-registered
//! under a fresh [`HandleId`]) and `Drop` (release, every registration
//! removed exactly once).
//!
//! Setters return [`Status`] as data, matching the engine's convention:
//! `InvalidArgs` for a rejected value, `Success` otherwise. Only
//! construction can fail with a real [`Error`].

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::binding::{BindingKind, CallbackBinding, ScalarEval, VectorEval};
use crate::engine::{self, stop::Stop, EvalContext};
use crate::error::{Error, Result};
use crate::marshal::{CallbackPolicy, Invoker};
use crate::registry::{self, HandleId};
use crate::status::Status;

/// An optimizer handle. See the module docs for the lifecycle protocol.
#[derive(Debug)]
pub struct Opt {
    id: HandleId,
    algorithm: Algorithm,
    n: usize,
    lower: Vec<f64>,
    upper: Vec<f64>,
    stopval: f64,
    ftol_rel: f64,
    ftol_abs: f64,
    xtol_rel: f64,
    xtol_abs: Vec<f64>,
    maxeval: u64,
    /// Wall-clock budget in seconds; `<= 0` disables.
    maxtime: f64,
    // Shared so a host can request a stop re-entrantly from inside a
    // callback while optimize blocks.
    force_stop: Arc<AtomicI32>,
    policy: CallbackPolicy,
    verbose: bool,
    objective: Option<CallbackBinding>,
    inequality: Vec<CallbackBinding>,
    equality: Vec<CallbackBinding>,
}

impl Opt {
    /// Create a handle for `algorithm` over `n` variables. Bounds start
    /// unbounded, every stopping criterion starts disabled.
    pub fn new(algorithm: Algorithm, n: usize) -> Opt {
        Opt {
            id: registry::next_handle_id(),
            algorithm,
            n,
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
            stopval: f64::NEG_INFINITY,
            ftol_rel: 0.0,
            ftol_abs: 0.0,
            xtol_rel: 0.0,
            xtol_abs: vec![0.0; n],
            maxeval: 0,
            maxtime: 0.0,
            force_stop: Arc::new(AtomicI32::new(0)),
            policy: CallbackPolicy::Contain,
            verbose: false,
            objective: None,
            inequality: Vec::new(),
            equality: Vec::new(),
        }
    }

    /// Index-based construction for hosts that pass raw integers. Rejects
    /// out-of-range algorithm indices and negative dimensions.
    pub fn with_index(algorithm: i64, n: i64) -> Result<Opt> {
        let algorithm = Algorithm::from_index(algorithm).ok_or_else(|| {
            Error::InvalidArgument(format!("algorithm index {} out of range", algorithm))
        })?;
        if n < 0 {
            return Err(Error::InvalidArgument(format!(
                "dimension must be non-negative, got {}",
                n
            )));
        }
        Ok(Opt::new(algorithm, n as usize))
    }

    pub fn get_algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn get_dimension(&self) -> usize {
        self.n
    }

    /// Identifier of this handle; fresh per handle, including per clone.
    pub fn handle_id(&self) -> HandleId {
        self.id
    }

    // ---------- objective attachment ----------

    /// Attach `f` as the objective to minimize, releasing any previous
    /// objective binding first.
    pub fn set_min_objective<E: ScalarEval + 'static>(&mut self, f: E) -> Status {
        self.set_objective(Arc::new(f), false)
    }

    /// Attach `f` as the objective to maximize.
    pub fn set_max_objective<E: ScalarEval + 'static>(&mut self, f: E) -> Status {
        self.set_objective(Arc::new(f), true)
    }

    fn set_objective(&mut self, f: Arc<dyn ScalarEval>, maximize: bool) -> Status {
        // Drop the old binding before registering the new one, so a handle
        // never holds two objective registrations at once.
        self.objective = None;
        self.objective = Some(CallbackBinding::scalar(
            self.id,
            BindingKind::Objective { maximize },
            f,
        ));
        Status::Success
    }

    // ---------- constraint attachment ----------

    /// Attach a scalar inequality constraint `c(x) <= tolerance`.
    pub fn add_inequality_constraint<E: ScalarEval + 'static>(
        &mut self,
        f: E,
        tolerance: f64,
    ) -> Status {
        self.add_scalar_constraint(Arc::new(f), false, tolerance)
    }

    /// Attach a scalar equality constraint `|c(x)| <= tolerance`.
    pub fn add_equality_constraint<E: ScalarEval + 'static>(
        &mut self,
        f: E,
        tolerance: f64,
    ) -> Status {
        self.add_scalar_constraint(Arc::new(f), true, tolerance)
    }

    fn add_scalar_constraint(
        &mut self,
        f: Arc<dyn ScalarEval>,
        equality: bool,
        tolerance: f64,
    ) -> Status {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Status::InvalidArgs;
        }
        let binding = CallbackBinding::scalar(
            self.id,
            BindingKind::ScalarConstraint {
                equality,
                tolerance,
            },
            f,
        );
        self.constraint_list(equality).push(binding);
        Status::Success
    }

    /// Attach a vector inequality constraint with `m` outputs. `tolerances`,
    /// when supplied, must have length `m`. `m == 0` is a no-op.
    pub fn add_inequality_mconstraint<E: VectorEval + 'static>(
        &mut self,
        f: E,
        m: usize,
        tolerances: Option<&[f64]>,
    ) -> Status {
        self.add_vector_constraint(Arc::new(f), false, m, tolerances)
    }

    /// Attach a vector equality constraint with `m` outputs.
    pub fn add_equality_mconstraint<E: VectorEval + 'static>(
        &mut self,
        f: E,
        m: usize,
        tolerances: Option<&[f64]>,
    ) -> Status {
        self.add_vector_constraint(Arc::new(f), true, m, tolerances)
    }

    fn add_vector_constraint(
        &mut self,
        f: Arc<dyn VectorEval>,
        equality: bool,
        m: usize,
        tolerances: Option<&[f64]>,
    ) -> Status {
        if m == 0 {
            return Status::Success;
        }
        if let Some(tols) = tolerances {
            if tols.len() != m || tols.iter().any(|&t| t.is_nan() || t < 0.0) {
                return Status::InvalidArgs;
            }
        }
        let binding = CallbackBinding::vector(
            self.id,
            BindingKind::VectorConstraint {
                equality,
                arity: m,
                tolerances: tolerances.map(<[f64]>::to_vec),
            },
            f,
        );
        self.constraint_list(equality).push(binding);
        Status::Success
    }

    fn constraint_list(&mut self, equality: bool) -> &mut Vec<CallbackBinding> {
        if equality {
            &mut self.equality
        } else {
            &mut self.inequality
        }
    }

    /// Release every inequality constraint binding.
    pub fn remove_inequality_constraints(&mut self) -> Status {
        self.inequality.clear();
        Status::Success
    }

    /// Release every equality constraint binding.
    pub fn remove_equality_constraints(&mut self) -> Status {
        self.equality.clear();
        Status::Success
    }

    /// Tolerances of the inequality constraint at `index`, flattened to one
    /// entry per output.
    pub fn inequality_constraint_tolerances(&self, index: usize) -> Option<Vec<f64>> {
        self.inequality.get(index).map(binding_tolerances)
    }

    /// Tolerances of the equality constraint at `index`.
    pub fn equality_constraint_tolerances(&self, index: usize) -> Option<Vec<f64>> {
        self.equality.get(index).map(binding_tolerances)
    }

    // ---------- bounds ----------

    pub fn set_lower_bounds(&mut self, bounds: &[f64]) -> Status {
        set_bound_vec(&mut self.lower, bounds)
    }

    pub fn set_upper_bounds(&mut self, bounds: &[f64]) -> Status {
        set_bound_vec(&mut self.upper, bounds)
    }

    /// Broadcast one value to every lower bound.
    pub fn set_lower_bounds1(&mut self, bound: f64) -> Status {
        if bound.is_nan() {
            return Status::InvalidArgs;
        }
        self.lower.fill(bound);
        Status::Success
    }

    /// Broadcast one value to every upper bound.
    pub fn set_upper_bounds1(&mut self, bound: f64) -> Status {
        if bound.is_nan() {
            return Status::InvalidArgs;
        }
        self.upper.fill(bound);
        Status::Success
    }

    pub fn get_lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn get_upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    // ---------- stopping criteria ----------

    pub fn set_stopval(&mut self, stopval: f64) -> Status {
        if stopval.is_nan() {
            return Status::InvalidArgs;
        }
        self.stopval = stopval;
        Status::Success
    }

    pub fn get_stopval(&self) -> f64 {
        self.stopval
    }

    pub fn set_ftol_rel(&mut self, tol: f64) -> Status {
        set_tol(&mut self.ftol_rel, tol)
    }

    pub fn get_ftol_rel(&self) -> f64 {
        self.ftol_rel
    }

    pub fn set_ftol_abs(&mut self, tol: f64) -> Status {
        set_tol(&mut self.ftol_abs, tol)
    }

    pub fn get_ftol_abs(&self) -> f64 {
        self.ftol_abs
    }

    pub fn set_xtol_rel(&mut self, tol: f64) -> Status {
        set_tol(&mut self.xtol_rel, tol)
    }

    pub fn get_xtol_rel(&self) -> f64 {
        self.xtol_rel
    }

    /// Per-coordinate absolute point tolerances; length must equal the
    /// dimension.
    pub fn set_xtol_abs(&mut self, tols: &[f64]) -> Status {
        if tols.len() != self.n || tols.iter().any(|t| t.is_nan()) {
            return Status::InvalidArgs;
        }
        self.xtol_abs.copy_from_slice(tols);
        Status::Success
    }

    /// Broadcast one absolute point tolerance to every coordinate.
    pub fn set_xtol_abs1(&mut self, tol: f64) -> Status {
        if tol.is_nan() {
            return Status::InvalidArgs;
        }
        self.xtol_abs.fill(tol);
        Status::Success
    }

    pub fn get_xtol_abs(&self) -> &[f64] {
        &self.xtol_abs
    }

    /// Evaluation budget; `0` means unlimited, negative is rejected.
    pub fn set_maxeval(&mut self, maxeval: i64) -> Status {
        if maxeval < 0 {
            return Status::InvalidArgs;
        }
        self.maxeval = maxeval as u64;
        Status::Success
    }

    pub fn get_maxeval(&self) -> i64 {
        self.maxeval as i64
    }

    /// Wall-clock budget in seconds; `<= 0` disables.
    pub fn set_maxtime(&mut self, seconds: f64) -> Status {
        if seconds.is_nan() {
            return Status::InvalidArgs;
        }
        self.maxtime = seconds;
        Status::Success
    }

    pub fn get_maxtime(&self) -> f64 {
        self.maxtime
    }

    // ---------- force stop ----------

    /// Request termination of an in-progress solve (equivalent to
    /// `set_force_stop(1)`). Safe to call from inside a callback.
    pub fn force_stop(&self) -> Status {
        self.set_force_stop(1)
    }

    pub fn set_force_stop(&self, value: i32) -> Status {
        self.force_stop.store(value, Ordering::Relaxed);
        Status::Success
    }

    pub fn get_force_stop(&self) -> i32 {
        self.force_stop.load(Ordering::Relaxed)
    }

    /// The shared stop flag itself. Clone it into a callable to request a
    /// stop re-entrantly while `optimize` blocks on this handle.
    pub fn force_stop_flag(&self) -> Arc<AtomicI32> {
        self.force_stop.clone()
    }

    // ---------- solve configuration ----------

    /// What to do when a callable raises mid-solve; defaults to
    /// [`CallbackPolicy::Contain`].
    pub fn set_callback_policy(&mut self, policy: CallbackPolicy) {
        self.policy = policy;
    }

    /// Per-iteration progress on stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    // ---------- solve ----------

    /// Run the solve from the starting point in `x`, which must have length
    /// equal to the dimension. Blocks until a stopping criterion fires and
    /// writes the best point found back into `x` regardless of status.
    /// Returns the status together with the objective value at that point.
    pub fn optimize(&mut self, x: &mut [f64]) -> (Status, f64) {
        if x.len() != self.n {
            return (Status::InvalidArgs, 0.0);
        }
        if self
            .lower
            .iter()
            .zip(&self.upper)
            .any(|(&lo, &hi)| lo > hi)
        {
            return (Status::InvalidArgs, 0.0);
        }
        let Some(objective) = &self.objective else {
            return (Status::InvalidArgs, 0.0);
        };
        let maximize = matches!(objective.kind(), BindingKind::Objective { maximize: true });

        let mut invoker = Invoker::new(self.policy);
        if self.n == 0 {
            // Zero-dimensional problem: one evaluation settles it.
            let f = invoker.eval_scalar(objective, x, None);
            return (Status::Success, f);
        }

        engine::clamp(&self.lower, &self.upper, x);
        // A stale stop request must not kill a fresh solve.
        self.force_stop.store(0, Ordering::Relaxed);

        // The engine minimizes; a maximize objective is sign-flipped inside
        // the context, so the stopval crosses into that frame too.
        let stopval = if maximize { -self.stopval } else { self.stopval };
        let stop = Stop::new(
            stopval,
            self.ftol_rel,
            self.ftol_abs,
            self.xtol_rel,
            self.xtol_abs.clone(),
            self.maxeval,
            (self.maxtime > 0.0).then(|| Duration::from_secs_f64(self.maxtime)),
            self.force_stop.clone(),
        );
        let mut ctx = EvalContext::new(
            self.n,
            maximize,
            objective,
            &self.inequality,
            &self.equality,
            invoker,
            stop,
            &self.lower,
            &self.upper,
        );

        let (status, f) = engine::solve(&mut ctx, x, self.algorithm.backend(), self.verbose);
        if self.verbose {
            eprintln!(
                "optimize done: status={} nevals={} callback_errors={}",
                status,
                ctx.stop.nevals,
                ctx.callback_errors()
            );
        }
        let f = if maximize { -f } else { f };
        (status, f)
    }
}

// Duplication protocol: fresh handle id, every binding re-registered under
// it through its capability. The clone shares nothing with the source but
// the callable Arcs themselves.
impl Clone for Opt {
    fn clone(&self) -> Opt {
        let id = registry::next_handle_id();
        Opt {
            id,
            algorithm: self.algorithm,
            n: self.n,
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            stopval: self.stopval,
            ftol_rel: self.ftol_rel,
            ftol_abs: self.ftol_abs,
            xtol_rel: self.xtol_rel,
            xtol_abs: self.xtol_abs.clone(),
            maxeval: self.maxeval,
            maxtime: self.maxtime,
            force_stop: Arc::new(AtomicI32::new(0)),
            policy: self.policy,
            verbose: self.verbose,
            objective: self.objective.as_ref().map(|b| b.duplicate(id)),
            inequality: self.inequality.iter().map(|b| b.duplicate(id)).collect(),
            equality: self.equality.iter().map(|b| b.duplicate(id)).collect(),
        }
    }
}

fn binding_tolerances(binding: &CallbackBinding) -> Vec<f64> {
    match binding.kind() {
        BindingKind::ScalarConstraint { tolerance, .. } => vec![*tolerance],
        BindingKind::VectorConstraint {
            arity, tolerances, ..
        } => tolerances
            .clone()
            .unwrap_or_else(|| vec![0.0; *arity]),
        BindingKind::Objective { .. } => Vec::new(),
    }
}

fn set_bound_vec(dest: &mut [f64], src: &[f64]) -> Status {
    if src.len() != dest.len() || src.iter().any(|b| b.is_nan()) {
        return Status::InvalidArgs;
    }
    dest.copy_from_slice(src);
    Status::Success
}

fn set_tol(dest: &mut f64, tol: f64) -> Status {
    if tol.is_nan() {
        return Status::InvalidArgs;
    }
    *dest = tol;
    Status::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::EvalError;

    fn sphere(x: &[f64], grad: Option<&mut [f64]>) -> f64 {
        if let Some(g) = grad {
            for (gi, &xi) in g.iter_mut().zip(x) {
                *gi = 2.0 * xi;
            }
        }
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_create_echoes_parameters() {
        let opt = Opt::new(Algorithm::LnNelderMead, 3);
        assert_eq!(opt.get_algorithm(), Algorithm::LnNelderMead);
        assert_eq!(opt.get_dimension(), 3);
        assert_eq!(opt.get_lower_bounds(), &[f64::NEG_INFINITY; 3]);
        assert_eq!(opt.get_maxeval(), 0);
    }

    #[test]
    fn test_with_index_validates() {
        assert!(Opt::with_index(-1, 2).is_err());
        assert!(Opt::with_index(Algorithm::COUNT as i64, 2).is_err());
        assert!(Opt::with_index(0, -1).is_err());
        let opt = Opt::with_index(Algorithm::LnNelderMead.index() as i64, 2).unwrap();
        assert_eq!(opt.get_algorithm(), Algorithm::LnNelderMead);
    }

    #[test]
    fn test_setter_validation() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 2);
        assert_eq!(opt.set_lower_bounds(&[0.0]), Status::InvalidArgs);
        assert_eq!(opt.set_lower_bounds(&[0.0, f64::NAN]), Status::InvalidArgs);
        assert_eq!(opt.set_lower_bounds(&[0.0, 1.0]), Status::Success);
        assert_eq!(opt.set_maxeval(-1), Status::InvalidArgs);
        assert_eq!(opt.set_xtol_abs(&[1e-8]), Status::InvalidArgs);
        assert_eq!(opt.set_xtol_abs1(1e-8), Status::Success);
        assert_eq!(opt.get_xtol_abs(), &[1e-8, 1e-8]);
        assert_eq!(
            opt.add_inequality_constraint(sphere, -1.0),
            Status::InvalidArgs
        );
        assert_eq!(
            opt.add_inequality_constraint(sphere, f64::NAN),
            Status::InvalidArgs
        );
    }

    #[test]
    fn test_objective_replacement_releases_old_binding() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 1);
        opt.set_min_objective(sphere);
        assert_eq!(registry::registrations_for(opt.handle_id()), 1);
        opt.set_max_objective(sphere);
        assert_eq!(registry::registrations_for(opt.handle_id()), 1);
    }

    #[test]
    fn test_mconstraint_zero_arity_is_noop() {
        struct Noop;
        impl VectorEval for Noop {
            fn eval(
                &self,
                _result: &mut [f64],
                _x: &[f64],
                _grad: Option<&mut [f64]>,
            ) -> std::result::Result<(), EvalError> {
                Ok(())
            }
        }
        let mut opt = Opt::new(Algorithm::LnCobyla, 2);
        assert_eq!(
            opt.add_inequality_mconstraint(Noop, 0, None),
            Status::Success
        );
        assert_eq!(registry::registrations_for(opt.handle_id()), 0);
        assert_eq!(
            opt.add_inequality_mconstraint(Noop, 2, Some(&[1e-8])),
            Status::InvalidArgs
        );
    }

    #[test]
    fn test_optimize_requires_exact_length_and_objective() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 2);
        opt.set_min_objective(sphere);
        let mut short = vec![0.0];
        assert_eq!(opt.optimize(&mut short).0, Status::InvalidArgs);

        let mut bare = Opt::new(Algorithm::LnNelderMead, 2);
        let mut x = vec![0.0, 0.0];
        assert_eq!(bare.optimize(&mut x).0, Status::InvalidArgs);
    }

    #[test]
    fn test_optimize_rejects_inverted_bounds() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 1);
        opt.set_min_objective(sphere);
        opt.set_lower_bounds1(1.0);
        opt.set_upper_bounds1(-1.0);
        let mut x = vec![0.0];
        assert_eq!(opt.optimize(&mut x).0, Status::InvalidArgs);
    }

    #[test]
    fn test_zero_dimension_evaluates_once() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 0);
        opt.set_min_objective(|_x: &[f64], _g: Option<&mut [f64]>| 7.0);
        let mut x: Vec<f64> = Vec::new();
        let (status, f) = opt.optimize(&mut x);
        assert_eq!(status, Status::Success);
        assert_eq!(f, 7.0);
    }

    #[test]
    fn test_maximize_reports_unflipped_value() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 1);
        opt.set_lower_bounds1(-5.0);
        opt.set_upper_bounds1(5.0);
        opt.set_xtol_rel(1e-6);
        // Concave with maximum 3 at x = 1.
        opt.set_max_objective(|x: &[f64], _g: Option<&mut [f64]>| 3.0 - (x[0] - 1.0).powi(2));
        let mut x = vec![-4.0];
        let (status, f) = opt.optimize(&mut x);
        assert!(status.is_success());
        assert!((x[0] - 1.0).abs() < 1e-3);
        assert!((f - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_force_stop_cleared_between_solves() {
        let mut opt = Opt::new(Algorithm::LnNelderMead, 1);
        opt.set_xtol_rel(1e-4);
        opt.set_min_objective(sphere);
        opt.set_force_stop(1);
        assert_eq!(opt.get_force_stop(), 1);
        let mut x = vec![1.0];
        let (status, _) = opt.optimize(&mut x);
        assert!(status.is_success());
        assert_eq!(opt.get_force_stop(), 0);
    }
}
