//! The invocation protocol between engine buffers and host callables.
//!
//! Every native evaluation request flows through an [`Invoker`]: it hands
//! the point buffer to the bound callable as an ordered slice, passes the
//! gradient scratch only when the active algorithm asked for gradients
//! (pre-populated with its current contents, so the callable sees whatever
//! the engine last wrote there), and collects the result.
//!
//! # Containment policy
//!
//! The engine has no channel to receive a host-language error in the middle
//! of a blocking solve; the only alternatives are aborting the process or
//! substituting a neutral value and letting the stopping criteria terminate
//! the solve. The default [`CallbackPolicy::Contain`] does the latter: a
//! failed scalar evaluation reports `0.0`, a failed vector evaluation leaves
//! the result buffer at its pre-populated contents. This deliberately
//! swallows host errors; [`CallbackPolicy::Abort`] is the opt-in escape
//! hatch that makes `optimize` return `ForcedStop` at the next stop poll.

use crate::binding::CallbackBinding;

/// What to do when a host callable raises during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackPolicy {
    /// Substitute a neutral value and keep solving (source behavior).
    #[default]
    Contain,
    /// Stop the solve at the next iteration boundary with `ForcedStop`.
    Abort,
}

/// Drives evaluation requests through bindings, applying the policy.
#[derive(Debug)]
pub(crate) struct Invoker {
    policy: CallbackPolicy,
    errors: u64,
    abort_requested: bool,
}

impl Invoker {
    pub(crate) fn new(policy: CallbackPolicy) -> Invoker {
        Invoker {
            policy,
            errors: 0,
            abort_requested: false,
        }
    }

    /// Number of contained callback failures so far.
    pub(crate) fn errors(&self) -> u64 {
        self.errors
    }

    /// True once a failure occurred under [`CallbackPolicy::Abort`].
    pub(crate) fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    fn record_failure(&mut self) {
        self.errors += 1;
        if self.policy == CallbackPolicy::Abort {
            self.abort_requested = true;
        }
    }

    /// Evaluate a scalar binding at `x`. `grad`, when present, has length
    /// `x.len()` and is overwritten by the callable.
    pub(crate) fn eval_scalar(
        &mut self,
        binding: &CallbackBinding,
        x: &[f64],
        grad: Option<&mut [f64]>,
    ) -> f64 {
        let eval = binding
            .scalar_eval()
            .expect("scalar invocation on vector binding");
        match eval.eval(x, grad) {
            Ok(value) => value,
            Err(_) => {
                self.record_failure();
                0.0
            }
        }
    }

    /// Evaluate a vector binding at `x` into `result` (length `m`). `grad`,
    /// when present, has length `m * x.len()` in row-major order (output
    /// index major); element order is preserved round-trip.
    pub(crate) fn eval_vector(
        &mut self,
        binding: &CallbackBinding,
        result: &mut [f64],
        x: &[f64],
        grad: Option<&mut [f64]>,
    ) {
        debug_assert_eq!(result.len(), binding.arity());
        if let Some(g) = &grad {
            debug_assert_eq!(g.len(), result.len() * x.len());
        }
        let eval = binding
            .vector_eval()
            .expect("vector invocation on scalar binding");
        if eval.eval(result, x, grad).is_err() {
            // Result buffer keeps its pre-populated contents.
            self.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingKind, CallbackBinding, EvalError, ScalarEval, VectorEval};
    use crate::registry;
    use std::sync::Arc;

    struct AlwaysFails;
    impl ScalarEval for AlwaysFails {
        fn eval(&self, _x: &[f64], _grad: Option<&mut [f64]>) -> Result<f64, EvalError> {
            Err(EvalError::new("boom"))
        }
    }

    fn objective(eval: Arc<dyn ScalarEval>) -> CallbackBinding {
        CallbackBinding::scalar(
            registry::next_handle_id(),
            BindingKind::Objective { maximize: false },
            eval,
        )
    }

    #[test]
    fn test_scalar_success_passes_value_and_grad() {
        let b = objective(Arc::new(|x: &[f64], grad: Option<&mut [f64]>| {
            if let Some(g) = grad {
                for (i, gi) in g.iter_mut().enumerate() {
                    *gi = 2.0 * x[i];
                }
            }
            x.iter().map(|v| v * v).sum()
        }));
        let mut inv = Invoker::new(CallbackPolicy::Contain);
        let mut grad = vec![0.0; 2];
        let v = inv.eval_scalar(&b, &[1.0, 3.0], Some(&mut grad));
        assert_eq!(v, 10.0);
        assert_eq!(grad, vec![2.0, 6.0]);
        assert_eq!(inv.errors(), 0);
    }

    #[test]
    fn test_contain_substitutes_zero() {
        let b = objective(Arc::new(AlwaysFails));
        let mut inv = Invoker::new(CallbackPolicy::Contain);
        let v = inv.eval_scalar(&b, &[1.0], None);
        assert_eq!(v, 0.0);
        assert_eq!(inv.errors(), 1);
        assert!(!inv.abort_requested());
    }

    #[test]
    fn test_abort_policy_raises_flag() {
        let b = objective(Arc::new(AlwaysFails));
        let mut inv = Invoker::new(CallbackPolicy::Abort);
        let v = inv.eval_scalar(&b, &[1.0], None);
        assert_eq!(v, 0.0);
        assert!(inv.abort_requested());
    }

    struct RowMajor;
    impl VectorEval for RowMajor {
        fn eval(
            &self,
            result: &mut [f64],
            x: &[f64],
            grad: Option<&mut [f64]>,
        ) -> Result<(), EvalError> {
            let n = x.len();
            for (i, r) in result.iter_mut().enumerate() {
                *r = (i + 1) as f64 * x[0];
            }
            if let Some(g) = grad {
                for i in 0..result.len() {
                    for j in 0..n {
                        g[i * n + j] = (i * n + j) as f64;
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_vector_round_trip_row_major() {
        let b = CallbackBinding::vector(
            registry::next_handle_id(),
            BindingKind::VectorConstraint {
                equality: false,
                arity: 2,
                tolerances: None,
            },
            Arc::new(RowMajor),
        );
        let mut inv = Invoker::new(CallbackPolicy::Contain);
        let mut result = vec![0.0; 2];
        let mut grad = vec![0.0; 2 * 3];
        inv.eval_vector(&b, &mut result, &[2.0, 0.0, 0.0], Some(&mut grad));
        assert_eq!(result, vec![2.0, 4.0]);
        assert_eq!(grad, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_vector_failure_keeps_prepopulated_result() {
        struct FailsVec;
        impl VectorEval for FailsVec {
            fn eval(
                &self,
                _result: &mut [f64],
                _x: &[f64],
                _grad: Option<&mut [f64]>,
            ) -> Result<(), EvalError> {
                Err(EvalError::new("boom"))
            }
        }
        let b = CallbackBinding::vector(
            registry::next_handle_id(),
            BindingKind::VectorConstraint {
                equality: true,
                arity: 2,
                tolerances: None,
            },
            Arc::new(FailsVec),
        );
        let mut inv = Invoker::new(CallbackPolicy::Contain);
        let mut result = vec![7.0, 8.0];
        inv.eval_vector(&b, &mut result, &[0.0], None);
        assert_eq!(result, vec![7.0, 8.0]);
        assert_eq!(inv.errors(), 1);
    }
}
