//! Callback bindings: the attachment of a host callable to a handle.
//!
//! A [`CallbackBinding`] owns one strong reference to a host callable plus
//! the [`Registration`](crate::registry) that keeps it reachable, and is
//! exclusively owned by exactly one handle. The two places where binding
//! lifetime crosses the engine/host boundary are the capability methods
//! [`CallbackBinding::duplicate`] and release (the `Drop` of the contained
//! registration); every other access happens synchronously inside a call
//! that already holds a valid reference.

use std::sync::Arc;

use crate::registry::{HandleId, Registration};

/// Error raised by a host callable.
///
/// Never propagated into the engine's blocking solve loop; see
/// [`crate::marshal`] for the containment policy.
#[derive(Debug, Clone)]
pub struct EvalError {
    /// Host-side error message, for diagnostics only.
    pub message: String,
}

impl EvalError {
    /// Wrap a host error message.
    pub fn new(message: impl Into<String>) -> EvalError {
        EvalError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "callback error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// A scalar-valued host callable: objective or single constraint.
///
/// `grad` is `Some` only when the active algorithm needs gradients; the
/// slice arrives pre-populated with the engine buffer's current contents and
/// must be overwritten in full when present.
pub trait ScalarEval: Send + Sync {
    /// Evaluate at `x`, writing the gradient into `grad` when requested.
    fn eval(&self, x: &[f64], grad: Option<&mut [f64]>) -> Result<f64, EvalError>;
}

/// A vector-valued host callable (`m` outputs over `n` inputs).
///
/// `grad`, when present, has length `m * n` in row-major order: entry
/// `i * n + j` is d result\[i\] / d x\[j\].
pub trait VectorEval: Send + Sync {
    /// Evaluate at `x` into `result`, writing the gradient when requested.
    fn eval(
        &self,
        result: &mut [f64],
        x: &[f64],
        grad: Option<&mut [f64]>,
    ) -> Result<(), EvalError>;
}

// Plain closures are infallible scalar callables; hosts with a failure
// channel implement the trait directly.
impl<F> ScalarEval for F
where
    F: Fn(&[f64], Option<&mut [f64]>) -> f64 + Send + Sync,
{
    fn eval(&self, x: &[f64], grad: Option<&mut [f64]>) -> Result<f64, EvalError> {
        Ok(self(x, grad))
    }
}

/// Strong reference to a host callable, as stored in the registry.
#[derive(Clone)]
pub(crate) enum HostRef {
    Scalar(Arc<dyn ScalarEval>),
    Vector(Arc<dyn VectorEval>),
}

impl std::fmt::Debug for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostRef::Scalar(_) => f.write_str("HostRef::Scalar"),
            HostRef::Vector(_) => f.write_str("HostRef::Vector"),
        }
    }
}

/// What a binding is attached *as*.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindingKind {
    /// The objective; `maximize` flips the optimization direction.
    Objective { maximize: bool },
    /// A single constraint `c(x) <= tolerance` (inequality) or
    /// `|c(x)| <= tolerance` (equality).
    ScalarConstraint { equality: bool, tolerance: f64 },
    /// A vector constraint with `arity` outputs; `tolerances` has length
    /// `arity` when supplied, `None` means the engine default.
    VectorConstraint {
        equality: bool,
        arity: usize,
        tolerances: Option<Vec<f64>>,
    },
}

/// One attached callable, exclusively owned by one handle.
#[derive(Debug)]
pub(crate) struct CallbackBinding {
    kind: BindingKind,
    eval: HostRef,
    // Dropped last; its Drop is the release half of the lifecycle protocol.
    #[allow(dead_code)]
    registration: Registration,
}

impl CallbackBinding {
    /// Attach a scalar callable, registering it for the binding's lifetime.
    pub(crate) fn scalar(
        owner: HandleId,
        kind: BindingKind,
        eval: Arc<dyn ScalarEval>,
    ) -> CallbackBinding {
        let registration = Registration::new(owner, HostRef::Scalar(eval.clone()));
        CallbackBinding {
            kind,
            eval: HostRef::Scalar(eval),
            registration,
        }
    }

    /// Attach a vector callable, registering it for the binding's lifetime.
    pub(crate) fn vector(
        owner: HandleId,
        kind: BindingKind,
        eval: Arc<dyn VectorEval>,
    ) -> CallbackBinding {
        let registration = Registration::new(owner, HostRef::Vector(eval.clone()));
        CallbackBinding {
            kind,
            eval: HostRef::Vector(eval),
            registration,
        }
    }

    /// Duplication capability: same logical callable, fresh registration
    /// under `new_owner`. The source binding is not mutated; releasing either
    /// copy never invalidates the other.
    pub(crate) fn duplicate(&self, new_owner: HandleId) -> CallbackBinding {
        let registration = Registration::new(new_owner, self.eval.clone());
        CallbackBinding {
            kind: self.kind.clone(),
            eval: self.eval.clone(),
            registration,
        }
    }

    pub(crate) fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub(crate) fn scalar_eval(&self) -> Option<&Arc<dyn ScalarEval>> {
        match &self.eval {
            HostRef::Scalar(e) => Some(e),
            HostRef::Vector(_) => None,
        }
    }

    pub(crate) fn vector_eval(&self) -> Option<&Arc<dyn VectorEval>> {
        match &self.eval {
            HostRef::Vector(e) => Some(e),
            HostRef::Scalar(_) => None,
        }
    }

    /// Output arity: 1 for scalar bindings, `m` for vector constraints.
    pub(crate) fn arity(&self) -> usize {
        match &self.kind {
            BindingKind::VectorConstraint { arity, .. } => *arity,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn test_binding_registers_and_releases() {
        let owner = registry::next_handle_id();
        let binding = CallbackBinding::scalar(
            owner,
            BindingKind::Objective { maximize: false },
            Arc::new(|x: &[f64], _: Option<&mut [f64]>| x[0]),
        );
        assert_eq!(registry::registrations_for(owner), 1);
        drop(binding);
        assert_eq!(registry::registrations_for(owner), 0);
    }

    #[test]
    fn test_duplicate_is_independently_registered() {
        let a = registry::next_handle_id();
        let b = registry::next_handle_id();
        let source = CallbackBinding::scalar(
            a,
            BindingKind::ScalarConstraint {
                equality: false,
                tolerance: 1e-8,
            },
            Arc::new(|x: &[f64], _: Option<&mut [f64]>| x[0] - 1.0),
        );
        let copy = source.duplicate(b);
        assert_eq!(registry::registrations_for(a), 1);
        assert_eq!(registry::registrations_for(b), 1);
        assert_eq!(copy.kind(), source.kind());

        // Releasing the source leaves the copy's registration intact.
        drop(source);
        assert_eq!(registry::registrations_for(a), 0);
        assert_eq!(registry::registrations_for(b), 1);
        let x = [3.0];
        let v = copy.scalar_eval().unwrap().eval(&x, None).unwrap();
        assert_eq!(v, 2.0);
    }

    #[test]
    fn test_arity() {
        let owner = registry::next_handle_id();
        struct NoopVec;
        impl VectorEval for NoopVec {
            fn eval(
                &self,
                _result: &mut [f64],
                _x: &[f64],
                _grad: Option<&mut [f64]>,
            ) -> Result<(), EvalError> {
                Ok(())
            }
        }
        let b = CallbackBinding::vector(
            owner,
            BindingKind::VectorConstraint {
                equality: true,
                arity: 3,
                tolerances: None,
            },
            Arc::new(NoopVec),
        );
        assert_eq!(b.arity(), 3);
    }
}
