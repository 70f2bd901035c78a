//! nlo: nonlinear optimization with host-callback bindings.
//!
//! This crate implements an NLopt-style optimizer handle: an opaque object
//! that owns solver state together with the callback bindings attached to it
//! (one objective, any number of inequality/equality constraints). The solve
//! loop is synchronous and re-entrant: `optimize` blocks the calling thread
//! and repeatedly invokes the attached callables from inside the engine's
//! call stack.
//!
//! The hard part is lifetime, not arithmetic. A handle may outlive the call
//! that created it and may be duplicated; every duplicate must carry its own
//! independently-released registration of the same logical callables. The
//! [`registry`] module keeps callables reachable for exactly as long as some
//! handle needs them, and [`binding::CallbackBinding`] implements the
//! duplicate/release protocol that crosses the engine/host boundary.
//!
//! # Example
//!
//! ```
//! use nlo_core::{Algorithm, Opt, Status};
//!
//! let mut opt = Opt::new(Algorithm::LnNelderMead, 1);
//! opt.set_lower_bounds1(-10.0);
//! opt.set_upper_bounds1(10.0);
//! opt.set_xtol_rel(1e-6);
//! opt.set_min_objective(|x: &[f64], _grad: Option<&mut [f64]>| (x[0] - 2.0).powi(2));
//!
//! let mut x = vec![0.0];
//! let (status, fmin) = opt.optimize(&mut x);
//! assert!(status.is_success());
//! assert!((x[0] - 2.0).abs() < 1e-3);
//! assert!(fmin < 1e-6);
//! ```
//!
//! # Status codes are values
//!
//! Setters and `optimize` return [`Status`] as data; several variants (e.g.
//! `XtolReached`) are successful terminations, so a non-`Success` code is not
//! an error. Only boundary validation ([`Error::InvalidArgument`]) and
//! allocation-class failures ([`Error::OutOfMemory`]) are `Err`.

#![warn(clippy::all)]

pub mod algorithm;
pub mod binding;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod opt;
pub mod registry;
pub mod rng;
pub mod status;

pub use algorithm::Algorithm;
pub use binding::{EvalError, ScalarEval, VectorEval};
pub use error::{Error, Result};
pub use marshal::CallbackPolicy;
pub use opt::Opt;
pub use registry::HandleId;
pub use rng::{srand, srand_time};
pub use status::Status;

/// Library version as `(major, minor, patch)`.
pub fn version() -> (u32, u32, u32) {
    let mut parts = env!("CARGO_PKG_VERSION")
        .split('.')
        .map(|p| p.parse::<u32>().unwrap_or(0));
    let mut next = || parts.next().unwrap_or(0);
    (next(), next(), next())
}

/// Human-readable name for an algorithm index, or `None` if out of range.
pub fn algorithm_name(index: i64) -> Option<&'static str> {
    Algorithm::from_index(index).map(Algorithm::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_manifest() {
        let (major, minor, patch) = version();
        assert_eq!(
            format!("{}.{}.{}", major, minor, patch),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_algorithm_name_lookup() {
        assert!(algorithm_name(0).is_some());
        assert!(algorithm_name(-1).is_none());
        assert!(algorithm_name(Algorithm::COUNT as i64).is_none());
    }
}
