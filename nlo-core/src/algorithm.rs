//! The fixed algorithm-identifier enumeration.
//!
//! The identifier set (and its integer indices) is part of the public
//! surface: hosts pass raw indices across the boundary and the constants are
//! re-exported into the host namespace. Indices are therefore stable and
//! contiguous in `0..NUM_ALGORITHMS`.
//!
//! Naming convention follows the classic NLopt scheme: `Gn`/`Gd` are global
//! algorithms (no-derivative / derivative), `Ln`/`Ld` local ones. The engine
//! treats every identifier as a dispatch key onto one of its backends; see
//! [`crate::engine`].

/// Algorithm identifiers accepted by [`crate::Opt::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
#[allow(missing_docs)] // variant names mirror the published constant names
pub enum Algorithm {
    GnDirect = 0,
    GnDirectL,
    GnDirectLRand,
    GnDirectNoscal,
    GnDirectLNoscal,
    GnDirectLRandNoscal,
    GnOrigDirect,
    GnOrigDirectL,
    GdStogo,
    GdStogoRand,
    LdLbfgsNocedal,
    LdLbfgs,
    LnPraxis,
    LdVar1,
    LdVar2,
    LdTnewton,
    LdTnewtonRestart,
    LdTnewtonPrecond,
    LdTnewtonPrecondRestart,
    GnCrs2Lm,
    GnMlsl,
    GdMlsl,
    GnMlslLds,
    GdMlslLds,
    LdMma,
    LnCobyla,
    LnNewuoa,
    LnNewuoaBound,
    LnNelderMead,
    LnSbplx,
    LnAuglag,
    LdAuglag,
    LnAuglagEq,
    LdAuglagEq,
    LnBobyqa,
    GnIsres,
    Auglag,
    AuglagEq,
    GMlsl,
    GMlslLds,
    LdSlsqp,
    LdCcsaq,
}

/// Engine backend classes; every identifier maps onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    /// Bound-constrained Nelder-Mead simplex (local, derivative-free).
    NelderMead,
    /// Projected gradient descent with backtracking (local, derivative).
    Gradient,
    /// Seeded adaptive random search with a simplex polish (global).
    Random,
}

impl Algorithm {
    /// Number of algorithm identifiers (`NUM_ALGORITHMS`).
    pub const COUNT: usize = 42;

    const ALL: [Algorithm; Self::COUNT] = [
        Algorithm::GnDirect,
        Algorithm::GnDirectL,
        Algorithm::GnDirectLRand,
        Algorithm::GnDirectNoscal,
        Algorithm::GnDirectLNoscal,
        Algorithm::GnDirectLRandNoscal,
        Algorithm::GnOrigDirect,
        Algorithm::GnOrigDirectL,
        Algorithm::GdStogo,
        Algorithm::GdStogoRand,
        Algorithm::LdLbfgsNocedal,
        Algorithm::LdLbfgs,
        Algorithm::LnPraxis,
        Algorithm::LdVar1,
        Algorithm::LdVar2,
        Algorithm::LdTnewton,
        Algorithm::LdTnewtonRestart,
        Algorithm::LdTnewtonPrecond,
        Algorithm::LdTnewtonPrecondRestart,
        Algorithm::GnCrs2Lm,
        Algorithm::GnMlsl,
        Algorithm::GdMlsl,
        Algorithm::GnMlslLds,
        Algorithm::GdMlslLds,
        Algorithm::LdMma,
        Algorithm::LnCobyla,
        Algorithm::LnNewuoa,
        Algorithm::LnNewuoaBound,
        Algorithm::LnNelderMead,
        Algorithm::LnSbplx,
        Algorithm::LnAuglag,
        Algorithm::LdAuglag,
        Algorithm::LnAuglagEq,
        Algorithm::LdAuglagEq,
        Algorithm::LnBobyqa,
        Algorithm::GnIsres,
        Algorithm::Auglag,
        Algorithm::AuglagEq,
        Algorithm::GMlsl,
        Algorithm::GMlslLds,
        Algorithm::LdSlsqp,
        Algorithm::LdCcsaq,
    ];

    /// Look up an identifier by its stable integer index.
    pub fn from_index(index: i64) -> Option<Algorithm> {
        if (0..Self::COUNT as i64).contains(&index) {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Stable integer index of this identifier.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the algorithm requests gradients from the objective and
    /// constraint callables.
    pub fn uses_gradient(self) -> bool {
        matches!(
            self,
            Algorithm::GdStogo
                | Algorithm::GdStogoRand
                | Algorithm::LdLbfgsNocedal
                | Algorithm::LdLbfgs
                | Algorithm::LdVar1
                | Algorithm::LdVar2
                | Algorithm::LdTnewton
                | Algorithm::LdTnewtonRestart
                | Algorithm::LdTnewtonPrecond
                | Algorithm::LdTnewtonPrecondRestart
                | Algorithm::GdMlsl
                | Algorithm::GdMlslLds
                | Algorithm::LdMma
                | Algorithm::LdAuglag
                | Algorithm::LdAuglagEq
                | Algorithm::LdSlsqp
                | Algorithm::LdCcsaq
        )
    }

    /// Whether the algorithm performs a global search over the bound box.
    pub fn is_global(self) -> bool {
        matches!(
            self.name_prefix(),
            "GN" | "GD" | "G"
        )
    }

    /// Engine backend this identifier dispatches to.
    pub(crate) fn backend(self) -> Backend {
        if self.is_global() {
            Backend::Random
        } else if self.uses_gradient() {
            Backend::Gradient
        } else {
            Backend::NelderMead
        }
    }

    fn name_prefix(self) -> &'static str {
        match self {
            a if (a.index() <= Algorithm::GnOrigDirectL.index())
                || a == Algorithm::GnCrs2Lm
                || a == Algorithm::GnMlsl
                || a == Algorithm::GnMlslLds
                || a == Algorithm::GnIsres =>
            {
                "GN"
            }
            Algorithm::GdStogo
            | Algorithm::GdStogoRand
            | Algorithm::GdMlsl
            | Algorithm::GdMlslLds => "GD",
            Algorithm::GMlsl | Algorithm::GMlslLds => "G",
            a if a.uses_gradient() => "LD",
            _ => "LN",
        }
    }

    /// Human-readable algorithm description.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::GnDirect => "DIRECT (global, no-derivative)",
            Algorithm::GnDirectL => "DIRECT-L (global, no-derivative)",
            Algorithm::GnDirectLRand => "Randomized DIRECT-L (global, no-derivative)",
            Algorithm::GnDirectNoscal => "Unscaled DIRECT (global, no-derivative)",
            Algorithm::GnDirectLNoscal => "Unscaled DIRECT-L (global, no-derivative)",
            Algorithm::GnDirectLRandNoscal => {
                "Unscaled randomized DIRECT-L (global, no-derivative)"
            }
            Algorithm::GnOrigDirect => "Original DIRECT (global, no-derivative)",
            Algorithm::GnOrigDirectL => "Original DIRECT-L (global, no-derivative)",
            Algorithm::GdStogo => "StoGO (global, derivative)",
            Algorithm::GdStogoRand => "Randomized StoGO (global, derivative)",
            Algorithm::LdLbfgsNocedal => "L-BFGS, Nocedal variant (local, derivative)",
            Algorithm::LdLbfgs => "L-BFGS (local, derivative)",
            Algorithm::LnPraxis => "Principal-axis (local, no-derivative)",
            Algorithm::LdVar1 => "Rank-1 variable metric (local, derivative)",
            Algorithm::LdVar2 => "Rank-2 variable metric (local, derivative)",
            Algorithm::LdTnewton => "Truncated Newton (local, derivative)",
            Algorithm::LdTnewtonRestart => "Truncated Newton with restarts (local, derivative)",
            Algorithm::LdTnewtonPrecond => "Preconditioned truncated Newton (local, derivative)",
            Algorithm::LdTnewtonPrecondRestart => {
                "Preconditioned truncated Newton with restarts (local, derivative)"
            }
            Algorithm::GnCrs2Lm => "Controlled random search (global, no-derivative)",
            Algorithm::GnMlsl => "Multi-level single-linkage (global, no-derivative)",
            Algorithm::GdMlsl => "Multi-level single-linkage (global, derivative)",
            Algorithm::GnMlslLds => {
                "Multi-level single-linkage, low-discrepancy (global, no-derivative)"
            }
            Algorithm::GdMlslLds => {
                "Multi-level single-linkage, low-discrepancy (global, derivative)"
            }
            Algorithm::LdMma => "Method of moving asymptotes (local, derivative)",
            Algorithm::LnCobyla => "COBYLA (local, no-derivative)",
            Algorithm::LnNewuoa => "NEWUOA (local, no-derivative)",
            Algorithm::LnNewuoaBound => "Bound-constrained NEWUOA (local, no-derivative)",
            Algorithm::LnNelderMead => "Nelder-Mead simplex (local, no-derivative)",
            Algorithm::LnSbplx => "Subplex (local, no-derivative)",
            Algorithm::LnAuglag => "Augmented Lagrangian (local, no-derivative)",
            Algorithm::LdAuglag => "Augmented Lagrangian (local, derivative)",
            Algorithm::LnAuglagEq => {
                "Augmented Lagrangian, equality-only (local, no-derivative)"
            }
            Algorithm::LdAuglagEq => "Augmented Lagrangian, equality-only (local, derivative)",
            Algorithm::LnBobyqa => "BOBYQA (local, no-derivative)",
            Algorithm::GnIsres => "Improved stochastic ranking (global, no-derivative)",
            Algorithm::Auglag => "Augmented Lagrangian (subsidiary chosen at solve)",
            Algorithm::AuglagEq => {
                "Augmented Lagrangian, equality-only (subsidiary chosen at solve)"
            }
            Algorithm::GMlsl => "Multi-level single-linkage (subsidiary chosen at solve)",
            Algorithm::GMlslLds => {
                "Multi-level single-linkage, low-discrepancy (subsidiary chosen at solve)"
            }
            Algorithm::LdSlsqp => "SLSQP (local, derivative)",
            Algorithm::LdCcsaq => "CCSA quadratic (local, derivative)",
        }
    }

    /// Stable upper-case identifier, as exposed to host languages.
    pub fn ident(self) -> &'static str {
        match self {
            Algorithm::GnDirect => "GN_DIRECT",
            Algorithm::GnDirectL => "GN_DIRECT_L",
            Algorithm::GnDirectLRand => "GN_DIRECT_L_RAND",
            Algorithm::GnDirectNoscal => "GN_DIRECT_NOSCAL",
            Algorithm::GnDirectLNoscal => "GN_DIRECT_L_NOSCAL",
            Algorithm::GnDirectLRandNoscal => "GN_DIRECT_L_RAND_NOSCAL",
            Algorithm::GnOrigDirect => "GN_ORIG_DIRECT",
            Algorithm::GnOrigDirectL => "GN_ORIG_DIRECT_L",
            Algorithm::GdStogo => "GD_STOGO",
            Algorithm::GdStogoRand => "GD_STOGO_RAND",
            Algorithm::LdLbfgsNocedal => "LD_LBFGS_NOCEDAL",
            Algorithm::LdLbfgs => "LD_LBFGS",
            Algorithm::LnPraxis => "LN_PRAXIS",
            Algorithm::LdVar1 => "LD_VAR1",
            Algorithm::LdVar2 => "LD_VAR2",
            Algorithm::LdTnewton => "LD_TNEWTON",
            Algorithm::LdTnewtonRestart => "LD_TNEWTON_RESTART",
            Algorithm::LdTnewtonPrecond => "LD_TNEWTON_PRECOND",
            Algorithm::LdTnewtonPrecondRestart => "LD_TNEWTON_PRECOND_RESTART",
            Algorithm::GnCrs2Lm => "GN_CRS2_LM",
            Algorithm::GnMlsl => "GN_MLSL",
            Algorithm::GdMlsl => "GD_MLSL",
            Algorithm::GnMlslLds => "GN_MLSL_LDS",
            Algorithm::GdMlslLds => "GD_MLSL_LDS",
            Algorithm::LdMma => "LD_MMA",
            Algorithm::LnCobyla => "LN_COBYLA",
            Algorithm::LnNewuoa => "LN_NEWUOA",
            Algorithm::LnNewuoaBound => "LN_NEWUOA_BOUND",
            Algorithm::LnNelderMead => "LN_NELDERMEAD",
            Algorithm::LnSbplx => "LN_SBPLX",
            Algorithm::LnAuglag => "LN_AUGLAG",
            Algorithm::LdAuglag => "LD_AUGLAG",
            Algorithm::LnAuglagEq => "LN_AUGLAG_EQ",
            Algorithm::LdAuglagEq => "LD_AUGLAG_EQ",
            Algorithm::LnBobyqa => "LN_BOBYQA",
            Algorithm::GnIsres => "GN_ISRES",
            Algorithm::Auglag => "AUGLAG",
            Algorithm::AuglagEq => "AUGLAG_EQ",
            Algorithm::GMlsl => "G_MLSL",
            Algorithm::GMlslLds => "G_MLSL_LDS",
            Algorithm::LdSlsqp => "LD_SLSQP",
            Algorithm::LdCcsaq => "LD_CCSAQ",
        }
    }

    /// Iterate every identifier in index order.
    pub fn all() -> impl Iterator<Item = Algorithm> {
        Self::ALL.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for i in 0..Algorithm::COUNT {
            let alg = Algorithm::from_index(i as i64).unwrap();
            assert_eq!(alg.index(), i);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(Algorithm::from_index(-1).is_none());
        assert!(Algorithm::from_index(Algorithm::COUNT as i64).is_none());
        assert!(Algorithm::from_index(i64::MAX).is_none());
    }

    #[test]
    fn test_classification() {
        assert!(Algorithm::GnDirect.is_global());
        assert!(!Algorithm::GnDirect.uses_gradient());
        assert!(Algorithm::LdLbfgs.uses_gradient());
        assert!(!Algorithm::LdLbfgs.is_global());
        assert!(Algorithm::GdStogo.is_global());
        assert!(Algorithm::GdStogo.uses_gradient());
        assert!(!Algorithm::LnNelderMead.uses_gradient());
        assert!(!Algorithm::LnNelderMead.is_global());
        assert!(Algorithm::GMlslLds.is_global());
    }

    #[test]
    fn test_idents_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for alg in Algorithm::all() {
            assert!(seen.insert(alg.ident()), "duplicate ident {}", alg.ident());
        }
        assert_eq!(seen.len(), Algorithm::COUNT);
    }

    #[test]
    fn test_backend_dispatch() {
        assert_eq!(Algorithm::LnNelderMead.backend(), Backend::NelderMead);
        assert_eq!(Algorithm::LdSlsqp.backend(), Backend::Gradient);
        assert_eq!(Algorithm::GnCrs2Lm.backend(), Backend::Random);
    }

    #[test]
    fn test_every_identifier_has_a_name() {
        for i in 0..Algorithm::COUNT {
            let alg = Algorithm::from_index(i as i64).unwrap();
            assert!(!alg.name().is_empty());
        }
    }
}
