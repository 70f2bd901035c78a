//! Solver status codes.
//!
//! A [`Status`] is a value, never an error: every setter and `optimize`
//! returns one so the host can branch on it. Positive codes are successful
//! terminations (several describe *which* stopping criterion fired), negative
//! codes are failures. The integer values are stable and exported to hosts.

use std::fmt;

/// Result/status code returned by setters and by `optimize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Generic failure.
    Failure = -1,
    /// Invalid arguments (bad shape, out-of-range value, missing objective).
    InvalidArgs = -2,
    /// Memory allocation failed.
    OutOfMemory = -3,
    /// Halted because roundoff errors limited further progress.
    RoundoffLimited = -4,
    /// Halted because the force-stop flag was set.
    ForcedStop = -5,
    /// Generic success.
    Success = 1,
    /// Halted because `stopval` was reached.
    StopvalReached = 2,
    /// Halted because `ftol_rel` or `ftol_abs` was reached.
    FtolReached = 3,
    /// Halted because `xtol_rel` or `xtol_abs` was reached.
    XtolReached = 4,
    /// Halted because `maxeval` was reached.
    MaxevalReached = 5,
    /// Halted because `maxtime` was reached.
    MaxtimeReached = 6,
}

impl Status {
    /// True for every successful-termination variant.
    pub fn is_success(self) -> bool {
        self.to_i32() > 0
    }

    /// Stable integer value of this code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Look up a code by its stable integer value.
    pub fn from_i32(value: i32) -> Option<Status> {
        match value {
            -1 => Some(Status::Failure),
            -2 => Some(Status::InvalidArgs),
            -3 => Some(Status::OutOfMemory),
            -4 => Some(Status::RoundoffLimited),
            -5 => Some(Status::ForcedStop),
            1 => Some(Status::Success),
            2 => Some(Status::StopvalReached),
            3 => Some(Status::FtolReached),
            4 => Some(Status::XtolReached),
            5 => Some(Status::MaxevalReached),
            6 => Some(Status::MaxtimeReached),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Failure => "failure",
            Status::InvalidArgs => "invalid arguments",
            Status::OutOfMemory => "out of memory",
            Status::RoundoffLimited => "roundoff limited",
            Status::ForcedStop => "forced stop",
            Status::Success => "success",
            Status::StopvalReached => "stopval reached",
            Status::FtolReached => "ftol reached",
            Status::XtolReached => "xtol reached",
            Status::MaxevalReached => "maxeval reached",
            Status::MaxtimeReached => "maxtime reached",
        };
        f.write_str(s)
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> i32 {
        status.to_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_split() {
        assert!(Status::Success.is_success());
        assert!(Status::XtolReached.is_success());
        assert!(Status::MaxtimeReached.is_success());
        assert!(!Status::Failure.is_success());
        assert!(!Status::ForcedStop.is_success());
    }

    #[test]
    fn test_integer_round_trip() {
        for v in [-5, -4, -3, -2, -1, 1, 2, 3, 4, 5, 6] {
            assert_eq!(Status::from_i32(v).unwrap().to_i32(), v);
        }
        assert!(Status::from_i32(0).is_none());
        assert!(Status::from_i32(7).is_none());
    }
}
