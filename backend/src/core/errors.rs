//! Error classification shared by every module error

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of an engine error.
///
/// `NotFound`, `WrongState`, `FundingRequired` and `ValidationFailed` are
/// recoverable: the failing call left the engine untouched.
/// `ContractViolation` means an engine invariant was breached; the call was
/// halted at the violation and the engine should be reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    WrongState,
    FundingRequired,
    ValidationFailed,
    ContractViolation,
    InvalidConfig,
}

impl ErrorKind {
    pub fn is_recoverable(self) -> bool {
        !matches!(self, ErrorKind::ContractViolation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::WrongState => "wrong state",
            ErrorKind::FundingRequired => "funding required",
            ErrorKind::ValidationFailed => "validation failed",
            ErrorKind::ContractViolation => "contract violation",
            ErrorKind::InvalidConfig => "invalid config",
        };
        f.write_str(name)
    }
}
