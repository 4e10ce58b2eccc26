//! Error types for rules-engine construction and configuration.
//!
//! Only programming-level misuse surfaces as [`RulesError`]. Expected
//! failures during play (no target, out of charges, no spell slot) come back
//! as typed results so the game loop can show them and carry on.

use crate::dice::DiceError;
use thiserror::Error;

/// Errors from constructors and setters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    /// Malformed input, e.g. a duplicate Half-Elf bonus ability.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not valid for the current configuration, e.g. Half-Elf
    /// bonuses on a Dwarf.
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl RulesError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RulesError::InvalidArgument(message.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        RulesError::IllegalState(message.into())
    }
}

impl From<DiceError> for RulesError {
    fn from(err: DiceError) -> Self {
        RulesError::InvalidArgument(err.to_string())
    }
}
