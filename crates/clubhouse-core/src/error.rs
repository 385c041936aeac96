// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Clubhouse crate.

use thiserror::Error;

use crate::types::Money;

/// The primary error type returned by engine, ledger, and storage operations.
#[derive(Debug, Error)]
pub enum ClubError {
    /// A referenced client, computer, tariff, session, or reservation does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The entity is not in the state the operation requires.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The computer is unavailable or the requested time window is taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The client's balance does not cover the required cost.
    #[error("insufficient funds: cost {cost}, balance {balance}")]
    InsufficientFunds { cost: Money, balance: Money },

    /// Rejected input (non-positive amount or duration, missing selection).
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend errors (connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors surfaced at runtime.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClubError {
    /// Shorthand for [`ClubError::NotFound`].
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether this error came from the store rather than from a business rule.
    ///
    /// The tick scheduler backs off only on storage errors.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_message_names_cost_and_balance() {
        let err = ClubError::InsufficientFunds {
            cost: dec!(200.00),
            balance: dec!(150.50),
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: cost 200.00, balance 150.50"
        );
    }

    #[test]
    fn not_found_message() {
        let err = ClubError::not_found("computer", 7);
        assert_eq!(err.to_string(), "computer 7 not found");
        assert!(!err.is_storage());
    }

    #[test]
    fn storage_errors_are_flagged() {
        let err = ClubError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        assert!(err.is_storage());
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
