//! Typed error definitions for the account core.
//!
//! Every failure a ledger or settlement operation can produce is an
//! [`AccountError`] variant, so callers can match on the kind instead of
//! parsing strings. All variants implement `std::error::Error` via
//! `thiserror` and integrate with `anyhow::Result` at outer boundaries.

use thiserror::Error;

/// Domain errors raised by ledger and order-settlement operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    /// Fill or order offset does not match what the consumer expects.
    #[error("illegal offset: {0}")]
    IllegalOffset(String),

    /// The rate provider returned a negative margin.
    #[error("illegal margin: {0}")]
    IllegalMargin(f64),

    /// The rate provider returned a negative commission.
    #[error("illegal commission: {0}")]
    IllegalCommission(f64),

    /// Available capital cannot cover the requested margin plus commission.
    #[error("insufficient available: {available}, need {required}")]
    InsufficientAvailable { available: f64, required: f64 },

    /// No closable position matches the requested symbol and direction.
    #[error("insufficient position: {symbol}, {direction}")]
    InsufficientPosition { symbol: String, direction: String },

    /// The position is not in the state the operation requires.
    #[error("invalid position state: {id}, {state}")]
    InvalidPositionState { id: String, state: String },

    /// The position id is stale or was already consumed.
    #[error("position not found: {0}")]
    PositionNotFound(String),

    /// The commission id is stale or was already consumed.
    #[error("commission not found: {0}")]
    CommissionNotFound(String),

    /// A fill asks for more lots than the consumer has reservations queued.
    #[error("reservation underflow: queued {queued}, fill {requested}")]
    ReservationUnderflow { queued: usize, requested: u32 },

    /// Order quantity is zero (or otherwise yields no reservations).
    #[error("illegal quantity: {0}")]
    IllegalQuantity(u32),

    /// The order's user does not match the account.
    #[error("wrong user: {actual}, expect {expected}")]
    WrongUser { actual: String, expected: String },

    /// The rate provider has no price, multiplier, or ratio for the symbol.
    ///
    /// Replaces the NaN sentinel some providers use for a missing rate, so a
    /// missing-rate condition can never slip past the negative-value guards.
    #[error("rate unavailable: {kind} for {symbol}")]
    RateUnavailable { symbol: String, kind: &'static str },

    /// Delivering a callback to the caller's sink failed.
    #[error("sink delivery failed: {0}")]
    SinkFailure(String),
}

/// Convenience alias used across the account crates.
pub type Result<T, E = AccountError> = std::result::Result<T, E>;
