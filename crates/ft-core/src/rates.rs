//! Rate lookup interface.
//!
//! The ledger never computes fees itself; per-lot margin and commission
//! amounts, the day's reference price, and the contract multiplier all come
//! from a [`RateProvider`]. Implementations are expected to answer from a
//! fast local store — these calls sit inside the ledger's critical section.

use crate::error::Result;
use crate::types::enums::{Direction, OffsetFlag};

/// Supplies rates, reference prices, and the trading calendar.
///
/// A missing rate is an explicit [`RateUnavailable`](crate::error::AccountError::RateUnavailable)
/// error, never a NaN or other numeric sentinel.
pub trait RateProvider: Send + Sync {
    /// Latest reference price for a symbol.
    fn price(&self, symbol: &str) -> Result<f64>;

    /// Contract multiplier for a symbol.
    fn multiplier(&self, symbol: &str) -> Result<i64>;

    /// Per-lot margin for opening or closing one lot at `price`.
    ///
    /// By-volume ratios return the flat amount; by-amount ratios return
    /// `price * multiplier * ratio`.
    fn margin(
        &self,
        symbol: &str,
        price: f64,
        direction: Direction,
        offset: OffsetFlag,
    ) -> Result<f64>;

    /// Per-lot commission, with the same ratio semantics as [`margin`](Self::margin).
    fn commission(
        &self,
        symbol: &str,
        price: f64,
        direction: Direction,
        offset: OffsetFlag,
    ) -> Result<f64>;

    /// Current trading day (venue calendar, not wall-clock date).
    fn trading_day(&self) -> String;

    /// Current wall-clock timestamp, formatted for record fields.
    fn now(&self) -> String;
}
