//! Ledger entity records — positions, commissions, cash, and the settled
//! balance carried between trading days.
//!
//! These are the records the persistence provider stores. The ledger owns
//! them exclusively for one account; they are never shared across accounts.

use serde::{Deserialize, Serialize};

use super::enums::{
    CashSource, CommissionState, Direction, OffsetFlag, PositionDirection, PositionState,
};

/// A single-lot position held by the account.
///
/// `open_trading_day` is fixed at creation and never changes; it is the sole
/// signal used to route a later close to the today or yesterday sub-order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Record id (`P-` prefixed).
    pub id: String,
    pub symbol: String,
    pub exchange: String,
    pub direction: PositionDirection,
    /// Price the position was opened at (refreshed to the fill price on
    /// confirm).
    pub open_price: f64,
    /// Contract multiplier.
    pub multiplier: i64,
    /// Margin held for this position.
    pub margin: f64,
    pub open_trading_day: String,
    pub open_time: String,
    pub state: PositionState,
}

impl Position {
    /// Position profit at `current_price`.
    ///
    /// Zero unless the position is `Normal` or `FrozenClose`; a frozen-open
    /// position has no market exposure yet.
    pub fn profit(&self, current_price: f64) -> f64 {
        match self.state {
            PositionState::Normal | PositionState::FrozenClose => {
                let diff = match self.direction {
                    PositionDirection::Long => current_price - self.open_price,
                    PositionDirection::Short => self.open_price - current_price,
                };
                diff * self.multiplier as f64
            }
            PositionState::FrozenOpen => 0.0,
        }
    }
}

/// A commission record, paired 1:1 with a position reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    /// Record id (`C-` prefixed).
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub offset: OffsetFlag,
    /// Commission amount (recomputed at the fill price on confirm).
    pub amount: f64,
    pub trading_day: String,
    pub time: String,
    pub state: CommissionState,
}

/// An immutable, append-only cash audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashEntry {
    /// Record id (`S-` prefixed).
    pub id: String,
    pub amount: f64,
    pub source: CashSource,
    pub trading_day: String,
    pub time: String,
}

/// The settled account balance carried from the prior trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Record id (`B-` prefixed).
    pub id: String,
    pub user: String,
    pub balance: f64,
    pub trading_day: String,
    pub time: String,
}
