//! Order, trade, and reporting structures exchanged with the caller and the
//! execution channel.

use serde::{Deserialize, Serialize};

use super::enums::{Direction, OffsetFlag, PositionDirection};

/// An order request submitted by the caller.
///
/// Quantity is a lot count; every lot is reserved individually against the
/// ledger before the order reaches the execution channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Caller-assigned order id. Sub-orders built by the settlement router
    /// append `/1` (today) or `/2` (yesterday).
    pub id: String,
    pub user: String,
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub offset: OffsetFlag,
    pub price: f64,
    pub quantity: u32,
    pub time: String,
}

/// A fill (or partial fill) reported by the execution channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Id of the (sub-)order this fill belongs to.
    pub order_id: String,
    pub symbol: String,
    pub quantity: u32,
    pub price: f64,
    pub direction: Direction,
    /// Offset the venue reports; always `Open` or plain `Close`.
    pub offset: OffsetFlag,
    pub time: String,
}

/// The externally reported account balance snapshot.
///
/// `balance = pre_balance + deposit - withdraw + position_profit
///  + close_profit - commission` and `available = balance - margin
///  - frozen_margin - frozen_commission`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub user: String,
    pub pre_balance: f64,
    pub balance: f64,
    pub available: f64,
    pub margin: f64,
    pub frozen_margin: f64,
    pub commission: f64,
    pub frozen_commission: f64,
    pub position_profit: f64,
    pub close_profit: f64,
    pub deposit: f64,
    pub withdraw: f64,
    pub trading_day: String,
    pub time: String,
}

/// Per-(symbol, direction) position rollup.
///
/// `volume`/`margin` cover every position of the key; the opening and closing
/// buckets cover only the frozen-open and frozen-close subsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub direction: PositionDirection,
    pub volume: u32,
    pub margin: f64,
    pub opening_volume: u32,
    pub opening_margin: f64,
    pub closing_volume: u32,
    pub closing_margin: f64,
    pub position_profit: f64,
    pub trading_day: String,
    pub time: String,
}
