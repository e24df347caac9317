//! Enumerations used throughout the account core.
//!
//! Direction and offset flags follow the conventional futures-trading model:
//! an order is BUY or SELL combined with an OPEN or CLOSE offset, and a close
//! may be narrowed to today's or a prior day's position by the settlement
//! router.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Order direction and offset
// ---------------------------------------------------------------------------

/// Buy or sell direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The position direction a close order in this direction unwinds.
    ///
    /// Buying closes a short position; selling closes a long position.
    pub fn closes(self) -> PositionDirection {
        match self {
            Self::Buy => PositionDirection::Short,
            Self::Sell => PositionDirection::Long,
        }
    }

    /// The position direction an open order in this direction creates.
    pub fn opens(self) -> PositionDirection {
        match self {
            Self::Buy => PositionDirection::Long,
            Self::Sell => PositionDirection::Short,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Open/close offset of an order or fill.
///
/// `CloseToday` and `CloseYesterday` are produced by the settlement router
/// when a close order is split by the opening day of the matched positions;
/// fills always report the plain `Close` offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetFlag {
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

impl OffsetFlag {
    /// Whether this offset closes a position (any of the close variants).
    pub fn is_close(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for OffsetFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::CloseToday => write!(f, "close-today"),
            Self::CloseYesterday => write!(f, "close-yesterday"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position and commission states
// ---------------------------------------------------------------------------

/// Long or short side of a held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionDirection {
    Long,
    Short,
}

impl std::fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Lifecycle state of a position.
///
/// A position is created `FrozenOpen` by a reserve, becomes `Normal` when the
/// opening fill is confirmed, moves to `FrozenClose` when reserved by a close
/// order, and is deleted when the closing fill is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionState {
    FrozenOpen,
    Normal,
    FrozenClose,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FrozenOpen => write!(f, "frozen-open"),
            Self::Normal => write!(f, "normal"),
            Self::FrozenClose => write!(f, "frozen-close"),
        }
    }
}

/// Lifecycle state of a commission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommissionState {
    Frozen,
    Normal,
}

impl std::fmt::Display for CommissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frozen => write!(f, "frozen"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cash and rates
// ---------------------------------------------------------------------------

/// Where a cash entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CashSource {
    /// Deposit, positive amount.
    Deposit,
    /// Withdrawal, positive amount (subtracted from balance).
    Withdraw,
    /// Realized profit from closing a position, either sign.
    CloseProfit,
}

/// How a margin or commission ratio is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioMode {
    /// Flat per-lot amount: `fee = ratio`.
    ByVolume,
    /// Proportional to notional: `fee = price * multiplier * ratio`.
    ByAmount,
}
