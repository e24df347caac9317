//! Shared data types for the account core.

pub mod account;
pub mod enums;
pub mod order;

pub use account::{AccountBalance, CashEntry, Commission, Position};
pub use enums::{
    CashSource, CommissionState, Direction, OffsetFlag, PositionDirection, PositionState,
    RatioMode,
};
pub use order::{Balance, OrderRequest, PositionSummary, Trade};
